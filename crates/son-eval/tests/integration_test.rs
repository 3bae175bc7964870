use son_core::{intern, SonError, Value};
use son_eval::Interpreter;

fn eval(source: &str) -> Value {
    let interp = Interpreter::new();
    interp
        .eval_source(source)
        .unwrap_or_else(|e| panic!("failed to eval {source}: {e}"))
}

fn eval_err(source: &str) -> SonError {
    let interp = Interpreter::new();
    interp
        .eval_source(source)
        .expect_err(&format!("expected an error from {source}"))
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval(r#"[1, "+", [2, "*", 3]]"#), Value::Number(7.0));
    assert_eq!(eval(r#"[10, "-", 3]"#), Value::Number(7.0));
    assert_eq!(eval(r#"[10, "/", 4]"#), Value::Number(2.5));
    assert_eq!(eval(r#"[2, "*", 0.5]"#), Value::Number(1.0));
}

#[test]
fn test_division_by_zero() {
    let err = eval_err(r#"[1, "/", 0]"#);
    assert!(err.to_string().contains("division by zero"), "{err}");
}

#[test]
fn test_comparison() {
    assert_eq!(eval(r#"[1, "<", 2]"#), Value::Bool(true));
    assert_eq!(eval(r#"[3, ">", 2]"#), Value::Bool(true));
    assert_eq!(eval(r#"[2, "<=", 2]"#), Value::Bool(true));
    assert_eq!(eval(r#"[2, ">=", 3]"#), Value::Bool(false));
    assert_eq!(eval(r#"[42, "=", 42]"#), Value::Bool(true));
    assert_eq!(eval(r#"[42, "=", 41]"#), Value::Bool(false));
}

#[test]
fn test_strings() {
    assert_eq!(eval(r#"["ab", ",", "cd"]"#), Value::string("abcd"));
    assert_eq!(eval(r#"["hello", "size"]"#), Value::Number(5.0));
    assert_eq!(eval(r#"["hi", "=", "hi"]"#), Value::Bool(true));
    assert_eq!(eval(r#"["hi", "=", "ho"]"#), Value::Bool(false));
}

#[test]
fn test_symbols() {
    assert_eq!(
        eval(r##"[{"#": "foo"}, "asString"]"##),
        Value::string("foo")
    );
    assert_eq!(
        eval(r##"[{"#": "foo"}, "=", {"#": "foo"}]"##),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r##"[{"#": "foo"}, "=", {"#": "bar"}]"##),
        Value::Bool(false)
    );
}

#[test]
fn test_booleans() {
    assert_eq!(eval(r#"[true, "&", false]"#), Value::Bool(false));
    assert_eq!(eval(r#"[true, "|", false]"#), Value::Bool(true));
    assert_eq!(eval(r#"[true, "not"]"#), Value::Bool(false));
}

#[test]
fn test_if_true_if_false() {
    assert_eq!(
        eval(r#"[[true, "ifTrue:ifFalse:", [[], "=>:", ["yes"]], [[], "=>:", ["no"]]]]"#),
        Value::string("yes")
    );
    assert_eq!(
        eval(r#"[false, "ifTrue:ifFalse:", [[], "=>:", ["yes"]], [[], "=>:", ["no"]]]"#),
        Value::string("no")
    );
    assert_eq!(
        eval(r#"[false, "ifTrue:", [[], "=>:", [1]]]"#),
        Value::Null
    );
    assert_eq!(
        eval(r#"[false, "ifFalse:", [[], "=>:", [1]]]"#),
        Value::Number(1.0)
    );
}

#[test]
fn test_assignment_and_sequences() {
    assert_eq!(
        eval(r#"[["x:", 10], ["x:", [["$x"], "+", 5]], "$x"]"#),
        Value::Number(15.0)
    );
    // A sequence answers its last statement; an empty program is nil.
    assert_eq!(eval(r#"[1, 2, 3]"#), Value::Number(3.0));
    assert_eq!(eval(r#"[]"#), Value::Null);
    // Assignment answers the assigned value.
    assert_eq!(eval(r#"[["x:", 9]]"#), Value::Number(9.0));
}

#[test]
fn test_assignment_in_a_block_is_local() {
    assert_eq!(
        eval(r#"[["x:", 1], [[[], "=>:", [["x:", 2]]], "value"], "$x"]"#),
        Value::Number(1.0)
    );
}

#[test]
fn test_blocks_read_their_lexical_scope() {
    assert_eq!(
        eval(r#"[["x:", 40], [[["y"], "=>:", [["$x"], "+", "$y"]], "value:", 2]]"#),
        Value::Number(42.0)
    );
}

#[test]
fn test_block_arity_is_checked() {
    let err = eval_err(r#"[[["x"], "=>:", ["$x"]], "value"]"#);
    assert!(matches!(err, SonError::Argument(_)), "{err}");
}

#[test]
fn test_evaluation_order_is_left_to_right() {
    let interp = Interpreter::new();
    let result = interp
        .eval_source(
            r#"[[["$Transcript", "log:", "receiver"], 1], "+", [["$Transcript", "log:", "argument"], 2]]"#,
        )
        .unwrap();
    assert_eq!(result, Value::Number(3.0));
    assert_eq!(interp.host().transcript(), vec!["receiver", "argument"]);
}

#[test]
fn test_cascade_answers_the_receiver() {
    let interp = Interpreter::new();
    let result = interp
        .eval_source(
            r#"[5, "cascade:", [["+", [["$Transcript", "log:", "one"], 1]], ["*", [["$Transcript", "log:", "two"], 2]]]]"#,
        )
        .unwrap();
    // Inner message results are discarded; messages run in order.
    assert_eq!(result, Value::Number(5.0));
    assert_eq!(interp.host().transcript(), vec!["one", "two"]);
}

#[test]
fn test_define_in_a_class_scope_dispatches() {
    let interp = Interpreter::new();
    let number = interp.class_named("Number").unwrap();
    interp
        .eval_json_in(
            &serde_json::json!(["define:args:body:", "double:", ["x"], [["^", ["$x", "*", 2]]]]),
            &number,
        )
        .unwrap();
    assert!(number.lookup_method_locally(intern("double:")).is_some());
    assert_eq!(
        interp.eval_source(r#"[3, "double:", 21]"#).unwrap(),
        Value::Number(42.0)
    );
}

#[test]
fn test_define_answers_the_selector_symbol() {
    let interp = Interpreter::new();
    let number = interp.class_named("Number").unwrap();
    let result = interp
        .eval_json_in(
            &serde_json::json!(["define:args:body:", "double:", ["x"], [["^", ["$x", "*", 2]]]]),
            &number,
        )
        .unwrap();
    assert_eq!(result, Value::symbol("double:"));
}

#[test]
fn test_define_method_send_on_a_class() {
    assert_eq!(
        eval(
            r#"[["$Number", "defineMethod:args:body:", "twice", [], [["^", ["$self", "*", 2]]]], [21, "twice"]]"#
        ),
        Value::Number(42.0)
    );
}

#[test]
fn test_implicit_self_return() {
    assert_eq!(
        eval(r#"[["$Number", "defineMethod:args:body:", "yourself", [], []], [7, "yourself"]]"#),
        Value::Number(7.0)
    );
}

#[test]
fn test_non_local_return_exits_the_method() {
    // The block's ^ unwinds the whole activation: 123 never runs.
    assert_eq!(
        eval(
            r#"[["$Number", "defineMethod:args:body:", "bail", [], [[[[], "=>:", [["^", 99]]], "value"], 123]], [1, "bail"]]"#
        ),
        Value::Number(99.0)
    );
}

#[test]
fn test_non_local_return_targets_its_own_activation() {
    let interp = Interpreter::new();
    let scope = interp.new_scope();
    interp
        .eval_source_in(
            r#"["$Number", "defineMethod:args:body:", "inner", [], [[[[], "=>:", [["^", 1]]], "value"], 2]]"#,
            &scope,
        )
        .unwrap();
    interp
        .eval_source_in(
            r#"["$Number", "defineMethod:args:body:", "outer", [], [["n:", ["$self", "inner"]], ["^", [["$n"], "+", 10]]]]"#,
            &scope,
        )
        .unwrap();
    // inner's block unwinds inner only; outer keeps running.
    assert_eq!(
        interp.eval_source_in(r#"[5, "outer"]"#, &scope).unwrap(),
        Value::Number(11.0)
    );
}

#[test]
fn test_top_level_return_is_an_error() {
    let err = eval_err(r#"["^", 1]"#);
    assert!(err.to_string().contains("return outside"), "{err}");
}

#[test]
fn test_return_through_an_exited_method_is_an_error() {
    let err = eval_err(
        r#"[["$Number", "defineMethod:args:body:", "maker", [], [["^", [[], "=>:", [["^", 42]]]]]], ["b:", [1, "maker"]], ["$b", "value"]]"#,
    );
    assert!(err.to_string().contains("return escaped"), "{err}");
}

#[test]
fn test_method_arity_is_checked() {
    let err = eval_err(
        r#"[["$Number", "defineMethod:args:body:", "one:", ["a", "b"], []], [1, "one:", 2]]"#,
    );
    assert!(matches!(err, SonError::Argument(_)), "{err}");
}

#[test]
fn test_keyword_arity_mismatch_is_an_error() {
    let err = eval_err(r#"[1, "max:"]"#);
    assert!(matches!(err, SonError::Argument(_)), "{err}");
}

#[test]
fn test_message_not_understood() {
    let err = eval_err(r#"[1, "frobnicate"]"#);
    assert!(matches!(err, SonError::MessageNotUnderstood { .. }), "{err}");
}

#[test]
fn test_variable_not_found() {
    let err = eval_err(r#""$nope""#);
    assert!(matches!(err, SonError::VariableNotFound(_)), "{err}");
}

#[test]
fn test_while_true_stops_on_a_false_condition() {
    let interp = Interpreter::new();
    let result = interp
        .eval_source(
            r#"[[[], "=>:", [false]], "whileTrue:", [[], "=>:", [["$Transcript", "log:", "never"]]]]"#,
        )
        .unwrap();
    assert_eq!(result, Value::Null);
    assert!(interp.host().transcript().is_empty());
}

#[test]
fn test_while_true_propagates_returns_out_of_the_loop() {
    assert_eq!(
        eval(
            r#"[["$Number", "defineMethod:args:body:", "spin", [], [[[[], "=>:", [true]], "whileTrue:", [[], "=>:", [["^", 7]]]]]], [1, "spin"]]"#
        ),
        Value::Number(7.0)
    );
}

#[test]
fn test_while_true_condition_must_be_boolean() {
    let err = eval_err(r#"[[[], "=>:", [1]], "whileTrue:", [[], "=>:", []]]"#);
    assert!(matches!(err, SonError::Argument(_)), "{err}");
}

#[test]
fn test_if_nil_family() {
    assert_eq!(
        eval(r#"[null, "ifNil:", [[], "=>:", ["was nil"]]]"#),
        Value::string("was nil")
    );
    assert_eq!(
        eval(r#"[5, "ifNil:", [[], "=>:", ["was nil"]]]"#),
        Value::Number(5.0)
    );
    assert_eq!(
        eval(r#"[5, "ifNotNil:", [["v"], "=>:", [["$v"], "+", 1]]]"#),
        Value::Number(6.0)
    );
    assert_eq!(
        eval(r#"[null, "ifNotNil:", [["v"], "=>:", ["$v"]]]"#),
        Value::Null
    );
    assert_eq!(
        eval(r#"[null, "ifNil:ifNotNil:", [[], "=>:", ["a"]], [[], "=>:", ["b"]]]"#),
        Value::string("a")
    );
}

#[test]
fn test_equality_and_identity() {
    // Two object literals are equal but not the same object.
    assert_eq!(eval(r#"[{"a": 1}, "=", {"a": 1}]"#), Value::Bool(true));
    assert_eq!(eval(r#"[{"a": 1}, "==", {"a": 1}]"#), Value::Bool(false));
    assert_eq!(eval(r#"[{"a": 1}, "~~", {"a": 1}]"#), Value::Bool(true));
    // Numbers are immediates: identity is value identity.
    assert_eq!(eval(r#"[1, "==", 1]"#), Value::Bool(true));
    assert_eq!(eval(r#"[1, "~=", 2]"#), Value::Bool(true));
}

#[test]
fn test_print_string() {
    assert_eq!(eval(r#"[null, "printString"]"#), Value::string("nil"));
    assert_eq!(eval(r#"[42, "printString"]"#), Value::string("42"));
    assert_eq!(eval(r#"["hi", "printString"]"#), Value::string("\"hi\""));
    assert_eq!(eval(r#"[42, "asString"]"#), Value::string("42"));
}

#[test]
fn test_class_primitive() {
    assert_eq!(
        eval(r#"[[3, "class"], "printString"]"#),
        Value::string("Number")
    );
    // Class identity: the resolver answers the same environment instance.
    assert_eq!(
        eval(r#"[[3, "class"], "==", [4, "class"]]"#),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"[[3, "class"], "==", ["x", "class"]]"#),
        Value::Bool(false)
    );
}

#[test]
fn test_transcript_show() {
    let interp = Interpreter::new();
    let result = interp
        .eval_source(r#"["$Transcript", "show:", "hi"]"#)
        .unwrap();
    assert!(matches!(result, Value::Bridge(_)));
    assert_eq!(interp.host().transcript(), vec!["hi"]);
}

#[test]
fn test_scheduled_callbacks_run_in_delay_order() {
    let interp = Interpreter::new();
    interp
        .eval_source(
            r#"[
                ["$Transcript", "setTimeout:delay:", [[], "=>:", [["$Transcript", "log:", "later"]]], 10],
                ["$Transcript", "setTimeout:delay:", [[], "=>:", [["$Transcript", "log:", "sooner"]]], 5]
            ]"#,
        )
        .unwrap();
    // Nothing runs during the scheduling evaluation.
    assert_eq!(interp.host().pending_callbacks(), 2);
    assert!(interp.host().transcript().is_empty());

    assert_eq!(interp.run_scheduled(), 2);
    assert_eq!(interp.host().transcript(), vec!["sooner", "later"]);
    assert_eq!(interp.host().pending_callbacks(), 0);
}

#[test]
fn test_set_timeout_rejects_bad_delays() {
    let err = eval_err(r#"["$Transcript", "setTimeout:delay:", [[], "=>:", []], -1]"#);
    assert!(matches!(err, SonError::Argument(_)), "{err}");
    let err = eval_err(r#"["$Transcript", "setTimeout:delay:", [[], "=>:", []], 1.5]"#);
    assert!(matches!(err, SonError::Argument(_)), "{err}");
    let err = eval_err(r#"["$Transcript", "setTimeout:delay:", "not a block", 1]"#);
    assert!(matches!(err, SonError::Argument(_)), "{err}");
}

#[test]
fn test_returns_cannot_cross_the_asynchronous_boundary() {
    let interp = Interpreter::new();
    interp
        .eval_source(
            r#"[["$Number", "defineMethod:args:body:", "later", [], [["$Transcript", "setTimeout:delay:", [[], "=>:", [["^", 1]]], 0]]], [1, "later"]]"#,
        )
        .unwrap();
    assert_eq!(interp.run_scheduled(), 1);
    let transcript = interp.host().transcript();
    assert_eq!(transcript.len(), 1);
    assert!(
        transcript[0].contains("asynchronous boundary"),
        "{transcript:?}"
    );
}

#[test]
fn test_fetch_is_unimplemented() {
    let interp = Interpreter::new();
    let result = interp
        .eval_source(r#"["$Transcript", "fetch:options:", "http://example.com", {}]"#)
        .unwrap();
    assert_eq!(result, Value::Null);
    assert_eq!(
        interp.host().transcript(),
        vec!["fetch:options: is not implemented"]
    );
}

#[test]
fn test_custom_image_blobs() {
    let image = son_eval::image::default_image();
    let mut blob = image.as_object().unwrap().clone();
    blob.insert("Answer".to_string(), serde_json::json!(42));
    blob.insert(
        "Greeter".to_string(),
        serde_json::json!({"methods": {"greet": {"argNames": [], "body": ["^", "hello"]}}}),
    );

    let interp = Interpreter::from_image(&blob).unwrap();
    assert_eq!(
        interp.eval_source(r#""$Answer""#).unwrap(),
        Value::Number(42.0)
    );
    // A class table is a receiver like any other.
    assert_eq!(
        interp.eval_source(r#"["$Greeter", "greet"]"#).unwrap(),
        Value::string("hello")
    );
}

#[test]
fn test_env_is_first_class() {
    let interp = Interpreter::new();
    let result = interp.eval_source(r#""$env""#).unwrap();
    assert!(matches!(result, Value::Env(_)));
}

#[test]
fn test_repl_style_scopes_persist() {
    let interp = Interpreter::new();
    let session = interp.new_scope();
    interp.eval_source_in(r#"[["x:", 1]]"#, &session).unwrap();
    assert_eq!(
        interp.eval_source_in(r#""$x""#, &session).unwrap(),
        Value::Number(1.0)
    );
    // A fresh program scope does not see the session's bindings.
    assert!(interp.eval_source(r#""$x""#).is_err());
}
