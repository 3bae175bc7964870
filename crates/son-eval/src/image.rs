//! Materialising a base-environment blob into a root scope.
//!
//! The blob is a key→JSON mapping. Three shapes are recognised:
//! the key `Bridge` (or any value carrying the `{"isBridge": true}`
//! sentinel) binds the host bridge; a value with a `methods` object
//! becomes a class table; anything else binds as plain data.

use std::rc::Rc;

use son_core::{intern, json, Env, MethodImpl, Primitive, SonError, SonMethod, Value};

use crate::bridge::Host;

pub fn install_image(
    root: &Env,
    blob: &serde_json::Map<String, serde_json::Value>,
    host: &Host,
) -> Result<(), SonError> {
    for (key, value) in blob {
        if key == "Bridge" || is_bridge_marker(value) {
            root.set_str(key, host.make_bridge());
            continue;
        }
        if let Some(methods) = class_methods(value) {
            let class = Env::class(key);
            for (selector, def) in methods {
                let method = method_from_json(selector, def)?;
                class.define_method(intern(selector), method);
            }
            root.set_str(key, Value::Env(class));
            continue;
        }
        root.set_str(key, json::json_to_value(value));
    }
    Ok(())
}

fn is_bridge_marker(value: &serde_json::Value) -> bool {
    value.get("isBridge").and_then(|b| b.as_bool()) == Some(true)
}

fn class_methods(value: &serde_json::Value) -> Option<&serde_json::Map<String, serde_json::Value>> {
    value.get("methods")?.as_object()
}

/// A method entry: `{"argNames": [...], "body": ...}` for SON bodies,
/// `{"primitive": tag}` for primitives.
fn method_from_json(selector: &str, def: &serde_json::Value) -> Result<MethodImpl, SonError> {
    let Some(obj) = def.as_object() else {
        return Err(SonError::eval(format!(
            "malformed method definition for #{selector}"
        )));
    };
    if let Some(tag) = obj.get("primitive").and_then(|t| t.as_str()) {
        return Primitive::from_tag(tag)
            .map(MethodImpl::Primitive)
            .ok_or_else(|| SonError::eval(format!("unknown primitive tag: {tag}")));
    }
    let params = obj
        .get("argNames")
        .and_then(|names| names.as_array())
        .and_then(|names| {
            names
                .iter()
                .map(|n| n.as_str().map(intern))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| {
            SonError::eval(format!(
                "malformed method definition for #{selector}: argNames must be an array of strings"
            ))
        })?;
    let body = obj
        .get("body")
        .map(json::json_to_value)
        .ok_or_else(|| {
            SonError::eval(format!(
                "malformed method definition for #{selector}: missing body"
            ))
        })?;
    Ok(MethodImpl::Son(Rc::new(SonMethod {
        selector: intern(selector),
        params,
        body,
    })))
}

/// The built-in base image: the standard class tables wired to the
/// primitive table, and the bridge bound as `Transcript`.
///
/// The persistence service seeds its store from this same blob, so a
/// fresh database and a fresh in-process interpreter agree.
pub fn default_image() -> serde_json::Value {
    serde_json::json!({
        "Object": {"methods": {
            "=": {"primitive": "ObjectEquals"},
            "~=": {"primitive": "ObjectNotEquals"},
            "==": {"primitive": "ObjectIdentical"},
            "~~": {"primitive": "ObjectNotIdentical"},
            "class": {"primitive": "ObjectClass"},
            "printString": {"primitive": "ObjectPrintString"},
            "ifNil:": {"primitive": "NullIfNil"},
            "ifNotNil:": {"primitive": "NullIfNotNil"},
            "ifNil:ifNotNil:": {"primitive": "NullIfNilIfNotNil"}
        }},
        "Number": {"methods": {
            "+": {"primitive": "NumberAdd"},
            "-": {"primitive": "NumberSubtract"},
            "*": {"primitive": "NumberMultiply"},
            "/": {"primitive": "NumberDivide"},
            "<": {"primitive": "NumberLess"},
            ">": {"primitive": "NumberGreater"},
            "<=": {"primitive": "NumberLessOrEqual"},
            ">=": {"primitive": "NumberGreaterOrEqual"},
            "=": {"primitive": "NumberEquals"},
            "asString": {"primitive": "NumberToString"}
        }},
        "String": {"methods": {
            ",": {"primitive": "StringConcat"},
            "size": {"primitive": "StringLength"},
            "=": {"primitive": "StringEquals"}
        }},
        "Symbol": {"methods": {
            "asString": {"primitive": "SymbolToString"},
            "=": {"primitive": "SymbolEquals"}
        }},
        "Boolean": {"methods": {
            "&": {"primitive": "BooleanAnd"},
            "|": {"primitive": "BooleanOr"},
            "not": {"primitive": "BooleanNot"},
            "ifTrue:": {"primitive": "BooleanIfTrue"},
            "ifFalse:": {"primitive": "BooleanIfFalse"},
            "ifTrue:ifFalse:": {"primitive": "BooleanIfTrueIfFalse"}
        }},
        "UndefinedObject": {"methods": {}},
        "BlockClosure": {"methods": {
            "whileTrue:": {"primitive": "BlockWhileTrue"}
        }},
        "Transcript": {"isBridge": true}
    })
}
