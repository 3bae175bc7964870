//! The tree-walking evaluator.
//!
//! `evaluate` consumes an AST node (a [`Value`]) and an environment and
//! produces a value or an [`Unwind`]. Return signals travel the `Err`
//! track so every frame propagates them with `?`; only the method
//! activation they target turns them back into values.

use std::rc::Rc;

use son_core::{
    intern, json, resolve, with_resolved, Block, Env, EvalResult, MethodImpl, SonError, SonMethod,
    Spur, Unwind, Value,
};

use crate::bridge::Host;
use crate::forms::{self, Form};
use crate::image;
use crate::{classes, primitives};

/// The interpreter holds the root environment and the host facilities.
pub struct Interpreter {
    root: Env,
    host: Host,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter over the built-in base image.
    pub fn new() -> Self {
        let blob = image::default_image();
        let blob = blob.as_object().expect("default image is an object");
        Self::from_image(blob).expect("default image installs cleanly")
    }

    /// An interpreter over a loaded base-environment blob.
    pub fn from_image(
        blob: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, SonError> {
        let root = Env::new();
        let host = Host::new();
        image::install_image(&root, blob, &host)?;
        Ok(Interpreter { root, host })
    }

    pub fn root(&self) -> &Env {
        &self.root
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// A fresh top-level scope under the root. The REPL keeps one alive
    /// across lines; `eval` uses a new one per program.
    pub fn new_scope(&self) -> Env {
        Env::with_parent(Rc::new(self.root.clone()))
    }

    /// The class table bound under `name` in the root, if any.
    pub fn class_named(&self, name: &str) -> Option<Env> {
        match self.root.get_str(name) {
            Some(Value::Env(class)) => Some(class),
            _ => None,
        }
    }

    pub fn eval(&self, expr: &Value) -> Result<Value, SonError> {
        self.eval_in(expr, &self.new_scope())
    }

    /// Evaluate in a caller-provided scope. An uncaught return signal
    /// surfaces as an error here.
    pub fn eval_in(&self, expr: &Value, env: &Env) -> Result<Value, SonError> {
        evaluate(expr, env).map_err(Unwind::into_error)
    }

    pub fn eval_json(&self, program: &serde_json::Value) -> Result<Value, SonError> {
        self.eval(&json::json_to_value(program))
    }

    pub fn eval_json_in(
        &self,
        program: &serde_json::Value,
        env: &Env,
    ) -> Result<Value, SonError> {
        self.eval_in(&json::json_to_value(program), env)
    }

    /// Parse a JSON source text and evaluate it.
    pub fn eval_source(&self, source: &str) -> Result<Value, SonError> {
        self.eval_source_in(source, &self.new_scope())
    }

    pub fn eval_source_in(&self, source: &str, env: &Env) -> Result<Value, SonError> {
        let program: serde_json::Value = serde_json::from_str(source)
            .map_err(|e| SonError::eval(format!("invalid SON source: {e}")))?;
        self.eval_json_in(&program, env)
    }

    /// Run host-scheduled callbacks. Returns how many ran.
    pub fn run_scheduled(&self) -> usize {
        self.host.run_scheduled()
    }
}

/// Evaluate one AST node.
pub fn evaluate(expr: &Value, env: &Env) -> EvalResult {
    match expr {
        Value::String(s) => match s.strip_prefix('$') {
            None => Ok(expr.clone()),
            Some("env") => Ok(Value::Env(env.clone())),
            Some(name) => env
                .get_str(name)
                .ok_or_else(|| SonError::VariableNotFound(name.to_string()).into()),
        },
        Value::Array(items) => eval_array(items, env),
        // Literals, symbols, and values that already went through
        // evaluation evaluate to themselves.
        other => Ok(other.clone()),
    }
}

fn eval_array(items: &[Value], env: &Env) -> EvalResult {
    match forms::classify(items)? {
        Form::Empty => Ok(Value::Null),

        Form::Return(expr) => {
            let value = evaluate(expr, env)?;
            if env.is_method_context() {
                Err(Unwind::LocalReturn(value))
            } else if let Some(home) = env.nearest_method_context() {
                Err(Unwind::NonLocalReturn { value, home })
            } else {
                Err(SonError::eval("return outside of a method").into())
            }
        }

        Form::MethodDef {
            selector,
            params,
            body,
        } => {
            let params = param_names(params)
                .ok_or_else(|| SonError::eval("malformed method definition: argNames must be an array of strings"))?;
            let selector = intern(selector);
            env.define_method(
                selector,
                MethodImpl::Son(Rc::new(SonMethod {
                    selector,
                    params,
                    body: body.clone(),
                })),
            );
            Ok(Value::Symbol(selector))
        }

        Form::Assignment { name, expr } => {
            let value = evaluate(expr, env)?;
            env.set_str(name, value.clone());
            Ok(value)
        }

        Form::Cascade { receiver, messages } => {
            let receiver = evaluate(receiver, env)?;
            let Value::Array(messages) = messages else {
                return Err(SonError::eval("malformed cascade: messages must be an array").into());
            };
            for message in messages.iter() {
                let (selector, args) = cascade_message(message)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(evaluate(arg, env)?);
                }
                send_message(&receiver, intern(selector), &evaluated, env)?;
            }
            Ok(receiver)
        }

        Form::BlockLiteral { params, body } => {
            let params = param_names(params)
                .ok_or_else(|| SonError::eval("malformed block: parameters must be an array of strings"))?;
            Ok(Value::Block(Rc::new(Block {
                params,
                body: body.clone(),
                lexical_scope: env.clone(),
                home_context: env.nearest_method_context(),
            })))
        }

        Form::Send {
            receiver,
            selector,
            args,
        } => {
            // defineMethod:args:body: on an environment installs a method;
            // its operands are taken literally, a body must not run here.
            if selector == forms::DEFINE_METHOD {
                let receiver = evaluate(receiver, env)?;
                return define_method_send(&receiver, args);
            }
            let receiver = evaluate(receiver, env)?;
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, env)?);
            }
            send_message(&receiver, intern(selector), &evaluated, env)
        }

        Form::Sequence(items) => {
            let mut result = Value::Null;
            for item in items {
                result = evaluate(item, env)?;
            }
            Ok(result)
        }
    }
}

/// A cascade message: `[selector, arg, ...]` with send arity rules.
fn cascade_message(message: &Value) -> Result<(&str, &[Value]), SonError> {
    let Value::Array(parts) = message else {
        return Err(SonError::eval("malformed cascade: each message must be an array"));
    };
    let Some(Value::String(selector)) = parts.first() else {
        return Err(SonError::eval("malformed cascade: message selector must be a string"));
    };
    let args = &parts[1..];
    let colons = selector.matches(':').count();
    let ok = if colons > 0 {
        args.len() == colons
    } else {
        args.len() <= 1
    };
    if !ok {
        return Err(SonError::argument(format!(
            "#{selector} expects {colons} argument(s), got {} in cascade",
            args.len()
        )));
    }
    Ok((selector.as_ref(), args))
}

fn param_names(params: &Value) -> Option<Vec<Spur>> {
    let Value::Array(items) = params else {
        return None;
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Some(intern(s)),
            _ => None,
        })
        .collect()
}

fn define_method_send(receiver: &Value, args: &[Value]) -> EvalResult {
    let Value::Env(target) = receiver else {
        return Err(SonError::argument(format!(
            "#defineMethod:args:body: requires an environment receiver, got {}",
            receiver.type_name()
        ))
        .into());
    };
    let Some(Value::String(selector)) = args.first() else {
        return Err(SonError::eval("malformed method definition: selector must be a non-empty string").into());
    };
    if selector.is_empty() {
        return Err(SonError::eval("malformed method definition: selector must be a non-empty string").into());
    }
    let params = param_names(&args[1])
        .ok_or_else(|| SonError::eval("malformed method definition: argNames must be an array of strings"))?;
    let selector = intern(selector);
    target.define_method(
        selector,
        MethodImpl::Son(Rc::new(SonMethod {
            selector,
            params,
            body: args[2].clone(),
        })),
    );
    Ok(Value::Symbol(selector))
}

/// Dispatch a message: bridge entries, then class lookup (primitive or
/// SON method), then the block `value` family, then does-not-understand.
pub fn send_message(receiver: &Value, selector: Spur, args: &[Value], env: &Env) -> EvalResult {
    if let Value::Bridge(bridge) = receiver {
        if let Some(entry) = bridge.get(selector) {
            return entry(receiver, args).map_err(Unwind::from);
        }
    }

    let class = classes::class_of(receiver, env)?;
    if let Some(method) = classes::lookup_method(&class, selector, env)? {
        return match method {
            MethodImpl::Primitive(p) => primitives::apply(p, receiver, selector, args, env),
            MethodImpl::Son(method) => invoke_method(&method, receiver, args, env),
        };
    }

    if let Value::Block(block) = receiver {
        if with_resolved(selector, forms::value_family_arity).is_some() {
            return invoke_block(block, args);
        }
    }

    Err(SonError::not_understood(receiver, selector).into())
}

/// Run a SON method body in a fresh activation.
fn invoke_method(method: &SonMethod, receiver: &Value, args: &[Value], env: &Env) -> EvalResult {
    if method.params.len() != args.len() {
        return Err(SonError::argument(format!(
            "#{} expects {} argument(s), got {}",
            resolve(method.selector),
            method.params.len(),
            args.len()
        ))
        .into());
    }
    let method_env = Env::method_context(Rc::new(env.clone()), receiver.clone());
    for (param, arg) in method.params.iter().zip(args) {
        method_env.set(*param, arg.clone());
    }
    match evaluate(&method.body, &method_env) {
        // Falling off the end answers the receiver.
        Ok(_) => Ok(receiver.clone()),
        Err(Unwind::LocalReturn(value)) => Ok(value),
        Err(Unwind::NonLocalReturn { value, home }) if home.ptr_eq(&method_env) => Ok(value),
        Err(other) => Err(other),
    }
}

/// Run a block body in a child of its captured scope.
///
/// Blocks answer their last statement; they have no local return, and a
/// non-local return passes through untouched toward its home activation.
pub fn invoke_block(block: &Rc<Block>, args: &[Value]) -> EvalResult {
    if block.params.len() != args.len() {
        return Err(SonError::argument(format!(
            "block expects {} argument(s), got {}",
            block.params.len(),
            args.len()
        ))
        .into());
    }
    let block_env = Env::with_parent(Rc::new(block.lexical_scope.clone()));
    for (param, arg) in block.params.iter().zip(args) {
        block_env.set(*param, arg.clone());
    }
    match evaluate(&block.body, &block_env) {
        Err(Unwind::LocalReturn(_)) => {
            Err(SonError::eval("local return from a block").into())
        }
        other => other,
    }
}
