//! Mapping runtime values to class tables, and method lookup.

use son_core::{Env, MethodImpl, SonError, Spur, Value};

/// The class table a value dispatches against.
///
/// Class names resolve through the given environment's chain; a missing
/// specific class falls back to `Object`. Environments used as values are
/// their own class. A missing `Object` is fatal — the image is unusable.
pub fn class_of(value: &Value, env: &Env) -> Result<Env, SonError> {
    let name = match value {
        Value::Env(e) => return Ok(e.clone()),
        Value::Null => "UndefinedObject",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Bool(_) => "Boolean",
        Value::Symbol(_) => "Symbol",
        Value::Block(_) => "BlockClosure",
        Value::Array(_) | Value::Object(_) | Value::Bridge(_) => "Object",
    };
    match env.get_str(name) {
        Some(Value::Env(class)) => Ok(class),
        _ => object_class(env),
    }
}

pub fn object_class(env: &Env) -> Result<Env, SonError> {
    match env.get_str("Object") {
        Some(Value::Env(class)) => Ok(class),
        _ => Err(SonError::eval("class Object is missing from the image")),
    }
}

/// Look a selector up on a class, falling back to `Object`'s table.
pub fn lookup_method(
    class: &Env,
    selector: Spur,
    env: &Env,
) -> Result<Option<MethodImpl>, SonError> {
    if let Some(found) = class.lookup_method_locally(selector) {
        return Ok(Some(found));
    }
    let object = object_class(env)?;
    if object.ptr_eq(class) {
        return Ok(None);
    }
    Ok(object.lookup_method_locally(selector))
}
