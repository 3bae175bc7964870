//! The closed table of host-implemented operations.
//!
//! Every primitive checks its own arity and operand kinds; control
//! primitives invoke blocks through the ordinary block protocol and let
//! return signals pass untouched.

use std::rc::Rc;

use son_core::{resolve, Block, Env, EvalResult, Primitive, SonError, Spur, Unwind, Value};

use crate::classes;
use crate::eval::invoke_block;

pub fn apply(
    primitive: Primitive,
    receiver: &Value,
    selector: Spur,
    args: &[Value],
    env: &Env,
) -> EvalResult {
    use Primitive::*;
    match primitive {
        NumberAdd => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Number(a + b))
        }
        NumberSubtract => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Number(a - b))
        }
        NumberMultiply => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Number(a * b))
        }
        NumberDivide => {
            let (a, b) = number_pair(receiver, args, selector)?;
            if b == 0.0 {
                return Err(SonError::eval("division by zero").into());
            }
            Ok(Value::Number(a / b))
        }
        NumberLess => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Bool(a < b))
        }
        NumberGreater => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Bool(a > b))
        }
        NumberLessOrEqual => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Bool(a <= b))
        }
        NumberGreaterOrEqual => {
            let (a, b) = number_pair(receiver, args, selector)?;
            Ok(Value::Bool(a >= b))
        }
        NumberEquals => {
            expect_arity(selector, args, 1)?;
            number_of(receiver, selector)?;
            Ok(Value::Bool(receiver == &args[0]))
        }
        NumberToString => {
            expect_arity(selector, args, 0)?;
            let n = number_of(receiver, selector)?;
            Ok(Value::string(Value::Number(n).to_string()))
        }

        ObjectEquals => {
            expect_arity(selector, args, 1)?;
            Ok(Value::Bool(receiver == &args[0]))
        }
        ObjectNotEquals => {
            expect_arity(selector, args, 1)?;
            Ok(Value::Bool(receiver != &args[0]))
        }
        ObjectIdentical => {
            expect_arity(selector, args, 1)?;
            Ok(Value::Bool(receiver.identical(&args[0])))
        }
        ObjectNotIdentical => {
            expect_arity(selector, args, 1)?;
            Ok(Value::Bool(!receiver.identical(&args[0])))
        }
        ObjectClass => {
            expect_arity(selector, args, 0)?;
            Ok(Value::Env(classes::class_of(receiver, env)?))
        }
        ObjectPrintString => {
            expect_arity(selector, args, 0)?;
            Ok(Value::string(receiver.print_string()))
        }

        BooleanAnd => {
            let (a, b) = boolean_pair(receiver, args, selector)?;
            Ok(Value::Bool(a && b))
        }
        BooleanOr => {
            let (a, b) = boolean_pair(receiver, args, selector)?;
            Ok(Value::Bool(a || b))
        }
        BooleanNot => {
            expect_arity(selector, args, 0)?;
            Ok(Value::Bool(!boolean_of(receiver, selector)?))
        }
        BooleanIfTrue => {
            expect_arity(selector, args, 1)?;
            let condition = boolean_of(receiver, selector)?;
            let block = block_of(&args[0], selector)?;
            if condition {
                invoke_block(block, &[])
            } else {
                Ok(Value::Null)
            }
        }
        BooleanIfFalse => {
            expect_arity(selector, args, 1)?;
            let condition = boolean_of(receiver, selector)?;
            let block = block_of(&args[0], selector)?;
            if condition {
                Ok(Value::Null)
            } else {
                invoke_block(block, &[])
            }
        }
        BooleanIfTrueIfFalse => {
            expect_arity(selector, args, 2)?;
            let condition = boolean_of(receiver, selector)?;
            let on_true = block_of(&args[0], selector)?;
            let on_false = block_of(&args[1], selector)?;
            if condition {
                invoke_block(on_true, &[])
            } else {
                invoke_block(on_false, &[])
            }
        }

        StringConcat => {
            expect_arity(selector, args, 1)?;
            let a = string_of(receiver, selector)?;
            let b = string_of(&args[0], selector)?;
            Ok(Value::string(format!("{a}{b}")))
        }
        StringLength => {
            expect_arity(selector, args, 0)?;
            let s = string_of(receiver, selector)?;
            // UTF-16 code units, matching the data model's string type.
            Ok(Value::Number(s.encode_utf16().count() as f64))
        }
        StringEquals => {
            expect_arity(selector, args, 1)?;
            string_of(receiver, selector)?;
            Ok(Value::Bool(receiver == &args[0]))
        }

        SymbolToString => {
            expect_arity(selector, args, 0)?;
            let name = symbol_of(receiver, selector)?;
            Ok(Value::string(resolve(name)))
        }
        SymbolEquals => {
            expect_arity(selector, args, 1)?;
            symbol_of(receiver, selector)?;
            Ok(Value::Bool(receiver == &args[0]))
        }

        NullIfNil => {
            expect_arity(selector, args, 1)?;
            let block = block_of(&args[0], selector)?;
            if receiver.is_null() {
                invoke_block(block, &[])
            } else {
                Ok(receiver.clone())
            }
        }
        NullIfNotNil => {
            expect_arity(selector, args, 1)?;
            let block = block_of(&args[0], selector)?;
            if receiver.is_null() {
                Ok(Value::Null)
            } else {
                invoke_not_nil(block, receiver, selector)
            }
        }
        NullIfNilIfNotNil => {
            expect_arity(selector, args, 2)?;
            let on_nil = block_of(&args[0], selector)?;
            let on_value = block_of(&args[1], selector)?;
            if receiver.is_null() {
                invoke_block(on_nil, &[])
            } else {
                invoke_not_nil(on_value, receiver, selector)
            }
        }

        BlockWhileTrue => {
            expect_arity(selector, args, 1)?;
            let condition = block_of(receiver, selector)?;
            let body = block_of(&args[0], selector)?;
            loop {
                match invoke_block(condition, &[])? {
                    Value::Bool(true) => {
                        invoke_block(body, &[])?;
                    }
                    Value::Bool(false) => return Ok(Value::Null),
                    other => {
                        return Err(SonError::argument(format!(
                            "#whileTrue: condition must answer a boolean, got {}",
                            other.type_name()
                        ))
                        .into())
                    }
                }
            }
        }
    }
}

/// A one-parameter block receives the non-nil value; a zero-parameter
/// block is evaluated plain.
fn invoke_not_nil(block: &Rc<Block>, receiver: &Value, selector: Spur) -> EvalResult {
    match block.params.len() {
        0 => invoke_block(block, &[]),
        1 => invoke_block(block, &[receiver.clone()]),
        n => Err(SonError::argument(format!(
            "#{} block takes at most one parameter, got {n}",
            resolve(selector)
        ))
        .into()),
    }
}

fn expect_arity(selector: Spur, args: &[Value], expected: usize) -> Result<(), Unwind> {
    if args.len() != expected {
        return Err(SonError::argument(format!(
            "#{} expects {expected} argument(s), got {}",
            resolve(selector),
            args.len()
        ))
        .into());
    }
    Ok(())
}

fn number_of(value: &Value, selector: Spur) -> Result<f64, Unwind> {
    value.as_number().ok_or_else(|| {
        SonError::argument(format!(
            "#{} expects a number, got {}",
            resolve(selector),
            value.type_name()
        ))
        .into()
    })
}

fn number_pair(receiver: &Value, args: &[Value], selector: Spur) -> Result<(f64, f64), Unwind> {
    expect_arity(selector, args, 1)?;
    Ok((number_of(receiver, selector)?, number_of(&args[0], selector)?))
}

fn boolean_of(value: &Value, selector: Spur) -> Result<bool, Unwind> {
    value.as_bool().ok_or_else(|| {
        SonError::argument(format!(
            "#{} expects a boolean, got {}",
            resolve(selector),
            value.type_name()
        ))
        .into()
    })
}

fn boolean_pair(receiver: &Value, args: &[Value], selector: Spur) -> Result<(bool, bool), Unwind> {
    expect_arity(selector, args, 1)?;
    Ok((
        boolean_of(receiver, selector)?,
        boolean_of(&args[0], selector)?,
    ))
}

fn string_of<'a>(value: &'a Value, selector: Spur) -> Result<&'a str, Unwind> {
    value.as_str().ok_or_else(|| {
        SonError::argument(format!(
            "#{} expects a string, got {}",
            resolve(selector),
            value.type_name()
        ))
        .into()
    })
}

fn symbol_of(value: &Value, selector: Spur) -> Result<Spur, Unwind> {
    match value {
        Value::Symbol(s) => Ok(*s),
        other => Err(SonError::argument(format!(
            "#{} expects a symbol, got {}",
            resolve(selector),
            other.type_name()
        ))
        .into()),
    }
}

fn block_of<'a>(value: &'a Value, selector: Spur) -> Result<&'a Rc<Block>, Unwind> {
    value.as_block().ok_or_else(|| {
        SonError::argument(format!(
            "#{} expects a block, got {}",
            resolve(selector),
            value.type_name()
        ))
        .into()
    })
}
