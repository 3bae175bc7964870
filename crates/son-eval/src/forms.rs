//! Classification of array nodes.
//!
//! An array is a sequence unless its shape says otherwise. The reserved
//! selectors (`^`, `define:args:body:`, `cascade:`, `=>:`) are recognised
//! by position and are never user messages there; an assignment selector
//! has exactly one colon, at the end; keyword sends must supply exactly
//! one argument per colon — a mismatch is an error, never a silent
//! fallback to a sequence.

use son_core::{SonError, Value};

pub const RETURN: &str = "^";
pub const METHOD_DEF: &str = "define:args:body:";
pub const CASCADE: &str = "cascade:";
pub const BLOCK: &str = "=>:";

/// The selector an `Env` receiver accepts for live method installation.
pub const DEFINE_METHOD: &str = "defineMethod:args:body:";

#[derive(Debug)]
pub enum Form<'a> {
    Empty,
    Return(&'a Value),
    MethodDef {
        selector: &'a str,
        params: &'a Value,
        body: &'a Value,
    },
    Assignment {
        name: &'a str,
        expr: &'a Value,
    },
    Cascade {
        receiver: &'a Value,
        messages: &'a Value,
    },
    BlockLiteral {
        params: &'a Value,
        body: &'a Value,
    },
    Send {
        receiver: &'a Value,
        selector: &'a str,
        args: &'a [Value],
    },
    Sequence(&'a [Value]),
}

fn as_selector(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn is_assignment_selector(s: &str) -> bool {
    s.len() > 1 && s.ends_with(':') && s.matches(':').count() == 1
}

pub fn classify(items: &[Value]) -> Result<Form<'_>, SonError> {
    if items.is_empty() {
        return Ok(Form::Empty);
    }

    match as_selector(&items[0]) {
        Some(RETURN) => {
            if items.len() != 2 {
                return Err(SonError::eval("malformed return: expected [\"^\", expr]"));
            }
            return Ok(Form::Return(&items[1]));
        }
        Some(METHOD_DEF) => {
            if items.len() != 4 {
                return Err(SonError::eval(
                    "malformed method definition: expected [\"define:args:body:\", selector, argNames, body]",
                ));
            }
            let selector = as_selector(&items[1])
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    SonError::eval("malformed method definition: selector must be a non-empty string")
                })?;
            return Ok(Form::MethodDef {
                selector,
                params: &items[2],
                body: &items[3],
            });
        }
        _ => {}
    }

    if items.len() == 3 {
        match as_selector(&items[1]) {
            Some(BLOCK) => {
                return Ok(Form::BlockLiteral {
                    params: &items[0],
                    body: &items[2],
                })
            }
            Some(CASCADE) => {
                return Ok(Form::Cascade {
                    receiver: &items[0],
                    messages: &items[2],
                })
            }
            _ => {}
        }
    }

    if items.len() == 2 {
        if let Some(s) = as_selector(&items[0]) {
            if is_assignment_selector(s) {
                return Ok(Form::Assignment {
                    name: &s[..s.len() - 1],
                    expr: &items[1],
                });
            }
        }
    }

    if items.len() >= 2 {
        if let Some(selector) = as_selector(&items[1]) {
            let colons = selector.matches(':').count();
            if colons > 0 {
                let args = &items[2..];
                if args.len() != colons {
                    return Err(SonError::argument(format!(
                        "#{selector} expects {colons} argument(s), got {}",
                        args.len()
                    )));
                }
                return Ok(Form::Send {
                    receiver: &items[0],
                    selector,
                    args,
                });
            }
            if !selector.is_empty() && items.len() <= 3 {
                // Unary (no arguments) or binary (one argument) send.
                return Ok(Form::Send {
                    receiver: &items[0],
                    selector,
                    args: &items[2..],
                });
            }
        }
    }

    Ok(Form::Sequence(items))
}

/// Arity of a `value` / `value:` / `value:value:` … selector, or `None`
/// if the selector is not in the family.
pub fn value_family_arity(selector: &str) -> Option<usize> {
    if selector == "value" {
        return Some(0);
    }
    let mut count = 0;
    let mut rest = selector;
    while let Some(r) = rest.strip_prefix("value:") {
        count += 1;
        rest = r;
    }
    if rest.is_empty() && count > 0 {
        Some(count)
    } else {
        None
    }
}
