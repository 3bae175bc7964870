//! Host facilities behind the bridge object.
//!
//! The bridge is the only channel from SON code to host side effects:
//! the transcript, scheduled callbacks, and (unimplemented) outbound
//! requests. Scheduling is cooperative — callbacks run only when the
//! host drains the queue between evaluations, never during one.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use son_core::{Block, Bridge, SonError, Unwind, Value};

use crate::eval::invoke_block;

struct ScheduledCall {
    delay_ms: u64,
    seq: u64,
    block: Rc<Block>,
}

/// Host state shared with the bridge's entries.
pub struct Host {
    transcript: Rc<RefCell<Vec<String>>>,
    timers: Rc<RefCell<Vec<ScheduledCall>>>,
    next_seq: Rc<Cell<u64>>,
}

impl Host {
    pub fn new() -> Self {
        Host {
            transcript: Rc::new(RefCell::new(Vec::new())),
            timers: Rc::new(RefCell::new(Vec::new())),
            next_seq: Rc::new(Cell::new(0)),
        }
    }

    /// A snapshot of the transcript lines.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.borrow().clone()
    }

    /// How many callbacks are waiting for the next drain.
    pub fn pending_callbacks(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Build the bridge value with its host entries installed.
    pub fn make_bridge(&self) -> Value {
        let mut bridge = Bridge::new();

        for selector in ["log:", "show:"] {
            let transcript = Rc::clone(&self.transcript);
            bridge.insert(selector, move |receiver, args| {
                if args.len() != 1 {
                    return Err(SonError::argument(format!(
                        "#{selector} expects 1 argument, got {}",
                        args.len()
                    )));
                }
                let line = match &args[0] {
                    Value::String(s) => s.to_string(),
                    other => other.print_string(),
                };
                tracing::info!(target: "transcript", "{line}");
                transcript.borrow_mut().push(line);
                Ok(receiver.clone())
            });
        }

        let timers = Rc::clone(&self.timers);
        let next_seq = Rc::clone(&self.next_seq);
        bridge.insert("setTimeout:delay:", move |receiver, args| {
            if args.len() != 2 {
                return Err(SonError::argument(format!(
                    "#setTimeout:delay: expects 2 arguments, got {}",
                    args.len()
                )));
            }
            let block = args[0].as_block().ok_or_else(|| {
                SonError::argument(format!(
                    "#setTimeout:delay: expects a block, got {}",
                    args[0].type_name()
                ))
            })?;
            let delay = args[1].as_number().ok_or_else(|| {
                SonError::argument(format!(
                    "#setTimeout:delay: expects a number of milliseconds, got {}",
                    args[1].type_name()
                ))
            })?;
            if delay.fract() != 0.0 || delay < 0.0 || !delay.is_finite() {
                return Err(SonError::argument(format!(
                    "#setTimeout:delay: delay must be a non-negative integer, got {delay}"
                )));
            }
            let seq = next_seq.get();
            next_seq.set(seq + 1);
            timers.borrow_mut().push(ScheduledCall {
                delay_ms: delay as u64,
                seq,
                block: Rc::clone(block),
            });
            Ok(receiver.clone())
        });

        let transcript = Rc::clone(&self.transcript);
        bridge.insert("fetch:options:", move |_receiver, args| {
            if args.len() != 2 {
                return Err(SonError::argument(format!(
                    "#fetch:options: expects 2 arguments, got {}",
                    args.len()
                )));
            }
            tracing::warn!("fetch:options: is not implemented on this host");
            transcript
                .borrow_mut()
                .push("fetch:options: is not implemented".to_string());
            Ok(Value::Null)
        });

        Value::Bridge(Rc::new(bridge))
    }

    /// Drain the callback queue in (delay, schedule) order, including
    /// callbacks scheduled by callbacks. A return signal or error
    /// escaping a callback is reported and dropped: returns cannot
    /// cross the asynchronous boundary.
    pub fn run_scheduled(&self) -> usize {
        let mut ran = 0;
        loop {
            let mut due: Vec<ScheduledCall> = self.timers.borrow_mut().drain(..).collect();
            if due.is_empty() {
                break;
            }
            due.sort_by_key(|call| (call.delay_ms, call.seq));
            for call in due {
                ran += 1;
                match invoke_block(&call.block, &[]) {
                    Ok(_) => {}
                    Err(Unwind::Error(e)) => self.report(format!("scheduled callback failed: {e}")),
                    Err(Unwind::LocalReturn(_)) | Err(Unwind::NonLocalReturn { .. }) => {
                        self.report(
                            "scheduled callback attempted a return across the asynchronous boundary"
                                .to_string(),
                        )
                    }
                }
            }
        }
        ran
    }

    fn report(&self, line: String) {
        tracing::error!(target: "transcript", "{line}");
        self.transcript.borrow_mut().push(line);
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
