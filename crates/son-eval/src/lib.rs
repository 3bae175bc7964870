//! The SON evaluator: a tree-walking interpreter over JSON ASTs.
//!
//! Programs are JSON trees ([`son_core::Value`] after conversion).
//! [`Interpreter`] owns a root environment materialised from a base
//! image and the host facilities behind the bridge.

pub mod bridge;
pub mod classes;
pub mod eval;
pub mod forms;
pub mod image;
pub mod primitives;

pub use bridge::Host;
pub use eval::{evaluate, invoke_block, send_message, Interpreter};
