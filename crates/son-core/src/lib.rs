pub mod error;
pub mod json;
pub mod value;

pub use error::{EvalResult, SonError, Unwind};
pub use value::{
    intern, resolve, with_resolved, Block, Bridge, Env, HostFn, MethodImpl, Primitive, SonMethod,
    Value,
};
pub use lasso::Spur;
