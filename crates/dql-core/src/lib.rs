pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, Sleeper, SystemClock, TokioSleeper};
pub use error::{ErrorKind, ExecutionError, RequestError, Result};
pub use types::*;
