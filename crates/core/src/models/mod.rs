pub mod iteration;
pub mod message;
pub mod outcome;
pub mod retry_state;

pub use iteration::{
    Block, Fragment, FragmentBody, IterationItem, IterationReport, IterationResult, StopReason,
};
pub use message::{DispatchContext, DispatchRequest, CORRELATION_ID_KEY, MESSAGE_ID_KEY};
pub use outcome::{DispatchOutcome, ExitState, Forward};
pub use retry_state::{RetryPolicy, RetryState, MAX_RETRY_INTERVAL, MIN_RETRY_INTERVAL};
