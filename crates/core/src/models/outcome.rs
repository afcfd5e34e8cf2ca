use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, RelayResult};

/// Result of one dispatch, produced by exactly one attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
    Success(String),
    TimedOut(String),
    Failed(RelayError),
    Interrupted,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, DispatchOutcome::TimedOut(_))
    }

    /// Timeouts and failures are the outcomes a retry may fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchOutcome::TimedOut(_) => true,
            DispatchOutcome::Failed(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn exit_state(&self) -> ExitState {
        match self {
            DispatchOutcome::Success(_) => ExitState::Success,
            DispatchOutcome::TimedOut(_) => ExitState::Timeout,
            DispatchOutcome::Failed(_) => ExitState::Exception,
            DispatchOutcome::Interrupted => ExitState::Interrupt,
        }
    }

    /// Classifies a sender or listener error into an outcome.
    pub fn from_error(error: RelayError) -> Self {
        match error {
            RelayError::Timeout(reason) => DispatchOutcome::TimedOut(reason),
            RelayError::Interrupted(_) => DispatchOutcome::Interrupted,
            other => DispatchOutcome::Failed(other),
        }
    }

    pub fn into_result(self) -> RelayResult<String> {
        match self {
            DispatchOutcome::Success(reply) => Ok(reply),
            DispatchOutcome::TimedOut(reason) => Err(RelayError::Timeout(reason)),
            DispatchOutcome::Failed(error) => Err(error),
            DispatchOutcome::Interrupted => {
                Err(RelayError::interrupted("dispatch was interrupted"))
            }
        }
    }
}

impl From<RelayResult<String>> for DispatchOutcome {
    fn from(result: RelayResult<String>) -> Self {
        match result {
            Ok(reply) => DispatchOutcome::Success(reply),
            Err(e) => DispatchOutcome::from_error(e),
        }
    }
}

/// Exit state of a single physical attempt, recorded for presumed timeouts and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitState {
    Success,
    Timeout,
    Exception,
    PresumedTimeout,
    Interrupt,
}

impl ExitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitState::Success => "success",
            ExitState::Timeout => "timeout",
            ExitState::Exception => "exception",
            ExitState::PresumedTimeout => "presumedTimeout",
            ExitState::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 调用方根据分发结果选择的终止出口
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forward {
    Success(String),
    Timeout(String),
    PresumedTimeout(String),
    Exception(String),
    Interrupt,
    IllegalResult(String),
}

impl Forward {
    pub fn name(&self) -> &'static str {
        match self {
            Forward::Success(_) => "success",
            Forward::Timeout(_) => "timeout",
            Forward::PresumedTimeout(_) => "presumedTimeout",
            Forward::Exception(_) => "exception",
            Forward::Interrupt => "interrupt",
            Forward::IllegalResult(_) => "illegalResult",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Forward::Success(m)
            | Forward::Timeout(m)
            | Forward::PresumedTimeout(m)
            | Forward::Exception(m)
            | Forward::IllegalResult(m) => Some(m),
            Forward::Interrupt => None,
        }
    }
}
