use async_trait::async_trait;

use crate::models::{DispatchOutcome, DispatchRequest};

/// 单条目分发接口
///
/// The iteration engine hands every item (or block) to an implementation of
/// this trait. Implementations classify the result into exactly one outcome
/// and never panic on sender errors.
#[async_trait]
pub trait ItemDispatch: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome;
}
