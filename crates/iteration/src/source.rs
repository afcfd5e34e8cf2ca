use async_trait::async_trait;
use relay_core::RelayResult;

/// 拉取式迭代源
///
/// The engine calls `has_next`/`next` until the source is exhausted or the
/// run stops, then always calls `close`.
#[async_trait]
pub trait PullSource: Send {
    async fn has_next(&mut self) -> RelayResult<bool>;

    /// The next raw item. Only called after `has_next` returned true.
    async fn next(&mut self) -> RelayResult<String>;

    async fn close(&mut self) -> RelayResult<()> {
        Ok(())
    }
}

/// Receives items from a [`PushSource`].
#[async_trait]
pub trait ItemSink: Send {
    /// Handles one item; `Ok(false)` asks the source to stop.
    async fn handle_item(&mut self, item: String) -> RelayResult<bool>;
}

/// 推送式迭代源，适用于只能单遍流式解析的输入
#[async_trait]
pub trait PushSource: Send {
    /// Feeds every item to `sink` until the input ends or the sink declines.
    async fn run(&mut self, sink: &mut dyn ItemSink) -> RelayResult<()>;
}

/// Either kind of source, as accepted by the iteration engine.
pub enum IterationSource {
    Pull(Box<dyn PullSource>),
    Push(Box<dyn PushSource>),
}

impl IterationSource {
    pub fn pull(source: impl PullSource + 'static) -> Self {
        IterationSource::Pull(Box::new(source))
    }

    pub fn push(source: impl PushSource + 'static) -> Self {
        IterationSource::Push(Box::new(source))
    }
}
