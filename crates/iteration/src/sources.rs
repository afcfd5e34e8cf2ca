use std::collections::VecDeque;

use async_trait::async_trait;
use relay_core::{RelayError, RelayResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::source::{ItemSink, PullSource, PushSource};

/// Pull source over an in-memory list of items.
#[derive(Debug, Default, Clone)]
pub struct VecSource {
    items: VecDeque<String>,
    closed: bool,
}

impl VecSource {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl PullSource for VecSource {
    async fn has_next(&mut self) -> RelayResult<bool> {
        Ok(!self.closed && !self.items.is_empty())
    }

    async fn next(&mut self) -> RelayResult<String> {
        self.items
            .pop_front()
            .ok_or_else(|| RelayError::MalformedInput("no more items".to_string()))
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.closed = true;
        self.items.clear();
        Ok(())
    }
}

/// 按行拆分文本的迭代源，忽略末尾空行
#[derive(Debug, Clone)]
pub struct LineSource {
    inner: VecSource,
}

impl LineSource {
    pub fn new(text: &str) -> Self {
        Self {
            inner: VecSource::new(text.lines()),
        }
    }
}

#[async_trait]
impl PullSource for LineSource {
    async fn has_next(&mut self) -> RelayResult<bool> {
        self.inner.has_next().await
    }

    async fn next(&mut self) -> RelayResult<String> {
        self.inner.next().await
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.inner.close().await
    }
}

/// Splits text on a configurable delimiter. A trailing delimiter does not
/// produce an empty last item.
#[derive(Debug, Clone)]
pub struct DelimitedSource {
    inner: VecSource,
}

impl DelimitedSource {
    pub fn new(text: &str, delimiter: &str) -> RelayResult<Self> {
        if delimiter.is_empty() {
            return Err(RelayError::Configuration(
                "delimiter must not be empty".to_string(),
            ));
        }
        let mut parts: Vec<&str> = text.split(delimiter).collect();
        if parts.last().is_some_and(|last| last.is_empty()) {
            parts.pop();
        }
        Ok(Self {
            inner: VecSource::new(parts),
        })
    }
}

#[async_trait]
impl PullSource for DelimitedSource {
    async fn has_next(&mut self) -> RelayResult<bool> {
        self.inner.has_next().await
    }

    async fn next(&mut self) -> RelayResult<String> {
        self.inner.next().await
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.inner.close().await
    }
}

/// Push source streaming lines from any buffered async reader.
pub struct ReaderLineSource<R> {
    reader: R,
}

impl<R> ReaderLineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> PushSource for ReaderLineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn run(&mut self, sink: &mut dyn ItemSink) -> RelayResult<()> {
        let mut lines = (&mut self.reader).lines();
        let mut line_no = 0usize;
        loop {
            let line = lines.next_line().await.map_err(|e| {
                RelayError::MalformedInput(format!("cannot read line {}: {e}", line_no + 1))
            })?;
            let Some(line) = line else {
                break;
            };
            line_no += 1;
            if !sink.handle_item(line).await? {
                debug!("迭代在第 {} 行后停止读取", line_no);
                break;
            }
        }
        Ok(())
    }
}
