use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    ConfigValidator, DispatchContext, DispatchOutcome, DispatchRequest, Fragment, FragmentBody,
    InterruptToken, ItemDispatch, IterationConfig, IterationItem, IterationReport,
    IterationResult, RelayError, RelayResult, ResultPredicate, StopReason, Transformer,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::block::{BlockAssembler, BlockMode};
use crate::dedup::Deduplicator;
use crate::gate::CompletionGate;
use crate::source::{ItemSink, IterationSource, PullSource};

/// 迭代引擎
///
/// Feeds the items of a source, one by one or in blocks, to an
/// [`ItemDispatch`] and assembles the per-item results. Dispatches run
/// in-line by default; in parallel mode they are spawned on a bounded pool
/// and collected in submission order once all of them have completed.
pub struct IterationEngine {
    config: IterationConfig,
    dispatch: Arc<dyn ItemDispatch>,
    preprocessor: Option<Arc<dyn Transformer>>,
    stop_condition: Option<Arc<dyn ResultPredicate>>,
    interrupt: InterruptToken,
}

impl IterationEngine {
    pub fn builder(config: IterationConfig, dispatch: Arc<dyn ItemDispatch>) -> IterationEngineBuilder {
        IterationEngineBuilder {
            config,
            dispatch,
            preprocessor: None,
            stop_condition: None,
            interrupt: InterruptToken::never(),
        }
    }

    pub fn config(&self) -> &IterationConfig {
        &self.config
    }

    /// Iterates `source`, dispatching every item with a context derived from `context`.
    ///
    /// The source is closed before returning, whatever the outcome. Close
    /// errors are logged only.
    #[instrument(skip_all, fields(dispatcher = %self.dispatch.name()))]
    pub async fn run(
        &self,
        source: IterationSource,
        context: DispatchContext,
    ) -> RelayResult<IterationReport> {
        info!(
            "开始迭代, parallel [{}] collectResults [{}] maxItems [{}]",
            self.config.parallel, self.config.collect_results, self.config.max_items
        );

        let mut run = IterationRun::new(self, context);
        let driven = match source {
            IterationSource::Pull(mut source) => {
                let driven = run.drive(source.as_mut()).await;
                if let Err(e) = source.close().await {
                    warn!("关闭迭代源失败: {}", e);
                }
                driven
            }
            IterationSource::Push(mut source) => source.run(&mut run).await,
        };

        let report = match driven {
            Ok(()) => run.finish().await,
            Err(e) => Err(e),
        };

        match report {
            Ok(report) => {
                info!(
                    "迭代完成, 共处理 {} 个条目, 出口 [{}]",
                    report.count(),
                    report.forward_name()
                );
                Ok(report)
            }
            Err(e) => {
                run.abort_pending();
                error!("迭代在第 {} 个条目处中止: {}", run.count, e);
                Err(e)
            }
        }
    }

    fn classify(&self, index: usize, outcome: DispatchOutcome) -> RelayResult<FragmentBody> {
        match outcome {
            DispatchOutcome::Success(result) => Ok(FragmentBody::Result(result)),
            DispatchOutcome::Interrupted => Err(RelayError::interrupted(format!(
                "item [{index}] was interrupted"
            ))),
            DispatchOutcome::TimedOut(reason) if self.config.ignore_exceptions => {
                let failure = RelayError::PartialItemFailure {
                    index,
                    message: reason.clone(),
                };
                warn!("忽略超时: {}", failure);
                Ok(FragmentBody::Timeout(reason))
            }
            DispatchOutcome::TimedOut(reason) => Err(RelayError::Timeout(reason)),
            DispatchOutcome::Failed(e) if self.config.ignore_exceptions => {
                let message = e.detail();
                let failure = RelayError::PartialItemFailure {
                    index,
                    message: message.clone(),
                };
                warn!("忽略异常: {}", failure);
                Ok(FragmentBody::Exception(message))
            }
            DispatchOutcome::Failed(e) => Err(e),
        }
    }

    fn fragment(&self, index: usize, input: &str, body: FragmentBody) -> Fragment {
        let fragment = Fragment::new(index, body);
        if self.config.add_input_to_result {
            fragment.with_input(input)
        } else {
            fragment
        }
    }
}

/// Builder for [`IterationEngine`].
pub struct IterationEngineBuilder {
    config: IterationConfig,
    dispatch: Arc<dyn ItemDispatch>,
    preprocessor: Option<Arc<dyn Transformer>>,
    stop_condition: Option<Arc<dyn ResultPredicate>>,
    interrupt: InterruptToken,
}

impl IterationEngineBuilder {
    /// Transform applied to every item or block before it is dispatched.
    pub fn with_preprocessor(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.preprocessor = Some(transformer);
        self
    }

    /// Predicate over each item result; true ends the run after that item.
    pub fn with_stop_condition(mut self, condition: Arc<dyn ResultPredicate>) -> Self {
        self.stop_condition = Some(condition);
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn build(self) -> RelayResult<IterationEngine> {
        self.config.validate()?;
        if self.config.parallel && self.stop_condition.is_some() {
            warn!("并行模式下不评估停止条件, 只有 maxItems 生效");
        }
        Ok(IterationEngine {
            config: self.config,
            dispatch: self.dispatch,
            preprocessor: self.preprocessor,
            stop_condition: self.stop_condition,
            interrupt: self.interrupt,
        })
    }
}

struct PendingDispatch {
    index: usize,
    input: String,
    handle: JoinHandle<DispatchOutcome>,
}

/// State of one run; also the sink push sources feed.
struct IterationRun<'a> {
    engine: &'a IterationEngine,
    context: DispatchContext,
    dedup: Deduplicator,
    assembler: Option<BlockAssembler>,
    items_seen: usize,
    count: usize,
    fragments: Vec<Fragment>,
    pool: Option<Arc<Semaphore>>,
    gate: Arc<CompletionGate>,
    pending: Vec<PendingDispatch>,
    stop_reason: Option<StopReason>,
}

impl<'a> IterationRun<'a> {
    fn new(engine: &'a IterationEngine, mut context: DispatchContext) -> Self {
        let config = &engine.config;
        if let Some(key) = &config.item_no_key {
            context.insert(key.clone(), "0");
        }
        let pool = config
            .parallel
            .then(|| Arc::new(Semaphore::new(config.pool_size())));

        Self {
            engine,
            context,
            dedup: Deduplicator::new(config.remove_duplicates),
            assembler: BlockMode::from_config(config).map(BlockAssembler::new),
            items_seen: 0,
            count: 0,
            fragments: Vec::new(),
            pool,
            gate: CompletionGate::new(),
            pending: Vec::new(),
            stop_reason: None,
        }
    }

    async fn drive(&mut self, source: &mut dyn PullSource) -> RelayResult<()> {
        while self.stop_reason.is_none() && source.has_next().await? {
            let item = source.next().await?;
            if !self.handle_item(item).await? {
                break;
            }
        }
        Ok(())
    }

    /// Dispatches one item or assembled block. Returns whether to continue.
    async fn process(&mut self, raw: String) -> RelayResult<bool> {
        let engine = self.engine;
        let config = &engine.config;

        self.count += 1;
        let mut unit = IterationItem::new(self.count, raw);
        if let Some(key) = &config.item_no_key {
            self.context.insert(key.clone(), unit.index.to_string());
        }

        match &engine.preprocessor {
            Some(transformer) => {
                let transformed = transformer
                    .transform(&unit.raw_value, self.context.values())
                    .await
                    .map_err(|e| {
                        RelayError::Transform(format!(
                            "cannot transform item [{}]: {}",
                            unit.index,
                            e.detail()
                        ))
                    })?;
                debug!(
                    "iteration [{}] transformed item [{}] into [{}]",
                    unit.index, unit.raw_value, transformed
                );
                unit.transformed_value = Some(transformed);
            }
            None => debug!("iteration [{}] item [{}]", unit.index, unit.raw_value),
        }

        let request = DispatchRequest::new(unit.value()).with_context(self.context.derive());

        if let Some(pool) = self.pool.clone() {
            self.submit(pool, unit, request).await?;
            return Ok(self.within_max_items());
        }

        let outcome = engine.dispatch.dispatch(request).await;
        let body = engine.classify(unit.index, outcome)?;
        let item_result = body.render(config.remove_xml_declaration_in_results);
        debug!("partial result [{}]", item_result);
        let fragment = engine.fragment(unit.index, unit.value(), body);
        if config.collect_results {
            self.fragments.push(fragment);
        }

        if !self.within_max_items() {
            return Ok(false);
        }
        if let Some(condition) = &engine.stop_condition {
            if condition.evaluate(&item_result).await? {
                info!("条目 [{}] 满足停止条件, 停止迭代", unit.index);
                self.stop_reason = Some(StopReason::StopConditionMet);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn submit(
        &mut self,
        pool: Arc<Semaphore>,
        unit: IterationItem,
        request: DispatchRequest,
    ) -> RelayResult<()> {
        let engine = self.engine;
        let permit = tokio::select! {
            permit = pool.acquire_owned() => permit
                .map_err(|_| RelayError::Internal("worker pool closed".to_string()))?,
            _ = engine.interrupt.interrupted() => {
                return Err(RelayError::interrupted("interrupted while waiting for a worker"));
            }
        };

        let guard = self.gate.enter();
        let dispatch = Arc::clone(&engine.dispatch);
        debug!(
            "提交条目 [{}] 到工作池, 未完成 {} 个",
            unit.index,
            self.gate.outstanding()
        );
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            dispatch.dispatch(request).await
        });

        self.pending.push(PendingDispatch {
            index: unit.index,
            input: unit.value().to_string(),
            handle,
        });
        Ok(())
    }

    fn within_max_items(&mut self) -> bool {
        let max_items = self.engine.config.max_items;
        if max_items > 0 && self.count >= max_items {
            info!("已达到最大条目数 [{}], 停止迭代", max_items);
            self.stop_reason = Some(StopReason::MaxItemsReached);
            false
        } else {
            true
        }
    }

    async fn finish(&mut self) -> RelayResult<IterationReport> {
        let engine = self.engine;
        let config = &engine.config;

        if self.stop_reason.is_none() {
            if let Some(block) = self.assembler.as_mut().and_then(BlockAssembler::flush) {
                let text = block.render(&config.block_prefix, &config.block_suffix);
                self.process(text).await?;
            }
        }

        if self.pool.is_some() {
            self.collect_parallel().await?;
        }

        let result = if config.collect_results {
            IterationResult::Collected {
                fragments: std::mem::take(&mut self.fragments),
                count: self.count,
            }
        } else {
            IterationResult::Summary { count: self.count }
        };

        Ok(IterationReport {
            result,
            stop_reason: self.stop_reason,
            strip_declaration: config.remove_xml_declaration_in_results,
        })
    }

    async fn collect_parallel(&mut self) -> RelayResult<()> {
        let engine = self.engine;

        debug!("等待 {} 个并行分发完成", self.gate.outstanding());
        tokio::select! {
            _ = self.gate.wait_idle() => {}
            _ = engine.interrupt.interrupted() => {
                return Err(RelayError::interrupted(
                    "interrupted while waiting for outstanding dispatches",
                ));
            }
        }

        let mut failures = Vec::new();
        for pending in std::mem::take(&mut self.pending) {
            let outcome = pending.handle.await.map_err(|e| {
                RelayError::Internal(format!(
                    "dispatch task for item [{}] failed: {e}",
                    pending.index
                ))
            })?;
            let body = match engine.classify(pending.index, outcome) {
                Ok(body) => body,
                Err(e @ RelayError::Interrupted(_)) => return Err(e),
                Err(e) => {
                    failures.push(format!("item [{}]: {}", pending.index, e));
                    if e.is_timeout() {
                        FragmentBody::Timeout(e.detail())
                    } else {
                        FragmentBody::Exception(e.detail())
                    }
                }
            };
            if engine.config.collect_results {
                self.fragments
                    .push(engine.fragment(pending.index, &pending.input, body));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RelayError::TransportFailure(format!(
                "{} of {} items failed: {}",
                failures.len(),
                self.count,
                failures.join("; ")
            )))
        }
    }

    fn abort_pending(&mut self) {
        for pending in self.pending.drain(..) {
            pending.handle.abort();
        }
    }
}

#[async_trait]
impl<'a> ItemSink for IterationRun<'a> {
    async fn handle_item(&mut self, raw: String) -> RelayResult<bool> {
        if self.engine.interrupt.is_interrupted() {
            return Err(RelayError::interrupted("iteration interrupted"));
        }
        if self.stop_reason.is_some() {
            return Ok(false);
        }

        self.items_seen += 1;
        if !self.dedup.admit(&raw) {
            debug!("跳过重复条目 [{}]", self.items_seen);
            return Ok(true);
        }

        let item = IterationItem::new(self.items_seen, raw);
        let block = match self.assembler.as_mut() {
            None => return self.process(item.raw_value).await,
            Some(assembler) => assembler.push(item),
        };
        match block {
            Some(block) => {
                let config = &self.engine.config;
                let text = block.render(&config.block_prefix, &config.block_suffix);
                self.process(text).await
            }
            None => Ok(true),
        }
    }
}
