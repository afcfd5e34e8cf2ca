//! 迭代引擎：数据源、去重、分块、顺序与并行分发以及结果汇总

pub mod block;
pub mod dedup;
pub mod engine;
pub mod gate;
pub mod source;
pub mod sources;
pub mod stop;

pub use block::{BlockAssembler, BlockMode};
pub use dedup::Deduplicator;
pub use engine::{IterationEngine, IterationEngineBuilder};
pub use gate::{CompletionGate, GateGuard};
pub use source::{ItemSink, IterationSource, PullSource, PushSource};
pub use sources::{DelimitedSource, LineSource, ReaderLineSource, VecSource};
pub use stop::TransformStopCondition;
