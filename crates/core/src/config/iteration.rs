use serde::{Deserialize, Serialize};
use tracing::warn;

use super::validation::ConfigValidator;
use crate::{RelayError, RelayResult};

/// 并行模式下未配置时的默认工作池大小
pub const DEFAULT_MAX_CHILD_THREADS: usize = 20;

/// 迭代引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    /// 每个块的条目数，0表示逐条分发
    pub block_size: usize,
    pub block_prefix: String,
    pub block_suffix: String,
    /// 分块键窗口起始位置（字符，包含）
    pub start_position: Option<usize>,
    /// 分块键窗口结束位置（字符，不包含）
    pub end_position: Option<usize>,
    /// 是否并行分发
    pub parallel: bool,
    /// 并行工作池大小
    pub max_child_threads: usize,
    /// 是否收集全部结果，否则只返回计数
    pub collect_results: bool,
    /// 最大处理条目数，0表示不限制
    pub max_items: usize,
    pub ignore_exceptions: bool,
    pub remove_duplicates: bool,
    pub add_input_to_result: bool,
    pub remove_xml_declaration_in_results: bool,
    /// Context key that receives the running item number.
    pub item_no_key: Option<String>,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            block_size: 0,
            block_prefix: "<block>".to_string(),
            block_suffix: "</block>".to_string(),
            start_position: None,
            end_position: None,
            parallel: false,
            max_child_threads: 0,
            collect_results: true,
            max_items: 0,
            ignore_exceptions: false,
            remove_duplicates: false,
            add_input_to_result: false,
            remove_xml_declaration_in_results: false,
            item_no_key: None,
        }
    }
}

impl IterationConfig {
    /// Key window `[start, end)` when both positions are configured.
    pub fn key_window(&self) -> Option<(usize, usize)> {
        match (self.start_position, self.end_position) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn uses_blocks(&self) -> bool {
        self.block_size > 0 || self.key_window().is_some()
    }

    /// Worker pool size, falling back to the default when parallel mode has none.
    pub fn pool_size(&self) -> usize {
        if self.max_child_threads == 0 {
            if self.parallel {
                warn!(
                    "maxChildThreads not set, using default of [{}]",
                    DEFAULT_MAX_CHILD_THREADS
                );
            }
            DEFAULT_MAX_CHILD_THREADS
        } else {
            self.max_child_threads
        }
    }
}

impl ConfigValidator for IterationConfig {
    fn validate(&self) -> RelayResult<()> {
        match (self.start_position, self.end_position) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(RelayError::Configuration(
                    "startPosition and endPosition must be configured together".to_string(),
                ));
            }
            (Some(start), Some(end)) if end <= start => {
                return Err(RelayError::Configuration(format!(
                    "endPosition [{end}] must be greater than startPosition [{start}]"
                )));
            }
            _ => {}
        }
        if self.block_size > 0 && self.key_window().is_some() {
            return Err(RelayError::Configuration(
                "blockSize and a key window cannot be combined".to_string(),
            ));
        }
        Ok(())
    }
}
