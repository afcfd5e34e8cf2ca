use relay_core::{utils::char_window, Block, IterationConfig, IterationItem};

/// How items are grouped into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Fixed number of items per block.
    Size(usize),
    /// Consecutive items sharing the key substring `[start, end)`.
    KeyWindow { start: usize, end: usize },
}

impl BlockMode {
    pub fn from_config(config: &IterationConfig) -> Option<Self> {
        if config.block_size > 0 {
            return Some(BlockMode::Size(config.block_size));
        }
        config
            .key_window()
            .map(|(start, end)| BlockMode::KeyWindow { start, end })
    }
}

/// 分块组装器
#[derive(Debug)]
pub struct BlockAssembler {
    mode: BlockMode,
    current: Option<Block>,
}

impl BlockAssembler {
    pub fn new(mode: BlockMode) -> Self {
        Self {
            mode,
            current: None,
        }
    }

    /// Adds an item and returns a block once one is complete.
    pub fn push(&mut self, item: IterationItem) -> Option<Block> {
        match self.mode {
            BlockMode::Size(size) => {
                let block = self.current.get_or_insert_with(|| Block::new(None));
                block.push(item);
                if block.len() >= size {
                    self.current.take()
                } else {
                    None
                }
            }
            BlockMode::KeyWindow { start, end } => {
                let key = char_window(&item.raw_value, start, end).to_string();
                let key_changed = self
                    .current
                    .as_ref()
                    .is_some_and(|block| block.key.as_deref() != Some(key.as_str()));
                let finished = if key_changed { self.current.take() } else { None };
                self.current
                    .get_or_insert_with(|| Block::new(Some(key)))
                    .push(item);
                finished
            }
        }
    }

    /// The partially filled block, if any.
    pub fn flush(&mut self) -> Option<Block> {
        self.current.take().filter(|block| !block.is_empty())
    }
}
