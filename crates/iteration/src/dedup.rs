use std::collections::HashSet;

/// Remembers the item values seen during one run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    enabled: bool,
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: HashSet::new(),
        }
    }

    /// False when `value` is a duplicate that should be skipped.
    pub fn admit(&mut self, value: &str) -> bool {
        if !self.enabled {
            return true;
        }
        self.seen.insert(value.to_string())
    }
}
