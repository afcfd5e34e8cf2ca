//! Builders for dispatcher and iteration configuration with test-friendly defaults

use relay_core::{DispatchConfig, IterationConfig, LinkMethod};

/// Builder for creating test DispatchConfig values
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: DispatchConfig::new(name),
        }
    }

    pub fn with_link_method(mut self, link_method: LinkMethod) -> Self {
        self.config.link_method = link_method;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, min_interval: u64, max_interval: u64) -> Self {
        self.config.max_retries = max_retries;
        self.config.retry_min_interval = min_interval;
        self.config.retry_max_interval = max_interval;
        self
    }

    pub fn with_presumed_timeout(mut self, seconds: i64) -> Self {
        self.config.presumed_timeout_interval = seconds;
        self
    }

    pub fn with_time_out_on_result(mut self, literal: &str) -> Self {
        self.config.time_out_on_result = Some(literal.to_string());
        self
    }

    pub fn with_exception_on_result(mut self, literal: &str) -> Self {
        self.config.exception_on_result = Some(literal.to_string());
        self
    }

    pub fn with_result_on_time_out(mut self, literal: &str) -> Self {
        self.config.result_on_time_out = Some(literal.to_string());
        self
    }

    pub fn with_check_root_tag(mut self, tag: &str) -> Self {
        self.config.check_root_tag = Some(tag.to_string());
        self
    }

    pub fn build(self) -> DispatchConfig {
        self.config
    }
}

/// Builder for creating test IterationConfig values
pub struct IterationConfigBuilder {
    config: IterationConfig,
}

impl IterationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: IterationConfig::default(),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn with_block_decoration(mut self, prefix: &str, suffix: &str) -> Self {
        self.config.block_prefix = prefix.to_string();
        self.config.block_suffix = suffix.to_string();
        self
    }

    pub fn with_key_window(mut self, start: usize, end: usize) -> Self {
        self.config.start_position = Some(start);
        self.config.end_position = Some(end);
        self
    }

    pub fn parallel(mut self, max_child_threads: usize) -> Self {
        self.config.parallel = true;
        self.config.max_child_threads = max_child_threads;
        self
    }

    pub fn summary_only(mut self) -> Self {
        self.config.collect_results = false;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.config.max_items = max_items;
        self
    }

    pub fn ignore_exceptions(mut self) -> Self {
        self.config.ignore_exceptions = true;
        self
    }

    pub fn remove_duplicates(mut self) -> Self {
        self.config.remove_duplicates = true;
        self
    }

    pub fn add_input_to_result(mut self) -> Self {
        self.config.add_input_to_result = true;
        self
    }

    pub fn remove_xml_declaration(mut self) -> Self {
        self.config.remove_xml_declaration_in_results = true;
        self
    }

    pub fn with_item_no_key(mut self, key: &str) -> Self {
        self.config.item_no_key = Some(key.to_string());
        self
    }

    pub fn build(self) -> IterationConfig {
        self.config
    }
}

impl Default for IterationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
