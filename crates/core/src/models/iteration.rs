use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::{encode_chars, skip_xml_declaration};

/// One element obtained from an iteration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationItem {
    /// 1-based position in the source, counted before deduplication.
    pub index: usize,
    pub raw_value: String,
    pub transformed_value: Option<String>,
}

impl IterationItem {
    pub fn new(index: usize, raw_value: impl Into<String>) -> Self {
        Self {
            index,
            raw_value: raw_value.into(),
            transformed_value: None,
        }
    }

    pub fn value(&self) -> &str {
        self.transformed_value.as_deref().unwrap_or(&self.raw_value)
    }
}

/// Ordered run of items sent to a sender as one combined unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub key: Option<String>,
    pub items: Vec<IterationItem>,
}

impl Block {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: IterationItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Concatenates the item values between `prefix` and `suffix`.
    pub fn render(&self, prefix: &str, suffix: &str) -> String {
        let mut text = String::from(prefix);
        for item in &self.items {
            text.push_str(item.value());
        }
        text.push_str(suffix);
        text
    }
}

/// Why an iteration ended before its source was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    MaxItemsReached,
    StopConditionMet,
}

impl StopReason {
    pub fn forward_name(&self) -> &'static str {
        match self {
            StopReason::MaxItemsReached => "maxItemsReached",
            StopReason::StopConditionMet => "stopConditionMet",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.forward_name())
    }
}

/// Per-item outcome as it appears in the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentBody {
    Result(String),
    Exception(String),
    Timeout(String),
}

impl FragmentBody {
    pub fn is_error(&self) -> bool {
        !matches!(self, FragmentBody::Result(_))
    }

    /// The item result as the stop condition sees it: the reply itself, or
    /// the inline `<exception>`/`<timeout>` element.
    pub fn render(&self, strip_declaration: bool) -> String {
        match self {
            FragmentBody::Result(text) if strip_declaration => {
                skip_xml_declaration(text).to_string()
            }
            FragmentBody::Result(text) => text.clone(),
            FragmentBody::Exception(message) => {
                format!("<exception>{}</exception>", encode_chars(message))
            }
            FragmentBody::Timeout(message) => {
                format!("<timeout>{}</timeout>", encode_chars(message))
            }
        }
    }
}

/// 单个条目的结果片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: usize,
    pub input: Option<String>,
    pub body: FragmentBody,
}

impl Fragment {
    pub fn new(index: usize, body: FragmentBody) -> Self {
        Self {
            index,
            input: None,
            body,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// `<result item="N">` element; `strip_declaration` removes XML
    /// declarations from the echoed input and a successful result.
    pub fn render(&self, strip_declaration: bool) -> String {
        let strip = |text: &str| -> String {
            if strip_declaration {
                skip_xml_declaration(text).to_string()
            } else {
                text.to_string()
            }
        };

        let input = self
            .input
            .as_deref()
            .map(|input| format!("<input>{}</input>", strip(input)))
            .unwrap_or_default();
        let body = self.body.render(strip_declaration);

        format!("<result item=\"{}\">\n{}{}\n</result>", self.index, input, body)
    }
}

/// 迭代结果：完整片段列表或仅计数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationResult {
    Collected { fragments: Vec<Fragment>, count: usize },
    Summary { count: usize },
}

impl IterationResult {
    pub fn count(&self) -> usize {
        match self {
            IterationResult::Collected { count, .. } | IterationResult::Summary { count } => *count,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        match self {
            IterationResult::Collected { fragments, .. } => fragments,
            IterationResult::Summary { .. } => &[],
        }
    }

    pub fn render(&self, strip_declaration: bool) -> String {
        match self {
            IterationResult::Collected { fragments, count } => {
                let mut text = format!("<results count=\"{count}\">\n");
                for fragment in fragments {
                    text.push_str(&fragment.render(strip_declaration));
                    text.push('\n');
                }
                text.push_str("</results>");
                text
            }
            IterationResult::Summary { count } => format!("<results count=\"{count}\"/>"),
        }
    }
}

/// The result of a run together with the reason it stopped, if it stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub result: IterationResult,
    pub stop_reason: Option<StopReason>,
    pub strip_declaration: bool,
}

impl IterationReport {
    pub fn count(&self) -> usize {
        self.result.count()
    }

    pub fn render(&self) -> String {
        self.result.render(self.strip_declaration)
    }

    pub fn forward_name(&self) -> &'static str {
        self.stop_reason
            .map(|reason| reason.forward_name())
            .unwrap_or("success")
    }
}
