use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{RelayResult, ResultPredicate, Transformer};

/// Stop condition driven by a transformer, e.g. an XPath expression.
///
/// The loop stops when the transformer yields anything other than an
/// empty string or `false` (case-insensitive).
pub struct TransformStopCondition {
    transformer: Arc<dyn Transformer>,
}

impl TransformStopCondition {
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self { transformer }
    }
}

#[async_trait]
impl ResultPredicate for TransformStopCondition {
    async fn evaluate(&self, text: &str) -> RelayResult<bool> {
        let result = self.transformer.transform(text, &HashMap::new()).await?;
        Ok(!result.is_empty() && !result.eq_ignore_ascii_case("false"))
    }
}
