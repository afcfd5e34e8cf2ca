use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::{RelayError, RelayResult, Transformer};

/// Placeholder replaced with the transformed text itself.
pub const ITEM_PLACEHOLDER: &str = "item";

/// 模板转换器
///
/// `{item}` expands to the input text and `{name}` to the parameter of that
/// name. `{{` and `}}` produce literal braces. Unknown names are an error.
#[derive(Debug, Clone)]
pub struct TemplateTransformer {
    template: String,
}

impl TemplateTransformer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, text: &str, params: &HashMap<String, String>) -> RelayResult<String> {
        let mut out = String::with_capacity(self.template.len() + text.len());
        let mut chars = self.template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(RelayError::Transform(format!(
                                    "unterminated placeholder [{{{name}]"
                                )))
                            }
                        }
                    }
                    if name == ITEM_PLACEHOLDER {
                        out.push_str(text);
                    } else {
                        let value = params.get(&name).ok_or_else(|| {
                            RelayError::Transform(format!("unknown placeholder [{name}]"))
                        })?;
                        out.push_str(value);
                    }
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Transformer for TemplateTransformer {
    async fn transform(&self, text: &str, params: &HashMap<String, String>) -> RelayResult<String> {
        self.render(text, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_item_and_params() {
        let transformer = TemplateTransformer::new("<order batch=\"{batch}\">{item}</order>");
        let mut params = HashMap::new();
        params.insert("batch".to_string(), "7".to_string());

        let out = transformer.transform("42", &params).await.unwrap();
        assert_eq!(out, "<order batch=\"7\">42</order>");
    }

    #[test]
    fn test_escaped_braces() {
        let transformer = TemplateTransformer::new("{{{item}}}");
        assert_eq!(transformer.render("x", &HashMap::new()).unwrap(), "{x}");
    }

    #[test]
    fn test_placeholder_errors() {
        let params = HashMap::new();
        assert!(matches!(
            TemplateTransformer::new("{nope}").render("x", &params),
            Err(RelayError::Transform(_))
        ));
        assert!(matches!(
            TemplateTransformer::new("{item").render("x", &params),
            Err(RelayError::Transform(_))
        ));
    }
}
