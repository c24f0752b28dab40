use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::data;
use crate::oracle::{Oracle, OracleFuture};
use crate::providers::{Provider, ProviderResponse, ProviderUsage, ToolSpec};
use crate::translations;
use crate::types::{ImprovementFeedback, ImprovementRequest, OcrTranslation};

/// LLM-backed oracle: one forced tool call per request.
#[derive(Debug, Clone)]
pub struct Translator<P: Provider + Clone> {
    provider: P,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput<T> {
    pub value: T,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

impl<P: Provider + Clone> Translator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn call_tool(
        &self,
        tool: ToolSpec,
        system_prompt: String,
        image: Option<data::DataAttachment>,
        user_input: String,
    ) -> Result<ProviderResponse> {
        let tool_name = tool.name.clone();
        let mut provider = self
            .provider
            .clone()
            .register_tool(tool)
            .append_system_input(system_prompt);
        if let Some(image) = image {
            provider = provider.append_user_image(image);
        }
        provider
            .append_user_input(user_input)
            .call_tool(&tool_name)
            .await
    }

    pub async fn exec_ocr(&self, photo_data_uri: &str) -> Result<ExecutionOutput<OcrTranslation>> {
        let image = data::parse_image_data_uri(photo_data_uri)?;
        debug!("sending {} byte {} image", image.bytes.len(), image.mime);
        let response = self
            .call_tool(
                translations::ocr_tool_spec(),
                translations::render_ocr_prompt()?,
                Some(image),
                translations::OCR_USER_INPUT.to_string(),
            )
            .await?;
        log_usage(response.model.as_deref(), response.usage.as_ref());
        Ok(ExecutionOutput {
            value: translations::parse_ocr_args(response.args)?,
            model: response.model,
            usage: response.usage,
        })
    }

    pub async fn exec_improvement(
        &self,
        request: &ImprovementRequest,
    ) -> Result<ExecutionOutput<ImprovementFeedback>> {
        let response = self
            .call_tool(
                translations::feedback_tool_spec(),
                translations::render_improvement_prompt()?,
                None,
                translations::render_improvement_input(request)?,
            )
            .await?;
        log_usage(response.model.as_deref(), response.usage.as_ref());
        Ok(ExecutionOutput {
            value: translations::parse_feedback_args(response.args)?,
            model: response.model,
            usage: response.usage,
        })
    }
}

impl<P: Provider + Clone + 'static> Oracle for Translator<P> {
    fn translate_image<'a>(&'a self, photo_data_uri: &'a str) -> OracleFuture<'a, OcrTranslation> {
        Box::pin(async move {
            let output = self
                .exec_ocr(photo_data_uri)
                .await
                .context("Failed to process image for translation.")?;
            Ok(output.value)
        })
    }

    fn improve_translation<'a>(
        &'a self,
        request: &'a ImprovementRequest,
    ) -> OracleFuture<'a, ImprovementFeedback> {
        Box::pin(async move {
            let output = self
                .exec_improvement(request)
                .await
                .context("Failed to submit translation improvement.")?;
            Ok(output.value)
        })
    }
}

fn log_usage(model: Option<&str>, usage: Option<&ProviderUsage>) {
    let total = usage.and_then(|usage| usage.total_tokens);
    info!(
        "oracle call completed (model: {}, tokens: {})",
        model.unwrap_or("unavailable"),
        total
            .map(|value| value.to_string())
            .unwrap_or_else(|| "unavailable".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataAttachment;
    use crate::providers::{ProviderFuture, ToolSpec};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct TestProvider {
        response: serde_json::Value,
        seen: Arc<Mutex<Vec<String>>>,
        tools: Vec<String>,
    }

    impl Provider for TestProvider {
        fn append_system_input(self, input: String) -> Self {
            self.seen.lock().unwrap().push(format!("system:{}", input.len()));
            self
        }

        fn append_user_input(self, input: String) -> Self {
            self.seen.lock().unwrap().push(format!("user:{}", input));
            self
        }

        fn append_user_image(self, data: DataAttachment) -> Self {
            self.seen.lock().unwrap().push(format!("image:{}", data.mime));
            self
        }

        fn register_tool(mut self, tool: ToolSpec) -> Self {
            self.tools.push(tool.name);
            self
        }

        fn call_tool(self, tool_name: &str) -> ProviderFuture {
            assert!(self.tools.iter().any(|name| name == tool_name));
            let args = self.response;
            Box::pin(async move {
                Ok(ProviderResponse {
                    args,
                    model: Some("test".to_string()),
                    usage: None,
                })
            })
        }
    }

    #[tokio::test]
    async fn ocr_sends_image_then_instruction() {
        let provider = TestProvider {
            response: json!({
                "arabicText": "سلام",
                "englishTranslation": "Peace",
                "isDua": false
            }),
            ..Default::default()
        };
        let seen = provider.seen.clone();
        let translator = Translator::new(provider);
        let output = translator
            .translate_image("data:image/png;base64,AQID")
            .await
            .expect("translation");
        assert_eq!(output.english_translation, "Peace");

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("system:"));
        assert_eq!(seen[1], "image:image/png");
        assert_eq!(seen[2], format!("user:{}", translations::OCR_USER_INPUT));
    }

    #[tokio::test]
    async fn invalid_data_uri_is_an_oracle_error() {
        let translator = Translator::new(TestProvider::default());
        let err = translator
            .translate_image("not a data uri")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to process image for translation.");
    }

    #[tokio::test]
    async fn improvement_returns_feedback() {
        let translator = Translator::new(TestProvider {
            response: json!({"feedback": "Prefer 'Allah' over 'God'."}),
            ..Default::default()
        });
        let request = ImprovementRequest {
            arabic_text: "الحمد لله".to_string(),
            initial_translation: "Thanks to God".to_string(),
            corrected_translation: "All praise is due to Allah".to_string(),
        };
        let feedback = translator
            .improve_translation(&request)
            .await
            .expect("feedback");
        assert_eq!(feedback.feedback, "Prefer 'Allah' over 'God'.");
    }
}
