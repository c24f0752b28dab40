use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};
use tracing::warn;

use crate::providers::ToolSpec;
use crate::types::{ImprovementFeedback, ImprovementRequest, OcrTranslation};

pub const OCR_TOOL_NAME: &str = "deliver_ocr_translation";
pub const FEEDBACK_TOOL_NAME: &str = "deliver_improvement_feedback";

const OCR_PROMPT: &str = include_str!("prompts/ocr_translation.tera");
const IMPROVEMENT_PROMPT: &str = include_str!("prompts/improvement.tera");
const IMPROVEMENT_INPUT: &str = include_str!("prompts/improvement_input.tera");

/// User turn sent after the image so the model knows what it is looking at.
pub const OCR_USER_INPUT: &str = "Here is the image containing Arabic text.";

pub fn ocr_tool_spec() -> ToolSpec {
    ToolSpec {
        name: OCR_TOOL_NAME.to_string(),
        description: "Return the extracted Arabic text, its English translation and the Dua/Ayah classification.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "arabicText": {
                    "type": "string",
                    "description": "The extracted Arabic text from the image, preserving original formatting like headings and paragraphs."
                },
                "englishTranslation": {
                    "type": "string",
                    "description": "If isDua is true: the original Arabic text, two newlines, then the English translation. Otherwise a natural, well-structured English rendering."
                },
                "isDua": {
                    "type": "boolean",
                    "description": "Whether the Arabic text is a Dua or a Quranic Ayah."
                }
            },
            "required": ["arabicText", "englishTranslation", "isDua"]
        }),
    }
}

pub fn feedback_tool_spec() -> ToolSpec {
    ToolSpec {
        name: FEEDBACK_TOOL_NAME.to_string(),
        description: "Return feedback on how the translation model can be improved.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "feedback": {
                    "type": "string",
                    "description": "Feedback on how the translation model can be improved."
                }
            },
            "required": ["feedback"]
        }),
    }
}

pub fn render_ocr_prompt() -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("tool_name", OCR_TOOL_NAME);
    Tera::one_off(OCR_PROMPT, &context, false).with_context(|| "failed to render OCR prompt")
}

pub fn render_improvement_prompt() -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("tool_name", FEEDBACK_TOOL_NAME);
    Tera::one_off(IMPROVEMENT_PROMPT, &context, false)
        .with_context(|| "failed to render improvement prompt")
}

pub fn render_improvement_input(request: &ImprovementRequest) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("arabic_text", &request.arabic_text);
    context.insert("initial_translation", &request.initial_translation);
    context.insert("corrected_translation", &request.corrected_translation);
    Tera::one_off(IMPROVEMENT_INPUT, &context, false)
        .with_context(|| "failed to render improvement input")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrToolArgs {
    arabic_text: String,
    english_translation: String,
    is_dua: bool,
}

pub fn parse_ocr_args(value: Value) -> Result<OcrTranslation> {
    let args: OcrToolArgs =
        serde_json::from_value(value).with_context(|| "invalid OCR tool arguments")?;
    let output = OcrTranslation {
        arabic_text: args.arabic_text,
        english_translation: args.english_translation,
        is_dua: args.is_dua,
    };
    if !output.follows_dua_contract() {
        warn!("dua result does not start with the extracted text followed by a blank line");
    }
    Ok(output)
}

#[derive(Debug, Deserialize)]
struct FeedbackToolArgs {
    feedback: String,
}

pub fn parse_feedback_args(value: Value) -> Result<ImprovementFeedback> {
    let args: FeedbackToolArgs =
        serde_json::from_value(value).with_context(|| "invalid feedback tool arguments")?;
    if args.feedback.trim().is_empty() {
        return Err(anyhow!("feedback is empty"));
    }
    Ok(ImprovementFeedback {
        feedback: args.feedback,
    })
}
