//! Turning source text into quiz questions through a chat-completion API.
//!
//! [`QuestionGenerator`] is the seam the wizard depends on. [`OpenAiGenerator`]
//! is the production implementation; tests plug in their own.

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, GatewayError};

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-2024-04-09";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

const TEMPERATURE: f32 = 0.52;
const TOKENS_PER_QUESTION: u32 = 350;
const MAX_TOKENS: u32 = 4096;

/// Step-1 inputs of the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub content_text: String,
    /// File name of an attached PDF. Attaching one is accepted but
    /// generation from it is not supported.
    pub pdf_attachment: Option<String>,
    pub question_count: u32,
    pub grade_level: Option<u32>,
    pub language: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            content_text: String::new(),
            pdf_attachment: None,
            question_count: 5,
            grade_level: Some(7),
            language: "en".to_owned(),
        }
    }
}

/// One question as the model returned it. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

pub trait QuestionGenerator {
    /// Checked before the wizard leaves step 1, so that a missing credential
    /// never turns into a failed generation on step 2.
    fn ensure_configured(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn generate(
        &self,
        params: &GenerationParams,
    ) -> impl Future<Output = Result<Vec<RawQuestion>, GatewayError>> + Send;
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: Url,
    pub timeout: Duration,
}

impl OpenAiSettings {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_owned(),
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct OpenAiGenerator {
    client: Client,
    settings: OpenAiSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(settings: OpenAiSettings) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GatewayError::MissingCredential("OPENAI_API_KEY"))
    }
}

impl QuestionGenerator for OpenAiGenerator {
    fn ensure_configured(&self) -> Result<(), ConfigError> {
        self.api_key()
            .map(|_| ())
            .map_err(|_| ConfigError::Missing("OPENAI_API_KEY"))
    }

    #[tracing::instrument(level = "info", skip(self, params), fields(count = params.question_count, language = %params.language))]
    async fn generate(&self, params: &GenerationParams) -> Result<Vec<RawQuestion>, GatewayError> {
        let api_key = self.api_key()?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_owned(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(params),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: max_tokens(params.question_count),
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.settings.endpoint.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("API request failed with status {}", status.as_u16()));
            tracing::warn!(status = status.as_u16(), %message, "Generation request rejected");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatResponse =
            serde_json::from_str(&body).map_err(GatewayError::MalformedJson)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GatewayError::EmptyCompletion)?;

        let questions = parse_questions(&content)?;
        tracing::info!(received = questions.len(), "Generated questions");
        Ok(questions)
    }
}

fn max_tokens(question_count: u32) -> u32 {
    TOKENS_PER_QUESTION
        .saturating_mul(question_count)
        .saturating_add(100)
        .min(MAX_TOKENS)
}

const SYSTEM_PROMPT: &str = "You write quiz questions. Reply with a single JSON object holding a \
'questions' array; every question has 'text', 'options' (two strings), 'correct_answer' (one of \
the options) and 'note'.";

fn build_prompt(params: &GenerationParams) -> String {
    let audience = params
        .grade_level
        .map(|grade| format!("\nTarget an audience of grade {grade}."))
        .unwrap_or_default();
    let count = params.question_count;
    let language = &params.language;

    format!(
        r#"Source text:

"{content}"

Write exactly {count} quiz questions about the source text, in the language "{language}".{audience}

Each question object has:
- "text": the question.
- "options": an array of exactly two different, short answers.
- "correct_answer": exactly one of the two options, copied verbatim.
- "note": one short sentence shown when the learner picks the wrong option.

Vary the kind of options (true/false, yes/no, two names, two years, cause/effect, ...) instead of
using true/false everywhere. Questions, options and notes are all written in "{language}".

Answer with one JSON object and nothing else, shaped like:
{{"questions": [{{"text": "What is the capital of France?", "options": ["Paris", "London"], "correct_answer": "Paris", "note": "Paris is the capital of France."}}]}}
The "questions" array holds exactly {count} objects."#,
        content = params.content_text,
    )
}

/// Removes Markdown code fences and a leading `json` tag that models add
/// despite being asked for raw JSON.
fn strip_code_fences(content: &str) -> String {
    let unfenced = content.replace("```", "");
    let trimmed = unfenced.trim();
    trimmed
        .strip_prefix("json")
        .map(str::trim_start)
        .unwrap_or(trimmed)
        .to_owned()
}

/// Extracts the `questions` array from a completion. Either the whole array
/// parses or nothing is returned.
pub fn parse_questions(content: &str) -> Result<Vec<RawQuestion>, GatewayError> {
    let cleaned = strip_code_fences(content);
    let mut root: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(GatewayError::MalformedJson)?;

    match root.get_mut("questions").map(serde_json::Value::take) {
        Some(questions @ serde_json::Value::Array(_)) => {
            serde_json::from_value(questions).map_err(GatewayError::MalformedJson)
        }
        _ => Err(GatewayError::MissingQuestions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tokens_scales_and_caps() {
        assert_eq!(max_tokens(1), 450);
        assert_eq!(max_tokens(5), 1850);
        assert_eq!(max_tokens(20), MAX_TOKENS);
    }

    #[test]
    fn prompt_mentions_count_language_and_grade() {
        let params = GenerationParams {
            content_text: "Photosynthesis turns light into sugar.".into(),
            question_count: 3,
            language: "no".into(),
            ..GenerationParams::default()
        };
        let prompt = build_prompt(&params);

        assert!(prompt.contains("Photosynthesis turns light into sugar."));
        assert!(prompt.contains("exactly 3 quiz questions"));
        assert!(prompt.contains("\"no\""));
        assert!(prompt.contains("grade 7"));

        let prompt = build_prompt(&GenerationParams {
            grade_level: None,
            ..params
        });
        assert!(!prompt.contains("grade"));
    }

    #[test]
    fn parses_fenced_json() {
        let content = "```json\n{\"questions\": [{\"text\": \"Q?\", \"options\": [\"A\", \"B\"], \"correct_answer\": \"A\", \"note\": \"n\"}]}\n```";
        let questions = parse_questions(content).unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text.as_deref(), Some("Q?"));
        assert_eq!(questions[0].correct_answer.as_deref(), Some("A"));
    }

    #[test]
    fn tolerates_missing_fields_and_ignores_ids() {
        let content = r#"{"questions": [{"id": "q-1", "text": "Only text"}]}"#;
        let questions = parse_questions(content).unwrap();

        assert_eq!(
            questions,
            vec![RawQuestion {
                text: Some("Only text".into()),
                ..RawQuestion::default()
            }]
        );
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_questions("Sure! Here are your questions:"),
            Err(GatewayError::MalformedJson(_))
        ));
    }

    #[test]
    fn rejects_missing_or_non_array_questions() {
        assert!(matches!(
            parse_questions(r#"{"items": []}"#),
            Err(GatewayError::MissingQuestions)
        ));
        assert!(matches!(
            parse_questions(r#"{"questions": "none"}"#),
            Err(GatewayError::MissingQuestions)
        ));
    }

    #[test]
    fn missing_key_fails_fast() {
        let generator = OpenAiGenerator::new(OpenAiSettings::new(None)).unwrap();
        assert_eq!(
            generator.ensure_configured(),
            Err(ConfigError::Missing("OPENAI_API_KEY"))
        );
    }
}
