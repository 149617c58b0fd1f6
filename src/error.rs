use thiserror::Error;

use crate::collection::QuestionId;
use crate::wizard::{Step, Transition, View};

/// Everything an authoring operation can fail with.
///
/// The `Display` text is what the bot shows to the user, so it is written
/// for them rather than for the log.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Configuration problem: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Question generation failed: {0}")]
    Generation(#[source] GatewayError),

    #[error("Failed to save quiz: {0}")]
    Persistence(#[source] GatewayError),

    #[error("'{operation}' is not available on step {step}")]
    InvalidTransition { operation: &'static str, step: Step },

    #[error("Another transition ({0:?}) is still in progress")]
    TransitionInFlight(Transition),

    #[error("The {0:?} view is not waiting to exit")]
    NoPendingExit(View),

    #[error("Please wait, {0} is still in progress")]
    Busy(&'static str),

    #[error("Question {0} does not exist")]
    QuestionNotFound(QuestionId),
}

/// Problems with what the user typed. Always recoverable by more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please paste text or upload a PDF to generate questions.")]
    MissingContent,

    #[error("PDF processing is not yet implemented. Please paste text.")]
    PdfNotSupported,

    #[error("Ask for at least one question.")]
    InvalidQuestionCount,

    #[error("There are no questions yet. Go back and generate them first.")]
    NoQuestions,

    #[error("Quiz title is required.")]
    MissingTitle,

    #[error("No valid questions to save. Add at least one question with all required fields (question, correct answer, and a second option for multiple choice).")]
    NoEligibleQuestions,

    #[error("You must be logged in to save a quiz.")]
    NotSignedIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures at the boundary with the generation API or the quiz store.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} is missing, check your environment configuration")]
    MissingCredential(&'static str),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid AI response: no content")]
    EmptyCompletion,

    #[error("failed to parse AI JSON, possibly not valid JSON output: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("AI JSON is missing a valid 'questions' array")]
    MissingQuestions,

    #[error("failed to encode quiz: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl GatewayError {
    /// A missing credential is a configuration problem, not a failed call.
    pub(crate) fn into_generation_error(self) -> WizardError {
        match self {
            GatewayError::MissingCredential(key) => {
                WizardError::Configuration(ConfigError::Missing(key))
            }
            other => WizardError::Generation(other),
        }
    }
}
