use crate::collection::{QuestionField, QuestionId};
use crate::wizard::WizardSession;

#[derive(Debug, Clone, Default)]
pub enum QuizState {
    #[default]
    Start,

    // PART FOR --- STEP 1 ---
    ContentInput {
        session: WizardSession,
    },

    // PART FOR --- STEP 2 ---
    Review {
        session: WizardSession,
    },
    SelectQuestion {
        session: WizardSession,
    },
    HandleQuestion {
        session: WizardSession,
        question: QuestionId,
    },
    EditField {
        session: WizardSession,
        question: QuestionId,
        field: QuestionField,
    },

    // PART FOR --- STEP 3 ---
    ReceiveTitle {
        session: WizardSession,
    },
    ReceiveDescription {
        session: WizardSession,
    },
    Metadata {
        session: WizardSession,
    },

    // PART FOR --- STEP 4 ---
    Completion {
        session: WizardSession,
    },
}

impl QuizState {
    /// The authoring session carried by this state, if any.
    pub fn session(&self) -> Option<&WizardSession> {
        match self {
            QuizState::Start => None,
            QuizState::ContentInput { session }
            | QuizState::Review { session }
            | QuizState::SelectQuestion { session }
            | QuizState::HandleQuestion { session, .. }
            | QuizState::EditField { session, .. }
            | QuizState::ReceiveTitle { session }
            | QuizState::ReceiveDescription { session }
            | QuizState::Metadata { session }
            | QuizState::Completion { session } => Some(session),
        }
    }
}
