//! The authoring wizard: content input → review → quiz details → done.
//!
//! Moving between some steps takes two phases. The transition is started
//! (a pending [`Transition`] is recorded and the caller is told which [`View`]
//! must retire), and only when the caller reports that view gone through
//! [`WizardSession::complete_exit`] does the step or review mode change. The
//! outgoing view is therefore never replaced while it is still on screen.
//! Only one transition may be pending at a time.

use std::fmt;

use tracing::{debug, info, warn};

use crate::collection::{QuestionCollection, QuestionField, QuestionId, QuestionItem};
use crate::database::connection::QuizStore;
use crate::database::quiz::{Author, QuizId, QuizPayload, SaveConfirmation};
use crate::error::{GatewayError, InputError, WizardError};
use crate::generation::{GenerationParams, QuestionGenerator, RawQuestion};

pub mod progress;

use progress::ProgressBar;

/// Steps shown on the progress indicator; the completion step comes after.
pub const TOTAL_STEPS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// An outgoing view is exiting; no step is active.
    Transient,
    #[default]
    ContentInput,
    Review,
    Metadata,
    Completion,
}

impl Step {
    pub fn index(self) -> u8 {
        match self {
            Step::Transient => 0,
            Step::ContentInput => 1,
            Step::Review => 2,
            Step::Metadata => 3,
            Step::Completion => 4,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A deferred step/mode change waiting for a view to retire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    EnterReview,
    ReturnToStepTwo,
    AdvanceToStepThree,
    AdvanceToStepFour,
    Restart,
}

impl Transition {
    /// The view that has to finish exiting before this transition applies.
    pub fn outgoing_view(self) -> View {
        match self {
            Transition::EnterReview => View::ContentInput,
            Transition::AdvanceToStepThree => View::Review,
            Transition::ReturnToStepTwo | Transition::AdvanceToStepFour => View::Metadata,
            Transition::Restart => View::Completion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    ContentInput,
    Review,
    Metadata,
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingExit(Transition),
}

/// Returned when a transition starts: retire `view`, then call
/// [`WizardSession::complete_exit`] with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRequest {
    pub view: View,
    pub transition: Transition,
}

/// Handed out by [`WizardSession::begin_generate`]; the result of the call it
/// started is only applied if no newer generation or reset happened since.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    epoch: u64,
    params: GenerationParams,
}

impl GenerationTicket {
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }
}

/// Handed out by [`WizardSession::begin_save`].
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub quiz_id: QuizId,
    pub payload: QuizPayload,
}

#[derive(Debug, Clone, Default)]
pub struct WizardSession {
    step: Step,
    review_mode: bool,
    phase: Phase,
    params: GenerationParams,
    quiz_title: String,
    quiz_description: String,
    questions: QuestionCollection,
    is_generating: bool,
    is_saving_quiz: bool,
    error: Option<String>,
    saved: Option<SaveConfirmation>,
    epoch: u64,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn step_index(&self) -> u8 {
        self.step.index()
    }

    pub fn is_review_mode_active(&self) -> bool {
        self.review_mode
    }

    pub fn pending(&self) -> Option<Transition> {
        match self.phase {
            Phase::Idle => None,
            Phase::AwaitingExit(transition) => Some(transition),
        }
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn quiz_title(&self) -> &str {
        &self.quiz_title
    }

    pub fn quiz_description(&self) -> &str {
        &self.quiz_description
    }

    pub fn questions(&self) -> &QuestionCollection {
        &self.questions
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn is_saving_quiz(&self) -> bool {
        self.is_saving_quiz
    }

    /// Message of the last failed operation, cleared by the next attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn saved(&self) -> Option<&SaveConfirmation> {
        self.saved.as_ref()
    }

    pub fn progress_step(&self) -> u8 {
        progress::map_step(self.step_index(), self.pending(), TOTAL_STEPS)
    }

    pub fn progress(&self) -> ProgressBar {
        ProgressBar::new(self.progress_step(), TOTAL_STEPS)
    }

    // ----- step 1 fields -----

    pub fn set_content_text(&mut self, text: impl Into<String>) {
        self.params.content_text = text.into();
    }

    pub fn attach_pdf(&mut self, file_name: impl Into<String>) {
        self.params.pdf_attachment = Some(file_name.into());
    }

    pub fn set_question_count(&mut self, count: u32) {
        self.params.question_count = count;
    }

    pub fn set_grade_level(&mut self, grade: Option<u32>) {
        self.params.grade_level = grade;
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.params.language = language.into();
    }

    // ----- step 3 fields -----

    pub fn set_quiz_title(&mut self, title: impl Into<String>) {
        self.quiz_title = title.into();
    }

    pub fn set_quiz_description(&mut self, description: impl Into<String>) {
        self.quiz_description = description.into();
    }

    // ----- collection editing -----

    pub fn append_question(&mut self) -> QuestionId {
        self.questions.append()
    }

    pub fn update_question(
        &mut self,
        id: QuestionId,
        field: QuestionField,
        value: impl Into<String>,
    ) -> Result<(), WizardError> {
        self.questions.update_field(id, field, value)
    }

    pub fn remove_question(&mut self, id: QuestionId) -> Option<QuestionItem> {
        self.questions.remove(id)
    }

    pub fn take_scroll_request(&mut self) -> bool {
        self.questions.take_scroll_request()
    }

    // ----- generation -----

    /// Runs the whole generation round trip with `params`, which replace the
    /// session's own only once the request is accepted. Returns how many
    /// questions are now in the collection.
    pub async fn request_generate<G: QuestionGenerator>(
        &mut self,
        params: GenerationParams,
        generator: &G,
    ) -> Result<usize, WizardError> {
        let previous = std::mem::replace(&mut self.params, params);
        let ticket = match self.begin_generate(generator) {
            Ok(ticket) => ticket,
            Err(err) => {
                self.params = previous;
                return Err(err);
            }
        };
        let outcome = generator.generate(ticket.params()).await;
        self.finish_generate(ticket, outcome)
            .map(|count| count.unwrap_or_default())
    }

    /// First half of a generation: checks inputs and configuration, then moves
    /// to step 2 in dual view with an empty collection and marks the session
    /// busy.
    pub fn begin_generate<G: QuestionGenerator>(
        &mut self,
        generator: &G,
    ) -> Result<GenerationTicket, WizardError> {
        self.error = None;
        if self.is_generating {
            return self.fail(WizardError::Busy("question generation"));
        }
        self.ensure_idle()?;
        let step_one_visible =
            self.step == Step::ContentInput || (self.step == Step::Review && !self.review_mode);
        if !step_one_visible {
            return self.fail(self.invalid("generate"));
        }
        if self.params.content_text.trim().is_empty() {
            let missing = if self.params.pdf_attachment.is_some() {
                InputError::PdfNotSupported
            } else {
                InputError::MissingContent
            };
            return self.fail(missing.into());
        }
        if self.params.question_count == 0 {
            return self.fail(InputError::InvalidQuestionCount.into());
        }
        if let Err(err) = generator.ensure_configured() {
            return self.fail(err.into());
        }

        self.epoch += 1;
        self.step = Step::Review;
        self.review_mode = false;
        self.questions.clear();
        self.is_generating = true;
        info!(
            epoch = self.epoch,
            count = self.params.question_count,
            "Generating questions"
        );

        Ok(GenerationTicket {
            epoch: self.epoch,
            params: self.params.clone(),
        })
    }

    /// Second half of a generation. `Ok(None)` means the result belonged to a
    /// superseded call and was dropped.
    pub fn finish_generate(
        &mut self,
        ticket: GenerationTicket,
        outcome: Result<Vec<RawQuestion>, GatewayError>,
    ) -> Result<Option<usize>, WizardError> {
        if ticket.epoch != self.epoch {
            debug!(
                ticket = ticket.epoch,
                current = self.epoch,
                "Ignoring superseded generation result"
            );
            return Ok(None);
        }
        self.is_generating = false;

        match outcome {
            Ok(raw) => {
                self.questions
                    .replace_all(raw.into_iter().map(QuestionItem::from_raw));
                info!(received = self.questions.len(), "Questions ready for review");
                Ok(Some(self.questions.len()))
            }
            Err(err) => {
                warn!(error = %err, "Generation failed");
                self.fail(err.into_generation_error())
            }
        }
    }

    // ----- step 2 navigation -----

    /// "Back" on step 2: leaves full review if it is on, otherwise returns to
    /// step 1.
    pub fn request_back_to_step_one(&mut self) -> Result<(), WizardError> {
        if self.review_mode {
            self.narrow_review()
        } else {
            self.return_to_step_one()
        }
    }

    /// Full review → dual view, staying on step 2.
    pub fn narrow_review(&mut self) -> Result<(), WizardError> {
        self.error = None;
        self.ensure_not_generating()?;
        self.ensure_idle()?;
        if self.step != Step::Review || !self.review_mode {
            return self.fail(self.invalid("narrow review"));
        }
        self.review_mode = false;
        Ok(())
    }

    /// Dual view → step 1.
    pub fn return_to_step_one(&mut self) -> Result<(), WizardError> {
        self.error = None;
        self.ensure_not_generating()?;
        self.ensure_idle()?;
        if self.step != Step::Review || self.review_mode {
            return self.fail(self.invalid("return to step 1"));
        }
        self.step = Step::ContentInput;
        Ok(())
    }

    /// "Review" / "Finalize" on step 2, depending on the current mode.
    pub fn request_review_or_advance(&mut self) -> Result<ExitRequest, WizardError> {
        if self.review_mode {
            self.finalize()
        } else {
            self.enter_review()
        }
    }

    /// Dual view → full review once the step-1 panel has exited.
    pub fn enter_review(&mut self) -> Result<ExitRequest, WizardError> {
        self.error = None;
        self.ensure_not_generating()?;
        if self.step != Step::Review || self.review_mode {
            return self.fail(self.invalid("enter review"));
        }
        self.ensure_has_questions()?;
        self.begin_transition(Transition::EnterReview)
    }

    /// Full review → step 3 once the review view has exited.
    pub fn finalize(&mut self) -> Result<ExitRequest, WizardError> {
        self.error = None;
        self.ensure_not_generating()?;
        if self.step != Step::Review || !self.review_mode {
            return self.fail(self.invalid("finalize"));
        }
        self.ensure_has_questions()?;
        self.begin_transition(Transition::AdvanceToStepThree)
    }

    // ----- step 3 -----

    /// Step 3 → step 2, always landing in full review.
    pub fn request_back_to_step_two(&mut self) -> Result<ExitRequest, WizardError> {
        self.error = None;
        if self.is_saving_quiz {
            return self.fail(WizardError::Busy("saving the quiz"));
        }
        if self.step != Step::Metadata {
            return self.fail(self.invalid("back to review"));
        }
        self.begin_transition(Transition::ReturnToStepTwo)
    }

    /// Validates, persists, and on success starts the move to step 4.
    pub async fn request_save_and_advance<S: QuizStore>(
        &mut self,
        author: Option<&Author>,
        store: &S,
    ) -> Result<ExitRequest, WizardError> {
        let request = self.begin_save(author)?;
        let outcome = store.persist(&request.quiz_id, &request.payload).await;
        self.finish_save(outcome)
    }

    /// First half of a save: validation and payload construction. Marks the
    /// session busy on success.
    pub fn begin_save(&mut self, author: Option<&Author>) -> Result<SaveRequest, WizardError> {
        self.error = None;
        if self.is_saving_quiz {
            return self.fail(WizardError::Busy("saving the quiz"));
        }
        self.ensure_idle()?;
        if self.step != Step::Metadata {
            return self.fail(self.invalid("save"));
        }

        let title = self.quiz_title.trim().to_owned();
        if title.is_empty() {
            return self.fail(InputError::MissingTitle.into());
        }
        let questions = self.questions.validate_for_save();
        if questions.is_empty() {
            return self.fail(InputError::NoEligibleQuestions.into());
        }
        if questions.len() < self.questions.len() {
            warn!(
                dropped = self.questions.len() - questions.len(),
                "Some incomplete question cards were not saved"
            );
        }
        let Some(author) = author else {
            return self.fail(InputError::NotSignedIn.into());
        };

        let description = match self.quiz_description.trim() {
            "" => title.clone(),
            description => description.to_owned(),
        };
        let quiz_id = QuizId::from_title(&title);
        let payload = QuizPayload {
            title,
            description,
            language: self.params.language.clone(),
            grade_level: self.params.grade_level,
            questions,
            user_generated: true,
            user_id: author.user_id.clone(),
            user_full_name: author
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Anonymous".to_owned()),
            created_at: chrono::Utc::now(),
        };

        self.is_saving_quiz = true;
        info!(quiz_id = %quiz_id, questions = payload.questions.len(), "Saving quiz");
        Ok(SaveRequest { quiz_id, payload })
    }

    /// Second half of a save.
    pub fn finish_save(
        &mut self,
        outcome: Result<SaveConfirmation, GatewayError>,
    ) -> Result<ExitRequest, WizardError> {
        self.is_saving_quiz = false;
        match outcome {
            Ok(confirmation) => {
                info!(path = %confirmation.path, "Quiz saved");
                self.saved = Some(confirmation);
                self.begin_transition(Transition::AdvanceToStepFour)
            }
            Err(err) => {
                warn!(error = %err, "Saving quiz failed");
                self.fail(WizardError::Persistence(err))
            }
        }
    }

    // ----- step 4 -----

    /// "Create another": wipes the session, then returns to step 1 once the
    /// completion view has exited.
    pub fn request_restart(&mut self) -> Result<ExitRequest, WizardError> {
        self.ensure_idle()?;
        if self.step != Step::Completion {
            return self.fail(self.invalid("restart"));
        }
        let epoch = self.epoch + 1;
        *self = Self {
            step: Step::Completion,
            epoch,
            ..Self::default()
        };
        self.begin_transition(Transition::Restart)
    }

    // ----- two-phase protocol -----

    /// Reports that `view` has finished exiting and applies the pending
    /// transition. Returns the step now active.
    pub fn complete_exit(&mut self, view: View) -> Result<Step, WizardError> {
        let transition = match self.phase {
            Phase::AwaitingExit(transition) if transition.outgoing_view() == view => transition,
            _ => return Err(WizardError::NoPendingExit(view)),
        };

        match transition {
            Transition::EnterReview => {
                self.step = Step::Review;
                self.review_mode = true;
            }
            Transition::ReturnToStepTwo => {
                self.step = Step::Review;
                self.review_mode = true;
            }
            Transition::AdvanceToStepThree => {
                self.step = Step::Metadata;
                self.review_mode = false;
            }
            Transition::AdvanceToStepFour => self.step = Step::Completion,
            Transition::Restart => self.step = Step::ContentInput,
        }
        self.phase = Phase::Idle;
        debug!(?transition, step = self.step.index(), "Transition applied");
        Ok(self.step)
    }

    fn begin_transition(&mut self, transition: Transition) -> Result<ExitRequest, WizardError> {
        self.ensure_idle()?;
        self.phase = Phase::AwaitingExit(transition);
        if transition != Transition::EnterReview {
            self.step = Step::Transient;
        }
        debug!(?transition, "Waiting for view to exit");
        Ok(ExitRequest {
            view: transition.outgoing_view(),
            transition,
        })
    }

    fn ensure_not_generating(&mut self) -> Result<(), WizardError> {
        if self.is_generating {
            return self.fail(WizardError::Busy("question generation"));
        }
        Ok(())
    }

    /// Failed generations leave the collection empty.
    fn ensure_has_questions(&mut self) -> Result<(), WizardError> {
        if self.questions.is_empty() {
            return self.fail(InputError::NoQuestions.into());
        }
        Ok(())
    }

    fn ensure_idle(&mut self) -> Result<(), WizardError> {
        match self.phase {
            Phase::Idle => Ok(()),
            Phase::AwaitingExit(pending) => self.fail(WizardError::TransitionInFlight(pending)),
        }
    }

    fn invalid(&self, operation: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            operation,
            step: self.step,
        }
    }

    fn fail<T>(&mut self, err: WizardError) -> Result<T, WizardError> {
        self.error = Some(err.to_string());
        Err(err)
    }
}
