use std::sync::Arc;

use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{ChatId, Message, ReplyMarkup},
    Bot, RequestError,
};
use tracing::instrument;

use crate::{
    collection::QuestionItem,
    database::{connection::QuizStore, quiz::Author},
    editor,
    error::WizardError,
    generation::QuestionGenerator,
    keyboard,
    state::QuizState,
    wizard::{ExitRequest, Step, Transition, WizardSession},
    HandlerResult, UserDialogue,
};

/// Telegram rejects longer messages.
const MESSAGE_LIMIT: usize = 4000;

/// One question card never takes more than this, leaving room for a header.
const CARD_LIMIT: usize = 3500;

#[instrument(level = "info", skip(bot, dialogue, msg), fields(chat = %msg.chat.id))]
pub(crate) async fn choose_what_to_do(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    match msg.text() {
        Some(keyboard::CREATE_QUIZ) => {
            tracing::info!("{} starts a new quiz.", username(&msg));
            bot.send_message(msg.chat.id, "Let's build a quiz from your text!")
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;
            show(&bot, &dialogue, msg.chat.id, WizardSession::new()).await?;
        }
        other => {
            tracing::info!("{}: invalid input '{:?}'", username(&msg), other);
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .reply_markup(keyboard::action_keyboard())
                .await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------- step 1

#[instrument(level = "info", skip(bot, dialogue, msg, session, generator), fields(chat = %msg.chat.id))]
pub(crate) async fn receive_content<G: QuestionGenerator + Send + Sync>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut session: WizardSession,
    generator: Arc<G>,
) -> HandlerResult {
    if let Some(document) = msg.document() {
        let name = document
            .file_name
            .clone()
            .unwrap_or_else(|| "document.pdf".to_owned());
        tracing::info!("{} attaches '{}'.", username(&msg), name);
        bot.send_message(msg.chat.id, format!("Attached '{name}'."))
            .await?;
        session.attach_pdf(name);
        dialogue.update(QuizState::ContentInput { session }).await?;
        return Ok(());
    }

    match msg.text() {
        Some(keyboard::GENERATE) => {
            generate(&bot, &dialogue, msg.chat.id, session, &*generator).await?;
        }
        Some(text) => {
            session.set_content_text(text);
            bot.send_message(
                msg.chat.id,
                format!(
                    "Got {} characters of source text. Press {} when ready.",
                    text.chars().count(),
                    keyboard::GENERATE
                ),
            )
            .reply_markup(keyboard::content_keyboard())
            .await?;
            dialogue.update(QuizState::ContentInput { session }).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please, send the text to build questions from.")
                .await?;
        }
    }

    Ok(())
}

/// Runs a generation round trip and shows whatever step the session ends on.
async fn generate<G: QuestionGenerator + Sync>(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    mut session: WizardSession,
    generator: &G,
) -> HandlerResult {
    let ticket = match session.begin_generate(generator) {
        Ok(ticket) => ticket,
        Err(err) => return report(bot, dialogue, chat_id, session, err).await,
    };
    let requested = ticket.params().question_count;

    bot.send_message(
        chat_id,
        format!("⏳ Generating {requested} questions, this can take a minute…"),
    )
    .reply_markup(ReplyMarkup::kb_remove())
    .await?;

    let outcome = generator.generate(ticket.params()).await;
    match session.finish_generate(ticket, outcome) {
        Ok(Some(received)) if received < requested as usize => {
            bot.send_message(
                chat_id,
                format!("Only {received} of {requested} questions came back."),
            )
            .await?;
        }
        Ok(_) => {}
        Err(err) => {
            bot.send_message(chat_id, format!("⚠️ {err}")).await?;
        }
    }

    show(bot, dialogue, chat_id, session).await
}

// ---------------------------------------------------------------- step 2

#[instrument(level = "info", skip(bot, dialogue, msg, session, generator), fields(chat = %msg.chat.id))]
pub(crate) async fn review<G: QuestionGenerator + Send + Sync>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut session: WizardSession,
    generator: Arc<G>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let review_mode = session.is_review_mode_active();

    match msg.text() {
        Some(keyboard::REVIEW) => match session.enter_review() {
            Ok(exit) => advance(&bot, &dialogue, chat_id, session, exit).await?,
            Err(err) => report(&bot, &dialogue, chat_id, session, err).await?,
        },
        Some(keyboard::FINALIZE) => match session.finalize() {
            Ok(exit) => advance(&bot, &dialogue, chat_id, session, exit).await?,
            Err(err) => report(&bot, &dialogue, chat_id, session, err).await?,
        },
        Some(keyboard::BACK) => match session.request_back_to_step_one() {
            Ok(()) => show(&bot, &dialogue, chat_id, session).await?,
            Err(err) => report(&bot, &dialogue, chat_id, session, err).await?,
        },
        Some(keyboard::REGENERATE) if !review_mode => {
            generate(&bot, &dialogue, chat_id, session, &*generator).await?;
        }
        Some(keyboard::ADD_QUESTION) if review_mode => {
            editor::add_question(&bot, &dialogue, chat_id, session).await?;
        }
        Some(keyboard::EDIT_QUESTION) if review_mode => {
            editor::choose_question(&bot, &dialogue, chat_id, session).await?;
        }
        // the source text stays editable next to the questions
        Some(text) if !review_mode => {
            session.set_content_text(text);
            bot.send_message(
                chat_id,
                format!("Source text updated. Press {} to use it.", keyboard::REGENERATE),
            )
            .await?;
            dialogue.update(QuizState::Review { session }).await?;
        }
        other => {
            tracing::info!("{}: invalid input '{:?}'", username(&msg), other);
            bot.send_message(chat_id, "Invalid input. Please try again.")
                .reply_markup(keyboard::review_keyboard(review_mode))
                .await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------- step 3

#[instrument(level = "info", skip(bot, dialogue, msg, session), fields(chat = %msg.chat.id))]
pub(crate) async fn receive_title(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut session: WizardSession,
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::BACK) if session.quiz_title().trim().is_empty() => {
            back_to_review(&bot, &dialogue, msg.chat.id, session).await?;
        }
        Some(keyboard::BACK) => show(&bot, &dialogue, msg.chat.id, session).await?,
        Some(title) => {
            tracing::info!("{} names the quiz '{}'.", username(&msg), title);
            session.set_quiz_title(title);
            show(&bot, &dialogue, msg.chat.id, session).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please, send a title of the new quiz.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, msg, session), fields(chat = %msg.chat.id))]
pub(crate) async fn receive_description(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut session: WizardSession,
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::BACK) => show(&bot, &dialogue, msg.chat.id, session).await?,
        Some(description) => {
            session.set_quiz_description(description);
            show(&bot, &dialogue, msg.chat.id, session).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please, send a description of the new quiz.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, msg, session, store), fields(chat = %msg.chat.id))]
pub(crate) async fn metadata<S: QuizStore + Send + Sync>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut session: WizardSession,
    store: Arc<S>,
) -> HandlerResult {
    let chat_id = msg.chat.id;

    match msg.text() {
        Some(keyboard::CHANGE_TITLE) => {
            bot.send_message(chat_id, "What's the new title?")
                .reply_markup(keyboard::back_keyboard())
                .await?;
            dialogue.update(QuizState::ReceiveTitle { session }).await?;
        }
        Some(keyboard::ADD_DESCRIPTION) => {
            bot.send_message(chat_id, "What is the quiz about?")
                .reply_markup(keyboard::back_keyboard())
                .await?;
            dialogue
                .update(QuizState::ReceiveDescription { session })
                .await?;
        }
        Some(keyboard::SAVE_QUIZ) => {
            let author = author_of(&msg);
            tracing::info!("{} saves quiz '{}'.", username(&msg), session.quiz_title());
            match session
                .request_save_and_advance(Some(&author), &*store)
                .await
            {
                Ok(exit) => advance(&bot, &dialogue, chat_id, session, exit).await?,
                Err(err) => report(&bot, &dialogue, chat_id, session, err).await?,
            }
        }
        Some(keyboard::BACK) => back_to_review(&bot, &dialogue, chat_id, session).await?,
        other => {
            tracing::info!("{}: invalid input '{:?}'", username(&msg), other);
            bot.send_message(chat_id, "Invalid input. Please try again.")
                .reply_markup(keyboard::metadata_keyboard())
                .await?;
        }
    }

    Ok(())
}

async fn back_to_review(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    mut session: WizardSession,
) -> HandlerResult {
    match session.request_back_to_step_two() {
        Ok(exit) => advance(bot, dialogue, chat_id, session, exit).await,
        Err(err) => report(bot, dialogue, chat_id, session, err).await,
    }
}

// ---------------------------------------------------------------- step 4

#[instrument(level = "info", skip(bot, dialogue, msg, session), fields(chat = %msg.chat.id))]
pub(crate) async fn completion(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut session: WizardSession,
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::CREATE_ANOTHER) => match session.request_restart() {
            Ok(exit) => advance(&bot, &dialogue, msg.chat.id, session, exit).await?,
            Err(err) => report(&bot, &dialogue, msg.chat.id, session, err).await?,
        },
        _ => {
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .reply_markup(keyboard::completion_keyboard())
                .await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------- rendering

/// Retires the outgoing view by removing its keyboard, applies the pending
/// transition once Telegram has confirmed, then shows the new step.
pub(crate) async fn advance(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    mut session: WizardSession,
    exit: ExitRequest,
) -> HandlerResult {
    let farewell = match exit.transition {
        Transition::EnterReview => "Opening the full review…",
        Transition::AdvanceToStepThree => "Moving on to the quiz details…",
        Transition::ReturnToStepTwo => "Back to the questions…",
        Transition::AdvanceToStepFour => "Quiz saved!",
        Transition::Restart => "Starting a new quiz…",
    };
    bot.send_message(chat_id, farewell)
        .reply_markup(ReplyMarkup::kb_remove())
        .await?;

    session.complete_exit(exit.view)?;
    show(bot, dialogue, chat_id, session).await
}

/// Tells the user what went wrong and keeps them on the current step.
pub(crate) async fn report(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    session: WizardSession,
    err: WizardError,
) -> HandlerResult {
    tracing::warn!(error = %err, step = session.step_index(), "Wizard operation rejected");
    bot.send_message(chat_id, format!("⚠️ {err}")).await?;
    dialogue.update(resting_state(session)).await?;
    Ok(())
}

pub(crate) async fn show(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    session: WizardSession,
) -> HandlerResult {
    let state = show_step(bot, chat_id, session).await?;
    dialogue.update(state).await?;
    Ok(())
}

/// Sends the screen of the session's active step and returns the dialogue
/// state that handles its input.
pub(crate) async fn show_step(
    bot: &Bot,
    chat_id: ChatId,
    session: WizardSession,
) -> Result<QuizState, RequestError> {
    let bar = session.progress();
    let progress = format!("{} · {}%", bar.label(), bar.percentage());

    match session.step() {
        Step::ContentInput => {
            let params = session.params();
            let grade = params
                .grade_level
                .map(|grade| grade.to_string())
                .unwrap_or_else(|| "any".to_owned());
            bot.send_message(
                chat_id,
                format!(
                    "{progress}\n\nSend the text to build questions from, then press {}.\n\n\
                     Questions: {} · Grade: {} · Language: {}\n\
                     Change them with /count, /grade and /language.",
                    keyboard::GENERATE,
                    params.question_count,
                    grade,
                    params.language,
                ),
            )
            .reply_markup(keyboard::content_keyboard())
            .await?;
            Ok(QuizState::ContentInput { session })
        }
        Step::Review => {
            let review_mode = session.is_review_mode_active();
            let hint = if review_mode {
                format!(
                    "Add or edit questions, then press {} to continue.",
                    keyboard::FINALIZE
                )
            } else {
                format!(
                    "Send new text and press {}, or press {} to work on the questions.",
                    keyboard::REGENERATE,
                    keyboard::REVIEW
                )
            };
            let mut chunks = overview_chunks(&session);
            let last = chunks.pop().unwrap_or_default();
            let closing = format!("{progress}\n\n{last}\n\n{hint}");
            let closing = if closing.len() > MESSAGE_LIMIT {
                chunks.push(last);
                format!("{progress}\n\n{hint}")
            } else {
                closing
            };
            for chunk in chunks {
                bot.send_message(chat_id, chunk).await?;
            }
            bot.send_message(chat_id, closing)
                .reply_markup(keyboard::review_keyboard(review_mode))
                .await?;
            Ok(QuizState::Review { session })
        }
        Step::Metadata if session.quiz_title().trim().is_empty() => {
            bot.send_message(chat_id, format!("{progress}\n\nWhat's the title of the quiz?"))
                .reply_markup(keyboard::back_keyboard())
                .await?;
            Ok(QuizState::ReceiveTitle { session })
        }
        Step::Metadata => {
            let description = match session.quiz_description().trim() {
                "" => "(none)",
                description => description,
            };
            bot.send_message(
                chat_id,
                format!(
                    "{progress}\n\nTitle: {}\nDescription: {}\nQuestions ready to save: {}",
                    session.quiz_title().trim(),
                    description,
                    session.questions().validate_for_save().len(),
                ),
            )
            .reply_markup(keyboard::metadata_keyboard())
            .await?;
            Ok(QuizState::Metadata { session })
        }
        Step::Completion => {
            let saved = session
                .saved()
                .map(|saved| format!("Saved as {}.", saved.path))
                .unwrap_or_default();
            bot.send_message(
                chat_id,
                format!("{progress}\n\n🎉 Your quiz is ready. {saved}"),
            )
            .reply_markup(keyboard::completion_keyboard())
            .await?;
            Ok(QuizState::Completion { session })
        }
        Step::Transient => {
            tracing::warn!(pending = ?session.pending(), "Nothing to show while a view is exiting");
            bot.send_message(chat_id, "Something went wrong. Enter /start to begin again.")
                .await?;
            Ok(QuizState::Start)
        }
    }
}

/// Dialogue state for the session's step, without sending anything.
pub(crate) fn resting_state(session: WizardSession) -> QuizState {
    match session.step() {
        Step::ContentInput => QuizState::ContentInput { session },
        Step::Review => QuizState::Review { session },
        Step::Metadata if session.quiz_title().trim().is_empty() => {
            QuizState::ReceiveTitle { session }
        }
        Step::Metadata => QuizState::Metadata { session },
        Step::Completion => QuizState::Completion { session },
        Step::Transient => QuizState::Start,
    }
}

/// The question list split into messages Telegram accepts.
fn overview_chunks(session: &WizardSession) -> Vec<String> {
    let questions = session.questions();
    if questions.is_empty() {
        return vec!["No questions yet.".to_owned()];
    }

    let mut chunks = vec![String::new()];
    for (idx, question) in questions.iter().enumerate() {
        let marker = if question.is_newly_added() { " 🆕" } else { "" };
        let card = format!("{}.{marker} {}\n\n", idx + 1, card(question));
        let fits = chunks
            .last()
            .is_some_and(|chunk| chunk.len() + card.len() <= MESSAGE_LIMIT);
        match chunks.last_mut() {
            Some(chunk) if fits => chunk.push_str(&card),
            _ => chunks.push(card),
        }
    }
    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end().to_owned())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// A question card cut down to [`CARD_LIMIT`] bytes.
pub(crate) fn card(question: &QuestionItem) -> String {
    let mut text = question.to_string();
    if text.len() > CARD_LIMIT {
        let mut end = CARD_LIMIT - '…'.len_utf8();
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push('…');
    }
    text
}

fn author_of(msg: &Message) -> Author {
    let full_name = [msg.chat.first_name(), msg.chat.last_name()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let display_name = Some(full_name)
        .filter(|name| !name.trim().is_empty())
        .or_else(|| msg.chat.username().map(str::to_owned));

    Author {
        user_id: msg.chat.id.0.to_string(),
        display_name,
    }
}

pub(crate) fn username(msg: &Message) -> &str {
    msg.chat.username().unwrap_or("anonymous")
}
