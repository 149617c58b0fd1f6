use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{ChatId, Message},
    Bot,
};
use tracing::instrument;

use crate::{
    authoring::{card, report, show, username},
    collection::{QuestionField, QuestionId},
    keyboard::{self, edit_question_keyboard},
    state::QuizState,
    wizard::WizardSession,
    HandlerResult, UserDialogue,
};

/// Appends a blank card and opens it for editing.
pub(crate) async fn add_question(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    mut session: WizardSession,
) -> HandlerResult {
    let question = session.append_question();
    if session.take_scroll_request() {
        let position = session.questions().len();
        bot.send_message(
            chat_id,
            format!("New question #{position} added at the end of the list."),
        )
        .await?;
    }
    bot.send_message(chat_id, "What do you want to fill in first?")
        .reply_markup(edit_question_keyboard())
        .await?;
    dialogue
        .update(QuizState::HandleQuestion { session, question })
        .await?;
    Ok(())
}

pub(crate) async fn choose_question(
    bot: &Bot,
    dialogue: &UserDialogue,
    chat_id: ChatId,
    session: WizardSession,
) -> HandlerResult {
    if session.questions().is_empty() {
        bot.send_message(chat_id, "No questions yet. Add one first.")
            .await?;
        return Ok(());
    }
    bot.send_message(chat_id, "Select a question.")
        .reply_markup(keyboard::questions_keyboard(session.questions()))
        .await?;
    dialogue.update(QuizState::SelectQuestion { session }).await?;
    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, msg, session), fields(chat = %msg.chat.id))]
pub(crate) async fn select_question(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    session: WizardSession,
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::BACK) => show(&bot, &dialogue, msg.chat.id, session).await?,
        Some(label) => {
            let selected = keyboard::parse_question_label(label)
                .and_then(|idx| session.questions().nth(idx))
                .map(|question| (question.id(), card(question)));
            match selected {
                Some((question, text)) => {
                    tracing::info!("{} selects question {}.", username(&msg), question);
                    bot.send_message(msg.chat.id, text)
                        .reply_markup(edit_question_keyboard())
                        .await?;
                    dialogue
                        .update(QuizState::HandleQuestion { session, question })
                        .await?;
                }
                None => {
                    bot.send_message(msg.chat.id, "Question not found.")
                        .await?;
                }
            }
        }
        None => {
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, msg, session), fields(chat = %msg.chat.id))]
pub(crate) async fn handle_question(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (mut session, question): (WizardSession, QuestionId),
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::DELETE_QUESTION) => {
            let deleted = session.remove_question(question);
            tracing::info!("{} deletes question {} ({}).", username(&msg), question, deleted.is_some());
            bot.send_message(msg.chat.id, "Question deleted.").await?;
            show(&bot, &dialogue, msg.chat.id, session).await?;
        }
        Some(keyboard::BACK) => show(&bot, &dialogue, msg.chat.id, session).await?,
        Some(text) => match keyboard::parse_field_button(text) {
            Some(field) => {
                let current = session
                    .questions()
                    .get(question)
                    .map(|item| item.field(field).to_owned())
                    .unwrap_or_default();
                let prompt = if current.is_empty() {
                    format!("What's the {}?", field.label())
                } else {
                    format!("Current {}: {current}\nWhat's the new one?", field.label())
                };
                bot.send_message(msg.chat.id, prompt)
                    .reply_markup(keyboard::back_keyboard())
                    .await?;
                dialogue
                    .update(QuizState::EditField { session, question, field })
                    .await?;
            }
            None => {
                bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                    .reply_markup(edit_question_keyboard())
                    .await?;
            }
        },
        None => {
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, msg, session), fields(chat = %msg.chat.id))]
pub(crate) async fn edit_field(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (mut session, question, field): (WizardSession, QuestionId, QuestionField),
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::BACK) => {
            bot.send_message(msg.chat.id, "Handle question.")
                .reply_markup(edit_question_keyboard())
                .await?;
            dialogue
                .update(QuizState::HandleQuestion { session, question })
                .await?;
        }
        Some(value) => match session.update_question(question, field, value) {
            Ok(()) => {
                tracing::info!("{} edits the {} of question {}.", username(&msg), field.label(), question);
                let updated = session
                    .questions()
                    .get(question)
                    .map(card)
                    .unwrap_or_default();
                bot.send_message(msg.chat.id, format!("Updated.\n\n{updated}"))
                    .reply_markup(edit_question_keyboard())
                    .await?;
                dialogue
                    .update(QuizState::HandleQuestion { session, question })
                    .await?;
            }
            Err(err) => report(&bot, &dialogue, msg.chat.id, session, err).await?,
        },
        None => {
            bot.send_message(msg.chat.id, format!("Please, send the new {}.", field.label()))
                .await?;
        }
    }

    Ok(())
}
