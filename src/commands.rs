use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{Message, ReplyMarkup},
    utils::command::BotCommands,
    Bot,
};
use tracing::instrument;

use crate::{
    error::InputError,
    keyboard::action_keyboard,
    state::QuizState,
    wizard::{Step, WizardSession},
    HandlerResult, UserDialogue,
};

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "display help.")]
    Help,
    #[command(description = "start the bot")]
    Start,
    #[command(description = "drop the quiz being authored")]
    Cancel,
    #[command(description = "number of questions to generate, e.g. /count 5")]
    Count(u32),
    #[command(description = "target grade level, /grade 0 for none")]
    Grade(u32),
    #[command(description = "language of the questions, e.g. /language en")]
    Language(String),
}

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub(crate) async fn cancel(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Cancelling dialogue")
        .reply_markup(ReplyMarkup::kb_remove())
        .await?;
    dialogue.update(QuizState::Start).await?;
    Ok(())
}

pub(crate) async fn start(bot: Bot, msg: Message, dialogue: UserDialogue) -> HandlerResult {
    bot.send_message(msg.chat.id, "Please choose what to do:")
        .reply_markup(action_keyboard())
        .await?;
    dialogue.update(QuizState::Start).await?;
    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, msg))]
pub(crate) async fn count(bot: Bot, dialogue: UserDialogue, msg: Message, count: u32) -> HandlerResult {
    if count == 0 {
        bot.send_message(msg.chat.id, InputError::InvalidQuestionCount.to_string())
            .await?;
        return Ok(());
    }
    let reply = format!("Questions to generate: {count}.");
    update_settings(bot, dialogue, msg, reply, |session| {
        session.set_question_count(count)
    })
    .await
}

#[instrument(level = "info", skip(bot, dialogue, msg))]
pub(crate) async fn grade(bot: Bot, dialogue: UserDialogue, msg: Message, grade: u32) -> HandlerResult {
    let grade = (grade > 0).then_some(grade);
    let reply = match grade {
        Some(grade) => format!("Grade level: {grade}."),
        None => "Grade level cleared.".to_owned(),
    };
    update_settings(bot, dialogue, msg, reply, |session| {
        session.set_grade_level(grade)
    })
    .await
}

#[instrument(level = "info", skip(bot, dialogue, msg))]
pub(crate) async fn language(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    language: String,
) -> HandlerResult {
    let language = language.trim().to_owned();
    if language.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /language en").await?;
        return Ok(());
    }
    let reply = format!("Language: {language}.");
    update_settings(bot, dialogue, msg, reply, |session| {
        session.set_language(language)
    })
    .await
}

/// Generation settings can only change while the step-1 form is visible:
/// on step 1 itself, or on step 2 in the dual view.
async fn update_settings(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    reply: String,
    apply: impl FnOnce(&mut WizardSession),
) -> HandlerResult {
    let state = dialogue.get_or_default().await?;
    let step_one_visible = state.session().is_some_and(|session| {
        session.step() == Step::ContentInput
            || (session.step() == Step::Review && !session.is_review_mode_active())
    });

    let next = match state {
        QuizState::ContentInput { mut session } if step_one_visible => {
            apply(&mut session);
            QuizState::ContentInput { session }
        }
        QuizState::Review { mut session } if step_one_visible => {
            apply(&mut session);
            QuizState::Review { session }
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "Generation settings can only be changed while entering the source text.",
            )
            .await?;
            return Ok(());
        }
    };

    tracing::info!(chat = %msg.chat.id, "Generation settings changed");
    bot.send_message(msg.chat.id, reply).await?;
    dialogue.update(next).await?;
    Ok(())
}

/// Slash-prefixed text that did not parse as a [`Command`], e.g. `/count`
/// without its number. Never treated as wizard input.
pub(crate) fn is_malformed_command(msg: Message) -> bool {
    msg.text().is_some_and(looks_like_command)
}

fn looks_like_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

#[instrument(level = "info", skip(bot, msg), fields(chat = %msg.chat.id))]
pub(crate) async fn malformed(bot: Bot, msg: Message) -> HandlerResult {
    tracing::info!("Unparsed command {:?}", msg.text());
    bot.send_message(
        msg.chat.id,
        "That command is unknown or is missing its argument, e.g. /count 5. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}
