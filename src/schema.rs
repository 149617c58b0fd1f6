use std::error::Error;

use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        DpHandlerDescription, UpdateFilterExt, UpdateHandler,
    },
    dptree::{self, Handler},
    prelude::{DependencyMap, Requester},
    types::{Message, Update},
    Bot,
};
use tracing::instrument;

use crate::{
    authoring,
    commands::{self, Command},
    database::connection::QuizStore,
    editor,
    generation::QuestionGenerator,
    state::QuizState,
    HandlerResult,
};

/// The whole dispatch tree. `G` and `S` are the generation and persistence
/// gateways, injected as `Arc<G>` / `Arc<S>` dependencies.
pub fn schema<G, S>() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>>
where
    G: QuestionGenerator + Send + Sync + 'static,
    S: QuizStore + Send + Sync + 'static,
{
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(commands::help))
        .branch(case![Command::Start].endpoint(commands::start))
        .branch(case![Command::Cancel].endpoint(commands::cancel))
        .branch(case![Command::Count(count)].endpoint(commands::count))
        .branch(case![Command::Grade(grade)].endpoint(commands::grade))
        .branch(case![Command::Language(language)].endpoint(commands::language));

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(commands::is_malformed_command).endpoint(commands::malformed))
        .branch(case![QuizState::Start].endpoint(authoring::choose_what_to_do))
        .branch(authoring_scheme::<G, S>())
        .branch(editor_scheme())
        .endpoint(invalid_state);

    dialogue::enter::<Update, InMemStorage<QuizState>, QuizState, _>().branch(handler)
}

#[instrument(level = "debug")]
fn authoring_scheme<G, S>() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
>
where
    G: QuestionGenerator + Send + Sync + 'static,
    S: QuizStore + Send + Sync + 'static,
{
    use dptree::case;
    tracing::debug!("Building a dispatch tree for the authoring wizard");
    Update::filter_message()
        .branch(case![QuizState::ContentInput { session }].endpoint(authoring::receive_content::<G>))
        .branch(case![QuizState::Review { session }].endpoint(authoring::review::<G>))
        .branch(case![QuizState::ReceiveTitle { session }].endpoint(authoring::receive_title))
        .branch(
            case![QuizState::ReceiveDescription { session }]
                .endpoint(authoring::receive_description),
        )
        .branch(case![QuizState::Metadata { session }].endpoint(authoring::metadata::<S>))
        .branch(case![QuizState::Completion { session }].endpoint(authoring::completion))
}

#[instrument(level = "debug")]
fn editor_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    tracing::debug!("Building dispatching tree for the question editor");
    Update::filter_message()
        .branch(case![QuizState::SelectQuestion { session }].endpoint(editor::select_question))
        .branch(
            case![QuizState::HandleQuestion { session, question }]
                .endpoint(editor::handle_question),
        )
        .branch(
            case![QuizState::EditField {
                session,
                question,
                field
            }]
            .endpoint(editor::edit_field),
        )
}

#[instrument(level = "info", skip(bot, msg), fields(chat = %msg.chat.id))]
async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    tracing::info!(
        "{}: invalid input '{:?}'",
        authoring::username(&msg),
        msg.text()
    );
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}
