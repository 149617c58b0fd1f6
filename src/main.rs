use std::borrow::Cow;
use std::sync::Arc;

use quizwright::config::Config;
use quizwright::database::connection::Connection;
use quizwright::generation::OpenAiGenerator;
use quizwright::schema::schema;
use quizwright::state::QuizState;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::IgnoringErrorHandlerSafe;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let config = Config::from_env()?;

    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from_level(config.log_level))
        .json()
        .with_span_events(FmtSpan::ENTER)
        .log_internal_errors(true)
        .with_line_number(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let connection = Connection::connect(Cow::Borrowed(config.database_url.as_str())).await?;
    connection.run_migrations().await?;
    let connection = Arc::new(connection);

    if config.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set, generation will be refused");
    }
    let generator = Arc::new(OpenAiGenerator::new(config.openai.clone())?);

    let bot = Bot::new(&config.teloxide_token);
    tracing::info!("Starting bot...");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema::<OpenAiGenerator, Connection>())
        .dependencies(dptree::deps![
            InMemStorage::<QuizState>::new(),
            connection,
            generator
        ])
        .enable_ctrlc_handler()
        .build();

    match config.webhook {
        Some(webhook) => {
            let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url)).await?;
            dispatcher
                .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
                .await
        }
        None => dispatcher.dispatch().await,
    }

    Ok(())
}
