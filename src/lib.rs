use state::QuizState;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

pub mod authoring;
pub mod collection;
pub mod commands;
pub mod config;
pub mod database;
pub mod editor;
pub mod error;
pub mod generation;
pub mod keyboard;
pub mod schema;
pub mod state;
pub mod wizard;

type UserDialogue = Dialogue<QuizState, InMemStorage<QuizState>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
