use std::{borrow::Cow, future::Future};

use sqlx::postgres::PgPool;

use super::quiz::{QuizId, QuizPayload, SaveConfirmation};
use crate::error::GatewayError;

/// Table the quizzes live in; also the prefix of the path reported back.
const QUIZ_TABLE: &str = "user_topics";

pub struct Connection {
    pool: PgPool,
}

impl Connection {
    pub async fn connect(connection_string: Cow<'_, str>) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(&connection_string).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::debug!("Running migrations");
        sqlx::migrate!().run(&self.pool).await
    }
}

/// Where finished quizzes go.
pub trait QuizStore {
    /// Writes the quiz under `quiz_id`, replacing whatever was stored there.
    fn persist(
        &self,
        quiz_id: &QuizId,
        payload: &QuizPayload,
    ) -> impl Future<Output = Result<SaveConfirmation, GatewayError>> + Send;
}

impl QuizStore for Connection {
    async fn persist(
        &self,
        quiz_id: &QuizId,
        payload: &QuizPayload,
    ) -> Result<SaveConfirmation, GatewayError> {
        let document = serde_json::to_value(payload).map_err(GatewayError::Encode)?;
        tracing::debug!(
            quiz_id = %quiz_id,
            size = document.to_string().len(),
            "Writing quiz"
        );

        sqlx::query(
            "INSERT INTO user_topics (id, owner_id, title, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
             owner_id = EXCLUDED.owner_id, title = EXCLUDED.title, \
             payload = EXCLUDED.payload, created_at = EXCLUDED.created_at",
        )
        .bind(quiz_id.as_str())
        .bind(&payload.user_id)
        .bind(&payload.title)
        .bind(document)
        .bind(payload.created_at)
        .execute(&self.pool)
        .await?;

        Ok(SaveConfirmation {
            quiz_id: quiz_id.clone(),
            path: format!("{QUIZ_TABLE}/{quiz_id}"),
        })
    }
}
