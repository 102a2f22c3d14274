//! GraphQL query engine over stored messages

use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Schema, SimpleObject};
use chatgate_core::StartupError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Route the engine is mounted on
pub const GRAPHQL_PATH: &str = "/api/v1/graphql";

const DEFAULT_LIMIT: i32 = 50;
const MAX_LIMIT: i32 = 200;

pub type MessageSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// A stored Telegram message
#[derive(Debug, Clone, SimpleObject, sqlx::FromRow)]
pub struct MessageRecord {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub text: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Stored messages, newest first
    async fn messages(
        &self,
        ctx: &Context<'_>,
        chat_id: Option<i64>,
        limit: Option<i32>,
    ) -> async_graphql::Result<Vec<MessageRecord>> {
        let pool = ctx.data::<PgPool>()?;

        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT chat_id, message_id, sender_id, sender_username, text, sent_at, received_at
            FROM telegram_messages
            WHERE ($1::BIGINT IS NULL OR chat_id = $1)
            ORDER BY sent_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(chat_id)
        .bind(i64::from(clamp_limit(limit)))
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    /// Number of stored messages
    async fn message_count(
        &self,
        ctx: &Context<'_>,
        chat_id: Option<i64>,
    ) -> async_graphql::Result<i64> {
        let pool = ctx.data::<PgPool>()?;

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM telegram_messages WHERE ($1::BIGINT IS NULL OR chat_id = $1)",
        )
        .bind(chat_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

fn clamp_limit(limit: Option<i32>) -> i32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Query engine bound to the database pool
#[derive(Clone)]
pub struct QueryEngine {
    schema: MessageSchema,
}

impl QueryEngine {
    /// Build the engine without touching the database
    pub fn new(pool: PgPool) -> Self {
        let schema = Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
            .data(pool)
            .finish();

        Self { schema }
    }

    /// Build the engine after checking the backing table exists
    pub async fn connect(pool: PgPool) -> Result<Self, StartupError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT to_regclass('public.telegram_messages') IS NOT NULL",
        )
        .fetch_one(&pool)
        .await
        .map_err(|e| StartupError::QueryEngine(format!("schema check failed: {e}")))?;

        if !exists {
            return Err(StartupError::QueryEngine(
                "table telegram_messages does not exist".to_string(),
            ));
        }

        tracing::info!("✓ GraphQL engine configured");
        Ok(Self::new(pool))
    }

    pub async fn execute(&self, request: async_graphql::Request) -> async_graphql::Response {
        self.schema.execute(request).await
    }

    /// Schema in SDL form
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }
}
