use crate::{
    chat::Message,
    entity::{User, UserId},
};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    ConnectOptions, Row, SqlitePool,
};
use std::{path::Path, str::FromStr};
use thiserror::Error;
use tracing::info;

/// Users inserted into an empty database on first start.
const DEFAULT_USERS: &[&str] = &["Kashif", "Ali"];

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.sender_id, m.receiver_id, m.content, m.created_at,
           s.name AS sender_name, r.name AS receiver_name
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id
"#;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("message {0} vanished after insert")]
    MissingAfterInsert(i64),
}

/// Durable create/query of message records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message and return it with sender and receiver info attached.
    async fn create(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Every message the user sent or received, oldest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Message>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `db_path`.
    pub async fn new(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());
        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .log_statements(tracing::log::LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// A private in-memory database. Pinned to one connection that never
    /// expires, since every sqlite memory connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .log_statements(tracing::log::LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Ok(Self { pool })
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL REFERENCES users(id),
                receiver_id INTEGER NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_sender_created ON messages(sender_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_messages_receiver_created ON messages(receiver_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    pub async fn create_user(&self, name: &str) -> Result<User, StoreError> {
        let result = sqlx::query("INSERT INTO users (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: UserId::new(result.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    /// Insert the default users when the table is empty. Returns how many were added.
    pub async fn seed_default_users(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(0);
        }

        for name in DEFAULT_USERS {
            let user = self.create_user(name).await?;
            info!(user_id = %user.id, name = %user.name, "Seeded user");
        }

        Ok(DEFAULT_USERS.len())
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    let sender_id = UserId::new(row.try_get("sender_id")?);
    let receiver_id = UserId::new(row.try_get("receiver_id")?);

    Ok(Message {
        id: row.try_get("id")?,
        sender_id,
        receiver_id,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        sender: User {
            id: sender_id,
            name: row.try_get("sender_name")?,
        },
        receiver: User {
            id: receiver_id,
            name: row.try_get("receiver_name")?,
        },
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<Message, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(sender_id.get())
        .bind(receiver_id.get())
        .bind(content)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::MissingAfterInsert(id))?;

        Ok(message_from_row(&row)?)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.sender_id = ? OR m.receiver_id = ? ORDER BY m.created_at ASC, m.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.get())
            .bind(user_id.get())
            .fetch_all(&self.pool)
            .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(User {
                    id: UserId::new(row.try_get("id")?),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}
