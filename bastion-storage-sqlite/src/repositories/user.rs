use async_trait::async_trait;
use bastion_core::{Error, NewUser, User, UserId, repositories::UserRepository};
use sqlx::SqlitePool;

use crate::{from_timestamp, repositories::db_error};

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, SqliteUser>(&format!(
            "SELECT id, username, email, created_at FROM users WHERE {column} = ?1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to look up user"))?
        .map(User::try_from)
        .transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteUser {
    id: String,
    username: String,
    email: String,
    created_at: i64,
}

impl TryFrom<SqliteUser> for User {
    type Error = Error;

    fn try_from(row: SqliteUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from(row.id),
            username: row.username,
            email: row.email,
            created_at: from_timestamp(row.created_at)?,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query_as::<_, SqliteUser>(
            r#"
            INSERT INTO users (id, username, email, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create user"))?
        .try_into()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.find_one("id", id.as_str()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        self.find_one("username", username).await
    }
}
