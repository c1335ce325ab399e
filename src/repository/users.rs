//! Users repository (read-only contact lookups)

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{error::AppResult, models::UserContact};

use super::UserStore;

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn contacts(&self, ids: &[Uuid]) -> AppResult<Vec<UserContact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let contacts = sqlx::query_as::<_, UserContact>(
            r#"
            SELECT id, name, email, university, department, phone_number
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
