//! Items repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Item, ItemFilter, ItemStatus, NewItem, PageRequest},
};

use super::ItemStore;

const ITEM_COLUMNS: &str = "id, title, description, category, condition, images, donor_id, \
     status, quantity, tags, pickup_location, created_at, updated_at";

/// Same document the GIN index in the initial migration covers
const SEARCH_DOCUMENT: &str =
    "to_tsvector('simple', title || ' ' || description || ' ' || array_to_string(tags, ' '))";

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ItemFilter) {
        builder.push(" WHERE TRUE");

        if let Some(category) = filter.category {
            builder.push(" AND category = ").push_bind(category);
        }
        if let Some(condition) = filter.condition {
            builder.push(" AND condition = ").push_bind(condition);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(ref terms) = filter.search_terms {
            if terms.is_empty() {
                builder.push(" AND FALSE");
            } else {
                // Terms are alphanumeric only, so joining them with `|` is a
                // well-formed OR query
                builder
                    .push(" AND ")
                    .push(SEARCH_DOCUMENT)
                    .push(" @@ to_tsquery('simple', ")
                    .push_bind(terms.join(" | "))
                    .push(")");
            }
        }
    }
}

#[async_trait]
impl ItemStore for ItemsRepository {
    async fn insert(&self, item: NewItem) -> AppResult<Item> {
        let sql = format!(
            r#"
            INSERT INTO items (id, title, description, category, condition, images,
                               donor_id, status, quantity, tags, pickup_location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );

        let created = sqlx::query_as::<_, Item>(&sql)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.category)
            .bind(item.condition)
            .bind(&item.images)
            .bind(item.donor_id)
            .bind(ItemStatus::Available)
            .bind(item.quantity)
            .bind(&item.tags)
            .bind(&item.pickup_location)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM items WHERE id = ANY($1)", ITEM_COLUMNS);
        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn search(&self, filter: &ItemFilter, page: PageRequest) -> AppResult<(Vec<Item>, i64)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM items");
        Self::push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM items", ITEM_COLUMNS));
        Self::push_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        tracing::debug!("Item search: {}", query.sql());

        let items = query
            .build_query_as::<Item>()
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    async fn list_by_donor(&self, donor_id: Uuid) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE donor_id = $1 ORDER BY created_at DESC, id DESC",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(donor_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        let sql = format!(
            r#"
            UPDATE items
            SET title = $2, description = $3, category = $4, condition = $5, images = $6,
                quantity = $7, tags = $8, pickup_location = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );

        sqlx::query_as::<_, Item>(&sql)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.category)
            .bind(item.condition)
            .bind(&item.images)
            .bind(item.quantity)
            .bind(&item.tags)
            .bind(&item.pickup_location)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", item.id)))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
