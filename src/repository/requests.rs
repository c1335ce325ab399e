//! Requests repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        request::Participant, DonationRequest, ItemStatus, NewRequest, PageRequest, RequestStatus,
        StatusChange,
    },
};

use super::RequestStore;

const REQUEST_COLUMNS: &str = "id, item_id, receiver_id, donor_id, message, status, \
     response_message, scheduled_pickup_date, created_at, updated_at";

#[derive(Clone)]
pub struct RequestsRepository {
    pool: Pool<Postgres>,
}

impl RequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn participant_column(participant: &Participant) -> (&'static str, Uuid) {
        match *participant {
            Participant::Donor(id) => ("donor_id", id),
            Participant::Receiver(id) => ("receiver_id", id),
        }
    }

    fn push_filter(
        builder: &mut QueryBuilder<'_, Postgres>,
        participant: &Participant,
        status: Option<RequestStatus>,
    ) {
        let (column, user_id) = Self::participant_column(participant);
        builder
            .push(" WHERE ")
            .push(column)
            .push(" = ")
            .push_bind(user_id);
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status);
        }
    }
}

#[async_trait]
impl RequestStore for RequestsRepository {
    async fn insert(&self, request: NewRequest) -> AppResult<DonationRequest> {
        let sql = format!(
            r#"
            INSERT INTO requests (id, item_id, receiver_id, donor_id, message, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        );

        sqlx::query_as::<_, DonationRequest>(&sql)
            .bind(request.id)
            .bind(request.item_id)
            .bind(request.receiver_id)
            .bind(request.donor_id)
            .bind(&request.message)
            .bind(RequestStatus::Pending)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                // uq_requests_active_item_receiver
                sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
                    "You already have a pending or approved request for this item".to_string(),
                ),
                other => AppError::Database(other),
            })
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<DonationRequest>> {
        let sql = format!("SELECT {} FROM requests WHERE id = $1", REQUEST_COLUMNS);
        let request = sqlx::query_as::<_, DonationRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn find_active(&self, item_id: Uuid, receiver_id: Uuid) -> AppResult<Option<DonationRequest>> {
        let sql = format!(
            r#"
            SELECT {} FROM requests
            WHERE item_id = $1 AND receiver_id = $2 AND status IN ('pending', 'approved')
            "#,
            REQUEST_COLUMNS
        );
        let request = sqlx::query_as::<_, DonationRequest>(&sql)
            .bind(item_id)
            .bind(receiver_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn list(
        &self,
        participant: Participant,
        status: Option<RequestStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<DonationRequest>, i64)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM requests");
        Self::push_filter(&mut count_query, &participant, status);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM requests", REQUEST_COLUMNS));
        Self::push_filter(&mut query, &participant, status);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let requests = query
            .build_query_as::<DonationRequest>()
            .fetch_all(&self.pool)
            .await?;

        Ok((requests, total))
    }

    async fn count_by_status(&self, participant: Participant) -> AppResult<Vec<(RequestStatus, i64)>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT status, COUNT(*) FROM requests");
        Self::push_filter(&mut query, &participant, None);
        query.push(" GROUP BY status");

        let counts = query
            .build_query_as::<(RequestStatus, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(counts)
    }

    async fn transition(&self, change: &StatusChange) -> AppResult<DonationRequest> {
        let mut tx = self.pool.begin().await?;

        // Lock the item first so concurrent transitions on the same item
        // see each other's approvals
        let item_status: Option<ItemStatus> =
            sqlx::query_scalar("SELECT status FROM items WHERE id = $1 FOR UPDATE")
                .bind(change.item_id)
                .fetch_optional(&mut *tx)
                .await?;

        let sql = format!(
            r#"
            UPDATE requests
            SET status = $3,
                response_message = COALESCE($4, response_message),
                scheduled_pickup_date = COALESCE($5, scheduled_pickup_date),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        );
        let updated = sqlx::query_as::<_, DonationRequest>(&sql)
            .bind(change.request_id)
            .bind(change.from)
            .bind(change.to)
            .bind(&change.response_message)
            .bind(change.scheduled_pickup_date)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(request) = updated else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM requests WHERE id = $1)")
                    .bind(change.request_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                AppError::InvalidState(format!(
                    "Request {} is no longer {}",
                    change.request_id, change.from
                ))
            } else {
                AppError::NotFound(format!("Request with id {} not found", change.request_id))
            });
        };

        if let Some(current) = item_status {
            let held_elsewhere: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM requests
                    WHERE item_id = $1 AND id <> $2 AND status = 'approved'
                )
                "#,
            )
            .bind(change.item_id)
            .bind(change.request_id)
            .fetch_one(&mut *tx)
            .await?;

            let next = change.item_effect.resolve(current, held_elsewhere);
            if next != current {
                sqlx::query("UPDATE items SET status = $2, updated_at = NOW() WHERE id = $1")
                    .bind(change.item_id)
                    .bind(next)
                    .execute(&mut *tx)
                    .await?;
                tracing::debug!("Item {} status {} -> {}", change.item_id, current, next);
            }
        } else {
            tracing::warn!(
                "Request {} references missing item {}",
                change.request_id,
                change.item_id
            );
        }

        tx.commit().await?;
        Ok(request)
    }
}
