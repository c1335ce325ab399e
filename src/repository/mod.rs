//! Store layer.
//!
//! Services only see the store traits below. Two implementations exist:
//! PostgreSQL (`items`, `requests`, `users`) and an in-memory store
//! (`memory`) used for tests and the `memory` backend.

pub mod items;
pub mod memory;
pub mod requests;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        request::Participant, DonationRequest, Item, ItemFilter, NewItem, NewRequest, PageRequest,
        RequestStatus, StatusChange, UserContact,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, item: NewItem) -> AppResult<Item>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Item>>;

    async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>>;

    /// Matching items, newest first, and the total match count
    async fn search(&self, filter: &ItemFilter, page: PageRequest) -> AppResult<(Vec<Item>, i64)>;

    async fn list_by_donor(&self, donor_id: Uuid) -> AppResult<Vec<Item>>;

    /// Persist the editable fields of `item`. Status is never written here.
    async fn update(&self, item: &Item) -> AppResult<Item>;

    /// Returns false when the item did not exist
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fails with Conflict when an active request already exists for the
    /// same (item, receiver)
    async fn insert(&self, request: NewRequest) -> AppResult<DonationRequest>;

    async fn get(&self, id: Uuid) -> AppResult<Option<DonationRequest>>;

    async fn find_active(&self, item_id: Uuid, receiver_id: Uuid) -> AppResult<Option<DonationRequest>>;

    async fn list(
        &self,
        participant: Participant,
        status: Option<RequestStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<DonationRequest>, i64)>;

    async fn count_by_status(&self, participant: Participant) -> AppResult<Vec<(RequestStatus, i64)>>;

    /// Apply the request transition and its item side effect atomically.
    /// Fails with InvalidState when the request no longer has `change.from`.
    async fn transition(&self, change: &StatusChange) -> AppResult<DonationRequest>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Contacts for the known ids; unknown ids are skipped
    async fn contacts(&self, ids: &[Uuid]) -> AppResult<Vec<UserContact>>;

    async fn ping(&self) -> AppResult<()>;
}

/// Store handles passed to the services
#[derive(Clone)]
pub struct Repository {
    pub items: Arc<dyn ItemStore>,
    pub requests: Arc<dyn RequestStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            items: Arc::new(items::ItemsRepository::new(pool.clone())),
            requests: Arc::new(requests::RequestsRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Create a repository over a shared in-memory store
    pub fn in_memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            items: store.clone(),
            requests: store.clone(),
            users: store,
        }
    }
}
