//! Business logic services

pub mod items;
pub mod requests;
pub mod stats;

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::UserContact,
    repository::{Repository, UserStore},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub items: items::ItemsService,
    pub requests: requests::RequestsService,
    pub stats: stats::StatsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        Self {
            items: items::ItemsService::new(repository.clone()),
            requests: requests::RequestsService::new(repository.clone()),
            stats: stats::StatsService::new(repository.clone()),
            repository,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.users.ping().await
    }
}

/// Contacts keyed by user id. Unknown users are simply absent.
pub(crate) async fn contact_map(
    users: &dyn UserStore,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, UserContact>> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let contacts = users.contacts(&ids).await?;
    Ok(contacts.into_iter().map(|c| (c.id, c)).collect())
}
