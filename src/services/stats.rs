//! Request statistics service

use crate::{
    error::AppResult,
    models::{Caller, Participant, RequestStats},
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Per-status counts of the caller's requests, seen from the caller's role
    pub async fn request_stats(&self, caller: &Caller) -> AppResult<RequestStats> {
        let counts = self
            .repository
            .requests
            .count_by_status(Participant::from(caller))
            .await?;
        Ok(RequestStats::from_counts(&counts))
    }
}
