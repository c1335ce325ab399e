//! In-memory store.
//!
//! Every operation runs under a single lock, so a request transition and
//! its item side effect are observed together.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        request::Participant, DonationRequest, Item, ItemFilter, ItemStatus, NewItem, NewRequest,
        PageRequest, RequestStatus, StatusChange, UserContact,
    },
};

use super::{ItemStore, RequestStore, UserStore};

#[derive(Default)]
struct MemoryState {
    items: HashMap<Uuid, Item>,
    requests: HashMap<Uuid, DonationRequest>,
    users: HashMap<Uuid, UserContact>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing timestamps keep newest-first ordering stable
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(now);
        now
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user contact, as the session provider would
    pub async fn insert_user(&self, contact: UserContact) {
        self.state.write().await.users.insert(contact.id, contact);
    }
}

fn newest_first<T, F>(records: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    records.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, item: NewItem) -> AppResult<Item> {
        let mut state = self.state.write().await;
        let now = state.now();
        let item = item.into_item(now);
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Item>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.items.get(id).cloned()).collect())
    }

    async fn search(&self, filter: &ItemFilter, page: PageRequest) -> AppResult<(Vec<Item>, i64)> {
        let state = self.state.read().await;
        let mut matching: Vec<Item> = state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        newest_first(&mut matching, |i| (i.created_at, i.id));

        let total = matching.len() as i64;
        Ok((page.slice(&matching), total))
    }

    async fn list_by_donor(&self, donor_id: Uuid) -> AppResult<Vec<Item>> {
        let state = self.state.read().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.donor_id == donor_id)
            .cloned()
            .collect();
        newest_first(&mut items, |i| (i.created_at, i.id));
        Ok(items)
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        let mut state = self.state.write().await;
        let now = state.now();
        let stored = state
            .items
            .get_mut(&item.id)
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", item.id)))?;

        stored.title = item.title.clone();
        stored.description = item.description.clone();
        stored.category = item.category;
        stored.condition = item.condition;
        stored.images = item.images.clone();
        stored.quantity = item.quantity;
        stored.tags = item.tags.clone();
        stored.pickup_location = item.pickup_location.clone();
        stored.updated_at = now;

        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.state.write().await.items.remove(&id).is_some())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert(&self, request: NewRequest) -> AppResult<DonationRequest> {
        let mut state = self.state.write().await;
        let duplicate = state.requests.values().any(|r| {
            r.item_id == request.item_id && r.receiver_id == request.receiver_id && r.status.is_active()
        });
        if duplicate {
            return Err(AppError::Conflict(
                "You already have a pending or approved request for this item".to_string(),
            ));
        }

        let now = state.now();
        let request = request.into_request(now);
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<DonationRequest>> {
        Ok(self.state.read().await.requests.get(&id).cloned())
    }

    async fn find_active(&self, item_id: Uuid, receiver_id: Uuid) -> AppResult<Option<DonationRequest>> {
        let state = self.state.read().await;
        Ok(state
            .requests
            .values()
            .find(|r| r.item_id == item_id && r.receiver_id == receiver_id && r.status.is_active())
            .cloned())
    }

    async fn list(
        &self,
        participant: Participant,
        status: Option<RequestStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<DonationRequest>, i64)> {
        let state = self.state.read().await;
        let mut matching: Vec<DonationRequest> = state
            .requests
            .values()
            .filter(|r| participant.matches(r) && status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut matching, |r| (r.created_at, r.id));

        let total = matching.len() as i64;
        Ok((page.slice(&matching), total))
    }

    async fn count_by_status(&self, participant: Participant) -> AppResult<Vec<(RequestStatus, i64)>> {
        let state = self.state.read().await;
        let mut counts: HashMap<RequestStatus, i64> = HashMap::new();
        for request in state.requests.values().filter(|r| participant.matches(r)) {
            *counts.entry(request.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn transition(&self, change: &StatusChange) -> AppResult<DonationRequest> {
        let mut state = self.state.write().await;

        let current = state
            .requests
            .get(&change.request_id)
            .map(|r| r.status)
            .ok_or_else(|| {
                AppError::NotFound(format!("Request with id {} not found", change.request_id))
            })?;
        if current != change.from {
            return Err(AppError::InvalidState(format!(
                "Request status changed to {} concurrently",
                current
            )));
        }

        let held_elsewhere = state.requests.values().any(|r| {
            r.item_id == change.item_id
                && r.id != change.request_id
                && r.status == RequestStatus::Approved
        });

        let now = state.now();
        if let Some(item) = state.items.get_mut(&change.item_id) {
            let next: ItemStatus = change.item_effect.resolve(item.status, held_elsewhere);
            if next != item.status {
                tracing::debug!("Item {} status {} -> {}", item.id, item.status, next);
                item.status = next;
                item.updated_at = now;
            }
        }

        let request = state
            .requests
            .get_mut(&change.request_id)
            .ok_or_else(|| AppError::Internal("Request vanished during transition".to_string()))?;
        change.apply_to(request, now);
        Ok(request.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn contacts(&self, ids: &[Uuid]) -> AppResult<Vec<UserContact>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{CreateItem, ItemQuery};
    use crate::models::Category;

    fn new_item(donor: Uuid, title: &str, category: &str) -> NewItem {
        NewItem::new(
            donor,
            CreateItem {
                title: title.to_string(),
                description: "Gently used".to_string(),
                category: category.to_string(),
                condition: "good".to_string(),
                quantity: None,
                tags: None,
                pickup_location: "Dorm A".to_string(),
                images: vec![],
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_pages_concatenate_newest_first() {
        let store = MemoryStore::new();
        let donor = Uuid::new_v4();
        let mut created = Vec::new();
        for n in 0..7 {
            let item = ItemStore::insert(&store, new_item(donor, &format!("Pen {}", n), "pen"))
                .await
                .unwrap();
            created.push(item.id);
        }
        created.reverse();

        let filter = ItemFilter::default();
        let mut seen = Vec::new();
        for page in 1..=3 {
            let request = PageRequest::new(Some(page), Some(3)).unwrap();
            let (items, total) = store.search(&filter, request).await.unwrap();
            assert_eq!(total, 7);
            assert!(items.len() <= 3);
            assert_eq!(request.total_pages(total), 3);
            seen.extend(items.into_iter().map(|i| i.id));
        }
        assert_eq!(seen, created);
    }

    #[tokio::test]
    async fn test_search_filters_conjunctively() {
        let store = MemoryStore::new();
        let donor = Uuid::new_v4();
        ItemStore::insert(&store, new_item(donor, "Graphing calculator", "calculator"))
            .await
            .unwrap();
        ItemStore::insert(&store, new_item(donor, "Scientific calculator", "calculator"))
            .await
            .unwrap();
        ItemStore::insert(&store, new_item(donor, "Calculator manual", "book"))
            .await
            .unwrap();

        let filter = ItemFilter::from_query(&ItemQuery {
            category: Some("calculator".to_string()),
            search: Some("graphing".to_string()),
            ..Default::default()
        })
        .unwrap();
        let (items, total) = store.search(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "Graphing calculator");

        let by_category = ItemFilter {
            category: Some(Category::Calculator),
            ..Default::default()
        };
        let (_, total) = store.search(&by_category, PageRequest::default()).await.unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_update_never_touches_status() {
        let store = MemoryStore::new();
        let item = ItemStore::insert(&store, new_item(Uuid::new_v4(), "Ruler", "ruler"))
            .await
            .unwrap();

        let mut edited = item.clone();
        edited.status = ItemStatus::Donated;
        edited.title = "Steel ruler".to_string();
        let updated = ItemStore::update(&store, &edited).await.unwrap();

        assert_eq!(updated.title, "Steel ruler");
        assert_eq!(updated.status, ItemStatus::Available);
        assert!(updated.updated_at > item.updated_at);
    }

    #[tokio::test]
    async fn test_duplicate_active_request_conflicts() {
        let store = MemoryStore::new();
        let (item, receiver, donor) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        RequestStore::insert(&store, NewRequest::new(item, receiver, donor, None).unwrap())
            .await
            .unwrap();
        let second =
            RequestStore::insert(&store, NewRequest::new(item, receiver, donor, None).unwrap()).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let other_receiver =
            RequestStore::insert(&store, NewRequest::new(item, Uuid::new_v4(), donor, None).unwrap())
                .await;
        assert!(other_receiver.is_ok());
    }

    #[tokio::test]
    async fn test_stale_transition_rejected() {
        let store = MemoryStore::new();
        let item = ItemStore::insert(&store, new_item(Uuid::new_v4(), "Eraser", "eraser"))
            .await
            .unwrap();
        let request = RequestStore::insert(
            &store,
            NewRequest::new(item.id, Uuid::new_v4(), item.donor_id, None).unwrap(),
        )
        .await
        .unwrap();

        let approve = StatusChange::new(&request, RequestStatus::Approved).unwrap();
        let reject = StatusChange::new(&request, RequestStatus::Rejected).unwrap();

        store.transition(&approve).await.unwrap();
        let stale = store.transition(&reject).await;
        assert!(matches!(stale, Err(AppError::InvalidState(_))));

        let item = ItemStore::get(&store, item.id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Reserved);
    }

    #[tokio::test]
    async fn test_contacts_skip_unknown_users() {
        let store = MemoryStore::new();
        let known = UserContact {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@campus.edu".to_string(),
            university: None,
            department: None,
            phone_number: None,
        };
        store.insert_user(known.clone()).await;

        let contacts = store.contacts(&[known.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(contacts, vec![known]);
    }
}
