//! Donation request workflow service

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        parse_field,
        request::{normalize_message, CreateRequest, RequestQuery, UpdateRequestStatus},
        Caller, DonationRequest, ItemStatus, ItemSummary, NewRequest, Page, PageRequest,
        Participant, RequestDetails, RequestStatus, StatusChange,
    },
    repository::Repository,
};

use super::contact_map;

#[derive(Clone)]
pub struct RequestsService {
    repository: Repository,
}

impl RequestsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Attach item summaries and both parties' contacts, keeping the input order
    async fn populate(&self, requests: Vec<DonationRequest>) -> AppResult<Vec<RequestDetails>> {
        let mut item_ids: Vec<Uuid> = requests.iter().map(|r| r.item_id).collect();
        item_ids.sort_unstable();
        item_ids.dedup();

        let items: HashMap<Uuid, ItemSummary> = self
            .repository
            .items
            .get_many(&item_ids)
            .await?
            .iter()
            .map(|item| (item.id, ItemSummary::from(item)))
            .collect();

        let contacts = contact_map(
            self.repository.users.as_ref(),
            requests.iter().flat_map(|r| [r.receiver_id, r.donor_id]),
        )
        .await?;

        Ok(requests
            .into_iter()
            .map(|request| RequestDetails {
                item: items.get(&request.item_id).cloned(),
                receiver: contacts.get(&request.receiver_id).cloned(),
                donor: contacts.get(&request.donor_id).cloned(),
                request,
            })
            .collect())
    }

    async fn populate_one(&self, request: DonationRequest) -> AppResult<RequestDetails> {
        self.populate(vec![request])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Request lost while populating".to_string()))
    }

    async fn load(&self, id: Uuid) -> AppResult<DonationRequest> {
        self.repository
            .requests
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request with id {} not found", id)))
    }

    /// Request an available item as the calling receiver
    pub async fn create(&self, caller: &Caller, input: CreateRequest) -> AppResult<RequestDetails> {
        let message = normalize_message(input.message)?;

        let item = self
            .repository
            .items
            .get(input.item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", input.item_id)))?;

        if item.status != ItemStatus::Available {
            return Err(AppError::InvalidState(format!(
                "Item {} is {} and cannot be requested",
                item.id, item.status
            )));
        }
        if item.donor_id == caller.id {
            return Err(AppError::Authorization(
                "You cannot request your own item".to_string(),
            ));
        }
        if self
            .repository
            .requests
            .find_active(item.id, caller.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You already have a pending or approved request for this item".to_string(),
            ));
        }

        let new_request = NewRequest::new(item.id, caller.id, item.donor_id, message)?;
        let request = self.repository.requests.insert(new_request).await?;
        tracing::info!(
            "Request {} created by receiver {} for item {}",
            request.id,
            caller.id,
            item.id
        );

        self.populate_one(request).await
    }

    /// The caller's requests: received ones for donors, sent ones for receivers
    pub async fn list(&self, caller: &Caller, query: &RequestQuery) -> AppResult<Page<RequestDetails>> {
        let status: Option<RequestStatus> = query
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_field)
            .transpose()?;
        let page = PageRequest::new(query.page, query.limit)?;

        let (requests, total) = self
            .repository
            .requests
            .list(Participant::from(caller), status, page)
            .await?;
        let details = self.populate(requests).await?;
        Ok(Page::new(details, total, page))
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> AppResult<RequestDetails> {
        let request = self.load(id).await?;
        if !request.involves(caller.id) {
            return Err(AppError::Authorization(
                "You are not a participant of this request".to_string(),
            ));
        }
        self.populate_one(request).await
    }

    /// Donor decision: approve, reject or complete
    pub async fn update_status(
        &self,
        caller: &Caller,
        id: Uuid,
        input: UpdateRequestStatus,
    ) -> AppResult<RequestDetails> {
        let request = self.load(id).await?;
        if request.donor_id != caller.id {
            return Err(AppError::Authorization(
                "Only the item's donor can update this request".to_string(),
            ));
        }

        let status: RequestStatus = parse_field(input.status.trim())?;
        if !status.is_donor_decision() {
            return Err(AppError::Validation(
                "Status must be one of approved, rejected, completed".to_string(),
            ));
        }

        // Retried decision
        if status == request.status {
            return self.populate_one(request).await;
        }

        let mut change = StatusChange::new(&request, status)?;
        change.response_message = input
            .response_message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        change.scheduled_pickup_date = input.scheduled_pickup_date;

        let updated = self.repository.requests.transition(&change).await?;
        tracing::info!(
            "Request {} moved from {} to {} by donor {}",
            id,
            change.from,
            change.to,
            caller.id
        );

        self.populate_one(updated).await
    }

    /// Receiver withdraws a pending or approved request
    pub async fn cancel(&self, caller: &Caller, id: Uuid) -> AppResult<RequestDetails> {
        let request = self.load(id).await?;
        if request.receiver_id != caller.id {
            return Err(AppError::Authorization(
                "Only the requester can cancel this request".to_string(),
            ));
        }
        if !request.status.is_active() {
            return Err(AppError::InvalidState(format!(
                "Cannot cancel a {} request",
                request.status
            )));
        }

        let change = StatusChange::new(&request, RequestStatus::Cancelled)?;
        let updated = self.repository.requests.transition(&change).await?;
        tracing::info!("Request {} cancelled by receiver {}", id, caller.id);

        self.populate_one(updated).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{item::CreateItem, Item, NewItem, UserContact};
    use crate::repository::{
        memory::MemoryStore, ItemStore, MockItemStore, MockRequestStore, MockUserStore,
    };

    struct Fixture {
        service: RequestsService,
        store: Arc<MemoryStore>,
        donor: Caller,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                service: RequestsService::new(Repository::in_memory(store.clone())),
                store,
                donor: Caller::donor(Uuid::new_v4()),
            }
        }

        async fn item(&self) -> Item {
            let input = CreateItem {
                title: "Graphing calculator".to_string(),
                description: "TI-84".to_string(),
                category: "calculator".to_string(),
                condition: "fair".to_string(),
                quantity: None,
                tags: None,
                pickup_location: "Engineering hall".to_string(),
                images: vec![],
            };
            let new_item = NewItem::new(self.donor.id, input).unwrap();
            ItemStore::insert(self.store.as_ref(), new_item).await.unwrap()
        }

        async fn item_status(&self, id: Uuid) -> ItemStatus {
            ItemStore::get(self.store.as_ref(), id)
                .await
                .unwrap()
                .unwrap()
                .status
        }

        async fn request(&self, receiver: &Caller, item: &Item) -> DonationRequest {
            self.service
                .create(
                    receiver,
                    CreateRequest {
                        item_id: item.id,
                        message: Some("I need this for class".to_string()),
                    },
                )
                .await
                .unwrap()
                .request
        }

        async fn decide(&self, id: Uuid, status: &str) -> AppResult<RequestDetails> {
            self.service
                .update_status(
                    &self.donor,
                    id,
                    UpdateRequestStatus {
                        status: status.to_string(),
                        response_message: None,
                        scheduled_pickup_date: None,
                    },
                )
                .await
        }
    }

    fn receiver() -> Caller {
        Caller::receiver(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_create_request_populates_details() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();
        fx.store
            .insert_user(UserContact {
                id: alice.id,
                name: "Alice".to_string(),
                email: "alice@campus.edu".to_string(),
                university: None,
                department: Some("Math".to_string()),
                phone_number: None,
            })
            .await;

        let details = fx
            .service
            .create(
                &alice,
                CreateRequest {
                    item_id: item.id,
                    message: Some("  ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(details.request.status, RequestStatus::Pending);
        assert_eq!(details.request.donor_id, fx.donor.id);
        assert!(details.request.message.is_none());
        assert_eq!(details.item.map(|i| i.id), Some(item.id));
        assert_eq!(details.receiver.map(|r| r.name), Some("Alice".to_string()));
        assert!(details.donor.is_none());
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_create_request_errors() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();

        let too_long = fx
            .service
            .create(
                &alice,
                CreateRequest {
                    item_id: item.id,
                    message: Some("x".repeat(501)),
                },
            )
            .await;
        assert!(matches!(too_long, Err(AppError::Validation(_))));

        let missing = fx
            .service
            .create(
                &alice,
                CreateRequest {
                    item_id: Uuid::new_v4(),
                    message: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let own = fx
            .service
            .create(
                &Caller::receiver(fx.donor.id),
                CreateRequest {
                    item_id: item.id,
                    message: None,
                },
            )
            .await;
        assert!(matches!(own, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_duplicate_active_request_conflicts() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();

        let first = fx.request(&alice, &item).await;
        let again = fx
            .service
            .create(
                &alice,
                CreateRequest {
                    item_id: item.id,
                    message: None,
                },
            )
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        // A rejected request no longer blocks a new one
        fx.decide(first.id, "rejected").await.unwrap();
        let retry = fx.request(&alice, &item).await;
        assert_eq!(retry.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_approve_then_reject_sibling_keeps_item_reserved() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let (alice, bob) = (receiver(), receiver());
        let r1 = fx.request(&alice, &item).await;
        let r2 = fx.request(&bob, &item).await;

        let approved = fx.decide(r1.id, "approved").await.unwrap();
        assert_eq!(approved.request.status, RequestStatus::Approved);
        assert_eq!(approved.item.map(|i| i.status), Some(ItemStatus::Reserved));
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Reserved);

        // Approving does not touch the sibling request
        let sibling = fx.service.get(&bob, r2.id).await.unwrap();
        assert_eq!(sibling.request.status, RequestStatus::Pending);

        fx.decide(r2.id, "rejected").await.unwrap();
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Reserved);

        // Reserved items cannot be requested
        let carol = receiver();
        let blocked = fx
            .service
            .create(
                &carol,
                CreateRequest {
                    item_id: item.id,
                    message: None,
                },
            )
            .await;
        assert!(matches!(blocked, Err(AppError::InvalidState(_))));

        fx.service.cancel(&alice, r1.id).await.unwrap();
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_reject_releases_item() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let request = fx.request(&receiver(), &item).await;

        fx.decide(request.id, "approved").await.unwrap();
        // Approved requests can only be completed or cancelled
        assert!(matches!(
            fx.decide(request.id, "rejected").await,
            Err(AppError::InvalidState(_))
        ));

        let other = fx.item().await;
        let pending = fx.request(&receiver(), &other).await;
        let rejected = fx.decide(pending.id, "rejected").await.unwrap();
        assert_eq!(rejected.request.status, RequestStatus::Rejected);
        assert_eq!(fx.item_status(other.id).await, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_complete_donates_item() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let (alice, bob) = (receiver(), receiver());
        let winner = fx.request(&alice, &item).await;
        let loser = fx.request(&bob, &item).await;

        assert!(matches!(
            fx.decide(winner.id, "completed").await,
            Err(AppError::InvalidState(_))
        ));

        fx.decide(winner.id, "approved").await.unwrap();
        let pickup = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
        let completed = fx
            .service
            .update_status(
                &fx.donor,
                winner.id,
                UpdateRequestStatus {
                    status: "completed".to_string(),
                    response_message: Some(" Thanks! ".to_string()),
                    scheduled_pickup_date: Some(pickup),
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.request.status, RequestStatus::Completed);
        assert_eq!(completed.request.response_message.as_deref(), Some("Thanks!"));
        assert_eq!(completed.request.scheduled_pickup_date, Some(pickup));
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Donated);

        // Releasing a donated item leaves it donated
        fx.service.cancel(&bob, loser.id).await.unwrap();
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Donated);

        // Nothing leaves a terminal state
        assert!(matches!(
            fx.service.cancel(&alice, winner.id).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            fx.decide(winner.id, "approved").await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_decision_is_a_no_op() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let request = fx.request(&receiver(), &item).await;

        let first = fx.decide(request.id, "approved").await.unwrap();
        let second = fx.decide(request.id, "approved").await.unwrap();
        assert_eq!(first.request, second.request);
        assert_eq!(fx.item_status(item.id).await, ItemStatus::Reserved);
    }

    #[tokio::test]
    async fn test_update_status_authorization_and_validation() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();
        let request = fx.request(&alice, &item).await;

        let stranger = Caller::donor(Uuid::new_v4());
        let forbidden = fx
            .service
            .update_status(
                &stranger,
                request.id,
                UpdateRequestStatus {
                    status: "approved".to_string(),
                    response_message: None,
                    scheduled_pickup_date: None,
                },
            )
            .await;
        assert!(matches!(forbidden, Err(AppError::Authorization(_))));

        for status in ["pending", "cancelled", "done"] {
            assert!(matches!(
                fx.decide(request.id, status).await,
                Err(AppError::Validation(_))
            ));
        }

        assert!(matches!(
            fx.decide(Uuid::new_v4(), "approved").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();
        let request = fx.request(&alice, &item).await;

        assert!(matches!(
            fx.service.cancel(&receiver(), request.id).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            fx.service.cancel(&fx.donor, request.id).await,
            Err(AppError::Authorization(_))
        ));

        let cancelled = fx.service.cancel(&alice, request.id).await.unwrap();
        assert_eq!(cancelled.request.status, RequestStatus::Cancelled);
        assert!(matches!(
            fx.service.cancel(&alice, request.id).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_get_requires_participant() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();
        let request = fx.request(&alice, &item).await;

        assert!(fx.service.get(&alice, request.id).await.is_ok());
        assert!(fx.service.get(&fx.donor, request.id).await.is_ok());
        assert!(matches!(
            fx.service.get(&receiver(), request.id).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            fx.service.get(&alice, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_role_and_status() {
        let fx = Fixture::new();
        let (alice, bob) = (receiver(), receiver());
        let first = fx.item().await;
        let second = fx.item().await;
        let a1 = fx.request(&alice, &first).await;
        fx.request(&alice, &second).await;
        fx.request(&bob, &first).await;
        fx.decide(a1.id, "approved").await.unwrap();

        let sent = fx.service.list(&alice, &RequestQuery::default()).await.unwrap();
        assert_eq!(sent.total, 2);
        assert!(sent.data.iter().all(|d| d.request.receiver_id == alice.id));

        let received = fx.service.list(&fx.donor, &RequestQuery::default()).await.unwrap();
        assert_eq!(received.total, 3);

        let approved = fx
            .service
            .list(
                &fx.donor,
                &RequestQuery {
                    status: Some("approved".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.total, 1);
        assert_eq!(approved.data[0].request.id, a1.id);

        let invalid = fx
            .service
            .list(
                &alice,
                &RequestQuery {
                    status: Some("archived".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(invalid, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_deleted_item_leaves_request_without_summary() {
        let fx = Fixture::new();
        let item = fx.item().await;
        let alice = receiver();
        let request = fx.request(&alice, &item).await;

        ItemStore::delete(fx.store.as_ref(), item.id).await.unwrap();

        let details = fx.service.get(&alice, request.id).await.unwrap();
        assert!(details.item.is_none());
        // The release has no item to act on
        fx.service.cancel(&alice, request.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_change_is_reported() {
        let donor = Uuid::new_v4();
        let request = NewRequest::new(Uuid::new_v4(), Uuid::new_v4(), donor, None)
            .unwrap()
            .into_request(Utc::now());

        let mut requests = MockRequestStore::new();
        let stored = request.clone();
        requests
            .expect_get()
            .returning(move |_| Ok(Some(stored.clone())));
        requests
            .expect_transition()
            .times(1)
            .returning(|_| Err(AppError::InvalidState("stale".to_string())));

        let service = RequestsService::new(Repository {
            items: Arc::new(MockItemStore::new()),
            requests: Arc::new(requests),
            users: Arc::new(MockUserStore::new()),
        });

        let result = service
            .update_status(
                &Caller::donor(donor),
                request.id,
                UpdateRequestStatus {
                    status: "approved".to_string(),
                    response_message: None,
                    scheduled_pickup_date: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }
}
