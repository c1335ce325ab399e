//! Donation request model and its status workflow types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::enums::{ItemStatus, RequestStatus, Role};
use super::item::ItemSummary;
use super::user::{Caller, UserContact};

pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Request model from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DonationRequest {
    pub id: Uuid,
    pub item_id: Uuid,
    pub receiver_id: Uuid,
    /// Copied from the item when the request is created
    pub donor_id: Uuid,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub response_message: Option<String>,
    pub scheduled_pickup_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DonationRequest {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.donor_id == user_id || self.receiver_id == user_id
    }
}

/// Request with item summary and both parties' contacts
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestDetails {
    #[serde(flatten)]
    pub request: DonationRequest,
    /// `None` when the item has since been deleted
    pub item: Option<ItemSummary>,
    pub receiver: Option<UserContact>,
    pub donor: Option<UserContact>,
}

/// Create request payload
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRequest {
    pub item_id: Uuid,
    /// At most 500 characters once trimmed
    pub message: Option<String>,
}

/// Validated request ready to be inserted with status `pending`
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub id: Uuid,
    pub item_id: Uuid,
    pub receiver_id: Uuid,
    pub donor_id: Uuid,
    pub message: Option<String>,
}

impl NewRequest {
    pub fn new(
        item_id: Uuid,
        receiver_id: Uuid,
        donor_id: Uuid,
        message: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            item_id,
            receiver_id,
            donor_id,
            message: normalize_message(message)?,
        })
    }

    pub fn into_request(self, now: DateTime<Utc>) -> DonationRequest {
        DonationRequest {
            id: self.id,
            item_id: self.item_id,
            receiver_id: self.receiver_id,
            donor_id: self.donor_id,
            message: self.message,
            status: RequestStatus::Pending,
            response_message: None,
            scheduled_pickup_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trimmed optional message; blank becomes `None`
pub fn normalize_message(message: Option<String>) -> AppResult<Option<String>> {
    let Some(message) = message else {
        return Ok(None);
    };
    let message = message.trim();
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(Some(message.to_string()).filter(|m| !m.is_empty()))
}

/// Donor decision on a request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRequestStatus {
    /// One of approved, rejected, completed
    pub status: String,
    pub response_message: Option<String>,
    pub scheduled_pickup_date: Option<DateTime<Utc>>,
}

/// Request list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct RequestQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Which side of the requests a caller sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Donor(Uuid),
    Receiver(Uuid),
}

impl Participant {
    pub fn matches(&self, request: &DonationRequest) -> bool {
        match *self {
            Participant::Donor(id) => request.donor_id == id,
            Participant::Receiver(id) => request.receiver_id == id,
        }
    }
}

impl From<&Caller> for Participant {
    fn from(caller: &Caller) -> Self {
        match caller.role {
            Role::Donor => Participant::Donor(caller.id),
            Role::Receiver => Participant::Receiver(caller.id),
        }
    }
}

/// Effect of a request transition on the linked item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEffect {
    Set(ItemStatus),
    /// Return the item to `available`, unless it was donated or another
    /// approved request still holds it
    Release,
}

impl ItemEffect {
    /// Item side effect of moving a request into `status`
    pub fn for_status(status: RequestStatus) -> Option<Self> {
        match status {
            RequestStatus::Approved => Some(ItemEffect::Set(ItemStatus::Reserved)),
            RequestStatus::Completed => Some(ItemEffect::Set(ItemStatus::Donated)),
            RequestStatus::Rejected | RequestStatus::Cancelled => Some(ItemEffect::Release),
            RequestStatus::Pending => None,
        }
    }

    /// `held_elsewhere`: another request on the same item is approved
    pub fn resolve(&self, current: ItemStatus, held_elsewhere: bool) -> ItemStatus {
        match *self {
            ItemEffect::Set(status) => status,
            ItemEffect::Release => match current {
                ItemStatus::Donated => ItemStatus::Donated,
                ItemStatus::Reserved if held_elsewhere => ItemStatus::Reserved,
                _ => ItemStatus::Available,
            },
        }
    }
}

/// A conditional request transition plus its item side effect, applied by
/// the store as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub request_id: Uuid,
    pub item_id: Uuid,
    /// Status the request must still have when the change is applied
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub response_message: Option<String>,
    pub scheduled_pickup_date: Option<DateTime<Utc>>,
    pub item_effect: ItemEffect,
}

impl StatusChange {
    pub fn new(request: &DonationRequest, to: RequestStatus) -> AppResult<Self> {
        if !request.status.can_transition_to(to) {
            return Err(AppError::InvalidState(format!(
                "Cannot move request from {} to {}",
                request.status, to
            )));
        }
        let item_effect = ItemEffect::for_status(to).ok_or_else(|| {
            AppError::Internal(format!("No item effect defined for {}", to))
        })?;

        Ok(Self {
            request_id: request.id,
            item_id: request.item_id,
            from: request.status,
            to,
            response_message: None,
            scheduled_pickup_date: None,
            item_effect,
        })
    }

    /// Apply the request side of the change to an in-memory record
    pub fn apply_to(&self, request: &mut DonationRequest, now: DateTime<Utc>) {
        request.status = self.to;
        if let Some(ref message) = self.response_message {
            request.response_message = Some(message.clone());
        }
        if let Some(date) = self.scheduled_pickup_date {
            request.scheduled_pickup_date = Some(date);
        }
        request.updated_at = now;
    }
}

/// Per-status request counts for a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RequestStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub completed: i64,
    pub cancelled: i64,
}

impl RequestStats {
    pub fn from_counts(counts: &[(RequestStatus, i64)]) -> Self {
        let mut stats = Self::default();
        for &(status, count) in counts {
            let slot = match status {
                RequestStatus::Pending => &mut stats.pending,
                RequestStatus::Approved => &mut stats.approved,
                RequestStatus::Rejected => &mut stats.rejected,
                RequestStatus::Completed => &mut stats.completed,
                RequestStatus::Cancelled => &mut stats.cancelled,
            };
            *slot += count;
            stats.total += count;
        }
        stats
    }
}
