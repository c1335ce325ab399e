//! Shared domain enums.
//!
//! Every enum is stored as its lowercase text form (TEXT columns with CHECK
//! constraints) and serialized the same way on the wire.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Text column codec based on `as_str` / `FromStr`
macro_rules! impl_text_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl sqlx::Type<Postgres> for $ty {
                fn type_info() -> sqlx::postgres::PgTypeInfo {
                    <String as sqlx::Type<Postgres>>::type_info()
                }

                fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                    <String as sqlx::Type<Postgres>>::compatible(ty)
                }
            }

            impl<'r> Decode<'r, Postgres> for $ty {
                fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                    let s: &str = Decode::<Postgres>::decode(value)?;
                    s.parse().map_err(|e: String| e.into())
                }
            }

            impl Encode<'_, Postgres> for $ty {
                fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                    <&str as Encode<Postgres>>::encode(self.as_str(), buf)
                }
            }

            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Kind of school supply being donated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Book,
    Notebook,
    Pen,
    Pencil,
    Calculator,
    Ruler,
    Eraser,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Book => "book",
            Category::Notebook => "notebook",
            Category::Pen => "pen",
            Category::Pencil => "pencil",
            Category::Calculator => "calculator",
            Category::Ruler => "ruler",
            Category::Eraser => "eraser",
            Category::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(Category::Book),
            "notebook" => Ok(Category::Notebook),
            "pen" => Ok(Category::Pen),
            "pencil" => Ok(Category::Pencil),
            "calculator" => Ok(Category::Calculator),
            "ruler" => Ok(Category::Ruler),
            "eraser" => Ok(Category::Eraser),
            "other" => Ok(Category::Other),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Physical condition of a donated item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::LikeNew => "like-new",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Condition::New),
            "like-new" => Ok(Condition::LikeNew),
            "good" => Ok(Condition::Good),
            "fair" => Ok(Condition::Fair),
            "poor" => Ok(Condition::Poor),
            _ => Err(format!("Invalid condition: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

/// Availability of an item. Only the request workflow moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Available,
    Reserved,
    Donated,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Reserved => "reserved",
            ItemStatus::Donated => "donated",
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ItemStatus::Available),
            "reserved" => Ok(ItemStatus::Reserved),
            "donated" => Ok(ItemStatus::Donated),
            _ => Err(format!("Invalid item status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a donation request
///
/// ```text
/// pending  -> approved | rejected | cancelled
/// approved -> completed | cancelled
/// ```
///
/// `rejected`, `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Pending or approved
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Statuses a donor may set through a status update
    pub fn is_donor_decision(&self) -> bool {
        matches!(
            self,
            RequestStatus::Approved | RequestStatus::Rejected | RequestStatus::Completed
        )
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Completed)
                | (Approved, Cancelled)
        )
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role carried by the caller's token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Receiver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Receiver => "receiver",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(Role::Donor),
            "receiver" => Ok(Role::Receiver),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl_text_column!(Category, Condition, ItemStatus, RequestStatus, Role);
