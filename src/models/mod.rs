//! Data models for the donation exchange

pub mod enums;
pub mod item;
pub mod pagination;
pub mod request;
pub mod user;

use std::str::FromStr;

use crate::error::{AppError, AppResult};

// Re-export commonly used types
pub use enums::{Category, Condition, ItemStatus, RequestStatus, Role};
pub use item::{Item, ItemDetails, ItemFilter, ItemSummary, NewItem};
pub use pagination::{Page, PageRequest};
pub use request::{DonationRequest, NewRequest, Participant, RequestDetails, RequestStats, StatusChange};
pub use user::{Caller, UserClaims, UserContact};

/// Parse an enum-valued input field, reporting failures as validation errors
pub(crate) fn parse_field<T>(value: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(AppError::Validation)
}

/// Trim a required text field and reject it when empty
pub(crate) fn required_text(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
