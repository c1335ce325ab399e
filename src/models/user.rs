//! Caller identity and user contact projection

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

use super::enums::Role;

/// Authenticated caller, trusted as supplied by the session provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn donor(id: Uuid) -> Self {
        Self::new(id, Role::Donor)
    }

    pub fn receiver(id: Uuid) -> Self {
        Self::new(id, Role::Receiver)
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "This action requires the {} role",
                role
            )))
        }
    }
}

/// JWT claims issued by the session provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Parse and verify an HS256 token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn caller(&self) -> Caller {
        Caller::new(self.sub, self.role)
    }
}

/// Public contact details shown next to items and requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserContact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub university: Option<String>,
    pub department: Option<String>,
    pub phone_number: Option<String>,
}
