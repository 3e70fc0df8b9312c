//! Customer and owner display models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CustomerContact;

/// A customer record owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn contact(&self) -> CustomerContact {
        CustomerContact {
            name: Some(self.name.clone()),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            note: self.note.clone(),
        }
    }

    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            note: self.note.clone(),
        }
    }
}

/// Customer fields attached to a resolved sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
}

/// Owner fields attached to a resolved sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl OwnerSummary {
    /// Summary for an owner whose account record is not available
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            email: None,
        }
    }
}
