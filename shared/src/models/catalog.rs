//! Part catalog and service center models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A spare part that can be stocked, consumed and transferred
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: Uuid,
    pub name: String,
    pub part_number: String,
    pub supplier: Option<String>,
    pub warranty_months: Option<i32>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A service location with its own inventory, owned by one user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCenter {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// Owning user; the only actor allowed to negotiate on the center's behalf
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ServiceCenter {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Issue category a technician files a checklist under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}
