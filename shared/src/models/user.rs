//! Actor roles

use serde::{Deserialize, Serialize};

/// Role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Technician,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Technician => "technician",
            Role::Customer => "customer",
        }
    }

    /// Roles allowed to write a checklist
    pub const CHECKLIST_AUTHORS: &'static [Role] = &[Role::Admin, Role::Staff, Role::Technician];

    /// Roles allowed to approve parts consumption
    pub const CHECKLIST_APPROVERS: &'static [Role] = &[Role::Admin, Role::Staff];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
