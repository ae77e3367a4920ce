//! User, role and capability models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnknownVariant;

/// A user account. The password hash never leaves the store layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub role: Role,
}

/// Roles a user can hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Entrepreneur,
    Technologist,
    Assistant,
    Admin,
}

/// Operations a role may be permitted to perform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageMaterials,
    ManageRecipes,
    ManageBatches,
    ViewProducts,
    ManageClients,
    ManageOrders,
    ViewReports,
    ViewAuditLog,
    ManageUsers,
}

const ENTREPRENEUR_CAPABILITIES: &[Capability] = &[
    Capability::ManageMaterials,
    Capability::ManageRecipes,
    Capability::ManageBatches,
    Capability::ViewProducts,
    Capability::ManageClients,
    Capability::ManageOrders,
    Capability::ViewReports,
    Capability::ViewAuditLog,
];

const TECHNOLOGIST_CAPABILITIES: &[Capability] = &[
    Capability::ManageMaterials,
    Capability::ManageRecipes,
    Capability::ManageBatches,
];

const ASSISTANT_CAPABILITIES: &[Capability] = &[
    Capability::ViewProducts,
    Capability::ManageClients,
    Capability::ManageOrders,
];

const ADMIN_CAPABILITIES: &[Capability] = &[Capability::ManageUsers, Capability::ViewAuditLog];

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Entrepreneur,
        Role::Technologist,
        Role::Assistant,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Entrepreneur => "entrepreneur",
            Role::Technologist => "technologist",
            Role::Assistant => "assistant",
            Role::Admin => "admin",
        }
    }

    /// Capability table: the full set of operations this role may perform
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Entrepreneur => ENTREPRENEUR_CAPABILITIES,
            Role::Technologist => TECHNOLOGIST_CAPABILITIES,
            Role::Assistant => ASSISTANT_CAPABILITIES,
            Role::Admin => ADMIN_CAPABILITIES,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entrepreneur" => Ok(Role::Entrepreneur),
            "technologist" => Ok(Role::Technologist),
            "assistant" => Ok(Role::Assistant),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageMaterials => "manage_materials",
            Capability::ManageRecipes => "manage_recipes",
            Capability::ManageBatches => "manage_batches",
            Capability::ViewProducts => "view_products",
            Capability::ManageClients => "manage_clients",
            Capability::ManageOrders => "manage_orders",
            Capability::ViewReports => "view_reports",
            Capability::ViewAuditLog => "view_audit_log",
            Capability::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
