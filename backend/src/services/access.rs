//! Session of an authenticated user and capability checks

use shared::{Capability, User};

use crate::error::{AppError, AppResult};

/// The authenticated user on whose behalf service operations run
#[derive(Debug, Clone)]
pub struct Session {
    user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn login(&self) -> &str {
        &self.user.login
    }

    /// Check if the session's role grants the capability
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.user.role.can(capability)
    }

    /// Fail with `Forbidden` unless the role grants the capability
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            tracing::warn!(
                login = %self.user.login,
                role = %self.user.role,
                capability = %capability,
                "capability denied"
            );
            Err(AppError::Forbidden)
        }
    }
}
