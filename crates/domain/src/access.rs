//! Ownership capability used for permission checks.

use common::UserId;

/// Anything that belongs to a single user.
pub trait Owned {
    /// Returns the user who owns this resource.
    fn owner_id(&self) -> UserId;
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    user_id: UserId,
    is_staff: bool,
}

impl Actor {
    /// A regular customer.
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: false,
        }
    }

    /// A staff member, allowed to act on any user's resources.
    pub fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: true,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn is_staff(&self) -> bool {
        self.is_staff
    }

    /// Staff may modify anything; everyone else only what they own.
    pub fn can_modify<T: Owned + ?Sized>(&self, resource: &T) -> bool {
        self.is_staff || resource.owner_id() == self.user_id
    }
}
