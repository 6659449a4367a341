use pengadaan_auth::{Actor, UserRole};
use pengadaan_core::UserId;

/// Authenticated actor context for a request.
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
}

impl ActorContext {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self {
            actor: Actor::new(user_id, role),
        }
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn role(&self) -> UserRole {
        self.actor.role
    }

    pub fn is_admin(&self) -> bool {
        self.actor.is_admin()
    }
}
