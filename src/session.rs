//! Session identity, as observed from the authentication subsystem.

/// User identifier assigned by the authentication service.
pub type UserId = u64;

/// Current session identity.
///
/// The core does not own authentication; it only reacts to the
/// anonymous/authenticated edge reported by the session observer. A switch
/// between two authenticated users is not an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIdentity {
    Anonymous,
    Authenticated(UserId),
}

impl SessionIdentity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}
