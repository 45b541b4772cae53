//! Owner-only mutation guard.
//!
//! Storing or clearing the video is reserved for the configured owner. Without
//! an owner the bot runs in open mode and anyone may change the video. Reads
//! (status, inline queries) are never guarded.

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The actor may mutate the slot
    Granted,
    /// The actor may only read
    Denied,
}

/// Returns true if `actor_id` may mutate the slot guarded by `owner_id`.
///
/// # Examples
///
/// ```
/// use reel_relay_core::access::authorize;
///
/// assert!(authorize(Some(7), None));
/// assert!(authorize(Some(42), Some(42)));
/// assert!(!authorize(Some(7), Some(42)));
/// assert!(!authorize(None, Some(42)));
/// ```
#[must_use]
pub const fn authorize(actor_id: Option<i64>, owner_id: Option<i64>) -> bool {
    match (owner_id, actor_id) {
        (None, _) => true,
        (Some(owner), Some(actor)) => owner == actor,
        (Some(_), None) => false,
    }
}

/// Authorization policy bound to the configured owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard {
    owner_id: Option<i64>,
}

impl AccessGuard {
    /// Create a guard for `owner_id`; `None` means open mode.
    #[must_use]
    pub const fn new(owner_id: Option<i64>) -> Self {
        Self { owner_id }
    }

    /// Check whether `actor_id` may store or clear the video.
    #[must_use]
    pub const fn check(&self, actor_id: Option<i64>) -> Access {
        if authorize(actor_id, self.owner_id) {
            Access::Granted
        } else {
            Access::Denied
        }
    }

    /// The configured owner, if any.
    #[must_use]
    pub const fn owner_id(&self) -> Option<i64> {
        self.owner_id
    }

    /// Returns true if no owner is configured.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.owner_id.is_none()
    }

    /// Returns true if `actor_id` is the configured owner.
    #[must_use]
    pub const fn is_owner(&self, actor_id: Option<i64>) -> bool {
        match (self.owner_id, actor_id) {
            (Some(owner), Some(actor)) => owner == actor,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_grants_everyone() {
        let guard = AccessGuard::new(None);
        assert!(guard.is_open());
        assert_eq!(guard.check(Some(1)), Access::Granted);
        assert_eq!(guard.check(None), Access::Granted);
        assert!(!guard.is_owner(Some(1)));
    }

    #[test]
    fn test_owner_mode() {
        let guard = AccessGuard::new(Some(42));
        assert_eq!(guard.check(Some(42)), Access::Granted);
        assert_eq!(guard.check(Some(99)), Access::Denied);
        assert_eq!(guard.check(None), Access::Denied);
        assert!(guard.is_owner(Some(42)));
    }
}
