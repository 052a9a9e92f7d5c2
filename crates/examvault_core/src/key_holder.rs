//! In-memory cache of the session secret.

use crate::secret::Secret;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Holds zero or one active [`Secret`] for the current session.
///
/// This is the only place the plaintext secret lives between acquisition and
/// use. It is never written to disk or logs. Share one instance between
/// consumers with an `Arc`; every method is safe to call concurrently.
///
/// # Idle auto-lock
///
/// With [`KeyHolder::with_idle_timeout`] the cached secret stops being
/// reported once nothing has used it for the configured duration.
/// [`KeyHolder::expire_idle`] then zeroizes it.
#[derive(Debug, Default)]
pub struct KeyHolder {
    slot: Mutex<Slot>,
    idle_timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct Slot {
    secret: Option<Secret>,
    last_used: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, idle_timeout: Option<Duration>) -> bool {
        match (idle_timeout, self.last_used) {
            (Some(timeout), Some(last_used)) => last_used.elapsed() >= timeout,
            _ => false,
        }
    }
}

impl KeyHolder {
    /// Creates an empty holder without idle expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty holder that locks itself after `timeout` of inactivity.
    #[must_use]
    pub fn with_idle_timeout(timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            idle_timeout: Some(timeout),
        }
    }

    /// Returns the configured idle timeout.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Returns the cached secret, or `None` if absent or idle-expired.
    #[must_use]
    pub fn get(&self) -> Option<Secret> {
        let slot = self.slot.lock();
        if slot.is_expired(self.idle_timeout) {
            return None;
        }
        slot.secret.clone()
    }

    /// Returns true if [`get`](Self::get) would return a secret.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        let slot = self.slot.lock();
        slot.secret.is_some() && !slot.is_expired(self.idle_timeout)
    }

    /// Replaces the cached secret. The previous one is zeroized.
    pub fn set(&self, secret: Secret) {
        let mut slot = self.slot.lock();
        slot.secret = Some(secret);
        slot.last_used = Some(Instant::now());
    }

    /// Removes the cached secret. Idempotent.
    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.secret = None;
        slot.last_used = None;
    }

    /// Records that the cached secret was just used.
    pub fn touch(&self) {
        let mut slot = self.slot.lock();
        if slot.secret.is_some() {
            slot.last_used = Some(Instant::now());
        }
    }

    /// Zeroizes the secret if it has been idle past the timeout.
    ///
    /// Returns true if a secret was dropped.
    pub fn expire_idle(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.secret.is_some() && slot.is_expired(self.idle_timeout) {
            slot.secret = None;
            slot.last_used = None;
            return true;
        }
        false
    }

    /// Clears the holder only if it still caches `secret`.
    ///
    /// Returns true if the secret was removed. A newer secret set by another
    /// consumer in the meantime is left alone.
    pub fn clear_if_matches(&self, secret: &Secret) -> bool {
        let mut slot = self.slot.lock();
        let matches = slot
            .secret
            .as_ref()
            .is_some_and(|cached| cached.matches(secret));
        if matches {
            slot.secret = None;
            slot.last_used = None;
        }
        matches
    }
}
