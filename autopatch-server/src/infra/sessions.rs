//! In-memory session registry.
//!
//! Tokens are 256-bit random values handed to the client once; the registry
//! only keeps their SHA-256 digest.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rand::{TryRngCore, rngs::OsRng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session token generation failed")]
    GenerationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A freshly issued session. `token` is the only copy of the secret.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    ttl: TimeDelta,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn issue(&self, username: &str) -> Result<IssuedSession, SessionError> {
        let mut token_bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut token_bytes)
            .map_err(|_| SessionError::GenerationFailed)?;
        let token = URL_SAFE_NO_PAD.encode(token_bytes);

        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let session = Session {
            username: username.to_string(),
            issued_at,
            expires_at,
        };

        self.sessions.insert(digest(&token), session.clone());
        debug!(username, %expires_at, "session issued");
        Ok(IssuedSession { token, session })
    }

    /// Look up a live session. Expired entries are dropped on access.
    pub fn resolve(&self, token: &str) -> Option<Session> {
        let key = digest(token);
        let session = self.sessions.get(&key)?.clone();
        if session.is_expired() {
            self.sessions.remove(&key);
            return None;
        }
        Some(session)
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(&digest(token)).is_some()
    }

    /// Drop every expired session and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired();
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_resolves_to_user() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let issued = registry.issue("alice").expect("issue");

        let session = registry.resolve(&issued.token).expect("live session");
        assert_eq!(session.username, "alice");
        assert!(registry.resolve("not-a-token").is_none());
    }

    #[test]
    fn tokens_are_stored_as_digests() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let issued = registry.issue("alice").expect("issue");

        assert!(!registry.sessions.contains_key(&issued.token));
        assert!(registry.sessions.contains_key(&digest(&issued.token)));
    }

    #[test]
    fn revoked_tokens_stop_resolving() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let issued = registry.issue("alice").expect("issue");

        assert!(registry.revoke(&issued.token));
        assert!(!registry.revoke(&issued.token));
        assert!(registry.resolve(&issued.token).is_none());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let issued = registry.issue("alice").expect("issue");

        assert!(registry.resolve(&issued.token).is_none());
        assert!(registry.is_empty());

        registry.issue("bob").expect("issue");
        assert_eq!(registry.purge_expired(), 1);
    }

    #[test]
    fn purge_counts_match_issued_sessions_under_concurrent_logins() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let registry = SessionRegistry::new(Duration::ZERO);
        let stop = AtomicBool::new(false);
        let issued = AtomicUsize::new(0);
        let mut purged = 0;

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !stop.load(Ordering::Relaxed) {
                        registry.issue("alice").expect("issue");
                        issued.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
            for _ in 0..2_000 {
                purged += registry.purge_expired();
            }
            stop.store(true, Ordering::Relaxed);
        });

        purged += registry.purge_expired();
        assert_eq!(purged, issued.load(Ordering::Relaxed));
        assert!(registry.is_empty());
    }
}
