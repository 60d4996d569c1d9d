//! GitHub OAuth sessions through an external broker.
//!
//! The dashboard creates a broker session, sends the contractor to its URL,
//! then polls until the broker reports completion. Polling is bounded by an
//! explicit [`PollPolicy`]; a session still pending when the policy runs out
//! is reported as not completed, never as an error.

mod metorial;

pub use metorial::{MetorialClient, DEFAULT_BASE_URL as DEFAULT_METORIAL_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth broker request failed: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("OAuth broker unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected OAuth broker response: {0}")]
    Decode(String),
}

/// A session the contractor completes in the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Completed,
    /// Expired, cancelled or failed; polling further cannot help
    Failed,
}

#[async_trait]
pub trait OAuthBroker: Send + Sync {
    async fn create_session(&self) -> Result<OAuthSession, OAuthError>;

    async fn session_state(&self, session_id: &str) -> Result<SessionState, OAuthError>;
}

/// How long to wait for a session to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(400),
        }
    }
}

/// Poll `session_id` until it leaves `Pending` or the policy is exhausted.
///
/// Returns the last observed state. Sleeps only between attempts, so the
/// worst case is `max_attempts` requests and `max_attempts - 1` delays.
pub async fn wait_for_completion(
    broker: &dyn OAuthBroker,
    session_id: &str,
    policy: PollPolicy,
) -> Result<SessionState, OAuthError> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        let state = broker.session_state(session_id).await?;
        tracing::debug!(
            "OAuth session {} poll {}/{}: {:?}",
            session_id,
            attempt,
            attempts,
            state
        );
        if state != SessionState::Pending {
            return Ok(state);
        }
        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Ok(SessionState::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Pending until the `completes_at`-th poll.
    struct Countdown {
        completes_at: u32,
        polls: AtomicU32,
    }

    #[async_trait]
    impl OAuthBroker for Countdown {
        async fn create_session(&self) -> Result<OAuthSession, OAuthError> {
            Ok(OAuthSession {
                id: "oas_1".into(),
                url: "https://example.test/oauth".into(),
            })
        }

        async fn session_state(&self, _session_id: &str) -> Result<SessionState, OAuthError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(if poll >= self.completes_at {
                SessionState::Completed
            } else {
                SessionState::Pending
            })
        }
    }

    fn quick(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn completes_within_policy() {
        let broker = Countdown {
            completes_at: 3,
            polls: AtomicU32::new(0),
        };
        let state = wait_for_completion(&broker, "oas_1", quick(5)).await.unwrap();
        assert_eq!(state, SessionState::Completed);
        assert_eq!(broker.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let broker = Countdown {
            completes_at: 10,
            polls: AtomicU32::new(0),
        };
        let state = wait_for_completion(&broker, "oas_1", quick(4)).await.unwrap();
        assert_eq!(state, SessionState::Pending);
        assert_eq!(broker.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_attempts_still_polls_once() {
        let broker = Countdown {
            completes_at: 1,
            polls: AtomicU32::new(0),
        };
        let state = wait_for_completion(&broker, "oas_1", quick(0)).await.unwrap();
        assert_eq!(state, SessionState::Completed);
    }
}
