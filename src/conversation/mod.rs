/// Per-principal conversation state for multi-turn flows
///
/// Each principal holds at most one pending state. Entries expire after a
/// fixed TTL: reads treat stale entries as idle and the periodic sweep
/// removes them.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Idle entries older than this are ignored and swept
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Interval of the background sweep
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Pending input a principal is expected to send next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    /// New account name for `/create`
    WaitingUsername,
    WaitingPassword { account_id: i64 },
    WaitingDays { account_id: i64 },
    WaitingInviteCode,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }
}

#[derive(Debug, Clone)]
struct StateEntry {
    state: ConversationState,
    updated_at: Instant,
}

/// Shared state table, cheap to clone
#[derive(Clone)]
pub struct ConversationStateMachine {
    states: Arc<RwLock<HashMap<i64, StateEntry>>>,
    ttl: Duration,
}

impl Default for ConversationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStateMachine {
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Replace whatever the principal had pending
    pub async fn set_state(&self, principal: i64, state: ConversationState) {
        let mut states = self.states.write().await;
        if state.is_idle() {
            states.remove(&principal);
            return;
        }

        states.insert(
            principal,
            StateEntry {
                state,
                updated_at: Instant::now(),
            },
        );
    }

    /// Current state, `Idle` when absent or older than the TTL
    pub async fn get_state(&self, principal: i64) -> ConversationState {
        let states = self.states.read().await;
        match states.get(&principal) {
            Some(entry) if entry.updated_at.elapsed() <= self.ttl => entry.state,
            _ => ConversationState::Idle,
        }
    }

    pub async fn clear_state(&self, principal: i64) {
        self.states.write().await.remove(&principal);
    }

    /// Drop expired entries, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, entry| entry.updated_at.elapsed() <= self.ttl);
        before - states.len()
    }

    /// Number of stored entries, expired or not
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}
