//! Conversation chain tracking: the visited-set + depth bookkeeping that
//! makes agent-to-agent routing loop-safe and bounded.

use std::collections::HashMap;

use agentim_domain::conversation::ConversationChain;
use chrono::Utc;
use parking_lot::RwLock;

/// Outcome of checking whether a chain may advance to a given agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainCheck {
    /// Dispatch is allowed; depth after this hop is carried in the variant.
    Allow { next_depth: u32 },
    /// The agent already appears in this chain's visited set.
    AlreadyVisited,
    /// The chain has reached `maxChainDepth`.
    DepthExceeded,
}

/// Thread-safe store of live conversation chains, keyed by conversation id.
/// Entries older than `ttl_secs` since their last activity are swept by
/// [`ChainStore::sweep_expired`], which the broker calls on a periodic
/// background task.
pub struct ChainStore {
    chains: RwLock<HashMap<String, ConversationChain>>,
    max_depth: u32,
    ttl_secs: i64,
}

impl ChainStore {
    pub fn new(max_depth: u32, ttl_secs: u64) -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            max_depth,
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Check (without mutating) whether `agent_id` may receive the next
    /// hop of `conversation_id`. The caller must follow a successful
    /// `Allow` with [`ChainStore::record_dispatch`] once the send is
    /// actually issued, so cancelled dispatches don't pollute the chain.
    pub fn check(&self, conversation_id: &str, agent_id: &str) -> ChainCheck {
        let chains = self.chains.read();
        let current_depth = chains.get(conversation_id).map(|c| c.depth).unwrap_or(0);
        let already_visited = chains
            .get(conversation_id)
            .is_some_and(|c| c.visited.contains(agent_id));

        if already_visited {
            ChainCheck::AlreadyVisited
        } else if current_depth + 1 >= self.max_depth {
            ChainCheck::DepthExceeded
        } else {
            ChainCheck::Allow {
                next_depth: current_depth + 1,
            }
        }
    }

    /// Record that `agent_id` was actually dispatched within
    /// `conversation_id`, creating the chain on first use.
    pub fn record_dispatch(&self, conversation_id: &str, agent_id: &str) {
        let now = Utc::now();
        let mut chains = self.chains.write();
        let chain = chains
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationChain::new(conversation_id.to_string(), now));
        chain.visited.insert(agent_id.to_string());
        chain.depth += 1;
        chain.last_activity_at = now;
    }

    pub fn depth(&self, conversation_id: &str) -> u32 {
        self.chains
            .read()
            .get(conversation_id)
            .map(|c| c.depth)
            .unwrap_or(0)
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut chains = self.chains.write();
        let before = chains.len();
        chains.retain(|_, c| now.signed_duration_since(c.last_activity_at).num_seconds() < self.ttl_secs);
        before - chains.len()
    }

    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_conversation_allows_depth_one() {
        let store = ChainStore::new(5, 600);
        assert_eq!(store.check("c1", "A"), ChainCheck::Allow { next_depth: 1 });
    }

    #[test]
    fn revisiting_same_agent_is_blocked() {
        let store = ChainStore::new(5, 600);
        store.record_dispatch("c1", "A");
        store.record_dispatch("c1", "B");
        assert_eq!(store.check("c1", "A"), ChainCheck::AlreadyVisited);
    }

    #[test]
    fn depth_limit_enforced() {
        // maxChainDepth=5: a hop landing at depth 3 is the last one allowed
        // (3 + 1 == 4 < 5); the next would land at depth 5 and is blocked.
        let store = ChainStore::new(5, 600);
        store.record_dispatch("c1", "A"); // depth 1
        store.record_dispatch("c1", "B"); // depth 2
        store.record_dispatch("c1", "C"); // depth 3
        assert_eq!(store.check("c1", "D"), ChainCheck::Allow { next_depth: 4 });
        store.record_dispatch("c1", "D"); // depth 4
        assert_eq!(store.check("c1", "E"), ChainCheck::DepthExceeded);
    }

    #[test]
    fn a_to_b_to_a_loop_is_blocked() {
        let store = ChainStore::new(8, 600);
        store.record_dispatch("c1", "A");
        assert_eq!(store.check("c1", "B"), ChainCheck::Allow { next_depth: 2 });
        store.record_dispatch("c1", "B");
        assert_eq!(store.check("c1", "A"), ChainCheck::AlreadyVisited);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = ChainStore::new(5, 0);
        store.record_dispatch("c1", "A");
        assert_eq!(store.len(), 1);
        let removed = store.sweep_expired();
        assert_eq!(removed, 1);
        assert!(store.is_empty());
    }
}
