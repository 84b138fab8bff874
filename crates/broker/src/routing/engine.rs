//! The routing engine: turns an accepted message into zero or more
//! `send_to_agent` dispatches, honoring direct/broadcast/none semantics
//! and the chain-safety + rate-limit guards.

use agentim_domain::message::RoutingMode;
use agentim_domain::room::{MemberType, Room};
use agentim_domain::trace::TraceEvent;

use super::chain::{ChainCheck, ChainStore};
use super::mentions::parse_mentions;
use super::rate_limit::AgentRateLimiter;

/// One resolved target of a routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedTarget {
    pub agent_id: String,
    pub agent_name: String,
    pub is_mentioned: bool,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub mode: RoutingMode,
    pub targets: Vec<RoutedTarget>,
    pub conversation_id: Option<String>,
}

/// Route a user-authored message landing in `room`.
///
/// `ai_router_configured` reflects whether a sub-router endpoint is set
/// up for this room; `new_conversation_id` is only consulted (and only
/// allocated by the caller) when at least one target is produced.
pub fn route_user_message(
    room: &Room,
    content: &str,
    ai_router_configured: bool,
    new_conversation_id: impl FnOnce() -> String,
) -> RoutingDecision {
    let mentioned_names = parse_mentions(content);
    let mentioned_agents: Vec<_> = mentioned_names
        .iter()
        .filter_map(|name| room.agent_member_by_name(name))
        .collect();

    if !mentioned_agents.is_empty() {
        let conversation_id = new_conversation_id();
        let targets = mentioned_agents
            .into_iter()
            .map(|m| RoutedTarget {
                agent_id: m.id.clone(),
                agent_name: m.name.clone(),
                is_mentioned: true,
                depth: 1,
            })
            .collect();
        return RoutingDecision {
            mode: RoutingMode::Direct,
            targets,
            conversation_id: Some(conversation_id),
        };
    }

    if room.broadcast_mode && ai_router_configured {
        // Sub-routing is resolved by the AI router client; the engine
        // itself only establishes that broadcast mode applies here.
        // The caller invokes `ai_router::route` and feeds the result
        // back through `finish_broadcast_routing`.
        return RoutingDecision {
            mode: RoutingMode::Broadcast,
            targets: Vec::new(),
            conversation_id: None,
        };
    }

    RoutingDecision {
        mode: RoutingMode::None,
        targets: Vec::new(),
        conversation_id: None,
    }
}

/// Finalize a `broadcast` decision once the AI router has returned a
/// ranked subset of agent names. Unknown names are dropped.
pub fn finish_broadcast_routing(
    room: &Room,
    chosen_names: &[String],
    new_conversation_id: impl FnOnce() -> String,
) -> RoutingDecision {
    let targets: Vec<_> = chosen_names
        .iter()
        .filter_map(|name| room.agent_member_by_name(name))
        .map(|m| RoutedTarget {
            agent_id: m.id.clone(),
            agent_name: m.name.clone(),
            is_mentioned: false,
            depth: 1,
        })
        .collect();

    let conversation_id = if targets.is_empty() {
        None
    } else {
        Some(new_conversation_id())
    };

    RoutingDecision {
        mode: RoutingMode::Broadcast,
        targets,
        conversation_id,
    }
}

/// Route an agent's own completed reply: parse its mentions, drop
/// self-mentions, and apply chain-safety + rate-limit guards per target.
pub fn route_agent_reply(
    room: &Room,
    from_agent_name: &str,
    content: &str,
    conversation_id: &str,
    chains: &ChainStore,
    rate_limiter: &AgentRateLimiter,
) -> Vec<RoutedTarget> {
    let mentioned_names = parse_mentions(content);
    let mut targets = Vec::new();

    for name in mentioned_names {
        if name == from_agent_name {
            continue;
        }
        let Some(member) = room.agent_member_by_name(&name) else {
            continue;
        };
        if member.member_type != MemberType::Agent {
            continue;
        }

        if !rate_limiter.try_acquire(&member.id) {
            TraceEvent::RateLimited {
                agent_id: member.id.clone(),
                limit_kind: "agent_routes_per_window".into(),
            }
            .emit();
            continue;
        }

        match chains.check(conversation_id, &member.id) {
            ChainCheck::Allow { next_depth } => {
                chains.record_dispatch(conversation_id, &member.id);
                targets.push(RoutedTarget {
                    agent_id: member.id.clone(),
                    agent_name: member.name.clone(),
                    is_mentioned: true,
                    depth: next_depth,
                });
            }
            ChainCheck::AlreadyVisited => {
                TraceEvent::ChainBlocked {
                    conversation_id: conversation_id.to_string(),
                    agent_id: member.id.clone(),
                    reason: "already_visited".into(),
                }
                .emit();
            }
            ChainCheck::DepthExceeded => {
                TraceEvent::ChainBlocked {
                    conversation_id: conversation_id.to_string(),
                    agent_id: member.id.clone(),
                    reason: "depth_exceeded".into(),
                }
                .emit();
            }
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentim_domain::room::{Member, MemberRole, NotificationPreference};

    fn room(broadcast_mode: bool) -> Room {
        Room {
            id: "r1".into(),
            name: "room".into(),
            broadcast_mode,
            system_prompt: None,
            members: vec![
                Member {
                    id: "agent-a".into(),
                    member_type: MemberType::Agent,
                    name: "AlphaBot".into(),
                    agent_type: Some("generic".into()),
                    role: MemberRole::Member,
                    notification_preference: NotificationPreference::All,
                    pinned: false,
                    archived: false,
                    status: None,
                },
                Member {
                    id: "agent-b".into(),
                    member_type: MemberType::Agent,
                    name: "BetaBot".into(),
                    agent_type: Some("generic".into()),
                    role: MemberRole::Member,
                    notification_preference: NotificationPreference::All,
                    pinned: false,
                    archived: false,
                    status: None,
                },
            ],
        }
    }

    #[test]
    fn broadcast_without_mention_and_without_router_is_none() {
        let decision = route_user_message(&room(true), "Hello everyone", false, || "c1".into());
        assert_eq!(decision.mode, RoutingMode::None);
        assert!(decision.targets.is_empty());
    }

    #[test]
    fn mention_in_broadcast_room_routes_direct() {
        let decision =
            route_user_message(&room(true), "@AlphaBot do something", true, || "c1".into());
        assert_eq!(decision.mode, RoutingMode::Direct);
        assert_eq!(decision.targets.len(), 1);
        assert_eq!(decision.targets[0].agent_id, "agent-a");
        assert!(decision.targets[0].is_mentioned);
    }

    #[test]
    fn client_mention_list_is_ignored_server_reparses() {
        // Only `content` is consulted; there's no spoofed-mentions
        // parameter to pass in the first place — that's the guarantee.
        let decision = route_user_message(&room(false), "@AlphaBot help me", false, || "c1".into());
        assert_eq!(decision.targets.len(), 1);
        assert_eq!(decision.targets[0].agent_id, "agent-a");
    }

    #[test]
    fn non_broadcast_room_without_mentions_is_none() {
        let decision = route_user_message(&room(false), "just chatting", false, || "c1".into());
        assert_eq!(decision.mode, RoutingMode::None);
    }

    #[test]
    fn agent_reply_excludes_self_mention() {
        let chains = ChainStore::new(8, 600);
        let limiter = AgentRateLimiter::new(60, 30);
        let targets = route_agent_reply(
            &room(false),
            "AlphaBot",
            "@AlphaBot @BetaBot let's go",
            "c1",
            &chains,
            &limiter,
        );
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].agent_id, "agent-b");
    }

    #[test]
    fn a_to_b_to_a_loop_blocked_end_to_end() {
        let chains = ChainStore::new(8, 600);
        let limiter = AgentRateLimiter::new(60, 30);
        // Simulate the initiating user→A dispatch that started this chain.
        chains.record_dispatch("c1", "agent-a");

        let to_b = route_agent_reply(&room(false), "AlphaBot", "@BetaBot hi", "c1", &chains, &limiter);
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].agent_id, "agent-b");

        let to_a = route_agent_reply(&room(false), "BetaBot", "@AlphaBot back", "c1", &chains, &limiter);
        assert!(to_a.is_empty(), "A should be blocked by the visited set");
    }
}
