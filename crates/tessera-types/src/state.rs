//! Conversation state shared between agents.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::Message;

/// Per-conversation bookkeeping maintained by the host's routing layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginContext {
    /// Agents routed to, in order.
    pub routing_history: Vec<String>,
    /// How many times in a row the last agent has been routed to.
    pub consecutive_agent_repeats: u32,
    /// The most recently routed agent.
    pub last_routed_agent: Option<String>,
    /// Output of a synthesizer step, if any.
    pub synthesizer_output: Option<Map<String, Value>>,
    /// Tools used so far, without duplicates, in first-use order.
    pub tools_used: Vec<String>,
    /// Per-agent outputs keyed by agent name.
    pub agent_outputs: Map<String, Value>,
}

/// Conversation state passed from agent to agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentState {
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Conversation thread identifier.
    pub thread_id: Option<String>,
    /// Agent currently handling the conversation.
    pub current_agent: Option<String>,
    /// Number of agent-to-agent hops so far.
    pub agent_hops: u32,
    /// Routing bookkeeping.
    pub plugin_context: PluginContext,
    /// Free-form metadata.
    pub metadata: Map<String, Value>,
}

impl AgentState {
    /// Create a state holding `messages`.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Set the thread identifier.
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Set the current agent.
    #[must_use]
    pub fn with_current_agent(mut self, agent: impl Into<String>) -> Self {
        self.current_agent = Some(agent.into());
        self
    }

    /// Increment the hop counter.
    pub fn increment_agent_hops(&mut self) {
        self.agent_hops = self.agent_hops.saturating_add(1);
    }

    /// Record a routing decision to `agent`.
    ///
    /// Routing to the same agent as last time increments the consecutive
    /// repeat counter; routing elsewhere resets it to zero.
    pub fn record_route(&mut self, agent: impl Into<String>) {
        let agent = agent.into();
        let ctx = &mut self.plugin_context;

        if ctx.last_routed_agent.as_deref() == Some(agent.as_str()) {
            ctx.consecutive_agent_repeats = ctx.consecutive_agent_repeats.saturating_add(1);
        } else {
            ctx.consecutive_agent_repeats = 0;
        }

        ctx.routing_history.push(agent.clone());
        ctx.last_routed_agent = Some(agent);
    }

    /// Record that `tool` was used. Repeated tools are recorded once.
    pub fn record_tool_used(&mut self, tool: impl Into<String>) {
        let tool = tool.into();
        let used = &mut self.plugin_context.tools_used;
        if !used.contains(&tool) {
            used.push(tool);
        }
    }

    /// How many times in a row `agent` has been routed to, counting the
    /// first routing. Zero if `agent` was not the last routed agent.
    #[must_use]
    pub fn consecutive_routes(&self, agent: &str) -> u32 {
        let ctx = &self.plugin_context;
        if ctx.last_routed_agent.as_deref() == Some(agent) {
            ctx.consecutive_agent_repeats.saturating_add(1)
        } else {
            0
        }
    }

    /// Append messages, skipping those whose ID is already present.
    pub fn push_messages(&mut self, new: &[Message]) {
        self.messages = merge_messages(&self.messages, new, true);
    }
}

/// Merge two message lists.
///
/// With `deduplicate`, messages from `new` whose `message_id` already appears
/// in `existing` (or earlier in `new`) are dropped. Order is preserved.
#[must_use]
pub fn merge_messages(existing: &[Message], new: &[Message], deduplicate: bool) -> Vec<Message> {
    if !deduplicate {
        return existing.iter().chain(new).cloned().collect();
    }

    let mut seen: HashSet<&str> = existing.iter().map(Message::message_id).collect();
    let mut merged = existing.to_vec();
    for msg in new {
        if seen.insert(msg.message_id()) {
            merged.push(msg.clone());
        }
    }
    merged
}
