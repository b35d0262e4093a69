//! Framework-agnostic data types shared between Tessera plugins and hosts.
//!
//! - [`Message`]: role-tagged conversation messages (`human`, `ai`, `system`, `tool`)
//! - [`ToolCall`]: a tool invocation requested by an AI message
//! - [`AgentState`] / [`PluginContext`]: conversation state passed between agents
//!
//! These types carry no orchestration logic. Hosts translate them to and from
//! whatever representation their orchestration framework uses.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod message;
pub mod state;

pub use message::{Message, MessageContent, Role, ToolCall};
pub use state::{AgentState, PluginContext, merge_messages};
