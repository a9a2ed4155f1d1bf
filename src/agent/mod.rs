//! Agent orchestration
//!
//! - `agent_loop`: bounded, cancellable model/tool turn-taking
//! - `history`: the conversation an agent owns

mod agent_loop;
mod history;

pub use agent_loop::{AgentConfig, AgentLoop, DEFAULT_MAX_TURNS};
pub use history::ConversationHistory;
