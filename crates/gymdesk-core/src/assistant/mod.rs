//! Member-facing AI assistant: agent loop, tools and per-member sessions

pub mod agent;
pub mod manager;
pub mod tools;

pub use agent::{
    configure_lm, AssistantEvent, AssistantReply, GymAssistant, ThinkingStep, Tool, ToolCall,
    ToolRegistry, ToolResult,
};
pub use manager::AssistantManager;
