//! Agent brain, tool contract and the bundled inventory tools.

pub mod brain;
pub mod inventory;
pub mod prompts;
pub mod tools;

pub use brain::{AgentBrain, AgentResponse, ResponseSource};
pub use inventory::register_inventory_tools;
pub use tools::{handler_fn, FnHandler, ToolDefinition, ToolHandler};
