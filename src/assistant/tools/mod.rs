pub mod registry;
pub mod shuffle_tool;

pub use registry::{Tool, ToolError, ToolRegistry};
pub use shuffle_tool::ShufflePicksTool;
