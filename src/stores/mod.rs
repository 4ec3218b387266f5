//! Template repository implementations.

pub mod memory;

pub use memory::MemoryTemplateStore;
