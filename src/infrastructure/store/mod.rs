//! Task state persistence
//!
//! - `FileTaskStore`: JSON records under the state directory, atomic writes
//! - `MemoryTaskStore`: in-process store for tests and dry runs

pub mod file_store;
pub mod memory;

pub use file_store::FileTaskStore;
pub use memory::MemoryTaskStore;
