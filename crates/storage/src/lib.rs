//! Key-value store implementations for ragloom.

pub mod in_memory;
pub mod json_file;
pub mod noop;

pub use in_memory::InMemoryKvStore;
pub use json_file::JsonFileKvStore;
pub use noop::NoopKvStore;
