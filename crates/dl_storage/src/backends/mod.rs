pub mod memory;
pub mod notion;

pub use memory::MemoryDatabase;
pub use notion::NotionDatabase;
