//! In-memory storage: typed row containers and the table registry

pub mod memory;
pub mod table;

pub use memory::MemoryCatalog;
pub use table::TableStore;
