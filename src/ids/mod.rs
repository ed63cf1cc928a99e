pub mod allocator;
pub mod counter_store;
pub mod kind;
pub mod scanner;

pub use allocator::{IdAllocator, IdGenerator, IdStats, SharedAllocator, spawn_periodic_rescan};
pub use kind::IdKind;
