//! Cache stores for intercepted responses
//!
//! This module defines the `CacheStore` trait the interceptor is written
//! against, an in-memory store, and a file-backed store whose named
//! instances are managed by `CacheManager`. Stores never expire entries on
//! their own; an entry lives until it is deleted or its store is.

mod disk;
mod manager;
mod memory;
mod store;

pub use disk::DiskStore;
pub use manager::CacheManager;
pub use memory::MemoryStore;
pub use store::{CacheStore, StoreError};
