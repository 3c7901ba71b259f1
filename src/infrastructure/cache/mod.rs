//! Cache infrastructure - Cache store implementations

mod factory;
mod file;
mod in_memory;

pub use factory::CacheStoreFactory;
pub use file::FileCacheStore;
pub use in_memory::InMemoryCacheStore;
