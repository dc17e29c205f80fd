//! Model cache between the engines and the backing store
//!
//! ```text
//!   engine ──get/update──▶ DistributedModelCache ──load/save──▶ ModelStore
//!                              │        │
//!                         NearCache  KeyedLocks
//!                          (moka)   (per-id mutex shards)
//! ```

pub mod distributed;
pub mod locks;
pub mod near;
pub mod retry;

pub use distributed::DistributedModelCache;
pub use locks::KeyedLocks;
pub use near::NearCache;
pub use retry::RetryPolicy;
