//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application and the outside world. Adapters implement these ports.
//!
//! - `CacheProvider` - TTL key/value storage (in-memory, Redis)
//! - `Clock` - current time, replaceable in tests

mod cache_provider;
mod clock;

pub use cache_provider::{CacheError, CacheProvider, CacheProviderExt};
pub use clock::{Clock, SystemClock};
