//! Offline caching: request classification, the cache registry, fetch
//! strategies, maintenance and the request interceptor.
//!
//! This module provides:
//! - Named, versioned cache stores holding GET responses (SQLite or memory)
//! - Cache-first and network-first strategies over injected capabilities
//! - Stale-while-revalidate interception with an offline fallback page
//! - Install-time precache, age-based refresh and orphaned store cleanup

pub mod classify;
mod interceptor;
mod maintenance;
mod storage;
mod strategy;
mod traits;

pub use interceptor::{FetchInterceptor, InterceptorSettings, Policy, Served};
pub use maintenance::{cleanup_orphans, precache, refresh_stale_entries, SweepReport};
pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::CacheSource;
