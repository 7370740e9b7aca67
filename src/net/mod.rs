//! Request/response model shared by the cache and the network fetcher.

mod fetcher;
mod types;

pub use fetcher::{Fetcher, HttpFetcher};
pub use types::{Request, Response};
