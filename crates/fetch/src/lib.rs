pub mod cache;
pub mod client;
pub mod html;
pub mod rate_limit;

pub use cache::UrlCache;
pub use client::{extract_domain, FetchClient, FetchError, FetchResponse};
pub use rate_limit::DomainRateLimiter;
