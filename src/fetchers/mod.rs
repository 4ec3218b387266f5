//! Production fetch and render implementations.

pub mod firecrawl;
pub mod http;

pub use firecrawl::FirecrawlRenderer;
pub use http::HttpFetcher;
