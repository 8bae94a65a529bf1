pub mod engines;
pub mod fetcher;
pub mod protection;

#[cfg(feature = "browser")]
pub mod browser;

#[cfg(feature = "browser")]
pub use browser::BrowserClient;
pub use engines::HybridEngine;
pub use fetcher::SiteFetcher;
pub use protection::looks_protected;
