pub mod adapter;
pub mod client;
pub mod currency;
pub mod error;
pub mod identity;
pub mod image;
pub mod orchestrator;
mod rate_limit;
pub mod select;
mod tealight;
pub mod variants;

pub use adapter::{stock_indicates_available, SiteAdapter};
pub use client::PageClient;
pub use currency::{parse_price_text, CurrencyTable};
pub use error::ScrapeError;
pub use identity::generate_id;
pub use image::{asset_path, best_image, cache_image, AssetStore, MemoryAssetStore};
pub use orchestrator::{CrawlReport, Crawler, SiteFailure, SiteOutcome, SiteResult};
pub use select::SelectorChain;
pub use variants::{reconcile, RawVariant};
