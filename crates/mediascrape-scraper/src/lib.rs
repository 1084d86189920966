//! # mediascrape-scraper
//!
//! Page fetching and media extraction.
//!
//! - [`HttpFetcher`] retrieves a page's HTML within a time and size budget.
//! - [`extract_media`] finds image and video references in that HTML.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mediascrape_core::Fetcher;
//! use mediascrape_scraper::{extract_media, FetchConfig, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new(FetchConfig::from_env())?;
//! let html = fetcher.fetch("https://example.com").await?;
//! let media = extract_media(&html, "https://example.com");
//! ```

pub mod config;
pub mod extractor;
pub mod fetcher;

pub use config::FetchConfig;
pub use extractor::extract_media;
pub use fetcher::HttpFetcher;
