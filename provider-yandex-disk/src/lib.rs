//! # Yandex Disk Provider
//!
//! Implements `ProviderAdapter` for the Yandex Disk REST API.
//!
//! Audio files are listed through the flat `resources/files` endpoint with
//! offset paging. Playable URLs are one-off download links. Tokens are
//! renewed at the Yandex OAuth server.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::YandexDiskConnector;
pub use error::{Result, YandexDiskError};
