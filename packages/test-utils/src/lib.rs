//! Shared test utilities for Cadence workspace
//!
//! This crate provides mock implementations of external services for testing
//! without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockCatalogServer`] - Mock catalog Web API and accounts service
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_test_utils::{MockCatalogServer, ArtistFixture};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let catalog = MockCatalogServer::start().await;
//!     catalog
//!         .mock_artists(vec![ArtistFixture::new("a1", "Artist", &["rap"])])
//!         .await;
//!
//!     // Use catalog.url() to configure your client
//! }
//! ```

mod catalog;

pub use catalog::{
    audio_features_json, null_track_item, ArtistFixture, MockCatalogServer, TrackFixture,
};
