//! Remote catalog and playback service (Spotify Web API).
//!
//! # Architecture
//!
//! Same layering as any other external service client:
//! - **Domain models** (`domain.rs`) - our types, stable across API changes
//! - **API DTOs** (`dto.rs`) - exact response shapes
//! - **Adapter** (`adapter.rs`) - the only place DTOs become domain types
//! - **Client** (`client.rs`) - authenticated HTTP calls
//! - **Traits** (`traits.rs`) - the [`CatalogApi`] seam used by the resolver
//!   and the remote backend, plus mocks for tests
//!
//! The bearer credential is passed per call; the client itself holds no
//! session state.

pub mod adapter;
pub mod client;
pub mod domain;
pub mod dto;
pub mod traits;

pub use client::SpotifyClient;
pub use domain::{CatalogError, Device, PlaybackSnapshot, UserProfile};
pub use traits::CatalogApi;
