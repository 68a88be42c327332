//! GCP integration for tidycache
//!
//! Provides [`GcsBackend`], which keeps lint results as objects in a Google
//! Cloud Storage bucket through the JSON API.

pub mod gcs;

pub use gcs::GcsBackend;
