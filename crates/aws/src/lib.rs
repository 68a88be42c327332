//! AWS integration for tidycache
//!
//! Provides [`S3Backend`], which keeps lint results as objects in an S3
//! bucket (or any S3-compatible store via an endpoint override).

pub mod s3;

pub use s3::S3Backend;
