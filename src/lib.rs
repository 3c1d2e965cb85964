//! Image ingestion for the portfolio site - transcodes uploads to WebP and
//! stores them in an object store
//!
//! Uploaded images are decoded, fitted into a bounding box when encoding
//! lossy, re-encoded as WebP, and written under `{group_id}/{uuid}.webp`.
//! The public URL returned for each asset can later be handed back to delete
//! it.

pub mod codec;
pub mod error;
pub mod keys;
pub mod models;
pub mod pipeline;
pub mod resize;
pub mod retry;
pub mod staging;
pub mod store;

pub use error::{Error, Result};
