//! Managed resources: versioned artifacts vigil downloads and keeps fresh on
//! disk (the vulnerability database and the built-in policy bundle).
//!
//! Every resource goes through the same cycle, run by an [`Updater`]:
//! check freshness against the local [`ResourceMetadata`], download and
//! atomically replace the local copy if needed, then load it. What is specific
//! to a resource lives behind the [`ResourceClient`](client::ResourceClient)
//! trait.

pub mod client;
pub mod error;
pub mod freshness;
pub mod inspect;
pub mod metadata;
mod updater;

pub use crate::metadata::{METADATA_FILE, MetadataFile, ResourceKind, ResourceMetadata};
pub use crate::updater::{Status, Update, Updater};
