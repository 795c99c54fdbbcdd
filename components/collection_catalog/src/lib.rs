// components/collection_catalog/src/lib.rs
mod spotify;
mod types;

pub use spotify::{CatalogClient, SpotifyCatalog};
pub use types::{Collection, CollectionKind, CollectionRef, ResolveError, TrackDescriptor};
