// Service exports
pub mod batch;
pub mod distance_matrix;
pub mod geocoding;
pub mod ingest;
pub mod store;

pub use batch::{BatchError, BatchOutcome, BatchRunner};
pub use distance_matrix::{DistanceSource, GoogleDistanceMatrix, MAX_DESTINATIONS_PER_REQUEST};
pub use geocoding::{Geocoder, GoogleGeocoder};
pub use ingest::{IngestError, IngestSummary, RegistryIngestor};
pub use store::{LocationStore, PgLocationStore, StoreError};
