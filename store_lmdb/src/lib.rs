//! LMDB storage backend for the phone-link validator.
//!
//! Implements [`phonelink_store::RecordStore`] using the `heed` LMDB bindings.
//! Records are bincode-encoded values keyed by the 32 raw request-id bytes.

pub mod environment;
pub mod error;
pub mod migration;
pub mod record;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use record::LmdbRecordStore;
