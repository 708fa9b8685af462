//! Abstract record storage for the phone-link validator.
//!
//! The engine depends only on [`RecordStore`]; the LMDB backend lives in
//! `phonelink-store-lmdb` and an in-memory one in `phonelink-nullables`.

pub mod error;
pub mod record;

pub use error::StoreError;
pub use record::{
    apply_process_step, apply_validation_status, is_sweepable, RecordStore,
    EXPIRED_RECORD_GRACE_SECS,
};
