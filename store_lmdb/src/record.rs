//! LMDB implementation of RecordStore.
//!
//! Each update runs its read-modify-write inside one write transaction, so
//! LMDB's single-writer lock serializes concurrent updates to the same record.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use phonelink_store::{
    apply_process_step, apply_validation_status, is_sweepable, RecordStore, StoreError,
};
use phonelink_types::{ProcessStep, RequestId, Timestamp, ValidationStatus, VerificationRecord};

use crate::LmdbError;

pub struct LmdbRecordStore {
    pub(crate) env: Arc<Env>,
    pub(crate) records_db: Database<Bytes, Bytes>,
}

fn encode(record: &VerificationRecord) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(record)?)
}

fn decode(bytes: &[u8]) -> Result<VerificationRecord, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

impl LmdbRecordStore {
    fn update<F>(&self, id: &RequestId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut VerificationRecord) -> Result<(), StoreError>,
    {
        let key = id.as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut record = match self.records_db.get(&wtxn, key).map_err(LmdbError::from)? {
            Some(bytes) => decode(bytes)?,
            None => return Err(StoreError::NotFound(id.to_string())),
        };
        apply(&mut record)?;
        let bytes = encode(&record)?;
        self.records_db
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl RecordStore for LmdbRecordStore {
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        let key = record.request_id.as_bytes();
        let bytes = encode(record)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .records_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(record.request_id.to_string()));
        }
        self.records_db
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn update_validation_status(
        &self,
        id: &RequestId,
        status: ValidationStatus,
    ) -> Result<(), StoreError> {
        self.update(id, |record| apply_validation_status(record, status))
    }

    fn update_send_code(
        &self,
        id: &RequestId,
        status: ValidationStatus,
        code: &str,
        expire_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.update(id, |record| {
            apply_validation_status(record, status)?;
            record.send_code = code.to_string();
            record.expire_at = expire_at;
            Ok(())
        })
    }

    fn update_receive_code(&self, id: &RequestId, code: &str) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.receive_code = code.to_string();
            Ok(())
        })
    }

    fn update_process_step(&self, id: &RequestId, step: ProcessStep) -> Result<(), StoreError> {
        self.update(id, |record| apply_process_step(record, step))
    }

    fn get(&self, id: &RequestId) -> Result<Option<VerificationRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .records_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn list_unfinished(&self) -> Result<Vec<VerificationRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in self.records_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, bytes) = entry.map_err(LmdbError::from)?;
            let record = decode(bytes)?;
            if record.process_step.is_actionable() {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn delete_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        // Collect keys first, then delete (can't mutate while iterating).
        let mut expired: Vec<Vec<u8>> = Vec::new();
        for entry in self.records_db.iter(&wtxn).map_err(LmdbError::from)? {
            let (key, bytes) = entry.map_err(LmdbError::from)?;
            match decode(bytes) {
                Ok(record) if is_sweepable(&record, now) => expired.push(key.to_vec()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable record during expiry sweep")
                }
            }
        }

        for key in &expired {
            self.records_db
                .delete(&mut wtxn, key)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "deleted expired records");
        }
        Ok(expired.len())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let len = self.records_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(len as usize)
    }
}
