//! Nullable store: thread-safe in-memory record storage for testing.

use phonelink_store::{
    apply_process_step, apply_validation_status, is_sweepable, RecordStore, StoreError,
};
use phonelink_types::{ProcessStep, RequestId, Timestamp, ValidationStatus, VerificationRecord};
use std::collections::HashMap;
use parking_lot::Mutex;

/// An in-memory [`RecordStore`] with the same transition rules as the LMDB one.
#[derive(Default)]
pub struct NullStore {
    records: Mutex<HashMap<RequestId, VerificationRecord>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(
        &self,
        id: &RequestId,
        f: impl FnOnce(&mut VerificationRecord) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut updated = record.clone();
        f(&mut updated)?;
        *record = updated;
        Ok(())
    }
}

impl RecordStore for NullStore {
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.request_id) {
            return Err(StoreError::Duplicate(record.request_id.to_string()));
        }
        records.insert(record.request_id, record.clone());
        Ok(())
    }

    fn update_validation_status(
        &self,
        id: &RequestId,
        status: ValidationStatus,
    ) -> Result<(), StoreError> {
        self.update(id, |r| apply_validation_status(r, status))
    }

    fn update_send_code(
        &self,
        id: &RequestId,
        status: ValidationStatus,
        code: &str,
        expire_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.update(id, |r| {
            apply_validation_status(r, status)?;
            r.send_code = code.to_string();
            r.expire_at = expire_at;
            Ok(())
        })
    }

    fn update_receive_code(&self, id: &RequestId, code: &str) -> Result<(), StoreError> {
        self.update(id, |r| {
            r.receive_code = code.to_string();
            Ok(())
        })
    }

    fn update_process_step(&self, id: &RequestId, step: ProcessStep) -> Result<(), StoreError> {
        self.update(id, |r| apply_process_step(r, step))
    }

    fn get(&self, id: &RequestId) -> Result<Option<VerificationRecord>, StoreError> {
        Ok(self.records.lock().get(id).cloned())
    }

    fn list_unfinished(&self) -> Result<Vec<VerificationRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.process_step.is_actionable())
            .cloned()
            .collect())
    }

    fn delete_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| !is_sweepable(r, now));
        Ok(before - records.len())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().len())
    }
}
