//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::migration::Migrator;
use crate::{LmdbError, LmdbRecordStore};

const RECORDS_DB: &str = "records";
const META_DB: &str = "meta";

/// Named databases this backend creates.
pub const MAX_DBS: u32 = 2;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    records_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// Databases are created if absent and the schema version is checked, so
    /// opening an existing directory is idempotent.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("create {}: {e}", path.display())))?;

        // SAFETY: the environment is opened once per path by this process and
        // the directory is not shared with other programs.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(MAX_DBS))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let records_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(RECORDS_DB))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        Migrator::run(&env, &meta_db)?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            records_db,
        })
    }

    /// A record store sharing this environment.
    pub fn record_store(&self) -> LmdbRecordStore {
        LmdbRecordStore {
            env: Arc::clone(&self.env),
            records_db: self.records_db,
        }
    }
}
