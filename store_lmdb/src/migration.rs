//! Database schema versioning.
//!
//! Tracks a monotonically increasing schema version in the meta database and
//! refuses to open a database written by a newer node.

use heed::types::Bytes;
use heed::{Database, Env};

use crate::LmdbError;

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - Version 0 means a fresh database (no version stored yet).
    /// - If the stored version matches `CURRENT_SCHEMA_VERSION`, this is a no-op.
    /// - If the stored version is *higher* than what this code supports,
    ///   the database was written by a newer node and we refuse to open it.
    pub fn run(env: &Env, meta_db: &Database<Bytes, Bytes>) -> Result<(), LmdbError> {
        let current = read_version(env, meta_db)?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "database schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Heed(format!(
                "database schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(version, version + 1)?;
        }

        let mut wtxn = env.write_txn()?;
        meta_db.put(
            &mut wtxn,
            SCHEMA_VERSION_KEY,
            &CURRENT_SCHEMA_VERSION.to_le_bytes(),
        )?;
        wtxn.commit()?;

        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }
}

fn read_version(env: &Env, meta_db: &Database<Bytes, Bytes>) -> Result<u32, LmdbError> {
    let rtxn = env.read_txn()?;
    match meta_db.get(&rtxn, SCHEMA_VERSION_KEY)? {
        None => Ok(0),
        Some(bytes) => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                LmdbError::Serialization(format!(
                    "schema version has {} bytes, expected 4",
                    bytes.len()
                ))
            })?;
            Ok(u32::from_le_bytes(arr))
        }
    }
}

fn run_migration(from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        // Initial schema: the records database keyed by raw request id.
        (0, 1) => Ok(()),
        _ => Err(LmdbError::Heed(format!(
            "unknown migration: {} -> {}",
            from, to
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MAX_DBS;
    use crate::LmdbEnvironment;

    #[test]
    fn unknown_migration_is_error() {
        assert!(run_migration(99, 100).is_err());
    }

    #[test]
    fn initial_migration_succeeds() {
        assert!(run_migration(0, 1).is_ok());
    }

    #[test]
    fn reopening_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        drop(LmdbEnvironment::open(dir.path(), MAX_DBS, 10 * 1024 * 1024).unwrap());
        assert!(LmdbEnvironment::open(dir.path(), MAX_DBS, 10 * 1024 * 1024).is_ok());
    }
}
