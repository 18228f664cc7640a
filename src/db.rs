//! LMDB environment, database handles and composite keys

use std::path::Path;

use byteorder::BigEndian;
use heed::types::{Bytes, SerdeJson, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::constants::{DEFAULT_MAP_SIZE_MB, MAX_DBS};
use crate::error::{GateError, Result};
use crate::models::{Permission, Role, User};

// Database type aliases
pub type Db = Database<Bytes, U64<BigEndian>>;
pub type ById<T> = Database<U64<BigEndian>, SerdeJson<T>>;
pub type ByName = Database<Str, U64<BigEndian>>;

/// Create a 16-byte key from two u64 values
#[inline]
pub fn key(a: u64, b: u64) -> [u8; 16] {
    let mut k = [0u8; 16];
    k[..8].copy_from_slice(&a.to_be_bytes());
    k[8..].copy_from_slice(&b.to_be_bytes());
    k
}

pub(crate) fn epoch_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Join index keyed by `[a, b]`; lists the `b` side for a given `a`.
/// Values hold the epoch (ms) at which the pair was linked.
pub struct Pairs {
    pub db: Db,
}

impl Pairs {
    #[inline]
    pub fn contains(&self, tx: &RoTxn, a: u64, b: u64) -> Result<bool> {
        Ok(self.db.get(tx, &key(a, b))?.is_some())
    }

    /// Link a and b. Returns false if they were already linked.
    #[inline]
    pub fn link(&self, tx: &mut RwTxn, a: u64, b: u64) -> Result<bool> {
        if self.contains(tx, a, b)? {
            return Ok(false);
        }
        self.db.put(tx, &key(a, b), &epoch_millis())?;
        Ok(true)
    }

    /// Unlink a and b. Returns false if they were not linked.
    #[inline]
    pub fn unlink(&self, tx: &mut RwTxn, a: u64, b: u64) -> Result<bool> {
        Ok(self.db.delete(tx, &key(a, b))?)
    }

    pub fn list(&self, tx: &RoTxn, a: u64) -> Result<Vec<u64>> {
        let mut r = Vec::new();
        for item in self.db.prefix_iter(tx, &a.to_be_bytes())? {
            let (k, _) = item?;
            let tail: [u8; 8] = k
                .get(8..16)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| GateError::Corrupt(format!("index key of length {}", k.len())))?;
            r.push(u64::from_be_bytes(tail));
        }
        Ok(r)
    }

    pub fn count(&self, tx: &RoTxn, a: u64) -> Result<usize> {
        Ok(self.db.prefix_iter(tx, &a.to_be_bytes())?.count())
    }

    /// Drop every pair whose first side is `a`
    pub fn unlink_all(&self, tx: &mut RwTxn, a: u64) -> Result<usize> {
        let others = self.list(tx, a)?;
        for &b in &others {
            self.unlink(tx, a, b)?;
        }
        Ok(others.len())
    }
}

/// All database handles
pub struct Dbs {
    pub permissions: ById<Permission>,
    pub permission_names: ByName,
    pub roles: ById<Role>,
    pub role_names: ByName,
    pub users: ById<User>,
    pub user_emails: ByName,
    /// role -> permission bindings
    pub role_perms: Pairs,
    /// role -> user membership
    pub role_users: Pairs,
    pub meta: Database<Str, Str>,
}

/// Handle to one LMDB environment.
///
/// Cheap to share behind an `Arc`; all state lives in the environment, so
/// several stores on different paths can coexist in one process.
pub struct Store {
    env: Env,
    dbs: Dbs,
}

impl Store {
    /// Open (or create) a store with the default map size
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DEFAULT_MAP_SIZE_MB)
    }

    pub fn open_with(path: impl AsRef<Path>, map_size_mb: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(MAX_DBS)
                .open(path)?
        };
        let mut tx = env.write_txn()?;
        let dbs = Dbs {
            permissions: env.create_database(&mut tx, Some("permissions"))?,
            permission_names: env.create_database(&mut tx, Some("permission_names"))?,
            roles: env.create_database(&mut tx, Some("roles"))?,
            role_names: env.create_database(&mut tx, Some("role_names"))?,
            users: env.create_database(&mut tx, Some("users"))?,
            user_emails: env.create_database(&mut tx, Some("user_emails"))?,
            role_perms: Pairs { db: env.create_database(&mut tx, Some("role_perms"))? },
            role_users: Pairs { db: env.create_database(&mut tx, Some("role_users"))? },
            meta: env.create_database(&mut tx, Some("meta"))?,
        };
        tx.commit()?;
        tracing::info!(path = %path.display(), map_size_mb, "Store opened");
        Ok(Store { env, dbs })
    }

    pub(crate) fn env(&self) -> &Env {
        &self.env
    }

    pub(crate) fn dbs(&self) -> &Dbs {
        &self.dbs
    }

    /// Execute a read-only operation against a consistent snapshot
    #[inline]
    pub fn read<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<GateError>,
        F: FnOnce(&Dbs, &RoTxn) -> std::result::Result<T, E>,
    {
        let tx = self.env.read_txn().map_err(GateError::from)?;
        f(&self.dbs, &tx)
    }
}
