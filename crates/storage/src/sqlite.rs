use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use roomstore_core::{RoomId, SceneVersion};

use crate::error::StorageError;
use crate::schema::{ensure_scene_table, init_schema};
use crate::traits::{
    BlobBackend, RecordBackend, SceneRecordUpdate, StoredSceneRecord, UploadOptions,
};

struct Inner {
    conn: Connection,
    scene_tables: HashSet<String>,
}

impl Inner {
    fn scene_table(&mut self, table: &str) -> Result<&Connection, StorageError> {
        if !self.scene_tables.contains(table) {
            ensure_scene_table(&self.conn, table)?;
            self.scene_tables.insert(table.to_string());
        }
        Ok(&self.conn)
    }
}

/// Embedded backend serving both scene records and blobs from one SQLite
/// database. Statements run on the calling task; SQLite calls are short and
/// the connection is serialized behind a mutex.
pub struct SqliteBackend {
    inner: Mutex<Inner>,
}

impl SqliteBackend {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        init_schema(&conn)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                scene_tables: HashSet::new(),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Unavailable("sqlite connection poisoned".into()))
    }
}

fn read_record(row: &rusqlite::Row) -> rusqlite::Result<StoredSceneRecord> {
    let room_id: String = row.get(0)?;
    let scene_version: i64 = row.get(1)?;
    Ok(StoredSceneRecord {
        room_id: RoomId::new(room_id),
        scene_version: SceneVersion::from_i64(scene_version),
        iv: row.get(2)?,
        ciphertext: row.get(3)?,
    })
}

fn unix_now() -> i64 {
    roomstore_core::clock::physical_now().unwrap_or(0) / 1000
}

#[async_trait]
impl RecordBackend for SqliteBackend {
    async fn select_one(
        &self,
        table: &str,
        room_id: &RoomId,
    ) -> Result<Option<StoredSceneRecord>, StorageError> {
        let mut inner = self.lock()?;
        let conn = inner.scene_table(table)?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT room_id, scene_version, iv, ciphertext FROM {table} WHERE room_id = ?1"
                ),
                rusqlite::params![room_id.as_str()],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    async fn insert(&self, table: &str, record: &StoredSceneRecord) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        let conn = inner.scene_table(table)?;
        let result = conn.execute(
            &format!(
                "INSERT INTO {table} (room_id, scene_version, iv, ciphertext, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            rusqlite::params![
                record.room_id.as_str(),
                record.scene_version.as_i64(),
                record.iv,
                record.ciphertext,
                unix_now(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Write(format!(
                    "duplicate key {} in {table}",
                    record.room_id
                )))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    async fn update(
        &self,
        table: &str,
        room_id: &RoomId,
        fields: &SceneRecordUpdate,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        let conn = inner.scene_table(table)?;
        let changed = conn.execute(
            &format!(
                "UPDATE {table} SET scene_version = ?1, iv = ?2, ciphertext = ?3, updated_at = ?4 WHERE room_id = ?5"
            ),
            rusqlite::params![
                fields.scene_version.as_i64(),
                fields.iv,
                fields.ciphertext,
                unix_now(),
                room_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("{table}/{room_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobBackend for SqliteBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let inner = self.lock()?;
        let sql = if options.upsert {
            "INSERT INTO blobs (bucket, path, bytes, cache_control, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (bucket, path) DO UPDATE SET bytes = excluded.bytes, cache_control = excluded.cache_control, uploaded_at = excluded.uploaded_at"
        } else {
            "INSERT INTO blobs (bucket, path, bytes, cache_control, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)"
        };
        let result = inner.conn.execute(
            sql,
            rusqlite::params![bucket, path, bytes, options.cache_control, unix_now()],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Write(format!("{bucket}/{path} already exists")))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let inner = self.lock()?;
        inner
            .conn
            .query_row(
                "SELECT bytes FROM blobs WHERE bucket = ?1 AND path = ?2",
                rusqlite::params![bucket, path],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{path}")))
    }
}
