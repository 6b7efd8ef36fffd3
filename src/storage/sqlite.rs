use super::{Storage, SCHEMA_SQL};
use crate::constants::{
    MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME, NEEDS_REVISION_RATING_ID,
    NEEDS_REVISION_RATING_NAME,
};
use crate::domain::{AssociationKind, Content, EntityKind};
use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Local SQLite store.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite catalog at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.ensure_schema()?;
        Ok(storage)
    }

    /// Create missing tables and the sentinel rows. Safe to call repeatedly.
    ///
    /// Foreign keys are switched on for the connection, so edges and
    /// availability rows must point at existing content and lookup rows.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO director (director_id, name) VALUES (?1, ?2)",
            params![MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO rating (rating_id, name) VALUES (?1, ?2)",
            params![NEEDS_REVISION_RATING_ID, NEEDS_REVISION_RATING_NAME],
        )?;
        debug!("Catalog schema ready");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LoaderError::storage("SQLite connection lock poisoned"))
    }
}

fn content_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content {
        content_id: row.get(0)?,
        format: row.get(1)?,
        title: row.get(2)?,
        director: row.get(3)?,
        release_year: row.get(4)?,
        rating: row.get(5)?,
        duration: row.get(6)?,
        description: row.get(7)?,
        genre: row.get(8)?,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn find_entity(&self, kind: EntityKind, key: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            kind.id_column(),
            kind.table(),
            kind.key_column()
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let id = stmt
            .query_row(params![key], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id)
    }

    async fn insert_entity(&self, kind: EntityKind, key: &str) -> Result<i64> {
        let conn = self.conn()?;
        let sql = format!("INSERT INTO {} ({}) VALUES (?1)", kind.table(), kind.key_column());
        conn.execute(&sql, params![key])?;
        Ok(conn.last_insert_rowid())
    }

    async fn content_exists(&self, content_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM content WHERE content_id = ?1",
                params![content_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn insert_content(&self, content: &Content) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO content (content_id, format, title, director, release_year, rating, duration, description, genre)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                content.content_id,
                content.format,
                content.title,
                content.director,
                content.release_year,
                content.rating,
                content.duration,
                content.description,
                content.genre
            ],
        )?;
        Ok(())
    }

    async fn insert_availability(&self, content_id: i64, availability: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO content_availability (content, availability) VALUES (?1, ?2)",
            params![content_id, availability],
        )?;
        Ok(())
    }

    async fn edge_exists(&self, kind: AssociationKind, left: i64, right: i64) -> Result<bool> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT 1 FROM {} WHERE \"{}\" = ?1 AND \"{}\" = ?2",
            kind.table(),
            kind.left_column(),
            kind.right_column()
        );
        let found = conn
            .query_row(&sql, params![left, right], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    async fn insert_edge(&self, kind: AssociationKind, left: i64, right: i64) -> Result<()> {
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO {} (\"{}\", \"{}\") VALUES (?1, ?2)",
            kind.table(),
            kind.left_column(),
            kind.right_column()
        );
        conn.execute(&sql, params![left, right])?;
        Ok(())
    }

    async fn get_content(&self, content_id: i64) -> Result<Option<Content>> {
        let conn = self.conn()?;
        let content = conn
            .query_row(
                "SELECT content_id, format, title, director, release_year, rating, duration, description, genre
                 FROM content WHERE content_id = ?1",
                params![content_id],
                content_from_row,
            )
            .optional()?;
        Ok(content)
    }

    async fn get_availability(&self, content_id: i64) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let availability = conn
            .query_row(
                "SELECT availability FROM content_availability WHERE content = ?1",
                params![content_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(availability)
    }

    async fn list_content_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT content_id FROM content ORDER BY content_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<(i64, String)>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {id}, {key} FROM {table} ORDER BY {id}",
            id = kind.id_column(),
            key = kind.key_column(),
            table = kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(i64, String)>>>()?;
        Ok(rows)
    }

    async fn list_edges(&self, kind: AssociationKind) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT \"{left}\", \"{right}\" FROM {table} ORDER BY \"{left}\", \"{right}\"",
            left = kind.left_column(),
            right = kind.right_column(),
            table = kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(i64, i64)>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn schema_bootstrap_is_repeatable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.insert_entity(EntityKind::Tag, "Comedy").await.unwrap();
        }
        let storage = SqliteStorage::open(&path).unwrap();
        storage.ensure_schema().unwrap();
        assert_eq!(
            storage.find_entity(EntityKind::Tag, "Comedy").await.unwrap(),
            Some(1)
        );
        assert_eq!(
            storage.list_entities(EntityKind::Director).await.unwrap(),
            vec![(MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME.to_string())]
        );
    }

    #[tokio::test]
    async fn content_round_trips_nullable_columns() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let content = Content {
            content_id: 5,
            format: None,
            title: Some("A Title".into()),
            director: Some(MULTIPLE_DIRECTORS_ID),
            release_year: None,
            rating: NEEDS_REVISION_RATING_ID,
            duration: Some("90 min".into()),
            description: None,
            genre: 6,
        };
        storage.insert_content(&content).await.unwrap();
        assert!(storage.content_exists(5).await.unwrap());
        assert!(!storage.content_exists(6).await.unwrap());
        assert_eq!(storage.get_content(5).await.unwrap(), Some(content.clone()));
        assert!(storage.insert_content(&content).await.is_err());
    }

    fn content(content_id: i64) -> Content {
        Content {
            content_id,
            format: None,
            title: Some("A Title".into()),
            director: None,
            release_year: Some(2019),
            rating: NEEDS_REVISION_RATING_ID,
            duration: None,
            description: None,
            genre: content_id.rem_euclid(9) + 1,
        }
    }

    #[tokio::test]
    async fn release_edges_use_quoted_column() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.insert_content(&content(5)).await.unwrap();
        let release = storage
            .insert_entity(EntityKind::Release, "2020-01-01")
            .await
            .unwrap();
        storage
            .insert_edge(AssociationKind::ContentRelease, 5, release)
            .await
            .unwrap();
        assert!(storage
            .edge_exists(AssociationKind::ContentRelease, 5, release)
            .await
            .unwrap());
        assert_eq!(
            storage
                .list_edges(AssociationKind::ContentRelease)
                .await
                .unwrap(),
            vec![(5, release)]
        );
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let foreign_keys: bool = storage
            .conn()
            .unwrap()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(foreign_keys);

        let tag = storage.insert_entity(EntityKind::Tag, "Comedy").await.unwrap();
        assert!(storage
            .insert_edge(AssociationKind::ContentTag, 5, tag)
            .await
            .is_err());
        assert!(storage.insert_availability(5, 1).await.is_err());

        storage.insert_content(&content(5)).await.unwrap();
        storage
            .insert_edge(AssociationKind::ContentTag, 5, tag)
            .await
            .unwrap();
        assert!(storage
            .insert_edge(AssociationKind::ContentTag, 5, tag + 1)
            .await
            .is_err());
        // genre_tags.genre is a bucket number, not a content id
        storage
            .insert_edge(AssociationKind::GenreTag, 6, tag)
            .await
            .unwrap();
    }
}
