use super::{Storage, SCHEMA_SQL};
use crate::constants::{
    MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME, NEEDS_REVISION_RATING_ID,
    NEEDS_REVISION_RATING_NAME,
};
use crate::domain::{AssociationKind, Content, EntityKind};
use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use tracing::info;

/// Turso/libSQL-backed store.
pub struct LibsqlStorage {
    _db: Database,
    conn: Connection,
}

impl LibsqlStorage {
    /// Connect to a remote Turso database and make sure the schema exists.
    pub async fn connect_remote(url: &str, auth_token: &str) -> Result<Self> {
        info!("Connecting to Turso database at {}", url);

        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| LoaderError::storage(format!("Failed to connect to database: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| LoaderError::storage(format!("Failed to get database connection: {e}")))?;
        let storage = Self { _db: db, conn };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    /// Create missing tables and the sentinel rows.
    pub async fn ensure_schema(&self) -> Result<()> {
        info!("Ensuring catalog schema...");
        self.conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        self.conn.execute_batch(SCHEMA_SQL).await?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO director (director_id, name) VALUES (?1, ?2)",
                libsql::params![MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME],
            )
            .await?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO rating (rating_id, name) VALUES (?1, ?2)",
                libsql::params![NEEDS_REVISION_RATING_ID, NEEDS_REVISION_RATING_NAME],
            )
            .await?;
        Ok(())
    }

    async fn query_i64_pairs(&self, sql: &str) -> Result<Vec<(i64, i64)>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push((row.get::<i64>(0)?, row.get::<i64>(1)?));
        }
        Ok(results)
    }
}

#[async_trait]
impl Storage for LibsqlStorage {
    async fn find_entity(&self, kind: EntityKind, key: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            kind.id_column(),
            kind.table(),
            kind.key_column()
        );
        let mut rows = self.conn.query(&sql, libsql::params![key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)?)),
            None => Ok(None),
        }
    }

    async fn insert_entity(&self, kind: EntityKind, key: &str) -> Result<i64> {
        let sql = format!("INSERT INTO {} ({}) VALUES (?1)", kind.table(), kind.key_column());
        self.conn.execute(&sql, libsql::params![key]).await?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn content_exists(&self, content_id: i64) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM content WHERE content_id = ?1",
                libsql::params![content_id],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn insert_content(&self, content: &Content) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO content (content_id, format, title, director, release_year, rating, duration, description, genre)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                libsql::params![
                    content.content_id,
                    content.format,
                    content.title.clone(),
                    content.director,
                    content.release_year,
                    content.rating,
                    content.duration.clone(),
                    content.description.clone(),
                    content.genre
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_availability(&self, content_id: i64, availability: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO content_availability (content, availability) VALUES (?1, ?2)",
                libsql::params![content_id, availability],
            )
            .await?;
        Ok(())
    }

    async fn edge_exists(&self, kind: AssociationKind, left: i64, right: i64) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE \"{}\" = ?1 AND \"{}\" = ?2",
            kind.table(),
            kind.left_column(),
            kind.right_column()
        );
        let mut rows = self.conn.query(&sql, libsql::params![left, right]).await?;
        Ok(rows.next().await?.is_some())
    }

    async fn insert_edge(&self, kind: AssociationKind, left: i64, right: i64) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (\"{}\", \"{}\") VALUES (?1, ?2)",
            kind.table(),
            kind.left_column(),
            kind.right_column()
        );
        self.conn.execute(&sql, libsql::params![left, right]).await?;
        Ok(())
    }

    async fn get_content(&self, content_id: i64) -> Result<Option<Content>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content_id, format, title, director, release_year, rating, duration, description, genre
                 FROM content WHERE content_id = ?1",
                libsql::params![content_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(Some(Content {
            content_id: row.get::<i64>(0)?,
            format: row.get::<Option<i64>>(1)?,
            title: row.get::<Option<String>>(2)?,
            director: row.get::<Option<i64>>(3)?,
            release_year: row.get::<Option<i64>>(4)?,
            rating: row.get::<i64>(5)?,
            duration: row.get::<Option<String>>(6)?,
            description: row.get::<Option<String>>(7)?,
            genre: row.get::<i64>(8)?,
        }))
    }

    async fn get_availability(&self, content_id: i64) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT availability FROM content_availability WHERE content = ?1",
                libsql::params![content_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)?)),
            None => Ok(None),
        }
    }

    async fn list_content_ids(&self) -> Result<Vec<i64>> {
        let mut rows = self
            .conn
            .query("SELECT content_id FROM content ORDER BY content_id", ())
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<(i64, String)>> {
        let sql = format!(
            "SELECT {id}, {key} FROM {table} ORDER BY {id}",
            id = kind.id_column(),
            key = kind.key_column(),
            table = kind.table()
        );
        let mut rows = self.conn.query(&sql, ()).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push((row.get::<i64>(0)?, row.get::<String>(1)?));
        }
        Ok(results)
    }

    async fn list_edges(&self, kind: AssociationKind) -> Result<Vec<(i64, i64)>> {
        let sql = format!(
            "SELECT \"{left}\", \"{right}\" FROM {table} ORDER BY \"{left}\", \"{right}\"",
            left = kind.left_column(),
            right = kind.right_column(),
            table = kind.table()
        );
        self.query_i64_pairs(&sql).await
    }
}
