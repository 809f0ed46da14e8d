//! Content-addressed image blob storage

use crate::error::{Error, Result};
use crate::models::{ContentHash, StoredImage};
use libsql::Connection;

/// Image blob storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ImageRepository {
    /// Store an image under its hash. Storing the same hash twice is a no-op.
    async fn put(&self, image: &StoredImage) -> Result<bool>;

    async fn get(&self, hash: &ContentHash) -> Result<Option<StoredImage>>;

    async fn contains(&self, hash: &ContentHash) -> Result<bool>;

    async fn delete(&self, hash: &ContentHash) -> Result<bool>;

    async fn list_hashes(&self) -> Result<Vec<ContentHash>>;
}

/// libSQL implementation of `ImageRepository`
pub struct LibSqlImageRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlImageRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ImageRepository for LibSqlImageRepository<'_> {
    async fn put(&self, image: &StoredImage) -> Result<bool> {
        let size = i64::try_from(image.bytes.len())
            .map_err(|_| Error::Storage("image too large".to_string()))?;
        let now = chrono::Utc::now().timestamp_millis();

        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO image_blobs (hash, mime_type, size_bytes, bytes, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    image.hash.as_str(),
                    image.mime_type.as_str(),
                    size,
                    image.bytes.clone(),
                    now
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<StoredImage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT mime_type, bytes FROM image_blobs WHERE hash = ?",
                [hash.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(StoredImage {
                hash: hash.clone(),
                mime_type: row.get(0)?,
                bytes: row.get(1)?,
            })),
            None => Ok(None),
        }
    }

    async fn contains(&self, hash: &ContentHash) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM image_blobs WHERE hash = ?)",
                [hash.as_str()],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM image_blobs WHERE hash = ?", [hash.as_str()])
            .await?;
        Ok(affected > 0)
    }

    async fn list_hashes(&self) -> Result<Vec<ContentHash>> {
        let mut rows = self
            .conn
            .query("SELECT hash FROM image_blobs ORDER BY created_at ASC", ())
            .await?;

        let mut hashes = Vec::new();
        while let Some(row) = rows.next().await? {
            let hash: String = row.get(0)?;
            hashes.push(hash.parse()?);
        }
        Ok(hashes)
    }
}
