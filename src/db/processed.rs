use rusqlite::{params, OptionalExtension};

use super::{now_timestamp, Database};
use crate::error::Result;

impl Database {
    /// Record that an image went through extraction. Re-marking replaces the row.
    pub fn mark_image_processed(&self, image_path: &str, albums_extracted: u32) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO processed_images (image_path, processed_date, albums_extracted)
            VALUES (?, ?, ?)
            "#,
            params![image_path, now_timestamp(), albums_extracted],
        )?;
        Ok(())
    }

    pub fn is_image_processed(&self, image_path: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM processed_images WHERE image_path = ?",
                [image_path],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn processed_image_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM processed_images", [], |row| row.get(0))?;
        Ok(count)
    }
}
