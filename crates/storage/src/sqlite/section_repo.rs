use course_core::model::{CourseId, ImageRef, Section, SectionId};
use sqlx::SqlitePool;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_section_row, section_id_from_i64};
use crate::repository::{NewSectionRecord, SectionRepository, SectionUpdate, StorageError};

pub(crate) async fn fetch_sections(
    pool: &SqlitePool,
    course_id: CourseId,
) -> Result<Vec<Section>, StorageError> {
    let rows = sqlx::query(
        r"
        SELECT s.id, s.course_id, s.title, s.content, s.image_url, s.edited_by,
               p.username AS edited_by_username, s.position, s.created_at
        FROM course_sections s
        LEFT JOIN profiles p ON p.id = s.edited_by
        WHERE s.course_id = ?1
        ORDER BY s.position ASC, s.id ASC
        ",
    )
    .bind(id_to_i64("course_id", course_id.value())?)
    .fetch_all(pool)
    .await
    .map_err(conn)?;

    rows.iter().map(map_section_row).collect()
}

#[async_trait::async_trait]
impl SectionRepository for SqliteRepository {
    async fn insert_section(&self, section: NewSectionRecord) -> Result<SectionId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO course_sections (course_id, title, content, image_url, edited_by, position, created_at)
            VALUES (
                ?1, ?2, ?3, ?4, ?5,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM course_sections WHERE course_id = ?1),
                ?6
            )
            ",
        )
        .bind(id_to_i64("course_id", section.course_id.value())?)
        .bind(section.title)
        .bind(section.content)
        .bind(section.image_url.map(|i| i.as_str().to_owned()))
        .bind(section.edited_by.to_string())
        .bind(section.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StorageError::Conflict(db.message().to_owned())
            }
            other => conn(other),
        })?;

        section_id_from_i64(res.last_insert_rowid())
    }

    async fn update_section(
        &self,
        id: SectionId,
        update: &SectionUpdate,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE course_sections
            SET title = ?1, content = ?2, image_url = ?3, edited_by = ?4
            WHERE id = ?5
            ",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(update.image_url.as_ref().map(ImageRef::as_str))
        .bind(update.edited_by.to_string())
        .bind(id_to_i64("section_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_sections(&self, course_id: CourseId) -> Result<Vec<Section>, StorageError> {
        fetch_sections(&self.pool, course_id).await
    }
}
