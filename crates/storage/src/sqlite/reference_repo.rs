use async_trait::async_trait;
use course_core::model::{ClassId, Profile, SubjectId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, ser};
use crate::repository::{ReferenceDataRepository, StorageError};

#[async_trait]
impl ReferenceDataRepository for SqliteRepository {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO profiles (id, username) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET username = excluded.username
            ",
        )
        .bind(profile.id.to_string())
        .bind(profile.username.as_deref())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query("SELECT username FROM profiles WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Profile {
            id,
            username: row.try_get("username").map_err(ser)?,
        }))
    }

    async fn upsert_class(&self, id: ClassId, name: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO classes (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(id_to_i64("class_id", id.value())?)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn upsert_subject(&self, id: SubjectId, name: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subjects (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(id_to_i64("subject_id", id.value())?)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
