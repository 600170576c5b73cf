use course_core::model::{
    ClassId, Course, CourseId, Editor, ImageRef, Section, SectionId, SubjectId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn section_id_from_i64(v: i64) -> Result<SectionId, StorageError> {
    Ok(SectionId::new(i64_to_u64("section_id", v)?))
}

fn user_id_from_text(v: &str) -> Result<UserId, StorageError> {
    v.parse::<UserId>().map_err(ser)
}

/// Joined editor columns: `<prefix>` holds the user id, `<prefix>_username`
/// the profile name.
fn editor_from_row(
    row: &SqliteRow,
    id_col: &str,
    name_col: &str,
) -> Result<Option<Editor>, StorageError> {
    let Some(raw) = row.try_get::<Option<String>, _>(id_col).map_err(ser)? else {
        return Ok(None);
    };
    let username = row.try_get::<Option<String>, _>(name_col).map_err(ser)?;
    Ok(Some(Editor::new(user_id_from_text(&raw)?, username)))
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Ok(Course {
        id: course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        class_id: ClassId::new(i64_to_u64(
            "class_id",
            row.try_get::<i64, _>("class_id").map_err(ser)?,
        )?),
        subject_id: SubjectId::new(i64_to_u64(
            "subject_id",
            row.try_get::<i64, _>("subject_id").map_err(ser)?,
        )?),
        last_editor: editor_from_row(row, "last_editor", "last_editor_username")?,
        validated: row.try_get::<bool, _>("validated").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_section_row(row: &SqliteRow) -> Result<Section, StorageError> {
    let image_url = row
        .try_get::<Option<String>, _>("image_url")
        .map_err(ser)?
        .and_then(|raw| ImageRef::parse(&raw));

    let position_i64: i64 = row.try_get("position").map_err(ser)?;
    let position = u32::try_from(position_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid position: {position_i64}")))?;

    Ok(Section {
        id: section_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        image_url,
        edited_by: editor_from_row(row, "edited_by", "edited_by_username")?,
        position,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
