use course_core::model::{Course, CourseId};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::SqliteRepository;
use super::mapping::{conn, course_id_from_i64, id_to_i64, map_course_row, ser};
use super::section_repo::fetch_sections;
use crate::repository::{
    CourseQuery, CourseRepository, CourseUpdate, CourseWithSections, NewCourseRecord,
    StorageError, title_matches,
};

const COURSE_COLUMNS: &str = r"
    SELECT c.id, c.title, c.class_id, c.subject_id, c.last_editor,
           p.username AS last_editor_username, c.validated, c.created_at,
           cl.name AS class_name, su.name AS subject_name
    FROM courses c
    LEFT JOIN profiles p ON p.id = c.last_editor
    LEFT JOIN classes cl ON cl.id = c.class_id
    LEFT JOIN subjects su ON su.id = c.subject_id
";

async fn with_sections(
    pool: &SqlitePool,
    course: Course,
    row: &SqliteRow,
) -> Result<CourseWithSections, StorageError> {
    let sections = fetch_sections(pool, course.id).await?;
    Ok(CourseWithSections {
        course,
        sections,
        class_name: row.try_get("class_name").map_err(ser)?,
        subject_name: row.try_get("subject_name").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO courses (title, class_id, subject_id, last_editor, validated, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(course.title)
        .bind(id_to_i64("class_id", course.class_id.value())?)
        .bind(id_to_i64("subject_id", course.subject_id.value())?)
        .bind(course.last_editor.map(|id| id.to_string()))
        .bind(course.validated)
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        course_id_from_i64(res.last_insert_rowid())
    }

    async fn update_course(
        &self,
        id: CourseId,
        update: &CourseUpdate,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE courses
            SET title = ?1, class_id = ?2, subject_id = ?3, last_editor = ?4, validated = ?5
            WHERE id = ?6
            ",
        )
        .bind(&update.title)
        .bind(id_to_i64("class_id", update.class_id.value())?)
        .bind(id_to_i64("subject_id", update.subject_id.value())?)
        .bind(update.last_editor.to_string())
        .bind(update.validated)
        .bind(id_to_i64("course_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<CourseWithSections>, StorageError> {
        let sql = format!("{COURSE_COLUMNS} WHERE c.id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => {
                let course = map_course_row(&row)?;
                with_sections(&self.pool, course, &row).await.map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_courses(
        &self,
        query: &CourseQuery,
    ) -> Result<Vec<CourseWithSections>, StorageError> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(COURSE_COLUMNS);
        qb.push(" WHERE 1 = 1");
        if query.published_only {
            qb.push(" AND c.validated = 1");
        }
        if let Some(class_id) = query.class_id {
            qb.push(" AND c.class_id = ")
                .push_bind(id_to_i64("class_id", class_id.value())?);
        }
        if let Some(subject_id) = query.subject_id {
            qb.push(" AND c.subject_id = ")
                .push_bind(id_to_i64("subject_id", subject_id.value())?);
        }
        qb.push(" ORDER BY c.created_at DESC, c.id DESC");
        // SQLite LIKE only folds ASCII, so the title search runs here instead
        let search = query.search_term();
        if let (None, Some(limit)) = (&search, query.limit) {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(conn)?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            if courses.len() == query.row_limit() {
                break;
            }
            let course = map_course_row(&row)?;
            if search
                .as_deref()
                .is_some_and(|term| !title_matches(&course.title, term))
            {
                continue;
            }
            courses.push(with_sections(&self.pool, course, &row).await?);
        }
        Ok(courses)
    }

    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM courses WHERE id = ?1")
            .bind(id_to_i64("course_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
