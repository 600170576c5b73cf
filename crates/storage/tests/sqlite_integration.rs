use course_core::model::{ClassId, CourseId, ImageRef, Profile, SubjectId, UserId};
use course_core::time::fixed_now;
use storage::repository::{
    CourseQuery, CourseRepository, CourseUpdate, KeyValueStore, NewCourseRecord, NewSectionRecord,
    ReferenceDataRepository, SectionRepository, SectionUpdate, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo.upsert_class(ClassId::new(1), "6e").await.unwrap();
    repo.upsert_class(ClassId::new(2), "5e").await.unwrap();
    repo.upsert_subject(SubjectId::new(1), "Maths").await.unwrap();
    repo
}

fn course(title: &str, class: u64, validated: bool, editor: Option<UserId>) -> NewCourseRecord {
    NewCourseRecord {
        title: title.to_string(),
        class_id: ClassId::new(class),
        subject_id: SubjectId::new(1),
        last_editor: editor,
        validated,
        created_at: fixed_now(),
    }
}

fn section(course_id: CourseId, title: &str, editor: UserId) -> NewSectionRecord {
    NewSectionRecord {
        course_id,
        title: title.to_string(),
        content: format!("{title} content"),
        image_url: None,
        edited_by: editor,
        created_at: fixed_now(),
    }
}

#[tokio::test]
async fn sqlite_round_trips_course_with_ordered_attributed_sections() {
    let repo = connect("memdb_course_roundtrip").await;
    let bob = Profile::new(UserId::random(), "bob");
    let alice = Profile::new(UserId::random(), "alice");
    repo.upsert_profile(&bob).await.unwrap();
    repo.upsert_profile(&alice).await.unwrap();

    let course_id = repo
        .insert_course(course("Fractions", 1, true, None))
        .await
        .unwrap();
    repo.insert_section(section(course_id, "Intro", bob.id))
        .await
        .unwrap();
    let mut with_image = section(course_id, "Pizza slices", alice.id);
    with_image.image_url = ImageRef::parse("https://cdn.example.org/pizza.png");
    repo.insert_section(with_image).await.unwrap();

    let loaded = repo.get_course(course_id).await.unwrap().expect("course");
    assert_eq!(loaded.course.title, "Fractions");
    assert!(loaded.course.validated);
    assert!(loaded.course.last_editor.is_none());
    assert_eq!(loaded.course.created_at, fixed_now());

    let positions: Vec<u32> = loaded.sections.iter().map(|s| s.position).collect();
    assert_eq!(positions, [0, 1]);
    let names: Vec<_> = loaded
        .sections
        .iter()
        .map(|s| s.edited_by.as_ref().and_then(|e| e.username()))
        .collect();
    assert_eq!(names, [Some("bob"), Some("alice")]);
    assert_eq!(
        loaded.sections[1].image_url.as_ref().map(ImageRef::as_str),
        Some("https://cdn.example.org/pizza.png")
    );
}

#[tokio::test]
async fn sqlite_updates_keep_position_and_stamp_editor() {
    let repo = connect("memdb_section_update").await;
    let author = Profile::new(UserId::random(), "author");
    let colleague = Profile::new(UserId::random(), "colleague");
    repo.upsert_profile(&author).await.unwrap();
    repo.upsert_profile(&colleague).await.unwrap();

    let course_id = repo
        .insert_course(course("Draft", 1, false, Some(author.id)))
        .await
        .unwrap();
    let first = repo
        .insert_section(section(course_id, "One", author.id))
        .await
        .unwrap();
    repo.insert_section(section(course_id, "Two", author.id))
        .await
        .unwrap();

    repo.update_section(
        first,
        &SectionUpdate {
            title: "One (revised)".into(),
            content: "new body".into(),
            image_url: None,
            edited_by: colleague.id,
        },
    )
    .await
    .unwrap();
    repo.update_course(
        course_id,
        &CourseUpdate {
            title: "Published".into(),
            class_id: ClassId::new(2),
            subject_id: SubjectId::new(1),
            last_editor: colleague.id,
            validated: true,
        },
    )
    .await
    .unwrap();

    let loaded = repo.get_course(course_id).await.unwrap().unwrap();
    assert_eq!(loaded.course.title, "Published");
    assert_eq!(loaded.course.class_id, ClassId::new(2));
    assert!(loaded.course.validated);
    assert_eq!(
        loaded.course.last_editor.as_ref().and_then(|e| e.username()),
        Some("colleague")
    );
    assert_eq!(loaded.sections[0].title, "One (revised)");
    assert_eq!(loaded.sections[0].position, 0);
    assert_eq!(
        loaded.sections[1].edited_by.as_ref().and_then(|e| e.username()),
        Some("author")
    );
}

#[tokio::test]
async fn sqlite_missing_rows_report_not_found() {
    let repo = connect("memdb_not_found").await;
    assert!(repo.get_course(CourseId::new(404)).await.unwrap().is_none());

    let err = repo
        .update_section(
            course_core::model::SectionId::new(404),
            &SectionUpdate {
                title: "x".into(),
                content: "y".into(),
                image_url: None,
                edited_by: UserId::random(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let err = repo
        .insert_section(section(CourseId::new(404), "orphan", UserId::random()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn sqlite_delete_cascades_sections() {
    let repo = connect("memdb_cascade").await;
    let course_id = repo
        .insert_course(course("Temp", 1, true, None))
        .await
        .unwrap();
    repo.insert_section(section(course_id, "Only", UserId::random()))
        .await
        .unwrap();

    repo.delete_course(course_id).await.unwrap();
    assert!(repo.list_sections(course_id).await.unwrap().is_empty());
    assert!(matches!(
        repo.delete_course(course_id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_lists_with_filters_newest_first() {
    let repo = connect("memdb_listing").await;
    let older = repo
        .insert_course(course("Geometry basics", 1, true, None))
        .await
        .unwrap();
    let hidden = repo
        .insert_course(course("Geometry draft", 1, false, None))
        .await
        .unwrap();
    let newer = repo
        .insert_course(course("Advanced geometry", 2, true, None))
        .await
        .unwrap();

    let published = repo.list_courses(&CourseQuery::published()).await.unwrap();
    let ids: Vec<CourseId> = published.iter().map(|c| c.course.id).collect();
    assert_eq!(ids, [newer, older]);

    let all_geometry = repo
        .list_courses(&CourseQuery {
            search: Some("GEOMETRY".into()),
            ..CourseQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(all_geometry.len(), 3);
    assert!(all_geometry.iter().any(|c| c.course.id == hidden));

    let class_two = repo
        .list_courses(&CourseQuery {
            class_id: Some(ClassId::new(2)),
            limit: Some(5),
            ..CourseQuery::published()
        })
        .await
        .unwrap();
    assert_eq!(class_two.len(), 1);
    assert_eq!(class_two[0].course.id, newer);
}

#[tokio::test]
async fn sqlite_search_folds_unicode_and_matches_literally() {
    let repo = connect("memdb_search").await;
    let accented = repo
        .insert_course(course("Électricité statique", 1, true, None))
        .await
        .unwrap();
    let percent = repo
        .insert_course(course("Taux à 50%", 1, true, None))
        .await
        .unwrap();
    repo.insert_course(course("50 exercices", 1, true, None))
        .await
        .unwrap();
    repo.insert_course(course("Magnétisme", 1, true, None))
        .await
        .unwrap();

    let search = |term: &str, limit: Option<u32>| CourseQuery {
        search: Some(term.into()),
        limit,
        ..CourseQuery::default()
    };

    let found = repo.list_courses(&search("électricité", None)).await.unwrap();
    let ids: Vec<CourseId> = found.iter().map(|c| c.course.id).collect();
    assert_eq!(ids, [accented]);

    let found = repo.list_courses(&search("50%", None)).await.unwrap();
    let ids: Vec<CourseId> = found.iter().map(|c| c.course.id).collect();
    assert_eq!(ids, [percent]);

    assert!(repo.list_courses(&search("_", None)).await.unwrap().is_empty());

    // the limit applies after the title filter
    let found = repo.list_courses(&search("É", Some(1))).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].course.title, "Magnétisme");
}

#[tokio::test]
async fn sqlite_key_values_persist_and_notify() {
    let repo = connect("memdb_key_values").await;
    let mut changes = repo.subscribe();

    assert!(repo.get("learning_progress").await.unwrap().is_none());
    repo.set("learning_progress", r#"{"courses":{}}"#).await.unwrap();
    repo.set("learning_progress", r#"{"courses":{"1":{"percent":5,"completed":false}}}"#)
        .await
        .unwrap();

    let stored = repo.get("learning_progress").await.unwrap().unwrap();
    assert!(stored.contains(r#""percent":5"#));
    assert_eq!(changes.recv().await.unwrap().key, "learning_progress");
}
