use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use course_core::model::{
    ClassId, CourseDraft, CourseId, Profile, ScrollMetrics, SectionDraft, SubjectId, UserId,
};
use serde::Serialize;
use services::{
    AppServices, Clock, CourseView, DeleteOutcome, EditorSession, LATEST_COURSES_LIMIT,
    PageState, ProgressView, Session, require_session,
};
use storage::repository::{CourseQuery, ReferenceDataRepository, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courses")]
#[command(about = "Course authoring and reading progress")]
struct Cli {
    /// `SQLite` database URL or file path
    #[arg(long, env = "COURSES_DB_URL", default_value = "sqlite://dev.sqlite3")]
    db: String,

    /// Log filter, e.g. `info` or `services=debug`
    #[arg(long, env = "COURSES_LOG", default_value = "warn")]
    log: String,

    #[command(flatten)]
    user: UserArgs,

    #[command(subcommand)]
    command: Command,
}

/// Identity the command acts as. Authentication happens elsewhere.
#[derive(Args)]
struct UserArgs {
    #[arg(long = "user-id", env = "COURSES_USER_ID")]
    id: Option<UserId>,

    #[arg(long = "username", env = "COURSES_USERNAME", default_value = "cli")]
    name: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the schema
    Migrate,
    /// Insert reference data and one sample course
    Seed,
    /// Open a published course as a reader
    Read { course_id: CourseId },
    /// List courses, newest first
    ///
    /// With `--published` and neither `--search` nor `--limit`, shows the
    /// student home page: the latest 6 published courses.
    List {
        /// Case-insensitive title filter
        #[arg(long)]
        search: Option<String>,
        /// Only validated courses, with reading progress
        #[arg(long)]
        published: bool,
        /// Maximum number of rows (no cap unless this is the home page listing)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Record one scroll measurement for a course
    Scroll {
        course_id: CourseId,
        #[arg(long)]
        top: f64,
        #[arg(long)]
        viewport: f64,
        #[arg(long)]
        document: f64,
    },
    /// Number of courses read to 100%
    Finished,
    /// Delete a course and its sections
    Delete {
        course_id: CourseId,
        /// Confirm without prompting
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct ReadOutput<'a> {
    course: &'a CourseView,
    progress: &'a ProgressView,
    elapsed: String,
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// sqlx does not create missing database files.
fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .with_context(|| format!("invalid database url: {db_url}"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}

fn is_home_listing(published: bool, search: Option<&str>, limit: Option<u32>) -> bool {
    published && search.is_none() && limit.is_none()
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_session(app: &AppServices, user: UserArgs) -> anyhow::Result<Session> {
    let id = user.id.unwrap_or_else(UserId::random);
    let session = match app.resolve_session(Some(id)).await? {
        Some(session) => session,
        None => app.register_session(Profile::new(id, user.name)).await?,
    };
    Ok(require_session(Some(session))?)
}

async fn seed(
    storage: &Storage,
    app: &AppServices,
    author: &Session,
) -> anyhow::Result<CourseId> {
    storage.reference.upsert_class(ClassId::new(1), "Grade 6").await?;
    storage.reference.upsert_subject(SubjectId::new(1), "Mathematics").await?;

    let mut form = EditorSession::new();
    form.course = CourseDraft {
        title: "Fractions".into(),
        class_id: Some(ClassId::new(1)),
        subject_id: Some(SubjectId::new(1)),
    };
    form.push_section(SectionDraft::new(
        "What is a fraction?",
        "A fraction names a part of a whole.",
        "",
    ));
    form.push_section(SectionDraft::new(
        "Equivalent fractions",
        "1/2 and 2/4 name the same amount.",
        "",
    ));
    let report = app.editor().save(author, &mut form).await?;
    Ok(report.course_id)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_url = normalize_sqlite_url(&cli.db);
    prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    let app = AppServices::new(&storage, Clock::system());

    match cli.command {
        Command::Migrate => {
            tracing::info!(db_url, "schema up to date");
        }
        Command::Seed => {
            let author = open_session(&app, cli.user).await?;
            let course_id = seed(&storage, &app, &author).await?;
            println!("seeded course {course_id}");
        }
        Command::Read { course_id } => {
            let session = open_session(&app, cli.user).await?;
            let mut page = app.reading_page(course_id);
            match page.open(Some(&session)).await? {
                PageState::Ready { view, progress } => print_json(&ReadOutput {
                    course: &view,
                    progress: &progress,
                    elapsed: page.chronometer().display(),
                })?,
                PageState::Unavailable(reason) => {
                    bail!("course {course_id} is unavailable ({reason:?})");
                }
            }
        }
        Command::List {
            search,
            published,
            limit,
        } => {
            let query = CourseQuery {
                search,
                limit,
                ..CourseQuery::default()
            };
            let catalog = app.catalog();
            let rows = if is_home_listing(published, query.search.as_deref(), query.limit) {
                catalog.latest_published(LATEST_COURSES_LIMIT).await?
            } else if published {
                catalog.list_published(&query).await?
            } else {
                catalog.list_for_editor(&query).await?
            };
            print_json(&rows)?;
        }
        Command::Scroll {
            course_id,
            top,
            viewport,
            document,
        } => {
            let mut tracker = app.tracker();
            let metrics = ScrollMetrics::new(top, viewport, document);
            match tracker.record_scroll(course_id, metrics).await? {
                Some(record) => print_json(&ProgressView::from_record(Some(record)))?,
                None => println!("document does not scroll; progress unchanged"),
            }
        }
        Command::Finished => {
            println!("{}", app.catalog().finished_count().await?);
        }
        Command::Delete { course_id, yes } => {
            let session = open_session(&app, cli.user).await?;
            let outcome = app
                .editor()
                .delete(&session, course_id, |prompt| {
                    if !yes {
                        eprintln!("{prompt} Re-run with --yes to confirm.");
                    }
                    yes
                })
                .await?;
            if outcome == DeleteOutcome::Deleted {
                println!("deleted course {course_id}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/courses.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/courses.sqlite3"));
    }

    #[test]
    fn memory_and_full_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url(" sqlite:///tmp/c.db "),
            "sqlite:///tmp/c.db"
        );
    }

    #[test]
    fn only_bare_published_listing_is_capped() {
        assert!(is_home_listing(true, None, None));
        assert!(!is_home_listing(true, Some("algebra"), None));
        assert!(!is_home_listing(true, None, Some(50)));
        assert!(!is_home_listing(false, None, None));

        let mut cmd = Cli::command();
        let list = cmd.find_subcommand_mut("list").unwrap();
        let help = list.render_long_help().to_string();
        assert!(help.contains(&format!("latest {LATEST_COURSES_LIMIT}")));
    }

    #[test]
    fn url_without_path_is_rejected() {
        assert!(prepare_sqlite_file("sqlite://").is_err());
        assert!(prepare_sqlite_file("postgres://x").is_err());
    }
}
