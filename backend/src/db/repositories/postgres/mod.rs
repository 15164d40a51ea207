//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//! - Year-partitioned subject tables created on first insert
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::db::repository::{
    ErrorContext, ExemptedRepository, PrivilegeRepository, RepositoryError, RepositoryResult,
    StudentRepository, SubjectRepository,
};
use crate::models::{Exempted, Student, Subject, SubjectTable, ALL_STAGES};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

const SUBJECT_COLUMNS: &str = "subject_id, subject_name, subject_name_english, stage, semester, \
     department, max_theory_mark, max_lab_mark, max_semester_mark, max_final_exam, credits, \
     active, ministerial";

const EXEMPTED_SELECT: &str = "SELECT e.exempted_id, e.student_id, e.subject_id, \
     st.student_name, su.subject_name \
     FROM exempteds e \
     LEFT JOIN students st ON st.student_id = e.student_id \
     LEFT JOIN subjects su ON su.subject_id = e.subject_id";

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables (see module docs).
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;
        let defaults = Self::default();

        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
///
/// Every call checks a connection out of the pool on a blocking thread;
/// connection failures and serialization conflicts are retried with
/// exponential backoff up to `max_retries` times.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        let mut conn = pool.get()?;
        let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        if !applied.is_empty() {
            log::info!("Applied {} pending migration(s)", applied.len());
        }
        drop(conn);

        Ok(Self { pool, config })
    }

    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                let result = pool
                    .get()
                    .map_err(RepositoryError::from)
                    .and_then(|mut conn| f.clone()(&mut conn));

                match result {
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        attempt += 1;
                        log::warn!(
                            "Retrying database operation ({}/{}) in {:?}: {}",
                            attempt,
                            max_retries,
                            delay,
                            e
                        );
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                    other => return other,
                }
            }
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

fn map_diesel_error(operation: &str, err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err).with_operation(operation)
}

fn subject_not_found(operation: &str, table: &str, id: i64) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Subject {} not found in {}", id, table),
        ErrorContext::new(operation)
            .with_entity("subject")
            .with_entity_id(id),
    )
}

/// `table` always comes from [`SubjectTable::table_name`], whose year part is
/// restricted to digits and underscores.
fn quoted(table: &str) -> String {
    format!("\"{}\"", table)
}

fn table_exists(conn: &mut PgConnection, table: &str) -> RepositoryResult<bool> {
    sql_query("SELECT to_regclass($1) IS NOT NULL AS present")
        .bind::<Text, _>(table)
        .get_result::<TableExistsRow>(conn)
        .map(|row| row.present)
        .map_err(|e| map_diesel_error("table_exists", e))
}

fn ensure_table(conn: &mut PgConnection, table: &str) -> RepositoryResult<()> {
    if table == SubjectTable::Current.table_name() {
        return Ok(());
    }
    sql_query(format!(
        "CREATE TABLE IF NOT EXISTS {} (LIKE subjects INCLUDING ALL)",
        quoted(table)
    ))
    .execute(conn)
    .map(|_| ())
    .map_err(|e| map_diesel_error("ensure_table", e))
}

/// Binds the twelve non-key subject columns, in `SUBJECT_COLUMNS` order.
macro_rules! bind_subject_fields {
    ($query:expr, $subject:expr) => {
        $query
            .bind::<Text, _>($subject.subject_name.clone())
            .bind::<Text, _>($subject.subject_name_english.clone())
            .bind::<Text, _>($subject.stage.clone())
            .bind::<Text, _>($subject.semester.clone())
            .bind::<Text, _>($subject.department.clone())
            .bind::<Integer, _>($subject.max_theory_mark)
            .bind::<Integer, _>($subject.max_lab_mark)
            .bind::<Integer, _>($subject.max_semester_mark)
            .bind::<Integer, _>($subject.max_final_exam)
            .bind::<Integer, _>($subject.credits)
            .bind::<Text, _>($subject.active.clone())
            .bind::<Text, _>($subject.ministerial.clone())
    };
}

#[async_trait]
impl SubjectRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(|e| map_diesel_error("health_check", e))
        })
        .await
    }

    async fn get_subject(&self, table: &SubjectTable, id: i64) -> RepositoryResult<Subject> {
        let table = table.table_name();
        self.with_conn(move |conn| {
            if !table_exists(conn, &table)? {
                return Err(subject_not_found("get_subject", &table, id));
            }
            sql_query(format!(
                "SELECT {} FROM {} WHERE subject_id = $1",
                SUBJECT_COLUMNS,
                quoted(&table)
            ))
            .bind::<BigInt, _>(id)
            .get_result::<SubjectRow>(conn)
            .optional()
            .map_err(|e| map_diesel_error("get_subject", e))?
            .map(Subject::from)
            .ok_or_else(|| subject_not_found("get_subject", &table, id))
        })
        .await
    }

    async fn list_subjects(
        &self,
        table: &SubjectTable,
        stage: Option<&str>,
    ) -> RepositoryResult<Vec<Subject>> {
        let table = table.table_name();
        let stage = stage.map(str::to_string);
        self.with_conn(move |conn| {
            if !table_exists(conn, &table)? {
                return Ok(Vec::new());
            }
            let rows = match stage {
                Some(stage) => sql_query(format!(
                    "SELECT {} FROM {} WHERE stage = $1 ORDER BY subject_id",
                    SUBJECT_COLUMNS,
                    quoted(&table)
                ))
                .bind::<Text, _>(stage)
                .load::<SubjectRow>(conn),
                None => sql_query(format!(
                    "SELECT {} FROM {} ORDER BY subject_id",
                    SUBJECT_COLUMNS,
                    quoted(&table)
                ))
                .load::<SubjectRow>(conn),
            }
            .map_err(|e| map_diesel_error("list_subjects", e))?;

            Ok(rows.into_iter().map(Subject::from).collect())
        })
        .await
    }

    async fn insert_subject(
        &self,
        table: &SubjectTable,
        subject: &mut Subject,
    ) -> RepositoryResult<()> {
        let table = table.table_name();
        let candidate = subject.clone();
        let assigned_id = self
            .with_conn(move |conn| {
                ensure_table(conn, &table)?;
                let row = if candidate.id == 0 {
                    let query = sql_query(format!(
                        "INSERT INTO {} (subject_name, subject_name_english, stage, semester, \
                         department, max_theory_mark, max_lab_mark, max_semester_mark, \
                         max_final_exam, credits, active, ministerial) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                         RETURNING subject_id",
                        quoted(&table)
                    ));
                    bind_subject_fields!(query, candidate).get_result::<InsertedIdRow>(conn)
                } else {
                    let query = sql_query(format!(
                        "INSERT INTO {} ({}) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                         RETURNING subject_id",
                        quoted(&table),
                        SUBJECT_COLUMNS
                    ))
                    .bind::<BigInt, _>(candidate.id);
                    bind_subject_fields!(query, candidate).get_result::<InsertedIdRow>(conn)
                };
                row.map(|r| r.subject_id)
                    .map_err(|e| map_diesel_error("insert_subject", e))
            })
            .await?;

        subject.id = assigned_id;
        Ok(())
    }

    async fn update_subject(
        &self,
        table: &SubjectTable,
        id: i64,
        subject: &Subject,
    ) -> RepositoryResult<()> {
        let table = table.table_name();
        let subject = subject.clone();
        self.with_conn(move |conn| {
            if !table_exists(conn, &table)? {
                return Err(subject_not_found("update_subject", &table, id));
            }
            let query = sql_query(format!(
                "UPDATE {} SET subject_name = $1, subject_name_english = $2, stage = $3, \
                 semester = $4, department = $5, max_theory_mark = $6, max_lab_mark = $7, \
                 max_semester_mark = $8, max_final_exam = $9, credits = $10, active = $11, \
                 ministerial = $12, subject_id = $13 WHERE subject_id = $14",
                quoted(&table)
            ));
            let updated = bind_subject_fields!(query, subject)
                .bind::<BigInt, _>(subject.id)
                .bind::<BigInt, _>(id)
                .execute(conn)
                .map_err(|e| map_diesel_error("update_subject", e))?;
            if updated == 0 {
                return Err(subject_not_found("update_subject", &table, id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_subject(&self, table: &SubjectTable, id: i64) -> RepositoryResult<()> {
        let table = table.table_name();
        self.with_conn(move |conn| {
            if !table_exists(conn, &table)? {
                return Err(subject_not_found("delete_subject", &table, id));
            }
            let deleted = sql_query(format!(
                "DELETE FROM {} WHERE subject_id = $1",
                quoted(&table)
            ))
            .bind::<BigInt, _>(id)
            .execute(conn)
            .map_err(|e| map_diesel_error("delete_subject", e))?;
            if deleted == 0 {
                return Err(subject_not_found("delete_subject", &table, id));
            }
            Ok(())
        })
        .await
    }
}

fn exempted_not_found(operation: &str, id: impl ToString) -> RepositoryError {
    RepositoryError::not_found_with_context(
        "Exempted not found",
        ErrorContext::new(operation)
            .with_entity("exempted")
            .with_entity_id(id),
    )
}

#[async_trait]
impl ExemptedRepository for PostgresRepository {
    async fn get_exempted(&self, id: i64) -> RepositoryResult<Exempted> {
        self.with_conn(move |conn| {
            sql_query(format!("{} WHERE e.exempted_id = $1", EXEMPTED_SELECT))
                .bind::<BigInt, _>(id)
                .get_result::<ExemptedRow>(conn)
                .optional()
                .map_err(|e| map_diesel_error("get_exempted", e))?
                .map(Exempted::from)
                .ok_or_else(|| exempted_not_found("get_exempted", id))
        })
        .await
    }

    async fn list_exempteds(&self) -> RepositoryResult<Vec<Exempted>> {
        self.with_conn(|conn| {
            sql_query(format!("{} ORDER BY e.exempted_id", EXEMPTED_SELECT))
                .load::<ExemptedRow>(conn)
                .map(|rows| rows.into_iter().map(Exempted::from).collect())
                .map_err(|e| map_diesel_error("list_exempteds", e))
        })
        .await
    }

    async fn find_exempted(
        &self,
        student_id: i64,
        subject_id: i64,
    ) -> RepositoryResult<Exempted> {
        self.with_conn(move |conn| {
            sql_query(format!(
                "{} WHERE e.student_id = $1 AND e.subject_id = $2",
                EXEMPTED_SELECT
            ))
            .bind::<BigInt, _>(student_id)
            .bind::<BigInt, _>(subject_id)
            .get_result::<ExemptedRow>(conn)
            .optional()
            .map_err(|e| map_diesel_error("find_exempted", e))?
            .map(Exempted::from)
            .ok_or_else(|| {
                exempted_not_found("find_exempted", format!("{}/{}", student_id, subject_id))
            })
        })
        .await
    }

    async fn list_exempteds_for_student(
        &self,
        student_id: i64,
    ) -> RepositoryResult<Vec<Exempted>> {
        self.with_conn(move |conn| {
            sql_query(format!(
                "{} WHERE e.student_id = $1 ORDER BY e.exempted_id",
                EXEMPTED_SELECT
            ))
            .bind::<BigInt, _>(student_id)
            .load::<ExemptedRow>(conn)
            .map(|rows| rows.into_iter().map(Exempted::from).collect())
            .map_err(|e| map_diesel_error("list_exempteds_for_student", e))
        })
        .await
    }

    async fn list_exempteds_for_subject(
        &self,
        subject_id: i64,
    ) -> RepositoryResult<Vec<Exempted>> {
        self.with_conn(move |conn| {
            sql_query(format!(
                "{} WHERE e.subject_id = $1 ORDER BY e.exempted_id",
                EXEMPTED_SELECT
            ))
            .bind::<BigInt, _>(subject_id)
            .load::<ExemptedRow>(conn)
            .map(|rows| rows.into_iter().map(Exempted::from).collect())
            .map_err(|e| map_diesel_error("list_exempteds_for_subject", e))
        })
        .await
    }

    async fn insert_exempted(&self, exempted: &mut Exempted) -> RepositoryResult<()> {
        let row = NewExemptedRow {
            student_id: exempted.student_id,
            subject_id: exempted.subject_id,
        };
        let id = self
            .with_conn(move |conn| {
                diesel::insert_into(exempteds::table)
                    .values(&row)
                    .returning(exempteds::exempted_id)
                    .get_result::<i64>(conn)
                    .map_err(|e| map_diesel_error("insert_exempted", e))
            })
            .await?;
        exempted.id = id;
        Ok(())
    }

    async fn delete_exempted(&self, id: i64) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(exempteds::table.find(id))
                .execute(conn)
                .map_err(|e| map_diesel_error("delete_exempted", e))?;
            if deleted == 0 {
                return Err(exempted_not_found("delete_exempted", id));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl StudentRepository for PostgresRepository {
    async fn get_student(&self, id: i64) -> RepositoryResult<Student> {
        self.with_conn(move |conn| {
            students::table
                .find(id)
                .select(StudentRow::as_select())
                .first(conn)
                .map(Student::from)
                .map_err(|e| map_diesel_error("get_student", e))
        })
        .await
    }
}

#[async_trait]
impl PrivilegeRepository for PostgresRepository {
    async fn check_write_access(
        &self,
        user_id: i64,
        resource: &str,
        stage: &str,
    ) -> RepositoryResult<bool> {
        let resource = resource.to_string();
        let stage = stage.to_string();
        self.with_conn(move |conn| {
            let grants: i64 = privileges::table
                .filter(privileges::user_id.eq(user_id))
                .filter(privileges::resource.eq(resource.as_str()))
                .filter(privileges::can_write.eq(true))
                .filter(
                    privileges::stage
                        .eq(stage.as_str())
                        .or(privileges::stage.eq(ALL_STAGES)),
                )
                .count()
                .get_result(conn)
                .map_err(|e| map_diesel_error("check_write_access", e))?;
            Ok(grants > 0)
        })
        .await
    }
}
