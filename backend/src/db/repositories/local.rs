//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. All data is stored in
//! memory behind a single `RwLock`, providing fast, deterministic, and
//! isolated execution.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::repository::*;
use crate::models::{Exempted, Privilege, Student, Subject, SubjectTable};

/// In-memory local repository.
///
/// Subject tables are created lazily on first insert. Students and
/// privileges are owned by other systems in production, so they are seeded
/// through [`LocalRepository::insert_student`] and
/// [`LocalRepository::grant_write_access`].
///
/// # Example
/// ```
/// use collegecm::db::repositories::LocalRepository;
/// use collegecm::db::repository::SubjectRepository;
/// use collegecm::models::SubjectTable;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let subjects = rt.block_on(async {
///     let repo = LocalRepository::new();
///     repo.list_subjects(&SubjectTable::Current, None).await.unwrap()
/// });
/// assert!(subjects.is_empty());
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    subjects: HashMap<SubjectTable, BTreeMap<i64, Subject>>,
    exempteds: BTreeMap<i64, Exempted>,
    students: HashMap<i64, Student>,
    privileges: Vec<Privilege>,

    // ID counters
    next_subject_ids: HashMap<SubjectTable, i64>,
    next_exempted_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            subjects: HashMap::new(),
            exempteds: BTreeMap::new(),
            students: HashMap::new(),
            privileges: Vec::new(),
            next_subject_ids: HashMap::new(),
            next_exempted_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn decorate(&self, mut exempted: Exempted) -> Exempted {
        if let Some(student) = self.students.get(&exempted.student_id) {
            exempted.student_name = student.student_name.clone();
        }
        if let Some(subject) = self
            .subjects
            .get(&SubjectTable::Current)
            .and_then(|rows| rows.get(&exempted.subject_id))
        {
            exempted.subject_name = subject.subject_name.clone();
        }
        exempted
    }

    fn collect_exempteds(&self, keep: impl Fn(&Exempted) -> bool) -> Vec<Exempted> {
        self.exempteds
            .values()
            .filter(|e| keep(e))
            .cloned()
            .map(|e| self.decorate(e))
            .collect()
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Add a student, replacing any existing student with the same ID.
    pub fn insert_student(&self, student: Student) {
        if let Ok(mut data) = self.data.write() {
            data.students.insert(student.id, student);
        }
    }

    /// Grant `user_id` write access to `resource` for `stage`
    /// (use [`crate::models::ALL_STAGES`] for every stage).
    pub fn grant_write_access(&self, user_id: i64, resource: &str, stage: &str) {
        self.add_privilege(Privilege {
            user_id,
            resource: resource.to_string(),
            stage: stage.to_string(),
            can_write: true,
        });
    }

    /// Store a privilege row as-is.
    pub fn add_privilege(&self, privilege: Privilege) {
        if let Ok(mut data) = self.data.write() {
            data.privileges.push(privilege);
        }
    }

    /// Set the health status for testing connection failures.
    ///
    /// While unhealthy, every repository operation fails with a connection error.
    pub fn set_healthy(&self, healthy: bool) {
        if let Ok(mut data) = self.data.write() {
            data.is_healthy = healthy;
        }
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            *data = LocalData {
                is_healthy: data.is_healthy,
                ..Default::default()
            };
        }
    }

    /// Number of subjects stored in `table`.
    pub fn subject_count(&self, table: &SubjectTable) -> usize {
        self.data
            .read()
            .map(|data| data.subjects.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Number of exemptions stored.
    pub fn exempted_count(&self) -> usize {
        self.data.read().map(|data| data.exempteds.len()).unwrap_or(0)
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        let data = self
            .data
            .read()
            .map_err(|_| RepositoryError::internal("Local repository lock poisoned"))?;
        if !data.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(data)
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        let data = self
            .data
            .write()
            .map_err(|_| RepositoryError::internal("Local repository lock poisoned"))?;
        if !data.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(data)
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn subject_not_found(operation: &str, table: &SubjectTable, id: i64) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Subject {} not found in {}", id, table),
        ErrorContext::new(operation)
            .with_entity("subject")
            .with_entity_id(id),
    )
}

fn exempted_not_found(operation: &str, id: impl ToString) -> RepositoryError {
    let id = id.to_string();
    RepositoryError::not_found_with_context(
        format!("Exempted {} not found", id),
        ErrorContext::new(operation)
            .with_entity("exempted")
            .with_entity_id(id),
    )
}

fn duplicate_subject(operation: &str, table: &SubjectTable, id: i64) -> RepositoryError {
    RepositoryError::conflict_with_context(
        format!("Subject {} already exists in {}", id, table),
        ErrorContext::new(operation)
            .with_entity("subject")
            .with_entity_id(id)
            .with_details("unique_violation"),
    )
}

fn ids_exhausted(operation: &str, table: &SubjectTable) -> RepositoryError {
    RepositoryError::conflict_with_context(
        format!("No subject id left to assign in {}", table),
        ErrorContext::new(operation)
            .with_entity("subject")
            .with_details("id_exhausted"),
    )
}

#[async_trait]
impl SubjectRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let data = self
            .data
            .read()
            .map_err(|_| RepositoryError::internal("Local repository lock poisoned"))?;
        Ok(data.is_healthy)
    }

    async fn get_subject(&self, table: &SubjectTable, id: i64) -> RepositoryResult<Subject> {
        let data = self.read()?;
        data.subjects
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned()
            .ok_or_else(|| subject_not_found("get_subject", table, id))
    }

    async fn list_subjects(
        &self,
        table: &SubjectTable,
        stage: Option<&str>,
    ) -> RepositoryResult<Vec<Subject>> {
        let data = self.read()?;
        let Some(rows) = data.subjects.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .values()
            .filter(|s| stage.map_or(true, |stage| s.stage == stage))
            .cloned()
            .collect())
    }

    async fn insert_subject(
        &self,
        table: &SubjectTable,
        subject: &mut Subject,
    ) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let data = &mut *data;
        let rows = data.subjects.entry(table.clone()).or_default();
        let next_id = data.next_subject_ids.entry(table.clone()).or_insert(1);

        if subject.id == 0 {
            while rows.contains_key(&*next_id) {
                *next_id = next_id
                    .checked_add(1)
                    .ok_or_else(|| ids_exhausted("insert_subject", table))?;
            }
            subject.id = *next_id;
        } else if rows.contains_key(&subject.id) {
            return Err(duplicate_subject("insert_subject", table, subject.id));
        }

        // i64::MAX stays the counter; the next assignment then finds it taken.
        *next_id = (*next_id).max(subject.id.saturating_add(1));
        rows.insert(subject.id, subject.clone());
        Ok(())
    }

    async fn update_subject(
        &self,
        table: &SubjectTable,
        id: i64,
        subject: &Subject,
    ) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let rows = data
            .subjects
            .get_mut(table)
            .filter(|rows| rows.contains_key(&id))
            .ok_or_else(|| subject_not_found("update_subject", table, id))?;

        if subject.id != id && rows.contains_key(&subject.id) {
            return Err(duplicate_subject("update_subject", table, subject.id));
        }

        rows.remove(&id);
        rows.insert(subject.id, subject.clone());
        Ok(())
    }

    async fn delete_subject(&self, table: &SubjectTable, id: i64) -> RepositoryResult<()> {
        let mut data = self.write()?;
        data.subjects
            .get_mut(table)
            .and_then(|rows| rows.remove(&id))
            .map(|_| ())
            .ok_or_else(|| subject_not_found("delete_subject", table, id))
    }
}

#[async_trait]
impl ExemptedRepository for LocalRepository {
    async fn get_exempted(&self, id: i64) -> RepositoryResult<Exempted> {
        let data = self.read()?;
        let exempted = data
            .exempteds
            .get(&id)
            .cloned()
            .ok_or_else(|| exempted_not_found("get_exempted", id))?;
        Ok(data.decorate(exempted))
    }

    async fn list_exempteds(&self) -> RepositoryResult<Vec<Exempted>> {
        let data = self.read()?;
        Ok(data.collect_exempteds(|_| true))
    }

    async fn find_exempted(
        &self,
        student_id: i64,
        subject_id: i64,
    ) -> RepositoryResult<Exempted> {
        let data = self.read()?;
        data.collect_exempteds(|e| e.student_id == student_id && e.subject_id == subject_id)
            .into_iter()
            .next()
            .ok_or_else(|| {
                exempted_not_found("find_exempted", format!("{}/{}", student_id, subject_id))
            })
    }

    async fn list_exempteds_for_student(
        &self,
        student_id: i64,
    ) -> RepositoryResult<Vec<Exempted>> {
        let data = self.read()?;
        Ok(data.collect_exempteds(|e| e.student_id == student_id))
    }

    async fn list_exempteds_for_subject(
        &self,
        subject_id: i64,
    ) -> RepositoryResult<Vec<Exempted>> {
        let data = self.read()?;
        Ok(data.collect_exempteds(|e| e.subject_id == subject_id))
    }

    async fn insert_exempted(&self, exempted: &mut Exempted) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let duplicate = data
            .exempteds
            .values()
            .any(|e| e.student_id == exempted.student_id && e.subject_id == exempted.subject_id);
        if duplicate {
            return Err(RepositoryError::conflict_with_context(
                format!(
                    "Student {} is already exempted from subject {}",
                    exempted.student_id, exempted.subject_id
                ),
                ErrorContext::new("insert_exempted")
                    .with_entity("exempted")
                    .with_details("unique_violation"),
            ));
        }

        exempted.id = data.next_exempted_id;
        data.next_exempted_id += 1;
        data.exempteds.insert(exempted.id, exempted.clone());
        Ok(())
    }

    async fn delete_exempted(&self, id: i64) -> RepositoryResult<()> {
        let mut data = self.write()?;
        data.exempteds
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| exempted_not_found("delete_exempted", id))
    }
}

#[async_trait]
impl StudentRepository for LocalRepository {
    async fn get_student(&self, id: i64) -> RepositoryResult<Student> {
        let data = self.read()?;
        data.students.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Student {} not found", id),
                ErrorContext::new("get_student")
                    .with_entity("student")
                    .with_entity_id(id),
            )
        })
    }
}

#[async_trait]
impl PrivilegeRepository for LocalRepository {
    async fn check_write_access(
        &self,
        user_id: i64,
        resource: &str,
        stage: &str,
    ) -> RepositoryResult<bool> {
        let data = self.read()?;
        Ok(data
            .privileges
            .iter()
            .any(|p| p.allows_write(user_id, resource, stage)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AcademicYear;

    fn year(raw: &str) -> SubjectTable {
        SubjectTable::Year(AcademicYear::parse(raw).unwrap())
    }

    fn subject(name: &str, stage: &str) -> Subject {
        Subject {
            subject_name: name.to_string(),
            stage: stage.to_string(),
            semester: "1".to_string(),
            active: "true".to_string(),
            ministerial: "false".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let repo = LocalRepository::new();
        let table = year("2024");

        let mut a = subject("Math", "first");
        let mut b = subject("Physics", "first");
        repo.insert_subject(&table, &mut a).await.unwrap();
        repo.insert_subject(&table, &mut b).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(repo.subject_count(&table), 2);
    }

    #[tokio::test]
    async fn test_explicit_id_is_kept_and_counter_skips_past_it() {
        let repo = LocalRepository::new();
        let table = SubjectTable::Current;

        let mut explicit = Subject {
            id: 10,
            ..subject("Math", "first")
        };
        repo.insert_subject(&table, &mut explicit).await.unwrap();
        let mut assigned = subject("Physics", "first");
        repo.insert_subject(&table, &mut assigned).await.unwrap();

        assert_eq!(explicit.id, 10);
        assert_eq!(assigned.id, 11);
    }

    #[tokio::test]
    async fn test_duplicate_explicit_id_is_rejected() {
        let repo = LocalRepository::new();
        let table = SubjectTable::Current;
        let mut first = Subject {
            id: 3,
            ..subject("Math", "first")
        };
        repo.insert_subject(&table, &mut first).await.unwrap();

        let mut second = Subject {
            id: 3,
            ..subject("Physics", "first")
        };
        let err = repo.insert_subject(&table, &mut second).await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, RepositoryError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_largest_id_does_not_break_the_store() {
        let repo = LocalRepository::new();
        let table = SubjectTable::Current;
        let mut last = Subject {
            id: i64::MAX,
            ..subject("Math", "first")
        };
        repo.insert_subject(&table, &mut last).await.unwrap();

        let mut next = subject("Physics", "first");
        let err = repo.insert_subject(&table, &mut next).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));

        // Lock is intact: reads and explicit inserts keep working.
        let mut explicit = Subject {
            id: 4,
            ..subject("Chemistry", "first")
        };
        repo.insert_subject(&table, &mut explicit).await.unwrap();
        assert_eq!(repo.list_subjects(&table, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let repo = LocalRepository::new();
        let mut s = subject("Math", "first");
        repo.insert_subject(&year("2023"), &mut s).await.unwrap();

        assert!(repo
            .list_subjects(&year("2024"), None)
            .await
            .unwrap()
            .is_empty());
        let err = repo.get_subject(&year("2024"), s.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_by_stage() {
        let repo = LocalRepository::new();
        let table = year("2024");
        for (name, stage) in [("Math", "first"), ("Physics", "second"), ("Art", "first")] {
            let mut s = subject(name, stage);
            repo.insert_subject(&table, &mut s).await.unwrap();
        }

        let first = repo.list_subjects(&table, Some("first")).await.unwrap();
        let names: Vec<_> = first.iter().map(|s| s.subject_name.as_str()).collect();
        assert_eq!(names, vec!["Math", "Art"]);
        assert_eq!(repo.list_subjects(&table, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_can_change_id() {
        let repo = LocalRepository::new();
        let table = year("2024");
        let mut s = subject("Math", "first");
        repo.insert_subject(&table, &mut s).await.unwrap();

        let renumbered = Subject { id: 40, ..s.clone() };
        repo.update_subject(&table, s.id, &renumbered).await.unwrap();

        assert!(repo.get_subject(&table, s.id).await.unwrap_err().is_not_found());
        assert_eq!(repo.get_subject(&table, 40).await.unwrap(), renumbered);
    }

    #[tokio::test]
    async fn test_update_missing_subject_is_not_found() {
        let repo = LocalRepository::new();
        let err = repo
            .update_subject(&year("2024"), 5, &subject("Math", "first"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_not_found_on_repeat() {
        let repo = LocalRepository::new();
        let table = year("2024");
        let mut s = subject("Math", "first");
        repo.insert_subject(&table, &mut s).await.unwrap();

        repo.delete_subject(&table, s.id).await.unwrap();
        assert!(repo.delete_subject(&table, s.id).await.unwrap_err().is_not_found());
        assert!(repo.delete_subject(&table, s.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_exempteds_are_decorated_on_read() {
        let repo = LocalRepository::new();
        repo.insert_student(Student {
            id: 1,
            student_name: "Ali".to_string(),
            stage: "first".to_string(),
        });
        let mut s = Subject {
            id: 8,
            ..subject("Math", "first")
        };
        repo.insert_subject(&SubjectTable::Current, &mut s).await.unwrap();

        let mut e = Exempted::new(1, 8);
        repo.insert_exempted(&mut e).await.unwrap();
        assert_eq!(e.id, 1);
        assert!(e.student_name.is_empty());

        let stored = repo.get_exempted(e.id).await.unwrap();
        assert_eq!(stored.student_name, "Ali");
        assert_eq!(stored.subject_name, "Math");
    }

    #[tokio::test]
    async fn test_exempted_pair_is_unique() {
        let repo = LocalRepository::new();
        repo.insert_exempted(&mut Exempted::new(1, 2)).await.unwrap();
        let err = repo
            .insert_exempted(&mut Exempted::new(1, 2))
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(repo.exempted_count(), 1);
    }

    #[tokio::test]
    async fn test_exempted_lookups() {
        let repo = LocalRepository::new();
        for (student, subject) in [(1, 10), (1, 11), (2, 10)] {
            repo.insert_exempted(&mut Exempted::new(student, subject))
                .await
                .unwrap();
        }

        assert_eq!(repo.list_exempteds().await.unwrap().len(), 3);
        assert_eq!(repo.list_exempteds_for_student(1).await.unwrap().len(), 2);
        assert_eq!(repo.list_exempteds_for_subject(10).await.unwrap().len(), 2);
        assert!(repo.list_exempteds_for_student(9).await.unwrap().is_empty());
        assert_eq!(repo.find_exempted(2, 10).await.unwrap().id, 3);
        assert!(repo.find_exempted(2, 11).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_write_access_checks() {
        let repo = LocalRepository::new();
        repo.grant_write_access(5, "subjects_2024", "first");

        assert!(repo.check_write_access(5, "subjects_2024", "first").await.unwrap());
        assert!(!repo.check_write_access(5, "subjects_2024", "second").await.unwrap());
        assert!(!repo.check_write_access(6, "subjects_2024", "first").await.unwrap());
    }

    #[tokio::test]
    async fn test_unhealthy_repository_fails_operations() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);

        assert!(!repo.health_check().await.unwrap());
        let err = repo
            .list_subjects(&SubjectTable::Current, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ConnectionError { .. }));
        assert!(!err.is_not_found());

        repo.set_healthy(true);
        assert!(repo.list_exempteds().await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_keeps_health_flag() {
        let repo = LocalRepository::new();
        let mut s = subject("Math", "first");
        repo.insert_subject(&SubjectTable::Current, &mut s).await.unwrap();
        repo.clear();
        assert_eq!(repo.subject_count(&SubjectTable::Current), 0);
        assert!(repo.health_check().await.unwrap());
    }
}
