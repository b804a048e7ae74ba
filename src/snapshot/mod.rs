use crate::error::{Result, WorkspaceError};
use crate::project::Project;
use serde::{Deserialize, Serialize};

pub mod store;

pub use store::{JsonFilePersistence, PersistenceError};

/// A named, persisted project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    #[serde(flatten)]
    pub project: Project,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, project: Project) -> Self {
        Self {
            name: name.into(),
            project,
        }
    }
}

/// Durable backing for the snapshot collection.
pub trait SnapshotPersistence: Send {
    fn load(&self) -> Result<Vec<Snapshot>, PersistenceError>;
    fn save(&self, snapshots: &[Snapshot]) -> Result<(), PersistenceError>;
}

/// Ordered, name-unique collection of saved states.
///
/// Every mutation is prepared on a candidate copy and only committed once the
/// persistence write succeeded, so a failed write leaves the collection as it
/// was.
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,
    persistence: Box<dyn SnapshotPersistence>,
}

impl SnapshotStore {
    /// Loads the collection, falling back to an empty one when the backing
    /// data is missing or unreadable. The second value carries the load
    /// warning, if any.
    pub fn open(persistence: Box<dyn SnapshotPersistence>) -> (Self, Option<String>) {
        let (snapshots, warning) = match persistence.load() {
            Ok(snapshots) => (dedupe_by_name(snapshots), None),
            Err(err) => {
                tracing::warn!(error = %err, "saved states unavailable, starting empty");
                (Vec::new(), Some(err.to_string()))
            }
        };

        (
            Self {
                snapshots,
                persistence,
            },
            warning,
        )
    }

    pub fn list(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.snapshots
            .iter()
            .position(|snapshot| snapshot.name == name)
    }

    pub fn create(&mut self, name: &str, project: Project) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || self.position(name).is_some() {
            return Err(WorkspaceError::NameConflict(name.to_string()));
        }

        let mut candidate = self.snapshots.clone();
        candidate.push(Snapshot::new(name, project));
        self.commit(candidate)?;
        tracing::info!(name, "saved state created");
        Ok(())
    }

    pub fn update_by_name(&mut self, name: &str, project: Project) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| WorkspaceError::NotFound(name.to_string()))?;
        if self.snapshots[index].project == project {
            return Ok(());
        }

        let mut candidate = self.snapshots.clone();
        candidate[index].project = project;
        self.commit(candidate)?;
        tracing::debug!(name, "saved state updated");
        Ok(())
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let index = self
            .position(old_name)
            .ok_or_else(|| WorkspaceError::NotFound(old_name.to_string()))?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(WorkspaceError::NameConflict(new_name.to_string()));
        }
        if let Some(other) = self.position(new_name) {
            if other != index {
                return Err(WorkspaceError::NameConflict(new_name.to_string()));
            }
            return Ok(());
        }

        let mut candidate = self.snapshots.clone();
        candidate[index].name = new_name.to_string();
        self.commit(candidate)?;
        tracing::info!(from = old_name, to = new_name, "saved state renamed");
        Ok(())
    }

    /// Removes the entry at `index`. Later entries shift down by one; callers
    /// holding indices must adjust them (see `WorkspaceState::on_snapshot_removed`).
    pub fn delete_at(&mut self, index: usize) -> Result<Snapshot> {
        if index >= self.snapshots.len() {
            return Err(WorkspaceError::OutOfRange {
                index,
                len: self.snapshots.len(),
            });
        }

        let mut candidate = self.snapshots.clone();
        let removed = candidate.remove(index);
        self.commit(candidate)?;
        tracing::info!(name = %removed.name, index, "saved state deleted");
        Ok(removed)
    }

    fn commit(&mut self, candidate: Vec<Snapshot>) -> Result<()> {
        self.persistence.save(&candidate).map_err(|err| {
            tracing::error!(error = %err, "failed to persist saved states");
            WorkspaceError::Persistence(err.to_string())
        })?;
        self.snapshots = candidate;
        Ok(())
    }
}

// Hand-edited files may carry repeated names; the first occurrence wins.
fn dedupe_by_name(snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
    let mut kept: Vec<Snapshot> = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        if snapshot.name.trim().is_empty() || kept.iter().any(|s| s.name == snapshot.name) {
            tracing::warn!(name = %snapshot.name, "dropping saved state with blank or repeated name");
            continue;
        }
        kept.push(snapshot);
    }
    kept
}


#[cfg(test)]
mod tests {
    use super::testing::{memory_store, MemoryPersistence};
    use super::{Snapshot, SnapshotStore};
    use crate::error::WorkspaceError;
    use crate::project::Project;

    fn page(markup: &str) -> Project {
        Project::new(markup, "", "")
    }

    fn names(store: &SnapshotStore) -> Vec<&str> {
        store.list().iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn create_appends_in_insertion_order_and_persists() {
        let (mut store, persistence) = memory_store();
        store.create("demo", page("a")).expect("create demo");
        store.create("other", page("b")).expect("create other");

        assert_eq!(names(&store), ["demo", "other"]);
        assert_eq!(persistence.saved.lock().expect("lock").len(), 2);
    }

    #[test]
    fn create_rejects_duplicate_and_blank_names_without_mutation() {
        let (mut store, persistence) = memory_store();
        store.create("demo", page("a")).expect("create demo");

        let duplicate = store.create("demo", page("b")).expect_err("duplicate should fail");
        assert!(matches!(duplicate, WorkspaceError::NameConflict(_)));
        let blank = store.create("   ", page("b")).expect_err("blank should fail");
        assert!(matches!(blank, WorkspaceError::NameConflict(_)));

        assert_eq!(store.list(), [Snapshot::new("demo", page("a"))]);
        assert_eq!(*persistence.writes.lock().expect("lock"), 1);
    }

    #[test]
    fn update_by_name_replaces_project_in_place() {
        let (mut store, _) = memory_store();
        store.create("first", page("a")).expect("create first");
        store.create("second", page("b")).expect("create second");

        store
            .update_by_name("first", page("changed"))
            .expect("update first");
        assert_eq!(names(&store), ["first", "second"]);
        assert_eq!(store.list()[0].project.markup, "changed");

        let missing = store
            .update_by_name("missing", page("x"))
            .expect_err("missing should fail");
        assert_eq!(missing, WorkspaceError::NotFound("missing".to_string()));
    }

    #[test]
    fn rename_to_own_name_is_not_a_conflict() {
        let (mut store, _) = memory_store();
        store.create("demo", page("a")).expect("create demo");

        store.rename("demo", "demo").expect("self rename should succeed");
        assert_eq!(names(&store), ["demo"]);
    }

    #[test]
    fn rename_onto_another_name_fails_and_keeps_existing_entry() {
        let (mut store, _) = memory_store();
        store.create("demo", page("a")).expect("create demo");
        store.create("other", page("b")).expect("create other");

        let err = store.rename("demo", "other").expect_err("collision should fail");
        assert_eq!(err, WorkspaceError::NameConflict("other".to_string()));
        assert_eq!(store.list()[0], Snapshot::new("demo", page("a")));

        let missing = store.rename("nope", "fresh").expect_err("missing should fail");
        assert_eq!(missing, WorkspaceError::NotFound("nope".to_string()));
    }

    #[test]
    fn rename_keeps_position() {
        let (mut store, _) = memory_store();
        for name in ["a", "b", "c"] {
            store.create(name, page(name)).expect("create");
        }

        store.rename("b", "renamed").expect("rename b");
        assert_eq!(names(&store), ["a", "renamed", "c"]);
    }

    #[test]
    fn names_stay_unique_across_mixed_create_and_rename() {
        let (mut store, _) = memory_store();
        let ops: [(&str, &str, bool); 8] = [
            ("create", "a", true),
            ("create", "b", true),
            ("rename", "a:b", false),
            ("create", "a", false),
            ("rename", "b:c", true),
            ("create", "b", true),
            ("rename", "c:a", false),
            ("rename", "c:c", true),
        ];

        for (op, arg, should_succeed) in ops {
            let outcome = match op {
                "create" => store.create(arg, page(arg)),
                _ => {
                    let (from, to) = arg.split_once(':').expect("rename arg");
                    store.rename(from, to)
                }
            };
            assert_eq!(outcome.is_ok(), should_succeed, "{op} {arg}");

            let mut seen = names(&store);
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), store.len());
        }
        assert_eq!(names(&store), ["a", "c", "b"]);
    }

    #[test]
    fn delete_at_removes_exactly_one_and_shifts_the_rest() {
        let (mut store, _) = memory_store();
        for name in ["a", "b", "c", "d"] {
            store.create(name, page(name)).expect("create");
        }

        let removed = store.delete_at(1).expect("delete b");
        assert_eq!(removed.name, "b");
        assert_eq!(names(&store), ["a", "c", "d"]);

        let err = store.delete_at(3).expect_err("index 3 is out of range");
        assert_eq!(err, WorkspaceError::OutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn failed_write_leaves_collection_unchanged() {
        let (mut store, persistence) = memory_store();
        store.create("demo", page("a")).expect("create demo");
        *persistence.fail_writes.lock().expect("lock") = true;

        let err = store.create("other", page("b")).expect_err("write should fail");
        assert!(matches!(err, WorkspaceError::Persistence(_)));
        assert!(store.rename("demo", "moved").is_err());
        assert!(store.delete_at(0).is_err());
        assert_eq!(store.list(), [Snapshot::new("demo", page("a"))]);
    }

    #[test]
    fn open_drops_repeated_names_from_backing_data() {
        let persistence = MemoryPersistence::default();
        *persistence.saved.lock().expect("lock") = vec![
            Snapshot::new("demo", page("first")),
            Snapshot::new("demo", page("second")),
            Snapshot::new("", page("blank")),
        ];

        let (store, warning) = SnapshotStore::open(Box::new(persistence));
        assert!(warning.is_none());
        assert_eq!(store.list(), [Snapshot::new("demo", page("first"))]);
    }
}
