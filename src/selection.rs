use crate::error::{Result, WorkspaceError};
use crate::snapshot::SnapshotStore;
use crate::workspace::WorkspaceState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditMode {
    pub is_editing: bool,
    pub pending_name: String,
}

/// Interaction policy between the live workspace and the saved states.
///
/// The selected saved state is the workspace binding; this controller only
/// owns the rename sub-state.
#[derive(Debug, Default)]
pub struct SelectionController {
    edit: EditMode,
    focus_requested: bool,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit_mode(&self) -> &EditMode {
        &self.edit
    }

    pub fn selected(&self, workspace: &WorkspaceState) -> Option<usize> {
        workspace.bound_index()
    }

    /// Switches the workspace to another saved state. The currently bound
    /// project is flushed under its own name before the new one is loaded.
    pub fn select_index(
        &mut self,
        store: &mut SnapshotStore,
        workspace: &mut WorkspaceState,
        new_index: usize,
    ) -> Result<()> {
        if workspace.bound_index() == Some(new_index) {
            return Ok(());
        }
        if new_index >= store.len() {
            return Err(WorkspaceError::OutOfRange {
                index: new_index,
                len: store.len(),
            });
        }

        workspace.flush_to_store(store)?;
        self.cancel_rename();
        workspace.bind(store, new_index)?;
        tracing::debug!(index = new_index, "saved state selected");
        Ok(())
    }

    pub fn delete_selected(
        &mut self,
        store: &mut SnapshotStore,
        workspace: &mut WorkspaceState,
    ) -> Result<String> {
        let index = workspace.bound_index().ok_or(WorkspaceError::NoSelection)?;
        let removed = store.delete_at(index)?;
        workspace.on_snapshot_removed(index);
        self.cancel_rename();
        Ok(removed.name)
    }

    /// Creates a new saved state from the live project. The selection is
    /// left alone.
    pub fn save_as(
        &mut self,
        store: &mut SnapshotStore,
        workspace: &WorkspaceState,
        name: &str,
    ) -> Result<()> {
        store.create(name, workspace.project().clone())
    }

    pub fn reset(&mut self, workspace: &mut WorkspaceState) {
        workspace.reset();
        self.cancel_rename();
    }

    pub fn begin_rename(&mut self, proposed_name: impl Into<String>) {
        self.edit = EditMode {
            is_editing: true,
            pending_name: proposed_name.into(),
        };
        self.focus_requested = true;
    }

    /// True once per rename, on the first call after entering edit mode.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    pub fn set_pending_name(&mut self, text: impl Into<String>) {
        self.edit.pending_name = text.into();
    }

    pub fn pending_name_mut(&mut self) -> &mut String {
        &mut self.edit.pending_name
    }

    /// The edit icon toggles rename mode, seeding it with the current name.
    pub fn toggle_edit(&mut self, store: &SnapshotStore, workspace: &WorkspaceState) {
        if self.edit.is_editing {
            self.cancel_rename();
        } else if let Some(name) = workspace.bound_name(store) {
            self.begin_rename(name);
        }
    }

    pub fn cancel_rename(&mut self) {
        self.focus_requested = false;
        self.edit = EditMode::default();
    }

    pub fn commit_rename(
        &mut self,
        store: &mut SnapshotStore,
        workspace: &WorkspaceState,
    ) -> Result<()> {
        let current = workspace
            .bound_name(store)
            .ok_or(WorkspaceError::NoSelection)?
            .to_string();
        store.rename(&current, &self.edit.pending_name)?;
        self.cancel_rename();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EditMode, SelectionController};
    use crate::error::WorkspaceError;
    use crate::project::Project;
    use crate::snapshot::testing::{memory_store, MemoryPersistence};
    use crate::snapshot::SnapshotStore;
    use crate::workspace::WorkspaceState;

    fn setup(names: &[&str]) -> (SnapshotStore, WorkspaceState, SelectionController) {
        let (mut store, _) = memory_store();
        for name in names {
            store
                .create(name, Project::new(format!("<p>{name}</p>"), "", ""))
                .expect("create");
        }
        (store, WorkspaceState::new(), SelectionController::new())
    }

    // Selects `selected`, puts the workspace in an edited state and makes every
    // later store write fail.
    fn failing_setup(
        names: &[&str],
        selected: usize,
    ) -> (SnapshotStore, WorkspaceState, SelectionController) {
        let (mut store, persistence) = memory_store();
        for name in names {
            store
                .create(name, Project::new(format!("<p>{name}</p>"), "", ""))
                .expect("create");
        }
        let mut workspace = WorkspaceState::new();
        let mut selection = SelectionController::new();
        selection
            .select_index(&mut store, &mut workspace, selected)
            .expect("select");
        workspace.set_markup("<p>unsaved</p>");
        fail_writes(&persistence);
        (store, workspace, selection)
    }

    fn fail_writes(persistence: &MemoryPersistence) {
        *persistence.fail_writes.lock().expect("lock") = true;
    }

    #[test]
    fn failed_flush_on_select_keeps_everything() {
        let (mut store, mut workspace, mut selection) = failing_setup(&["a", "b"], 0);
        selection.begin_rename("draft");
        let (listed, before, edit) = (
            store.list().to_vec(),
            workspace.clone(),
            selection.edit_mode().clone(),
        );

        let err = selection
            .select_index(&mut store, &mut workspace, 1)
            .expect_err("flush should fail");
        assert!(matches!(err, WorkspaceError::Persistence(_)));
        assert_eq!(workspace, before);
        assert_eq!(workspace.bound_index(), Some(0));
        assert_eq!(selection.edit_mode(), &edit);
        assert_eq!(store.list(), listed.as_slice());
    }

    #[test]
    fn failed_rename_write_keeps_everything() {
        let (mut store, workspace, mut selection) = failing_setup(&["demo"], 0);
        selection.begin_rename("landing");
        let (listed, before) = (store.list().to_vec(), workspace.clone());

        let err = selection
            .commit_rename(&mut store, &workspace)
            .expect_err("write should fail");
        assert!(matches!(err, WorkspaceError::Persistence(_)));
        assert_eq!(workspace, before);
        assert_eq!(
            selection.edit_mode(),
            &EditMode {
                is_editing: true,
                pending_name: "landing".to_string(),
            }
        );
        assert_eq!(store.list(), listed.as_slice());
        assert_eq!(workspace.bound_name(&store), Some("demo"));
    }

    #[test]
    fn failed_delete_write_keeps_everything() {
        let (mut store, mut workspace, mut selection) = failing_setup(&["a", "b", "c"], 1);
        selection.begin_rename("draft");
        let (listed, before, edit) = (
            store.list().to_vec(),
            workspace.clone(),
            selection.edit_mode().clone(),
        );

        let err = selection
            .delete_selected(&mut store, &mut workspace)
            .expect_err("write should fail");
        assert!(matches!(err, WorkspaceError::Persistence(_)));
        assert_eq!(workspace, before);
        assert_eq!(workspace.bound_index(), Some(1));
        assert_eq!(selection.edit_mode(), &edit);
        assert_eq!(store.list(), listed.as_slice());
    }

    #[test]
    fn failed_save_as_write_keeps_everything() {
        let (mut store, workspace, mut selection) = failing_setup(&["a"], 0);
        let (listed, before, edit) = (
            store.list().to_vec(),
            workspace.clone(),
            selection.edit_mode().clone(),
        );

        let err = selection
            .save_as(&mut store, &workspace, "copy")
            .expect_err("write should fail");
        assert!(matches!(err, WorkspaceError::Persistence(_)));
        assert_eq!(workspace, before);
        assert_eq!(selection.edit_mode(), &edit);
        assert_eq!(store.list(), listed.as_slice());
        assert_eq!(store.position("copy"), None);
    }

    #[test]
    fn switching_away_and_back_restores_the_same_project() {
        let (mut store, mut workspace, mut selection) = setup(&["a", "b"]);

        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a");
        let first = workspace.project().clone();
        selection
            .select_index(&mut store, &mut workspace, 1)
            .expect("select b");
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a again");

        assert_eq!(workspace.project(), &first);
    }

    #[test]
    fn edits_are_flushed_before_switching() {
        let (mut store, mut workspace, mut selection) = setup(&["a", "b"]);

        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a");
        workspace.set_markup("<p>edited</p>");
        selection
            .select_index(&mut store, &mut workspace, 1)
            .expect("select b");
        assert_eq!(workspace.project().markup, "<p>b</p>");

        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a again");
        assert_eq!(workspace.project().markup, "<p>edited</p>");
    }

    #[test]
    fn unbound_edits_are_not_flushed_into_the_first_selection() {
        let (mut store, mut workspace, mut selection) = setup(&["a"]);
        workspace.set_markup("<p>scratch</p>");

        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a");
        assert_eq!(store.list()[0].project.markup, "<p>a</p>");
        assert_eq!(workspace.project().markup, "<p>a</p>");
    }

    #[test]
    fn reselecting_current_index_keeps_unsaved_edits_and_edit_mode() {
        let (mut store, mut workspace, mut selection) = setup(&["a"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a");
        workspace.set_style("body{}");
        selection.begin_rename("draft");

        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("reselect a");
        assert_eq!(workspace.project().style, "body{}");
        assert_eq!(store.list()[0].project.style, "");
        assert!(selection.edit_mode().is_editing);
    }

    #[test]
    fn selecting_out_of_range_changes_nothing() {
        let (mut store, mut workspace, mut selection) = setup(&["a"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a");
        workspace.set_script("draft()");
        let before = workspace.clone();

        let err = selection
            .select_index(&mut store, &mut workspace, 4)
            .expect_err("index 4 is out of range");
        assert_eq!(err, WorkspaceError::OutOfRange { index: 4, len: 1 });
        assert_eq!(workspace, before);
        assert_eq!(store.list()[0].project.script, "");
    }

    #[test]
    fn switching_clears_edit_mode() {
        let (mut store, mut workspace, mut selection) = setup(&["a", "b"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select a");
        selection.begin_rename("renamed");

        selection
            .select_index(&mut store, &mut workspace, 1)
            .expect("select b");
        assert_eq!(selection.edit_mode(), &EditMode::default());
    }

    #[test]
    fn delete_selected_requires_a_selection() {
        let (mut store, mut workspace, mut selection) = setup(&["a"]);

        let err = selection
            .delete_selected(&mut store, &mut workspace)
            .expect_err("nothing selected");
        assert_eq!(err, WorkspaceError::NoSelection);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_selected_removes_and_unbinds() {
        let (mut store, mut workspace, mut selection) = setup(&["a", "b", "c"]);
        selection
            .select_index(&mut store, &mut workspace, 1)
            .expect("select b");
        workspace.set_markup("<p>kept on screen</p>");

        let removed = selection
            .delete_selected(&mut store, &mut workspace)
            .expect("delete b");
        assert_eq!(removed, "b");
        assert_eq!(selection.selected(&workspace), None);
        assert_eq!(workspace.project().markup, "<p>kept on screen</p>");
        let names: Vec<_> = store.list().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn deleting_an_earlier_entry_tracks_the_bound_one() {
        let (mut store, mut workspace, mut selection) = setup(&["a", "b", "c"]);
        selection
            .select_index(&mut store, &mut workspace, 2)
            .expect("select c");

        store.delete_at(0).expect("delete a");
        workspace.on_snapshot_removed(0);
        assert_eq!(workspace.bound_index(), Some(1));
        assert_eq!(workspace.bound_name(&store), Some("c"));
    }

    #[test]
    fn commit_rename_goes_through_the_store() {
        let (mut store, mut workspace, mut selection) = setup(&["demo", "other"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select demo");

        selection.toggle_edit(&store, &workspace);
        assert_eq!(selection.edit_mode().pending_name, "demo");
        selection.set_pending_name("landing");
        selection
            .commit_rename(&mut store, &workspace)
            .expect("rename demo");

        assert!(!selection.edit_mode().is_editing);
        assert_eq!(workspace.bound_index(), Some(0));
        assert_eq!(workspace.bound_name(&store), Some("landing"));
    }

    #[test]
    fn commit_rename_with_taken_name_stays_in_edit_mode() {
        let (mut store, mut workspace, mut selection) = setup(&["demo", "other"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select demo");
        selection.begin_rename("other");

        let err = selection
            .commit_rename(&mut store, &workspace)
            .expect_err("name is taken");
        assert_eq!(err, WorkspaceError::NameConflict("other".to_string()));
        assert!(selection.edit_mode().is_editing);
        assert_eq!(workspace.bound_name(&store), Some("demo"));
    }

    #[test]
    fn rename_field_asks_for_focus_only_once() {
        let (mut store, mut workspace, mut selection) = setup(&["demo"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select demo");
        assert!(!selection.take_focus_request());

        selection.toggle_edit(&store, &workspace);
        assert!(selection.take_focus_request());
        assert!(!selection.take_focus_request());
        assert!(selection.edit_mode().is_editing);

        selection.toggle_edit(&store, &workspace);
        selection.toggle_edit(&store, &workspace);
        selection.cancel_rename();
        assert!(!selection.take_focus_request());
    }

    #[test]
    fn commit_rename_to_same_name_succeeds() {
        let (mut store, mut workspace, mut selection) = setup(&["demo"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select demo");
        selection.begin_rename("demo");

        selection
            .commit_rename(&mut store, &workspace)
            .expect("self rename");
        assert_eq!(workspace.bound_name(&store), Some("demo"));
    }

    #[test]
    fn reset_unbinds_and_leaves_edit_mode() {
        let (mut store, mut workspace, mut selection) = setup(&["demo"]);
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select demo");
        selection.begin_rename("x");

        selection.reset(&mut workspace);
        assert_eq!(workspace.bound_index(), None);
        assert_eq!(workspace.project(), &Project::default());
        assert!(!selection.edit_mode().is_editing);
    }

    #[test]
    fn edit_then_switch_to_new_snapshot_flushes_into_demo() {
        let (mut store, _) = memory_store();
        let mut workspace = WorkspaceState::new();
        let mut selection = SelectionController::new();

        store
            .create("demo", Project::new("<p>hi</p>", "", ""))
            .expect("create demo");
        selection
            .select_index(&mut store, &mut workspace, 0)
            .expect("select demo");
        workspace.set_style("p{color:red}");
        selection
            .save_as(&mut store, &workspace, "second")
            .expect("create second");
        selection
            .select_index(&mut store, &mut workspace, 1)
            .expect("select second");

        assert_eq!(store.list()[0].project.style, "p{color:red}");
    }
}
