use crate::error::{Result, WorkspaceError};
use crate::project::{BufferKind, Project};
use crate::snapshot::SnapshotStore;

/// The live project being edited and the saved state it was loaded from.
///
/// The binding is an index into the store, validated against the store on
/// every use. Edits only become durable through `flush_to_store`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceState {
    project: Project,
    bound: Option<usize>,
}

impl WorkspaceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn bound_index(&self) -> Option<usize> {
        self.bound
    }

    /// Name of the bound saved state as the store currently knows it.
    pub fn bound_name<'a>(&self, store: &'a SnapshotStore) -> Option<&'a str> {
        self.bound
            .and_then(|index| store.get(index))
            .map(|snapshot| snapshot.name.as_str())
    }

    pub fn reset(&mut self) {
        self.project = Project::default();
        self.bound = None;
    }

    pub fn set_markup(&mut self, text: impl Into<String>) {
        self.project.markup = text.into();
    }

    pub fn set_style(&mut self, text: impl Into<String>) {
        self.project.style = text.into();
    }

    pub fn set_script(&mut self, text: impl Into<String>) {
        self.project.script = text.into();
    }

    pub fn buffer_mut(&mut self, kind: BufferKind) -> &mut String {
        self.project.buffer_mut(kind)
    }

    pub fn bind(&mut self, store: &SnapshotStore, index: usize) -> Result<()> {
        let snapshot = store.get(index).ok_or(WorkspaceError::OutOfRange {
            index,
            len: store.len(),
        })?;
        self.project = snapshot.project.clone();
        self.bound = Some(index);
        Ok(())
    }

    pub fn flush_to_store(&self, store: &mut SnapshotStore) -> Result<()> {
        let Some(index) = self.bound else {
            return Ok(());
        };
        let name = store
            .get(index)
            .map(|snapshot| snapshot.name.clone())
            .ok_or(WorkspaceError::OutOfRange {
                index,
                len: store.len(),
            })?;
        store.update_by_name(&name, self.project.clone())
    }

    /// Keeps the binding pointing at the same saved state after the store
    /// removed the entry at `removed`.
    pub fn on_snapshot_removed(&mut self, removed: usize) {
        self.bound = match self.bound {
            Some(index) if index == removed => None,
            Some(index) if index > removed => Some(index - 1),
            other => other,
        };
    }

    pub(crate) fn apply_reply_buffers(
        &mut self,
        markup: Option<&str>,
        style: Option<&str>,
        script: Option<&str>,
    ) {
        for (kind, text) in [
            (BufferKind::Markup, markup),
            (BufferKind::Style, style),
            (BufferKind::Script, script),
        ] {
            if let Some(text) = text.filter(|text| !text.is_empty()) {
                *self.project.buffer_mut(kind) = text.to_string();
            }
        }
    }
}
