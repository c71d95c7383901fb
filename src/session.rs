//! The per-project editing session consumed by the UI layer.
//!
//! [`IdeSession`] is the only mutator of tab and buffer state; consumers get
//! read-only views. The terminal client lives beside it, not inside it.

use tracing::{debug, info, warn};

use crate::content_sync::{FileContentSync, ListingGeneration, SaveAck, SaveStatus};
use crate::error::IdeError;
use crate::model::{
    CreateEntryRequest, FileNode, NodeId, Project, ProjectId, UploadEntry, UploadFailure,
};
use crate::path_resolver::{ensure_unique, resolve_path, validate_entry_name, ParentSelection};
use crate::store::FileStore;
use crate::tabs::{Tab, TabManager};
use crate::upload::{CandidateFile, RejectReason, RejectedFile, UploadValidator};

/// Result of an upload: what the backend created, what was filtered out
/// locally, and what the backend refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub created: Vec<FileNode>,
    pub rejected: Vec<RejectedFile>,
    pub failed: Vec<UploadFailure>,
}

pub struct IdeSession<S> {
    store: S,
    project: Project,
    /// Cached listing and the generation it was fetched at.
    files: Vec<FileNode>,
    files_generation: ListingGeneration,
    tabs: TabManager,
    sync: FileContentSync,
    uploader: UploadValidator,
}

impl<S: FileStore> IdeSession<S> {
    /// Fetch the project and its listing.
    pub async fn load(
        store: S,
        project_id: &ProjectId,
        uploader: UploadValidator,
    ) -> Result<Self, IdeError> {
        let project = store.fetch_project(project_id).await?;
        let files = store.list_files(project_id).await?;
        info!(%project_id, name = %project.name, files = files.len(), "Project loaded");
        let sync = FileContentSync::new();
        Ok(Self {
            store,
            project,
            files,
            files_generation: sync.generation(),
            tabs: TabManager::new(),
            sync,
            uploader,
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn files(&self) -> &[FileNode] {
        &self.files
    }

    /// A write happened since the listing was fetched.
    pub fn files_stale(&self) -> bool {
        self.files_generation != self.sync.generation()
    }

    pub async fn refresh_files(&mut self) -> Result<(), IdeError> {
        let generation = self.sync.generation();
        self.files = self.store.list_files(&self.project.id).await?;
        self.files_generation = generation;
        debug!(project_id = %self.project.id, generation = generation.value(), "Listing refreshed");
        Ok(())
    }

    pub fn tabs(&self) -> &[Tab] {
        self.tabs.tabs()
    }

    pub fn current_file(&self) -> Option<&Tab> {
        self.tabs.current()
    }

    pub fn save_status(&self) -> &SaveStatus {
        self.sync.status()
    }

    /// Open a file from the listing and make it current.
    pub fn open(&mut self, file_id: &NodeId) -> Result<(), IdeError> {
        let node = self
            .files
            .iter()
            .find(|n| &n.id == file_id && !n.is_folder)
            .cloned()
            .ok_or_else(|| IdeError::UnknownFile(file_id.clone()))?;
        self.tabs.open(node);
        Ok(())
    }

    pub fn close(&mut self, file_id: &NodeId) {
        if let Some(tab) = self.tabs.close(file_id) {
            if tab.is_dirty() {
                warn!(%file_id, "Closed tab with unsaved changes");
            }
        }
    }

    pub fn switch_to(&mut self, file_id: &NodeId) -> bool {
        self.tabs.switch_to(file_id)
    }

    pub fn edit_content(&mut self, file_id: &NodeId, content: String) -> bool {
        self.sync.edit_content(&mut self.tabs, file_id, content)
    }

    /// Persist the current file.
    pub async fn save(&mut self) -> Result<SaveAck, IdeError> {
        self.sync.save(&self.store, &mut self.tabs).await
    }

    /// Create a file or folder under `parent`.
    ///
    /// Names are validated and paths already present in the listing are
    /// rejected before anything is sent.
    pub async fn create_entry(
        &mut self,
        parent: ParentSelection,
        name: &str,
        is_folder: bool,
    ) -> Result<FileNode, IdeError> {
        let name = validate_entry_name(name)?;
        let path = resolve_path(&parent, &name, &self.files);
        ensure_unique(&path, &self.files)?;

        // A stale parent degrades to root placement, so the parent id must
        // follow the resolved path.
        let parent_id = parent
            .parent_id()
            .filter(|id| self.files.iter().any(|n| &n.id == *id))
            .cloned();
        let request = CreateEntryRequest {
            name,
            is_folder,
            parent_id,
            path,
            content: (!is_folder).then(String::new),
        };
        let node = self.store.create_file(&self.project.id, &request).await?;
        self.sync.note_write();
        info!(path = %node.path, is_folder, "Entry created");
        self.files.push(node.clone());
        Ok(node)
    }

    /// Validate and upload a batch. One file's failure never blocks the rest;
    /// only a failed request for the whole batch is an error.
    pub async fn upload(&mut self, candidates: &[CandidateFile]) -> Result<UploadReport, IdeError> {
        let batch = self.uploader.validate(candidates);
        let mut report = UploadReport {
            rejected: batch.rejected,
            ..Default::default()
        };

        let mut accepted: Vec<UploadEntry> = Vec::with_capacity(batch.accepted.len());
        for entry in batch.accepted {
            let taken = ensure_unique(&entry.path, &self.files).is_err()
                || accepted.iter().any(|a| a.path == entry.path);
            if taken {
                report.rejected.push(RejectedFile {
                    name: entry.name,
                    reason: RejectReason::PathExists(entry.path),
                });
            } else {
                accepted.push(entry);
            }
        }

        if accepted.is_empty() {
            debug!("Nothing to upload after validation");
            return Ok(report);
        }

        let outcome = self.store.upload_files(&self.project.id, &accepted).await?;
        if !outcome.created.is_empty() {
            self.sync.note_write();
        }
        info!(
            created = outcome.created.len(),
            rejected = report.rejected.len(),
            failed = outcome.failed.len(),
            "Upload finished"
        );
        self.files.extend(outcome.created.iter().cloned());
        report.created = outcome.created;
        report.failed = outcome.failed;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PersistenceError, ValidationError};
    use crate::store::memory::MemoryStore;

    async fn session() -> IdeSession<MemoryStore> {
        let store = MemoryStore::with_files(vec![
            FileNode::folder("1", "src", "/src"),
            FileNode::file("2", "app.ts", "/src/app.ts", "let a = 1;").with_parent("1"),
            FileNode::file("3", "index.html", "/index.html", "<html>"),
        ]);
        IdeSession::load(store, &ProjectId::new("p1"), UploadValidator::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn load_populates_project_and_listing() {
        let s = session().await;
        assert_eq!(s.project().name, "demo");
        assert_eq!(s.files().len(), 3);
        assert!(!s.files_stale());
        assert!(s.current_file().is_none());
    }

    #[tokio::test]
    async fn open_edit_save_flow() {
        let mut s = session().await;
        let app = NodeId::new("2");
        s.open(&app).unwrap();
        s.open(&NodeId::new("3")).unwrap();
        assert!(s.switch_to(&app));
        assert!(s.edit_content(&app, "let a = 2;".into()));
        assert!(s.current_file().unwrap().is_dirty());

        s.save().await.unwrap();
        assert_eq!(
            *s.store.saves.lock().unwrap(),
            vec![(app.clone(), "let a = 2;".to_string())]
        );
        assert!(s.files_stale());
        s.refresh_files().await.unwrap();
        assert!(!s.files_stale());
        let fresh = s.files().iter().find(|n| n.id == app).unwrap();
        assert_eq!(fresh.content.as_deref(), Some("let a = 2;"));
    }

    #[tokio::test]
    async fn folders_and_unknown_ids_cannot_be_opened() {
        let mut s = session().await;
        assert_eq!(
            s.open(&NodeId::new("1")),
            Err(IdeError::UnknownFile(NodeId::new("1")))
        );
        assert!(s.open(&NodeId::new("nope")).is_err());
        assert!(s.tabs().is_empty());
    }

    #[tokio::test]
    async fn closing_current_falls_back_to_last_tab() {
        let mut s = session().await;
        s.open(&NodeId::new("2")).unwrap();
        s.open(&NodeId::new("3")).unwrap();
        s.close(&NodeId::new("3"));
        assert_eq!(s.current_file().unwrap().id(), &NodeId::new("2"));
        s.close(&NodeId::new("2"));
        assert!(s.current_file().is_none());
        assert_eq!(s.save().await, Err(IdeError::NoFileSelected));
    }

    #[tokio::test]
    async fn create_entry_resolves_path_under_parent() {
        let mut s = session().await;
        let node = s
            .create_entry(ParentSelection::Node(NodeId::new("1")), " util.ts ", false)
            .await
            .unwrap();
        assert_eq!(node.path, "/src/util.ts");
        let req = &s.store.creates.lock().unwrap()[0];
        assert_eq!(req.parent_id, Some(NodeId::new("1")));
        assert_eq!(req.content.as_deref(), Some(""));
        assert!(s.files_stale());
        assert!(s.files().iter().any(|n| n.path == "/src/util.ts"));
    }

    #[tokio::test]
    async fn create_entry_with_stale_parent_lands_at_root() {
        let mut s = session().await;
        let node = s
            .create_entry(ParentSelection::Node(NodeId::new("gone")), "lib", true)
            .await
            .unwrap();
        assert_eq!(node.path, "/lib");
        let req = &s.store.creates.lock().unwrap()[0];
        assert_eq!(req.parent_id, None);
        assert_eq!(req.content, None);
    }

    #[tokio::test]
    async fn create_entry_rejects_bad_names_and_collisions() {
        let mut s = session().await;
        assert_eq!(
            s.create_entry(ParentSelection::Root, "", false).await,
            Err(IdeError::Validation(ValidationError::EmptyName))
        );
        assert_eq!(
            s.create_entry(ParentSelection::Root, "index.html", false).await,
            Err(IdeError::Validation(ValidationError::DuplicatePath(
                "/index.html".into()
            )))
        );
        assert!(s.store.creates.lock().unwrap().is_empty());
        assert!(!s.files_stale());
    }

    #[tokio::test]
    async fn create_failure_leaves_state_unchanged() {
        let mut s = session().await;
        s.store.set_failing(true);
        let err = s
            .create_entry(ParentSelection::Root, "new.md", false)
            .await
            .unwrap_err();
        assert!(matches!(err, IdeError::Persistence(PersistenceError::Rejected { .. })));
        assert_eq!(s.files().len(), 3);
        assert!(!s.files_stale());
    }

    #[tokio::test]
    async fn upload_filters_then_sends_accepted_batch() {
        let mut s = session().await;
        let report = s
            .upload(&[
                CandidateFile::from_bytes("notes.md", None, "# notes"),
                CandidateFile::from_bytes("photo.png", Some("image/png"), vec![1u8, 2]),
                CandidateFile::from_bytes("index.html", None, "<p>"),
                CandidateFile::from_bytes("notes.md", None, "dup"),
            ])
            .await
            .unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].path, "/notes.md");
        let reasons: Vec<_> = report.rejected.iter().map(|r| r.reason.to_string()).collect();
        assert_eq!(
            reasons,
            [
                "unsupported file type: photo.png",
                "path already exists: /index.html",
                "path already exists: /notes.md"
            ]
        );
        assert_eq!(s.store.uploads.lock().unwrap().len(), 1);
        assert!(s.files_stale());
    }

    #[tokio::test]
    async fn upload_with_nothing_acceptable_sends_nothing() {
        let mut s = session().await;
        let report = s
            .upload(&[CandidateFile::from_bytes("a.exe", Some("application/octet-stream"), vec![0u8])])
            .await
            .unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert!(s.store.uploads.lock().unwrap().is_empty());
    }
}
