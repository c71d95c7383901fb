use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::error::{IdeError, PersistenceError};
use crate::model::NodeId;
use crate::store::FileStore;
use crate::tabs::TabManager;

/// Save indicator observed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved { at: DateTime<Local> },
    Failed(String),
}

/// Monotonic marker for a project's file listing, bumped on every successful
/// write. Readers compare against the generation they fetched at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListingGeneration(u64);

impl ListingGeneration {
    pub fn bump(&mut self) {
        self.0 += 1;
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// A save in flight: what was sent, so the ack can mark exactly that content
/// as persisted even if the buffer changed meanwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub file_id: NodeId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveAck {
    pub file_id: NodeId,
    pub generation: ListingGeneration,
}

/// Local edit buffers and explicit persistence of the current file.
#[derive(Debug, Default)]
pub struct FileContentSync {
    generation: ListingGeneration,
    status: SaveStatus,
}

impl FileContentSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn generation(&self) -> ListingGeneration {
        self.generation
    }

    /// Record a successful write that invalidates cached listings.
    pub fn note_write(&mut self) -> ListingGeneration {
        self.generation.bump();
        self.generation
    }

    /// Replace the buffer of an open file. Local only; nothing is sent.
    pub fn edit_content(&self, tabs: &mut TabManager, file_id: &NodeId, content: String) -> bool {
        match tabs.get_mut(file_id) {
            Some(tab) => {
                tab.set_buffer(content);
                true
            }
            None => {
                debug!(%file_id, "Edit for a file that is not open, ignoring");
                false
            }
        }
    }

    /// Snapshot the current file for sending.
    pub fn begin_save(&mut self, tabs: &TabManager) -> Result<PendingSave, IdeError> {
        let tab = tabs.current().ok_or(IdeError::NoFileSelected)?;
        self.status = SaveStatus::Saving;
        Ok(PendingSave {
            file_id: tab.id().clone(),
            content: tab.content().to_string(),
        })
    }

    /// Apply the backend's answer. The response is only a success signal; the
    /// buffer is never overwritten.
    pub fn finish_save(
        &mut self,
        tabs: &mut TabManager,
        pending: PendingSave,
        result: Result<(), PersistenceError>,
    ) -> Result<SaveAck, IdeError> {
        match result {
            Ok(()) => {
                if let Some(tab) = tabs.get_mut(&pending.file_id) {
                    tab.mark_persisted(pending.content);
                }
                let generation = self.note_write();
                self.status = SaveStatus::Saved { at: Local::now() };
                info!(file_id = %pending.file_id, generation = generation.value(), "File saved");
                Ok(SaveAck {
                    file_id: pending.file_id,
                    generation,
                })
            }
            Err(err) => {
                warn!(file_id = %pending.file_id, error = %err, "Save failed");
                self.status = SaveStatus::Failed(err.to_string());
                Err(IdeError::SaveFailed(err))
            }
        }
    }

    /// Persist the current file's buffer.
    pub async fn save<S: FileStore>(
        &mut self,
        store: &S,
        tabs: &mut TabManager,
    ) -> Result<SaveAck, IdeError> {
        let pending = self.begin_save(tabs)?;
        let result = store.save_file(&pending.file_id, &pending.content).await;
        self.finish_save(tabs, pending, result)
    }
}
