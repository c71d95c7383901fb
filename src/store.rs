use std::future::Future;

use crate::error::PersistenceError;
use crate::model::{CreateEntryRequest, FileNode, NodeId, Project, ProjectId, UploadEntry, UploadOutcome};

/// Backend file storage as seen by the session core.
///
/// Implemented over REST by [`crate::api::ApiClient`].
pub trait FileStore {
    fn fetch_project(
        &self,
        project_id: &ProjectId,
    ) -> impl Future<Output = Result<Project, PersistenceError>> + Send;

    fn list_files(
        &self,
        project_id: &ProjectId,
    ) -> impl Future<Output = Result<Vec<FileNode>, PersistenceError>> + Send;

    fn create_file(
        &self,
        project_id: &ProjectId,
        request: &CreateEntryRequest,
    ) -> impl Future<Output = Result<FileNode, PersistenceError>> + Send;

    /// Resolves on acknowledgement; the response carries no content.
    fn save_file(
        &self,
        file_id: &NodeId,
        content: &str,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn upload_files(
        &self,
        project_id: &ProjectId,
        files: &[UploadEntry],
    ) -> impl Future<Output = Result<UploadOutcome, PersistenceError>> + Send;
}
