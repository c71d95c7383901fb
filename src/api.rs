use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::PersistenceError;
use crate::model::{
    CreateEntryRequest, FileNode, NodeId, Project, ProjectId, UploadEntry, UploadOutcome,
};
use crate::store::FileStore;

/// Client for the backend file-storage REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Underlying HTTP client.
    client: Client,
    /// API root, without trailing slash, e.g. `http://127.0.0.1:3000/api`.
    base_url: String,
}

/// Upload responses come either as a bare list of created nodes or as a
/// partial-failure report.
#[derive(Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    Created(Vec<FileNode>),
    Report(UploadOutcome),
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `Rejected` carrying the response body.
    async fn check(response: Response) -> Result<Response, PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                message
            },
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, PersistenceError> {
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))
    }
}

impl FileStore for ApiClient {
    /// `GET /projects/{projectId}`
    async fn fetch_project(&self, project_id: &ProjectId) -> Result<Project, PersistenceError> {
        let url = self.url(&format!("/projects/{project_id}"));
        debug!(url, "Fetching project");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::json(response).await
    }

    /// `GET /projects/{projectId}/files`
    async fn list_files(&self, project_id: &ProjectId) -> Result<Vec<FileNode>, PersistenceError> {
        let url = self.url(&format!("/projects/{project_id}/files"));
        debug!(url, "Fetching file listing");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::json(response).await
    }

    /// `POST /projects/{projectId}/files`
    async fn create_file(
        &self,
        project_id: &ProjectId,
        request: &CreateEntryRequest,
    ) -> Result<FileNode, PersistenceError> {
        let url = self.url(&format!("/projects/{project_id}/files"));
        debug!(url, path = %request.path, is_folder = request.is_folder, "Creating entry");
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;
        Self::json(response).await
    }

    /// `PUT /files/{fileId}`. Only the status matters; the body is ignored.
    async fn save_file(&self, file_id: &NodeId, content: &str) -> Result<(), PersistenceError> {
        let url = self.url(&format!("/files/{file_id}"));
        debug!(url, bytes = content.len(), "Saving file");
        let response = self
            .client
            .put(&url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `POST /projects/{projectId}/upload`
    async fn upload_files(
        &self,
        project_id: &ProjectId,
        files: &[UploadEntry],
    ) -> Result<UploadOutcome, PersistenceError> {
        let url = self.url(&format!("/projects/{project_id}/upload"));
        debug!(url, count = files.len(), "Uploading files");
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "files": files }))
            .send()
            .await?;
        Ok(match Self::json::<UploadResponse>(response).await? {
            UploadResponse::Created(created) => UploadOutcome {
                created,
                failed: Vec::new(),
            },
            UploadResponse::Report(report) => report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let api = ApiClient::new("http://localhost:3000/api/");
        assert_eq!(api.base_url(), "http://localhost:3000/api");
        assert_eq!(api.url("/files/7"), "http://localhost:3000/api/files/7");
    }

    #[test]
    fn upload_response_accepts_both_shapes() {
        let bare: UploadResponse =
            serde_json::from_str(r#"[{"id":"1","name":"a.md","path":"/a.md"}]"#).unwrap();
        assert!(matches!(bare, UploadResponse::Created(ref v) if v.len() == 1));

        let report: UploadResponse = serde_json::from_str(
            r#"{"created":[],"failed":[{"name":"b.md","error":"quota"}]}"#,
        )
        .unwrap();
        match report {
            UploadResponse::Report(r) => assert_eq!(r.failed[0].name, "b.md"),
            UploadResponse::Created(_) => panic!("expected report"),
        }
    }
}
