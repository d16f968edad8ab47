//! History operations for the signed-in identity.

use std::sync::Arc;

use photopoet_core::creation::{Creation, DetailsUpdate};
use photopoet_core::history::HistoryFilter;
use photopoet_core::share::SharePayload;
use photopoet_core::style::PoemStyle;
use photopoet_core::types::{DbId, Timestamp};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiClient, Data};
use crate::error::ClientError;
use crate::live::{LiveHistory, ReconnectConfig};
use crate::session::SessionProvider;

/// A downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Public link to a shared creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShareLink {
    pub share_id: Uuid,
    pub url: String,
}

/// The public view of a shared creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SharedCreation {
    pub title: String,
    pub style: PoemStyle,
    pub poem: String,
    pub image_url: String,
    pub created_at: Timestamp,
}

/// The identity's saved creations.
pub struct HistoryClient {
    api: Arc<ApiClient>,
    session: Arc<SessionProvider>,
}

impl HistoryClient {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionProvider>) -> Self {
        Self { api, session }
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<Creation>, ClientError> {
        self.session.identity()?;
        let page: Data<Vec<Creation>> = self.api.get_json("/creations").await?;
        Ok(page.data)
    }

    /// Records narrowed by style and search term.
    ///
    /// The full list is fetched and narrowed here, so the same filter over
    /// the same list always yields the same records in the same order.
    pub async fn list_filtered(&self, filter: &HistoryFilter) -> Result<Vec<Creation>, ClientError> {
        let all = self.list().await?;
        Ok(filter.apply(&all).into_iter().cloned().collect())
    }

    pub async fn get(&self, id: DbId) -> Result<Creation, ClientError> {
        self.session.identity()?;
        let page: Data<Creation> = self.api.get_json(&format!("/creations/{id}")).await?;
        Ok(page.data)
    }

    /// Change title and/or note. On error nothing changes server-side and
    /// the caller keeps its form state for a retry.
    pub async fn update_details(&self, id: DbId, update: &DetailsUpdate) -> Result<Creation, ClientError> {
        self.session.identity()?;
        update
            .validate()
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let page: Data<Creation> = self
            .api
            .patch_json(&format!("/creations/{id}"), update)
            .await?;
        Ok(page.data)
    }

    /// Remove the record and its photo. A photo that could not be removed
    /// is reported as a failure even though the record is gone.
    pub async fn delete(&self, id: DbId) -> Result<(), ClientError> {
        self.session.identity()?;
        self.api.delete(&format!("/creations/{id}")).await
    }

    /// Move a legacy inline photo to the blob store.
    pub async fn migrate_image(&self, id: DbId) -> Result<Creation, ClientError> {
        self.session.identity()?;
        let page: Data<Creation> = self
            .api
            .post_json(&format!("/creations/{id}/migrate-image"), &serde_json::json!({}))
            .await?;
        Ok(page.data)
    }

    // ---- export / share ----

    /// The poem as a text file.
    pub async fn download_poem(&self, id: DbId) -> Result<Download, ClientError> {
        self.download(&format!("/creations/{id}/poem.txt"), "poem.txt").await
    }

    /// The PDF export.
    pub async fn export_pdf(&self, id: DbId) -> Result<Download, ClientError> {
        self.download(&format!("/creations/{id}/export.pdf"), "poem.pdf").await
    }

    /// Clipboard text and share-sheet title.
    pub async fn share_payload(&self, id: DbId) -> Result<SharePayload, ClientError> {
        self.session.identity()?;
        let page: Data<SharePayload> = self
            .api
            .get_json(&format!("/creations/{id}/share"))
            .await?;
        Ok(page.data)
    }

    /// Public link; the same on every call for a record.
    pub async fn share_link(&self, id: DbId) -> Result<ShareLink, ClientError> {
        self.session.identity()?;
        let page: Data<ShareLink> = self
            .api
            .post_json(&format!("/creations/{id}/share-link"), &serde_json::json!({}))
            .await?;
        Ok(page.data)
    }

    /// Public read of a shared creation. Needs no identity.
    pub async fn shared(&self, share_id: Uuid) -> Result<SharedCreation, ClientError> {
        let page: Data<SharedCreation> = self.api.get_json(&format!("/shared/{share_id}")).await?;
        Ok(page.data)
    }

    // ---- live ----

    /// Subscribe to snapshots of the list.
    pub async fn subscribe(&self) -> Result<LiveHistory, ClientError> {
        self.subscribe_with(ReconnectConfig::default()).await
    }

    pub async fn subscribe_with(&self, reconnect: ReconnectConfig) -> Result<LiveHistory, ClientError> {
        self.session.identity()?;
        LiveHistory::connect(Arc::clone(&self.api), reconnect).await
    }

    async fn download(&self, path: &str, fallback_name: &str) -> Result<Download, ClientError> {
        self.session.identity()?;
        let raw = self.api.get_download(path).await?;
        Ok(Download {
            file_name: raw.file_name.unwrap_or_else(|| fallback_name.to_string()),
            content_type: raw
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes: raw.bytes,
        })
    }
}
