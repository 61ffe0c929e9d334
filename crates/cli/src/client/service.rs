use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use common::property::{Archetype, PropertyValue};
use common::store::{DocumentMeta, PropertyError, PropertyService, WorkspaceNode};

use super::requests::{AllDocsRequest, ArchetypesRequest, GetDocRequest, UpdatePropertyRequest};
use super::{ApiClient, ApiError};

impl From<ApiError> for PropertyError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::HttpStatus(status, message) => PropertyError::Rejected {
                status: status.as_u16(),
                message,
            },
            other => PropertyError::Provider(anyhow::Error::new(other)),
        }
    }
}

/// [`PropertyService`] backed by the document content API
///
/// With `verify_writes` on, every successful write is followed by a fetch of
/// the document and a warning if the stored value differs from what was sent.
/// This is diagnostic only; nothing is retried or repaired.
#[derive(Debug, Clone)]
pub struct HttpPropertyService {
    client: ApiClient,
    verify_writes: bool,
}

impl HttpPropertyService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            verify_writes: false,
        }
    }

    pub fn with_verify_writes(mut self, verify_writes: bool) -> Self {
        self.verify_writes = verify_writes;
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn verify(&self, doc_id: Uuid, key: &str, sent: &PropertyValue) {
        let doc = match self.client.call(GetDocRequest { id: doc_id }).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(%doc_id, key, "read-back skipped: {}", e);
                return;
            }
        };
        let stored = if key == "title" {
            Some(PropertyValue::Text(doc.title))
        } else {
            doc.properties.get(key).cloned()
        };
        if stored.as_ref() != Some(sent) {
            tracing::warn!(%doc_id, key, "read-back mismatch: stored value differs from the one written");
        }
    }
}

#[async_trait]
impl PropertyService for HttpPropertyService {
    async fn get_doc(&self, doc_id: Uuid) -> Result<DocumentMeta, PropertyError> {
        match self.client.call(GetDocRequest { id: doc_id }).await {
            Ok(doc) => Ok(doc),
            Err(ApiError::HttpStatus(StatusCode::NOT_FOUND, _)) => {
                Err(PropertyError::NotFound(doc_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_property(
        &self,
        doc_id: Uuid,
        key: &str,
        value: PropertyValue,
        user_id: Option<Uuid>,
    ) -> Result<(), PropertyError> {
        let request = UpdatePropertyRequest {
            id: doc_id,
            key: key.to_string(),
            value,
            user_id,
        };
        let sent = self.verify_writes.then(|| request.value.clone());

        if let Err(e) = self.client.execute(request).await {
            tracing::error!(%doc_id, key, "property write failed: {}", e);
            return Err(e.into());
        }
        tracing::debug!(%doc_id, key, "property written");

        if let Some(sent) = sent {
            self.verify(doc_id, key, &sent).await;
        }
        Ok(())
    }

    async fn get_all_docs(&self, _user_id: Uuid) -> Result<Vec<WorkspaceNode>, PropertyError> {
        // the server scopes the listing to the bearer token's user
        Ok(self.client.call(AllDocsRequest).await?)
    }

    async fn get_archetypes(&self) -> Result<Vec<Archetype>, PropertyError> {
        Ok(self.client.call(ArchetypesRequest).await?)
    }
}
