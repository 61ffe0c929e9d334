//! Requests against the document content API
//!
//! Every route lives under [`DOCS_PATH`].

use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::property::{Archetype, PropertyValue};
use common::store::{DocumentMeta, WorkspaceNode};

use super::ApiRequest;

pub const DOCS_PATH: &str = "/api/v1/content/docs";

fn docs_url(base_url: &Url, tail: &str) -> Url {
    let mut url = base_url.clone();
    url.set_path(&format!("{}/{}", DOCS_PATH, tail));
    url
}

#[derive(Debug, Clone)]
pub struct GetDocRequest {
    pub id: Uuid,
}

impl ApiRequest for GetDocRequest {
    type Response = DocumentMeta;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(docs_url(base_url, &self.id.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct AllDocsRequest;

impl ApiRequest for AllDocsRequest {
    type Response = Vec<WorkspaceNode>;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(docs_url(base_url, "all"))
    }
}

#[derive(Debug, Clone)]
pub struct ArchetypesRequest;

impl ApiRequest for ArchetypesRequest {
    type Response = Vec<Archetype>;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(docs_url(base_url, "archetypes"))
    }
}

/// Single-key property upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePropertyRequest {
    pub id: Uuid,
    pub key: String,
    pub value: PropertyValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl ApiRequest for UpdatePropertyRequest {
    type Response = serde::de::IgnoredAny;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client
            .post(docs_url(base_url, "update_property"))
            .json(&self)
    }
}
