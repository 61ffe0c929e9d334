//! In-process stand-in for the document content API
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use ::common::property::PropertyValue;
use ::common::store::{DocumentMeta, WorkspaceNode};
use cadmus_cli::client::requests::UpdatePropertyRequest;
use cadmus_cli::client::{ApiClient, HttpPropertyService};

#[derive(Debug, Default)]
pub struct FakeState {
    pub docs: HashMap<Uuid, WorkspaceNode>,
    /// Served verbatim so tests control the wire shape
    pub archetypes: serde_json::Value,
    pub writes: Vec<UpdatePropertyRequest>,
    pub doc_reads: usize,
    /// Answer writes with 400
    pub reject_writes: bool,
    /// Answer writes with 200 without storing them
    pub drop_writes: bool,
    pub last_authorization: Option<String>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeApi {
    pub url: Url,
    pub state: Shared,
    handle: JoinHandle<()>,
}

impl FakeApi {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            archetypes: serde_json::json!([]),
            ..FakeState::default()
        }));
        let router = Router::new()
            .route("/api/v1/content/docs/all", get(all_docs))
            .route("/api/v1/content/docs/archetypes", get(archetypes))
            .route("/api/v1/content/docs/update_property", post(update_property))
            .route("/api/v1/content/docs/:id", get(get_doc))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{}", addr)).unwrap(),
            state,
            handle,
        }
    }

    pub fn insert(&self, node: WorkspaceNode) {
        self.state.lock().docs.insert(node.id, node);
    }

    pub fn property(&self, doc_id: Uuid, key: &str) -> Option<PropertyValue> {
        self.state
            .lock()
            .docs
            .get(&doc_id)
            .and_then(|doc| doc.properties.get(key).cloned())
    }

    pub fn client(&self, auth_token: Option<&str>) -> ApiClient {
        ApiClient::new(&self.url, auth_token).unwrap()
    }

    pub fn service(&self) -> HttpPropertyService {
        HttpPropertyService::new(self.client(None))
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn record_auth(state: &mut FakeState, headers: &HeaderMap) {
    state.last_authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

async fn get_doc(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DocumentMeta>, (StatusCode, String)> {
    let mut state = state.lock();
    record_auth(&mut state, &headers);
    state.doc_reads += 1;
    let node = state
        .docs
        .get(&id)
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, "document not found".to_string()))?;
    Ok(Json(DocumentMeta {
        id: node.id,
        title: node.title,
        class_id: node.class_id,
        parent_id: node.parent_id,
        properties: node.properties,
    }))
}

async fn all_docs(State(state): State<Shared>, headers: HeaderMap) -> Json<Vec<WorkspaceNode>> {
    let mut state = state.lock();
    record_auth(&mut state, &headers);
    Json(state.docs.values().cloned().collect())
}

async fn archetypes(State(state): State<Shared>) -> Json<serde_json::Value> {
    Json(state.lock().archetypes.clone())
}

async fn update_property(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<UpdatePropertyRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let mut state = state.lock();
    record_auth(&mut state, &headers);
    if state.reject_writes {
        return Err((StatusCode::BAD_REQUEST, "writes disabled".to_string()));
    }
    state.writes.push(request.clone());
    if state.drop_writes {
        return Ok(Json(serde_json::json!({ "success": true })));
    }

    let doc = state
        .docs
        .get_mut(&request.id)
        .ok_or((StatusCode::NOT_FOUND, "document not found".to_string()))?;
    if request.key == "title" {
        doc.title = request.value.as_str().unwrap_or_default().to_string();
    } else {
        doc.properties.insert(request.key, request.value);
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
