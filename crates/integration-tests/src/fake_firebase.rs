//! A local stand-in for the Firebase REST endpoints.
//!
//! Serves just enough of Identity Toolkit, Secure Token, Firestore and
//! Cloud Storage for the storefront clients: password sign-up and sign-in,
//! token refresh, `documents:commit`, `documents:runQuery` with one equality
//! filter and one sort key, and media uploads. Documents are kept in their
//! typed-value JSON form so tests can assert on exactly what went over the
//! wire.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use chrono::{SecondsFormat, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use pocket_store_storefront::config::FirebaseConfig;

/// Project ID the fake answers for.
pub const PROJECT_ID: &str = "demo-pocket-store";

/// Storage bucket the fake answers for.
pub const BUCKET: &str = "demo-pocket-store.appspot.com";

/// Lifetime in seconds of issued ID tokens.
const TOKEN_LIFETIME: &str = "3600";

#[derive(Default)]
struct FakeState {
    /// email -> (uid, password)
    users: HashMap<String, (String, String)>,
    /// collection -> id -> typed fields
    documents: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
    blobs: HashMap<String, (String, Vec<u8>)>,
    /// `Authorization` header of every commit, in arrival order.
    commit_auth: Vec<Option<String>>,
    refreshes: usize,
    fail_commits: bool,
}

type SharedState = Arc<Mutex<FakeState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, FakeState> {
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A running fake Firebase server.
pub struct FakeFirebase {
    addr: SocketAddr,
    state: SharedState,
}

impl FakeFirebase {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = SharedState::default();
        let app = Router::new()
            .route("/auth/{operation}", post(password_operation))
            .route("/token/token", post(refresh_token))
            .route(
                "/firestore/projects/{project}/databases/{database}/{method}",
                post(firestore_method),
            )
            .route("/storage/b/{bucket}/o", post(upload))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake Firebase listener");
        let addr = listener
            .local_addr()
            .expect("fake Firebase listener address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// Client configuration pointing every endpoint at this server.
    #[must_use]
    pub fn config(&self) -> FirebaseConfig {
        let base = format!("http://{}", self.addr);
        FirebaseConfig {
            firestore_base_url: format!("{base}/firestore"),
            auth_base_url: format!("{base}/auth"),
            token_base_url: format!("{base}/token"),
            storage_base_url: format!("{base}/storage"),
            ..FirebaseConfig::new(PROJECT_ID, SecretString::from("fake-api-key"), BUCKET)
        }
    }

    /// Store a document directly, fields in typed-value form.
    pub fn seed_document(&self, collection: &str, id: &str, fields: Value) {
        let fields = fields.as_object().cloned().unwrap_or_default();
        lock(&self.state)
            .documents
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), fields);
    }

    /// Documents of a collection as `(id, typed fields)`.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<(String, Map<String, Value>)> {
        lock(&self.state)
            .documents
            .get(collection)
            .map(|docs| docs.iter().map(|(id, f)| (id.clone(), f.clone())).collect())
            .unwrap_or_default()
    }

    /// Uploaded object as `(content type, bytes)`.
    #[must_use]
    pub fn blob(&self, name: &str) -> Option<(String, Vec<u8>)> {
        lock(&self.state).blobs.get(name).cloned()
    }

    /// `Authorization` header of every commit so far.
    #[must_use]
    pub fn commit_authorizations(&self) -> Vec<Option<String>> {
        lock(&self.state).commit_auth.clone()
    }

    /// Number of token refreshes served.
    #[must_use]
    pub fn refreshes(&self) -> usize {
        lock(&self.state).refreshes
    }

    /// Make every following commit fail with 503.
    pub fn fail_commits(&self) {
        lock(&self.state).fail_commits = true;
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message } })),
    )
        .into_response()
}

fn session_body(uid: &str, email: Option<&str>, generation: usize) -> Value {
    json!({
        "idToken": format!("token-{uid}-{generation}"),
        "refreshToken": format!("refresh-{uid}"),
        "expiresIn": TOKEN_LIFETIME,
        "localId": uid,
        "email": email,
    })
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Deserialize)]
struct PasswordBody {
    email: String,
    password: String,
}

async fn password_operation(
    State(state): State<SharedState>,
    Path(operation): Path<String>,
    Json(body): Json<PasswordBody>,
) -> Response {
    let mut state = lock(&state);
    match operation.as_str() {
        "accounts:signUp" => {
            if state.users.contains_key(&body.email) {
                return api_error(StatusCode::BAD_REQUEST, "EMAIL_EXISTS");
            }
            let uid = format!("uid{}", state.users.len() + 1);
            state
                .users
                .insert(body.email.clone(), (uid.clone(), body.password));
            Json(session_body(&uid, Some(&body.email), 0)).into_response()
        }
        "accounts:signInWithPassword" => match state.users.get(&body.email) {
            Some((uid, password)) if *password == body.password => {
                Json(session_body(uid, Some(&body.email), 0)).into_response()
            }
            _ => api_error(StatusCode::BAD_REQUEST, "INVALID_LOGIN_CREDENTIALS"),
        },
        _ => api_error(StatusCode::NOT_FOUND, "unknown operation"),
    }
}

#[derive(Deserialize)]
struct RefreshForm {
    grant_type: String,
    refresh_token: String,
}

async fn refresh_token(State(state): State<SharedState>, Form(form): Form<RefreshForm>) -> Response {
    let Some(uid) = form
        .refresh_token
        .strip_prefix("refresh-")
        .filter(|_| form.grant_type == "refresh_token")
    else {
        return api_error(StatusCode::BAD_REQUEST, "INVALID_REFRESH_TOKEN");
    };

    let mut state = lock(&state);
    state.refreshes += 1;
    Json(json!({
        "id_token": format!("token-{uid}-{}", state.refreshes),
        "refresh_token": form.refresh_token,
        "expires_in": TOKEN_LIFETIME,
        "user_id": uid,
    }))
    .into_response()
}

// =============================================================================
// Firestore
// =============================================================================

/// Split `projects/p/databases/d/documents/{collection}/{id}`.
fn collection_and_id(name: &str) -> Option<(String, String)> {
    let (_, path) = name.split_once("/documents/")?;
    let (collection, id) = path.rsplit_once('/')?;
    Some((collection.to_owned(), id.to_owned()))
}

async fn firestore_method(
    State(state): State<SharedState>,
    Path((project, database, method)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let root = format!("projects/{project}/databases/{database}/documents");
    match method.as_str() {
        "documents:commit" => commit(&state, &headers, &body),
        "documents:runQuery" => run_query(&state, &root, &body),
        _ => api_error(StatusCode::NOT_FOUND, "unknown method"),
    }
}

fn commit(state: &SharedState, headers: &HeaderMap, body: &Value) -> Response {
    let mut state = lock(state);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    state.commit_auth.push(authorization);

    if state.fail_commits {
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE");
    }

    let writes = body["writes"].as_array().cloned().unwrap_or_default();
    for write in &writes {
        let Some((collection, id)) = write["update"]["name"]
            .as_str()
            .and_then(collection_and_id)
        else {
            return api_error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT: bad document name");
        };

        let mut fields = write["update"]["fields"]
            .as_object()
            .cloned()
            .unwrap_or_default();
        for transform in write["updateTransforms"].as_array().into_iter().flatten() {
            if let Some(path) = transform["fieldPath"].as_str() {
                fields.insert(path.to_owned(), json!({ "timestampValue": now() }));
            }
        }

        let docs = state.documents.entry(collection).or_default();
        let must_not_exist = write["currentDocument"]["exists"] == json!(false);
        if must_not_exist && docs.contains_key(&id) {
            return api_error(StatusCode::CONFLICT, "ALREADY_EXISTS: Document already exists");
        }
        docs.insert(id, fields);
    }

    Json(json!({
        "writeResults": writes.iter().map(|_| json!({ "updateTime": now() })).collect::<Vec<_>>(),
        "commitTime": now(),
    }))
    .into_response()
}

/// Sort key of a typed value: the JSON text of its payload.
fn sort_key(value: &Value) -> String {
    value
        .as_object()
        .and_then(|o| o.values().next())
        .map(|inner| inner.as_str().map_or_else(|| inner.to_string(), str::to_owned))
        .unwrap_or_default()
}

fn run_query(state: &SharedState, root: &str, body: &Value) -> Response {
    let query = &body["structuredQuery"];
    let Some(collection) = query["from"][0]["collectionId"].as_str() else {
        return api_error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT: missing from");
    };
    let filter = &query["where"]["fieldFilter"];
    let filter_field = filter["field"]["fieldPath"].as_str();
    let order = &query["orderBy"][0];
    let order_field = order["field"]["fieldPath"].as_str();
    let descending = order["direction"] == json!("DESCENDING");

    let state = lock(state);
    let mut matches: Vec<(&String, &Map<String, Value>)> = state
        .documents
        .get(collection)
        .map(|docs| {
            docs.iter()
                .filter(|(_, fields)| {
                    filter_field.is_none_or(|f| fields.get(f) == Some(&filter["value"]))
                })
                .filter(|(_, fields)| order_field.is_none_or(|f| fields.contains_key(f)))
                .collect()
        })
        .unwrap_or_default();

    if let Some(field) = order_field {
        matches.sort_by_key(|(_, fields)| fields.get(field).map(sort_key));
        if descending {
            matches.reverse();
        }
    }

    let read_time = now();
    if matches.is_empty() {
        return Json(json!([{ "readTime": read_time }])).into_response();
    }
    let results: Vec<Value> = matches
        .into_iter()
        .map(|(id, fields)| {
            json!({
                "document": {
                    "name": format!("{root}/{collection}/{id}"),
                    "fields": fields,
                    "createTime": read_time,
                    "updateTime": read_time,
                },
                "readTime": read_time,
            })
        })
        .collect();
    Json(results).into_response()
}

// =============================================================================
// Storage
// =============================================================================

async fn upload(
    State(state): State<SharedState>,
    Path(bucket): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(name) = params.get("name") else {
        return api_error(StatusCode::BAD_REQUEST, "missing object name");
    };
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let size = body.len();
    lock(&state)
        .blobs
        .insert(name.clone(), (content_type.clone(), body.to_vec()));

    Json(json!({
        "name": name,
        "bucket": bucket,
        "contentType": content_type,
        "size": size.to_string(),
        "downloadTokens": "tok-1,tok-2",
    }))
    .into_response()
}
