//! In-memory stand-in for the sandbox REST API.
//!
//! Serves both URL layouts at once: the `api.py` routes at the root and the
//! Django web-interface routes under `/api` with a trailing slash. Each
//! front end only exposes the endpoints the real one does, so a client
//! configured for the wrong flavor gets 404s.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, sync::RwLock};

/// Size of the synthetic artifacts served for screenshots, pcaps and dumps.
pub const ARTIFACT_LEN: usize = 2600;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    Script,
    Web,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub category: String,
    pub target: String,
    pub status: String,
    pub sha256: Option<String>,
    pub options: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Machine {
    pub name: String,
    pub label: String,
    pub platform: String,
    pub locked: bool,
}

#[derive(Debug)]
pub struct MockState {
    tasks: BTreeMap<u64, Task>,
    samples: BTreeMap<String, Vec<u8>>,
    machines: Vec<Machine>,
    next_id: u64,
}

impl Default for MockState {
    fn default() -> Self {
        let machine = |name: &str, platform: &str| Machine {
            name: name.to_string(),
            label: name.to_string(),
            platform: platform.to_string(),
            locked: false,
        };
        Self {
            tasks: BTreeMap::new(),
            samples: BTreeMap::new(),
            machines: vec![machine("win7x64", "windows"), machine("ubuntu22", "linux")],
            next_id: 1,
        }
    }
}

impl MockState {
    pub fn task(&self, id: u64) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Override a task's status. A `running` task refuses deletion.
    pub fn set_status(&mut self, id: u64, status: &str) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) => {
                task.status = status.to_string();
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, category: &str, target: String, sha256: Option<String>, options: BTreeMap<String, String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(
            id,
            Task {
                id,
                category: category.to_string(),
                target,
                status: "pending".to_string(),
                sha256,
                options,
            },
        );
        id
    }

    fn sample_for_task(&self, id: u64) -> Option<&Vec<u8>> {
        let sha256 = self.tasks.get(&id)?.sha256.as_ref()?;
        self.samples.get(sha256)
    }
}

pub type Db = Arc<RwLock<MockState>>;

pub fn new_db() -> Db {
    Arc::new(RwLock::new(MockState::default()))
}

/// Deterministic bytes served for the `kind` artifact of a task.
pub fn artifact_bytes(kind: &str, task_id: u64) -> Vec<u8> {
    let header = format!("{kind}:{task_id}:");
    header
        .bytes()
        .chain((0..).map(|i: u32| (i % 251) as u8))
        .take(ARTIFACT_LEN)
        .collect()
}

pub fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

pub fn app() -> Router {
    app_with_state(new_db())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .merge(routes(Flavor::Script))
        .nest("/api", routes(Flavor::Web))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, new_db()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

fn routes(flavor: Flavor) -> Router<Db> {
    let path = |action: &str| match flavor {
        Flavor::Script => action.to_string(),
        Flavor::Web => format!("{action}/"),
    };

    let shared = Router::new()
        .route(&path("/cuckoo/status"), get(cuckoo_status))
        .route(&path("/machines/list"), get(list_machines))
        .route(&path("/machines/view/{name}"), get(view_machine))
        .route(&path("/tasks/list"), get(list_tasks))
        .route(&path("/tasks/list/{limit}"), get(list_tasks_limit))
        .route(&path("/tasks/list/{limit}/{offset}"), get(list_tasks_page))
        .route(&path("/tasks/view/{id}"), get(view_task))
        .route(&path("/tasks/delete/{id}"), get(delete_task))
        .route(
            &path("/tasks/create/file"),
            post(move |State(db): State<Db>, multipart: Multipart| create_file(flavor, db, multipart)),
        )
        .route(
            &path("/tasks/create/url"),
            post(move |State(db): State<Db>, multipart: Multipart| create_url(flavor, db, multipart)),
        )
        .route(&path("/files/view/{hash_type}/{hash}"), get(view_file));

    match flavor {
        Flavor::Script => shared
            .route("/tasks/report/{id}/{format}", get(task_report))
            .route("/tasks/screenshots/{id}", get(screenshots))
            .route("/tasks/screenshots/{id}/{number}", get(screenshot))
            .route("/files/get/{hash}", get(sample_by_sha256))
            .route("/pcap/get/{id}", get(|db: State<Db>, id: Path<u64>| artifact("pcap", db, id))),
        Flavor::Web => shared
            .route("/tasks/status/{id}/", get(task_status))
            .route("/tasks/get/iocs/{id}/", get(|db: State<Db>, id: Path<u64>| task_iocs(false, db, id)))
            .route(
                "/tasks/get/iocs/{id}/detailed/",
                get(|db: State<Db>, id: Path<u64>| task_iocs(true, db, id)),
            )
            .route("/tasks/get/report/{id}/{format}/", get(task_report))
            .route("/tasks/get/screenshot/{id}/", get(screenshots))
            .route("/tasks/get/screenshot/{id}/{number}/", get(screenshot))
            .route("/files/get/{key_type}/{key}/", get(sample_by_key))
            .route("/tasks/get/pcap/{id}/", get(|db: State<Db>, id: Path<u64>| artifact("pcap", db, id)))
            .route(
                "/tasks/get/dropped/{id}/",
                get(|db: State<Db>, id: Path<u64>| artifact("dropped", db, id)),
            )
            .route(
                "/tasks/get/surifile/{id}/",
                get(|db: State<Db>, id: Path<u64>| artifact("surifile", db, id)),
            )
            .route(
                "/tasks/get/fullmemory/{id}/",
                get(|db: State<Db>, id: Path<u64>| artifact("fullmemory", db, id)),
            )
            .route(
                "/tasks/get/procmemory/{id}/",
                get(|db: State<Db>, id: Path<u64>| artifact("procmemory", db, id)),
            )
            .route("/tasks/get/procmemory/{id}/{pid}/", get(process_memory)),
    }
}

async fn cuckoo_status(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    let pending = state.tasks.values().filter(|t| t.status == "pending").count();
    Json(json!({
        "version": "mock",
        "hostname": "mock-server",
        "machines": { "total": state.machines.len(), "available": state.machines.len() },
        "tasks": { "total": state.tasks.len(), "pending": pending },
    }))
}

async fn list_machines(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    Json(json!({ "machines": state.machines }))
}

async fn view_machine(State(db): State<Db>, Path(name): Path<String>) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    let machine = state
        .machines
        .iter()
        .find(|m| m.name == name)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "machine": machine })))
}

async fn list_tasks(State(db): State<Db>) -> Json<Value> {
    task_page(&db, None, 0).await
}

async fn list_tasks_limit(State(db): State<Db>, Path(limit): Path<usize>) -> Json<Value> {
    task_page(&db, Some(limit), 0).await
}

async fn list_tasks_page(State(db): State<Db>, Path((limit, offset)): Path<(usize, usize)>) -> Json<Value> {
    task_page(&db, Some(limit), offset).await
}

async fn task_page(db: &Db, limit: Option<usize>, offset: usize) -> Json<Value> {
    let state = db.read().await;
    let tasks: Vec<&Task> = state
        .tasks
        .values()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    Json(json!({ "tasks": tasks }))
}

async fn view_task(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    let task = state.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "task": task })))
}

async fn task_status(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    let task = state.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "error": false, "data": task.status })))
}

async fn task_iocs(detailed: bool, State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    let task = state.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({
        "error": false,
        "data": { "info": { "id": task.id, "category": task.category }, "detailed": detailed },
    })))
}

async fn task_report(
    State(db): State<Db>,
    Path((id, format)): Path<(u64, String)>,
) -> Result<Json<Value>, StatusCode> {
    if format != "json" {
        return Err(StatusCode::BAD_REQUEST);
    }
    let state = db.read().await;
    let task = state.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({
        "info": { "id": task.id, "category": task.category },
        "target": { "category": task.category, "name": task.target },
    })))
}

async fn delete_task(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let task = state.task(id).ok_or(StatusCode::NOT_FOUND)?;
    if task.status == "running" {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    state.tasks.remove(&id);
    Ok(Json(json!({ "status": "OK" })))
}

fn submission_reply(flavor: Flavor, id: u64) -> Value {
    match flavor {
        Flavor::Script => json!({ "task_id": id }),
        Flavor::Web => json!({
            "error": false,
            "data": { "task_ids": [id], "message": format!("Task ID {id} has been submitted") },
            "url": [format!("http://mock-server/submit/status/{id}/")],
        }),
    }
}

async fn create_file(flavor: Flavor, db: Db, mut multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let mut sample = None;
    let mut options = BTreeMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("sample").to_string();
            let content = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            sample = Some((file_name, content.to_vec()));
        } else {
            let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            options.insert(name, value);
        }
    }
    let (file_name, content) = sample.ok_or(StatusCode::BAD_REQUEST)?;

    let sha256 = sha256_hex(&content);
    let mut state = db.write().await;
    state.samples.insert(sha256.clone(), content);
    let id = state.insert("file", file_name, Some(sha256), options);
    tracing::info!(task_id = id, "file submitted");
    Ok(Json(submission_reply(flavor, id)))
}

async fn create_url(flavor: Flavor, db: Db, mut multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let mut target = None;
    let mut options = BTreeMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        if name == "url" {
            target = Some(value);
        } else {
            options.insert(name, value);
        }
    }
    let target = target.ok_or(StatusCode::BAD_REQUEST)?;

    let id = db.write().await.insert("url", target, None, options);
    tracing::info!(task_id = id, "url submitted");
    Ok(Json(submission_reply(flavor, id)))
}

async fn view_file(
    State(db): State<Db>,
    Path((hash_type, hash)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    if hash_type != "sha256" {
        return Err(StatusCode::NOT_FOUND);
    }
    let state = db.read().await;
    let content = state.samples.get(&hash).ok_or(StatusCode::NOT_FOUND)?;
    let task_ids: Vec<u64> = state
        .tasks
        .values()
        .filter(|t| t.sha256.as_deref() == Some(hash.as_str()))
        .map(|t| t.id)
        .collect();
    Ok(Json(json!({
        "data": { "sha256": hash, "file_size": content.len(), "task_ids": task_ids },
    })))
}

async fn sample_by_sha256(State(db): State<Db>, Path(hash): Path<String>) -> Result<Vec<u8>, StatusCode> {
    db.read().await.samples.get(&hash).cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn sample_by_key(
    State(db): State<Db>,
    Path((key_type, key)): Path<(String, String)>,
) -> Result<Vec<u8>, StatusCode> {
    let state = db.read().await;
    let sample = match key_type.as_str() {
        "sha256" => state.samples.get(&key),
        "task" => key.parse().ok().and_then(|id| state.sample_for_task(id)),
        _ => None,
    };
    sample.cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn artifact(kind: &'static str, State(db): State<Db>, Path(id): Path<u64>) -> Result<Vec<u8>, StatusCode> {
    db.read().await.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(artifact_bytes(kind, id))
}

async fn screenshots(db: State<Db>, id: Path<u64>) -> Result<Vec<u8>, StatusCode> {
    artifact("screenshots", db, id).await
}

async fn screenshot(State(db): State<Db>, Path((id, number)): Path<(u64, u32)>) -> Result<Vec<u8>, StatusCode> {
    db.read().await.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(artifact_bytes(&format!("screenshot{number}"), id))
}

async fn process_memory(State(db): State<Db>, Path((id, pid)): Path<(u64, u32)>) -> Result<Vec<u8>, StatusCode> {
    db.read().await.task(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(artifact_bytes(&format!("procmemory{pid}"), id))
}
