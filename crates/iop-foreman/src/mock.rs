//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "In-process Katello model for exercising fixtures without a server."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! [`InMemoryKatello`] answers the routes the client emits and enforces the
//! referential rules that make fixture teardown order matter: a content-view
//! version still published to an environment cannot be deleted, a version
//! cannot leave an environment an activation key still points at, and a
//! parent cannot be deleted while children reference it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::client::METADATA_GENERATE_LABEL;
use crate::error::{ApiError, Result};
use crate::transport::{ApiRequest, ApiTransport, Method};

const KATELLO_PREFIX: &str = "/katello/api/";
const TASKS_PATH: &str = "/foreman_tasks/api/tasks";
const SYNC_LABEL: &str = "Actions::Katello::Repository::Sync";
const PUBLISH_LABEL: &str = "Actions::Katello::ContentView::Publish";
const REMOVE_LABEL: &str = "Actions::Katello::ContentView::RemoveFromEnvironment";
const DESTROY_LABEL: &str = "Actions::Katello::Destroy";

const COLLECTIONS: &[&str] = &[
    "organizations",
    "products",
    "repositories",
    "environments",
    "content_views",
    "content_view_versions",
    "activation_keys",
];

/// Query parameters that never filter records.
const NON_FILTER_PARAMS: &[&str] = &["search", "per_page", "page", "full_result"];

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    records: BTreeMap<&'static str, BTreeMap<u64, Value>>,
    tasks: Vec<Value>,
    calls: Vec<String>,
}

/// Shared in-memory Katello; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKatello {
    state: Arc<Mutex<State>>,
}

fn status(request: &ApiRequest, status: u16, message: impl Into<String>) -> ApiError {
    ApiError::Status {
        method: request.method.as_str(),
        path: request.path.clone(),
        status,
        body: json!({ "displayMessage": message.into() }).to_string(),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn id_field(record: &Value, key: &str) -> Option<u64> {
    record.get(key).and_then(Value::as_u64)
}

fn parse_search(search: &str) -> Option<(String, String)> {
    let (key, value) = search.split_once('=')?;
    let value = value.trim().trim_matches('"').trim_matches('\'');
    Some((key.trim().to_owned(), value.to_owned()))
}

impl InMemoryKatello {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received, as `"<METHOD> <path>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of records in a collection (`"organizations"`, `"environments"`, ...).
    pub fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .records
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .records
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Records across every collection except Library environments.
    pub fn residue(&self) -> usize {
        let state = self.state.lock();
        state
            .records
            .iter()
            .map(|(collection, records)| {
                records
                    .values()
                    .filter(|record| {
                        !(*collection == "environments"
                            && record.get("library") == Some(&Value::Bool(true)))
                    })
                    .count()
            })
            .sum()
    }

    pub fn task_labels(&self) -> Vec<String> {
        self.state
            .lock()
            .tasks
            .iter()
            .filter_map(|task| task.get("label").and_then(Value::as_str).map(str::to_owned))
            .collect()
    }
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn collection(&mut self, name: &'static str) -> &mut BTreeMap<u64, Value> {
        self.records.entry(name).or_default()
    }

    fn get(&self, collection: &str, id: u64) -> Option<&Value> {
        self.records.get(collection).and_then(|records| records.get(&id))
    }

    fn any(&self, collection: &str, predicate: impl Fn(&Value) -> bool) -> bool {
        self.records
            .get(collection)
            .map_or(false, |records| records.values().any(|r| predicate(r)))
    }

    fn task(&mut self, label: &str) -> Value {
        let task = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "label": label,
            "state": "stopped",
            "result": "success",
        });
        self.tasks.push(task.clone());
        task
    }

    fn version_environment_ids(version: &Value) -> Vec<u64> {
        version
            .get("environments")
            .and_then(Value::as_array)
            .map(|envs| envs.iter().filter_map(|env| id_field(env, "id")).collect())
            .unwrap_or_default()
    }

    fn library_of(&self, organization_id: u64) -> Option<Value> {
        self.records.get("environments").and_then(|envs| {
            envs.values()
                .find(|env| {
                    id_field(env, "organization_id") == Some(organization_id)
                        && env.get("library") == Some(&Value::Bool(true))
                })
                .cloned()
        })
    }
}

fn collection_name(segment: &str) -> Option<&'static str> {
    COLLECTIONS.iter().copied().find(|name| *name == segment)
}

fn require_parent(
    state: &State,
    request: &ApiRequest,
    body: &Map<String, Value>,
    field: &str,
    collection: &str,
) -> Result<u64> {
    let id = body
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| status(request, 422, format!("{} is required", field)))?;
    if state.get(collection, id).is_none() {
        return Err(status(request, 404, format!("{} {} not found", collection, id)));
    }
    Ok(id)
}

impl ApiTransport for InMemoryKatello {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        let mut state = self.state.lock();
        state
            .calls
            .push(format!("{} {}", request.method.as_str(), request.path));

        if let Some(rest) = request.path.strip_prefix(TASKS_PATH) {
            return handle_tasks(&state, request, rest.trim_start_matches('/'));
        }
        let rest = request
            .path
            .strip_prefix(KATELLO_PREFIX)
            .ok_or_else(|| status(request, 404, "route not found"))?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let collection = segments
            .first()
            .and_then(|segment| collection_name(segment))
            .ok_or_else(|| status(request, 404, "route not found"))?;
        let id = match segments.get(1) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| status(request, 404, "route not found"))?,
            ),
            None => None,
        };

        match (request.method, id, &segments[2.min(segments.len())..]) {
            (Method::Get, None, []) => Ok(index(&state, request, collection)),
            (Method::Post, None, []) => create(&mut state, request, collection),
            (Method::Get, Some(id), []) => state
                .get(collection, id)
                .cloned()
                .ok_or_else(|| status(request, 404, "not found")),
            (Method::Put, Some(id), []) => update(&mut state, request, collection, id),
            (Method::Delete, Some(id), []) => destroy(&mut state, request, collection, id),
            (Method::Post, Some(id), ["sync"]) if collection == "repositories" => {
                if state.get(collection, id).is_none() {
                    return Err(status(request, 404, "not found"));
                }
                Ok(state.task(SYNC_LABEL))
            }
            (Method::Post, Some(id), ["publish"]) if collection == "content_views" => {
                publish(&mut state, request, id)
            }
            (Method::Delete, Some(id), ["environments", env])
                if collection == "content_views" =>
            {
                let env = env
                    .parse::<u64>()
                    .map_err(|_| status(request, 404, "route not found"))?;
                remove_from_environment(&mut state, request, id, env)
            }
            _ => Err(status(request, 404, "route not found")),
        }
    }
}

fn handle_tasks(state: &State, request: &ApiRequest, rest: &str) -> Result<Value> {
    if request.method != Method::Get {
        return Err(status(request, 405, "tasks are read-only"));
    }
    if rest.is_empty() {
        let filter = request.query_value("search").and_then(parse_search);
        let results: Vec<Value> = state
            .tasks
            .iter()
            .filter(|task| match &filter {
                Some((key, value)) => task.get(key).map(text).as_deref() == Some(value.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        return Ok(json!({ "total": results.len(), "results": results }));
    }
    state
        .tasks
        .iter()
        .find(|task| task.get("id").and_then(Value::as_str) == Some(rest))
        .cloned()
        .ok_or_else(|| status(request, 404, "task not found"))
}

fn index(state: &State, request: &ApiRequest, collection: &str) -> Value {
    let filter = request.query_value("search").and_then(parse_search);
    let results: Vec<Value> = state
        .records
        .get(collection)
        .map(|records| {
            records
                .values()
                .filter(|record| {
                    request
                        .query
                        .iter()
                        .filter(|(key, _)| !NON_FILTER_PARAMS.contains(&key.as_str()))
                        .all(|(key, value)| {
                            record.get(key).map(text).as_deref() == Some(value.as_str())
                        })
                })
                .filter(|record| match &filter {
                    Some((key, value)) => {
                        record.get(key).map(text).as_deref() == Some(value.as_str())
                    }
                    None => true,
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    json!({ "total": results.len(), "subtotal": results.len(), "results": results })
}

fn body_of(request: &ApiRequest, collection: &str) -> Map<String, Value> {
    let body = match &request.body {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if collection == "organizations" {
        if let Some(Value::Object(inner)) = body.get("organization") {
            return inner.clone();
        }
    }
    body
}

fn create(state: &mut State, request: &ApiRequest, collection: &'static str) -> Result<Value> {
    let mut body = body_of(request, collection);
    if !body.get("name").map_or(false, Value::is_string) {
        return Err(status(request, 422, "Name can't be blank"));
    }
    match collection {
        "organizations" => {}
        "products" | "content_views" | "activation_keys" => {
            require_parent(state, request, &body, "organization_id", "organizations")?;
        }
        "repositories" => {
            require_parent(state, request, &body, "product_id", "products")?;
        }
        "environments" => {
            require_parent(state, request, &body, "organization_id", "organizations")?;
            require_parent(state, request, &body, "prior_id", "environments")?;
            body.insert("library".to_owned(), Value::Bool(false));
        }
        _ => return Err(status(request, 405, "cannot create this resource")),
    }

    let id = state.allocate();
    body.insert("id".to_owned(), Value::from(id));
    match collection {
        "content_views" => {
            body.entry("repository_ids").or_insert_with(|| json!([]));
        }
        "activation_keys" => {
            body.entry("environment_id").or_insert(Value::Null);
            body.entry("content_view_id").or_insert(Value::Null);
        }
        _ => {}
    }
    let record = Value::Object(body);
    state.collection(collection).insert(id, record.clone());

    match collection {
        "organizations" => {
            let library_id = state.allocate();
            let library = json!({
                "id": library_id,
                "name": "Library",
                "organization_id": id,
                "library": true,
                "prior_id": null,
            });
            state.collection("environments").insert(library_id, library);
        }
        "repositories" => {
            state.task(METADATA_GENERATE_LABEL);
        }
        _ => {}
    }
    Ok(record)
}

fn update(state: &mut State, request: &ApiRequest, collection: &'static str, id: u64) -> Result<Value> {
    let body = body_of(request, collection);
    let record = state
        .collection(collection)
        .get_mut(&id)
        .ok_or_else(|| status(request, 404, "not found"))?;
    if let Value::Object(fields) = record {
        for (key, value) in body {
            if key != "id" {
                fields.insert(key, value);
            }
        }
    }
    Ok(record.clone())
}

fn destroy(state: &mut State, request: &ApiRequest, collection: &'static str, id: u64) -> Result<Value> {
    let record = state
        .get(collection, id)
        .cloned()
        .ok_or_else(|| status(request, 404, "not found"))?;
    let owned_by = |field: &'static str| move |r: &Value| id_field(r, field) == Some(id);

    let blocker = match collection {
        "organizations" => ["products", "content_views", "activation_keys"]
            .iter()
            .find(|child| state.any(child, owned_by("organization_id")))
            .map(|child| format!("organization still has {}", child))
            .or_else(|| {
                state
                    .any("environments", |env| {
                        id_field(env, "organization_id") == Some(id)
                            && env.get("library") != Some(&Value::Bool(true))
                    })
                    .then(|| "organization still has lifecycle environments".to_owned())
            }),
        "products" => state
            .any("repositories", owned_by("product_id"))
            .then(|| "product still has repositories".to_owned()),
        "environments" => {
            if record.get("library") == Some(&Value::Bool(true)) {
                Some("the Library environment cannot be deleted".to_owned())
            } else if state.any("content_view_versions", |v| {
                State::version_environment_ids(v).contains(&id)
            }) {
                Some("environment still has content view versions".to_owned())
            } else if state.any("activation_keys", owned_by("environment_id")) {
                Some("environment is used by activation keys".to_owned())
            } else {
                None
            }
        }
        "content_views" => {
            if state.any("content_view_versions", |v| {
                id_field(v, "content_view_id") == Some(id)
                    && !State::version_environment_ids(v).is_empty()
            }) {
                Some("content view has versions in environments".to_owned())
            } else if state.any("activation_keys", owned_by("content_view_id")) {
                Some("content view is used by activation keys".to_owned())
            } else {
                None
            }
        }
        "content_view_versions" => (!State::version_environment_ids(&record).is_empty())
            .then(|| "version is still published to environments".to_owned()),
        _ => None,
    };
    if let Some(message) = blocker {
        return Err(status(request, 422, message));
    }

    state.collection(collection).remove(&id);
    match collection {
        "organizations" => {
            state
                .collection("environments")
                .retain(|_, env| id_field(env, "organization_id") != Some(id));
        }
        "repositories" => {
            for cv in state.collection("content_views").values_mut() {
                if let Some(Value::Array(ids)) = cv.get_mut("repository_ids") {
                    ids.retain(|repo| repo.as_u64() != Some(id));
                }
            }
        }
        "content_views" => {
            state
                .collection("content_view_versions")
                .retain(|_, v| id_field(v, "content_view_id") != Some(id));
        }
        _ => {}
    }

    match collection {
        "organizations" | "content_view_versions" | "repositories" => Ok(state.task(DESTROY_LABEL)),
        _ => Ok(record),
    }
}

fn publish(state: &mut State, request: &ApiRequest, cv_id: u64) -> Result<Value> {
    let cv = state
        .get("content_views", cv_id)
        .cloned()
        .ok_or_else(|| status(request, 404, "not found"))?;
    let org_id = id_field(&cv, "organization_id")
        .ok_or_else(|| status(request, 422, "content view has no organization"))?;
    let library = state
        .library_of(org_id)
        .ok_or_else(|| status(request, 422, "organization has no Library"))?;
    let published = state.any("content_view_versions", |v| {
        id_field(v, "content_view_id") == Some(cv_id)
    });
    let number = state
        .records
        .get("content_view_versions")
        .map_or(0, |versions| {
            versions
                .values()
                .filter(|v| id_field(v, "content_view_id") == Some(cv_id))
                .count()
        })
        + 1;

    // A new version takes over Library from the previous one.
    if published {
        for version in state.collection("content_view_versions").values_mut() {
            if id_field(version, "content_view_id") == Some(cv_id) {
                if let Some(Value::Array(envs)) = version.get_mut("environments") {
                    envs.retain(|env| id_field(env, "id") != id_field(&library, "id"));
                }
            }
        }
    }

    let library_id = library["id"].clone();
    let id = state.allocate();
    let version = json!({
        "id": id,
        "content_view_id": cv_id,
        "version": format!("{}.0", number),
        "environments": [{ "id": library_id, "name": "Library" }],
    });
    state.collection("content_view_versions").insert(id, version);
    Ok(state.task(PUBLISH_LABEL))
}

fn remove_from_environment(
    state: &mut State,
    request: &ApiRequest,
    cv_id: u64,
    env_id: u64,
) -> Result<Value> {
    if state.get("content_views", cv_id).is_none() {
        return Err(status(request, 404, "not found"));
    }
    let in_use = state.any("activation_keys", |key| {
        id_field(key, "content_view_id") == Some(cv_id)
            && id_field(key, "environment_id") == Some(env_id)
    });
    if in_use {
        return Err(status(
            request,
            422,
            "activation keys still use this content view in the environment",
        ));
    }
    let mut removed = false;
    for version in state.collection("content_view_versions").values_mut() {
        if id_field(version, "content_view_id") != Some(cv_id) {
            continue;
        }
        if let Some(Value::Array(envs)) = version.get_mut("environments") {
            let before = envs.len();
            envs.retain(|env| id_field(env, "id") != Some(env_id));
            removed |= envs.len() != before;
        }
    }
    if !removed {
        return Err(status(request, 422, "content view is not in that environment"));
    }
    Ok(state.task(REMOVE_LABEL))
}
