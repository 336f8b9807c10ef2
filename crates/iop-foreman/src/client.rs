//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Foreman/Katello resource client with task polling."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use iop_common::ApiConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::transport::{ApiRequest, ApiTransport, HttpSettings, HttpTransport, Method};

/// Label of the task Katello runs after a repository is created or changed.
pub const METADATA_GENERATE_LABEL: &str = "Actions::Katello::Repository::MetadataGenerate";

/// Page size that returns every record in one response.
const FULL_RESULT_PER_PAGE: u64 = 2 << 31;

/// Task states after which a task no longer changes.
const SETTLED_TASK_STATES: &[&str] = &["stopped", "paused"];

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
struct Route {
    method: Method,
    template: &'static str,
}

const fn route(method: Method, template: &'static str) -> Route {
    Route { method, template }
}

/// Where a resource lives and which custom actions it supports.
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    name: &'static str,
    collection: &'static str,
    /// Key the create/update body is nested under, for controllers that expect it.
    wrap: Option<&'static str>,
    actions: &'static [(&'static str, Route)],
}

const RESOURCES: &[Resource] = &[
    Resource {
        name: "organizations",
        collection: "/katello/api/organizations",
        wrap: Some("organization"),
        actions: &[],
    },
    Resource {
        name: "products",
        collection: "/katello/api/products",
        wrap: None,
        actions: &[],
    },
    Resource {
        name: "repositories",
        collection: "/katello/api/repositories",
        wrap: None,
        actions: &[(
            "sync",
            route(Method::Post, "/katello/api/repositories/:id/sync"),
        )],
    },
    Resource {
        name: "lifecycle_environments",
        collection: "/katello/api/environments",
        wrap: None,
        actions: &[],
    },
    Resource {
        name: "content_views",
        collection: "/katello/api/content_views",
        wrap: None,
        actions: &[
            (
                "publish",
                route(Method::Post, "/katello/api/content_views/:id/publish"),
            ),
            (
                "remove_from_environment",
                route(
                    Method::Delete,
                    "/katello/api/content_views/:id/environments/:environment_id",
                ),
            ),
        ],
    },
    Resource {
        name: "content_view_versions",
        collection: "/katello/api/content_view_versions",
        wrap: None,
        actions: &[],
    },
    Resource {
        name: "activation_keys",
        collection: "/katello/api/activation_keys",
        wrap: None,
        actions: &[],
    },
    Resource {
        name: "foreman_tasks",
        collection: "/foreman_tasks/api/tasks",
        wrap: None,
        actions: &[],
    },
];

impl Resource {
    pub fn lookup(name: &str) -> Result<&'static Resource> {
        RESOURCES
            .iter()
            .find(|resource| resource.name == name)
            .ok_or_else(|| ApiError::UnknownResource(name.to_owned()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    fn route(&self, action: &str) -> Result<(Method, String)> {
        let member = format!("{}/:id", self.collection);
        match action {
            "index" => Ok((Method::Get, self.collection.to_owned())),
            "create" => Ok((Method::Post, self.collection.to_owned())),
            "show" => Ok((Method::Get, member)),
            "update" => Ok((Method::Put, member)),
            "destroy" => Ok((Method::Delete, member)),
            custom => self
                .actions
                .iter()
                .find(|(name, _)| *name == custom)
                .map(|(_, route)| (route.method, route.template.to_owned()))
                .ok_or_else(|| ApiError::UnknownAction {
                    resource: self.name.to_owned(),
                    action: custom.to_owned(),
                }),
        }
    }

    /// Route `action` with `params`, filling path placeholders and placing the
    /// remaining parameters in the query string or body.
    pub fn request(&self, action: &str, params: &Map<String, Value>) -> Result<ApiRequest> {
        let (method, template) = self.route(action)?;

        let mut remaining = params.clone();
        let mut segments = Vec::new();
        for segment in template.split('/') {
            match segment.strip_prefix(':') {
                Some(key) => {
                    let value = remaining.remove(key).ok_or_else(|| ApiError::MissingField {
                        resource: self.name.to_owned(),
                        field: key.to_owned(),
                    })?;
                    segments.push(scalar_to_string(&value));
                }
                None => segments.push(segment.to_owned()),
            }
        }
        let path = segments.join("/");

        let (query, body) = match method {
            Method::Get | Method::Delete => (
                remaining
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect(),
                None,
            ),
            Method::Post | Method::Put => {
                let body = match (self.wrap, action) {
                    (Some(key), "create") | (Some(key), "update") => {
                        let mut wrapped = Map::new();
                        wrapped.insert(key.to_owned(), Value::Object(remaining));
                        Value::Object(wrapped)
                    }
                    _ => Value::Object(remaining),
                };
                (Vec::new(), Some(body))
            }
        };

        Ok(ApiRequest {
            method,
            path,
            query,
            body,
        })
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Identifier of an entity returned by the API.
pub fn id_of(resource: &str, entity: &Value) -> Result<Value> {
    match entity.get("id") {
        Some(id) if id.is_number() || id.is_string() => Ok(id.clone()),
        _ => Err(ApiError::MissingField {
            resource: resource.to_owned(),
            field: "id".to_owned(),
        }),
    }
}

fn as_object(resource: &str, params: Value) -> Result<Map<String, Value>> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ApiError::MissingField {
            resource: resource.to_owned(),
            field: "<object parameters>".to_owned(),
        }),
    }
}

/// An asynchronous foreman-tasks task.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub state: String,
    #[serde(default)]
    pub result: Option<String>,
}

impl Task {
    pub fn is_settled(&self) -> bool {
        SETTLED_TASK_STATES.contains(&self.state.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.result.as_deref() == Some("error")
    }

    /// Whether an API response body describes a task rather than an entity.
    pub fn looks_like_task(value: &Value) -> bool {
        value.get("id").map_or(false, Value::is_string)
            && value.get("state").map_or(false, Value::is_string)
            && value.get("label").is_some()
    }
}

/// Client for the Foreman/Katello v2 API.
pub struct ForemanApi {
    transport: Box<dyn ApiTransport>,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl fmt::Debug for ForemanApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForemanApi")
            .field("poll_interval", &self.poll_interval)
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

impl ForemanApi {
    pub fn new(transport: impl ApiTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            poll_interval: Duration::from_secs(4),
            task_timeout: Duration::from_secs(3600),
        }
    }

    /// Client sending requests to `base_uri` while presenting `fqdn` as the virtual host.
    pub fn connect(config: &ApiConfig, base_uri: &str, fqdn: &str) -> Result<Self> {
        let transport = HttpTransport::new(&HttpSettings {
            base_uri: base_uri.to_owned(),
            host_header: Some(fqdn.to_owned()),
            username: config.username.clone(),
            password: config.password.clone(),
            verify_tls: config.verify_tls,
            timeout: HTTP_TIMEOUT,
        })?;
        info!(base_uri, fqdn, user = %config.username, "management API client ready");
        Ok(Self::new(transport).with_polling(config.poll_interval, config.task_timeout))
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.task_timeout = timeout;
        self
    }

    pub fn call(&self, resource: &str, action: &str, params: Value) -> Result<Value> {
        let resource_def = Resource::lookup(resource)?;
        let request = resource_def.request(action, &as_object(resource, params)?)?;
        debug!(resource, action, method = %request.method, path = %request.path, "api request");
        self.transport.send(&request)
    }

    pub fn create(&self, resource: &str, params: Value) -> Result<Value> {
        self.call(resource, "create", params)
    }

    /// Every record of `resource` matching `search`, unpaginated.
    pub fn list(&self, resource: &str, search: Option<&str>, params: Value) -> Result<Vec<Value>> {
        let mut params = as_object(resource, params)?;
        if let Some(search) = search {
            params.insert("search".to_owned(), Value::from(search));
        }
        params.insert("per_page".to_owned(), Value::from(FULL_RESULT_PER_PAGE));
        let response = self.call(resource, "index", Value::Object(params))?;
        match response.get("results") {
            Some(Value::Array(results)) => Ok(results.clone()),
            _ => Err(ApiError::MissingField {
                resource: resource.to_owned(),
                field: "results".to_owned(),
            }),
        }
    }

    pub fn show(&self, resource: &str, id: &Value) -> Result<Value> {
        let mut params = Map::new();
        params.insert("id".to_owned(), id.clone());
        self.call(resource, "show", Value::Object(params))
    }

    /// Update the entity identified by `params["id"]`.
    pub fn update(&self, resource: &str, params: Value) -> Result<Value> {
        if params.get("id").is_none() {
            return Err(ApiError::MissingField {
                resource: resource.to_owned(),
                field: "id".to_owned(),
            });
        }
        self.call(resource, "update", params)
    }

    pub fn delete(&self, resource: &str, entity: &Value) -> Result<Value> {
        let mut params = Map::new();
        params.insert("id".to_owned(), id_of(resource, entity)?);
        let response = self.call(resource, "destroy", Value::Object(params))?;
        self.settle_if_task(response)
    }

    /// Run a custom action, waiting for the task it starts when it starts one.
    pub fn resource_action(&self, resource: &str, action: &str, params: Value) -> Result<Value> {
        let response = self.call(resource, action, params)?;
        self.settle_if_task(response)
    }

    fn settle_if_task(&self, response: Value) -> Result<Value> {
        if !Task::looks_like_task(&response) {
            return Ok(response);
        }
        let task = self.wait_for_task(&response)?;
        if task.is_error() {
            return Err(ApiError::TaskFailed {
                id: task.id,
                label: task.label.unwrap_or_default(),
                result: task.result.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    /// Poll a task until it stops or pauses.
    pub fn wait_for_task(&self, task: &Value) -> Result<Task> {
        let id = id_of("foreman_tasks", task)?;
        let started = Instant::now();
        loop {
            let current: Task = serde_json::from_value(self.show("foreman_tasks", &id)?)
                .map_err(|source| ApiError::Decode {
                    path: format!("foreman_tasks/{}", scalar_to_string(&id)),
                    source,
                })?;
            if current.is_settled() {
                if current.is_error() {
                    warn!(task = %current.id, label = ?current.label, "task finished with errors");
                } else {
                    debug!(task = %current.id, state = %current.state, "task settled");
                }
                return Ok(current);
            }
            let waited = started.elapsed();
            if waited >= self.task_timeout {
                return Err(ApiError::TaskTimeout {
                    id: current.id,
                    state: current.state,
                    waited,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Wait for every task matching `search`.
    pub fn wait_for_tasks(&self, search: Option<&str>) -> Result<Vec<Task>> {
        let tasks = self.list("foreman_tasks", search, Value::Null)?;
        tasks.iter().map(|task| self.wait_for_task(task)).collect()
    }

    pub fn wait_for_metadata_generate(&self) -> Result<Vec<Task>> {
        let search = format!("label = {}", METADATA_GENERATE_LABEL);
        self.wait_for_tasks(Some(&search))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn member_and_custom_routes_fill_placeholders() {
        let cv = Resource::lookup("content_views").unwrap();
        let request = cv
            .request(
                "remove_from_environment",
                &object(json!({"id": 3, "environment_id": 1})),
            )
            .unwrap();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "/katello/api/content_views/3/environments/1");
        assert!(request.query.is_empty());

        let update = cv
            .request("update", &object(json!({"id": 3, "repository_ids": [9]})))
            .unwrap();
        assert_eq!(update.path, "/katello/api/content_views/3");
        assert_eq!(update.body, Some(json!({"repository_ids": [9]})));
    }

    #[test]
    fn organizations_wrap_their_body() {
        let orgs = Resource::lookup("organizations").unwrap();
        let request = orgs.request("create", &object(json!({"name": "x"}))).unwrap();
        assert_eq!(request.path, "/katello/api/organizations");
        assert_eq!(request.body, Some(json!({"organization": {"name": "x"}})));
    }

    #[test]
    fn index_params_become_query() {
        let envs = Resource::lookup("lifecycle_environments").unwrap();
        let request = envs
            .request(
                "index",
                &object(json!({"search": "name=Library", "organization_id": 5, "skip": null})),
            )
            .unwrap();
        assert_eq!(request.path, "/katello/api/environments");
        assert_eq!(request.query_value("search"), Some("name=Library"));
        assert_eq!(request.query_value("organization_id"), Some("5"));
        assert_eq!(request.query_value("skip"), None);
    }

    #[test]
    fn unknown_resources_and_actions_are_errors() {
        assert!(matches!(
            Resource::lookup("hosts"),
            Err(ApiError::UnknownResource(_))
        ));
        let products = Resource::lookup("products").unwrap();
        assert!(matches!(
            products.request("sync", &Map::new()),
            Err(ApiError::UnknownAction { .. })
        ));
        assert!(matches!(
            products.request("show", &Map::new()),
            Err(ApiError::MissingField { .. })
        ));
    }

    #[test]
    fn task_detection() {
        assert!(Task::looks_like_task(
            &json!({"id": "1f0c", "state": "planned", "label": "Actions::Katello::Repository::Sync"})
        ));
        assert!(!Task::looks_like_task(&json!({"id": 4, "name": "org"})));
    }
}
