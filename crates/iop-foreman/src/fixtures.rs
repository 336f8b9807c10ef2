//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Self-cleaning Katello domain objects."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Each fixture creates one object under a fresh UUID name and returns a
//! guard that deletes it when dropped. Child fixtures borrow their parent
//! guard, so the compiler rejects any order in which a parent could be
//! deleted before its children. Teardown runs exactly once: either through
//! [`Scoped::release`], which reports errors, or on drop, which logs them.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{id_of, ForemanApi};
use crate::error::{ApiError, Result};

pub const YUM_FIXTURE_URL: &str = "https://fixtures.pulpproject.org/rpm-no-comps/";
pub const FILE_FIXTURE_URL: &str = "https://fixtures.pulpproject.org/file/";
pub const CONTAINER_FIXTURE_URL: &str = "https://quay.io/";
pub const CONTAINER_FIXTURE_UPSTREAM: &str = "foreman/busybox-test";

fn unique_name() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A created API object, deleted when the guard goes away.
#[must_use = "dropping the guard deletes the object immediately"]
pub struct Scoped<'p> {
    api: &'p ForemanApi,
    resource: &'static str,
    entity: Value,
    released: bool,
    _parents: PhantomData<&'p ()>,
}

impl fmt::Debug for Scoped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("resource", &self.resource)
            .field("id", &self.entity.get("id"))
            .field("released", &self.released)
            .finish()
    }
}

impl<'p> Scoped<'p> {
    fn new(api: &'p ForemanApi, resource: &'static str, entity: Value) -> Self {
        let scoped = Self {
            api,
            resource,
            entity,
            released: false,
            _parents: PhantomData,
        };
        let id = scoped.id();
        info!(resource, id = %id, "fixture created");
        scoped
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn entity(&self) -> &Value {
        &self.entity
    }

    pub fn id(&self) -> Value {
        self.entity.get("id").cloned().unwrap_or(Value::Null)
    }

    pub fn name(&self) -> Option<&str> {
        self.entity.get("name").and_then(Value::as_str)
    }

    /// Delete now and report the outcome.
    pub fn release(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.api.delete(self.resource, &self.entity)?;
        info!(resource = self.resource, id = %self.id(), "fixture deleted");
        Ok(())
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!(resource = self.resource, id = %self.id(), error = %err, "fixture teardown failed");
        }
    }
}

pub fn organization(api: &ForemanApi) -> Result<Scoped<'_>> {
    let entity = api.create("organizations", json!({ "name": unique_name() }))?;
    Ok(Scoped::new(api, "organizations", entity))
}

pub fn product<'p>(api: &'p ForemanApi, organization: &'p Scoped<'_>) -> Result<Scoped<'p>> {
    let entity = api.create(
        "products",
        json!({ "name": unique_name(), "organization_id": organization.id() }),
    )?;
    Ok(Scoped::new(api, "products", entity))
}

fn repository<'p>(
    api: &'p ForemanApi,
    product: &'p Scoped<'_>,
    mut params: Value,
) -> Result<Scoped<'p>> {
    if let Value::Object(fields) = &mut params {
        fields.insert("name".to_owned(), Value::from(unique_name()));
        fields.insert("product_id".to_owned(), product.id());
    }
    let entity = api.create("repositories", params)?;
    let guard = Scoped::new(api, "repositories", entity);
    api.wait_for_metadata_generate()?;
    Ok(guard)
}

pub fn yum_repository<'p>(api: &'p ForemanApi, product: &'p Scoped<'_>) -> Result<Scoped<'p>> {
    repository(
        api,
        product,
        json!({ "content_type": "yum", "url": YUM_FIXTURE_URL }),
    )
}

pub fn file_repository<'p>(api: &'p ForemanApi, product: &'p Scoped<'_>) -> Result<Scoped<'p>> {
    repository(
        api,
        product,
        json!({ "content_type": "file", "url": FILE_FIXTURE_URL }),
    )
}

pub fn container_repository<'p>(
    api: &'p ForemanApi,
    product: &'p Scoped<'_>,
) -> Result<Scoped<'p>> {
    repository(
        api,
        product,
        json!({
            "content_type": "docker",
            "url": CONTAINER_FIXTURE_URL,
            "docker_upstream_name": CONTAINER_FIXTURE_UPSTREAM,
        }),
    )
}

/// The organization's Library environment.
pub fn library(api: &ForemanApi, organization: &Scoped<'_>) -> Result<Value> {
    api.list(
        "lifecycle_environments",
        Some("name=Library"),
        json!({ "organization_id": organization.id() }),
    )?
    .into_iter()
    .next()
    .ok_or_else(|| ApiError::MissingField {
        resource: "lifecycle_environments".to_owned(),
        field: "Library".to_owned(),
    })
}

/// A lifecycle environment following Library.
pub fn lifecycle_environment<'p>(
    api: &'p ForemanApi,
    organization: &'p Scoped<'_>,
) -> Result<Scoped<'p>> {
    let library = library(api, organization)?;
    let entity = api.create(
        "lifecycle_environments",
        json!({
            "name": unique_name(),
            "organization_id": organization.id(),
            "prior_id": id_of("lifecycle_environments", &library)?,
        }),
    )?;
    Ok(Scoped::new(api, "lifecycle_environments", entity))
}

pub fn content_view<'p>(api: &'p ForemanApi, organization: &'p Scoped<'_>) -> Result<Scoped<'p>> {
    let entity = api.create(
        "content_views",
        json!({ "name": unique_name(), "organization_id": organization.id() }),
    )?;
    Ok(Scoped::new(api, "content_views", entity))
}

pub fn activation_key<'p>(
    api: &'p ForemanApi,
    organization: &'p Scoped<'_>,
) -> Result<Scoped<'p>> {
    let entity = api.create(
        "activation_keys",
        json!({ "name": unique_name(), "organization_id": organization.id() }),
    )?;
    Ok(Scoped::new(api, "activation_keys", entity))
}

/// Guards a client registration environment built from existing fixtures.
#[must_use = "dropping the guard tears the environment down immediately"]
pub struct ClientEnvironment<'p> {
    api: &'p ForemanApi,
    organization_id: Value,
    activation_key: Value,
    content_view_id: Value,
    released: bool,
}

impl fmt::Debug for ClientEnvironment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientEnvironment")
            .field("activation_key", &self.activation_key.get("id"))
            .field("content_view_id", &self.content_view_id)
            .field("released", &self.released)
            .finish()
    }
}

/// Sync `repository`, publish it through `content_view`, and point
/// `activation_key` at the result in Library.
pub fn client_environment<'p>(
    api: &'p ForemanApi,
    organization: &'p Scoped<'_>,
    activation_key: &'p Scoped<'_>,
    content_view: &'p Scoped<'_>,
    _lifecycle_environment: &'p Scoped<'_>,
    repository: &'p Scoped<'_>,
) -> Result<ClientEnvironment<'p>> {
    api.resource_action("repositories", "sync", json!({ "id": repository.id() }))?;
    api.update(
        "content_views",
        json!({ "id": content_view.id(), "repository_ids": [repository.id()] }),
    )?;
    api.resource_action("content_views", "publish", json!({ "id": content_view.id() }))?;

    let library = library(api, organization)?;
    let updated = api.update(
        "activation_keys",
        json!({
            "id": activation_key.id(),
            "organization_id": organization.id(),
            "environment_id": id_of("lifecycle_environments", &library)?,
            "content_view_id": content_view.id(),
        }),
    )?;
    info!(activation_key = %activation_key.id(), content_view = %content_view.id(), "client environment ready");

    Ok(ClientEnvironment {
        api,
        organization_id: organization.id(),
        activation_key: updated,
        content_view_id: content_view.id(),
        released: false,
    })
}

impl ClientEnvironment<'_> {
    pub fn activation_key(&self) -> &Value {
        &self.activation_key
    }

    pub fn release(mut self) -> Result<()> {
        self.teardown()
    }

    /// Detach the key, then pull every version out of each of its
    /// environments before deleting it.
    fn teardown(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let api = self.api;

        api.update(
            "activation_keys",
            json!({
                "id": id_of("activation_keys", &self.activation_key)?,
                "organization_id": self.organization_id,
                "environment_id": null,
                "content_view_id": null,
            }),
        )?;

        let versions = api.list(
            "content_view_versions",
            None,
            json!({ "content_view_id": self.content_view_id }),
        )?;
        for version in &versions {
            let mut environment_ids: Vec<Value> = Vec::new();
            for env in version
                .get("environments")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(id) = env.get("id") {
                    if !environment_ids.contains(id) {
                        environment_ids.push(id.clone());
                    }
                }
            }
            for environment_id in environment_ids {
                api.resource_action(
                    "content_views",
                    "remove_from_environment",
                    json!({ "id": self.content_view_id, "environment_id": environment_id }),
                )?;
            }
            api.delete("content_view_versions", version)?;
        }
        info!(content_view = %self.content_view_id, versions = versions.len(), "client environment torn down");
        Ok(())
    }
}

impl Drop for ClientEnvironment<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!(content_view = %self.content_view_id, error = %err, "client environment teardown failed");
        }
    }
}

/// Record count of a resource before and after a create/teardown cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub fixture: String,
    pub resource: String,
    pub before: usize,
    pub after: usize,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.before == self.after
    }
}

/// Count `resource` records, run `cycle`, and count again.
pub fn verify_teardown<F>(
    api: &ForemanApi,
    fixture: &str,
    resource: &str,
    scope: Value,
    cycle: F,
) -> Result<TeardownReport>
where
    F: FnOnce(&ForemanApi) -> Result<()>,
{
    let before = api.list(resource, None, scope.clone())?.len();
    cycle(api)?;
    let after = api.list(resource, None, scope)?.len();
    let report = TeardownReport {
        fixture: fixture.to_owned(),
        resource: resource.to_owned(),
        before,
        after,
    };
    if report.is_clean() {
        info!(fixture, resource, count = after, "fixture left no residue");
    } else {
        warn!(fixture, resource, before, after, "fixture left residue");
    }
    Ok(report)
}

/// Create and immediately tear down every fixture, one at a time.
pub fn verify_all(api: &ForemanApi) -> Result<Vec<TeardownReport>> {
    let mut reports = vec![verify_teardown(
        api,
        "organization",
        "organizations",
        Value::Null,
        |api| organization(api)?.release(),
    )?];

    let org = organization(api)?;
    let in_org = json!({ "organization_id": org.id() });
    reports.push(verify_teardown(api, "product", "products", in_org.clone(), |api| {
        product(api, &org)?.release()
    })?);
    reports.push(verify_teardown(
        api,
        "lifecycle_environment",
        "lifecycle_environments",
        in_org.clone(),
        |api| lifecycle_environment(api, &org)?.release(),
    )?);
    reports.push(verify_teardown(
        api,
        "content_view",
        "content_views",
        in_org.clone(),
        |api| content_view(api, &org)?.release(),
    )?);
    reports.push(verify_teardown(
        api,
        "activation_key",
        "activation_keys",
        in_org,
        |api| activation_key(api, &org)?.release(),
    )?);

    let prod = product(api, &org)?;
    let in_product = json!({ "product_id": prod.id() });
    reports.push(verify_teardown(
        api,
        "yum_repository",
        "repositories",
        in_product.clone(),
        |api| yum_repository(api, &prod)?.release(),
    )?);
    reports.push(verify_teardown(
        api,
        "file_repository",
        "repositories",
        in_product.clone(),
        |api| file_repository(api, &prod)?.release(),
    )?);
    reports.push(verify_teardown(
        api,
        "container_repository",
        "repositories",
        in_product,
        |api| container_repository(api, &prod)?.release(),
    )?);

    let cv = content_view(api, &org)?;
    let key = activation_key(api, &org)?;
    let lce = lifecycle_environment(api, &org)?;
    let repo = yum_repository(api, &prod)?;
    let for_cv = json!({ "content_view_id": cv.id() });
    reports.push(verify_teardown(
        api,
        "client_environment",
        "content_view_versions",
        for_cv,
        |api| client_environment(api, &org, &key, &cv, &lce, &repo)?.release(),
    )?);

    repo.release()?;
    lce.release()?;
    key.release()?;
    cv.release()?;
    prod.release()?;
    org.release()?;
    Ok(reports)
}
