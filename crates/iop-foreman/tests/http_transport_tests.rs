//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "tests"
//! iop_type: "source"
//! iop_scope: "test"
//! iop_description: "HTTP transport against a mock Foreman server."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::time::Duration;

use iop_common::ApiConfig;
use iop_foreman::{ApiError, ForemanApi};
use mockito::Matcher;
use serde_json::json;

const FQDN: &str = "quadlet.example.com";
const ADMIN_CHANGEME: &str = "Basic YWRtaW46Y2hhbmdlbWU=";

fn api_for(server: &mockito::Server) -> ForemanApi {
    ForemanApi::connect(&ApiConfig::default(), &server.url(), FQDN)
        .unwrap()
        .with_polling(Duration::from_millis(1), Duration::from_millis(200))
}

#[test]
fn requests_carry_virtual_host_and_basic_auth() {
    let mut server = mockito::Server::new();
    let index = server
        .mock("GET", "/katello/api/organizations")
        .match_header("host", FQDN)
        .match_header("authorization", ADMIN_CHANGEME)
        .match_query(Matcher::UrlEncoded("search".into(), "name=Default".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total":1,"results":[{"id":1,"name":"Default"}]}"#)
        .create();

    let api = api_for(&server);
    let orgs = api
        .list("organizations", Some("name=Default"), json!({}))
        .unwrap();
    assert_eq!(orgs, vec![json!({"id": 1, "name": "Default"})]);
    index.assert();
}

#[test]
fn organization_create_wraps_body() {
    let mut server = mockito::Server::new();
    let create = server
        .mock("POST", "/katello/api/organizations")
        .match_body(Matcher::PartialJson(json!({"organization": {"name": "o1"}})))
        .with_status(201)
        .with_body(r#"{"id":7,"name":"o1"}"#)
        .create();

    let api = api_for(&server);
    let org = api.create("organizations", json!({"name": "o1"})).unwrap();
    assert_eq!(org["id"], 7);
    create.assert();
}

#[test]
fn error_status_surfaces_body() {
    let mut server = mockito::Server::new();
    server
        .mock("DELETE", "/katello/api/products/3")
        .with_status(422)
        .with_body(r#"{"displayMessage":"product still has repositories"}"#)
        .create();

    let api = api_for(&server);
    let err = api
        .delete("products", &json!({"id": 3}))
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    match err {
        ApiError::Status { body, path, .. } => {
            assert_eq!(path, "/katello/api/products/3");
            assert!(body.contains("still has repositories"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn sync_waits_for_the_returned_task() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/katello/api/repositories/5/sync")
        .with_status(202)
        .with_body(r#"{"id":"t-1","label":"Actions::Katello::Repository::Sync","state":"planned"}"#)
        .create();
    let poll = server
        .mock("GET", "/foreman_tasks/api/tasks/t-1")
        .with_status(200)
        .with_body(r#"{"id":"t-1","label":"Actions::Katello::Repository::Sync","state":"stopped","result":"success"}"#)
        .expect(1)
        .create();

    let api = api_for(&server);
    api.resource_action("repositories", "sync", json!({"id": 5}))
        .unwrap();
    poll.assert();
}

#[test]
fn failed_task_is_an_error() {
    let mut server = mockito::Server::new();
    server
        .mock("DELETE", "/katello/api/organizations/9")
        .with_status(202)
        .with_body(r#"{"id":"t-9","label":"Actions::Katello::Organization::Destroy","state":"running"}"#)
        .create();
    server
        .mock("GET", "/foreman_tasks/api/tasks/t-9")
        .with_status(200)
        .with_body(r#"{"id":"t-9","label":"Actions::Katello::Organization::Destroy","state":"paused","result":"error"}"#)
        .create();

    let api = api_for(&server);
    let err = api
        .delete("organizations", &json!({"id": 9}))
        .unwrap_err();
    assert!(matches!(err, ApiError::TaskFailed { ref id, .. } if id == "t-9"));
}

#[test]
fn task_that_never_settles_times_out() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/foreman_tasks/api/tasks/t-2")
        .with_status(200)
        .with_body(r#"{"id":"t-2","label":"Actions::Katello::Repository::Sync","state":"running"}"#)
        .create();

    let api = api_for(&server);
    let err = api.wait_for_task(&json!({"id": "t-2"})).unwrap_err();
    assert!(matches!(err, ApiError::TaskTimeout { ref state, .. } if state == "running"));
}
