//! End-to-end tests of the page pipeline through the router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

use chill_core::{Method as Verb, NodeId};
use chill_eval::MiniJinjaRenderer;
use chill_server::build_router;
use chill_server::state::AppState;
use chill_storage::{ContentStore, QueryStore};

struct TestSite {
    state: AppState,
    sql_dir: TempDir,
}

impl TestSite {
    fn new() -> Self {
        Self::with_templates(Vec::<(&str, &str)>::new())
    }

    fn with_templates(templates: Vec<(&str, &str)>) -> Self {
        let sql_dir = tempfile::tempdir().unwrap();
        let renderer = MiniJinjaRenderer::from_templates(templates).unwrap();
        let state = AppState::in_memory_with(
            QueryStore::with_theme_dir(sql_dir.path()),
            Arc::new(renderer),
        )
        .expect("failed to create in-memory AppState");
        TestSite { state, sql_dir }
    }

    fn store(&self) -> ContentStore {
        self.state.service.open_store().unwrap()
    }

    fn query(&self, name: &str, sql: &str) {
        std::fs::write(self.sql_dir.path().join(name), sql).unwrap();
    }

    fn app(&self) -> Router {
        build_router(self.state.clone())
    }

    fn read_only_app(&self) -> Router {
        build_router(AppState::from_service(self.state.service.read_only()))
    }
}

struct Reply {
    status: StatusCode,
    content_type: Option<String>,
    etag: Option<String>,
    body: String,
}

impl Reply {
    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(json!(null))
    }
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let header_value = |name: header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let content_type = header_value(header::CONTENT_TYPE);
    let etag = header_value(header::ETAG);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        content_type,
        etag,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

async fn request(app: &Router, method: Method, path: &str) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, path: &str) -> Reply {
    request(app, Method::GET, path).await
}

async fn post_json(app: &Router, path: &str, body: serde_json::Value) -> Reply {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

fn node(store: &mut ContentStore, name: &str, value: Option<&str>) -> NodeId {
    store.insert_node(name, value).unwrap()
}

#[tokio::test]
async fn health_check() {
    let site = TestSite::new();
    let reply = get(&site.app(), "/_health").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "ok");
}

#[tokio::test]
async fn root_aliases_serve_the_same_node() {
    let site = TestSite::new();
    let mut store = site.store();
    let top = node(&mut store, "top", Some("hello"));
    store.insert_route("/", top, 0, Verb::Get).unwrap();

    let app = site.app();
    for path in ["/", "/.", "/index.html", "/./index.html"] {
        let reply = get(&app, path).await;
        assert_eq!(reply.status, StatusCode::OK, "path {}", path);
        assert_eq!(reply.body, "hello", "path {}", path);
        assert_eq!(reply.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }
}

#[tokio::test]
async fn nested_aliases_collapse() {
    let site = TestSite::new();
    let mut store = site.store();
    let two = node(&mut store, "two", Some("second"));
    store.insert_route("/one/two/", two, 0, Verb::Get).unwrap();

    let app = site.app();
    for path in ["/one//two", "/./one/two", "/one/foo/../two", "/one/two/index.html"] {
        assert_eq!(get(&app, path).await.body, "second", "path {}", path);
    }
}

#[tokio::test]
async fn pattern_route_passes_path_parameters_to_queries() {
    let site = TestSite::new();
    site.query(
        "pagenames.sql",
        "select 'yup' as test where :pagename in ('apple','pear')",
    );
    let mut store = site.store();
    let page = node(&mut store, "page", None);
    let names = node(&mut store, "pagenames", None);
    store.bind_query_to_node(names, "pagenames.sql").unwrap();
    store.insert_link(page, names, None).unwrap();
    store.insert_route("/page/<pagename>/", page, 0, Verb::Get).unwrap();

    let app = site.app();
    let pear = get(&app, "/page/pear/").await;
    assert_eq!(pear.status, StatusCode::OK);
    assert!(pear.body.contains("yup"));
    assert_eq!(pear.json(), json!({"pagenames": {"test": "yup"}}));
    assert_eq!(pear.content_type.as_deref(), Some("application/json"));

    let cucumber = get(&app, "/page/cucumber/").await;
    assert!(!cucumber.body.contains("yup"));
}

#[tokio::test]
async fn unknown_route_and_empty_value_are_not_found() {
    let site = TestSite::new();
    let mut store = site.store();
    let empty = node(&mut store, "empty", None);
    store.insert_route("/empty/", empty, 0, Verb::Get).unwrap();

    let app = site.app();
    let missing = get(&app, "/nowhere/").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["success"], false);
    assert_eq!(missing.json()["error"]["code"], "NOT_FOUND");

    assert_eq!(get(&app, "/empty/").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_sends_etag_and_honors_if_none_match() {
    let site = TestSite::new();
    let mut store = site.store();
    let top = node(&mut store, "top", Some("hello"));
    store.insert_route("/", top, 0, Verb::Get).unwrap();

    let app = site.app();
    let first = get(&app, "/").await;
    let etag = first.etag.expect("GET response should carry an ETag");

    let request = Request::builder()
        .uri("/")
        .header(header::IF_NONE_MATCH, etag.as_str())
        .body(Body::empty())
        .unwrap();
    let second = send(&app, request).await;
    assert_eq!(second.status, StatusCode::NOT_MODIFIED);
    assert!(second.body.is_empty());
}

#[tokio::test]
async fn post_runs_insert_and_returns_created() {
    let site = TestSite::new();
    site.query(
        "add_comment.sql",
        "INSERT INTO Node (name, value) VALUES ('comment', :text)",
    );
    site.query(
        "comments.sql",
        "SELECT value AS comment FROM Node WHERE name = 'comment' ORDER BY id",
    );
    let mut store = site.store();
    let add = node(&mut store, "add", None);
    store.bind_query_to_node(add, "add_comment.sql").unwrap();
    store.insert_route("/comments/", add, 0, Verb::Post).unwrap();
    let list = node(&mut store, "list", None);
    store.bind_query_to_node(list, "comments.sql").unwrap();
    store.insert_route("/comments/", list, 0, Verb::Get).unwrap();

    let app = site.app();
    let reply = post_json(&app, "/comments/", json!({"text": "first!"})).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body, "ok");

    let listed = get(&app, "/comments/").await;
    assert_eq!(listed.json(), json!({"comment": "first!"}));
}

#[tokio::test]
async fn post_with_result_returns_body() {
    let site = TestSite::new();
    site.query("echo.sql", "SELECT :greeting AS greeting");
    let mut store = site.store();
    let echo = node(&mut store, "echo", None);
    store.bind_query_to_node(echo, "echo.sql").unwrap();
    store.insert_route("/echo/", echo, 0, Verb::Post).unwrap();

    let reply = post_json(&site.app(), "/echo/?greeting=hi", json!({})).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"greeting": "hi"}));
}

#[tokio::test]
async fn put_and_patch_return_created() {
    let site = TestSite::new();
    site.query(
        "rename.sql",
        "UPDATE Node SET value = :value WHERE name = 'title'",
    );
    let mut store = site.store();
    let title = node(&mut store, "title", Some("old"));
    store.insert_route("/title/", title, 0, Verb::Get).unwrap();
    let rename = node(&mut store, "rename", None);
    store.bind_query_to_node(rename, "rename.sql").unwrap();
    store.insert_route("/title/", rename, 0, Verb::Put).unwrap();
    store.insert_route("/title/", rename, 0, Verb::Patch).unwrap();

    let app = site.app();
    let reply = request(&app, Method::PUT, "/title/?value=new").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body, "ok");
    assert_eq!(get(&app, "/title/").await.body, "new");

    let reply = request(&app, Method::PATCH, "/title/?value=newer").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(get(&app, "/title/").await.body, "newer");
}

#[tokio::test]
async fn post_binds_name_and_value_to_the_routed_query() {
    let site = TestSite::new();
    site.query(
        "add_node.sql",
        "INSERT INTO Node (name, value) VALUES (:name, :value)",
    );
    site.query("fresh.sql", "SELECT value FROM Node WHERE name = 'fresh'");
    let mut store = site.store();
    let add = node(&mut store, "add", None);
    store.bind_query_to_node(add, "add_node.sql").unwrap();
    store.insert_route("/nodes/", add, 0, Verb::Post).unwrap();
    let fresh = node(&mut store, "lookup", None);
    store.bind_query_to_node(fresh, "fresh.sql").unwrap();
    store.insert_route("/nodes/fresh/", fresh, 0, Verb::Get).unwrap();

    let app = site.app();
    let reply = post_json(&app, "/nodes/", json!({"name": "fresh", "value": "v"})).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(get(&app, "/nodes/fresh/").await.json(), json!({"value": "v"}));
}

#[tokio::test]
async fn delete_returns_no_content() {
    let site = TestSite::new();
    site.query("remove.sql", "DELETE FROM Node WHERE name = :target");
    let mut store = site.store();
    let victim = node(&mut store, "victim", Some("v"));
    let remove = node(&mut store, "remove", None);
    store.bind_query_to_node(remove, "remove.sql").unwrap();
    store.insert_route("/things/<target>/", remove, 0, Verb::Delete).unwrap();

    let reply = request(&site.app(), Method::DELETE, "/things/victim/").await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_empty());
    assert!(site.store().get_node(victim).is_err());
}

#[tokio::test]
async fn mutating_verbs_on_read_only_site_are_rejected_without_writing() {
    let site = TestSite::new();
    site.query("remove.sql", "DELETE FROM Node WHERE name = 'victim'");
    let mut store = site.store();
    let victim = node(&mut store, "victim", Some("v"));
    let remove = node(&mut store, "remove", None);
    store.bind_query_to_node(remove, "remove.sql").unwrap();
    for verb in [Verb::Put, Verb::Patch, Verb::Delete] {
        store.insert_route("/victim/", remove, 0, verb).unwrap();
    }
    store.insert_route("/victim/", victim, 0, Verb::Get).unwrap();

    let app = site.read_only_app();
    for method in [Method::PUT, Method::PATCH, Method::DELETE] {
        let reply = request(&app, method.clone(), "/victim/").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", method);
        assert_eq!(reply.json()["error"]["code"], "READ_ONLY");
    }
    assert!(site.store().get_node(victim).is_ok());
    assert_eq!(get(&app, "/victim/").await.body, "v");
}

#[tokio::test]
async fn post_insert_on_read_only_site_is_rejected() {
    let site = TestSite::new();
    site.query("add.sql", "INSERT INTO Node (name) VALUES ('x')");
    let mut store = site.store();
    let add = node(&mut store, "add", None);
    store.bind_query_to_node(add, "add.sql").unwrap();
    store.insert_route("/add/", add, 0, Verb::Post).unwrap();

    let reply = post_json(&site.read_only_app(), "/add/", json!({})).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"]["code"], "READ_ONLY");
}

#[tokio::test]
async fn client_supplied_method_parameter_is_rejected() {
    let site = TestSite::new();
    let mut store = site.store();
    let top = node(&mut store, "top", Some("hello"));
    store.insert_route("/", top, 0, Verb::Get).unwrap();

    let reply = get(&site.app(), "/?method=DELETE").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"]["code"], "METHOD_CONFLICT");
}

#[tokio::test]
async fn write_query_under_get_is_rejected() {
    let site = TestSite::new();
    site.query("sneaky.sql", "DELETE FROM Node");
    let mut store = site.store();
    let sneaky = node(&mut store, "sneaky", None);
    store.bind_query_to_node(sneaky, "sneaky.sql").unwrap();
    store.insert_route("/sneaky/", sneaky, 0, Verb::Get).unwrap();

    let reply = get(&site.app(), "/sneaky/").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(site.store().get_node(sneaky).is_ok());
}

#[tokio::test]
async fn unsupported_verb_is_method_not_allowed() {
    let site = TestSite::new();
    let reply = request(&site.app(), Method::TRACE, "/").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn template_renders_page() {
    let site = TestSite::with_templates(vec![(
        "page.html",
        "<title>{{ title }}</title><nav>[chill page_uri about]</nav>",
    )]);
    let mut store = site.store();
    let page = node(&mut store, "page", None);
    let title = node(&mut store, "title", Some("Home"));
    store.insert_link(page, title, None).unwrap();
    store.bind_template_to_node(page, "page.html").unwrap();
    store.insert_route("/", page, 0, Verb::Get).unwrap();

    let reply = get(&site.app(), "/").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "<title>Home</title><nav>/about/</nav>");
    assert_eq!(reply.content_type.as_deref(), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn missing_template_is_not_found() {
    let site = TestSite::new();
    let mut store = site.store();
    let page = node(&mut store, "page", Some("x"));
    store.bind_template_to_node(page, "gone.html").unwrap();
    store.insert_route("/", page, 0, Verb::Get).unwrap();

    assert_eq!(get(&site.app(), "/").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn link_cycle_is_a_server_error() {
    let site = TestSite::new();
    let mut store = site.store();
    let a = node(&mut store, "a", None);
    let b = node(&mut store, "b", None);
    store.insert_link(a, b, None).unwrap();
    store.insert_link(b, a, None).unwrap();
    store.insert_route("/loop/", a, 0, Verb::Get).unwrap();

    let reply = get(&site.app(), "/loop/").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["error"]["code"], "INTERNAL_ERROR");
}
