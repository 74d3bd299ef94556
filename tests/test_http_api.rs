use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;
use stock_ledger::transport::http::{create_router, AppState};
use stock_ledger::{CrudEngine, MemoryRowStore};
use tower::ServiceExt;

fn create_test_app() -> (Arc<MemoryRowStore>, Router) {
    let store = Arc::new(MemoryRowStore::new());
    let state = AppState::new(CrudEngine::new(store.clone()), "stockLedger");
    (store, create_router(state))
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: Option<Value>,
) -> Result<Reply, Box<dyn Error>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v)?),
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body)?).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await?.to_bytes().to_vec();
    Ok(Reply {
        status,
        headers,
        body,
    })
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Result<Reply, Box<dyn Error>> {
    send(app, Method::POST, uri, Some("application/json"), Some(body)).await
}

async fn get(app: &Router, uri: &str) -> Result<Reply, Box<dyn Error>> {
    send(app, Method::GET, uri, None, None).await
}

#[tokio::test(flavor = "multi_thread")]
async fn create_returns_201_with_location_and_alert() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();

    let reply = post_json(
        &app,
        "/api/stocks",
        json!({ "name": "Acme", "sector": "Tech", "fundation": "1970-01-01" }),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.header("location"), Some("/api/stocks/1"));
    assert_eq!(reply.header("x-stockledger-alert"), Some("stockLedger.stock.created"));
    assert_eq!(reply.header("x-stockledger-params"), Some("1"));

    let body = reply.json();
    assert_eq!(body["id"], 1);
    assert_eq!(body["fundation"], "1970-01-01");

    let fetched = get(&app, "/api/stocks/1").await?;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["name"], "Acme");
    assert_eq!(fetched.json()["description"], Value::Null);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn create_rejects_body_with_id_or_missing_field() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();

    let with_id = post_json(&app, "/api/portfolios", json!({ "id": 5, "name": "Main" })).await?;
    assert_eq!(with_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(with_id.json()["data"]["code"], "idexists");

    let nameless = post_json(&app, "/api/portfolios", json!({ "description": "x" })).await?;
    assert_eq!(nameless.status, StatusCode::BAD_REQUEST);
    assert_eq!(nameless.json()["data"]["code"], "validation");

    let broken = send(
        &app,
        Method::POST,
        "/api/portfolios",
        Some("application/json"),
        Some(json!({ "name": 12 })),
    )
    .await?;
    assert_eq!(broken.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn nested_parent_reference_sets_foreign_key() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    post_json(&app, "/api/stocks", json!({ "name": "Acme", "sector": "Tech" })).await?;

    let reply = post_json(
        &app,
        "/api/analyses",
        json!({ "date": "2024-01-01", "stock": { "id": 1 } }),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CREATED);

    let fetched = get(&app, "/api/analyses/1").await?.json();
    assert_eq!(fetched["stockId"], 1);
    assert_eq!(fetched["stock"]["name"], "Acme");

    let children = get(&app, "/api/stocks/1/analyses").await?;
    assert_eq!(children.status, StatusCode::OK);
    assert_eq!(children.json().as_array().map(Vec::len), Some(1));

    let missing_parent = get(&app, "/api/stocks/9/analyses").await?;
    assert_eq!(missing_parent.status, StatusCode::OK);
    assert_eq!(missing_parent.json(), json!([]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn children_stay_listed_after_parent_delete() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    post_json(&app, "/api/stocks", json!({ "name": "Acme", "sector": "Tech" })).await?;
    post_json(&app, "/api/analyses", json!({ "date": "2024-01-01", "stockId": 1 })).await?;
    post_json(&app, "/api/analyses", json!({ "date": "2024-02-01", "stockId": 1 })).await?;

    let deleted = send(&app, Method::DELETE, "/api/stocks/1", None, None).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let children = get(&app, "/api/stocks/1/analyses").await?;
    assert_eq!(children.status, StatusCode::OK);
    let rows = children.json().as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["stockId"], 1);
        assert!(row.get("stock").is_none());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn update_checks_identifiers() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    post_json(&app, "/api/portfolios", json!({ "name": "Main" })).await?;

    let no_id = send(
        &app,
        Method::PUT,
        "/api/portfolios/1",
        Some("application/json"),
        Some(json!({ "name": "Renamed" })),
    )
    .await?;
    assert_eq!(no_id.json()["data"]["code"], "idnull");

    let mismatch = send(
        &app,
        Method::PUT,
        "/api/portfolios/1",
        Some("application/json"),
        Some(json!({ "id": 2, "name": "Renamed" })),
    )
    .await?;
    assert_eq!(mismatch.json()["data"]["code"], "idinvalid");

    let absent = send(
        &app,
        Method::PUT,
        "/api/portfolios/2",
        Some("application/json"),
        Some(json!({ "id": 2, "name": "Renamed" })),
    )
    .await?;
    assert_eq!(absent.status, StatusCode::BAD_REQUEST);
    assert_eq!(absent.json()["data"]["code"], "idnotfound");

    let ok = send(
        &app,
        Method::PUT,
        "/api/portfolios/1",
        Some("application/json"),
        Some(json!({ "id": 1, "name": "Renamed" })),
    )
    .await?;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.header("x-stockledger-alert"), Some("stockLedger.portfolio.updated"));
    assert_eq!(get(&app, "/api/portfolios/1").await?.json()["name"], "Renamed");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn patch_changes_only_supplied_fields() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    post_json(
        &app,
        "/api/stocks",
        json!({
            "name": "Acme",
            "sector": "Tech",
            "fundation": "1970-01-01",
            "employees": 120,
            "icnome": 1500000.0
        }),
    )
    .await?;

    let reply = send(
        &app,
        Method::PATCH,
        "/api/stocks/1",
        Some("application/merge-patch+json"),
        Some(json!({ "id": 1, "description": "rockets" })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);

    let stock = get(&app, "/api/stocks/1").await?.json();
    assert_eq!(stock["description"], "rockets");
    assert_eq!(stock["name"], "Acme");
    assert_eq!(stock["sector"], "Tech");
    assert_eq!(stock["fundation"], "1970-01-01");
    assert_eq!(stock["employees"], 120);
    assert_eq!(stock["icnome"], 1500000.0);

    let absent = send(
        &app,
        Method::PATCH,
        "/api/stocks/3",
        Some("application/json"),
        Some(json!({ "id": 3, "description": "x" })),
    )
    .await?;
    assert_eq!(absent.json()["data"]["code"], "idnotfound");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn list_supports_ndjson_and_paging() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    for name in ["b", "a", "c"] {
        post_json(&app, "/api/portfolios", json!({ "name": name })).await?;
    }

    let all = get(&app, "/api/portfolios").await?;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.json().as_array().map(Vec::len), Some(3));
    assert!(all.header("x-total-count").is_none());

    let request = Request::builder()
        .uri("/api/portfolios")
        .header(header::ACCEPT, "application/x-ndjson")
        .body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/x-ndjson")
    );
    let bytes = response.into_body().collect().await?.to_bytes();
    let lines: Vec<Value> = std::str::from_utf8(&bytes)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["name"], "b");

    let paged = get(&app, "/api/portfolios?page=0&size=2&sort=name,asc").await?;
    assert_eq!(paged.header("x-total-count"), Some("3"));
    let names: Vec<Value> = paged.json().as_array().cloned().unwrap_or_default();
    assert_eq!(names.len(), 2);
    assert_eq!(names[0]["name"], "a");
    assert_eq!(names[1]["name"], "b");

    let bad = get(&app, "/api/portfolios?sort=name,sideways").await?;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let capitalized = get(&app, "/api/portfolios?sort=Name,desc&size=1").await?;
    assert_eq!(capitalized.status, StatusCode::OK);
    assert_eq!(capitalized.json()[0]["name"], "c");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_paging_is_rejected_as_bad_request() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    post_json(&app, "/api/portfolios", json!({ "name": "Main" })).await?;

    let uris = [
        "/api/portfolios?sort=nope,asc".to_string(),
        "/api/positions?sort=stock_id".to_string(),
        format!("/api/portfolios?page={}&size={}", u64::MAX, u64::MAX),
        format!("/api/portfolios?size={}", u64::MAX),
        format!("/api/portfolios?page={}&size=2", i64::MAX),
    ];
    for uri in &uris {
        let reply = get(&app, uri).await?;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(reply.json()["data"]["code"], "badrequest", "{}", uri);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn text_over_column_limit_is_a_validation_error() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    let reply = post_json(
        &app,
        "/api/portfolios",
        json!({ "name": "x".repeat(256) }),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["data"]["code"], "validation");
    assert_eq!(get(&app, "/api/portfolios").await?.json(), json!([]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn get_missing_is_404_and_delete_is_always_204() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    assert_eq!(get(&app, "/api/positions/42").await?.status, StatusCode::NOT_FOUND);

    let deleted = send(&app, Method::DELETE, "/api/positions/42", None, None).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(deleted.header("x-stockledger-alert"), Some("stockLedger.position.deleted"));

    post_json(&app, "/api/positions", json!({ "amount": 3.0, "price": 10.0 })).await?;
    let deleted = send(&app, Method::DELETE, "/api/positions/1", None, None).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&app, "/api/positions/1").await?.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn orphans_route_lists_rows_without_parent() -> Result<(), Box<dyn Error>> {
    let (_store, app) = create_test_app();
    post_json(&app, "/api/portfolios", json!({ "name": "Main" })).await?;
    post_json(
        &app,
        "/api/positions",
        json!({ "amount": 1.0, "price": 2.0, "portfolioId": 1 }),
    )
    .await?;
    post_json(&app, "/api/positions", json!({ "amount": 5.0, "price": 2.0 })).await?;

    let orphans = get(&app, "/api/positions/orphans").await?;
    assert_eq!(orphans.status, StatusCode::OK);
    let body = orphans.json();
    let rows = body.as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["amount"], 5.0);
    assert!(rows[0].get("portfolio").is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn storage_failure_maps_to_500_and_unhealthy() -> Result<(), Box<dyn Error>> {
    let (store, app) = create_test_app();
    assert_eq!(get(&app, "/health").await?.status, StatusCode::OK);

    store.set_available(false);
    let list = get(&app, "/api/stocks").await?;
    assert_eq!(list.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(list.json()["data"]["code"], "storageunavailable");

    let health = get(&app, "/health").await?;
    assert_eq!(health.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.json()["data"]["status"], "unhealthy");
    Ok(())
}
