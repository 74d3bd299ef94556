//! REST handlers shared by every entity resource.
//!
//! The handlers are generic over [`Entity`]; the router instantiates them once
//! per resource (`/api/stocks`, `/api/analyses`, ...).

use crate::domain::model::Entity;
use crate::transport::http::handlers::common::{
    alert_headers, bad_request, crud_error_response, error_response, not_found,
};
use crate::transport::http::types::{json_422, AppState, PageParams};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

pub const NDJSON: &str = "application/x-ndjson";
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

fn path_id<E: Entity>(path: Result<Path<i64>, PathRejection>) -> Result<i64, Response> {
    path.map(|Path(id)| id)
        .map_err(|e| bad_request("idinvalid", E::schema().name, format!("Invalid id: {}", e)))
}

fn json_body<E: Entity>(payload: Result<Json<E>, JsonRejection>) -> Result<E, Response> {
    payload
        .map(|Json(entity)| entity)
        .map_err(|e| json_422(e, E::schema().name).into_response())
}

/// Rejects a body whose id is missing or differs from the path id.
fn check_body_id<E: Entity>(path_id: i64, entity: &E) -> Result<(), Response> {
    let name = E::schema().name;
    match entity.id() {
        None => Err(bad_request("idnull", name, "Invalid id")),
        Some(id) if id != path_id => Err(bad_request("idinvalid", name, "Invalid ID")),
        Some(_) => Ok(()),
    }
}

async fn check_exists<E: Entity>(state: &AppState, id: i64) -> Result<(), Response> {
    let name = E::schema().name;
    match state.engine.exists_by_id::<E>(id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(bad_request("idnotfound", name, "Entity not found")),
        Err(e) => Err(crud_error_response(name, e)),
    }
}

pub async fn create_handler<E: Entity>(
    State(state): State<AppState>,
    payload: Result<Json<E>, JsonRejection>,
) -> Response {
    let name = E::schema().name;
    let mut entity = match json_body(payload) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    debug!(entity = name, "REST request to save {:?}", entity);
    if entity.id().is_some() {
        return bad_request(
            "idexists",
            name,
            format!("A new {} cannot already have an ID", name),
        );
    }
    entity.sync_parent_key();

    match state.engine.save(entity).await {
        Ok(saved) => {
            let id = saved.id().unwrap_or_default();
            let mut headers = alert_headers(&state, name, "created", id);
            let location = format!("/api/{}/{}", E::schema().resource, id);
            if let Ok(value) = HeaderValue::try_from(location) {
                headers.insert(LOCATION, value);
            }
            (StatusCode::CREATED, headers, Json(saved)).into_response()
        }
        Err(e) => crud_error_response(name, e),
    }
}

pub async fn update_handler<E: Entity>(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<E>, JsonRejection>,
) -> Response {
    let name = E::schema().name;
    let (id, mut entity) = match (path_id::<E>(path), json_body(payload)) {
        (Ok(id), Ok(entity)) => (id, entity),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    debug!(entity = name, id, "REST request to update {:?}", entity);
    if let Err(resp) = check_body_id(id, &entity) {
        return resp;
    }
    if let Err(resp) = check_exists::<E>(&state, id).await {
        return resp;
    }
    entity.sync_parent_key();

    match state.engine.save(entity).await {
        Ok(saved) => (StatusCode::OK, alert_headers(&state, name, "updated", id), Json(saved)).into_response(),
        Err(e) => crud_error_response(name, e),
    }
}

/// Merge-patch: only the non-null properties of the body replace stored values.
pub async fn partial_update_handler<E: Entity>(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<E>, JsonRejection>,
) -> Response {
    let name = E::schema().name;
    let (id, mut patch) = match (path_id::<E>(path), json_body(payload)) {
        (Ok(id), Ok(patch)) => (id, patch),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    debug!(entity = name, id, "REST request to partially update {:?}", patch);
    if let Err(resp) = check_body_id(id, &patch) {
        return resp;
    }
    if let Err(resp) = check_exists::<E>(&state, id).await {
        return resp;
    }

    let existing = match state.engine.find_by_id::<E>(id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return not_found(name),
        Err(e) => return crud_error_response(name, e),
    };
    patch.sync_parent_key();
    let mut record = existing.to_record();
    record.overlay(&patch.to_record());
    let mut merged = E::from_record(&record);
    merged.set_id(Some(id));

    match state.engine.save(merged).await {
        Ok(saved) => (StatusCode::OK, alert_headers(&state, name, "updated", id), Json(saved)).into_response(),
        Err(e) => crud_error_response(name, e),
    }
}

fn wants_ndjson(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains(NDJSON))
        .unwrap_or(false)
}

fn ndjson_response<E: Entity>(entities: &[E]) -> Result<Response, serde_json::Error> {
    let mut body = Vec::new();
    for entity in entities {
        serde_json::to_writer(&mut body, entity)?;
        body.push(b'\n');
    }
    Ok(([(CONTENT_TYPE, HeaderValue::from_static(NDJSON))], body).into_response())
}

pub async fn list_handler<E: Entity>(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Response {
    let name = E::schema().name;
    let params = match params {
        Ok(Query(params)) => params,
        Err(e) => return bad_request("badrequest", name, format!("Invalid query: {}", e)),
    };
    let page = match params.to_page(E::schema()) {
        Ok(page) => page,
        Err(msg) => return bad_request("badrequest", name, msg),
    };
    debug!(entity = name, paged = page.is_some(), "REST request to get all");

    let paged = page.is_some();
    let entities = match state.engine.find_all::<E>(page).await {
        Ok(entities) => entities,
        Err(e) => return crud_error_response(name, e),
    };

    let mut response = if wants_ndjson(&headers) {
        match ndjson_response(&entities) {
            Ok(resp) => resp,
            Err(e) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "serialization",
                    name,
                    e.to_string(),
                )
            }
        }
    } else {
        Json(entities).into_response()
    };

    if paged {
        match state.engine.count::<E>().await {
            Ok(total) => {
                response
                    .headers_mut()
                    .insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
            }
            Err(e) => return crud_error_response(name, e),
        }
    }
    response
}

pub async fn get_handler<E: Entity>(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Response {
    let name = E::schema().name;
    let id = match path_id::<E>(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    debug!(entity = name, id, "REST request to get");
    match state.engine.find_by_id::<E>(id).await {
        Ok(Some(entity)) => Json(entity).into_response(),
        Ok(None) => not_found(name),
        Err(e) => crud_error_response(name, e),
    }
}

/// Always 204, whether or not the row existed.
pub async fn delete_handler<E: Entity>(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Response {
    let name = E::schema().name;
    let id = match path_id::<E>(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    debug!(entity = name, id, "REST request to delete");
    match state.engine.delete_by_id::<E>(id).await {
        Ok(_) => (StatusCode::NO_CONTENT, alert_headers(&state, name, "deleted", id)).into_response(),
        Err(e) => crud_error_response(name, e),
    }
}

/// `GET /api/<parent>/{id}/<children>`.
///
/// The parent row is not required to exist: children of a deleted parent
/// keep their foreign key and are still listed here.
pub async fn children_handler<P: Entity, C: Entity>(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Response {
    let parent = P::schema().name;
    let child = C::schema().name;
    let id = match path_id::<P>(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    debug!(parent, child, id, "REST request to get children");
    match state.engine.find_by_parent::<C>(Some(id)).await {
        Ok(children) => Json(children).into_response(),
        Err(e) => crud_error_response(child, e),
    }
}

/// `GET /api/<children>/orphans`: rows whose foreign key is null.
pub async fn orphans_handler<C: Entity>(State(state): State<AppState>) -> Response {
    let name = C::schema().name;
    debug!(entity = name, "REST request to get all without parent");
    match state.engine.find_by_parent::<C>(None).await {
        Ok(entities) => Json(entities).into_response(),
        Err(e) => crud_error_response(name, e),
    }
}
