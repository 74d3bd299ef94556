use crate::app::CrudEngine;
use crate::domain::model::EntitySchema;
use crate::storage::query::{Page, SortDirection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub engine: CrudEngine,
    /// Prefix of the alert headers (`X-<app>-alert`).
    pub app_name: Arc<str>,
}

impl AppState {
    pub fn new(engine: CrudEngine, app_name: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            app_name: app_name.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Optional paging of list endpoints: `?page=0&size=20&sort=name,desc`.
#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    pub page: Option<u64>,
    pub size: Option<u64>,
    /// `column` or `column,asc|desc`; camelCase property names are accepted.
    pub sort: Option<String>,
}

/// Largest LIMIT/OFFSET Postgres accepts (a BIGINT).
const MAX_PAGE_BOUND: u64 = i64::MAX as u64;

impl PageParams {
    /// `None` when no paging parameter was given at all.
    ///
    /// The sort property must name a column of `schema`, and the row window
    /// must fit in a BIGINT.
    pub fn to_page(&self, schema: &EntitySchema) -> Result<Option<Page>, String> {
        if self.page.is_none() && self.size.is_none() && self.sort.is_none() {
            return Ok(None);
        }
        let number = self.page.unwrap_or(0);
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size > MAX_PAGE_BOUND {
            return Err(format!("page size {} is too large", size));
        }
        match number.checked_mul(size) {
            Some(offset) if offset <= MAX_PAGE_BOUND => {}
            _ => return Err(format!("page {} of size {} is out of range", number, size)),
        }
        let mut page = Page::new(number, size);

        if let Some(sort) = self.sort.as_deref() {
            let (property, direction) = match sort.split_once(',') {
                Some((property, direction)) => (property, direction),
                None => (sort, "asc"),
            };
            let direction = match direction.trim().to_ascii_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                other => return Err(format!("invalid sort direction '{}'", other)),
            };
            let property = property.trim();
            if property.is_empty() {
                return Err("sort property must not be empty".to_string());
            }
            let column = to_snake_case(property);
            if schema.column(&column).is_none() {
                return Err(format!("unknown sort property '{}' for {}", property, schema.name));
            }
            page = page.sorted_by(column, direction);
        }
        Ok(Some(page))
    }
}

fn to_snake_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 4);
    for (i, c) in property.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(format!("Invalid JSON body: {} (expected: {})", err, expected)),
        }),
    )
}
