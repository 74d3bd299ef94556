use crate::domain::model::{Analysis, Entity, Indicator, Portfolio, Position, Stock};
use crate::transport::http::handlers::{entities, health};
use crate::transport::http::types::{ApiResponse, AppState};
use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(health::healthcheck_handler),
    components(schemas(ApiResponse, Stock, Analysis, Indicator, Portfolio, Position))
)]
#[allow(dead_code)]
pub struct ApiDoc;

/// `/api/<resource>` and `/api/<resource>/:id`.
fn entity_routes<E: Entity>() -> Router<AppState> {
    let base = format!("/api/{}", E::schema().resource);
    Router::new()
        .route(
            &base,
            get(entities::list_handler::<E>).post(entities::create_handler::<E>),
        )
        .route(
            &format!("{}/:id", base),
            get(entities::get_handler::<E>)
                .put(entities::update_handler::<E>)
                .patch(entities::partial_update_handler::<E>)
                .delete(entities::delete_handler::<E>),
        )
}

/// `/api/<parent>/:id/<children>` and `/api/<children>/orphans`.
fn relation_routes<P: Entity, C: Entity>() -> Router<AppState> {
    debug_assert_eq!(C::schema().parent.map(|r| r.parent), Some(P::KIND));
    let parent = P::schema().resource;
    let child = C::schema().resource;
    Router::new()
        .route(
            &format!("/api/{}/:id/{}", parent, child),
            get(entities::children_handler::<P, C>),
        )
        .route(
            &format!("/api/{}/orphans", child),
            get(entities::orphans_handler::<C>),
        )
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .merge(entity_routes::<Stock>())
        .merge(entity_routes::<Analysis>())
        .merge(entity_routes::<Indicator>())
        .merge(entity_routes::<Portfolio>())
        .merge(entity_routes::<Position>())
        .merge(relation_routes::<Stock, Analysis>())
        .merge(relation_routes::<Analysis, Indicator>())
        .merge(relation_routes::<Portfolio, Position>())
        .with_state(app_state)
}
