use actix_web::web::{Data, Query};
use actix_web::{get, web};
use serde_json::json;

use crate::db;
use crate::search::models::{AvailabilityQuery, SearchFilter};
use crate::server::Response;
use crate::validator::Validator;

#[get("/search/arenas")]
async fn search_arenas(filter: Query<SearchFilter>, pool: Data<db::Pool>) -> Response {
    let filter = filter.into_inner();

    let page = web::block(move || {
        let conn = pool.get()?;
        filter.search(&conn)
    })
    .await?;

    http_ok_json!(json!({
        "success": true,
        "arenas": page.arenas,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
        "facets": page.facets,
    }));
}

#[get("/check-availability")]
async fn check_availability(
    query: Query<Validator<AvailabilityQuery>>,
    pool: Data<db::Pool>,
) -> Response {
    let query = query.into_inner().validate()?;

    let availability = web::block(move || {
        let conn = pool.get()?;
        query.check(&conn)
    })
    .await?;

    http_ok_json!(json!({
        "success": true,
        "is_available": availability.is_available,
        "court_name": availability.court_name,
        "price_per_hour": availability.price_per_hour,
    }));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(search_arenas);
    cfg.service(check_availability);
}
