use actix_identity::Identity;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, web};
use serde_json::json;

use crate::arenas::Arena;
use crate::auth;
use crate::bookings::Booking;
use crate::config::Config;
use crate::db;
use crate::server::Response;
use crate::users::User;

#[post("/admin/arenas/{id}/block")]
async fn block_arena(arena_id: Path<i64>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::verify_admin(&id)?;

    let arena = web::block(move || {
        let conn = pool.get()?;
        Arena::set_blocked(*arena_id, true, &conn)
    })
    .await?;

    info!("arena {} blocked over commission compliance", arena.id);

    http_ok_json!(arena);
}

#[post("/admin/arenas/{id}/unblock")]
async fn unblock_arena(arena_id: Path<i64>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::verify_admin(&id)?;

    let arena = web::block(move || {
        let conn = pool.get()?;
        Arena::set_blocked(*arena_id, false, &conn)
    })
    .await?;

    http_ok_json!(arena);
}

#[get("/admin/counts")]
async fn counts(id: Identity, pool: Data<db::Pool>) -> Response {
    auth::verify_admin(&id)?;

    let counts = web::block(move || {
        let conn = pool.get()?;
        Ok::<_, crate::errors::ServiceError>((
            Arena::count(&conn)?,
            Booking::count(&conn)?,
            User::count(&conn)?,
        ))
    })
    .await?;

    http_ok_json!(json!({
        "arenas": counts.0,
        "bookings": counts.1,
        "users": counts.2,
    }));
}

#[derive(Debug, Deserialize)]
pub struct HoldDuration {
    pub seconds: u64,
}

/// tune how long slot holds stay valid, without a restart
#[post("/admin/server/hold-duration")]
async fn set_hold_duration(duration: Json<HoldDuration>, id: Identity) -> Response {
    auth::verify_admin(&id)?;

    if duration.seconds == 0 {
        bad_request!("the hold duration has to be above 0 seconds");
    }

    Config::set_hold_duration_seconds(duration.seconds);

    http_ok_json!(json!({ "hold_duration_seconds": Config::hold_duration_seconds() }));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(block_arena);
    cfg.service(unblock_arena);
    cfg.service(counts);
    cfg.service(set_hold_duration);
}
