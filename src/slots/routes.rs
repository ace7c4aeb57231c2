use actix_identity::Identity;
use actix_web::web::{Data, Json, Path};
use actix_web::{post, put, web};
use chrono::Duration;
use serde_json::json;

use crate::arenas::Arena;
use crate::auth;
use crate::config::Config;
use crate::db;
use crate::server::Response;
use crate::slots::models::{ScheduleRequest, SlotRef, TimeSlot};
use crate::validator::Validator;

/// the slot + token pair sent along for confirm and release
#[derive(Debug, Deserialize)]
pub struct HoldAction {
    pub slot: SlotRef,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockAction {
    pub slot: SlotRef,
    pub blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct HolidayAction {
    pub slot: SlotRef,
    pub holiday: bool,
}

#[post("/slots/hold")]
async fn hold(slot: Json<Validator<SlotRef>>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::get_user(&id)?;
    let slot = slot.into_inner().validate()?;

    let hold = web::block(move || {
        let conn = pool.get()?;
        let duration = Duration::seconds(Config::hold_duration_seconds() as i64);
        TimeSlot::try_lock(&slot, duration, &conn)
    })
    .await?;

    http_ok_json!(json!({
        "success": true,
        "token": hold.token,
        "expires_at": hold.expires_at,
    }));
}

#[post("/slots/confirm")]
async fn confirm(action: Json<HoldAction>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::get_user(&id)?;
    let action = action.into_inner();

    let slot = web::block(move || {
        let conn = pool.get()?;
        TimeSlot::confirm(&action.slot, &action.token, &conn)
    })
    .await?;

    http_ok_json!(json!({ "success": true, "slot": slot }));
}

#[post("/slots/release")]
async fn release(action: Json<HoldAction>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::get_user(&id)?;
    let action = action.into_inner();

    web::block(move || {
        let conn = pool.get()?;
        TimeSlot::release(&action.slot, &action.token, &conn)
    })
    .await?;

    http_ok_json!(json!({ "success": true }));
}

#[put("/slots/block")]
async fn block(action: Json<BlockAction>, id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::verify_owner(&id)?;
    let action = action.into_inner();

    let slot = web::block(move || {
        let conn = pool.get()?;
        let arena = Arena::find_by_id(action.slot.arena_id, &conn)?;
        if !arena.is_owner(&user) {
            forbidden!("only the arena owner can block slots");
        }
        TimeSlot::set_owner_block(&action.slot, action.blocked, &conn)
    })
    .await?;

    http_ok_json!(json!({ "success": true, "slot": slot }));
}

#[put("/slots/holiday")]
async fn holiday(action: Json<HolidayAction>, id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::verify_owner(&id)?;
    let action = action.into_inner();

    let slot = web::block(move || {
        let conn = pool.get()?;
        let arena = Arena::find_by_id(action.slot.arena_id, &conn)?;
        if !arena.is_owner(&user) {
            forbidden!("only the arena owner can mark holidays");
        }
        TimeSlot::set_holiday(&action.slot, action.holiday, &conn)
    })
    .await?;

    http_ok_json!(json!({ "success": true, "slot": slot }));
}

#[post("/arenas/{id}/schedule")]
async fn generate_schedule(
    arena_id: Path<i64>,
    schedule: Json<Validator<ScheduleRequest>>,
    id: Identity,
    pool: Data<db::Pool>,
) -> Response {
    let user = auth::verify_owner(&id)?;
    let schedule = schedule.into_inner().validate()?;

    let created = web::block(move || {
        let conn = pool.get()?;
        let arena = Arena::find_by_id(*arena_id, &conn)?;
        if !arena.is_owner(&user) {
            forbidden!("only the arena owner can generate schedules");
        }
        schedule.save(arena.id, &conn)
    })
    .await?;

    http_created_json!(json!({ "success": true, "created_slots": created }));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(hold);
    cfg.service(confirm);
    cfg.service(release);
    cfg.service(block);
    cfg.service(holiday);
    cfg.service(generate_schedule);
}
