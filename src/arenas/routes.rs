use actix_identity::Identity;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, put, web};

use crate::arenas::models::{Arena, ArenaFilter, CreateArena, CreateCourt};
use crate::auth;
use crate::db;
use crate::server::Response;
use crate::validator::Validator;

#[get("/arenas")]
async fn find_all(query: Query<ArenaFilter>, pool: Data<db::Pool>) -> Response {
    let arenas = web::block(move || {
        let conn = pool.get()?;
        Arena::find_all(query.into_inner(), &conn)
    })
    .await?;

    http_ok_json!(arenas);
}

#[get("/arenas/{id}")]
async fn find(arena_id: Path<i64>, pool: Data<db::Pool>) -> Response {
    let arena = web::block(move || {
        let conn = pool.get()?;
        Arena::find_by_id(*arena_id, &conn)
    })
    .await?;

    http_ok_json!(arena);
}

#[post("/arenas")]
async fn create(arena: Json<Validator<CreateArena>>, id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::verify_owner(&id)?;

    let mut arena = arena.into_inner().validate()?;
    arena.owner_id = user.id;

    let arena = web::block(move || {
        let conn = pool.get()?;
        Arena::create(arena, &conn)
    })
    .await?;

    http_created_json!(arena);
}

#[put("/arenas")]
async fn update(arena: Json<Arena>, id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::verify_owner(&id)?;
    let arena = arena.into_inner();

    let arena = web::block(move || {
        let conn = pool.get()?;
        let current = Arena::find_by_id(arena.id, &conn)?;
        if !current.is_owner(&user) {
            forbidden!("only the arena owner can update an arena");
        }
        arena.update(&conn)
    })
    .await?;

    http_ok_json!(arena);
}

#[get("/arenas/{id}/courts")]
async fn courts(arena_id: Path<i64>, pool: Data<db::Pool>) -> Response {
    let courts = web::block(move || {
        let conn = pool.get()?;
        Arena::find_by_id(*arena_id, &conn)?.courts(&conn)
    })
    .await?;

    http_ok_json!(courts);
}

#[post("/arenas/{id}/courts")]
async fn create_court(
    arena_id: Path<i64>,
    court: Json<Validator<CreateCourt>>,
    id: Identity,
    pool: Data<db::Pool>,
) -> Response {
    let user = auth::verify_owner(&id)?;
    let mut court = court.into_inner().validate()?;

    let court = web::block(move || {
        let conn = pool.get()?;
        let arena = Arena::find_by_id(*arena_id, &conn)?;
        if !arena.is_owner(&user) {
            forbidden!("only the arena owner can add courts");
        }
        court.arena_id = arena.id;
        crate::arenas::Court::create(court, &conn)
    })
    .await?;

    http_created_json!(court);
}

#[derive(Debug, Deserialize)]
pub struct SportAssignment {
    pub sport_id: i64,
}

#[post("/courts/{id}/sports")]
async fn add_sport(
    court_id: Path<i64>,
    assignment: Json<SportAssignment>,
    id: Identity,
    pool: Data<db::Pool>,
) -> Response {
    let user = auth::verify_owner(&id)?;
    let sport_id = assignment.sport_id;

    web::block(move || {
        let conn = pool.get()?;
        let court = crate::arenas::Court::find_by_id(*court_id, &conn)?;
        let arena = Arena::find_by_id(court.arena_id, &conn)?;
        if !arena.is_owner(&user) {
            forbidden!("only the arena owner can assign sports");
        }
        court.add_sport(sport_id, &conn)
    })
    .await?;

    http_created_json!(serde_json::json!({ "success": true }));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(find_all);
    cfg.service(find);
    cfg.service(create);
    cfg.service(update);
    cfg.service(courts);
    cfg.service(create_court);
    cfg.service(add_sport);
}
