use actix_identity::Identity;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, web};

use crate::auth;
use crate::db;
use crate::reviews::models::{CreateReview, Review};
use crate::server::Response;
use crate::validator::Validator;

#[get("/arenas/{id}/reviews")]
async fn find_all(arena_id: Path<i64>, pool: Data<db::Pool>) -> Response {
    let reviews = web::block(move || {
        let conn = pool.get()?;
        Review::find_by_arena(*arena_id, &conn)
    })
    .await?;

    http_ok_json!(reviews);
}

#[post("/arenas/{id}/reviews")]
async fn create(
    arena_id: Path<i64>,
    review: Json<Validator<CreateReview>>,
    id: Identity,
    pool: Data<db::Pool>,
) -> Response {
    let user = auth::get_user(&id)?;

    let mut review = review.into_inner().validate()?;
    review.arena_id = *arena_id;
    review.user_id = user.id;

    let review = web::block(move || {
        let conn = pool.get()?;
        // reviewing requires the arena to exist, blocked arenas included
        crate::arenas::Arena::find_by_id(review.arena_id, &conn)?;
        Review::create(review, &conn)
    })
    .await?;

    http_created_json!(review);
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(find_all);
    cfg.service(create);
}
