use actix_identity::Identity;
use actix_web::web::{Data, Json};
use actix_web::{get, put, web};

use crate::auth;
use crate::db;
use crate::server::Response;
use crate::users::models::User;

#[get("/users/me")]
async fn me(id: Identity, pool: Data<db::Pool>) -> Response {
    let session = auth::get_user(&id)?;

    let user = web::block(move || {
        let conn = pool.get()?;
        User::find_by_id(session.id, &conn)
    })
    .await?;

    http_ok_json!(user);
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub user_id: i64,
    pub role: String,
}

/// promote or demote an account, admin only
#[put("/users/role")]
async fn change_role(change: Json<RoleChange>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::verify_admin(&id)?;
    let change = change.into_inner();

    let user = web::block(move || {
        let conn = pool.get()?;
        User::set_role(change.user_id, &change.role, &conn)
    })
    .await?;

    http_ok_json!(user);
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(me);
    cfg.service(change_role);
}
