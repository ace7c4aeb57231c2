use actix_identity::Identity;
use actix_web::http::StatusCode;
use actix_web::web::{Data, Json};
use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::auth;
use crate::auth::models::{Credentials, SessionUser};
use crate::db;
use crate::errors::ServiceError;
use crate::server::Response;
use crate::users::models::{User, UserMessage};
use crate::validator::Validator;

#[post("/register")]
async fn register(user: Json<Validator<UserMessage>>, pool: Data<db::Pool>) -> Response {
    let mut user = user.into_inner().validate()?;

    web::block(move || {
        let conn = pool.get()?;
        User::create(&mut user, &conn)
    })
    .await?;

    Ok(HttpResponse::new(StatusCode::OK))
}

#[post("/login")]
async fn login(credentials: Json<Credentials>, id: Identity, pool: Data<db::Pool>) -> Response {
    let Credentials { email, password } = credentials.into_inner();

    let user = web::block(move || {
        let conn = pool.get()?;
        User::find_by_email(&email, &conn).map_err(|error| match error {
            // hide whether the account exists
            ServiceError::NotFound => ServiceError::Unauthorized,
            _ => error,
        })
    })
    .await?;

    user.verify_password(password.as_bytes())?;

    let session = SessionUser {
        id: user.id,
        role: user.role()?,
        email: user.email.clone(),
    };

    id.remember(serde_json::to_string(&session).map_err(|e| {
        error!("unable to serialize the session user: {}", e);
        ServiceError::InternalServerError
    })?);

    http_ok_json!(session);
}

#[post("/logout")]
async fn logout(id: Identity) -> Response {
    match auth::get_user(&id) {
        Ok(_) => {
            id.forget();
            Ok(HttpResponse::Ok().json(json!({ "message": "Successfully signed out" })))
        }
        Err(_) => Err(ServiceError::Unauthorized),
    }
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(login);
    cfg.service(logout);
}
