use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{get, middleware, web, App, HttpRequest, HttpResponse, HttpServer};

use crate::admin;
use crate::arenas;
use crate::auth;
use crate::bookings;
use crate::config::Config;
use crate::db;
use crate::errors::ServiceError;
use crate::reviews;
use crate::search;
use crate::slots;
use crate::stats;
use crate::users;

pub type Response = Result<HttpResponse, ServiceError>;

#[get("/health")]
async fn health(_: HttpRequest) -> &'static str {
    "ok"
}

pub async fn launch(db_pool: db::Pool) -> std::io::Result<()> {
    let stats = web::Data::new(stats::Stats::new());

    HttpServer::new(move || {
        App::new()
            .data(db_pool.clone())
            .app_data(stats.clone())
            .wrap(middleware::DefaultHeaders::new().header("X-Version", env!("CARGO_PKG_VERSION")))
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::default())
            .wrap(stats::Middleware::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(Config::session_private_key().as_bytes())
                    .name("matchpoint-auth")
                    .secure(false),
            ))
            .data(web::JsonConfig::default().limit(262_144))
            .data(web::PayloadConfig::default().limit(262_144))
            .service(stats::route)
            .service(
                web::scope("/api")
                    .configure(auth::routes::register_routes)
                    .configure(users::routes::register)
                    .configure(arenas::routes::register)
                    .configure(slots::routes::register)
                    .configure(search::routes::register)
                    .configure(bookings::routes::register)
                    .configure(reviews::routes::register)
                    .configure(admin::routes::register)
                    .service(health),
            )
    })
    .bind(format!("{}:{}", Config::api_host(), Config::api_port()))?
    .run()
    .await
}
