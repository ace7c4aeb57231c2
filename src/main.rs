//! matchpoint: a sports-arena booking backend built around a
//! conflict-free slot reservation core.
#![warn(rust_2018_idioms)]

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate diesel;

#[macro_use]
extern crate diesel_migrations;

use anyhow::Error;
use dotenv::dotenv;

#[macro_use]
mod macros;

mod admin;
mod arenas;
mod auth;
mod bookings;
mod config;
mod db;
mod errors;
mod reviews;
mod schema;
mod search;
mod server;
mod slots;
mod stats;
mod users;
mod validator;

#[actix_web::main]
async fn main() -> anyhow::Result<(), Error> {
    init().await?;

    Ok(())
}

async fn init() -> anyhow::Result<(), Error> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .expect("unable to initialize the tracing subscriber");

    db::migrate(config::Config::database_url())
        .map_err(|e| anyhow::anyhow!("unable to run the database migrations: {}", e))?;

    let pool = db::build_connection_pool(config::Config::database_url())
        .map_err(|e| anyhow::anyhow!("unable to build the connection pool: {}", e))?;

    debug!("launching the actix webserver");
    server::launch(pool).await?;

    Ok(())
}
