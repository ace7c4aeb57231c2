use actix_identity::Identity;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, web};
use serde_json::json;

use crate::auth;
use crate::bookings::models::{Booking, CreateBooking};
use crate::db;
use crate::server::Response;

#[post("/bookings")]
async fn create(booking: Json<CreateBooking>, id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::get_user(&id)?;
    let booking = booking.into_inner();

    let booking = web::block(move || {
        let conn = pool.get()?;
        Booking::create(user.id, &booking.slot, &booking.token, &conn)
    })
    .await?;

    http_created_json!(json!({ "success": true, "booking": booking }));
}

#[get("/bookings")]
async fn find_mine(id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::get_user(&id)?;

    let bookings = web::block(move || {
        let conn = pool.get()?;
        Booking::find_by_user(user.id, &conn)
    })
    .await?;

    http_ok_json!(bookings);
}

#[post("/bookings/{id}/cancel")]
async fn cancel(booking_id: Path<i64>, id: Identity, pool: Data<db::Pool>) -> Response {
    let user = auth::get_user(&id)?;

    let booking = web::block(move || {
        let conn = pool.get()?;
        let booking = Booking::find_by_id(*booking_id, &conn)?;
        if booking.user_id != user.id && !user.is_admin() {
            forbidden!("only the booking owner can cancel a booking");
        }
        booking.cancel(&conn)
    })
    .await?;

    http_ok_json!(json!({ "success": true, "booking": booking }));
}

#[post("/bookings/{id}/complete")]
async fn complete(booking_id: Path<i64>, id: Identity, pool: Data<db::Pool>) -> Response {
    auth::verify_manager(&id)?;

    let booking = web::block(move || {
        let conn = pool.get()?;
        Booking::find_by_id(*booking_id, &conn)?.complete(&conn)
    })
    .await?;

    http_ok_json!(json!({ "success": true, "booking": booking }));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(create);
    cfg.service(find_mine);
    cfg.service(cancel);
    cfg.service(complete);
}
