use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::bookings;
use crate::slots::{SlotRef, TimeSlot};

/// Booking lifecycle. A booking is only created once its slot is
/// confirmed, so PENDING exists for externally initiated flows
/// (e.g. payment-first) and is not produced by [`Booking::create`].
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
pub enum Status {
    PENDING,
    CONFIRMED,
    CANCELLED,
    COMPLETED,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for Status {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Status, ServiceError> {
        match s {
            "PENDING" => Ok(Status::PENDING),
            "CONFIRMED" => Ok(Status::CONFIRMED),
            "CANCELLED" => Ok(Status::CANCELLED),
            "COMPLETED" => Ok(Status::COMPLETED),
            _ => Err(ServiceError::InternalServerError),
        }
    }
}

impl Status {
    /// The statuses that keep a slot claimed, as they live in the
    /// status column. Mirrored by the partial unique index on
    /// `bookings (slot_id)`.
    pub fn active() -> Vec<String> {
        vec![Status::PENDING.to_string(), Status::CONFIRMED.to_string()]
    }

    /// CANCELLED and COMPLETED are terminal
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::PENDING, Status::CONFIRMED)
                | (Status::PENDING, Status::CANCELLED)
                | (Status::CONFIRMED, Status::CANCELLED)
                | (Status::CONFIRMED, Status::COMPLETED)
        )
    }
}

#[derive(Debug, Serialize, Queryable, Identifiable, AsChangeset)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub slot_id: i64,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[table_name = "bookings"]
struct NewBooking {
    user_id: i64,
    slot_id: i64,
    status: String,
}

/// **POST /api/bookings**
///
/// Consumes a hold acquired through **POST /api/slots/hold**.
#[derive(Debug, Deserialize)]
pub struct CreateBooking {
    pub slot: SlotRef,
    pub token: String,
}

impl Booking {
    /// Confirm the held slot and persist the booking in one transaction:
    /// if the insert fails the confirm rolls back and the hold stays
    /// intact, the caller can retry with the same token.
    #[tracing::instrument(name = "Booking::create", skip(token, conn))]
    pub fn create(
        user_id: i64,
        slot_ref: &SlotRef,
        token: &str,
        conn: &db::Conn,
    ) -> Result<Booking, ServiceError> {
        let booking = conn.transaction::<Booking, ServiceError, _>(|| {
            let slot = TimeSlot::confirm(slot_ref, token, conn)?;

            // confirm is idempotent for the same token, so create has to
            // be as well: a retry gets the booking that already claimed
            // the slot instead of a second row
            let existing = bookings::table
                .filter(bookings::slot_id.eq(slot.id))
                .filter(bookings::status.eq_any(Status::active()))
                .first::<Booking>(conn)
                .optional()?;

            if let Some(booking) = existing {
                if booking.user_id == user_id {
                    return Ok(booking);
                }
                return Err(ServiceError::Conflict(
                    "the slot is already booked".to_string(),
                ));
            }

            let booking = diesel::insert_into(bookings::table)
                .values(&NewBooking {
                    user_id,
                    slot_id: slot.id,
                    status: Status::CONFIRMED.to_string(),
                })
                .get_result(conn)?;

            Ok(booking)
        })?;

        Ok(booking)
    }

    pub fn find_by_id(booking_id: i64, conn: &db::Conn) -> Result<Booking, ServiceError> {
        let booking = bookings::table
            .filter(bookings::id.eq(booking_id))
            .first(conn)?;

        Ok(booking)
    }

    pub fn find_by_user(user_id: i64, conn: &db::Conn) -> Result<Vec<Booking>, ServiceError> {
        let bookings = bookings::table
            .filter(bookings::user_id.eq(user_id))
            .order(bookings::created_at.desc())
            .load::<Booking>(conn)?;

        Ok(bookings)
    }

    pub fn status(&self) -> Result<Status, ServiceError> {
        self.status.parse()
    }

    /// Cancel the booking and hand the slot back to the pool, the
    /// external path that turns a Confirmed slot Free again.
    #[tracing::instrument(name = "Booking::cancel", skip(conn))]
    pub fn cancel(&self, conn: &db::Conn) -> Result<Booking, ServiceError> {
        if !self.status()?.can_transition_to(Status::CANCELLED) {
            conflict!(format!("a {} booking can't be cancelled", self.status));
        }

        let booking = conn.transaction::<Booking, ServiceError, _>(|| {
            let booking: Booking = diesel::update(self)
                .set(bookings::status.eq(Status::CANCELLED.to_string()))
                .get_result(conn)?;

            TimeSlot::set_available(booking.slot_id, conn)?;

            Ok(booking)
        })?;

        Ok(booking)
    }

    pub fn complete(&self, conn: &db::Conn) -> Result<Booking, ServiceError> {
        if !self.status()?.can_transition_to(Status::COMPLETED) {
            conflict!(format!("a {} booking can't be completed", self.status));
        }

        let booking = diesel::update(self)
            .set(bookings::status.eq(Status::COMPLETED.to_string()))
            .get_result(conn)?;

        Ok(booking)
    }

    pub fn count(conn: &db::Conn) -> Result<i64, ServiceError> {
        let count = bookings::table.count().first::<i64>(conn)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_stay_terminal() {
        assert!(!Status::CANCELLED.can_transition_to(Status::CONFIRMED));
        assert!(!Status::COMPLETED.can_transition_to(Status::CANCELLED));
        assert!(!Status::CANCELLED.can_transition_to(Status::COMPLETED));
    }

    #[test]
    fn confirmed_bookings_can_close_either_way() {
        assert!(Status::CONFIRMED.can_transition_to(Status::CANCELLED));
        assert!(Status::CONFIRMED.can_transition_to(Status::COMPLETED));
        assert!(!Status::CONFIRMED.can_transition_to(Status::PENDING));
    }

    #[test]
    fn only_live_statuses_claim_a_slot() {
        let active = Status::active();

        assert!(active.contains(&Status::PENDING.to_string()));
        assert!(active.contains(&Status::CONFIRMED.to_string()));
        assert!(!active.contains(&Status::CANCELLED.to_string()));
        assert!(!active.contains(&Status::COMPLETED.to_string()));
    }

    #[test]
    fn the_schema_enforces_one_live_booking_per_slot() {
        // backstop for racing inserts; a plain UNIQUE (slot_id) would
        // block legitimate rebooking after a cancellation
        let ddl = include_str!("../../migrations/2024-05-01-000000_init/up.sql");

        assert!(ddl.contains(
            "CREATE UNIQUE INDEX one_active_booking_per_slot ON bookings (slot_id)"
        ));
        assert!(ddl.contains("WHERE status IN ('PENDING', 'CONFIRMED')"));
    }

    #[test]
    fn status_round_trips_through_its_column_representation() {
        for status in &[
            Status::PENDING,
            Status::CONFIRMED,
            Status::CANCELLED,
            Status::COMPLETED,
        ] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), *status);
        }
    }
}
