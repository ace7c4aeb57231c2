use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::time_slots;

/// One bookable unit: a court, a date and a time range.
///
/// A slot is bookable iff it is available, not blocked by the owner,
/// not a holiday, and not under an active hold. Expiry of a hold is
/// lazy: nothing ever resets `locked_until`, every reader and every
/// conditional update re-derives whether the hold is still valid.
#[derive(Debug, Serialize, Queryable, Identifiable, AsChangeset)]
pub struct TimeSlot {
    pub id: i64,
    pub arena_id: i64,
    pub court_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price_per_hour: i64,
    pub is_available: bool,
    pub is_blocked_by_owner: bool,
    pub is_holiday: bool,
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub lock_token: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// How clients address a slot: by court and exact time window,
/// never by surrogate id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlotRef {
    pub arena_id: i64,
    pub court_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A successfully acquired hold on a slot.
#[derive(Debug, Serialize)]
pub struct Hold {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[table_name = "time_slots"]
pub struct NewTimeSlot {
    pub arena_id: i64,
    pub court_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price_per_hour: i64,
}

// The whole check-and-lock of `try_lock` as one UPDATE statement. A macro
// so the tests can render the exact statement through `debug_query`.
macro_rules! lock_update {
    ($slot_ref:expr, $now:expr, $expires_at:expr, $token:expr) => {
        diesel::update(
            time_slots::table
                .filter(time_slots::arena_id.eq($slot_ref.arena_id))
                .filter(time_slots::court_id.eq($slot_ref.court_id))
                .filter(time_slots::date.eq($slot_ref.date))
                .filter(time_slots::start_time.eq($slot_ref.start_time))
                .filter(time_slots::end_time.eq($slot_ref.end_time))
                .filter(time_slots::is_available.eq(true))
                .filter(time_slots::is_blocked_by_owner.eq(false))
                .filter(time_slots::is_holiday.eq(false))
                .filter(
                    time_slots::locked_until
                        .is_null()
                        .or(time_slots::locked_until.lt($now)),
                ),
        )
        .set((
            time_slots::locked_until.eq($expires_at),
            time_slots::lock_token.eq($token),
        ))
    };
}

fn generate_token() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(32)
        .collect()
}

impl TimeSlot {
    pub fn find(slot_ref: &SlotRef, conn: &db::Conn) -> Result<TimeSlot, ServiceError> {
        let slot = time_slots::table
            .filter(time_slots::arena_id.eq(slot_ref.arena_id))
            .filter(time_slots::court_id.eq(slot_ref.court_id))
            .filter(time_slots::date.eq(slot_ref.date))
            .filter(time_slots::start_time.eq(slot_ref.start_time))
            .filter(time_slots::end_time.eq(slot_ref.end_time))
            .first(conn)?;

        Ok(slot)
    }

    /// the bookable invariant, evaluated against a row we already hold
    pub fn is_bookable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_available
            && !self.is_blocked_by_owner
            && !self.is_holiday
            && match self.locked_until {
                None => true,
                Some(expiry) => expiry < now,
            }
    }

    /// Acquire a hold on a slot.
    ///
    /// The whole check-and-lock is a single conditional UPDATE: the filter
    /// repeats the bookable invariant, so of two concurrent callers exactly
    /// one matches the row and the loser sees zero rows. An expired hold
    /// left by someone else is simply overwritten.
    #[tracing::instrument(name = "TimeSlot::try_lock", skip(conn))]
    pub fn try_lock(
        slot_ref: &SlotRef,
        hold_duration: Duration,
        conn: &db::Conn,
    ) -> Result<Hold, ServiceError> {
        let now = Utc::now();
        let expires_at = now + hold_duration;
        let token = generate_token();

        let updated = lock_update!(slot_ref, now, expires_at, &token)
            .get_result::<TimeSlot>(conn)
            .optional()?;

        match updated {
            Some(_) => Ok(Hold { token, expires_at }),
            None => {
                // distinguish an unknown slot from a lost race
                TimeSlot::find(slot_ref, conn)?;
                Err(ServiceError::Conflict(
                    "slot is not bookable right now".to_string(),
                ))
            }
        }
    }

    /// Commit a held slot: flips `is_available` off for good.
    ///
    /// Conditional on the presented token still owning an unexpired hold
    /// and the owner not having withdrawn the slot in the meantime.
    /// Retrying with the token of an already confirmed slot is Ok.
    #[tracing::instrument(name = "TimeSlot::confirm", skip(token, conn))]
    pub fn confirm(
        slot_ref: &SlotRef,
        token: &str,
        conn: &db::Conn,
    ) -> Result<TimeSlot, ServiceError> {
        let now = Utc::now();

        let updated = diesel::update(
            time_slots::table
                .filter(time_slots::arena_id.eq(slot_ref.arena_id))
                .filter(time_slots::court_id.eq(slot_ref.court_id))
                .filter(time_slots::date.eq(slot_ref.date))
                .filter(time_slots::start_time.eq(slot_ref.start_time))
                .filter(time_slots::end_time.eq(slot_ref.end_time))
                .filter(time_slots::lock_token.eq(token))
                .filter(time_slots::is_available.eq(true))
                .filter(time_slots::is_blocked_by_owner.eq(false))
                .filter(time_slots::is_holiday.eq(false))
                .filter(time_slots::locked_until.ge(now)),
        )
        .set(time_slots::is_available.eq(false))
        .get_result::<TimeSlot>(conn)
        .optional()?;

        match updated {
            Some(slot) => Ok(slot),
            None => {
                let slot = TimeSlot::find(slot_ref, conn)?;
                slot.classify_failed_confirm(token, now)?;
                Ok(slot)
            }
        }
    }

    /// Decide what a zero-row confirm means. `Ok(())` is the idempotent
    /// retry case: the token already confirmed this slot earlier.
    fn classify_failed_confirm(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if self.lock_token.as_deref() != Some(token) {
            return Err(ServiceError::InvalidToken);
        }

        if !self.is_available {
            return Ok(());
        }

        if self.is_blocked_by_owner || self.is_holiday {
            // the owner withdrew the slot while it was held, the accepted race
            return Err(ServiceError::Conflict(
                "the owner has withdrawn this slot".to_string(),
            ));
        }

        match self.locked_until {
            Some(expiry) if expiry < now => Err(ServiceError::Expired),
            _ => Err(ServiceError::Conflict(
                "slot state changed, please retry".to_string(),
            )),
        }
    }

    /// Give up a hold before it expires, returning the slot to the pool.
    #[tracing::instrument(name = "TimeSlot::release", skip(token, conn))]
    pub fn release(slot_ref: &SlotRef, token: &str, conn: &db::Conn) -> Result<(), ServiceError> {
        let released = diesel::update(
            time_slots::table
                .filter(time_slots::arena_id.eq(slot_ref.arena_id))
                .filter(time_slots::court_id.eq(slot_ref.court_id))
                .filter(time_slots::date.eq(slot_ref.date))
                .filter(time_slots::start_time.eq(slot_ref.start_time))
                .filter(time_slots::end_time.eq(slot_ref.end_time))
                .filter(time_slots::lock_token.eq(token))
                .filter(time_slots::is_available.eq(true)),
        )
        .set((
            time_slots::locked_until.eq(None::<DateTime<Utc>>),
            time_slots::lock_token.eq(None::<String>),
        ))
        .execute(conn)?;

        if released == 0 {
            TimeSlot::find(slot_ref, conn)?;
            return Err(ServiceError::InvalidToken);
        }

        Ok(())
    }

    /// Owner override. Unconditional: owner authority trumps an in-flight
    /// hold, the holder finds out when their confirm fails.
    pub fn set_owner_block(
        slot_ref: &SlotRef,
        blocked: bool,
        conn: &db::Conn,
    ) -> Result<TimeSlot, ServiceError> {
        let slot = diesel::update(
            time_slots::table
                .filter(time_slots::arena_id.eq(slot_ref.arena_id))
                .filter(time_slots::court_id.eq(slot_ref.court_id))
                .filter(time_slots::date.eq(slot_ref.date))
                .filter(time_slots::start_time.eq(slot_ref.start_time))
                .filter(time_slots::end_time.eq(slot_ref.end_time)),
        )
        .set(time_slots::is_blocked_by_owner.eq(blocked))
        .get_result(conn)?;

        Ok(slot)
    }

    /// Owner override, same authority rules as [`TimeSlot::set_owner_block`].
    pub fn set_holiday(
        slot_ref: &SlotRef,
        holiday: bool,
        conn: &db::Conn,
    ) -> Result<TimeSlot, ServiceError> {
        let slot = diesel::update(
            time_slots::table
                .filter(time_slots::arena_id.eq(slot_ref.arena_id))
                .filter(time_slots::court_id.eq(slot_ref.court_id))
                .filter(time_slots::date.eq(slot_ref.date))
                .filter(time_slots::start_time.eq(slot_ref.start_time))
                .filter(time_slots::end_time.eq(slot_ref.end_time)),
        )
        .set(time_slots::is_holiday.eq(holiday))
        .get_result(conn)?;

        Ok(slot)
    }

    /// External cancellation path: a cancelled booking hands the slot
    /// back to the pool, clearing any leftover hold bookkeeping.
    pub fn set_available(slot_id: i64, conn: &db::Conn) -> Result<TimeSlot, ServiceError> {
        let slot = diesel::update(time_slots::table.filter(time_slots::id.eq(slot_id)))
            .set((
                time_slots::is_available.eq(true),
                time_slots::locked_until.eq(None::<DateTime<Utc>>),
                time_slots::lock_token.eq(None::<String>),
            ))
            .get_result(conn)?;

        Ok(slot)
    }

    /// the amount of unexpired holds at this moment, for /stats
    pub fn active_holds(conn: &db::Conn) -> Result<i64, ServiceError> {
        let count = time_slots::table
            .filter(time_slots::is_available.eq(true))
            .filter(time_slots::locked_until.ge(Utc::now()))
            .count()
            .first::<i64>(conn)?;

        Ok(count)
    }
}

impl crate::validator::Validate<SlotRef> for SlotRef {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.start_time >= self.end_time {
            bad_request!("the slot has to end after it starts");
        }

        Ok(())
    }
}

/// **POST /api/arenas/{id}/schedule**
///
/// Generates the hourly slots of one court for a date. Re-running the
/// generation skips slots that already exist.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub court_id: i64,
    pub date: NaiveDate,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

impl ScheduleRequest {
    /// unroll the opening hours into hourly slot records,
    /// a trailing partial hour is dropped
    pub fn unroll(&self, arena_id: i64, price_per_hour: i64) -> Vec<NewTimeSlot> {
        let mut slots = Vec::new();
        let mut start = self.open_time;

        loop {
            // the i64 is the amount of wrapped-around days, a wrap
            // means we ran past midnight
            let (end, wrapped) = start.overflowing_add_signed(Duration::hours(1));
            if wrapped != 0 || end > self.close_time || end <= start {
                break;
            }

            slots.push(NewTimeSlot {
                arena_id,
                court_id: self.court_id,
                date: self.date,
                start_time: start,
                end_time: end,
                price_per_hour,
            });

            start = end;
        }

        slots
    }

    pub fn save(&self, arena_id: i64, conn: &db::Conn) -> Result<usize, ServiceError> {
        let court = crate::arenas::Court::find_by_id(self.court_id, conn)?;

        if court.arena_id != arena_id {
            bad_request!("that court does not belong to this arena");
        }

        let slots = self.unroll(arena_id, court.price_per_hour);

        let inserted = diesel::insert_into(time_slots::table)
            .values(&slots)
            .on_conflict_do_nothing()
            .execute(conn)?;

        Ok(inserted)
    }
}

impl crate::validator::Validate<ScheduleRequest> for ScheduleRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.open_time >= self.close_time {
            bad_request!("the arena has to close after it opens");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validate;

    fn slot() -> TimeSlot {
        TimeSlot {
            id: 1,
            arena_id: 1,
            court_id: 5,
            date: NaiveDate::from_ymd(2024, 6, 1),
            start_time: NaiveTime::from_hms(10, 0, 0),
            end_time: NaiveTime::from_hms(11, 0, 0),
            price_per_hour: 2500,
            is_available: true,
            is_blocked_by_owner: false,
            is_holiday: false,
            locked_until: None,
            lock_token: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn bookable_invariant() {
        let now = Utc::now();

        assert!(slot().is_bookable_at(now));

        let mut unavailable = slot();
        unavailable.is_available = false;
        assert!(!unavailable.is_bookable_at(now));

        let mut blocked = slot();
        blocked.is_blocked_by_owner = true;
        assert!(!blocked.is_bookable_at(now));

        let mut holiday = slot();
        holiday.is_holiday = true;
        assert!(!holiday.is_bookable_at(now));
    }

    #[test]
    fn try_lock_checks_and_locks_in_one_statement() {
        let slot_ref = SlotRef {
            arena_id: 1,
            court_id: 5,
            date: NaiveDate::from_ymd(2024, 6, 1),
            start_time: NaiveTime::from_hms(10, 0, 0),
            end_time: NaiveTime::from_hms(11, 0, 0),
        };
        let now = Utc::now();

        let statement = lock_update!(slot_ref, now, now + Duration::minutes(5), "token");
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&statement).to_string();

        // the filter carries the full bookable invariant, so of two
        // concurrent callers exactly one matches the row and wins
        assert!(sql.starts_with("UPDATE"));
        assert!(sql.contains(r#""is_available""#));
        assert!(sql.contains(r#""is_blocked_by_owner""#));
        assert!(sql.contains(r#""is_holiday""#));
        assert!(sql.contains(r#""locked_until" IS NULL"#));
        assert!(sql.contains(r#""locked_until" <"#));
    }

    #[test]
    fn expired_holds_are_bookable_again() {
        let now = Utc::now();

        let mut held = slot();
        held.locked_until = Some(now + Duration::minutes(5));
        held.lock_token = Some("t".to_string());
        assert!(!held.is_bookable_at(now));

        // nothing clears the fields, the next read treats the lapsed
        // hold as free
        held.locked_until = Some(now - Duration::seconds(1));
        assert!(held.is_bookable_at(now));
    }

    #[test]
    fn foreign_token_is_invalid() {
        let now = Utc::now();
        let mut held = slot();
        held.locked_until = Some(now + Duration::minutes(5));
        held.lock_token = Some("winner".to_string());

        assert_eq!(
            held.classify_failed_confirm("loser", now),
            Err(ServiceError::InvalidToken)
        );
    }

    #[test]
    fn confirm_is_idempotent_for_the_same_token() {
        let now = Utc::now();
        let mut confirmed = slot();
        confirmed.is_available = false;
        confirmed.locked_until = Some(now + Duration::minutes(5));
        confirmed.lock_token = Some("winner".to_string());

        assert_eq!(confirmed.classify_failed_confirm("winner", now), Ok(()));
        assert_eq!(
            confirmed.classify_failed_confirm("loser", now),
            Err(ServiceError::InvalidToken)
        );
    }

    #[test]
    fn lapsed_hold_reports_expired() {
        let now = Utc::now();
        let mut lapsed = slot();
        lapsed.locked_until = Some(now - Duration::seconds(30));
        lapsed.lock_token = Some("winner".to_string());

        assert_eq!(
            lapsed.classify_failed_confirm("winner", now),
            Err(ServiceError::Expired)
        );
    }

    #[test]
    fn owner_block_beats_a_valid_hold() {
        let now = Utc::now();
        let mut withdrawn = slot();
        withdrawn.locked_until = Some(now + Duration::minutes(5));
        withdrawn.lock_token = Some("winner".to_string());
        withdrawn.is_blocked_by_owner = true;

        // the token is still valid, the owner's block wins anyway
        assert!(matches!(
            withdrawn.classify_failed_confirm("winner", now),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn schedule_unrolls_into_hourly_slots() {
        let request = ScheduleRequest {
            court_id: 5,
            date: NaiveDate::from_ymd(2024, 6, 1),
            open_time: NaiveTime::from_hms(9, 0, 0),
            close_time: NaiveTime::from_hms(12, 0, 0),
        };

        let slots = request.unroll(1, 2500);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start_time, NaiveTime::from_hms(9, 0, 0));
        assert_eq!(slots[0].end_time, NaiveTime::from_hms(10, 0, 0));
        assert_eq!(slots[2].end_time, NaiveTime::from_hms(12, 0, 0));
    }

    #[test]
    fn schedule_drops_a_trailing_partial_hour() {
        let request = ScheduleRequest {
            court_id: 5,
            date: NaiveDate::from_ymd(2024, 6, 1),
            open_time: NaiveTime::from_hms(9, 0, 0),
            close_time: NaiveTime::from_hms(10, 30, 0),
        };

        assert_eq!(request.unroll(1, 2500).len(), 1);
    }

    #[test]
    fn invalid_time_windows() {
        let mut slot_ref = SlotRef {
            arena_id: 1,
            court_id: 5,
            date: NaiveDate::from_ymd(2024, 6, 1),
            start_time: NaiveTime::from_hms(11, 0, 0),
            end_time: NaiveTime::from_hms(10, 0, 0),
        };

        assert!(slot_ref.validate().is_err());

        slot_ref.end_time = slot_ref.start_time;
        assert!(slot_ref.validate().is_err());

        slot_ref.end_time = NaiveTime::from_hms(12, 0, 0);
        assert!(slot_ref.validate().is_ok());
    }
}
