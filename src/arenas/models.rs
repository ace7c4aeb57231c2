use chrono::{DateTime, Utc};
use diesel::prelude::*;
use regex::Regex;
use url::Url;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::{arenas, court_sports, courts, sports};

#[derive(Debug, Serialize, Deserialize, Queryable, Identifiable, AsChangeset)]
pub struct Arena {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: String,
    pub address: String,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub is_blocked: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// **POST /api/arenas**
///
/// The owner_id is ignored when sent, it's taken from the session.
#[derive(Debug, Deserialize, Insertable)]
#[table_name = "arenas"]
pub struct CreateArena {
    pub name: String,
    #[serde(skip)]
    pub owner_id: i64,
    pub description: String,
    pub address: String,
    pub image_url: Option<String>,
}

/// filters for the owner/admin arena listing
#[derive(Debug, Deserialize)]
pub struct ArenaFilter {
    /// filter arenas by %name%
    pub name: Option<String>,
    pub owner_id: Option<i64>,
    /// default false, set to true to include blocked arenas
    pub include_blocked: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Queryable, Identifiable, AsChangeset)]
pub struct Court {
    pub id: i64,
    pub arena_id: i64,
    pub name: String,
    pub price_per_hour: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// **POST /api/arenas/{id}/courts**
#[derive(Debug, Deserialize, Insertable)]
#[table_name = "courts"]
pub struct CreateCourt {
    #[serde(skip)]
    pub arena_id: i64,
    pub name: String,
    /// price in cents
    pub price_per_hour: i64,
}

#[derive(Debug, Serialize, Queryable)]
pub struct Sport {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize, Insertable)]
#[table_name = "court_sports"]
pub struct CourtSport {
    pub court_id: i64,
    pub sport_id: i64,
}

impl Arena {
    pub fn create(new_arena: CreateArena, conn: &db::Conn) -> Result<Arena, ServiceError> {
        let arena = diesel::insert_into(arenas::table)
            .values(&new_arena)
            .get_result(conn)?;

        Ok(arena)
    }

    pub fn find_by_id(arena_id: i64, conn: &db::Conn) -> Result<Arena, ServiceError> {
        let arena = arenas::table.filter(arenas::id.eq(arena_id)).first(conn)?;

        Ok(arena)
    }

    pub fn find_all(filter: ArenaFilter, conn: &db::Conn) -> Result<Vec<Arena>, ServiceError> {
        let mut query = arenas::table.order(arenas::id).into_boxed();

        if !filter.include_blocked.unwrap_or(false) {
            query = query.filter(arenas::is_blocked.eq(false));
        }

        if let Some(id) = filter.owner_id {
            query = query.filter(arenas::owner_id.eq(id));
        }

        if let Some(name) = filter.name {
            query = query.filter(arenas::name.ilike(format!("%{}%", name)));
        }

        let arenas = query.load::<Arena>(conn)?;
        Ok(arenas)
    }

    /// returns true if a user owns this arena or is an admin
    pub fn is_owner(&self, user: &crate::auth::SessionUser) -> bool {
        user.is_admin() || user.id == self.owner_id
    }

    pub fn update(&self, conn: &db::Conn) -> Result<Arena, ServiceError> {
        let arena = diesel::update(self).set(self).get_result(conn)?;

        Ok(arena)
    }

    /// the commission-compliance gate: a blocked arena disappears from
    /// search results and can't take new bookings, admin only
    pub fn set_blocked(
        arena_id: i64,
        blocked: bool,
        conn: &db::Conn,
    ) -> Result<Arena, ServiceError> {
        let arena = diesel::update(arenas::table.filter(arenas::id.eq(arena_id)))
            .set(arenas::is_blocked.eq(blocked))
            .get_result(conn)?;

        Ok(arena)
    }

    pub fn count(conn: &db::Conn) -> Result<i64, ServiceError> {
        let count = arenas::table.count().first::<i64>(conn)?;

        Ok(count)
    }

    pub fn courts(&self, conn: &db::Conn) -> Result<Vec<Court>, ServiceError> {
        let courts = courts::table
            .filter(courts::arena_id.eq(self.id))
            .order(courts::id)
            .load::<Court>(conn)?;

        Ok(courts)
    }
}

impl Court {
    pub fn create(new_court: CreateCourt, conn: &db::Conn) -> Result<Court, ServiceError> {
        let court = diesel::insert_into(courts::table)
            .values(&new_court)
            .get_result(conn)?;

        Ok(court)
    }

    pub fn find_by_id(court_id: i64, conn: &db::Conn) -> Result<Court, ServiceError> {
        let court = courts::table.filter(courts::id.eq(court_id)).first(conn)?;

        Ok(court)
    }

    /// attach a sport to this court, unknown sports are rejected
    pub fn add_sport(&self, sport_id: i64, conn: &db::Conn) -> Result<(), ServiceError> {
        let exists = sports::table
            .filter(sports::id.eq(sport_id))
            .select(sports::id)
            .first::<i64>(conn)
            .optional()?;

        if exists.is_none() {
            bad_request!("unknown sport");
        }

        diesel::insert_into(court_sports::table)
            .values(&CourtSport {
                court_id: self.id,
                sport_id,
            })
            .execute(conn)?;

        Ok(())
    }

    pub fn sports(&self, conn: &db::Conn) -> Result<Vec<Sport>, ServiceError> {
        let sports = court_sports::table
            .inner_join(sports::table)
            .filter(court_sports::court_id.eq(self.id))
            .select((sports::id, sports::name))
            .load::<Sport>(conn)?;

        Ok(sports)
    }
}

impl crate::validator::Validate<CreateArena> for CreateArena {
    fn validate(&self) -> Result<(), ServiceError> {
        let pattern: Regex = Regex::new(r"^[a-zA-Z0-9_-]+( [a-zA-Z0-9_&-]+)*$").unwrap();

        if self.name.trim().is_empty() {
            bad_request!("name is too short");
        }

        if self.name.trim().len() > 60 {
            bad_request!("name is too long, maximum 60 characters");
        }

        if !pattern.is_match(&self.name) {
            bad_request!("name can only contain letters, numbers, spaces, '&', '-' and '_'");
        }

        if self.address.trim().is_empty() {
            bad_request!("address is required");
        }

        if let Some(url) = self.image_url.as_ref() {
            if Url::parse(url).is_err() {
                bad_request!("the image url is not a valid url");
            }
        }

        Ok(())
    }
}

impl crate::validator::Validate<CreateCourt> for CreateCourt {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            bad_request!("name is too short");
        }

        if self.name.trim().len() > 40 {
            bad_request!("name is too long, maximum 40 characters");
        }

        if self.price_per_hour <= 0 {
            bad_request!("the hourly price has to be above 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validate;

    fn arena(name: &str) -> CreateArena {
        CreateArena {
            name: name.to_string(),
            owner_id: 1,
            description: "clay and hard courts".to_string(),
            address: "1 Center Court Lane".to_string(),
            image_url: None,
        }
    }

    #[test]
    fn valid_arena_names() {
        assert!(arena("Center-Court_01").validate().is_ok());
        assert!(arena("Smash & Dash Arena").validate().is_ok());
    }

    #[test]
    fn invalid_arena_names() {
        assert!(arena("").validate().is_err());
        assert!(arena("<html>").validate().is_err());
        assert!(arena("('drop table')").validate().is_err());
    }

    #[test]
    fn image_url_must_parse() {
        let mut create = arena("Center Court");
        create.image_url = Some("not a url".to_string());
        assert!(create.validate().is_err());

        create.image_url = Some("https://cdn.example.com/arena.jpg".to_string());
        assert!(create.validate().is_ok());
    }

    #[test]
    fn court_price_must_be_positive() {
        let court = CreateCourt {
            arena_id: 1,
            name: "Court 1".to_string(),
            price_per_hour: 0,
        };

        assert!(court.validate().is_err());
    }
}
