use chrono::{NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Double, Nullable, Text, Time};

use crate::arenas::Court;
use crate::db;
use crate::errors::ServiceError;
use crate::schema::{courts, time_slots};
use crate::slots::TimeSlot;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// **GET /api/search/arenas**
///
/// Text, sport and price filters narrow the join *before* aggregation,
/// the rating filter applies to the aggregated average *after* it.
#[derive(Debug, Deserialize)]
pub struct SearchFilter {
    /// free text over name/description/address
    pub query: Option<String>,
    /// substring match on the address only
    pub location: Option<String>,
    pub sport: Option<String>,
    /// price bounds in cents
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rating: Option<f64>,
    /// only arenas with a bookable slot on this date
    pub date: Option<NaiveDate>,
    /// narrows the date filter to slots covering this time of day
    pub time: Option<NaiveTime>,
    pub sort_by: Option<String>,
    /// 1-indexed
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SortKey {
    PriceLow,
    PriceHigh,
    Rating,
    Name,
}

impl std::str::FromStr for SortKey {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<SortKey, ServiceError> {
        match s {
            "price_low" => Ok(SortKey::PriceLow),
            "price_high" => Ok(SortKey::PriceHigh),
            "rating" => Ok(SortKey::Rating),
            "name" => Ok(SortKey::Name),
            _ => Err(ServiceError::BadRequest(format!("unknown sort key: {}", s))),
        }
    }
}

impl SortKey {
    /// The ORDER BY clause belonging to this key. Interpolated into the
    /// search statement, which is why this is a closed enum and never
    /// client input. Ties break on the primary key so pages are stable.
    fn order_clause(self) -> &'static str {
        match self {
            SortKey::PriceLow => "min_price ASC, a.id ASC",
            SortKey::PriceHigh => "min_price DESC, a.id ASC",
            SortKey::Rating => "avg_rating DESC NULLS LAST, a.id ASC",
            SortKey::Name => "a.name ASC, a.id ASC",
        }
    }
}

#[derive(Debug, Serialize, QueryableByName)]
pub struct ArenaSummary {
    #[sql_type = "BigInt"]
    pub id: i64,
    #[sql_type = "Text"]
    pub name: String,
    #[sql_type = "Text"]
    pub description: String,
    #[sql_type = "Text"]
    pub address: String,
    #[sql_type = "Nullable<Text>"]
    pub image_url: Option<String>,
    #[sql_type = "BigInt"]
    pub min_price: i64,
    #[sql_type = "Nullable<Double>"]
    pub avg_rating: Option<f64>,
    #[sql_type = "BigInt"]
    pub review_count: i64,
    #[sql_type = "Nullable<Text>"]
    pub sports: Option<String>,
}

#[derive(QueryableByName)]
struct CountRow {
    #[sql_type = "BigInt"]
    total: i64,
}

#[derive(QueryableByName)]
struct SportRow {
    #[sql_type = "Text"]
    name: String,
}

#[derive(QueryableByName)]
struct PriceBounds {
    #[sql_type = "Nullable<BigInt>"]
    min_price: Option<i64>,
    #[sql_type = "Nullable<BigInt>"]
    max_price: Option<i64>,
}

/// the filter palette shown next to the results, independent of the
/// currently applied filters
#[derive(Debug, Serialize)]
pub struct Facets {
    pub sports: Vec<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub arenas: Vec<ArenaSummary>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub facets: Facets,
}

// Every parameter is always bound, guarded by `$n IS NULL`, so the
// statement keeps one shape for every filter combination. Reviews are
// joined directly: each review repeats once per court row, which leaves
// AVG untouched and only forces the DISTINCT in the count.
const SEARCH_BODY: &str = r#"
    FROM arenas a
    INNER JOIN courts c ON c.arena_id = a.id
    LEFT JOIN reviews r ON r.arena_id = a.id
    WHERE a.is_active AND NOT a.is_blocked
      AND ($1::text IS NULL
           OR a.name ILIKE '%' || $1 || '%'
           OR a.description ILIKE '%' || $1 || '%'
           OR a.address ILIKE '%' || $1 || '%')
      AND ($2::text IS NULL OR EXISTS (
           SELECT 1 FROM court_sports cs
           INNER JOIN sports s ON s.id = cs.sport_id
           WHERE cs.court_id = c.id AND s.name = $2))
      AND ($3::int8 IS NULL OR c.price_per_hour >= $3)
      AND ($4::int8 IS NULL OR c.price_per_hour <= $4)
      AND ($6::text IS NULL OR a.address ILIKE '%' || $6 || '%')
      AND (($7::date IS NULL AND $8::time IS NULL) OR EXISTS (
           SELECT 1 FROM time_slots ts
           WHERE ts.arena_id = a.id
             AND ($7::date IS NULL OR ts.date = $7)
             AND ($8::time IS NULL OR (ts.start_time <= $8 AND ts.end_time > $8))
             AND ts.is_available
             AND NOT ts.is_blocked_by_owner
             AND NOT ts.is_holiday
             AND (ts.locked_until IS NULL OR ts.locked_until < now())))
    GROUP BY a.id
    HAVING ($5::float8 IS NULL OR AVG(r.rating)::float8 >= $5)
"#;

impl SearchFilter {
    fn sort_key(&self) -> Result<SortKey, ServiceError> {
        match self.sort_by.as_deref() {
            None => Ok(SortKey::Rating),
            Some(key) => key.parse(),
        }
    }

    fn page(&self) -> Result<i64, ServiceError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            bad_request!("page numbers start at 1");
        }
        Ok(page)
    }

    fn limit(&self) -> Result<i64, ServiceError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit < 1 || limit > MAX_PAGE_SIZE {
            bad_request!("limit has to be between 1 and 100");
        }
        Ok(limit)
    }

    #[tracing::instrument(name = "search::arenas", skip(self, conn))]
    pub fn search(&self, conn: &db::Conn) -> Result<SearchPage, ServiceError> {
        // fail fast, before any query runs
        let sort_key = self.sort_key()?;
        let page = self.page()?;
        let limit = self.limit()?;

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                bad_request!("min_price can't exceed max_price");
            }
        }

        let select = format!(
            r#"SELECT a.id, a.name, a.description, a.address, a.image_url,
                   MIN(c.price_per_hour) AS min_price,
                   AVG(r.rating)::float8 AS avg_rating,
                   COUNT(DISTINCT r.id) AS review_count,
                   (SELECT STRING_AGG(DISTINCT s.name, ',')
                      FROM court_sports cs
                      INNER JOIN sports s ON s.id = cs.sport_id
                      INNER JOIN courts c2 ON c2.id = cs.court_id
                      WHERE c2.arena_id = a.id) AS sports
               {body}
               ORDER BY {order}
               LIMIT $9 OFFSET $10"#,
            body = SEARCH_BODY,
            order = sort_key.order_clause(),
        );

        let arenas = diesel::sql_query(select)
            .bind::<Nullable<Text>, _>(&self.query)
            .bind::<Nullable<Text>, _>(&self.sport)
            .bind::<Nullable<BigInt>, _>(self.min_price)
            .bind::<Nullable<BigInt>, _>(self.max_price)
            .bind::<Nullable<Double>, _>(self.min_rating)
            .bind::<Nullable<Text>, _>(&self.location)
            .bind::<Nullable<Date>, _>(self.date)
            .bind::<Nullable<Time>, _>(self.time)
            .bind::<BigInt, _>(limit)
            .bind::<BigInt, _>((page - 1) * limit)
            .load::<ArenaSummary>(conn)?;

        let count = format!(
            "SELECT COUNT(*) AS total FROM (SELECT a.id {}) AS matching",
            SEARCH_BODY
        );

        let total = diesel::sql_query(count)
            .bind::<Nullable<Text>, _>(&self.query)
            .bind::<Nullable<Text>, _>(&self.sport)
            .bind::<Nullable<BigInt>, _>(self.min_price)
            .bind::<Nullable<BigInt>, _>(self.max_price)
            .bind::<Nullable<Double>, _>(self.min_rating)
            .bind::<Nullable<Text>, _>(&self.location)
            .bind::<Nullable<Date>, _>(self.date)
            .bind::<Nullable<Time>, _>(self.time)
            .get_result::<CountRow>(conn)?
            .total;

        Ok(SearchPage {
            arenas,
            total,
            page,
            limit,
            facets: facets(conn)?,
        })
    }
}

/// global facets over active, non-blocked arenas, deliberately not
/// narrowed by the current search filters
pub fn facets(conn: &db::Conn) -> Result<Facets, ServiceError> {
    let sports = diesel::sql_query(
        r#"SELECT DISTINCT s.name FROM sports s
           INNER JOIN court_sports cs ON cs.sport_id = s.id
           INNER JOIN courts c ON c.id = cs.court_id
           INNER JOIN arenas a ON a.id = c.arena_id
           WHERE a.is_active AND NOT a.is_blocked
           ORDER BY s.name"#,
    )
    .load::<SportRow>(conn)?
    .into_iter()
    .map(|row| row.name)
    .collect();

    let bounds = diesel::sql_query(
        r#"SELECT MIN(c.price_per_hour) AS min_price, MAX(c.price_per_hour) AS max_price
           FROM courts c
           INNER JOIN arenas a ON a.id = c.arena_id
           WHERE a.is_active AND NOT a.is_blocked"#,
    )
    .get_result::<PriceBounds>(conn)?;

    Ok(Facets {
        sports,
        min_price: bounds.min_price,
        max_price: bounds.max_price,
    })
}

/// **GET /api/check-availability**
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub arena_id: i64,
    pub court_id: Option<i64>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub is_available: bool,
    pub court_name: String,
    pub price_per_hour: i64,
}

impl AvailabilityQuery {
    /// Availability of the exact window: true only when every slot row in
    /// the window is bookable right now. Without a court_id the first
    /// court (lowest id) that has slots in the window is evaluated.
    #[tracing::instrument(name = "search::check_availability", skip(self, conn))]
    pub fn check(&self, conn: &db::Conn) -> Result<Availability, ServiceError> {
        let mut query = time_slots::table
            .inner_join(courts::table)
            .filter(time_slots::arena_id.eq(self.arena_id))
            .filter(time_slots::date.eq(self.date))
            .filter(time_slots::start_time.ge(self.start_time))
            .filter(time_slots::end_time.le(self.end_time))
            .order((time_slots::court_id, time_slots::start_time))
            .into_boxed();

        if let Some(court_id) = self.court_id {
            query = query.filter(time_slots::court_id.eq(court_id));
        }

        let rows: Vec<(TimeSlot, Court)> = query.load(conn)?;

        let (first_slot, court) = match rows.first() {
            Some((slot, court)) => (slot, court),
            None => return Err(ServiceError::NotFound),
        };

        let now = Utc::now();
        let first_court = first_slot.court_id;

        let is_available = rows
            .iter()
            .filter(|(slot, _)| slot.court_id == first_court)
            .all(|(slot, _)| slot.is_bookable_at(now));

        Ok(Availability {
            is_available,
            court_name: court.name.clone(),
            price_per_hour: court.price_per_hour,
        })
    }
}

impl crate::validator::Validate<AvailabilityQuery> for AvailabilityQuery {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.start_time >= self.end_time {
            bad_request!("the window has to end after it starts");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validate;

    fn filter() -> SearchFilter {
        SearchFilter {
            query: None,
            location: None,
            sport: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            date: None,
            time: None,
            sort_by: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn rating_is_the_default_sort() {
        assert_eq!(filter().sort_key().unwrap(), SortKey::Rating);
    }

    #[test]
    fn unknown_sort_keys_are_rejected() {
        let mut f = filter();
        f.sort_by = Some("cheapest".to_string());
        assert!(f.sort_key().is_err());

        f.sort_by = Some("price_low".to_string());
        assert_eq!(f.sort_key().unwrap(), SortKey::PriceLow);
    }

    #[test]
    fn every_sort_key_breaks_ties_on_the_primary_key() {
        for key in &[
            SortKey::PriceLow,
            SortKey::PriceHigh,
            SortKey::Rating,
            SortKey::Name,
        ] {
            assert!(key.order_clause().ends_with("a.id ASC"));
        }
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let f = filter();
        assert_eq!(f.page().unwrap(), 1);
        assert_eq!(f.limit().unwrap(), 10);

        let mut f = filter();
        f.page = Some(0);
        assert!(f.page().is_err());

        let mut f = filter();
        f.limit = Some(101);
        assert!(f.limit().is_err());
    }

    #[test]
    fn rating_filter_sits_behind_the_aggregation() {
        // pre-aggregation filters in WHERE, the rating filter in HAVING;
        // reordering those changes the results
        let where_part = SEARCH_BODY.split("GROUP BY").next().unwrap();
        let having_part = SEARCH_BODY.split("GROUP BY").nth(1).unwrap();

        assert!(where_part.contains("$1"));
        assert!(where_part.contains("$2"));
        assert!(where_part.contains("price_per_hour >= $3"));
        assert!(where_part.contains("price_per_hour <= $4"));
        assert!(where_part.contains("$6"));
        assert!(where_part.contains("$7"));
        assert!(where_part.contains("$8"));
        assert!(!where_part.contains("$5"));

        assert!(having_part.contains("HAVING"));
        assert!(having_part.contains("AVG(r.rating)::float8 >= $5"));
    }

    #[test]
    fn location_filters_on_the_address_only() {
        let where_part = SEARCH_BODY.split("GROUP BY").next().unwrap();

        assert!(where_part.contains("a.address ILIKE '%' || $6 || '%'"));
        assert!(!where_part.contains("a.name ILIKE '%' || $6"));
    }

    #[test]
    fn date_and_time_narrow_to_bookable_slots() {
        let where_part = SEARCH_BODY.split("GROUP BY").next().unwrap();

        assert!(where_part.contains("ts.date = $7"));
        assert!(where_part.contains("ts.start_time <= $8 AND ts.end_time > $8"));

        // the narrowing repeats the full bookable predicate, a held or
        // withdrawn slot must not make its arena show up
        assert!(where_part.contains("ts.is_available"));
        assert!(where_part.contains("NOT ts.is_blocked_by_owner"));
        assert!(where_part.contains("NOT ts.is_holiday"));
        assert!(where_part.contains("ts.locked_until IS NULL OR ts.locked_until < now()"));
    }

    #[test]
    fn availability_window_must_be_ordered() {
        let query = AvailabilityQuery {
            arena_id: 1,
            court_id: None,
            date: NaiveDate::from_ymd(2024, 6, 1),
            start_time: NaiveTime::from_hms(11, 0, 0),
            end_time: NaiveTime::from_hms(10, 0, 0),
        };

        assert!(query.validate().is_err());
    }
}
