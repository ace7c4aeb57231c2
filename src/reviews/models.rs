use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::reviews;

#[derive(Debug, Serialize, Queryable, Identifiable)]
pub struct Review {
    pub id: i64,
    pub arena_id: i64,
    pub user_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// **POST /api/arenas/{id}/reviews**
///
/// One review per user per arena, the unique index turns a second
/// attempt into a Conflict.
#[derive(Debug, Deserialize, Insertable)]
#[table_name = "reviews"]
pub struct CreateReview {
    #[serde(skip)]
    pub arena_id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub rating: i16,
    pub comment: Option<String>,
}

impl Review {
    pub fn create(review: CreateReview, conn: &db::Conn) -> Result<Review, ServiceError> {
        let review = diesel::insert_into(reviews::table)
            .values(&review)
            .get_result(conn)?;

        Ok(review)
    }

    pub fn find_by_arena(arena_id: i64, conn: &db::Conn) -> Result<Vec<Review>, ServiceError> {
        let reviews = reviews::table
            .filter(reviews::arena_id.eq(arena_id))
            .order(reviews::created_at.desc())
            .load::<Review>(conn)?;

        Ok(reviews)
    }
}

impl crate::validator::Validate<CreateReview> for CreateReview {
    fn validate(&self) -> Result<(), ServiceError> {
        if !(1..=5).contains(&self.rating) {
            bad_request!("rating has to be between 1 and 5");
        }

        if let Some(comment) = self.comment.as_ref() {
            if comment.len() > 2000 {
                bad_request!("comment is too long, maximum 2000 characters");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validate;

    fn review(rating: i16) -> CreateReview {
        CreateReview {
            arena_id: 1,
            user_id: 1,
            rating,
            comment: None,
        }
    }

    #[test]
    fn rating_bounds() {
        assert!(review(0).validate().is_err());
        assert!(review(6).validate().is_err());
        assert!(review(1).validate().is_ok());
        assert!(review(5).validate().is_ok());
    }
}
