use argon2::Config;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rand::Rng;
use regex::Regex;
use std::str::FromStr;

use crate::auth::models::Role;
use crate::db;
use crate::errors::ServiceError;
use crate::schema::users;

#[derive(Serialize, Deserialize, Queryable, Identifiable, AsChangeset, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, skip_deserializing)]
    pub password: String,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// **POST /api/register**
///
/// The role defaults to PLAYER when omitted; owner accounts are
/// promoted by an administrator afterwards.
#[derive(Debug, Deserialize, AsChangeset, Insertable)]
#[table_name = "users"]
pub struct UserMessage {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    Role::PLAYER.to_string()
}

impl User {
    pub fn find_by_id(id: i64, conn: &db::Conn) -> Result<Self, ServiceError> {
        let user = users::table.filter(users::id.eq(id)).first(conn)?;

        Ok(user)
    }

    pub fn find_by_email(email: &str, conn: &db::Conn) -> Result<Self, ServiceError> {
        let user = users::table.filter(users::email.eq(email)).first(conn)?;

        Ok(user)
    }

    pub fn create(user: &mut UserMessage, conn: &db::Conn) -> Result<Self, ServiceError> {
        user.hash_password()?;

        let user: User = diesel::insert_into(users::table)
            .values(&*user)
            .get_result(conn)?;

        Ok(user)
    }

    pub fn set_role(user_id: i64, role: &str, conn: &db::Conn) -> Result<Self, ServiceError> {
        if Role::from_str(role).is_err() {
            bad_request!("unknown role");
        }

        let user = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set(users::role.eq(role))
            .get_result(conn)?;

        Ok(user)
    }

    pub fn count(conn: &db::Conn) -> Result<i64, ServiceError> {
        let count = users::table.count().first::<i64>(conn)?;

        Ok(count)
    }

    pub fn role(&self) -> Result<Role, ServiceError> {
        Role::from_str(&self.role)
    }

    pub fn verify_password(&self, password: &[u8]) -> Result<(), ServiceError> {
        let is_match = argon2::verify_encoded(&self.password, password)?;

        if !is_match {
            return Err(ServiceError::Unauthorized);
        }

        Ok(())
    }
}

impl UserMessage {
    fn hash_password(&mut self) -> Result<(), ServiceError> {
        let salt: [u8; 32] = rand::thread_rng().gen();
        let config = Config::default();

        self.password = argon2::hash_encoded(self.password.as_bytes(), &salt, &config)?;

        Ok(())
    }
}

impl crate::validator::Validate<UserMessage> for UserMessage {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.username.trim().is_empty() {
            bad_request!("username is too short");
        }

        if self.username.trim().len() > 20 {
            bad_request!("username is too long, max 20 characters");
        }

        let pattern: Regex = Regex::new(r"^[0-9A-Za-z-_]+$").unwrap();

        if !pattern.is_match(&self.username) {
            bad_request!("username can only contain letters, numbers, '-' and '_'");
        }

        if !self.email.contains('@') {
            bad_request!("that doesn't look like an email address");
        }

        if self.password.len() < 8 {
            bad_request!("your password should at least be 8 characters long");
        }

        if Role::from_str(&self.role).is_err() {
            bad_request!("unknown role");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validate;

    fn player(username: &str, email: &str, password: &str) -> UserMessage {
        UserMessage {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::PLAYER.to_string(),
        }
    }

    #[test]
    /// the user password should never be exposed through the api
    fn password_should_not_leak() {
        let password = "password";
        let user = User {
            id: 1,
            username: "serena".to_string(),
            email: "serena@example.com".to_string(),
            password: password.to_string(),
            role: Role::PLAYER.to_string(),
            created_at: None,
            updated_at: None,
        };

        let serialized = serde_json::to_string(&user).unwrap();

        assert_eq!(serialized.contains(password), false);
    }

    #[test]
    fn invalid_username() {
        assert!(player("a€$b", "a@b.c", "hunter2boogaloo")
            .validate()
            .is_err());
        assert!(player("", "a@b.c", "hunter2boogaloo").validate().is_err());
    }

    #[test]
    fn invalid_email_or_password() {
        assert!(player("rafa", "not-an-email", "hunter2boogaloo")
            .validate()
            .is_err());
        assert!(player("rafa", "rafa@example.com", "short")
            .validate()
            .is_err());
    }

    #[test]
    fn valid_registration() {
        assert!(player("rafa-05", "rafa@example.com", "hunter2boogaloo")
            .validate()
            .is_ok());
    }

    #[test]
    fn password_verification() {
        let mut message = player("rafa", "rafa@example.com", "topspin-heavy");
        message.hash_password().unwrap();

        let user = User {
            id: 1,
            username: message.username.clone(),
            email: message.email.clone(),
            password: message.password.clone(),
            role: message.role.clone(),
            created_at: None,
            updated_at: None,
        };

        assert!(user.verify_password(b"topspin-heavy").is_ok());
        assert!(user.verify_password(b"flat-serve").is_err());
    }
}
