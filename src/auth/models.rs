use crate::errors::ServiceError;

/// Every user has exactly one role, stored as an uppercase
/// string on the user record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum Role {
    PLAYER,
    OWNER,
    ADMIN,
    MANAGER,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Role, ServiceError> {
        match s {
            "PLAYER" => Ok(Role::PLAYER),
            "OWNER" => Ok(Role::OWNER),
            "ADMIN" => Ok(Role::ADMIN),
            "MANAGER" => Ok(Role::MANAGER),
            _ => Err(ServiceError::Unauthorized),
        }
    }
}

/// The verified identity attached to a request, serialized
/// into the identity cookie at login.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionUser {
    pub id: i64,
    pub role: Role,
    pub email: String,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::ADMIN
    }
}

/// Credentials sent to **POST /api/login**
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_its_column_representation() {
        for role in &[Role::PLAYER, Role::OWNER, Role::ADMIN, Role::MANAGER] {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), *role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Role::from_str("SUPERUSER").is_err());
        assert!(Role::from_str("player").is_err());
    }
}
