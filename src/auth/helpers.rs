use actix_identity::Identity;

use crate::auth::models::{Role, SessionUser};
use crate::errors::ServiceError;

/// get the user behind the current authenticated session,
/// returns Unauthorized when no (valid) session is found
pub fn get_user(id: &Identity) -> Result<SessionUser, ServiceError> {
    let raw = id.identity().ok_or(ServiceError::Unauthorized)?;

    serde_json::from_str::<SessionUser>(&raw).map_err(|e| {
        error!("corrupt identity cookie: {}", e);
        ServiceError::Unauthorized
    })
}

/// returns the session user if they are an administrator
pub fn verify_admin(id: &Identity) -> Result<SessionUser, ServiceError> {
    let user = get_user(id)?;

    if user.role != Role::ADMIN {
        forbidden!("administrator access required");
    }

    Ok(user)
}

/// arena mutations (blocking slots, marking holidays, schedules)
/// are for arena owners, admins may do them as well
pub fn verify_owner(id: &Identity) -> Result<SessionUser, ServiceError> {
    let user = get_user(id)?;

    match user.role {
        Role::OWNER | Role::ADMIN => Ok(user),
        _ => Err(ServiceError::Forbidden(
            "arena owner access required".to_string(),
        )),
    }
}

/// booking completion is done by venue managers and admins
pub fn verify_manager(id: &Identity) -> Result<SessionUser, ServiceError> {
    let user = get_user(id)?;

    match user.role {
        Role::MANAGER | Role::ADMIN => Ok(user),
        _ => Err(ServiceError::Forbidden(
            "manager access required".to_string(),
        )),
    }
}
