// Who may call what. `enforce_policy` applies `access` before the body is read;
// show handlers pick their projection from `show_shape`.

use axum::http::Method;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Show,
    Theme,
    Presenter,
    Dome,
    Session,
    Reservation,
    Registration,
    Token,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
}

impl Operation {
    /// `has_id` is true for item routes such as `/domes/{id}` and `/users/me`.
    pub fn from_request(method: &Method, has_id: bool) -> Option<Self> {
        if method == Method::GET || method == Method::HEAD {
            Some(if has_id { Operation::Retrieve } else { Operation::List })
        } else if method == Method::POST {
            Some(Operation::Create)
        } else if method == Method::PUT {
            Some(Operation::Update)
        } else if method == Method::PATCH {
            Some(Operation::PartialUpdate)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Staff,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Related objects flattened to display strings.
    List,
    /// Related objects nested.
    Detail,
    /// Related objects as ids.
    Write,
}

pub const fn access(resource: Resource, operation: Operation) -> Access {
    use Access::*;
    use Operation::*;
    use Resource::*;

    match (resource, operation) {
        (Show | Session | Theme | Presenter | Dome, List | Retrieve) => Public,
        (Show | Session | Theme | Presenter | Dome, Create) => Staff,

        (Reservation, List | Retrieve | Create) => Authenticated,
        (Registration | Token, Create) => Public,
        (Profile, Retrieve | Update | PartialUpdate) => Authenticated,

        _ => Denied,
    }
}

// Shows are the one record rendered three ways; every other resource has a
// dedicated view per operation.
pub const fn show_shape(operation: Operation) -> Shape {
    match operation {
        Operation::List => Shape::List,
        Operation::Retrieve => Shape::Detail,
        _ => Shape::Write,
    }
}

impl Access {
    pub fn check(self, caller: Option<&AuthUser>) -> AppResult<()> {
        match (self, caller) {
            (Access::Public, _) => Ok(()),
            (Access::Denied, _) => Err(AppError::Forbidden(
                "This operation is not available.".into(),
            )),
            (_, None) => Err(AppError::Unauthorized(
                "Authentication credentials were not provided.".into(),
            )),
            (Access::Authenticated, Some(_)) => Ok(()),
            (Access::Staff, Some(user)) if user.is_staff => Ok(()),
            (Access::Staff, Some(_)) => Err(AppError::Forbidden(
                "You do not have permission to perform this action.".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_staff: bool) -> AuthUser {
        AuthUser { user_id: 1, is_staff }
    }

    #[test]
    fn catalogue_reads_are_public_and_writes_need_staff() {
        for resource in [Resource::Show, Resource::Session, Resource::Dome, Resource::Theme, Resource::Presenter] {
            assert_eq!(access(resource, Operation::List), Access::Public);
            assert_eq!(access(resource, Operation::Create), Access::Staff);
        }
    }

    #[test]
    fn shows_pick_shape_per_operation() {
        assert_eq!(show_shape(Operation::List), Shape::List);
        assert_eq!(show_shape(Operation::Retrieve), Shape::Detail);
        assert_eq!(show_shape(Operation::Create), Shape::Write);
    }

    #[test]
    fn reservations_need_any_identity() {
        let rule = access(Resource::Reservation, Operation::Create);
        assert!(matches!(rule.check(None), Err(AppError::Unauthorized(_))));
        assert!(rule.check(Some(&user(false))).is_ok());
    }

    #[test]
    fn staff_rule_separates_401_from_403() {
        let rule = access(Resource::Dome, Operation::Create);
        assert!(matches!(rule.check(None), Err(AppError::Unauthorized(_))));
        assert!(matches!(rule.check(Some(&user(false))), Err(AppError::Forbidden(_))));
        assert!(rule.check(Some(&user(true))).is_ok());
    }

    #[test]
    fn unlisted_pairs_are_denied() {
        assert_eq!(access(Resource::Reservation, Operation::Update), Access::Denied);
        assert_eq!(access(Resource::Token, Operation::List), Access::Denied);
    }

    #[test]
    fn method_maps_to_operation() {
        assert_eq!(Operation::from_request(&Method::GET, false), Some(Operation::List));
        assert_eq!(Operation::from_request(&Method::GET, true), Some(Operation::Retrieve));
        assert_eq!(Operation::from_request(&Method::PATCH, true), Some(Operation::PartialUpdate));
        assert_eq!(Operation::from_request(&Method::DELETE, true), None);
    }
}
