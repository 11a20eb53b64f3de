//! Route table and navigation guards.
//!
//! Guards never touch storage themselves; they read from a `SessionStore` handed in by the caller
//! and return what should happen next.

use crate::session::{Role, SessionStore};
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Route {
    Login,
    Register,
    Feedback,
    Home,
    Analyze,
    Convert,
    History,
    Jobs,
    AdminDashboard,
    AdminUsers,
    AdminFeedback,
    AdminResumes,
}

/// Who may render a route
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Access {
    Public,
    Role(Role),
}

pub const ALL_ROUTES: [Route; 12] = [
    Route::Login,
    Route::Register,
    Route::Feedback,
    Route::Home,
    Route::Analyze,
    Route::Convert,
    Route::History,
    Route::Jobs,
    Route::AdminDashboard,
    Route::AdminUsers,
    Route::AdminFeedback,
    Route::AdminResumes,
];

impl Route {
    pub fn access(&self) -> Access {
        match self {
            Route::Login | Route::Register | Route::Feedback => Access::Public,
            Route::Home | Route::Analyze | Route::Convert | Route::History | Route::Jobs => {
                Access::Role(Role::User)
            }
            Route::AdminDashboard
            | Route::AdminUsers
            | Route::AdminFeedback
            | Route::AdminResumes => Access::Role(Role::Admin),
        }
    }

    /// Landing route for a role
    pub fn home_for(role: Role) -> Route {
        match role {
            Role::User => Route::Home,
            Role::Admin => Route::AdminDashboard,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Feedback => "/feedback",
            Route::Home => "/dashboard",
            Route::Analyze => "/analyze",
            Route::Convert => "/ats-converter",
            Route::History => "/history",
            Route::Jobs => "/jobs",
            Route::AdminDashboard => "/admin",
            Route::AdminUsers => "/admin/users",
            Route::AdminFeedback => "/admin/feedback",
            Route::AdminResumes => "/admin/resumes",
        }
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ROUTES
            .iter()
            .find(|r| r.path() == s)
            .copied()
            .ok_or_else(|| Error::Validation(format!("unknown route: {}", s)))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Navigation {
    Render(Route),
    /// `from` carries the originally requested route, for sending the user back after login
    Redirect { to: Route, from: Option<Route> },
}

pub fn require_auth(session: &SessionStore, route: Route) -> Navigation {
    if session.is_authenticated() {
        Navigation::Render(route)
    } else {
        Navigation::Redirect {
            to: Route::Login,
            from: Some(route),
        }
    }
}

/// Assumes authentication was already checked; a role mismatch sends the user to their own home.
pub fn require_role(session: &SessionStore, route: Route, role: Role) -> Navigation {
    let current = session.current_role();
    if session.is_authenticated() && current != role {
        Navigation::Redirect {
            to: Route::home_for(current),
            from: None,
        }
    } else {
        Navigation::Render(route)
    }
}

/// Applies the route table: public routes always render, guarded routes go through
/// `require_auth` then `require_role`.
pub fn navigate(session: &SessionStore, route: Route) -> Navigation {
    match route.access() {
        Access::Public => Navigation::Render(route),
        Access::Role(role) => match require_auth(session, route) {
            Navigation::Render(_) => require_role(session, route, role),
            redirect => redirect,
        },
    }
}

/// Where to go once a login completes: the preserved target if the new role may see it,
/// otherwise that role's home.
pub fn post_login_destination(from: Option<Route>, role: Role) -> Route {
    match from {
        Some(route) => match route.access() {
            Access::Role(r) if r == role => route,
            _ => Route::home_for(role),
        },
        None => Route::home_for(role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    fn store_with(role: Option<Role>) -> SessionStore {
        let mut store = SessionStore::ephemeral();
        if let Some(role) = role {
            store
                .establish(Session {
                    access_token: "tok".to_string(),
                    refresh_token: None,
                    role,
                    display_name: None,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let store = store_with(None);
        for route in ALL_ROUTES.iter() {
            let nav = navigate(&store, *route);
            match route.access() {
                Access::Public => assert_eq!(nav, Navigation::Render(*route)),
                Access::Role(_) => assert_eq!(
                    nav,
                    Navigation::Redirect {
                        to: Route::Login,
                        from: Some(*route)
                    }
                ),
            }
        }
    }

    #[test]
    fn test_user_cannot_reach_admin() {
        let store = store_with(Some(Role::User));
        for route in ALL_ROUTES.iter() {
            let nav = navigate(&store, *route);
            if route.access() == Access::Role(Role::Admin) {
                assert_eq!(
                    nav,
                    Navigation::Redirect {
                        to: Route::Home,
                        from: None
                    }
                );
            } else {
                assert_eq!(nav, Navigation::Render(*route));
            }
        }
    }

    #[test]
    fn test_admin_cannot_reach_user_routes() {
        let store = store_with(Some(Role::Admin));
        assert_eq!(
            navigate(&store, Route::Jobs),
            Navigation::Redirect {
                to: Route::AdminDashboard,
                from: None
            }
        );
        assert_eq!(
            navigate(&store, Route::AdminUsers),
            Navigation::Render(Route::AdminUsers)
        );
        assert_eq!(
            navigate(&store, Route::Feedback),
            Navigation::Render(Route::Feedback)
        );
    }

    #[test]
    fn test_require_role_ignores_unauthenticated() {
        let store = store_with(None);
        assert_eq!(
            require_role(&store, Route::AdminUsers, Role::Admin),
            Navigation::Render(Route::AdminUsers)
        );
    }

    #[test]
    fn test_post_login_destination() {
        assert_eq!(
            post_login_destination(Some(Route::Jobs), Role::User),
            Route::Jobs
        );
        assert_eq!(
            post_login_destination(Some(Route::Jobs), Role::Admin),
            Route::AdminDashboard
        );
        assert_eq!(
            post_login_destination(Some(Route::Login), Role::User),
            Route::Home
        );
        assert_eq!(post_login_destination(None, Role::Admin), Route::AdminDashboard);
    }

    #[test]
    fn test_route_paths() {
        for route in ALL_ROUTES.iter() {
            assert_eq!(Route::from_str(route.path()).unwrap(), *route);
        }
        assert!(Route::from_str("/nowhere").is_err());
    }
}
