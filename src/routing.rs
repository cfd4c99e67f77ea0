//! Session- and role-based access to application routes.

use crate::models::user::{Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    Verify,
    Unauthorized,
    DriverOnboarding,
    DriverDashboard,
    MyRides,
    PublishRide,
    DriverProfile,
    AdminOverview,
    AdminDrivers,
    AdminRides,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Verify => "/verify",
            Route::Unauthorized => "/unauthorized",
            Route::DriverOnboarding => "/onboarding/driver",
            Route::DriverDashboard => "/dashboard",
            Route::MyRides => "/dashboard/my-rides",
            Route::PublishRide => "/publish",
            Route::DriverProfile => "/dashboard/profile",
            Route::AdminOverview => "/dashboard/overview",
            Route::AdminDrivers => "/dashboard/drivers",
            Route::AdminRides => "/dashboard/rides",
        }
    }

    fn requirement(&self) -> Requirement {
        match self {
            Route::Home | Route::Login | Route::Register | Route::Verify | Route::Unauthorized => {
                Requirement::Public
            }
            Route::DriverOnboarding => Requirement::SignedIn,
            Route::DriverDashboard | Route::MyRides | Route::PublishRide | Route::DriverProfile => {
                Requirement::Role(Role::Driver)
            }
            Route::AdminOverview | Route::AdminDrivers | Route::AdminRides => {
                Requirement::Role(Role::Admin)
            }
        }
    }
}

enum Requirement {
    Public,
    SignedIn,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(Route),
}

pub fn guard(route: Route, session: Option<&Session>) -> Access {
    match (route.requirement(), session) {
        (Requirement::Public, _) => Access::Allow,
        (_, None) => Access::Redirect(Route::Login),
        (Requirement::SignedIn, Some(session)) => {
            if route == Route::DriverOnboarding
                && session.role() == Role::Driver
                && session.user.has_driver_profile()
            {
                Access::Redirect(Route::DriverDashboard)
            } else {
                Access::Allow
            }
        }
        (Requirement::Role(role), Some(session)) if session.role() == role => Access::Allow,
        (Requirement::Role(_), Some(_)) => Access::Redirect(Route::Unauthorized),
    }
}

/// Where a freshly signed-in user lands.
pub fn landing(session: &Session) -> Route {
    match session.role() {
        Role::Admin => Route::AdminOverview,
        Role::Driver if session.user.has_driver_profile() => Route::DriverDashboard,
        Role::Driver | Role::User => Route::DriverOnboarding,
    }
}
