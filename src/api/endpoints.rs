//! Paths on the remote API, relative to the configured base url.

pub const REGISTER: &str = "/auth/register";
pub const LOGIN: &str = "/auth/login";
pub const LOGOUT: &str = "/auth/logout";

pub const DRIVER_BECOME: &str = "/driver/become";
pub const DRIVER_ME: &str = "/driver/me";
pub const DRIVER_UPLOAD_DOCS: &str = "/driver/upload-docs";
pub const DRIVER_UPDATE: &str = "/driver/update";

pub const ADMIN_DRIVERS: &str = "/admin/drivers";

pub const RIDES_PUBLISH: &str = "/rides/publish";
pub const RIDES_MINE: &str = "/rides/my-rides";
pub const RIDES_ADMIN: &str = "/rides/admin";

/// Ids are opaque to the client, so each is encoded as a single path segment.
fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}

pub fn approve_driver(user_id: &str) -> String {
    format!("{ADMIN_DRIVERS}/{}/approve", segment(user_id))
}

pub fn reject_driver(user_id: &str) -> String {
    format!("{ADMIN_DRIVERS}/{}/reject", segment(user_id))
}

pub fn cancel_ride(ride_id: &str) -> String {
    format!("/rides/cancel/{}", segment(ride_id))
}

pub fn complete_ride(ride_id: &str) -> String {
    format!("/rides/complete/{}", segment(ride_id))
}
