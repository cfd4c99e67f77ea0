pub mod admin;
pub mod auth;
pub mod driver;
pub mod resource;
pub mod rides;
pub mod session;

pub use admin::AdminDriverStore;
pub use auth::AuthStore;
pub use driver::DriverStore;
pub use resource::{RequestOutcome, ResourceState, ResourceStore, Sequencing};
pub use rides::RideStore;
