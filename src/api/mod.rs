pub mod client;
pub mod endpoints;
pub mod upload;

pub use client::ApiClient;
