pub mod driver;
pub mod ride;
pub mod user;

use serde::Deserialize;

/// Acknowledgement body returned by status-changing endpoints.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body the API sends alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Joins whichever name parts are present and non-blank.
pub(crate) fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
