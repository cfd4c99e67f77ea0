use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::display_name;
use crate::models::user::{Role, User};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Pending => "pending",
            DriverStatus::Approved => "approved",
            DriverStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_seats: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_routes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_license_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_trips: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DriverStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DriverProfile {
    /// `carYear` arrives as a string from form submissions and as a number
    /// from seeded records.
    pub fn car_year(&self) -> Option<String> {
        match self.extra.get("carYear")? {
            Value::String(year) => Some(year.clone()),
            Value::Number(year) => Some(year.to_string()),
            _ => None,
        }
    }

    pub fn vehicle(&self) -> String {
        [self.car_make.as_deref(), self.car_model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A driver record as listed on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminDriver {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_profile: Option<DriverProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DriverStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdminDriver {
    /// Status as displayed; a record that carries none counts as pending.
    pub fn effective_status(&self) -> DriverStatus {
        self.driver_profile
            .as_ref()
            .and_then(|profile| profile.status)
            .or(self.status)
            .unwrap_or_default()
    }

    /// Records an approval decision on whichever field the dashboard reads.
    pub fn set_status(&mut self, status: DriverStatus) {
        match self.driver_profile.as_mut() {
            Some(profile) => profile.status = Some(status),
            None => self.status = Some(status),
        }
    }

    pub fn can_approve(&self) -> bool {
        self.effective_status() != DriverStatus::Approved
    }

    pub fn can_reject(&self) -> bool {
        self.effective_status() != DriverStatus::Rejected
    }

    pub fn full_name(&self) -> String {
        display_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl DriverSummary {
    pub fn from_drivers(drivers: &[AdminDriver]) -> Self {
        drivers
            .iter()
            .fold(Self::default(), |mut summary, driver| {
                summary.total += 1;
                match driver.effective_status() {
                    DriverStatus::Pending => summary.pending += 1,
                    DriverStatus::Approved => summary.approved += 1,
                    DriverStatus::Rejected => summary.rejected += 1,
                }
                summary
            })
    }
}

/// Body of `GET /driver/me` and of the onboarding/update endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfileResponse {
    #[serde(default)]
    pub driver_profile: Option<DriverProfile>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}
