use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::models::display_name;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Completed,
    Cancelled,
    Pending,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
            RideStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummaryRef {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The driver of a ride is populated on admin listings and a bare id elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RideDriver {
    Populated(DriverSummaryRef),
    Id(String),
}

/// A ride as listed by the API. Only the id is required; every other field
/// is held exactly as sent, absent when the API left it out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropoff_point: Option<String>,
    /// Kept as sent; see [`Ride::departure`] for the parsed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_seats: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_seat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RideStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<RideDriver>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ride {
    pub fn departure(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.departure_time.as_deref()?)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    pub fn route(&self) -> String {
        format!(
            "{} → {}",
            self.from_city.as_deref().unwrap_or("?"),
            self.to_city.as_deref().unwrap_or("?")
        )
    }

    pub fn formatted_price(&self) -> String {
        self.price_per_seat.map(format_naira).unwrap_or_default()
    }

    pub fn formatted_departure(&self) -> String {
        match self.departure() {
            Some(at) => at.format("%a %d %b %Y, %H:%M").to_string(),
            None => self.departure_time.clone().unwrap_or_default(),
        }
    }

    pub fn driver_name(&self) -> Option<String> {
        match self.driver.as_ref()? {
            RideDriver::Populated(driver) => {
                let name = display_name(driver.first_name.as_deref(), driver.last_name.as_deref());
                if name.is_empty() { None } else { Some(name) }
            }
            RideDriver::Id(_) => None,
        }
    }

    /// Cancel and complete are only offered while a ride is active.
    pub fn is_actionable(&self) -> bool {
        self.status == Some(RideStatus::Active)
    }
}

pub fn format_naira(amount: f64) -> String {
    let whole = amount.trunc() as i64;
    let kobo = ((amount - amount.trunc()) * 100.0).round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if whole < 0 { "-" } else { "" };
    if kobo == 0 {
        format!("{sign}₦{grouped}")
    } else {
        format!("{sign}₦{grouped}.{:02}", kobo.abs())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishRide {
    pub from_city: String,
    pub to_city: String,
    pub pickup_point: String,
    pub dropoff_point: String,
    pub departure_time: DateTime<Utc>,
    pub available_seats: u32,
    pub price_per_seat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl PublishRide {
    pub fn validate(&self) -> Result<(), ClientError> {
        let required = [
            ("fromCity", &self.from_city),
            ("toCity", &self.to_city),
            ("pickupPoint", &self.pickup_point),
            ("dropoffPoint", &self.dropoff_point),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ClientError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        if self.available_seats == 0 {
            return Err(ClientError::Validation(
                "At least one seat must be available".to_string(),
            ));
        }
        if !self.price_per_seat.is_finite() || self.price_per_seat < 0.0 {
            return Err(ClientError::Validation(
                "Price per seat must be a non-negative amount".to_string(),
            ));
        }
        Ok(())
    }
}

/// Display-side filtering for ride tables.
#[derive(Debug, Clone, Default)]
pub struct RideFilter {
    pub status: Option<RideStatus>,
    pub from_city: Option<String>,
    pub to_city: Option<String>,
}

impl RideFilter {
    pub fn matches(&self, ride: &Ride) -> bool {
        if self.status.is_some_and(|status| ride.status != Some(status)) {
            return false;
        }
        city_matches(self.from_city.as_deref(), ride.from_city.as_deref())
            && city_matches(self.to_city.as_deref(), ride.to_city.as_deref())
    }

    pub fn apply<'a>(&self, rides: &'a [Ride]) -> Vec<&'a Ride> {
        rides.iter().filter(|ride| self.matches(ride)).collect()
    }
}

fn city_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted.map(str::trim) {
        None | Some("") => true,
        Some(wanted) => actual.is_some_and(|actual| actual.trim().eq_ignore_ascii_case(wanted)),
    }
}
