use std::sync::Arc;

use tracing::debug;

use crate::api::{ApiClient, endpoints};
use crate::error::ClientError;
use crate::models::MessageResponse;
use crate::models::driver::{AdminDriver, DriverStatus, DriverSummary};
use crate::observability::metrics::Metrics;
use crate::store::resource::{Operation, ResourceStore, Sequencing};

const FETCH_ALL: Operation = Operation::read("fetch_all_drivers", "Failed to fetch drivers");
const APPROVE: Operation = Operation::write("approve_driver", "Failed to approve driver");
const REJECT: Operation = Operation::write("reject_driver", "Failed to reject driver");

/// Driver applications as seen from the admin dashboard.
#[derive(Clone)]
pub struct AdminDriverStore {
    api: ApiClient,
    store: Arc<ResourceStore<Vec<AdminDriver>>>,
}

impl AdminDriverStore {
    pub fn new(api: ApiClient, sequencing: Sequencing, metrics: Metrics) -> Self {
        Self {
            api,
            store: Arc::new(ResourceStore::new(
                "admin_drivers",
                Vec::new(),
                sequencing,
                metrics,
            )),
        }
    }

    pub fn store(&self) -> Arc<ResourceStore<Vec<AdminDriver>>> {
        self.store.clone()
    }

    pub fn drivers(&self) -> Vec<AdminDriver> {
        self.store.read(Clone::clone)
    }

    pub fn summary(&self) -> DriverSummary {
        self.store.read(|drivers| DriverSummary::from_drivers(drivers))
    }

    pub async fn fetch_all(&self) -> Result<Vec<AdminDriver>, ClientError> {
        let api = self.api.clone();
        self.store
            .run(
                FETCH_ALL,
                async move { api.get(endpoints::ADMIN_DRIVERS).await },
                |drivers, response: &Vec<AdminDriver>| {
                    *drivers = response.clone();
                    None
                },
            )
            .await
    }

    /// Re-approving an approved driver is still sent; the API decides.
    pub async fn approve(&self, user_id: &str) -> Result<MessageResponse, ClientError> {
        self.decide(APPROVE, endpoints::approve_driver(user_id), user_id, DriverStatus::Approved)
            .await
    }

    pub async fn reject(&self, user_id: &str) -> Result<MessageResponse, ClientError> {
        self.decide(REJECT, endpoints::reject_driver(user_id), user_id, DriverStatus::Rejected)
            .await
    }

    async fn decide(
        &self,
        op: Operation,
        path: String,
        user_id: &str,
        status: DriverStatus,
    ) -> Result<MessageResponse, ClientError> {
        let api = self.api.clone();
        let default_message = match status {
            DriverStatus::Approved => "Driver approved",
            DriverStatus::Rejected => "Driver rejected",
            DriverStatus::Pending => "Driver updated",
        };

        self.store
            .run(
                op,
                async move { api.patch(&path).await },
                |drivers, response: &MessageResponse| {
                    let updated = apply_decision(drivers, user_id, status);
                    debug!(user_id, status = status.as_str(), updated, "applied driver decision");
                    Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| default_message.to_string()),
                    )
                },
            )
            .await
    }

    pub fn clear_state(&self) {
        self.store.clear_state();
    }
}

/// Sets the status of the driver whose id matches; returns whether one did.
fn apply_decision(drivers: &mut [AdminDriver], user_id: &str, status: DriverStatus) -> bool {
    let mut updated = false;
    for driver in drivers.iter_mut().filter(|driver| driver.id == user_id) {
        driver.set_status(status);
        updated = true;
    }
    updated
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn drivers() -> Vec<AdminDriver> {
        serde_json::from_value(json!([
            { "_id": "d1", "firstName": "A", "lastName": "One", "email": "a@x.ng",
              "driverProfile": { "carMake": "Toyota", "status": "pending" } },
            { "_id": "d2", "firstName": "B", "lastName": "Two", "email": "b@x.ng",
              "driverProfile": { "carMake": "Honda", "status": "pending" } },
            { "_id": "d3", "firstName": "C", "lastName": "Three", "email": "c@x.ng",
              "driverProfile": { "carMake": "Kia", "status": "rejected" } }
        ]))
        .unwrap()
    }

    #[test]
    fn decision_touches_only_the_matching_driver() {
        let before = drivers();
        let mut after = before.clone();

        assert!(apply_decision(&mut after, "d2", DriverStatus::Approved));

        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1].effective_status(), DriverStatus::Approved);

        let mut expected = before[1].clone();
        expected.set_status(DriverStatus::Approved);
        assert_eq!(after[1], expected);
    }

    #[test]
    fn unknown_id_changes_nothing() {
        let before = drivers();
        let mut after = before.clone();
        assert!(!apply_decision(&mut after, "missing", DriverStatus::Rejected));
        assert_eq!(after, before);
    }
}
