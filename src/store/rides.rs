use std::sync::Arc;

use crate::api::{ApiClient, endpoints};
use crate::error::ClientError;
use crate::models::MessageResponse;
use crate::models::ride::{PublishRide, Ride, RideFilter};
use crate::observability::metrics::Metrics;
use crate::store::resource::{Operation, ResourceStore, Sequencing};

const PUBLISH: Operation = Operation::write("publish_ride", "Failed to publish ride");
const FETCH_DRIVER_RIDES: Operation =
    Operation::read("fetch_driver_rides", "Failed to fetch driver rides");
const CANCEL: Operation = Operation::write("cancel_ride", "Failed to cancel ride");
const COMPLETE: Operation = Operation::write("complete_ride", "Failed to complete ride");
const FETCH_ALL: Operation = Operation::read("fetch_all_rides", "Failed to fetch all rides");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideCollections {
    /// Every ride, as listed for admins.
    pub all_rides: Vec<Ride>,
    /// Rides published by the signed-in driver.
    pub driver_rides: Vec<Ride>,
}

#[derive(Clone)]
pub struct RideStore {
    api: ApiClient,
    store: Arc<ResourceStore<RideCollections>>,
}

impl RideStore {
    pub fn new(api: ApiClient, sequencing: Sequencing, metrics: Metrics) -> Self {
        Self {
            api,
            store: Arc::new(ResourceStore::new(
                "rides",
                RideCollections::default(),
                sequencing,
                metrics,
            )),
        }
    }

    pub fn store(&self) -> Arc<ResourceStore<RideCollections>> {
        self.store.clone()
    }

    pub fn all_rides(&self) -> Vec<Ride> {
        self.store.read(|rides| rides.all_rides.clone())
    }

    pub fn driver_rides(&self) -> Vec<Ride> {
        self.store.read(|rides| rides.driver_rides.clone())
    }

    pub fn filtered_driver_rides(&self, filter: &RideFilter) -> Vec<Ride> {
        self.store.read(|rides| {
            filter
                .apply(&rides.driver_rides)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn filtered_all_rides(&self, filter: &RideFilter) -> Vec<Ride> {
        self.store.read(|rides| {
            filter
                .apply(&rides.all_rides)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Publishes a ride. Held lists are not touched; observers re-fetch on
    /// the success signal.
    pub async fn publish(&self, ride: PublishRide) -> Result<MessageResponse, ClientError> {
        if let Err(err) = ride.validate() {
            self.store.fail(err.display_message(PUBLISH.fallback_error));
            return Err(err);
        }

        let api = self.api.clone();
        self.store
            .run(
                PUBLISH,
                async move { api.post_json(endpoints::RIDES_PUBLISH, &ride).await },
                |_, response: &MessageResponse| {
                    Some(success_message(response, "Ride published successfully"))
                },
            )
            .await
    }

    pub async fn fetch_driver_rides(&self) -> Result<Vec<Ride>, ClientError> {
        let api = self.api.clone();
        self.store
            .run(
                FETCH_DRIVER_RIDES,
                async move { api.get(endpoints::RIDES_MINE).await },
                |rides, response: &Vec<Ride>| {
                    rides.driver_rides = response.clone();
                    None
                },
            )
            .await
    }

    pub async fn fetch_all(&self) -> Result<Vec<Ride>, ClientError> {
        let api = self.api.clone();
        self.store
            .run(
                FETCH_ALL,
                async move { api.get(endpoints::RIDES_ADMIN).await },
                |rides, response: &Vec<Ride>| {
                    rides.all_rides = response.clone();
                    None
                },
            )
            .await
    }

    pub async fn cancel(&self, ride_id: &str) -> Result<MessageResponse, ClientError> {
        let api = self.api.clone();
        let path = endpoints::cancel_ride(ride_id);
        self.store
            .run(
                CANCEL,
                async move { api.patch(&path).await },
                |_, response: &MessageResponse| {
                    Some(success_message(response, "Ride cancelled successfully"))
                },
            )
            .await
    }

    pub async fn complete(&self, ride_id: &str) -> Result<MessageResponse, ClientError> {
        let api = self.api.clone();
        let path = endpoints::complete_ride(ride_id);
        self.store
            .run(
                COMPLETE,
                async move { api.patch(&path).await },
                |_, response: &MessageResponse| {
                    Some(success_message(response, "Ride completed successfully"))
                },
            )
            .await
    }

    pub fn clear_state(&self) {
        self.store.clear_state();
    }
}

fn success_message(response: &MessageResponse, default: &str) -> String {
    response
        .message
        .clone()
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::store::resource::RequestOutcome;

    fn offline_store() -> RideStore {
        // Nothing listens on port 9; validation must fail before any request.
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        RideStore::new(api, Sequencing::LastWriteWins, Metrics::new())
    }

    #[tokio::test]
    async fn publish_with_missing_fields_fails_without_a_request() {
        let store = offline_store();
        let request = PublishRide {
            from_city: "Lagos".to_string(),
            to_city: String::new(),
            pickup_point: "Ojota".to_string(),
            dropoff_point: "Dugbe".to_string(),
            departure_time: Utc::now(),
            available_seats: 2,
            price_per_seat: 3000.0,
            distance: Some(128.0),
        };

        let result = store.publish(request).await;

        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert_eq!(
            store.store().outcome(),
            RequestOutcome::Failed("Missing required fields: toCity".to_string())
        );
    }

    #[test]
    fn blank_api_message_uses_default() {
        let blank = MessageResponse {
            message: Some(" ".to_string()),
        };
        assert_eq!(success_message(&blank, "Ride cancelled successfully"), "Ride cancelled successfully");
        let given = MessageResponse {
            message: Some("Ride cancelled".to_string()),
        };
        assert_eq!(success_message(&given, "x"), "Ride cancelled");
    }
}
