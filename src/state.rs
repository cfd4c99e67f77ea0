use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::ClientError;
use crate::models::user::Role;
use crate::notify::{BroadcastNotifier, FanoutNotifier, FollowUp, NotificationRelay, Notifier};
use crate::observability::metrics::Metrics;
use crate::store::session::{FileSessionStorage, SessionStorage};
use crate::store::{AdminDriverStore, AuthStore, DriverStore, RideStore};

/// Process-wide client state, created once at startup.
pub struct AppState {
    pub api: ApiClient,
    pub auth: AuthStore,
    pub driver: DriverStore,
    pub admin_drivers: AdminDriverStore,
    pub rides: RideStore,
    pub notifications: BroadcastNotifier,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, storage: Arc<dyn SessionStorage>) -> Result<Self, ClientError> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout())?;
        let metrics = Metrics::new();

        Ok(Self {
            auth: AuthStore::new(api.clone(), storage, config.sequencing, metrics.clone()),
            driver: DriverStore::new(api.clone(), config.sequencing, metrics.clone()),
            admin_drivers: AdminDriverStore::new(api.clone(), config.sequencing, metrics.clone()),
            rides: RideStore::new(api.clone(), config.sequencing, metrics.clone()),
            notifications: BroadcastNotifier::new(config.notification_buffer_size),
            api,
            metrics,
        })
    }

    /// Builds state backed by the session file and restores any saved
    /// session.
    pub async fn init(config: &Config) -> Result<Self, ClientError> {
        let storage = Arc::new(FileSessionStorage::new(&config.session_path));
        let state = Self::new(config, storage)?;
        state.auth.restore().await?;
        Ok(state)
    }

    /// Starts one relay per store. Notifications go to `notifier` and to
    /// [`AppState::notifications`] subscribers.
    pub fn spawn_relays(&self, notifier: Arc<dyn Notifier>) -> Vec<JoinHandle<()>> {
        let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(vec![
            notifier,
            Arc::new(self.notifications.clone()),
        ]));

        vec![
            NotificationRelay::new(self.auth.store(), notifier.clone())
                .with_metrics(self.metrics.clone())
                .spawn(),
            NotificationRelay::new(self.driver.store(), notifier.clone())
                .with_metrics(self.metrics.clone())
                .spawn(),
            NotificationRelay::new(self.admin_drivers.store(), notifier.clone())
                .with_metrics(self.metrics.clone())
                .spawn(),
            NotificationRelay::new(self.rides.store(), notifier)
                .with_metrics(self.metrics.clone())
                .with_follow_up(self.ride_refresh())
                .spawn(),
        ]
    }

    /// Re-fetches the ride list the signed-in user is looking at.
    pub fn ride_refresh(&self) -> FollowUp {
        let rides = self.rides.clone();
        let auth = self.auth.clone();
        Arc::new(move || {
            let rides = rides.clone();
            let role = auth.role();
            Box::pin(async move {
                let refreshed = match role {
                    Some(Role::Admin) => rides.fetch_all().await.map(|list| list.len()),
                    _ => rides.fetch_driver_rides().await.map(|list| list.len()),
                };
                match refreshed {
                    Ok(count) => debug!(count, "ride list refreshed"),
                    Err(err) => debug!(error = %err, "ride list refresh failed"),
                }
            })
        })
    }
}
