use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rideshare_client::config::{Config, LogFormat};
use rideshare_client::error::ClientError;
use rideshare_client::models::ride::RideFilter;
use rideshare_client::models::user::{LoginRequest, Role};
use rideshare_client::notify::TracingNotifier;
use rideshare_client::routing::{self, Access, Route};
use rideshare_client::state::AppState;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let state = AppState::init(&config).await?;
    let relays = state.spawn_relays(Arc::new(TracingNotifier));

    if state.auth.session().is_none() {
        if let Some(credentials) = &config.credentials {
            let request = LoginRequest {
                email: credentials.email.clone(),
                password: credentials.password.clone(),
            };
            if let Err(err) = state.auth.login(request).await {
                warn!(error = %err, "sign in failed");
            }
        }
    }

    match state.auth.session() {
        Some(session) => {
            info!(
                user = %session.user.full_name(),
                role = session.role().as_str(),
                landing = routing::landing(&session).path(),
                "session active"
            );
            refresh(&state).await;
        }
        None => info!(redirect = Route::Login.path(), "no session; sign in required"),
    }

    tokio::select! {
        _ = command_loop(&state) => {},
        _ = shutdown_signal() => {},
    }

    for relay in relays {
        relay.abort();
    }

    if let Ok(body) = state.metrics.encode() {
        tracing::debug!(metrics = %body, "final metrics");
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }
}

/// Reads one action per line from stdin until `quit` or end of input.
async fn command_loop(state: &AppState) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed to read command");
                break;
            }
        };

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();

        if command == "quit" || command == "exit" {
            break;
        }
        run_command(state, command, arg).await;
    }
}

async fn run_command(state: &AppState, command: &str, arg: Option<&str>) {
    let required = match command {
        "approve" | "reject" | "drivers" => Some(Route::AdminDrivers),
        "cancel" => Some(match state.auth.role() {
            Some(Role::Admin) => Route::AdminRides,
            _ => Route::MyRides,
        }),
        "complete" => Some(Route::MyRides),
        _ => None,
    };
    if let Some(route) = required {
        if let Access::Redirect(to) = routing::guard(route, state.auth.session().as_ref()) {
            warn!(command, redirect = to.path(), "not allowed");
            return;
        }
    }

    // Failures are already held by the stores and surfaced by the relays.
    match (command, arg) {
        ("refresh", _) => refresh(state).await,
        ("approve", Some(id)) => {
            let _ = state.admin_drivers.approve(id).await;
        }
        ("reject", Some(id)) => {
            let _ = state.admin_drivers.reject(id).await;
        }
        ("cancel", Some(id)) => {
            let _ = state.rides.cancel(id).await;
        }
        ("complete", Some(id)) => {
            let _ = state.rides.complete(id).await;
        }
        ("drivers", _) => {
            for driver in state.admin_drivers.drivers() {
                info!(
                    id = %driver.id,
                    name = %driver.full_name(),
                    status = driver.effective_status().as_str(),
                    "driver"
                );
            }
        }
        ("rides", filter) => {
            let filter = RideFilter {
                from_city: filter.map(str::to_string),
                ..RideFilter::default()
            };
            let rides = match state.auth.role() {
                Some(Role::Admin) => state.rides.filtered_all_rides(&filter),
                _ => state.rides.filtered_driver_rides(&filter),
            };
            for ride in rides {
                info!(
                    id = %ride.id,
                    route = %ride.route(),
                    departs = %ride.formatted_departure(),
                    price = %ride.formatted_price(),
                    seats = ride.available_seats.unwrap_or_default(),
                    status = ride.status.map(|status| status.as_str()).unwrap_or("unknown"),
                    "ride"
                );
            }
        }
        ("logout", _) => {
            if let Err(err) = state.auth.logout().await {
                warn!(error = %err, "failed to clear saved session");
            }
        }
        ("", _) => {}
        (other, _) => warn!(
            command = other,
            "unknown command; try refresh, drivers, rides [city], approve|reject|cancel|complete <id>, logout, quit"
        ),
    }
}

async fn refresh(state: &AppState) {
    match state.auth.role() {
        Some(Role::Admin) => {
            let _ = tokio::join!(state.admin_drivers.fetch_all(), state.rides.fetch_all());
            let summary = state.admin_drivers.summary();
            info!(
                total = summary.total,
                pending = summary.pending,
                approved = summary.approved,
                rejected = summary.rejected,
                rides = state.rides.all_rides().len(),
                "admin overview"
            );
        }
        Some(Role::Driver) => {
            let _ = tokio::join!(state.driver.fetch_profile(), state.rides.fetch_driver_rides());
            let status = state
                .driver
                .profile()
                .map(|profile| profile.status.unwrap_or_default().as_str())
                .unwrap_or("none");
            info!(
                profile_status = status,
                rides = state.rides.driver_rides().len(),
                "driver dashboard"
            );
        }
        Some(Role::User) => {
            info!(next = Route::DriverOnboarding.path(), "driver onboarding not completed");
        }
        None => info!(redirect = Route::Login.path(), "no session; sign in required"),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
