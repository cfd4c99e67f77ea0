use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{ApiClient, endpoints};
use crate::error::ClientError;
use crate::models::MessageResponse;
use crate::models::user::{LoginRequest, LoginResponse, RegisterRequest, Role, Session, User};
use crate::observability::metrics::Metrics;
use crate::store::resource::{Operation, ResourceStore, Sequencing};
use crate::store::session::SessionStorage;

const REGISTER: Operation = Operation::write("register", "Registration failed");
const LOGIN: Operation = Operation::write("login", "Login failed");

#[derive(Clone)]
pub struct AuthStore {
    api: ApiClient,
    store: Arc<ResourceStore<Option<Session>>>,
    storage: Arc<dyn SessionStorage>,
}

impl AuthStore {
    pub fn new(
        api: ApiClient,
        storage: Arc<dyn SessionStorage>,
        sequencing: Sequencing,
        metrics: Metrics,
    ) -> Self {
        Self {
            api,
            store: Arc::new(ResourceStore::new("auth", None, sequencing, metrics)),
            storage,
        }
    }

    pub fn store(&self) -> Arc<ResourceStore<Option<Session>>> {
        self.store.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.store.read(Clone::clone)
    }

    pub fn current_user(&self) -> Option<User> {
        self.store.read(|session| session.as_ref().map(|s| s.user.clone()))
    }

    pub fn role(&self) -> Option<Role> {
        self.store.read(|session| session.as_ref().map(Session::role))
    }

    /// Loads the persisted session, if any. Called once at startup.
    pub async fn restore(&self) -> Result<Option<Session>, ClientError> {
        let restored = self.storage.load().await?;
        if let Some(session) = &restored {
            info!(email = session.user.email(), role = session.role().as_str(), "session restored");
            self.api.set_token(session.token.clone()).await;
        }
        let held = restored.clone();
        self.store.update(move |session| *session = held);
        Ok(restored)
    }

    /// Creates an account. The user still has to verify and sign in.
    pub async fn register(&self, request: RegisterRequest) -> Result<MessageResponse, ClientError> {
        let api = self.api.clone();
        self.store
            .run(
                REGISTER,
                async move { api.post_json(endpoints::REGISTER, &request).await },
                |_, response: &MessageResponse| {
                    Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "Registration successful".to_string()),
                    )
                },
            )
            .await
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Session, ClientError> {
        let api = self.api.clone();
        let response = self
            .store
            .run(
                LOGIN,
                async move { api.post_json::<_, LoginResponse>(endpoints::LOGIN, &request).await },
                |session, response: &LoginResponse| {
                    *session = Some(Session {
                        user: response.user.clone(),
                        token: response.token.clone(),
                    });
                    Some(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "Signed in successfully".to_string()),
                    )
                },
            )
            .await?;

        let session = Session {
            user: response.user,
            token: response.token,
        };
        self.api.set_token(session.token.clone()).await;

        if let Err(err) = self.storage.save(&session).await {
            self.store
                .fail("Signed in, but the session could not be saved on this device");
            return Err(err);
        }

        info!(email = session.user.email(), role = session.role().as_str(), "signed in");
        Ok(session)
    }

    /// Drops the session locally whatever the API says about it.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.session().is_some() {
            if let Err(err) = self
                .api
                .post_json::<_, MessageResponse>(endpoints::LOGOUT, &serde_json::json!({}))
                .await
            {
                warn!(error = %err, "remote logout failed; clearing local session anyway");
            }
        }

        self.api.set_token(None).await;
        self.store.update(|session| *session = None);
        self.store.clear_state();
        self.storage.clear().await?;

        info!("signed out");
        Ok(())
    }

    pub fn clear_state(&self) {
        self.store.clear_state();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::store::resource::RequestOutcome;
    use crate::store::session::MemorySessionStorage;

    fn session(role: &str) -> Session {
        serde_json::from_value(json!({
            "user": {
                "_id": "u1",
                "firstName": "Ada",
                "lastName": "Obi",
                "email": "ada@example.com",
                "role": role
            },
            "token": "tok-1"
        }))
        .unwrap()
    }

    // Nothing listens on the discard port, so remote calls fail fast.
    fn auth(storage: Arc<MemorySessionStorage>) -> AuthStore {
        let api = ApiClient::new("http://127.0.0.1:9/api", Duration::from_millis(500)).unwrap();
        AuthStore::new(api, storage, Sequencing::default(), Metrics::new())
    }

    #[tokio::test]
    async fn restore_installs_saved_session_and_token() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.save(&session("admin")).await.unwrap();
        let auth = auth(storage);

        let restored = auth.restore().await.unwrap();

        assert_eq!(restored, Some(session("admin")));
        assert_eq!(auth.role(), Some(Role::Admin));
        assert_eq!(
            auth.current_user().and_then(|user| user.email),
            Some("ada@example.com".to_string())
        );
        assert!(auth.api.has_token().await);
        assert_eq!(auth.store().outcome(), RequestOutcome::Idle);
    }

    #[tokio::test]
    async fn restore_without_saved_session_leaves_store_empty() {
        let auth = auth(Arc::new(MemorySessionStorage::new()));

        assert_eq!(auth.restore().await.unwrap(), None);
        assert!(auth.session().is_none());
        assert!(!auth.api.has_token().await);
    }

    #[tokio::test]
    async fn logout_clears_everything_when_remote_is_unreachable() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.save(&session("driver")).await.unwrap();
        let auth = auth(storage.clone());
        auth.restore().await.unwrap();

        auth.logout().await.unwrap();

        assert!(auth.session().is_none());
        assert!(!auth.api.has_token().await);
        assert_eq!(storage.load().await.unwrap(), None);
        assert_eq!(auth.store().outcome(), RequestOutcome::Idle);
    }

    #[tokio::test]
    async fn failed_login_falls_back_to_default_message() {
        let auth = auth(Arc::new(MemorySessionStorage::new()));

        let result = auth
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await;

        assert!(result.is_err());
        assert!(auth.session().is_none());
        assert_eq!(auth.store().outcome(), RequestOutcome::Failed("Login failed".to_string()));
    }
}
