use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::upload::MultipartForm;
use crate::error::ClientError;
use crate::models::ErrorBody;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON client for the ride-share API.
///
/// Cheap to clone; clones share the connection pool and the bearer token
/// installed by the auth store.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let (builder, request_id) = self.request(Method::GET, path).await;
        self.execute(builder, Method::GET, path, request_id).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (builder, request_id) = self.request(Method::POST, path).await;
        self.execute(builder.json(body), Method::POST, path, request_id)
            .await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let (builder, request_id) = self.request(Method::PATCH, path).await;
        self.execute(builder, Method::PATCH, path, request_id).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> Result<T, ClientError> {
        self.send_multipart(Method::POST, path, form).await
    }

    pub async fn put_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> Result<T, ClientError> {
        self.send_multipart(Method::PUT, path, form).await
    }

    async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: MultipartForm,
    ) -> Result<T, ClientError> {
        let form = form.into_form()?;
        let (builder, request_id) = self.request(method.clone(), path).await;
        self.execute(builder.multipart(form), method, path, request_id)
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> (RequestBuilder, Uuid) {
        let request_id = Uuid::new_v4();
        let mut builder = self
            .http
            .request(method, self.url(path))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.to_string());

        if let Some(token) = self.token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }

        (builder, request_id)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        method: Method,
        path: &str,
        request_id: Uuid,
    ) -> Result<T, ClientError> {
        debug!(%method, path, %request_id, "sending api request");

        let response = builder.send().await.map_err(|err| {
            warn!(%method, path, %request_id, error = %err, "api request failed to send");
            ClientError::from(err)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(ClientError::from)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.message);
            warn!(
                %method,
                path,
                %request_id,
                status = status.as_u16(),
                message = message.as_deref().unwrap_or(""),
                "api request rejected"
            );
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(%method, path, %request_id, status = status.as_u16(), "api request succeeded");
        decode_body(&body)
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|err| ClientError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageResponse;
    use crate::models::ride::Ride;

    #[test]
    fn trailing_slash_on_base_url_is_dropped() {
        let client = ApiClient::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/rides/admin"), "http://localhost:5000/api/rides/admin");
    }

    #[test]
    fn empty_success_body_decodes_as_empty_object() {
        let ack: MessageResponse = decode_body(b"").unwrap();
        assert_eq!(ack, MessageResponse::default());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let result: Result<Vec<Ride>, _> = decode_body(br#"{"rides": "nope"}"#);
        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn token_is_shared_between_clones() {
        let client = ApiClient::new("http://localhost:5000/api", Duration::from_secs(1)).unwrap();
        let clone = client.clone();

        client.set_token(Some("abc".to_string())).await;
        assert!(clone.has_token().await);

        clone.set_token(None).await;
        assert!(!client.has_token().await);
    }
}
