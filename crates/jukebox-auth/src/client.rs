use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use url::Url;

use jukebox_store::Store;
use jukebox_types::api::{IdentityResponse, PasswordLoginRequest, StoredMessage, StoredUser};
use jukebox_types::models::{Identity, TokenKind};

use crate::cookies::{absorb_set_cookies, cookie_header};
use crate::error::AuthError;

const LOGIN_PATH: &str = "api/auth/login";
const REFRESH_PATH: &str = "api/auth/refresh";
const LOGOUT_PATH: &str = "api/auth/logout";
const MESSAGES_PATH: &str = "api/messages/";
const USERS_PATH: &str = "api/users/";

/// HTTP side of the session: exchanges stored credentials for an identity
/// and keeps the local store in step with what the server says.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: Url,
    store: Arc<Store>,
}

impl AuthClient {
    pub fn new(base_url: &str, store: Arc<Store>) -> Result<Self, AuthError> {
        Self::with_timeout(base_url, store, None)
    }

    /// Same as [`AuthClient::new`] with an upper bound on every request.
    pub fn with_timeout(base_url: &str, store: Arc<Store>, timeout: Option<Duration>) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { http, base_url, store })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchange the stored access token for the caller's identity.
    pub async fn login_from_access_token(&self) -> Result<Identity, AuthError> {
        self.login_with_token(TokenKind::Access, LOGIN_PATH).await
    }

    /// Exchange the stored refresh token for fresh tokens and the caller's
    /// identity.
    pub async fn login_from_refresh_token(&self) -> Result<Identity, AuthError> {
        self.login_with_token(TokenKind::Refresh, REFRESH_PATH).await
    }

    pub async fn login_with_password(&self, username_or_email: &str, password: &str) -> Result<Identity, AuthError> {
        let request = self
            .http
            .post(self.endpoint(LOGIN_PATH)?)
            .form(&PasswordLoginRequest { username_or_email, password });

        let response = self.send(request).await?;
        let identity = self.store_identity(response).await?;
        info!("{} ({}) logged in with password", identity.username, identity.user_id);
        Ok(identity)
    }

    /// Invalidate the session server-side. Local identity and tokens are only
    /// cleared once the server accepts.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let request = self.authorized(self.http.post(self.endpoint(LOGOUT_PATH)?), TokenKind::Access)?;

        self.send(request).await?;
        self.store.clear_identity()?;
        info!("Logged out");
        Ok(())
    }

    /// Fetch a single persisted message row.
    pub async fn fetch_message(&self, message_id: i64) -> Result<StoredMessage, AuthError> {
        let url = self.endpoint(MESSAGES_PATH)?.join(&message_id.to_string())?;
        let response = self.send(self.http.get(url)).await?;
        parse_body(response).await
    }

    /// Fetch a user row. The route is authenticated, so stored credentials
    /// go along.
    pub async fn fetch_user(&self, user_id: i64) -> Result<StoredUser, AuthError> {
        let url = self.endpoint(USERS_PATH)?.join(&user_id.to_string())?;
        let request = self.authorized(self.http.get(url), TokenKind::Access)?;
        let response = self.send(request).await?;
        parse_body(response).await
    }

    async fn login_with_token(&self, kind: TokenKind, path: &str) -> Result<Identity, AuthError> {
        let has_token = self
            .store
            .token(kind)?
            .is_some_and(|token| !token.trim().is_empty());
        if !has_token {
            return Err(AuthError::MissingCredential(kind));
        }

        let request = self
            .authorized(self.http.post(self.endpoint(path)?), kind)?
            .header(CONTENT_TYPE, "application/json");

        let response = self.send(request).await?;
        let identity = self.store_identity(response).await?;
        info!("{} ({}) logged in from {} token", identity.username, identity.user_id, kind);
        Ok(identity)
    }

    /// Attach the `kind` token as a bearer credential plus every stored token
    /// as cookies.
    fn authorized(&self, request: RequestBuilder, kind: TokenKind) -> Result<RequestBuilder, AuthError> {
        let mut request = request;
        if let Some(token) = self.store.token(kind)? {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookies) = cookie_header(&self.store)? {
            request = request.header(COOKIE, cookies);
        }
        Ok(request)
    }

    /// Send, absorb any cookies, and turn non-2xx into [`AuthError::Rejected`].
    async fn send(&self, request: RequestBuilder) -> Result<Response, AuthError> {
        let response = request.send().await.map_err(|e| {
            error!("Auth request failed: {}", e);
            AuthError::Transport(e)
        })?;

        absorb_set_cookies(&self.store, response.headers())?;

        let status = response.status();
        debug!(%status, url = %response.url(), "auth response");
        if !status.is_success() {
            warn!("Auth request to {} rejected: {}", response.url().path(), status);
            return Err(AuthError::Rejected(status));
        }
        Ok(response)
    }

    async fn store_identity(&self, response: Response) -> Result<Identity, AuthError> {
        let body: IdentityResponse = parse_body(response).await?;
        if body.username.is_empty() {
            return Err(AuthError::MalformedResponse("empty username".into()));
        }
        self.store.set_identity(body.user_id, &body.username)?;
        Ok(Identity {
            user_id: body.user_id,
            username: body.username,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        Ok(self.base_url.join(path)?)
    }
}

async fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode, header},
        response::{AppendHeaders, IntoResponse},
        routing::{get, post},
    };
    use serde_json::json;

    /// Serve `app` on an ephemeral port and return its base URL.
    pub(crate) async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> &'a str {
        headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
    }

    pub(crate) async fn accept_access(headers: HeaderMap) -> impl IntoResponse {
        if header_str(&headers, header::AUTHORIZATION) != "Bearer a1" {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(json!({"user_id": 3, "username": "dj"})).into_response()
    }

    pub(crate) async fn accept_refresh(headers: HeaderMap) -> impl IntoResponse {
        if !header_str(&headers, header::COOKIE).contains("refresh_token=r1") {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        (
            AppendHeaders([
                (header::SET_COOKIE, "access_token=a2; Path=/api; HttpOnly; Secure"),
                (header::SET_COOKIE, "refresh_token=r2; Path=/api/auth; Max-Age=604800; HttpOnly; Secure"),
            ]),
            Json(json!({"user_id": 7, "username": "abc"})),
        )
            .into_response()
    }

    pub(crate) async fn reject() -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn client(base: &str) -> AuthClient {
        AuthClient::new(base, Arc::new(Store::open_in_memory().unwrap())).unwrap()
    }

    #[tokio::test]
    async fn access_token_login_stores_identity() {
        let base = spawn_server(Router::new().route("/api/auth/login", post(accept_access))).await;
        let client = client(&base);
        client.store().set_token(TokenKind::Access, "a1", None).unwrap();

        let identity = client.login_from_access_token().await.unwrap();

        assert_eq!(identity, Identity { user_id: 3, username: "dj".into() });
        assert_eq!(client.store().identity().unwrap(), Some(identity));
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let base = spawn_server(Router::new().route("/api/auth/refresh", post(accept_refresh))).await;
        let client = client(&base);
        client.store().set_token(TokenKind::Refresh, "r1", None).unwrap();

        client.login_from_refresh_token().await.unwrap();

        let store = client.store();
        assert_eq!(store.token(TokenKind::Access).unwrap().as_deref(), Some("a2"));
        assert_eq!(store.token(TokenKind::Refresh).unwrap().as_deref(), Some("r2"));
        assert_eq!(store.user_id().unwrap(), Some(7));
    }

    #[tokio::test]
    async fn missing_or_blank_token_sends_nothing() {
        // nothing listens at this address, so a request would be a transport error
        let client = client("http://127.0.0.1:9");

        let err = client.login_from_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential(TokenKind::Access)));

        client.store().set_token(TokenKind::Refresh, "   ", None).unwrap();
        let err = client.login_from_refresh_token().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential(TokenKind::Refresh)));
    }

    #[tokio::test]
    async fn rejection_is_distinguished() {
        let base = spawn_server(Router::new().route("/api/auth/login", post(reject))).await;
        let client = client(&base);
        client.store().set_token(TokenKind::Access, "expired", None).unwrap();

        let err = client.login_from_access_token().await.unwrap_err();
        assert!(err.is_rejection());
        assert!(!client.store().is_user_connected().unwrap());
    }

    #[tokio::test]
    async fn malformed_body_is_distinguished() {
        let app = Router::new().route("/api/auth/login", post(|| async { Json(json!({"user": "dj"})) }));
        let base = spawn_server(app).await;
        let client = client(&base);
        client.store().set_token(TokenKind::Access, "a1", None).unwrap();

        let err = client.login_from_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
        assert!(!client.store().is_user_connected().unwrap());
    }

    #[tokio::test]
    async fn transport_failure_is_distinguished() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(&format!("http://{}", addr));
        client.store().set_token(TokenKind::Access, "a1", None).unwrap();

        let err = client.login_from_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn password_login_uses_form_fields() {
        async fn login(body: String) -> impl IntoResponse {
            if !body.contains("username_or_email=dj") || !body.contains("password=hunter2") {
                return StatusCode::BAD_REQUEST.into_response();
            }
            (
                AppendHeaders([
                    (header::SET_COOKIE, "access_token=a1; Path=/api"),
                    (header::SET_COOKIE, "refresh_token=r1; Max-Age=604800"),
                ]),
                Json(json!({"user_id": 3, "username": "dj"})),
            )
                .into_response()
        }

        let base = spawn_server(Router::new().route("/api/auth/login", post(login))).await;
        let client = client(&base);

        let identity = client.login_with_password("dj", "hunter2").await.unwrap();
        assert_eq!(identity.user_id, 3);
        assert_eq!(client.store().token(TokenKind::Refresh).unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn logout_clears_only_on_success() {
        let base = spawn_server(Router::new().route("/api/auth/logout", post(reject))).await;
        let client = client(&base);
        client.store().set_identity(3, "dj").unwrap();
        client.store().set_token(TokenKind::Access, "a1", None).unwrap();

        assert!(client.logout().await.is_err());
        assert!(client.store().is_user_connected().unwrap());

        async fn accept() -> impl IntoResponse {
            AppendHeaders([(header::SET_COOKIE, "access_token=; Path=/api; Max-Age=0")])
        }
        let base = spawn_server(Router::new().route("/api/auth/logout", post(accept))).await;
        let client = AuthClient::new(&base, client.store().clone()).unwrap();

        client.logout().await.unwrap();
        assert!(!client.store().is_user_connected().unwrap());
        assert_eq!(client.store().token(TokenKind::Access).unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_message_under_base_path() {
        let app = Router::new().route(
            "/jukebox/api/messages/{id}",
            get(|| async {
                Json(json!({
                    "id": 5,
                    "sender_id": 1,
                    "content": "hi",
                    "flagged": false,
                    "removed": false,
                    "censored": false,
                    "created_at": 1709633730,
                    "modified_at": 1709633730000i64
                }))
            }),
        );
        let base = spawn_server(app).await;
        let client = client(&format!("{}/jukebox", base));

        let message = client.fetch_message(5).await.unwrap();
        assert_eq!(message.id, 5);
        assert_eq!(message.sender_id, 1);
        assert_eq!(message.modified_at, 1_709_633_730_000);
    }

    #[tokio::test]
    async fn fetch_user_sends_credentials() {
        async fn user(headers: HeaderMap) -> impl IntoResponse {
            if header_str(&headers, header::AUTHORIZATION) != "Bearer a1" {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            Json(json!({
                "id": 1,
                "username": "dj",
                "hashed_password": "$argon2id$...",
                "email": "dj@example.com",
                "admin": true,
                "banned": false,
                "total_contributions": 4,
                "minutes_listened": 90,
                "subscriber_tier": 1,
                "created_at": 1709633730,
                "modified_at": 1709633730000i64
            }))
            .into_response()
        }

        let base = spawn_server(Router::new().route("/api/users/{id}", get(user))).await;
        let client = client(&base);

        let err = client.fetch_user(1).await.unwrap_err();
        assert!(err.is_rejection());

        client.store().set_token(TokenKind::Access, "a1", None).unwrap();
        let user = client.fetch_user(1).await.unwrap();
        assert_eq!(user.username, "dj");
        assert!(user.admin);
        assert_eq!(user.subscriber_tier, 1);
    }
}
