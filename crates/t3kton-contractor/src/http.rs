//! CInP over HTTP.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{CinpTransport, CinpVerb, ContractorError, ContractorResult, API_NAMESPACE};

const CINP_VERSION: &str = "1.0";
const HEADER_CINP_VERSION: &str = "CInP-Version";
const HEADER_AUTH_ID: &str = "Auth-Id";
const HEADER_AUTH_TOKEN: &str = "Auth-Token";

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL, e.g. `http://contractor`.
    pub host: String,
    pub username: String,
    pub password: String,
    pub proxy: Option<String>,
    /// How long a login token is trusted before logging in again.
    pub token_lifetime: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug)]
struct Session {
    token: String,
    issued: Instant,
}

impl Session {
    fn is_expired(&self, lifetime: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.issued) >= lifetime
    }
}

/// Authenticated CInP client.
///
/// Logs in lazily on the first [`CinpTransport::refresh_session`] and again
/// whenever the token is older than [`HttpConfig::token_lifetime`].
pub struct HttpTransport {
    config: HttpConfig,
    client: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> ContractorResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|source| ContractorError::Http {
                uri: proxy.clone(),
                source,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|source| ContractorError::Http {
            uri: config.host.clone(),
            source,
        })?;

        Ok(Self {
            config,
            client,
            session: Mutex::new(None),
        })
    }

    fn url(&self, uri: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), uri)
    }

    async fn current_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.token.clone())
    }

    async fn send(
        &self,
        verb: CinpVerb,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> ContractorResult<Value> {
        let method = match verb {
            CinpVerb::Get => Method::GET,
            other => Method::from_bytes(other.as_str().as_bytes())
                .map_err(|e| ContractorError::transport(e.to_string()))?,
        };

        let mut request = self
            .client
            .request(method, self.url(uri))
            .header(HEADER_CINP_VERSION, CINP_VERSION)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json;charset=utf-8");

        if let Some(token) = token {
            request = request
                .header(HEADER_AUTH_ID, &self.config.username)
                .header(HEADER_AUTH_TOKEN, token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(verb = %verb, uri, "CInP request");
        let response = request.send().await.map_err(|source| ContractorError::Http {
            uri: uri.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ContractorError::Http {
            uri: uri.to_string(),
            source,
        })?;

        decode_response(verb, uri, status, &text)
    }

    async fn request(&self, verb: CinpVerb, uri: &str, body: Option<Value>) -> ContractorResult<Value> {
        let token = self.current_token().await;
        let result = self.send(verb, uri, body, token.as_deref()).await;

        // A rejected token forces a fresh login on the next refresh.
        if let Err(ContractorError::Auth(_)) = &result {
            self.session.lock().await.take();
        }
        result
    }

    async fn login(&self) -> ContractorResult<String> {
        let uri = format!("{API_NAMESPACE}/Auth/User(login)");
        let body = json!({
            "username": self.config.username,
            "password": self.config.password,
        });

        match self.send(CinpVerb::Call, &uri, Some(body), None).await? {
            Value::String(token) if !token.is_empty() => Ok(token),
            other => Err(ContractorError::Auth(format!(
                "login returned no token: {other}"
            ))),
        }
    }

    async fn logout(&self, token: &str) -> ContractorResult<()> {
        let uri = format!("{API_NAMESPACE}/Auth/User(logout)");
        let body = json!({ "token": token });
        self.send(CinpVerb::Call, &uri, Some(body), Some(token))
            .await
            .map(|_| ())
    }
}

/// Maps an HTTP response onto the CInP result or error.
fn decode_response(verb: CinpVerb, uri: &str, status: StatusCode, text: &str) -> ContractorResult<Value> {
    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(text).map_err(|e| ContractorError::decode(uri, e.to_string()));
    }

    let message = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| text.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => Err(ContractorError::not_found(uri)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ContractorError::Auth(message)),
        other => Err(ContractorError::Status {
            verb: verb.to_string(),
            uri: uri.to_string(),
            status: other.as_u16(),
            message,
        }),
    }
}

#[async_trait]
impl CinpTransport for HttpTransport {
    async fn get(&self, uri: &str) -> ContractorResult<Value> {
        self.request(CinpVerb::Get, uri, None).await
    }

    async fn update(&self, uri: &str, values: Value) -> ContractorResult<Value> {
        self.request(CinpVerb::Update, uri, Some(values)).await
    }

    async fn call(&self, uri: &str, method: &str, params: Value) -> ContractorResult<Value> {
        let uri = format!("{uri}({method})");
        self.request(CinpVerb::Call, &uri, Some(params)).await
    }

    async fn refresh_session(&self) -> ContractorResult<()> {
        let mut session = self.session.lock().await;

        if let Some(current) = session.as_ref() {
            if !current.is_expired(self.config.token_lifetime, Instant::now()) {
                return Ok(());
            }
            if let Err(e) = self.logout(&current.token).await {
                warn!(error = %e, "Failed to log out expired Contractor session");
            }
        }

        let token = self.login().await?;
        *session = Some(Session {
            token,
            issued: Instant::now(),
        });
        info!(host = %self.config.host, user = %self.config.username, "Logged in to Contractor");
        Ok(())
    }

    async fn close(&self) -> ContractorResult<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        self.logout(&session.token).await?;
        info!(host = %self.config.host, "Logged out of Contractor");
        Ok(())
    }
}
