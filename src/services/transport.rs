use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::serde_id;
use crate::error::{Error, Result};

/// Error messages after which the session is renewed and the call retried.
const SESSION_FAILURES: [&str; 2] = ["BAD_REQUEST", "SESSION_TIME_EXPIRED"];

/// Generic success/error wrapper around every game server reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_code")]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub server_time: Option<i64>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub updated_item_list: Vec<ItemAmount>,
    #[serde(default)]
    pub reduced_item_list: Vec<ItemAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ItemAmount {
    #[serde(default)]
    pub amount: u64,
}

impl Envelope {
    pub fn ok(response: Value) -> Self {
        Self {
            success: true,
            response: Some(response),
            ..Self::default()
        }
    }

    pub fn failure(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: code,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_session_failure(&self) -> bool {
        !self.success
            && self
                .error_message
                .as_deref()
                .is_some_and(|m| SESSION_FAILURES.contains(&m))
    }

    /// Turns a failed envelope into `Error::Rejected`.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::rejected(
                self.error_code,
                self.error_message.unwrap_or_else(|| "UNKNOWN".to_string()),
            ))
        }
    }

    /// Decodes the nested `response` mapping.
    pub fn response_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.response.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| Error::Malformed(e.to_string()))
    }

    pub fn updated_amount(&self) -> Option<u64> {
        self.updated_item_list.first().map(|i| i.amount)
    }

    pub fn reduced_amount(&self) -> Option<u64> {
        self.reduced_item_list.first().map(|i| i.amount)
    }
}

fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Authenticated request/response channel to the game server.
///
/// Implementations renew an expired session and retry the call once before
/// handing back a failure envelope.
pub trait Transport: Send + Sync + 'static {
    fn get(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> impl Future<Output = Result<Envelope>> + Send;

    fn post(
        &self,
        endpoint: &str,
        payload: &[(&str, String)],
    ) -> impl Future<Output = Result<Envelope>> + Send;
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_url: String,
    pub data_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub login_id: u64,
    pub user_id: u64,
}

impl Credentials {
    /// Game server shard: the first three digits of the user id.
    pub fn server_prefix(&self) -> String {
        self.user_id.to_string().chars().take(3).collect()
    }
}

#[derive(Debug, Clone)]
struct Session {
    id: String,
    socket_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginGrant {
    #[serde(deserialize_with = "serde_id::string")]
    session_id: String,
    #[serde(deserialize_with = "serde_id::string")]
    account_id: String,
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Post,
}

/// `reqwest` transport holding one account's session.
pub struct HttpTransport {
    client: Client,
    endpoints: Arc<Endpoints>,
    credentials: Credentials,
    session: RwLock<Option<Session>>,
}

impl HttpTransport {
    pub fn new(client: Client, endpoints: Arc<Endpoints>, credentials: Credentials) -> Self {
        Self {
            client,
            endpoints,
            credentials,
            session: RwLock::new(None),
        }
    }

    /// Shared client; every call is bounded by `timeout`.
    pub fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default()
    }

    pub async fn socket_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.socket_token.clone())
    }

    async fn login(&self) -> Result<String> {
        let login_id = self.credentials.login_id.to_string();
        let prefix = self.credentials.server_prefix();

        let account: Envelope = self
            .client
            .post(format!("{}/api/auth/login/game_account", self.endpoints.auth_url))
            .form(&[
                ("login_id", login_id.as_str()),
                ("login_type", "0"),
                ("access_token", ""),
                ("pw", login_id.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;
        if !account.success {
            return Err(Error::Login(
                account.error_message.unwrap_or_else(|| "game account login refused".into()),
            ));
        }
        let grant: LoginGrant = account.response_as()?;

        let user: Envelope = self
            .client
            .post(format!("{}/api/auth/login/user", self.endpoints.auth_url))
            .query(&[("nutaku_id", login_id.as_str())])
            .form(&[
                ("server_prefix", prefix.as_str()),
                ("account_id", grant.account_id.as_str()),
                ("session_id", grant.session_id.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;
        if !user.success {
            return Err(Error::Login(
                user.error_message.unwrap_or_else(|| "user login refused".into()),
            ));
        }
        let socket_token = user
            .response
            .as_ref()
            .and_then(|r| r.get("socket_token"))
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(
            user_id = self.credentials.user_id,
            prefix = %prefix,
            "Logged into game server"
        );
        *self.session.write().await = Some(Session {
            id: grant.session_id.clone(),
            socket_token,
        });
        Ok(grant.session_id)
    }

    async fn session_id(&self) -> Result<String> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.id.clone());
        }
        self.login().await
    }

    async fn dispatch(
        &self,
        verb: Verb,
        endpoint: &str,
        params: &[(&str, String)],
        session: &str,
    ) -> Result<Envelope> {
        let url = format!("{}{}", self.endpoints.data_url, endpoint);
        let auth = [
            ("user_id", self.credentials.user_id.to_string()),
            ("session_id", session.to_string()),
            ("server_prefix", self.credentials.server_prefix()),
        ];
        debug!(?verb, endpoint, "Sending request");

        let request = match verb {
            Verb::Get => self.client.get(url).query(&auth).query(params),
            Verb::Post => self.client.post(url).query(&auth).form(params),
        };
        Ok(request.send().await?.json::<Envelope>().await?)
    }

    async fn send(&self, verb: Verb, endpoint: &str, params: &[(&str, String)]) -> Result<Envelope> {
        let session = self.session_id().await?;
        let envelope = self.dispatch(verb, endpoint, params, &session).await?;
        if !envelope.is_session_failure() {
            return Ok(envelope);
        }

        warn!(
            endpoint,
            reason = envelope.error_message.as_deref().unwrap_or_default(),
            "Session rejected, logging in again"
        );
        let session = self.login().await?;
        self.dispatch(verb, endpoint, params, &session).await
    }
}

impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Envelope> {
        self.send(Verb::Get, endpoint, query).await
    }

    async fn post(&self, endpoint: &str, payload: &[(&str, String)]) -> Result<Envelope> {
        self.send(Verb::Post, endpoint, payload).await
    }
}
