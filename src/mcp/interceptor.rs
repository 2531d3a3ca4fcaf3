//! Ordered request interceptors run before a JSON-RPC call is dispatched.
//!
//! Each interceptor either forwards the call to the next one or turns it
//! away with a [`Rejection`]. The chain stops at the first rejection, so
//! nothing after a failing gate (the tool included) ever sees the call.

use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::{
    config::{AuthConfig, Config, LoggingConfig, StaticToken},
    error::AuthRejected,
    mcp::RpcError,
};

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_KEYS: &[&str] = &["token", "secret", "password", "authorization", "api_key"];

/// Who the caller authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub scopes: Vec<String>,
}

/// One inbound JSON-RPC call as seen by the interceptors.
///
/// The payload and headers are read-only; interceptors can only attach the
/// authenticated client.
#[derive(Debug)]
pub struct InboundCall {
    method: String,
    source: String,
    headers: HeaderMap,
    payload: Value,
    client: Option<ClientIdentity>,
}

impl InboundCall {
    pub fn new(source: impl Into<String>, headers: HeaderMap, payload: Value) -> Self {
        let method = payload
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Self {
            method,
            source: source.into(),
            headers,
            payload,
            client: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn client(&self) -> Option<&ClientIdentity> {
        self.client.as_ref()
    }

    /// JSON-RPC id of the call, `null` when it has none.
    pub fn request_id(&self) -> Value {
        self.payload.get("id").cloned().unwrap_or(Value::Null)
    }

    pub fn into_parts(self) -> (Value, Option<ClientIdentity>) {
        (self.payload, self.client)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub status: StatusCode,
    pub error: RpcError,
}

impl From<AuthRejected> for Rejection {
    fn from(rejected: AuthRejected) -> Self {
        let status = match rejected {
            AuthRejected::MissingToken | AuthRejected::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthRejected::InsufficientScope { .. } => StatusCode::FORBIDDEN,
        };
        Self {
            status,
            error: RpcError::new(RpcError::UNAUTHORIZED, rejected.to_string()),
        }
    }
}

pub trait Interceptor: Send + Sync {
    fn intercept(&self, call: &mut InboundCall) -> Result<(), Rejection>;
}

#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Auth gate first, then the request logger.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with(AuthGate::new(&config.auth))
            .with(RequestLogger::new(&config.logging))
    }

    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn run(&self, call: &mut InboundCall) -> Result<(), Rejection> {
        for interceptor in &self.interceptors {
            interceptor.intercept(call)?;
        }
        Ok(())
    }
}

/// Static bearer-token check. Open when no token is configured.
pub struct AuthGate {
    tokens: Vec<StaticToken>,
    required_scopes: Vec<String>,
}

impl AuthGate {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            tokens: config.tokens.clone(),
            required_scopes: config.required_scopes.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }

    /// `Ok(None)` in open mode, the matching client otherwise.
    pub fn authorize(
        &self,
        presented: Option<&str>,
    ) -> Result<Option<ClientIdentity>, AuthRejected> {
        if self.is_open() {
            return Ok(None);
        }
        let presented = presented.ok_or(AuthRejected::MissingToken)?;

        // Compare against every token so timing does not reveal which one matched.
        let mut matched = None;
        for entry in &self.tokens {
            let equal: bool = entry.token.as_bytes().ct_eq(presented.as_bytes()).into();
            if equal && matched.is_none() {
                matched = Some(entry);
            }
        }
        let entry = matched.ok_or(AuthRejected::InvalidToken)?;

        if let Some(scope) = self
            .required_scopes
            .iter()
            .find(|scope| !entry.scopes.contains(*scope))
        {
            return Err(AuthRejected::InsufficientScope {
                client_id: entry.client_id.clone(),
                scope: scope.clone(),
            });
        }

        Ok(Some(ClientIdentity {
            client_id: entry.client_id.clone(),
            scopes: entry.scopes.clone(),
        }))
    }
}

impl Interceptor for AuthGate {
    fn intercept(&self, call: &mut InboundCall) -> Result<(), Rejection> {
        match self.authorize(bearer_token(call.headers())) {
            Ok(client) => {
                call.client = client;
                Ok(())
            }
            Err(rejected) => {
                tracing::warn!(
                    method = %call.method(),
                    source = %call.source(),
                    reason = %rejected,
                    "Rejected unauthenticated call"
                );
                Err(rejected.into())
            }
        }
    }
}

/// Extract the credential of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Logs every call that made it past the auth gate. Never rejects.
pub struct RequestLogger {
    log_payloads: bool,
}

impl RequestLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            log_payloads: config.log_payloads,
        }
    }

    pub fn observe(&self, call: &InboundCall) {
        let client = call.client().map_or("anonymous", |c| c.client_id.as_str());
        if self.log_payloads {
            tracing::info!(
                method = %call.method(),
                source = %call.source(),
                client = %client,
                payload = %redact_payload(call.payload()),
                "Inbound call"
            );
        } else {
            tracing::info!(
                method = %call.method(),
                source = %call.source(),
                client = %client,
                "Inbound call"
            );
        }
        tracing::debug!(headers = ?redact_headers(call.headers()), "Inbound call headers");
    }
}

impl Interceptor for RequestLogger {
    fn intercept(&self, call: &mut InboundCall) -> Result<(), Rejection> {
        self.observe(call);
        Ok(())
    }
}

pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED.to_owned()
            } else {
                value.to_str().unwrap_or("<binary>").to_owned()
            };
            (name.as_str().to_owned(), value)
        })
        .collect()
}

fn is_sensitive_header(name: &HeaderName) -> bool {
    *name == header::AUTHORIZATION
        || *name == header::COOKIE
        || *name == header::PROXY_AUTHORIZATION
}

/// Copy of `payload` with the values of credential-like keys masked.
pub fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let lowered = key.to_ascii_lowercase();
                    if SENSITIVE_KEYS.iter().any(|k| lowered.contains(k)) {
                        (key.clone(), Value::String(REDACTED.to_owned()))
                    } else {
                        (key.clone(), redact_payload(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_payload).collect()),
        other => other.clone(),
    }
}
