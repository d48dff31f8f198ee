//! Session connector for the design-tool MCP server.
//!
//! parse_endpoint -> Endpoint (http/https URL, loopback by default)
//! connect        -> Session<McpProvider> (streamable HTTP + initialize handshake)
//! Session        -> state machine + idempotent disconnect
//! Provider       -> list / call / close, the seam tests fake
//!
pub mod error;
#[cfg(test)]
pub mod fake;

use std::fmt;
use std::time::{Duration, Instant};

use rmcp::model::{CallToolRequestParam, ClientInfo, Implementation, PaginatedRequestParam};
use rmcp::service::RunningService;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

pub use error::{ConnectionError, DiscoveryError, InvocationError, InvocationErrorKind};

/// Where the design tool serves MCP when its server feature is switched on.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3845/mcp";

/// Upper bound on how long a disconnect may wait for the transport.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Argument object sent with `tools/call`.
pub type JsonObject = Map<String, Value>;

/* ---- Endpoint ---- */

/// A validated provider address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_loopback(&self) -> bool {
        match self.url().host() {
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            Some(url::Host::Domain(d)) => d.eq_ignore_ascii_case("localhost"),
            None => false,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_ENDPOINT).expect("DEFAULT_ENDPOINT is a valid URL"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Parse a user-supplied endpoint.
///
/// Only `http` and `https` are accepted; the streamable HTTP transport is the
/// only one the design tool offers. A bare `host:port` is rejected rather
/// than guessed at.
pub fn parse_endpoint(raw: &str) -> Result<Endpoint, ConnectionError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| ConnectionError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: reason.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("endpoint is empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme '{other}' (use http or https)"))),
    }
    if url.host().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(Endpoint { url })
}

/* ---- Client identity ---- */

/// Name and version announced during the initialize handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

impl ClientIdentity {
    pub fn from_package() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            client_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/* ---- Provider seam ---- */

/// The provider calls used by discovery and dispatch.
///
/// Results are handed back as raw JSON; turning them into typed entries is
/// the registry's job.
pub trait Provider {
    /// Every capability the provider currently exposes, in provider order.
    async fn list_capabilities(&self) -> Result<Vec<Value>, DiscoveryError>;

    /// Invoke one capability and return the serialized call result.
    async fn call(&self, name: &str, arguments: JsonObject) -> Result<Value, InvocationError>;

    /// Release the transport. Must not fail.
    async fn close(self);
}

/// Live rmcp client over streamable HTTP.
pub struct McpProvider {
    service: RunningService<RoleClient, ClientInfo>,
}

impl Provider for McpProvider {
    async fn list_capabilities(&self) -> Result<Vec<Value>, DiscoveryError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.clone().map(|c| PaginatedRequestParam { cursor: Some(c) });
            let page = self
                .service
                .list_tools(params)
                .await
                .map_err(|e| DiscoveryError::Request(e.to_string()))?;
            for tool in &page.tools {
                tools.push(
                    serde_json::to_value(tool).map_err(|e| DiscoveryError::Decode(e.to_string()))?,
                );
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    debug!(cursor = %next, "following tools/list pagination");
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(tools)
    }

    async fn call(&self, name: &str, arguments: JsonObject) -> Result<Value, InvocationError> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| InvocationError::ExecutionFailed(e.to_string()))?;
        serde_json::to_value(&result)
            .map_err(|e| InvocationError::ExecutionFailed(format!("unable to serialize result: {e}")))
    }

    async fn close(self) {
        // Cancellation failure only means the worker already stopped.
        let _ = self.service.cancel().await;
    }
}

/* ---- Session ---- */

/// Lifecycle of a [`Session`]. Dispatch is only allowed in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Closing,
    Closed,
}

/// Owns the provider handle for as long as the connection is open.
pub struct Session<P: Provider> {
    endpoint: Endpoint,
    state: SessionState,
    provider: Option<P>,
}

impl<P: Provider> Session<P> {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: SessionState::Disconnected,
            provider: None,
        }
    }

    /// A session that is already `Ready` with the given provider.
    #[cfg(test)]
    pub fn ready(endpoint: Endpoint, provider: P) -> Self {
        let mut session = Self::new(endpoint);
        session.attach(provider);
        session
    }

    fn attach(&mut self, provider: P) {
        self.provider = Some(provider);
        self.state = SessionState::Ready;
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The provider, but only while `Ready`.
    pub fn provider(&self) -> Option<&P> {
        if self.is_ready() {
            self.provider.as_ref()
        } else {
            None
        }
    }

    /// Release the transport. Safe to call any number of times; returns
    /// `true` only for the call that actually released a provider.
    pub async fn disconnect(&mut self) -> bool {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return false;
        }
        self.state = SessionState::Closing;
        let released = match self.provider.take() {
            Some(provider) => {
                if tokio::time::timeout(SHUTDOWN_GRACE, provider.close())
                    .await
                    .is_err()
                {
                    warn!(endpoint = %self.endpoint, "transport did not close within grace period");
                }
                true
            }
            None => false,
        };
        self.state = SessionState::Closed;
        debug!(endpoint = %self.endpoint, released, "session closed");
        released
    }
}

/// Open a session: transport, initialize handshake, `Ready`.
pub async fn connect(
    endpoint: &Endpoint,
    identity: &ClientIdentity,
    timeout: Duration,
) -> Result<Session<McpProvider>, ConnectionError> {
    use rmcp::transport::StreamableHttpClientTransport;

    let mut session = Session::new(endpoint.clone());
    session.state = SessionState::Connecting;
    let started = Instant::now();
    debug!(endpoint = %endpoint, client = %identity.name, "connecting");
    if !endpoint.is_loopback() {
        warn!(endpoint = %endpoint, "endpoint is not a loopback address");
    }

    let transport = StreamableHttpClientTransport::from_uri(endpoint.as_str());
    let service = tokio::time::timeout(timeout, identity.client_info().serve(transport))
        .await
        .map_err(|_| ConnectionError::Timeout {
            endpoint: endpoint.to_string(),
            timeout,
        })?
        .map_err(|e| ConnectionError::Handshake {
            endpoint: endpoint.to_string(),
            cause: e.to_string(),
        })?;

    debug!(peer = ?service.peer_info(), "handshake complete");
    info!(
        endpoint = %endpoint,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "connected"
    );
    session.attach(McpProvider { service });
    Ok(session)
}
