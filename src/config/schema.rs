//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the endpoint server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener definitions. Endpoints registered against the same
    /// host/port pair share one listener.
    pub endpoints: Vec<EndpointConfig>,
}

/// Per-listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Bind host. "0.0.0.0" accepts any Host header.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Seconds without an inbound frame before a reader-idle event fires.
    /// Zero disables the timer.
    pub reader_idle_secs: u64,

    /// Seconds without an outbound frame before a writer-idle event fires.
    /// Zero disables the timer.
    pub writer_idle_secs: u64,

    /// Seconds without traffic in either direction before an all-idle
    /// event fires. Zero disables the timer.
    pub all_idle_secs: u64,

    /// Maximum accepted frame payload in bytes.
    pub max_frame_payload: usize,

    /// Negotiate per-message compression on the handshake.
    pub use_compression: bool,

    /// Run handler methods on the blocking worker pool instead of the
    /// connection task.
    pub use_worker_pool: bool,

    /// Worker pool size when `use_worker_pool` is set.
    pub worker_pool_threads: usize,

    /// Optional TLS termination settings.
    pub tls: Option<TlsConfig>,

    /// Cross-origin settings for the upgrade request.
    pub cors: CorsConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            reader_idle_secs: 0,
            writer_idle_secs: 0,
            all_idle_secs: 0,
            max_frame_payload: 65_536,
            use_compression: false,
            use_worker_pool: false,
            worker_pool_threads: 16,
            tls: None,
            cors: CorsConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// The host/port pair this listener binds.
    pub fn bind_key(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// TLS configuration for a listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Cross-origin settings applied to upgrade requests.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to upgrade. Empty means no CORS headers are sent.
    pub allowed_origins: Vec<String>,

    /// Whether credentialed requests are allowed.
    pub allow_credentials: bool,
}
