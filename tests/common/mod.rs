//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use axum::http::header::{HOST, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use axum::http::{HeaderMap, HeaderValue, Method};
use bytes::Bytes;

use wsgate::admission::UpgradeRequest;
use wsgate::dispatch::{Transport, TransportError};

/// Transport that records every outbound frame as a readable string.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(format!("bin:{}", data.len()));
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// A well-formed upgrade request for the given path.
pub fn upgrade_request(path: &str) -> UpgradeRequest {
    let mut headers = HeaderMap::new();
    headers.insert(HOST, HeaderValue::from_static("localhost:9001"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(
        SEC_WEBSOCKET_KEY,
        HeaderValue::from_static("dGhlIHNhbXBsZSBub25jZQ=="),
    );
    headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
    UpgradeRequest::new(Method::GET, path.parse().unwrap(), headers)
}
