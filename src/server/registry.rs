//! Endpoint registry and listener grouping.
//!
//! # Responsibilities
//! - Collect endpoint registrations across the whole process
//! - Group registrations by bind address: endpoints sharing a host/port pair
//!   share one listener and one routing table
//! - Freeze each group into an immutable router before traffic starts
//!
//! # Design Decisions
//! - The first registration for a bind address fixes that listener's
//!   settings; later registrations reuse them and a differing config is
//!   logged, not honored

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::dispatch::{EventRouter, EventRouterBuilder};
use crate::endpoint::{HandlerSpec, RegistrationError};

/// One listener's worth of endpoints, frozen and ready to serve.
pub struct ListenerGroup {
    pub config: EndpointConfig,
    pub router: Arc<EventRouter>,
}

struct PendingGroup {
    config: EndpointConfig,
    builder: EventRouterBuilder,
}

/// Collects endpoint registrations and groups them into listeners.
#[derive(Default)]
pub struct EndpointRegistry {
    // BTreeMap keeps listener startup order deterministic.
    groups: BTreeMap<(String, u16), PendingGroup>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one endpoint path under the given listener settings.
    pub fn register(
        &mut self,
        config: &EndpointConfig,
        path: &str,
        spec: &HandlerSpec,
    ) -> Result<(), RegistrationError> {
        let key = config.bind_key();
        let group = self.groups.entry(key).or_insert_with(|| PendingGroup {
            config: config.clone(),
            builder: EventRouterBuilder::new().with_host(config.host.clone()),
        });

        if group.config.port == config.port
            && group.config.host == config.host
            && group.config.max_frame_payload != config.max_frame_payload
        {
            tracing::warn!(
                host = %config.host,
                port = config.port,
                "listener settings already fixed by an earlier registration; ignoring the new ones"
            );
        }

        group.builder.register(path, spec)
    }

    /// Number of distinct listeners registered so far.
    pub fn listener_count(&self) -> usize {
        self.groups.len()
    }

    /// Freeze every group. No further registration is possible afterwards.
    pub fn build(self) -> Vec<ListenerGroup> {
        self.groups
            .into_values()
            .map(|group| ListenerGroup {
                config: group.config,
                router: Arc::new(group.builder.build()),
            })
            .collect()
    }
}
