//! Fire-and-forget outbound callbacks.

use super::template::substitute;
use crate::matching::RegexGroups;
use crate::metrics;
use crate::stub::Callback;
use crate::transport::{HttpTransport, OutboundRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delivers callbacks on detached tasks so the inbound response is never
/// delayed. Failures are logged and dropped.
#[derive(Clone)]
pub struct CallbackDispatcher {
    transport: Arc<dyn HttpTransport>,
}

impl CallbackDispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Spawn delivery of `callback`. The handle is only useful to tests;
    /// callers normally drop it.
    pub fn dispatch(&self, callback: &Callback, groups: &RegexGroups) -> JoinHandle<()> {
        let body = substitute(&callback.body, groups);
        let request = OutboundRequest {
            method: callback.method.clone(),
            url: substitute(&callback.url, groups).trim().to_string(),
            headers: callback
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), substitute(value, groups).into_owned()))
                .collect(),
            body: (!body.is_empty()).then(|| body.into_owned()),
        };
        let latency = callback.latency_ms.map(Duration::from_millis);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            let method = request.method.clone();
            let url = request.url.clone();
            match transport.send(request).await {
                Ok(response) => {
                    debug!("Callback {} {} returned {}", method, url, response.status);
                    metrics::record_callback(true);
                }
                Err(e) => {
                    warn!("Callback {} {} failed: {}", method, url, e);
                    metrics::record_callback(false);
                }
            }
        })
    }
}
