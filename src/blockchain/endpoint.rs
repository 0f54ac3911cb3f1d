// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RPC endpoint selection with failover.
//!
//! Candidates are probed sequentially in configuration order with a cheap
//! liveness call (`eth_blockNumber`) under a per-candidate timeout. The
//! first endpoint that answers wins. Probing is deliberately not
//! parallelized so the configured preference order is preserved, and the
//! result is never cached: every pipeline run probes afresh, which keeps a
//! mid-session endpoint death from poisoning later mints.

use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};

use super::client::ChainError;

/// One failed probe, kept for the `NoReachableEndpoint` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAttempt {
    pub url: String,
    pub error: String,
}

impl std::fmt::Display for EndpointAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

/// The endpoint chosen for one pipeline run.
#[derive(Debug, Clone)]
pub struct SelectedEndpoint {
    pub url: url::Url,
}

/// Probe `candidates` in order and return the first reachable endpoint.
///
/// Exactly one pass is made over the list. If every candidate fails, the
/// error carries each attempted URL with its individual failure.
pub async fn select_endpoint(
    candidates: &[String],
    probe_timeout: Duration,
) -> Result<SelectedEndpoint, ChainError> {
    let mut attempts = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let url: url::Url = match candidate.parse() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %candidate, error = %e, "Skipping malformed RPC URL");
                attempts.push(EndpointAttempt {
                    url: candidate.clone(),
                    error: format!("invalid URL: {e}"),
                });
                continue;
            }
        };

        let provider = ProviderBuilder::new().connect_http(url.clone());

        match tokio::time::timeout(probe_timeout, provider.get_block_number()).await {
            Ok(Ok(block)) => {
                tracing::info!(url = %candidate, block, "Selected RPC endpoint");
                return Ok(SelectedEndpoint { url });
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %candidate, error = %e, "RPC liveness probe failed");
                attempts.push(EndpointAttempt {
                    url: candidate.clone(),
                    error: e.to_string(),
                });
            }
            Err(_) => {
                tracing::warn!(url = %candidate, timeout = ?probe_timeout, "RPC liveness probe timed out");
                attempts.push(EndpointAttempt {
                    url: candidate.clone(),
                    error: format!("liveness probe timed out after {probe_timeout:?}"),
                });
            }
        }
    }

    Err(ChainError::NoReachableEndpoint { attempts })
}
