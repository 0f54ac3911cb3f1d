// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DataCoin Minter - Verified Upload & Token Issuance Service
//!
//! This crate drives the verified-upload reward flow against the DataCoin
//! contract on Sepolia: wallet-gated sessions, encrypted payload storage,
//! and precondition-checked token mints over a failover RPC endpoint list.
//!
//! ## Modules
//!
//! - `blockchain` - Endpoint selection, DataCoin contract client, unit math
//! - `config` - Environment-driven runtime configuration
//! - `models` - Shared value types (accounts, mints, snapshots, proofs)
//! - `pipeline` - Ordered, fail-fast mint pipeline
//! - `session` - Per-session verification gate (flow state machine)
//! - `upload` - Storage client and concurrent upload coordination
//! - `service` - Session-scoped orchestrator tying the layers together

pub mod blockchain;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod upload;

/// Install the process-wide tracing subscriber. `RUST_LOG` controls the
/// filter; defaults to `info`. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
