// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module for the DataCoin contract on Sepolia.
//!
//! This module provides functionality for:
//! - Probing the ordered RPC candidate list for a live endpoint
//! - Reading token state (role, pause flag, balances, metadata)
//! - Gas estimation, pricing, and mint transaction submission

pub mod client;
pub mod datacoin;
pub mod endpoint;
pub mod units;

pub use client::{ChainError, DataCoinClient, ReadOnlyClient};
pub use endpoint::{select_endpoint, EndpointAttempt, SelectedEndpoint};
pub use units::{format_amount, parse_amount};
