// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Mint Pipeline
//!
//! Runs a single mint as an ordered sequence of guard steps, each a hard
//! precondition for the next. The pipeline never partially applies a mint:
//! the submission in step 7 is the only state-changing call, and nothing is
//! retried automatically afterwards since a retry across submission
//! ambiguity could double-mint.
//!
//! ## Steps
//!
//! 1. Resolve signer credentials from configuration
//! 2. Select a reachable RPC endpoint and bind a chain client
//! 3. Verify the signer holds the minter role
//! 4. Verify minting is not globally paused
//! 5. Estimate gas for the exact mint call (doubles as a dry run)
//! 6. Fetch the gas price; the total cost is logged, never capped
//! 7. Submit the transaction and await its confirmation receipt
//! 8. Refresh the recipient's token snapshot (failure never demotes step 7)
//!
//! The chain is reached through the [`MintChain`] / [`ChainConnector`]
//! traits so tests can script every step without a network.

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::blockchain::{
    select_endpoint, ChainError, DataCoinClient, EndpointAttempt, ReadOnlyClient,
    SelectedEndpoint,
};
use crate::config::AppConfig;
use crate::models::{MintRequest, SubmittedMint, TokenSnapshot};

/// One chain client usable for a single mint run.
#[async_trait]
pub trait MintChain: Send + Sync {
    /// Address of the signing account.
    fn signer_address(&self) -> Address;

    async fn has_minter_role(&self, account: Address) -> Result<bool, ChainError>;

    async fn minting_paused(&self) -> Result<bool, ChainError>;

    async fn estimate_mint_gas(&self, request: &MintRequest) -> Result<u64, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;

    async fn submit_mint(
        &self,
        request: &MintRequest,
        gas_limit: u64,
        gas_price: u128,
    ) -> Result<SubmittedMint, ChainError>;

    async fn token_snapshot(&self, account: Address) -> Result<TokenSnapshot, ChainError>;
}

/// Produces a [`MintChain`] for each pipeline run.
///
/// The production connector re-probes the candidate list on every call; a
/// connector is a failover strategy, not a connection cache.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    type Chain: MintChain;

    async fn connect(&self, signer: &PrivateKeySigner) -> Result<Self::Chain, ChainError>;

    /// Read-only token snapshot fetch. Must work without any signer: the
    /// session shows balances whether or not a mint key is configured.
    async fn read_snapshot(&self, account: Address) -> Result<TokenSnapshot, ChainError>;
}

/// Production connector: endpoint selection plus a signing DataCoin client.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    config: AppConfig,
}

impl RpcConnector {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChainConnector for RpcConnector {
    type Chain = DataCoinClient;

    async fn connect(&self, signer: &PrivateKeySigner) -> Result<DataCoinClient, ChainError> {
        let endpoint: SelectedEndpoint =
            select_endpoint(&self.config.rpc_urls, self.config.probe_timeout).await?;

        DataCoinClient::connect(
            endpoint,
            &self.config.contract_address,
            signer,
            self.config.token_decimals,
            self.config.confirmation_timeout,
        )
    }

    async fn read_snapshot(&self, account: Address) -> Result<TokenSnapshot, ChainError> {
        let endpoint =
            select_endpoint(&self.config.rpc_urls, self.config.probe_timeout).await?;
        let client = ReadOnlyClient::connect(
            endpoint,
            &self.config.contract_address,
            self.config.token_decimals,
        )?;
        client.token_snapshot(account).await
    }
}

#[async_trait]
impl MintChain for DataCoinClient {
    fn signer_address(&self) -> Address {
        DataCoinClient::signer_address(self)
    }

    async fn has_minter_role(&self, account: Address) -> Result<bool, ChainError> {
        DataCoinClient::has_minter_role(self, account).await
    }

    async fn minting_paused(&self) -> Result<bool, ChainError> {
        DataCoinClient::minting_paused(self).await
    }

    async fn estimate_mint_gas(&self, request: &MintRequest) -> Result<u64, ChainError> {
        DataCoinClient::estimate_mint_gas(self, request).await
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        DataCoinClient::gas_price(self).await
    }

    async fn submit_mint(
        &self,
        request: &MintRequest,
        gas_limit: u64,
        gas_price: u128,
    ) -> Result<SubmittedMint, ChainError> {
        DataCoinClient::submit_mint(self, request, gas_limit, gas_price).await
    }

    async fn token_snapshot(&self, account: Address) -> Result<TokenSnapshot, ChainError> {
        DataCoinClient::token_snapshot(self, account).await
    }
}

/// Numbered pipeline stage, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MintStage {
    SignerResolution = 1,
    EndpointSelection = 2,
    RoleCheck = 3,
    PauseCheck = 4,
    GasEstimation = 5,
    GasPricing = 6,
    Submission = 7,
    SnapshotRefresh = 8,
}

impl MintStage {
    /// The stage's position in the pipeline, 1-based.
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for MintStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MintStage::SignerResolution => "signer resolution",
            MintStage::EndpointSelection => "endpoint selection",
            MintStage::RoleCheck => "minter role check",
            MintStage::PauseCheck => "pause check",
            MintStage::GasEstimation => "gas estimation",
            MintStage::GasPricing => "gas pricing",
            MintStage::Submission => "transaction submission",
            MintStage::SnapshotRefresh => "snapshot refresh",
        };
        write!(f, "step {} ({name})", self.number())
    }
}

/// Why a mint attempt failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MintError {
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("no reachable RPC endpoint after {} candidate(s)", attempts.len())]
    NoReachableEndpoint { attempts: Vec<EndpointAttempt> },

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("signer {signer} does not hold the minter role")]
    Unauthorized { signer: String },

    #[error("token minting is currently paused")]
    MintingPaused,

    #[error("gas estimation failed: {0}")]
    GasEstimationFailed(String),

    #[error("transaction rejected: {0}")]
    TransactionRejected(String),
}

/// Outcome of one mint attempt. Immutable once produced.
#[derive(Debug, Clone)]
pub enum MintOutcome {
    Success {
        minted: SubmittedMint,
        /// Amount minted, in the token's smallest unit.
        amount: U256,
        /// Post-mint snapshot, when the refresh read succeeded.
        snapshot: Option<TokenSnapshot>,
    },
    Failure {
        stage: MintStage,
        reason: MintError,
    },
}

impl MintOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MintOutcome::Success { .. })
    }
}

/// Orchestrates the precondition-checked mint sequence.
pub struct MintPipeline<C: ChainConnector> {
    connector: C,
    signer_private_key: Option<String>,
}

impl<C: ChainConnector> MintPipeline<C> {
    pub fn new(config: &AppConfig, connector: C) -> Self {
        Self {
            connector,
            signer_private_key: config.signer_private_key.clone(),
        }
    }

    /// Run one mint attempt. Never panics and never throws: every failure
    /// is folded into the returned [`MintOutcome`]. The pipeline does not
    /// retry; callers may re-invoke manually.
    pub async fn mint(&self, request: &MintRequest) -> MintOutcome {
        tracing::info!(
            recipient = %request.recipient,
            amount = %request.amount,
            content_id = request.source_content_id.as_deref().unwrap_or("-"),
            "Starting mint attempt"
        );

        match self.run(request).await {
            Ok((minted, snapshot)) => {
                tracing::info!(tx_hash = %minted.tx_hash, gas_used = minted.gas_used, "Mint confirmed");
                MintOutcome::Success {
                    minted,
                    amount: request.amount,
                    snapshot,
                }
            }
            Err((stage, reason)) => {
                tracing::warn!(%stage, error = %reason, "Mint attempt failed");
                MintOutcome::Failure { stage, reason }
            }
        }
    }

    /// Fetch a fresh token snapshot outside of a mint run (connect-time and
    /// post-flow refresh). Read-only: works with no signer key configured.
    pub async fn refresh_snapshot(&self, account: Address) -> Result<TokenSnapshot, MintError> {
        self.connector
            .read_snapshot(account)
            .await
            .map_err(connect_error)
    }

    fn resolve_signer(&self) -> Result<PrivateKeySigner, (MintStage, MintError)> {
        let key = self.signer_private_key.as_deref().ok_or((
            MintStage::SignerResolution,
            MintError::SignerUnavailable("SIGNER_PRIVATE_KEY is not set".to_string()),
        ))?;
        DataCoinClient::signer_from_hex(key).map_err(|e| {
            (
                MintStage::SignerResolution,
                MintError::SignerUnavailable(e.to_string()),
            )
        })
    }

    async fn run(
        &self,
        request: &MintRequest,
    ) -> Result<(SubmittedMint, Option<TokenSnapshot>), (MintStage, MintError)> {
        // 1. Signer credentials
        let signer = self.resolve_signer()?;

        // 2. Endpoint selection + chain client
        let chain = self
            .connector
            .connect(&signer)
            .await
            .map_err(|e| (MintStage::EndpointSelection, connect_error(e)))?;
        let signer_address = chain.signer_address();

        // 3. Minter role (strictly before the pause check)
        let has_role = chain
            .has_minter_role(signer_address)
            .await
            .map_err(|e| (MintStage::RoleCheck, MintError::ChainUnavailable(e.to_string())))?;
        if !has_role {
            return Err((
                MintStage::RoleCheck,
                MintError::Unauthorized {
                    signer: format!("{signer_address:?}"),
                },
            ));
        }

        // 4. Global pause flag
        let paused = chain.minting_paused().await.map_err(|e| {
            (
                MintStage::PauseCheck,
                MintError::ChainUnavailable(e.to_string()),
            )
        })?;
        if paused {
            return Err((MintStage::PauseCheck, MintError::MintingPaused));
        }

        // 5. Gas estimate (dry run; a reverting mint is caught here)
        let gas_limit = chain.estimate_mint_gas(request).await.map_err(|e| {
            (
                MintStage::GasEstimation,
                MintError::GasEstimationFailed(e.to_string()),
            )
        })?;

        // 6. Gas price; total cost surfaced for observability only
        let gas_price = chain.gas_price().await.map_err(|e| {
            (
                MintStage::GasPricing,
                MintError::ChainUnavailable(e.to_string()),
            )
        })?;
        let total_cost_wei = U256::from(gas_limit) * U256::from(gas_price);
        tracing::info!(gas_limit, gas_price, total_cost_wei = %total_cost_wei, "Estimated mint cost");

        // 7. Submit and await confirmation
        let minted = chain
            .submit_mint(request, gas_limit, gas_price)
            .await
            .map_err(|e| {
                (
                    MintStage::Submission,
                    MintError::TransactionRejected(e.to_string()),
                )
            })?;

        // 8. Snapshot refresh; a failed read never demotes the mint
        let snapshot = match chain.token_snapshot(request.recipient).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(
                    recipient = %request.recipient,
                    error = %e,
                    "Post-mint snapshot refresh failed; mint outcome unaffected"
                );
                None
            }
        };

        Ok((minted, snapshot))
    }
}

fn connect_error(e: ChainError) -> MintError {
    match e {
        ChainError::NoReachableEndpoint { attempts } => MintError::NoReachableEndpoint { attempts },
        other => MintError::ChainUnavailable(other.to_string()),
    }
}
