// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing chain client bound to one selected RPC endpoint.

use std::time::Duration;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::Address,
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    signers::local::PrivateKeySigner,
};

use super::datacoin::DataCoinContract;
use super::endpoint::{EndpointAttempt, SelectedEndpoint};
use crate::models::{MintRequest, SubmittedMint, TokenSnapshot};

/// HTTP provider type with signing wallet (all fillers).
type MintProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// HTTP provider type without a signing wallet, for reads that must work
/// before any signer exists.
type ReadProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only DataCoin view bound to one selected endpoint. Serves the
/// connect-time and post-flow token snapshot reads, which must not depend
/// on a configured signer key.
pub struct ReadOnlyClient {
    contract: DataCoinContract<ReadProvider>,
    token_decimals: u8,
}

impl ReadOnlyClient {
    /// Bind a read-only client to a previously selected endpoint.
    pub fn connect(
        endpoint: SelectedEndpoint,
        contract_address: &str,
        token_decimals: u8,
    ) -> Result<Self, ChainError> {
        let provider = ProviderBuilder::new().connect_http(endpoint.url.clone());
        let contract = DataCoinContract::new(&provider, contract_address)?;
        Ok(Self {
            contract,
            token_decimals,
        })
    }

    /// Fetch a fresh token snapshot for `account`.
    pub async fn token_snapshot(&self, account: Address) -> Result<TokenSnapshot, ChainError> {
        self.contract
            .token_snapshot(account, self.token_decimals)
            .await
    }
}

/// DataCoin client bound to one endpoint, one contract address, and one
/// signer. Reads never retry internally; a failure propagates to the caller,
/// which owns failover by re-running endpoint selection.
pub struct DataCoinClient {
    contract: DataCoinContract<MintProvider>,
    signer_address: Address,
    token_decimals: u8,
    confirmation_timeout: Duration,
}

impl DataCoinClient {
    /// Bind a client to a previously selected endpoint.
    pub fn connect(
        endpoint: SelectedEndpoint,
        contract_address: &str,
        signer: &PrivateKeySigner,
        token_decimals: u8,
        confirmation_timeout: Duration,
    ) -> Result<Self, ChainError> {
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(endpoint.url.clone());
        let contract = DataCoinContract::new(&provider, contract_address)?;

        Ok(Self {
            contract,
            signer_address,
            token_decimals,
            confirmation_timeout,
        })
    }

    /// Create a signer from a hex private key, `0x` prefix optional.
    pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, ChainError> {
        let trimmed = private_key_hex.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let key_bytes = alloy::hex::decode(stripped)
            .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))?;

        PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))
    }

    /// Address of the signing account.
    pub fn signer_address(&self) -> Address {
        self.signer_address
    }

    /// Whether the signer holds the minter role.
    pub async fn has_minter_role(&self, account: Address) -> Result<bool, ChainError> {
        self.contract.has_minter_role(account).await
    }

    /// Whether minting is globally paused.
    pub async fn minting_paused(&self) -> Result<bool, ChainError> {
        self.contract.minting_paused().await
    }

    /// Estimate gas for the exact mint call.
    ///
    /// Doubles as a dry run: a reverting mint fails here, before any gas is
    /// spent.
    pub async fn estimate_mint_gas(&self, request: &MintRequest) -> Result<u64, ChainError> {
        self.contract
            .instance()
            .mint(request.recipient, request.amount)
            .from(self.signer_address)
            .estimate_gas()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Current gas price in wei.
    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        self.contract
            .instance()
            .provider()
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    /// Submit the mint transaction and wait for its confirmation receipt.
    pub async fn submit_mint(
        &self,
        request: &MintRequest,
        gas_limit: u64,
        gas_price: u128,
    ) -> Result<SubmittedMint, ChainError> {
        let pending = self
            .contract
            .instance()
            .mint(request.recipient, request.amount)
            .from(self.signer_address)
            .gas(gas_limit)
            .gas_price(gas_price)
            .send()
            .await
            .map_err(|e| ChainError::TransactionFailed(e.to_string()))?;

        let tx_hash = format!("{:?}", pending.tx_hash());

        let receipt =
            match tokio::time::timeout(self.confirmation_timeout, pending.get_receipt()).await {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(e)) => return Err(ChainError::TransactionFailed(e.to_string())),
                Err(_) => return Err(ChainError::ConfirmationTimeout { tx_hash }),
            };

        if !receipt.status() {
            return Err(ChainError::TransactionFailed(format!(
                "transaction {tx_hash} reverted"
            )));
        }

        Ok(SubmittedMint {
            tx_hash,
            gas_used: receipt.gas_used,
            from: format!("{:?}", self.signer_address),
        })
    }

    /// Fetch a fresh token snapshot for `account`.
    pub async fn token_snapshot(&self, account: Address) -> Result<TokenSnapshot, ChainError> {
        self.contract
            .token_snapshot(account, self.token_decimals)
            .await
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("no reachable RPC endpoint after {} candidate(s)", attempts.len())]
    NoReachableEndpoint { attempts: Vec<EndpointAttempt> },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("transaction {tx_hash} was not confirmed within the timeout")]
    ConfirmationTimeout { tx_hash: String },
}
