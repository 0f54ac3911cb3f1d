// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DataCoin token contract interactions.

use std::str::FromStr;

use alloy::{
    primitives::{Address, FixedBytes, U256},
    providers::Provider,
    sol,
};

use super::client::ChainError;
use super::units::format_amount;
use crate::models::TokenSnapshot;

// DataCoin interface: an ERC-20 with role-gated minting and a global pause
// flag, matching the deployed contract's ABI.
sol! {
    #[sol(rpc)]
    interface IDataCoin {
        function mint(address to, uint256 amount) external;
        function hasRole(bytes32 role, address account) external view returns (bool);
        function mintingPaused() external view returns (bool);
        function MINTER_ROLE() external view returns (bytes32);
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function name() external view returns (string);
        function symbol() external view returns (string);
    }
}

/// DataCoin contract wrapper, bound to one provider and one address.
pub struct DataCoinContract<P> {
    contract: IDataCoin::IDataCoinInstance<P>,
}

impl<P: Provider + Clone> DataCoinContract<P> {
    /// Create a new contract instance.
    pub fn new(provider: &P, contract_address: &str) -> Result<Self, ChainError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let contract = IDataCoin::new(address, provider.clone());

        Ok(Self { contract })
    }

    /// The underlying typed contract instance.
    pub(crate) fn instance(&self) -> &IDataCoin::IDataCoinInstance<P> {
        &self.contract
    }

    /// Read the `MINTER_ROLE` identifier from the contract.
    ///
    /// The role hash is read on-chain rather than hardcoded so the contract
    /// stays authoritative.
    pub async fn minter_role(&self) -> Result<FixedBytes<32>, ChainError> {
        self.contract
            .MINTER_ROLE()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Whether `account` holds the minter role.
    pub async fn has_minter_role(&self, account: Address) -> Result<bool, ChainError> {
        let role = self.minter_role().await?;
        self.contract
            .hasRole(role, account)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Whether minting is globally paused.
    pub async fn minting_paused(&self) -> Result<bool, ChainError> {
        self.contract
            .mintingPaused()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Get the balance of an address, in the token's smallest unit.
    pub async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        self.contract
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Get the total supply, in the token's smallest unit.
    pub async fn total_supply(&self) -> Result<U256, ChainError> {
        self.contract
            .totalSupply()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Get the token name and symbol.
    pub async fn metadata(&self) -> Result<(String, String), ChainError> {
        let name = self
            .contract
            .name()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;
        let symbol = self
            .contract
            .symbol()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;
        Ok((name, symbol))
    }

    /// Assemble a fresh token snapshot for `account`.
    pub async fn token_snapshot(
        &self,
        account: Address,
        decimals: u8,
    ) -> Result<TokenSnapshot, ChainError> {
        let (name, symbol) = self.metadata().await?;
        let total_supply = self.total_supply().await?;
        let user_balance = self.balance_of(account).await?;

        Ok(TokenSnapshot {
            name,
            symbol,
            total_supply: format_amount(total_supply, decimals),
            user_balance: format_amount(user_balance, decimals),
        })
    }
}
