// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Value types shared across the session, pipeline and upload layers.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::ChainError;

/// Wallet identity produced once at connect time.
///
/// Immutable for the session's lifetime; discarded on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Checksummed wallet address.
    pub address: String,
    /// Signature over the auth message.
    pub signature: String,
    /// The auth message that was signed.
    pub signed_auth_message: String,
}

/// A single mint to perform. Consumed exactly once by the pipeline.
#[derive(Debug, Clone)]
pub struct MintRequest {
    /// Recipient of the newly minted tokens.
    pub recipient: Address,
    /// Amount in the token's smallest unit.
    pub amount: U256,
    /// Content identifier that earned this mint, when there is one.
    pub source_content_id: Option<String>,
}

impl MintRequest {
    /// Build a request, validating the recipient address.
    pub fn new(
        recipient: &str,
        amount: U256,
        source_content_id: Option<String>,
    ) -> Result<Self, ChainError> {
        let recipient = recipient
            .parse::<Address>()
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;
        Ok(Self {
            recipient,
            amount,
            source_content_id,
        })
    }
}

/// Result of a confirmed mint submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedMint {
    /// Transaction hash.
    pub tx_hash: String,
    /// Gas actually used.
    pub gas_used: u64,
    /// Signer address the mint was sent from.
    pub from: String,
}

/// Point-in-time view of the token, refreshed after connect and after every
/// successful mint. Superseded by each refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub name: String,
    pub symbol: String,
    /// Total supply formatted with the token's decimals.
    pub total_supply: String,
    /// The user's balance formatted with the token's decimals.
    pub user_balance: String,
}

/// Content identifier returned by the storage/encryption endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentResult {
    /// Opaque handle referencing the encrypted payload.
    pub content_id: String,
    /// Name the payload was stored under.
    pub file_name: String,
}

/// Document synthesized for the direct-reclaim flow. This, not an
/// attestation artifact, is what gets encrypted and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofDocument {
    pub timestamp: DateTime<Utc>,
    pub account: String,
    #[serde(rename = "verificationType")]
    pub verification_type: String,
    pub message: String,
}

impl ProofDocument {
    /// Synthesize the proof for a completed direct-reclaim verification.
    pub fn direct_reclaim(account: &Account) -> Self {
        Self {
            timestamp: Utc::now(),
            account: account.address.clone(),
            verification_type: "direct-reclaim".to_string(),
            message: "Direct reclaim verification completed successfully".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_request_rejects_bad_recipient() {
        let err = MintRequest::new("not-an-address", U256::from(1u64), None);
        assert!(matches!(err, Err(ChainError::InvalidAddress(_))));
    }

    #[test]
    fn mint_request_parses_recipient() {
        let request = MintRequest::new(
            "0xa14159C1B383fBCa4A9C197aFC83E01DB4655B24",
            U256::from(10u64),
            Some("QmHash".to_string()),
        )
        .unwrap();
        assert_eq!(request.amount, U256::from(10u64));
        assert_eq!(request.source_content_id.as_deref(), Some("QmHash"));
    }

    #[test]
    fn proof_document_serializes_wire_field_names() {
        let account = Account {
            address: "0xa14159C1B383fBCa4A9C197aFC83E01DB4655B24".to_string(),
            signature: "0xsig".to_string(),
            signed_auth_message: "auth".to_string(),
        };
        let doc = ProofDocument::direct_reclaim(&account);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["verificationType"], "direct-reclaim");
        assert_eq!(json["account"], account.address);
    }
}
