// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Upload Coordinator
//!
//! Forwards verified payloads to the external storage/encryption endpoint
//! and, on a returned content identifier, triggers the mint pipeline with
//! the flow's reward amount. Files dropped together are processed as
//! independent concurrent tasks with independent outcomes; one failure
//! never blocks or cancels the others.
//!
//! ## Wire format
//!
//! Request: `POST {text, fileName, pubKey, signMess}` as JSON.
//! Success: a JSON body carrying a content identifier at `data[0].Hash`.
//! A 2xx body without that identifier is a soft failure
//! (`NoContentIdentifier`) and no mint is attempted.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::blockchain::{parse_amount, ChainError};
use crate::config::AppConfig;
use crate::models::{Account, ContentResult, MintRequest, ProofDocument};
use crate::pipeline::{ChainConnector, MintOutcome, MintPipeline};
use crate::session::StagedFile;

/// Label used for the direct-reclaim entry in the result log.
const DIRECT_RECLAIM_LABEL: &str = "Direct Reclaim Verification";

/// Storage/encryption endpoint failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    #[error("encryption service error ({status}): {message}")]
    EncryptionService { status: u16, message: String },

    #[error("encryption service returned no content identifier")]
    NoContentIdentifier,

    #[error("encryption service request failed: {0}")]
    Transport(String),
}

/// One entry in the exposed result surface.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub id: Uuid,
    /// File name, or the direct-reclaim label.
    pub source_label: String,
    /// Storage outcome for this payload.
    pub content: Result<ContentResult, UploadError>,
    /// Mint outcome, when a mint was attempted.
    pub mint: Option<MintOutcome>,
}

/// Ordered result log, append-safe under concurrent writer tasks.
///
/// Insertion order across concurrent tasks is unconstrained; what matters
/// is that no append is ever lost.
#[derive(Clone, Default)]
pub struct ResultLog {
    records: Arc<Mutex<Vec<UploadRecord>>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: UploadRecord) {
        self.records.lock().await.push(record);
    }

    /// Copy of every record appended so far.
    pub async fn entries(&self) -> Vec<UploadRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[derive(Serialize)]
struct EncryptRequest<'a> {
    text: &'a str,
    #[serde(rename = "fileName")]
    file_name: &'a str,
    #[serde(rename = "pubKey")]
    pub_key: &'a str,
    #[serde(rename = "signMess")]
    sign_mess: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct EncryptResponse {
    #[serde(default)]
    data: Option<Vec<EncryptEntry>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EncryptEntry {
    #[serde(rename = "Hash")]
    hash: Option<String>,
}

/// Client for the external storage/encryption endpoint.
#[derive(Clone)]
pub struct StorageClient {
    endpoint: String,
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Send one payload for encryption and storage.
    pub async fn encrypt(
        &self,
        text: &str,
        file_name: &str,
        account: &Account,
    ) -> Result<ContentResult, UploadError> {
        let body = EncryptRequest {
            text,
            file_name,
            pub_key: &account.address,
            sign_mess: &account.signature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::EncryptionService {
                status: status.as_u16(),
                message,
            });
        }

        // A 2xx body that does not parse carries no content identifier.
        let payload: EncryptResponse = response.json().await.unwrap_or_default();

        if let Some(error) = payload.error {
            return Err(UploadError::EncryptionService {
                status: status.as_u16(),
                message: error,
            });
        }

        let content_id = payload
            .data
            .and_then(|entries| entries.into_iter().next())
            .and_then(|entry| entry.hash)
            .ok_or(UploadError::NoContentIdentifier)?;

        tracing::info!(file_name, content_id = %content_id, "Payload stored");

        Ok(ContentResult {
            content_id,
            file_name: file_name.to_string(),
        })
    }
}

/// Consumes verified input and drives storage plus minting.
pub struct UploadCoordinator<C: ChainConnector> {
    storage: StorageClient,
    pipeline: Arc<MintPipeline<C>>,
    log: ResultLog,
    upload_reward: U256,
    direct_reclaim_reward: U256,
}

impl<C: ChainConnector + 'static> UploadCoordinator<C> {
    pub fn new(
        config: &AppConfig,
        pipeline: Arc<MintPipeline<C>>,
        log: ResultLog,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            storage: StorageClient::new(config.encrypt_endpoint.clone()),
            pipeline,
            log,
            upload_reward: parse_amount(&config.upload_reward, config.token_decimals)?,
            direct_reclaim_reward: parse_amount(
                &config.direct_reclaim_reward,
                config.token_decimals,
            )?,
        })
    }

    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Upload each staged file as its own task and mint the baseline reward
    /// per stored payload. Returns once every task has appended its record.
    pub async fn process_files(
        &self,
        files: Vec<StagedFile>,
        account: &Account,
    ) -> Result<(), ChainError> {
        let recipient = account
            .address
            .parse::<Address>()
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let mut handles = Vec::with_capacity(files.len());
        for file in files {
            let storage = self.storage.clone();
            let pipeline = Arc::clone(&self.pipeline);
            let log = self.log.clone();
            let account = account.clone();
            let amount = self.upload_reward;

            handles.push(tokio::spawn(async move {
                let record = upload_and_mint(
                    &storage,
                    &pipeline,
                    &account,
                    recipient,
                    file.file_name.clone(),
                    &file.contents,
                    amount,
                )
                .await;
                log.append(record).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Upload task panicked");
            }
        }

        Ok(())
    }

    /// Synthesize the direct-reclaim proof document, store it, and mint the
    /// bonus reward.
    pub async fn process_direct_reclaim(&self, account: &Account) -> Result<(), ChainError> {
        let recipient = account
            .address
            .parse::<Address>()
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let document = ProofDocument::direct_reclaim(account);
        let text = serde_json::to_string_pretty(&document)
            .map_err(|e| ChainError::Contract(e.to_string()))?;
        let file_name = format!(
            "direct_reclaim_verification_{}.json",
            document.timestamp.timestamp_millis()
        );

        let mut record = upload_and_mint(
            &self.storage,
            &self.pipeline,
            account,
            recipient,
            file_name,
            &text,
            self.direct_reclaim_reward,
        )
        .await;
        record.source_label = DIRECT_RECLAIM_LABEL.to_string();
        self.log.append(record).await;

        Ok(())
    }
}

/// Store one payload; on a content identifier, run the mint pipeline.
async fn upload_and_mint<C: ChainConnector>(
    storage: &StorageClient,
    pipeline: &MintPipeline<C>,
    account: &Account,
    recipient: Address,
    file_name: String,
    contents: &str,
    amount: U256,
) -> UploadRecord {
    let content = storage.encrypt(contents, &file_name, account).await;

    let mint = match &content {
        Ok(result) => {
            let request = MintRequest {
                recipient,
                amount,
                source_content_id: Some(result.content_id.clone()),
            };
            Some(pipeline.mint(&request).await)
        }
        Err(e) => {
            tracing::warn!(file_name, error = %e, "Payload not stored; skipping mint");
            None
        }
    };

    UploadRecord {
        id: Uuid::new_v4(),
        source_label: file_name,
        content,
        mint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    use crate::pipeline::MintError;
    use crate::pipeline::tests::{test_config, ScriptedChain, ScriptedConnector, TEST_KEY};

    fn account() -> Account {
        Account {
            address: "0xa14159C1B383fBCa4A9C197aFC83E01DB4655B24".to_string(),
            signature: "0xsig".to_string(),
            signed_auth_message: "auth".to_string(),
        }
    }

    fn coordinator(
        endpoint: String,
        connector: ScriptedConnector,
    ) -> UploadCoordinator<ScriptedConnector> {
        let mut config = test_config(Some(TEST_KEY));
        config.encrypt_endpoint = endpoint;
        let pipeline = Arc::new(MintPipeline::new(&config, connector));
        UploadCoordinator::new(&config, pipeline, ResultLog::new()).unwrap()
    }

    fn staged(name: &str) -> StagedFile {
        StagedFile {
            file_name: name.to_string(),
            contents: "payload".to_string(),
        }
    }

    #[tokio::test]
    async fn stored_payload_triggers_a_baseline_reward_mint() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/encrypt")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "fileName": "notes.txt",
                "pubKey": account().address,
                "signMess": "0xsig",
            })))
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmContent"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let coordinator = coordinator(
            format!("{}/encrypt", server.url()),
            ScriptedConnector::up(chain.clone()),
        );

        coordinator
            .process_files(vec![staged("notes.txt")], &account())
            .await
            .unwrap();

        upload.assert_async().await;
        let entries = coordinator.log().entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_label, "notes.txt");
        assert_eq!(
            entries[0].content.as_ref().unwrap().content_id,
            "QmContent"
        );
        assert!(entries[0].mint.as_ref().unwrap().is_success());
        // Baseline reward: 10 tokens at 18 decimals.
        assert_eq!(
            chain.submitted_amounts.lock().unwrap().as_slice(),
            &[U256::from(10_000_000_000_000_000_000u128)]
        );
    }

    #[tokio::test]
    async fn missing_content_identifier_is_soft_failure_with_no_mint() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .with_status(200)
            .with_body(r#"{"data":[{"Name":"notes.txt"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let coordinator = coordinator(
            format!("{}/encrypt", server.url()),
            ScriptedConnector::up(chain.clone()),
        );

        coordinator
            .process_files(vec![staged("notes.txt")], &account())
            .await
            .unwrap();

        let entries = coordinator.log().entries().await;
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            entries[0].content,
            Err(UploadError::NoContentIdentifier)
        ));
        assert!(entries[0].mint.is_none());
        assert!(chain.recorded().is_empty());
    }

    #[tokio::test]
    async fn error_statuses_and_error_bodies_are_service_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .with_status(500)
            .with_body("storage backend down")
            .create_async()
            .await;

        let storage = StorageClient::new(format!("{}/encrypt", server.url()));
        let err = storage.encrypt("x", "a.txt", &account()).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::EncryptionService { status: 500, .. }
        ));

        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .with_status(200)
            .with_body(r#"{"error":"signature mismatch"}"#)
            .create_async()
            .await;

        let storage = StorageClient::new(format!("{}/encrypt", server.url()));
        let err = storage.encrypt("x", "a.txt", &account()).await.unwrap_err();
        match err {
            UploadError::EncryptionService { status, message } => {
                assert_eq!(status, 200);
                assert_eq!(message, "signature mismatch");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_files_each_get_an_independent_record() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .expect(3)
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmShared"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let coordinator = coordinator(
            format!("{}/encrypt", server.url()),
            ScriptedConnector::up(chain),
        );

        coordinator
            .process_files(
                vec![staged("a.txt"), staged("b.txt"), staged("c.txt")],
                &account(),
            )
            .await
            .unwrap();

        let entries = coordinator.log().entries().await;
        assert_eq!(entries.len(), 3);
        let mut labels: Vec<_> = entries.iter().map(|r| r.source_label.clone()).collect();
        labels.sort();
        assert_eq!(labels, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn one_failing_file_does_not_block_the_others() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .match_body(Matcher::PartialJson(serde_json::json!({"fileName": "bad.txt"})))
            .with_status(502)
            .with_body("gateway error")
            .create_async()
            .await;
        server
            .mock("POST", "/encrypt")
            .match_body(Matcher::PartialJson(serde_json::json!({"fileName": "good.txt"})))
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmGood"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let coordinator = coordinator(
            format!("{}/encrypt", server.url()),
            ScriptedConnector::up(chain),
        );

        coordinator
            .process_files(vec![staged("bad.txt"), staged("good.txt")], &account())
            .await
            .unwrap();

        let entries = coordinator.log().entries().await;
        assert_eq!(entries.len(), 2);
        let good = entries.iter().find(|r| r.source_label == "good.txt").unwrap();
        assert!(good.mint.as_ref().unwrap().is_success());
        let bad = entries.iter().find(|r| r.source_label == "bad.txt").unwrap();
        assert!(bad.content.is_err());
        assert!(bad.mint.is_none());
    }

    #[tokio::test]
    async fn direct_reclaim_stores_the_proof_document_and_mints_the_bonus() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/encrypt")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("direct_reclaim_verification_".to_string()),
                Matcher::Regex("direct-reclaim".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmProof"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let coordinator = coordinator(
            format!("{}/encrypt", server.url()),
            ScriptedConnector::up(chain.clone()),
        );

        coordinator.process_direct_reclaim(&account()).await.unwrap();

        upload.assert_async().await;
        let entries = coordinator.log().entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_label, "Direct Reclaim Verification");
        assert!(entries[0].mint.as_ref().unwrap().is_success());
        // Bonus reward: 15 tokens at 18 decimals, not the baseline 10.
        assert_eq!(
            chain.submitted_amounts.lock().unwrap().as_slice(),
            &[U256::from(15_000_000_000_000_000_000u128)]
        );
    }

    #[tokio::test]
    async fn unreachable_chain_is_reported_per_record_not_thrown() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmContent"}]}"#)
            .create_async()
            .await;

        let coordinator = coordinator(
            format!("{}/encrypt", server.url()),
            ScriptedConnector::down(Vec::new()),
        );

        coordinator
            .process_files(vec![staged("a.txt")], &account())
            .await
            .unwrap();

        let entries = coordinator.log().entries().await;
        assert_eq!(entries.len(), 1);
        match entries[0].mint.as_ref().unwrap() {
            MintOutcome::Failure { reason, .. } => {
                assert!(matches!(reason, MintError::NoReachableEndpoint { .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_appends_never_lose_entries() {
        let log = ResultLog::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(UploadRecord {
                    id: Uuid::new_v4(),
                    source_label: format!("file-{i}.txt"),
                    content: Err(UploadError::NoContentIdentifier),
                    mint: None,
                })
                .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(log.len().await, 16);
    }
}
