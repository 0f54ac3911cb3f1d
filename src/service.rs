// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Mint Service
//!
//! Front door tying the pieces together: wallet connection through the
//! injected [`WalletProvider`], flow transitions through the session gate,
//! and execution of the actions those transitions emit (file uploads, the
//! direct-reclaim proof run) through the upload coordinator.
//!
//! The service owns the session; callers drive it with the same events the
//! original user journey had and read results off the shared log.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::blockchain::ChainError;
use crate::config::AppConfig;
use crate::models::Account;
use crate::pipeline::{ChainConnector, MintPipeline};
use crate::session::{
    FlowAction, FlowState, Session, SessionError, WalletError, WalletProvider,
};
use crate::upload::{ResultLog, UploadCoordinator, UploadRecord};

/// Message the wallet signs at connect time; the signature authenticates
/// every storage request for the session.
const AUTH_MESSAGE: &str =
    "Sign this message to authorize encrypted storage access for your address";

/// Failures surfaced by the service layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Session-scoped orchestrator over wallet, verification gate and uploads.
pub struct MintService<W: WalletProvider, C: ChainConnector> {
    wallet: W,
    session: Session,
    pipeline: Arc<MintPipeline<C>>,
    coordinator: UploadCoordinator<C>,
}

impl<W: WalletProvider, C: ChainConnector + 'static> MintService<W, C> {
    pub fn new(config: &AppConfig, wallet: W, connector: C) -> Result<Self, ChainError> {
        let pipeline = Arc::new(MintPipeline::new(config, connector));
        let coordinator =
            UploadCoordinator::new(config, Arc::clone(&pipeline), ResultLog::new())?;
        Ok(Self {
            wallet,
            session: Session::new(),
            pipeline,
            coordinator,
        })
    }

    pub fn state(&self) -> FlowState {
        self.session.state()
    }

    pub fn account(&self) -> Option<&Account> {
        self.session.account()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Copy of every upload/mint record produced this session.
    pub async fn results(&self) -> Vec<UploadRecord> {
        self.coordinator.log().entries().await
    }

    /// Connect a wallet: discover the account, collect the session auth
    /// signature, then refresh the token snapshot on a best-effort basis.
    ///
    /// Any wallet failure aborts the whole flow and leaves the session
    /// `Unconnected`, discarding a previous identity on a failed reconnect.
    pub async fn connect(&mut self) -> Result<Account, ServiceError> {
        let account = match self.wallet_handshake().await {
            Ok(account) => account,
            Err(e) => {
                self.session.disconnect();
                return Err(e.into());
            }
        };
        tracing::info!(address = %account.address, "Wallet connected");
        self.session.connected(account.clone());

        self.refresh_snapshot(&account.address).await;

        Ok(account)
    }

    async fn wallet_handshake(&self) -> Result<Account, WalletError> {
        let accounts = self.wallet.request_accounts().await?;
        let address = accounts.into_iter().next().ok_or_else(|| {
            WalletError::WalletUnavailable("wallet returned no accounts".to_string())
        })?;

        let signature = self.wallet.personal_sign(AUTH_MESSAGE, &address).await?;

        Ok(Account {
            address,
            signature,
            signed_auth_message: AUTH_MESSAGE.to_string(),
        })
    }

    /// Stage a text payload for the active session.
    pub fn stage_file(
        &mut self,
        file_name: impl Into<String>,
        contents: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.session.stage_file(file_name, contents)
    }

    pub fn choose_normal_flow(&mut self) -> Result<(), SessionError> {
        self.session.choose_normal_flow()
    }

    pub fn choose_direct_reclaim(&mut self) -> Result<(), SessionError> {
        self.session.choose_direct_reclaim()
    }

    /// Verification finished for the active flow; run whatever the gate
    /// releases.
    pub async fn verification_complete(&mut self) -> Result<(), ServiceError> {
        let action = self.session.verification_complete()?;
        self.execute(action).await
    }

    /// The user skipped verification in the normal flow; the staged uploads
    /// run without an attestation.
    pub async fn skip_verification(&mut self) -> Result<(), ServiceError> {
        let action = self.session.skip_verification()?;
        self.execute(action).await
    }

    pub fn cancel_direct_reclaim(&mut self) -> Result<(), SessionError> {
        self.session.cancel_direct_reclaim()
    }

    pub fn disconnect(&mut self) {
        tracing::info!("Wallet disconnected");
        self.session.disconnect();
    }

    async fn execute(&mut self, action: FlowAction) -> Result<(), ServiceError> {
        let account = self
            .session
            .account()
            .cloned()
            .ok_or(SessionError::NotConnected)?;

        match action {
            FlowAction::UploadStaged(files) => {
                self.coordinator.process_files(files, &account).await?;
            }
            FlowAction::RunDirectReclaim => {
                self.coordinator.process_direct_reclaim(&account).await?;
            }
        }

        self.session.uploads_finished();
        self.refresh_snapshot(&account.address).await;
        Ok(())
    }

    /// Best-effort snapshot refresh; a failed read is logged, never raised.
    async fn refresh_snapshot(&mut self, address: &str) {
        let account = match address.parse::<Address>() {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(address, error = %e, "Skipping snapshot refresh");
                return;
            }
        };
        match self.pipeline.refresh_snapshot(account).await {
            Ok(snapshot) => self.session.set_snapshot(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "Token snapshot refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockito::Server;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::pipeline::MintOutcome;
    use crate::pipeline::tests::{test_config, ScriptedChain, ScriptedConnector, TEST_KEY};

    const ADDRESS: &str = "0xa14159C1B383fBCa4A9C197aFC83E01DB4655B24";

    /// Wallet double answering `personal_sign` calls from a script, in
    /// order; the last entry repeats.
    struct ScriptedWallet {
        accounts: Result<Vec<String>, WalletError>,
        signatures: Vec<Result<String, WalletError>>,
        sign_calls: AtomicUsize,
    }

    impl ScriptedWallet {
        fn connected() -> Self {
            Self {
                accounts: Ok(vec![ADDRESS.to_string()]),
                signatures: vec![Ok("0xsessionsig".to_string())],
                sign_calls: AtomicUsize::new(0),
            }
        }

        fn rejecting() -> Self {
            Self {
                accounts: Ok(vec![ADDRESS.to_string()]),
                signatures: vec![Err(WalletError::UserRejected(
                    "signature request denied".to_string(),
                ))],
                sign_calls: AtomicUsize::new(0),
            }
        }

        fn connected_then_rejecting() -> Self {
            Self {
                accounts: Ok(vec![ADDRESS.to_string()]),
                signatures: vec![
                    Ok("0xsessionsig".to_string()),
                    Err(WalletError::UserRejected(
                        "signature request denied".to_string(),
                    )),
                ],
                sign_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WalletProvider for ScriptedWallet {
        async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
            self.accounts.clone()
        }

        async fn personal_sign(
            &self,
            _message: &str,
            _address: &str,
        ) -> Result<String, WalletError> {
            let call = self.sign_calls.fetch_add(1, Ordering::SeqCst);
            self.signatures[call.min(self.signatures.len() - 1)].clone()
        }
    }

    async fn service_with_storage(
        wallet: ScriptedWallet,
        chain: ScriptedChain,
        server: &Server,
    ) -> MintService<ScriptedWallet, ScriptedConnector> {
        let mut config = test_config(Some(TEST_KEY));
        config.encrypt_endpoint = format!("{}/encrypt", server.url());
        MintService::new(&config, wallet, ScriptedConnector::up(chain)).unwrap()
    }

    #[tokio::test]
    async fn connect_signs_the_auth_message_and_enters_flow_choice() {
        let server = Server::new_async().await;
        let mut service =
            service_with_storage(ScriptedWallet::connected(), ScriptedChain::happy(), &server)
                .await;

        let account = service.connect().await.unwrap();
        assert_eq!(account.address, ADDRESS);
        assert_eq!(account.signature, "0xsessionsig");
        assert_eq!(account.signed_auth_message, AUTH_MESSAGE);
        assert_eq!(service.state(), FlowState::ConnectedAwaitingFlowChoice);
        // Connect-time snapshot came from the scripted chain.
        assert_eq!(service.session().snapshot().unwrap().symbol, "DATA");
    }

    #[tokio::test]
    async fn rejected_signature_leaves_the_session_unconnected() {
        let server = Server::new_async().await;
        let mut service =
            service_with_storage(ScriptedWallet::rejecting(), ScriptedChain::happy(), &server)
                .await;

        let err = service.connect().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Wallet(WalletError::UserRejected(_))
        ));
        assert_eq!(service.state(), FlowState::Unconnected);
        assert!(service.account().is_none());
    }

    #[tokio::test]
    async fn failed_reconnect_discards_the_previous_session() {
        let server = Server::new_async().await;
        let mut service = service_with_storage(
            ScriptedWallet::connected_then_rejecting(),
            ScriptedChain::happy(),
            &server,
        )
        .await;

        service.connect().await.unwrap();
        assert_eq!(service.state(), FlowState::ConnectedAwaitingFlowChoice);

        let err = service.connect().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Wallet(WalletError::UserRejected(_))
        ));
        assert_eq!(service.state(), FlowState::Unconnected);
        assert!(service.account().is_none());
    }

    #[tokio::test]
    async fn keyless_session_still_sees_the_token_snapshot() {
        let server = Server::new_async().await;
        let mut config = test_config(None);
        config.encrypt_endpoint = format!("{}/encrypt", server.url());
        let mut service = MintService::new(
            &config,
            ScriptedWallet::connected(),
            ScriptedConnector::up(ScriptedChain::happy()),
        )
        .unwrap();

        service.connect().await.unwrap();
        assert_eq!(service.session().snapshot().unwrap().symbol, "DATA");
    }

    #[tokio::test]
    async fn skipped_verification_still_uploads_and_mints() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmSkip"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let mut service =
            service_with_storage(ScriptedWallet::connected(), chain.clone(), &server).await;

        service.connect().await.unwrap();
        service.stage_file("notes.txt", "payload").unwrap();
        service.choose_normal_flow().unwrap();
        service.skip_verification().await.unwrap();

        assert_eq!(service.state(), FlowState::Idle);
        let results = service.results().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].mint.as_ref().unwrap().is_success());
        assert_eq!(
            results[0].content.as_ref().unwrap().content_id,
            "QmSkip"
        );
    }

    #[tokio::test]
    async fn direct_reclaim_journey_runs_the_proof_and_returns_to_idle() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/encrypt")
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmProof"}]}"#)
            .create_async()
            .await;

        let chain = ScriptedChain::happy();
        let mut service =
            service_with_storage(ScriptedWallet::connected(), chain.clone(), &server).await;

        service.connect().await.unwrap();
        service.choose_direct_reclaim().unwrap();
        service.verification_complete().await.unwrap();

        upload.assert_async().await;
        assert_eq!(service.state(), FlowState::Idle);
        let results = service.results().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_label, "Direct Reclaim Verification");
        match results[0].mint.as_ref().unwrap() {
            MintOutcome::Success { minted, .. } => assert_eq!(minted.tx_hash, "0xabc123"),
            other => panic!("expected success, got {other:?}"),
        }
        // Bonus reward, not the per-file baseline.
        let amounts = chain.submitted_amounts.lock().unwrap();
        assert_eq!(amounts.len(), 1);
        assert_eq!(
            amounts[0],
            alloy::primitives::U256::from(15_000_000_000_000_000_000u128)
        );
    }

    #[tokio::test]
    async fn cancelled_direct_reclaim_returns_to_flow_choice_without_uploads() {
        let server = Server::new_async().await;
        let mut service =
            service_with_storage(ScriptedWallet::connected(), ScriptedChain::happy(), &server)
                .await;

        service.connect().await.unwrap();
        service.choose_direct_reclaim().unwrap();
        service.cancel_direct_reclaim().unwrap();

        assert_eq!(service.state(), FlowState::ConnectedAwaitingFlowChoice);
        assert!(service.results().await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_discards_the_session_but_keeps_the_result_log() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/encrypt")
            .with_status(200)
            .with_body(r#"{"data":[{"Hash":"QmKeep"}]}"#)
            .create_async()
            .await;

        let mut service =
            service_with_storage(ScriptedWallet::connected(), ScriptedChain::happy(), &server)
                .await;

        service.connect().await.unwrap();
        service.stage_file("a.txt", "x").unwrap();
        service.choose_normal_flow().unwrap();
        service.verification_complete().await.unwrap();

        service.disconnect();
        assert_eq!(service.state(), FlowState::Unconnected);
        assert_eq!(service.results().await.len(), 1);
    }
}
