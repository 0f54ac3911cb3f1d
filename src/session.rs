// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Verification Gate
//!
//! Per-session flow state machine. Exactly one [`FlowState`] exists per
//! session, and every transition funnels through [`Session`], which makes
//! impossible combinations (both flows active, uploads while disconnected)
//! unrepresentable instead of guarded by scattered booleans.
//!
//! Skipping verification in the normal flow is an allowed transition, not an
//! error path: the upload proceeds without a completed attestation.

use async_trait::async_trait;

use crate::models::Account;
use crate::models::TokenSnapshot;

/// Injected wallet capability: account discovery and message signing.
///
/// Supplied at construction so tests can substitute a double for the
/// browser/extension wallet the original flow depended on.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError>;

    async fn personal_sign(&self, message: &str, address: &str) -> Result<String, WalletError>;
}

/// Wallet-level failures. Either aborts the whole flow and returns the
/// session to `Unconnected`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("user rejected the wallet request: {0}")]
    UserRejected(String),
}

/// Session flow state. One per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Unconnected,
    ConnectedAwaitingFlowChoice,
    NormalAwaitingVerification,
    NormalUploading,
    DirectReclaimAwaitingVerification,
    DirectReclaimProcessing,
    Idle,
}

impl FlowState {
    /// Whether file input is accepted in this state. While a verification
    /// is pending the input surface is closed in both flows.
    fn accepts_files(self) -> bool {
        matches!(
            self,
            FlowState::ConnectedAwaitingFlowChoice | FlowState::NormalUploading
        )
    }
}

/// A staged text payload waiting for verification/upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub file_name: String,
    pub contents: String,
}

/// What the caller must execute after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    /// Upload the staged payloads, then report completion.
    UploadStaged(Vec<StagedFile>),
    /// Synthesize and upload the direct-reclaim proof, then report completion.
    RunDirectReclaim,
}

/// Invalid uses of the gate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("event `{event}` is not allowed in state {state:?}")]
    InvalidTransition {
        state: FlowState,
        event: &'static str,
    },

    #[error("no wallet is connected")]
    NotConnected,

    #[error("unsupported file `{file_name}`: only .txt payloads are accepted")]
    UnsupportedFile { file_name: String },
}

/// Session-owned state: account, flow position, staged input, token view.
pub struct Session {
    state: FlowState,
    account: Option<Account>,
    staged: Vec<StagedFile>,
    snapshot: Option<TokenSnapshot>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: FlowState::Unconnected,
            account: None,
            staged: Vec::new(),
            snapshot: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn snapshot(&self) -> Option<&TokenSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn set_snapshot(&mut self, snapshot: TokenSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub fn staged_files(&self) -> &[StagedFile] {
        &self.staged
    }

    /// Record a fresh wallet connection. Reconnecting discards the previous
    /// account and any staged input.
    pub fn connected(&mut self, account: Account) {
        if self.account.is_some() {
            tracing::info!("Reconnect: discarding previous session identity");
        }
        self.staged.clear();
        self.snapshot = None;
        self.account = Some(account);
        self.state = FlowState::ConnectedAwaitingFlowChoice;
    }

    /// Stage a text payload for upload. Only `.txt`-style text payloads are
    /// accepted, and only while the flow permits file input.
    pub fn stage_file(
        &mut self,
        file_name: impl Into<String>,
        contents: impl Into<String>,
    ) -> Result<(), SessionError> {
        let file_name = file_name.into();
        if !self.state.accepts_files() {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                event: "stage_file",
            });
        }
        if !file_name.to_ascii_lowercase().ends_with(".txt") {
            return Err(SessionError::UnsupportedFile { file_name });
        }
        self.staged.push(StagedFile {
            file_name,
            contents: contents.into(),
        });
        Ok(())
    }

    /// Select the normal upload-and-mint journey. Already-staged files stay
    /// staged, now gated behind verification.
    pub fn choose_normal_flow(&mut self) -> Result<(), SessionError> {
        self.require(FlowState::ConnectedAwaitingFlowChoice, "choose_normal_flow")?;
        self.state = FlowState::NormalAwaitingVerification;
        Ok(())
    }

    /// Select the standalone verify-and-mint journey.
    pub fn choose_direct_reclaim(&mut self) -> Result<(), SessionError> {
        self.require(
            FlowState::ConnectedAwaitingFlowChoice,
            "choose_direct_reclaim",
        )?;
        self.state = FlowState::DirectReclaimAwaitingVerification;
        Ok(())
    }

    /// The attestation provider reported completion.
    pub fn verification_complete(&mut self) -> Result<FlowAction, SessionError> {
        match self.state {
            FlowState::NormalAwaitingVerification => {
                self.state = FlowState::NormalUploading;
                Ok(FlowAction::UploadStaged(std::mem::take(&mut self.staged)))
            }
            FlowState::DirectReclaimAwaitingVerification => {
                self.state = FlowState::DirectReclaimProcessing;
                Ok(FlowAction::RunDirectReclaim)
            }
            state => Err(SessionError::InvalidTransition {
                state,
                event: "verification_complete",
            }),
        }
    }

    /// The user explicitly skipped verification. Allowed in the normal flow
    /// only; the upload proceeds without a completed attestation.
    pub fn skip_verification(&mut self) -> Result<FlowAction, SessionError> {
        self.require(FlowState::NormalAwaitingVerification, "skip_verification")?;
        self.state = FlowState::NormalUploading;
        Ok(FlowAction::UploadStaged(std::mem::take(&mut self.staged)))
    }

    /// The user cancelled the direct-reclaim verification.
    pub fn cancel_direct_reclaim(&mut self) -> Result<(), SessionError> {
        self.require(
            FlowState::DirectReclaimAwaitingVerification,
            "cancel_direct_reclaim",
        )?;
        self.state = FlowState::ConnectedAwaitingFlowChoice;
        Ok(())
    }

    /// Uploads for the active flow finished (successfully or not).
    pub fn uploads_finished(&mut self) {
        if matches!(
            self.state,
            FlowState::NormalUploading | FlowState::DirectReclaimProcessing
        ) {
            self.state = FlowState::Idle;
        }
    }

    /// Wallet disconnected. Valid from any state; discards the account,
    /// staged input and snapshot.
    pub fn disconnect(&mut self) {
        self.account = None;
        self.staged.clear();
        self.snapshot = None;
        self.state = FlowState::Unconnected;
    }

    fn require(&self, expected: FlowState, event: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                event,
            })
        }
    }
}
