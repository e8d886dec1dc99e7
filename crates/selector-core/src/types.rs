//! Core data types: accounts, contracts, wallet variants and the parameter
//! shapes that flow through the wallet capability interface.

use std::fmt;

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------
// Accounts & contracts
// ------------------------------------------------------------------

/// An account linked to the current session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
}

impl Account {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }
}

/// Account record of a hardware wallet.
///
/// Hardware backends persist these under their private namespace; only the
/// `account_id` part ever reaches session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareAccount {
    pub account_id: String,
    pub derivation_path: String,
    pub public_key: String,
}

impl From<&HardwareAccount> for Account {
    fn from(account: &HardwareAccount) -> Self {
        Account::new(account.account_id.clone())
    }
}

/// The application scope granted at sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractState {
    pub contract_id: String,
    #[serde(default)]
    pub method_names: Vec<String>,
}

impl ContractState {
    pub fn new(contract_id: impl Into<String>, method_names: Vec<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            method_names,
        }
    }
}

// ------------------------------------------------------------------
// Wallet variants
// ------------------------------------------------------------------

/// Closed set of wallet backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    /// Web wallet reached through a page redirect.
    Browser,
    /// Extension that injects itself into the page.
    Injected,
    /// Device-backed signer (derivation paths required at sign-in).
    Hardware,
    /// Remote signer reached over a relay.
    Bridge,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Browser => "browser",
            WalletType::Injected => "injected",
            WalletType::Hardware => "hardware",
            WalletType::Bridge => "bridge",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation metadata of a wallet module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletMetadata {
    pub name: String,
    pub description: Option<String>,
    pub icon_url: String,
    pub deprecated: bool,
    /// Install link, only meaningful for injected wallets.
    pub download_url: Option<String>,
}

impl WalletMetadata {
    pub fn new(name: impl Into<String>, icon_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon_url: icon_url.into(),
            deprecated: false,
            download_url: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

// ------------------------------------------------------------------
// Sign-in parameters
// ------------------------------------------------------------------

/// Variant-specific part of a sign-in request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SignInVariant {
    #[default]
    Standard,
    Hardware { derivation_paths: Vec<String> },
}

/// Parameters of `sign_in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInParams {
    pub contract_id: String,
    pub method_names: Vec<String>,
    pub variant: SignInVariant,
}

impl SignInParams {
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            method_names: Vec::new(),
            variant: SignInVariant::Standard,
        }
    }

    pub fn with_method_names<I, S>(mut self, method_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.method_names = method_names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_derivation_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variant = SignInVariant::Hardware {
            derivation_paths: paths.into_iter().map(Into::into).collect(),
        };
        self
    }

    /// Derivation paths of a hardware sign-in, empty for every other variant.
    pub fn derivation_paths(&self) -> &[String] {
        match &self.variant {
            SignInVariant::Hardware { derivation_paths } => derivation_paths,
            SignInVariant::Standard => &[],
        }
    }

    /// The contract scope this request asks for.
    pub fn contract(&self) -> ContractState {
        ContractState::new(self.contract_id.clone(), self.method_names.clone())
    }
}

// ------------------------------------------------------------------
// Transactions
// ------------------------------------------------------------------

/// A transaction action. Construction and signing belong to the backends;
/// the selector only carries these through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        method_name: String,
        args: serde_json::Value,
        gas: u64,
        /// Attached deposit as a decimal string of the smallest unit.
        deposit: String,
    },
    Transfer { deposit: String },
    /// Any action kind the selector does not model.
    Other(serde_json::Value),
}

/// A transaction whose signer and receiver may be filled in by the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub signer_id: Option<String>,
    pub receiver_id: Option<String>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignAndSendTransactionParams {
    pub signer_id: Option<String>,
    pub receiver_id: Option<String>,
    pub actions: Vec<Action>,
    /// Where browser wallets redirect once the transaction is signed.
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignAndSendTransactionsParams {
    pub transactions: Vec<Transaction>,
    pub callback_url: Option<String>,
}

/// Final outcome reported by the network for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub transaction_hash: String,
    pub status: serde_json::Value,
}
