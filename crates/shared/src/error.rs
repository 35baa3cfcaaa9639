use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallErrorCode {
    Unknown,
    AlreadyInstalled,
    #[serde(rename = "outside_of_host_app", alias = "outside_of_sporran_app")]
    OutsideHost,
    NotOnClient,
    AppOutOfDate,
}

impl InstallErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unknown => "Failed to install MiniKit.",
            Self::AlreadyInstalled => "MiniKit is already installed.",
            Self::OutsideHost => "MiniApp launched outside of SporranApp.",
            Self::NotOnClient => "Window object is not available.",
            Self::AppOutOfDate => "SporranApp is out of date. Please update the app.",
        }
    }
}

/// Install failure as a value; carries the code and the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct InstallError {
    pub code: InstallErrorCode,
    pub message: String,
}

impl InstallError {
    pub fn new(code: InstallErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<InstallErrorCode> for InstallError {
    fn from(code: InstallErrorCode) -> Self {
        Self::new(code, code.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    InputError,
    UserRejected,
    PaymentRejected,
    InvalidReceiver,
    InsufficientBalance,
    TransactionFailed,
    GenericError,
    UserBlocked,
}
