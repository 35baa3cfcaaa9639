use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{CommandId, CorrelationId, Network, SafeAreaInsets, TokenSymbol},
    error::PaymentErrorCode,
};

pub const MINIKIT_VERSION: &str = "1";
pub const MINIKIT_MINOR_VERSION: &str = "1";
pub const STATUS_SUCCESS: &str = "success";

/// Envelope written to the host bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage<T = Value> {
    pub command: CommandId,
    pub payload: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

/// Envelope the host calls back with. The event stays a raw string so unknown
/// names can be reported instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCommandPayload {
    pub appid: String,
    pub version: String,
    #[serde(rename = "minorVersion")]
    pub minor_version: String,
}

impl InitCommandPayload {
    pub fn new(appid: impl Into<String>) -> Self {
        Self {
            appid: appid.into(),
            version: MINIKIT_VERSION.to_string(),
            minor_version: MINIKIT_MINOR_VERSION.to_string(),
        }
    }
}

/// Reply to `init`. Success carries identity fields, failure carries `message`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InitResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(
        default,
        rename = "web3Name",
        alias = "web3name",
        skip_serializing_if = "Option::is_none"
    )]
    pub web3_name: Option<String>,
    #[serde(
        default,
        rename = "walletAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InitResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayCommandInput {
    pub amount: f64,
    /// Wallet address or web3name of the recipient.
    pub to: String,
    pub tip: f64,
    pub fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    pub token_symbol: TokenSymbol,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayCommandPayload {
    pub amount: f64,
    pub to: String,
    pub tip: f64,
    pub fee: f64,
    pub network: Network,
    pub token_symbol: TokenSymbol,
    pub description: String,
}

impl PayCommandInput {
    pub fn into_payload(self, network: Network) -> PayCommandPayload {
        PayCommandPayload {
            amount: self.amount,
            to: self.to,
            tip: self.tip,
            fee: self.fee,
            network,
            token_symbol: self.token_symbol,
            description: self.description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuccess {
    pub status: String,
    pub transaction_status: TransactionStatus,
    pub transaction_id: String,
    pub reference: String,
    pub from: String,
    pub chain: Network,
    pub timestamp: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub status: String,
    pub error_code: PaymentErrorCode,
    pub version: u32,
}

/// Reply to `pay`, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PaymentResponse {
    Success(PaymentSuccess),
    Error(PaymentFailure),
}

impl PaymentResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<'de> Deserialize<'de> for PaymentResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let status = value.get("status").and_then(Value::as_str);
        match status {
            Some(STATUS_SUCCESS) => serde_json::from_value(value)
                .map(Self::Success)
                .map_err(de::Error::custom),
            Some(_) => serde_json::from_value(value)
                .map(Self::Error)
                .map_err(de::Error::custom),
            None => Err(de::Error::missing_field("status")),
        }
    }
}

/// Identity object the host app exposes to the mini-app.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_optional_analytics: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_area_insets: Option<SafeAreaInsets>,
}
