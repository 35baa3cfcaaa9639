use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Class of inbound message dispatched by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "init")]
    Init,
    #[serde(rename = "payment-response", alias = "miniapp-payment")]
    PaymentResponse,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::PaymentResponse => "payment-response",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "init" => Some(Self::Init),
            "payment-response" | "miniapp-payment" => Some(Self::PaymentResponse),
            _ => None,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class of outbound message sent to the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandId {
    Init,
    Pay,
}

impl CommandId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Pay => "pay",
        }
    }

    /// Event the host answers this command with.
    pub fn response_event(&self) -> EventName {
        match self {
            Self::Init => EventName::Init,
            Self::Pay => EventName::PaymentResponse,
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call token threaded through an outbound command and its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenSymbol {
    #[serde(rename = "KILT")]
    Kilt,
    #[serde(rename = "USDC")]
    Usdc,
}

impl TokenSymbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kilt => "KILT",
            Self::Usdc => "USDC",
        }
    }

    /// Tokens not subject to the minimum amount rule.
    pub fn is_fee_exempt(&self) -> bool {
        matches!(self, Self::Kilt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[default]
    Kilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SafeAreaInsets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}
