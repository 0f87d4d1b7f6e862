use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The uppercase wire form the exchange expects in the `side` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl serde::Serialize for OrderSide {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for OrderSide {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(serde::de::Error::custom(format!(
                "unknown variant `{}`, expected `BUY` or `SELL`",
                s
            ))),
        }
    }
}

/// Lifecycle state of a tracked symbol. Persisted to the ledger mirror as
/// lowercase text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolState {
    #[default]
    Stop,
    Pause,
    Track,
}

impl SymbolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolState::Stop => "stop",
            SymbolState::Pause => "pause",
            SymbolState::Track => "track",
        }
    }
}

impl FromStr for SymbolState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(SymbolState::Stop),
            "pause" => Ok(SymbolState::Pause),
            "track" => Ok(SymbolState::Track),
            other => Err(CoreError::UnknownState(other.to_string())),
        }
    }
}

impl fmt::Display for SymbolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buy/sell gate driven by the indicator engine. `New` is the boot value
/// before the first MACD verdict; it may flip either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trigger {
    #[default]
    New,
    Buy,
    Sell,
}

/// Tri-state latch that suppresses buys after an insufficient-funds
/// rejection until the USDT balance recovers above the configured lot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsdtGate {
    #[default]
    Unblock,
    Block,
    ContinueBlock,
}
