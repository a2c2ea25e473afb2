//! Core value types shared by every surety component.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SuretyError};

/// Wei per whole unit of the native currency.
pub const WEI_PER_UNIT: u128 = 1_000_000_000_000_000_000;

/// Longest flight code or airline name accepted, in bytes.
pub const MAX_LABEL_BYTES: usize = 32;

/// Shard an oracle listens on. Always below the configured shard count.
pub type ShardId = u8;

/// The three shards assigned to an oracle at registration.
pub type OracleIndexes = [ShardId; 3];

/// Errors raised while parsing the textual forms of core types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Malformed decimal amount
    #[error("invalid amount: {0}")]
    Amount(String),

    /// Malformed account address
    #[error("invalid account id: {0}")]
    Account(String),

    /// Numeric code outside the known status codes
    #[error("invalid status code: {0}")]
    StatusCode(u8),
}

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccountId([u8; 20]);

impl AccountId {
    /// Wrap raw address bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive a stable address from a human-readable label.
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl FromStr for AccountId {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits).map_err(|e| ParseError::Account(format!("{s}: {e}")))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| ParseError::Account(format!("{s}: expected 20 bytes")))?;
        Ok(Self(bytes))
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AccountId {
    type Error = ParseError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// A non-negative amount of native currency, held in wei.
///
/// The textual form is a decimal number of whole units (`"1.5"`), which is
/// also how amounts appear in configuration files and serialized events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Amount(u128);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Amount from a raw wei value.
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Amount of `n` whole units.
    pub const fn units(n: u64) -> Self {
        Self(n as u128 * WEI_PER_UNIT)
    }

    /// Raw wei value.
    pub const fn wei(self) -> u128 {
        self.0
    }

    /// Whether this amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// `self * numerator / denominator`, rounding down.
    pub fn checked_mul_ratio(self, numerator: u64, denominator: u64) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }
        self.0
            .checked_mul(numerator as u128)
            .map(|scaled| Amount(scaled / denominator as u128))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WEI_PER_UNIT;
        let frac = self.0 % WEI_PER_UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let frac = format!("{frac:018}");
        write!(f, "{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseError::Amount(s.to_string());
        let trimmed = s.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 18 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let frac: u128 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<18}").parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(WEI_PER_UNIT)
            .and_then(|w| w.checked_add(frac))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for Amount {
    type Error = ParseError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Flight status as reported by oracles.
///
/// Numeric codes match the values oracle workers put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Not yet resolved
    #[default]
    Unknown = 0,
    /// Departed on time
    OnTime = 10,
    /// Delayed by the airline
    LateAirline = 20,
    /// Delayed by weather
    LateWeather = 30,
    /// Delayed by a technical fault
    LateTechnical = 40,
    /// Delayed for another reason
    LateOther = 50,
}

impl StatusCode {
    /// Every code an oracle may report.
    pub const TERMINAL: [StatusCode; 5] = [
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    /// Numeric wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a numeric wire code.
    pub fn from_code(code: u8) -> std::result::Result<Self, ParseError> {
        match code {
            0 => Ok(Self::Unknown),
            10 => Ok(Self::OnTime),
            20 => Ok(Self::LateAirline),
            30 => Ok(Self::LateWeather),
            40 => Ok(Self::LateTechnical),
            50 => Ok(Self::LateOther),
            other => Err(ParseError::StatusCode(other)),
        }
    }

    /// Whether this is a resolved status.
    pub fn is_terminal(self) -> bool {
        self != Self::Unknown
    }

    /// Whether reaching this status credits policyholders.
    pub fn pays_out(self) -> bool {
        self == Self::LateAirline
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::OnTime => "on_time",
            Self::LateAirline => "late_airline",
            Self::LateWeather => "late_weather",
            Self::LateTechnical => "late_technical",
            Self::LateOther => "late_other",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a flight: operating airline, flight code and departure time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    /// Operating airline
    pub airline: AccountId,
    /// Flight code, e.g. `ND1309`
    pub flight: String,
    /// Departure time (unix seconds)
    pub timestamp: u64,
}

impl FlightKey {
    pub fn new(airline: AccountId, flight: impl Into<String>, timestamp: u64) -> Self {
        Self {
            airline,
            flight: flight.into(),
            timestamp,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.flight, self.timestamp, self.airline)
    }
}

/// Identifies a status request: the bucket it was opened on plus the flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusRequestKey {
    /// Shard whose oracles should answer
    pub bucket: ShardId,
    /// Flight being queried
    pub flight: FlightKey,
}

impl StatusRequestKey {
    pub fn new(bucket: ShardId, flight: FlightKey) -> Self {
        Self { bucket, flight }
    }
}

impl fmt::Display for StatusRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.bucket, self.flight)
    }
}

/// Reject empty or oversized flight codes and airline names.
pub(crate) fn validate_label(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SuretyError::InvalidInput(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_LABEL_BYTES {
        return Err(SuretyError::InvalidInput(format!(
            "{kind} exceeds {MAX_LABEL_BYTES} bytes: {value}"
        )));
    }
    Ok(())
}
