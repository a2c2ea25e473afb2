//! Node configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use oracle_worker::{FixedStatusSource, RandomStatusSource, StatusSource, WorkerConfig};
use surety::{Amount, StatusCode, SuretyConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub surety: SuretyConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl NodeConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.surety.validate()?;
        Ok(config)
    }
}

/// Scenario the node plays against its instance.
///
/// Without a `[scenario]` table the built-in scenario runs. A table replaces
/// it entirely; lists it omits are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Genesis airline; owner of the instance
    #[serde(default = "default_genesis")]
    pub genesis: AirlineSpec,

    /// Airlines admitted after genesis, in order
    #[serde(default)]
    pub airlines: Vec<AirlineSpec>,

    #[serde(default)]
    pub flights: Vec<FlightSpec>,

    #[serde(default)]
    pub policies: Vec<PolicySpec>,

    /// What the oracles report
    #[serde(default)]
    pub status: StatusChoice,

    /// Overall time allowed for every flight to resolve
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            genesis: default_genesis(),
            airlines: vec![AirlineSpec {
                label: "ajira".to_string(),
                name: "Ajira Airways".to_string(),
                fund: true,
                sponsors: Vec::new(),
            }],
            flights: vec![
                FlightSpec {
                    airline: "oceanic".to_string(),
                    code: "ND1309".to_string(),
                    timestamp: 1_700_000_000,
                },
                FlightSpec {
                    airline: "ajira".to_string(),
                    code: "316".to_string(),
                    timestamp: 1_700_003_600,
                },
            ],
            policies: vec![PolicySpec {
                passenger: "passenger".to_string(),
                airline: "oceanic".to_string(),
                flight: "ND1309".to_string(),
                premium: Amount::units(1),
            }],
            status: StatusChoice::default(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_genesis() -> AirlineSpec {
    AirlineSpec {
        label: "oceanic".to_string(),
        name: "Oceanic Airlines".to_string(),
        fund: true,
        sponsors: Vec::new(),
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirlineSpec {
    /// Label the airline's address is derived from
    pub label: String,
    pub name: String,
    /// Pay the registration fee once admitted
    #[serde(default = "default_true")]
    pub fund: bool,
    /// Labels of the funded airlines voting for admission; genesis when empty
    #[serde(default)]
    pub sponsors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightSpec {
    /// Label of the operating airline
    pub airline: String,
    pub code: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Label of the insured passenger
    pub passenger: String,
    /// Label of the operating airline
    pub airline: String,
    /// Flight code
    pub flight: String,
    pub premium: Amount,
}

/// Status reported by the oracle fleet: `"random"` or a status name such as
/// `"late_airline"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatusChoice {
    Random,
    Fixed(StatusCode),
}

impl StatusChoice {
    pub fn source(self) -> Arc<dyn StatusSource> {
        match self {
            StatusChoice::Random => Arc::new(RandomStatusSource::new()),
            StatusChoice::Fixed(status) => Arc::new(FixedStatusSource(status)),
        }
    }
}

impl Default for StatusChoice {
    fn default() -> Self {
        StatusChoice::Fixed(StatusCode::LateAirline)
    }
}

impl TryFrom<String> for StatusChoice {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "random" {
            return Ok(StatusChoice::Random);
        }
        StatusCode::TERMINAL
            .iter()
            .find(|status| status.as_str() == value)
            .map(|status| StatusChoice::Fixed(*status))
            .ok_or_else(|| format!("unknown status choice `{value}`"))
    }
}

impl From<StatusChoice> for String {
    fn from(choice: StatusChoice) -> Self {
        match choice {
            StatusChoice::Random => "random".to_string(),
            StatusChoice::Fixed(status) => status.as_str().to_string(),
        }
    }
}
