use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Insurance product line of a policy holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolicyType {
    Auto,
    Home,
    Life,
    /// Any category outside the known product lines
    Unknown,
}

impl PolicyType {
    /// Known product lines, in feature-vector indicator order
    pub const KNOWN: [PolicyType; 3] = [PolicyType::Auto, PolicyType::Home, PolicyType::Life];

    /// Parse a raw category, mapping anything unrecognized to `Unknown`
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => PolicyType::Auto,
            "home" => PolicyType::Home,
            "life" => PolicyType::Life,
            _ => PolicyType::Unknown,
        }
    }

    /// One-hot indicators `[policy_auto, policy_home, policy_life]`
    pub fn indicators(&self) -> [f64; 3] {
        match self {
            PolicyType::Auto => [1.0, 0.0, 0.0],
            PolicyType::Home => [0.0, 1.0, 0.0],
            PolicyType::Life => [0.0, 0.0, 1.0],
            PolicyType::Unknown => [0.0, 0.0, 0.0],
        }
    }
}

/// One row of the raw CSV. Every field may be null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub customer_id: Option<String>,
    pub policy_type: Option<String>,
    pub age: Option<f64>,
    pub annual_premium: Option<f64>,
    pub claims_count: Option<f64>,
    pub churn: Option<f64>,
}

impl RawRecord {
    pub fn new(
        customer_id: impl Into<String>,
        policy_type: impl Into<String>,
        age: f64,
        annual_premium: f64,
        claims_count: f64,
        churn: u8,
    ) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            policy_type: Some(policy_type.into()),
            age: Some(age),
            annual_premium: Some(annual_premium),
            claims_count: Some(claims_count),
            churn: Some(churn as f64),
        }
    }
}

/// One row of the processed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub customer_id: String,

    /// Encoded features in `FEATURE_NAMES` order
    pub features: Vec<f64>,

    /// Churn label (0 or 1)
    pub churn: usize,
}
