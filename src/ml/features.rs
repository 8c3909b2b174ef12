use crate::error::{AppError, Result};
use crate::models::{FeaturesPayload, PolicyType, ProcessedRecord, RawRecord};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const FEATURE_COUNT: usize = 6;

/// Column order of every feature vector, at fit time and at inference time.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "annual_premium",
    "claims_count",
    "policy_auto",
    "policy_home",
    "policy_life",
];

/// Positions of the numeric fields that get normalized
pub const NUMERIC_FEATURES: [usize; 3] = [0, 1, 2];

/// Fixed-order numeric input of the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Build from numeric fields and a policy category
    pub fn from_parts(age: f64, annual_premium: f64, claims_count: f64, policy: PolicyType) -> Self {
        let [auto, home, life] = policy.indicators();
        Self([age, annual_premium, claims_count, auto, home, life])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = AppError;

    fn try_from(values: &[f64]) -> Result<Self> {
        let array: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
            AppError::Data(format!(
                "Expected {} features, got {}",
                FEATURE_COUNT,
                values.len()
            ))
        })?;
        Ok(Self(array))
    }
}

/// Serving-side validation: every named field present and finite,
/// indicators within `[0, 1]`.
impl TryFrom<&FeaturesPayload> for FeatureVector {
    type Error = AppError;

    fn try_from(payload: &FeaturesPayload) -> Result<Self> {
        let fields = payload.named_fields();

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "missing field(s): {}",
                missing.join(", ")
            )));
        }

        let mut values = [0.0; FEATURE_COUNT];
        for (i, (name, value)) in fields.iter().enumerate() {
            let value = value.unwrap_or_default();
            if !value.is_finite() {
                return Err(AppError::Validation(format!("{} must be a finite number", name)));
            }
            if i >= 3 && !(0.0..=1.0).contains(&value) {
                return Err(AppError::Validation(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
            values[i] = value;
        }

        Ok(Self(values))
    }
}

/// Numeric normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScalingMethod {
    /// Rescale to [0, 1] using the training min and max
    MinMax,
    /// Zero mean, unit (population) variance
    #[default]
    Standard,
}

/// Fitted statistics of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl ColumnStats {
    fn fit(name: &str, values: &[f64]) -> Self {
        let n = values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            name: name.to_string(),
            min,
            max,
            mean,
            std: variance.sqrt(),
        }
    }

    fn scale(&self, method: ScalingMethod, value: f64) -> f64 {
        let (offset, spread) = match method {
            ScalingMethod::MinMax => (self.min, self.max - self.min),
            ScalingMethod::Standard => (self.mean, self.std),
        };
        // A constant column carries no signal; map it to zero.
        if spread == 0.0 {
            0.0
        } else {
            (value - offset) / spread
        }
    }
}

/// Encoding statistics fit once over the training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub method: ScalingMethod,
    pub columns: Vec<ColumnStats>,
}

impl Normalizer {
    /// Fit statistics for the numeric positions of `vectors`
    pub fn fit(method: ScalingMethod, vectors: &[FeatureVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(AppError::Data(
                "Cannot fit normalizer on an empty dataset".to_string(),
            ));
        }

        let columns = NUMERIC_FEATURES
            .iter()
            .map(|&idx| {
                let values: Vec<f64> = vectors.iter().map(|v| v.0[idx]).collect();
                if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                    return Err(AppError::Data(format!(
                        "Row {}: {} is not a finite number",
                        row, FEATURE_NAMES[idx]
                    )));
                }
                Ok(ColumnStats::fit(FEATURE_NAMES[idx], &values))
            })
            .collect::<Result<_>>()?;

        Ok(Self { method, columns })
    }

    /// Rescale the numeric positions, leaving the indicators untouched
    pub fn apply(&self, vector: &FeatureVector) -> FeatureVector {
        let mut values = vector.0;
        for (stats, &idx) in self.columns.iter().zip(NUMERIC_FEATURES.iter()) {
            values[idx] = stats.scale(self.method, values[idx]);
        }
        FeatureVector(values)
    }
}

/// Propagate the previous non-null value of each column into nulls.
/// Leading nulls stay null.
pub fn forward_fill(records: &mut [RawRecord]) {
    let mut last = RawRecord::default();

    for record in records.iter_mut() {
        fill_from(&mut record.customer_id, &mut last.customer_id);
        fill_from(&mut record.policy_type, &mut last.policy_type);
        fill_from(&mut record.age, &mut last.age);
        fill_from(&mut record.annual_premium, &mut last.annual_premium);
        fill_from(&mut record.claims_count, &mut last.claims_count);
        fill_from(&mut record.churn, &mut last.churn);
    }
}

fn fill_from<T: Clone>(field: &mut Option<T>, last: &mut Option<T>) {
    match field {
        Some(value) => *last = Some(value.clone()),
        None => *field = last.clone(),
    }
}

fn require_finite(value: &Option<f64>, row: usize, field: &str) -> Result<f64> {
    let value = require(value, row, field)?;
    if !value.is_finite() {
        return Err(AppError::Data(format!(
            "Row {}: {} must be a finite number, got {}",
            row, field, value
        )));
    }
    Ok(value)
}

fn require<T: Clone>(value: &Option<T>, row: usize, field: &str) -> Result<T> {
    value.clone().ok_or_else(|| AppError::MissingValue {
        row,
        field: field.to_string(),
    })
}

/// Training-time encoder: forward fill, one-hot expansion, normalization
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    scaling: ScalingMethod,
}

impl FeatureEncoder {
    pub fn new(scaling: ScalingMethod) -> Self {
        Self { scaling }
    }

    pub fn scaling(&self) -> ScalingMethod {
        self.scaling
    }

    /// Encode one already forward-filled record without normalization
    pub fn encode(&self, row: usize, record: &RawRecord) -> Result<(String, FeatureVector, usize)> {
        let customer_id = require(&record.customer_id, row, "customer_id")?;
        let policy = PolicyType::parse(&require(&record.policy_type, row, "policy_type")?);
        let age = require_finite(&record.age, row, "age")?;
        let annual_premium = require_finite(&record.annual_premium, row, "annual_premium")?;
        let claims_count = require_finite(&record.claims_count, row, "claims_count")?;
        let churn = require(&record.churn, row, "churn")?;

        let label = match churn {
            c if c == 0.0 => 0,
            c if c == 1.0 => 1,
            other => {
                return Err(AppError::Data(format!(
                    "Row {}: churn must be 0 or 1, got {}",
                    row, other
                )))
            }
        };

        Ok((
            customer_id,
            FeatureVector::from_parts(age, annual_premium, claims_count, policy),
            label,
        ))
    }

    /// Fill, encode, fit statistics over the full set, and normalize
    pub fn fit_transform(
        &self,
        mut records: Vec<RawRecord>,
    ) -> Result<(Vec<ProcessedRecord>, Normalizer)> {
        forward_fill(&mut records);

        let encoded: Vec<(String, FeatureVector, usize)> = records
            .iter()
            .enumerate()
            .map(|(row, record)| self.encode(row, record))
            .collect::<Result<_>>()?;

        let vectors: Vec<FeatureVector> = encoded.iter().map(|(_, v, _)| *v).collect();
        let normalizer = Normalizer::fit(self.scaling, &vectors)?;

        let processed = encoded
            .into_iter()
            .map(|(customer_id, vector, churn)| ProcessedRecord {
                customer_id,
                features: normalizer.apply(&vector).to_vec(),
                churn,
            })
            .collect();

        Ok((processed, normalizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> FeaturesPayload {
        FeaturesPayload {
            age: Some(0.5),
            annual_premium: Some(0.3),
            claims_count: Some(0.1),
            policy_auto: Some(1.0),
            policy_home: Some(0.0),
            policy_life: Some(0.0),
        }
    }

    #[test]
    fn test_one_hot_expansion() {
        let auto = FeatureVector::from_parts(40.0, 1200.0, 1.0, PolicyType::parse("auto"));
        assert_eq!(&auto.as_slice()[3..], &[1.0, 0.0, 0.0]);

        let life = FeatureVector::from_parts(40.0, 1200.0, 1.0, PolicyType::parse(" LIFE "));
        assert_eq!(&life.as_slice()[3..], &[0.0, 0.0, 1.0]);

        let unknown = FeatureVector::from_parts(40.0, 1200.0, 1.0, PolicyType::parse("boat"));
        assert_eq!(&unknown.as_slice()[3..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_payload_keeps_feature_order() {
        let vector = FeatureVector::try_from(&payload()).unwrap();
        assert_eq!(vector.values(), [0.5, 0.3, 0.1, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_payload_missing_fields_are_named() {
        let mut p = payload();
        p.age = None;
        p.policy_life = None;

        let err = FeatureVector::try_from(&p).unwrap_err();
        match err {
            AppError::Validation(msg) => {
                assert!(msg.contains("age"));
                assert!(msg.contains("policy_life"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_payload_rejects_out_of_range_indicator() {
        let mut p = payload();
        p.policy_home = Some(2.0);
        assert!(matches!(
            FeatureVector::try_from(&p),
            Err(AppError::Validation(_))
        ));

        let mut p = payload();
        p.age = Some(f64::NAN);
        assert!(FeatureVector::try_from(&p).is_err());
    }

    #[test]
    fn test_forward_fill() {
        let mut records = vec![
            RawRecord {
                age: None,
                ..RawRecord::new("c1", "auto", 0.0, 100.0, 0.0, 0)
            },
            RawRecord::new("c2", "home", 30.0, 200.0, 1.0, 1),
            RawRecord {
                age: None,
                policy_type: None,
                ..RawRecord::new("c3", "life", 0.0, 300.0, 2.0, 0)
            },
        ];

        forward_fill(&mut records);

        assert_eq!(records[0].age, None);
        assert_eq!(records[2].age, Some(30.0));
        assert_eq!(records[2].policy_type.as_deref(), Some("home"));
        assert_eq!(records[2].annual_premium, Some(300.0));
    }

    #[test]
    fn test_leading_null_fails_encoding() {
        let records = vec![
            RawRecord {
                claims_count: None,
                ..RawRecord::new("c1", "auto", 25.0, 100.0, 0.0, 0)
            },
            RawRecord::new("c2", "home", 30.0, 200.0, 1.0, 1),
        ];

        let err = FeatureEncoder::default().fit_transform(records).unwrap_err();
        match err {
            AppError::MissingValue { row, field } => {
                assert_eq!(row, 0);
                assert_eq!(field, "claims_count");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_min_max_normalization() {
        let records = vec![
            RawRecord::new("c1", "auto", 20.0, 100.0, 0.0, 0),
            RawRecord::new("c2", "home", 40.0, 300.0, 2.0, 1),
            RawRecord::new("c3", "life", 30.0, 200.0, 1.0, 0),
        ];

        let (processed, normalizer) = FeatureEncoder::new(ScalingMethod::MinMax)
            .fit_transform(records)
            .unwrap();

        assert_eq!(normalizer.method, ScalingMethod::MinMax);
        assert_eq!(processed[0].features, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(processed[1].features, vec![1.0, 1.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(processed[2].features, vec![0.5, 0.5, 0.5, 0.0, 0.0, 1.0]);
        assert_eq!(processed[1].churn, 1);
    }

    #[test]
    fn test_standard_normalization() {
        let records = vec![
            RawRecord::new("c1", "auto", 20.0, 100.0, 3.0, 0),
            RawRecord::new("c2", "auto", 40.0, 300.0, 3.0, 1),
        ];

        let (processed, normalizer) = FeatureEncoder::new(ScalingMethod::Standard)
            .fit_transform(records)
            .unwrap();

        assert_eq!(normalizer.columns[0].mean, 30.0);
        assert_eq!(normalizer.columns[0].std, 10.0);
        assert_eq!(processed[0].features[0], -1.0);
        assert_eq!(processed[1].features[0], 1.0);
        // constant column
        assert_eq!(processed[0].features[2], 0.0);
        assert_eq!(processed[1].features[2], 0.0);
    }

    #[test]
    fn test_invalid_label_rejected() {
        let records = vec![RawRecord::new("c1", "auto", 20.0, 100.0, 3.0, 7)];
        assert!(matches!(
            FeatureEncoder::default().fit_transform(records),
            Err(AppError::Data(_))
        ));
    }

    #[test]
    fn test_min_max_constant_column_maps_to_zero() {
        let records = vec![
            RawRecord::new("c1", "auto", 20.0, 500.0, 1.0, 0),
            RawRecord::new("c2", "home", 40.0, 500.0, 3.0, 1),
        ];

        let (processed, normalizer) = FeatureEncoder::new(ScalingMethod::MinMax)
            .fit_transform(records)
            .unwrap();

        assert_eq!(normalizer.columns[1].min, normalizer.columns[1].max);
        assert_eq!(processed[0].features[1], 0.0);
        assert_eq!(processed[1].features[1], 0.0);
        assert_eq!(
            normalizer.apply(&FeatureVector::new([30.0, 900.0, 2.0, 0.0, 0.0, 1.0])).values(),
            [0.5, 0.0, 0.5, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let records = vec![
            RawRecord::new("c1", "auto", 20.0, 100.0, 1.0, 0),
            RawRecord::new("c2", "home", f64::NAN, 200.0, 1.0, 1),
        ];
        match FeatureEncoder::default().fit_transform(records) {
            Err(AppError::Data(msg)) => assert!(msg.contains("age")),
            other => panic!("unexpected result: {other:?}"),
        }

        let vectors = [
            FeatureVector::new([20.0, 100.0, 1.0, 1.0, 0.0, 0.0]),
            FeatureVector::new([30.0, f64::INFINITY, 1.0, 1.0, 0.0, 0.0]),
        ];
        match Normalizer::fit(ScalingMethod::Standard, &vectors) {
            Err(AppError::Data(msg)) => assert!(msg.contains("annual_premium")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_normalizer_requires_rows() {
        assert!(Normalizer::fit(ScalingMethod::MinMax, &[]).is_err());
    }
}
