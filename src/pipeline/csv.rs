use crate::error::{AppError, Result};
use crate::models::RawRecord;
use polars::prelude::*;
use std::io::Cursor;

/// Columns the raw CSV must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "customer_id",
    "policy_type",
    "age",
    "annual_premium",
    "claims_count",
    "churn",
];

/// Cell text read as missing, matching the usual dataframe null markers
pub const NULL_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn polars_error(e: PolarsError) -> AppError {
    AppError::Data(format!("Failed to parse CSV: {}", e))
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map_err(|_| AppError::Data(format!("CSV is missing column '{}'", name)))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?
        .cast(&DataType::Float64)
        .map_err(polars_error)?;
    // inf and NaN carry no value either; let forward fill replace them
    let values = series
        .f64()
        .map_err(polars_error)?
        .into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect();
    Ok(values)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?.cast(&DataType::Utf8).map_err(polars_error)?;
    let values = series
        .utf8()
        .map_err(polars_error)?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// Parse a raw policy-holder CSV (with header) into typed rows.
///
/// Empty cells and the [`NULL_MARKERS`] become `None`; so do numeric cells
/// that are not a finite number. Extra columns are ignored.
pub fn read_raw_records(bytes: Vec<u8>) -> Result<Vec<RawRecord>> {
    let df = CsvReader::new(Cursor::new(bytes))
        .has_header(true)
        .infer_schema(None)
        .with_null_values(Some(NullValues::AllColumns(
            NULL_MARKERS.iter().map(|m| m.to_string()).collect(),
        )))
        .finish()
        .map_err(polars_error)?;

    tracing::debug!(rows = df.height(), columns = df.width(), "CSV parsed");

    let customer_ids = string_column(&df, "customer_id")?;
    let policy_types = string_column(&df, "policy_type")?;
    let ages = float_column(&df, "age")?;
    let premiums = float_column(&df, "annual_premium")?;
    let claims = float_column(&df, "claims_count")?;
    let churn = float_column(&df, "churn")?;

    let records = (0..df.height())
        .map(|i| RawRecord {
            customer_id: customer_ids[i].clone(),
            policy_type: policy_types[i].clone(),
            age: ages[i],
            annual_premium: premiums[i],
            claims_count: claims[i],
            churn: churn[i],
        })
        .collect();

    Ok(records)
}
