use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use napi::Result as NapiResult;
use napi_derive::napi;

use bond_yield_core::bond::{self, BondInputs};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Accepts an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (UTC midnight).
/// Absent means now.
fn parse_as_of(as_of: Option<String>) -> NapiResult<DateTime<Utc>> {
    let Some(raw) = as_of else {
        return Ok(Utc::now());
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(to_napi_error)?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| to_napi_error(format!("invalid as-of date '{raw}'")))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

// ---------------------------------------------------------------------------
// Bond analytics
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_bond_yield(input_json: String, as_of: Option<String>) -> NapiResult<String> {
    let input: BondInputs = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = bond::analyze_bond(&input, parse_as_of(as_of)?).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn bond_cash_flows(input_json: String, as_of: Option<String>) -> NapiResult<String> {
    let input: BondInputs = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = bond::calculate(&input, parse_as_of(as_of)?).map_err(to_napi_error)?;
    serde_json::to_string(&output.cash_flows).map_err(to_napi_error)
}
