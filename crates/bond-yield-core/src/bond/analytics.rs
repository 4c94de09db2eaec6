use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;

use crate::bond::inputs::{BondInputs, DerivedParameters};
use crate::bond::schedule::{generate_cash_flows, CashFlowEntry};
use crate::bond::yields::{current_yield_pct, solve_ytm, YtmConvergence};
use crate::error::BondYieldError;
use crate::types::{round_display, with_metadata, ComputationOutput, Money, Years};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Market price relative to face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondStatus {
    Premium,
    Discount,
    Par,
}

impl fmt::Display for BondStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BondStatus::Premium => write!(f, "premium"),
            BondStatus::Discount => write!(f, "discount"),
            BondStatus::Par => write!(f, "par"),
        }
    }
}

/// Full analytics for one bond. Yields are percentages rounded to 2 dp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondResult {
    #[serde(with = "rust_decimal::serde::float")]
    pub current_yield: Decimal,
    /// Nominal annual yield (periodic rate x periods per year), not effective.
    #[serde(with = "rust_decimal::serde::float")]
    pub yield_to_maturity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_interest: Money,
    pub status: BondStatus,
    pub cash_flows: Vec<CashFlowEntry>,
    pub ytm_convergence: YtmConvergence,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute current yield, YTM, total interest, status and the coupon
/// schedule for a fixed-coupon bond, anchoring payment dates at `as_of`.
///
/// Deterministic: identical inputs and `as_of` give identical results.
pub fn calculate(inputs: &BondInputs, as_of: DateTime<Utc>) -> BondYieldResult<BondResult> {
    evaluate(inputs, as_of).map(|(result, _)| result)
}

/// `calculate` wrapped in the standard computation envelope with
/// methodology, assumptions, warnings and timing metadata.
pub fn analyze_bond(
    inputs: &BondInputs,
    as_of: DateTime<Utc>,
) -> BondYieldResult<ComputationOutput<BondResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let (result, params) = evaluate(inputs, as_of)?;

    if params.truncated {
        warnings.push(format!(
            "{} years at {} frequency is not a whole number of periods; schedule truncated to {} periods",
            inputs.years_to_maturity, inputs.frequency, params.total_periods
        ));
    }
    if inputs.coupon_rate.is_zero() {
        warnings.push("Zero coupon rate: schedule carries principal only".into());
    }
    if let YtmConvergence::Estimate { iterations, residual } = &result.ytm_convergence {
        warnings.push(format!(
            "YTM did not converge within {iterations} iterations (price residual {residual}); value is an estimate"
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "ytm_method": "Newton-Raphson",
        "initial_guess": inputs.solver.initial_guess.to_string(),
        "max_iterations": inputs.solver.max_iterations,
        "tolerance": inputs.solver.tolerance.to_string(),
        "compounding": "nominal annual, periodic rate x periods per year",
        "rounding": "2 dp, midpoint away from zero",
        "as_of": as_of.to_rfc3339(),
    });

    Ok(with_metadata(
        "Fixed-coupon bond yield analysis",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}

/// Total coupon income over the life of the bond (closed form).
pub fn total_interest(
    face_value: Money,
    coupon_rate_pct: Decimal,
    years_to_maturity: Years,
) -> BondYieldResult<Money> {
    (coupon_rate_pct / dec!(100))
        .checked_mul(face_value)
        .and_then(|annual| annual.checked_mul(years_to_maturity))
        .ok_or_else(|| BondYieldError::NumericalFailure {
            context: format!(
                "total interest overflowed for face {face_value} over {years_to_maturity} years"
            ),
        })
}

/// Exact comparison of price against face; no tolerance band.
pub fn classify(face_value: Money, market_price: Money) -> BondStatus {
    if market_price > face_value {
        BondStatus::Premium
    } else if market_price < face_value {
        BondStatus::Discount
    } else {
        BondStatus::Par
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Shared body of `calculate` and `analyze_bond`; also hands back the
/// derived schedule parameters so the envelope can report on them.
fn evaluate(
    inputs: &BondInputs,
    as_of: DateTime<Utc>,
) -> BondYieldResult<(BondResult, DerivedParameters)> {
    inputs.validate()?;
    let params = DerivedParameters::from_inputs(inputs)?;

    let current_yield = current_yield_pct(inputs.face_value, inputs.coupon_rate, inputs.market_price)?;
    let solution = solve_ytm(&params, inputs.face_value, inputs.market_price, &inputs.solver)?;
    let yield_to_maturity = solution.annualized_pct(params.periods_per_year)?;
    let total_interest = total_interest(inputs.face_value, inputs.coupon_rate, inputs.years_to_maturity)?;
    let status = classify(inputs.face_value, inputs.market_price);
    let cash_flows = generate_cash_flows(&params, inputs.face_value, as_of)?;

    debug!(
        periods = params.total_periods,
        status = %status,
        "bond analytics computed"
    );

    let result = BondResult {
        current_yield: round_display(current_yield),
        yield_to_maturity: round_display(yield_to_maturity),
        total_interest: round_display(total_interest),
        status,
        cash_flows,
        ytm_convergence: solution.convergence,
    };
    Ok((result, params))
}
