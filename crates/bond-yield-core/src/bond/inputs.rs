use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BondYieldError;
use crate::types::{Money, Rate, Years};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on the annual coupon rate, in percent.
pub const MAX_COUPON_RATE_PCT: Decimal = dec!(20);

/// Default periodic-rate seed for the YTM solve (5% per period).
pub const DEFAULT_INITIAL_GUESS: Rate = dec!(0.05);

/// Default cap on Newton-Raphson passes.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Default absolute price tolerance, in currency units.
pub const DEFAULT_TOLERANCE: Money = dec!(0.0001);

// ---------------------------------------------------------------------------
// Coupon frequency
// ---------------------------------------------------------------------------

/// How often the bond pays its coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CouponFrequency {
    #[serde(rename = "annual")]
    Annual,
    #[serde(rename = "semi-annual", alias = "semiannual", alias = "semi_annual")]
    SemiAnnual,
}

impl CouponFrequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            CouponFrequency::Annual => 1,
            CouponFrequency::SemiAnnual => 2,
        }
    }

    pub fn months_per_period(self) -> u32 {
        12 / self.periods_per_year()
    }
}

impl fmt::Display for CouponFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponFrequency::Annual => write!(f, "annual"),
            CouponFrequency::SemiAnnual => write!(f, "semi-annual"),
        }
    }
}

impl FromStr for CouponFrequency {
    type Err = BondYieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(CouponFrequency::Annual),
            "semi-annual" | "semiannual" | "semi_annual" => Ok(CouponFrequency::SemiAnnual),
            other => Err(BondYieldError::InvalidInput {
                field: "frequency".into(),
                reason: format!("Unrecognized coupon frequency '{other}' (expected 'annual' or 'semi-annual')"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Solver configuration
// ---------------------------------------------------------------------------

/// Newton-Raphson settings for the YTM solve. Every field defaults when
/// omitted from JSON input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverConfig {
    /// Periodic rate the iteration starts from.
    pub initial_guess: Rate,
    /// Maximum number of Newton updates.
    pub max_iterations: u32,
    /// Absolute tolerance on |PV(r) - price|.
    pub tolerance: Money,
    /// Report a non-converged solve as an error instead of an estimate.
    pub strict: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            initial_guess: DEFAULT_INITIAL_GUESS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            strict: false,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> BondYieldResult<()> {
        if self.max_iterations == 0 {
            return Err(BondYieldError::InvalidInput {
                field: "solver.maxIterations".into(),
                reason: "Iteration cap must be at least 1".into(),
            });
        }
        if self.tolerance <= Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "solver.tolerance".into(),
                reason: "Tolerance must be positive".into(),
            });
        }
        if self.initial_guess <= dec!(-1) {
            return Err(BondYieldError::InvalidInput {
                field: "solver.initialGuess".into(),
                reason: "Initial guess must be greater than -100%".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bond inputs
// ---------------------------------------------------------------------------

/// The five user-supplied bond parameters plus optional solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondInputs {
    /// Principal repaid at maturity.
    pub face_value: Money,
    /// Annual coupon rate in percent (5 = 5%).
    pub coupon_rate: Decimal,
    /// Quoted market price.
    pub market_price: Money,
    /// Years remaining until maturity.
    pub years_to_maturity: Years,
    pub frequency: CouponFrequency,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl BondInputs {
    pub fn new(
        face_value: Money,
        coupon_rate: Decimal,
        market_price: Money,
        years_to_maturity: Years,
        frequency: CouponFrequency,
    ) -> Self {
        BondInputs {
            face_value,
            coupon_rate,
            market_price,
            years_to_maturity,
            frequency,
            solver: SolverConfig::default(),
        }
    }

    /// Check every precondition before any computation begins.
    pub fn validate(&self) -> BondYieldResult<()> {
        if self.face_value <= Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "faceValue".into(),
                reason: "Face value must be positive".into(),
            });
        }
        if self.coupon_rate < Decimal::ZERO || self.coupon_rate > MAX_COUPON_RATE_PCT {
            return Err(BondYieldError::InvalidInput {
                field: "couponRate".into(),
                reason: format!("Coupon rate must be between 0 and {MAX_COUPON_RATE_PCT} percent"),
            });
        }
        if self.market_price <= Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "marketPrice".into(),
                reason: "Market price must be positive".into(),
            });
        }
        if self.years_to_maturity <= Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "yearsToMaturity".into(),
                reason: "Years to maturity must be positive".into(),
            });
        }
        self.solver.validate()
    }
}

// ---------------------------------------------------------------------------
// Derived parameters
// ---------------------------------------------------------------------------

/// Per-calculation quantities shared by every metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedParameters {
    pub periods_per_year: u32,
    pub months_per_period: u32,
    pub total_periods: u32,
    pub period_coupon: Money,
    /// True when years x periods-per-year had a fractional part that was dropped.
    pub truncated: bool,
}

impl DerivedParameters {
    pub fn from_inputs(inputs: &BondInputs) -> BondYieldResult<Self> {
        let periods_per_year = inputs.frequency.periods_per_year();
        let ppy = Decimal::from(periods_per_year);

        let raw_periods = inputs.years_to_maturity.checked_mul(ppy).ok_or_else(|| {
            BondYieldError::InvalidInput {
                field: "yearsToMaturity".into(),
                reason: "Years to maturity is too large".into(),
            }
        })?;
        let whole = raw_periods.trunc();
        let total_periods = whole.to_u32().ok_or_else(|| BondYieldError::InvalidInput {
            field: "yearsToMaturity".into(),
            reason: "Period count does not fit in a 32-bit counter".into(),
        })?;
        if total_periods == 0 {
            return Err(BondYieldError::InvalidInput {
                field: "yearsToMaturity".into(),
                reason: format!(
                    "Maturity of {} years is shorter than one {} coupon period",
                    inputs.years_to_maturity, inputs.frequency
                ),
            });
        }

        let period_coupon = inputs.face_value * (inputs.coupon_rate / dec!(100)) / ppy;

        Ok(DerivedParameters {
            periods_per_year,
            months_per_period: inputs.frequency.months_per_period(),
            total_periods,
            period_coupon,
            truncated: whole != raw_periods,
        })
    }
}
