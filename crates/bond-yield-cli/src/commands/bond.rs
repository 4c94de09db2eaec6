use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use bond_yield_core::bond::{self, BondInputs, CouponFrequency};

use crate::input;

/// Arguments shared by `calculate` and `schedule`
#[derive(Args)]
pub struct BondArgs {
    /// Face (par) value repaid at maturity
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Annual coupon rate in percent (e.g. 5 for 5%), 0 to 20
    #[arg(long)]
    pub coupon_rate: Option<Decimal>,

    /// Market price of the bond
    #[arg(long)]
    pub market_price: Option<Decimal>,

    /// Years remaining until maturity
    #[arg(long)]
    pub years_to_maturity: Option<Decimal>,

    /// Coupon frequency: annual or semi-annual
    #[arg(long)]
    pub frequency: Option<CouponFrequency>,

    /// Schedule anchor date (YYYY-MM-DD); defaults to now
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Fail instead of returning an estimate when YTM does not converge
    #[arg(long)]
    pub strict: bool,

    /// Newton-Raphson iteration cap
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Absolute price tolerance for YTM convergence
    #[arg(long)]
    pub tolerance: Option<Decimal>,

    /// Periodic-rate seed for the YTM solve (e.g. 0.05)
    #[arg(long, allow_hyphen_values = true)]
    pub initial_guess: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides bond flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_calculate(args: BondArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let as_of = resolve_as_of(args.as_of);
    let inputs = build_inputs(&args)?;
    let result = bond::analyze_bond(&inputs, as_of)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_schedule(args: BondArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let as_of = resolve_as_of(args.as_of);
    let inputs = build_inputs(&args)?;
    let result = bond::calculate(&inputs, as_of)?;
    Ok(serde_json::to_value(result.cash_flows)?)
}

fn build_inputs(args: &BondArgs) -> Result<BondInputs, Box<dyn std::error::Error>> {
    let has_flags = args.face_value.is_some()
        || args.coupon_rate.is_some()
        || args.market_price.is_some()
        || args.years_to_maturity.is_some()
        || args.frequency.is_some();

    let mut inputs: BondInputs = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if has_flags {
        BondInputs::new(
            args.face_value
                .ok_or("--face-value is required (or provide --input)")?,
            args.coupon_rate
                .ok_or("--coupon-rate is required (or provide --input)")?,
            args.market_price
                .ok_or("--market-price is required (or provide --input)")?,
            args.years_to_maturity
                .ok_or("--years-to-maturity is required (or provide --input)")?,
            args.frequency
                .ok_or("--frequency is required (or provide --input)")?,
        )
    } else if let Some(piped) = input::stdin::read_stdin()? {
        piped
    } else {
        return Err("bond flags, --input <file> or JSON on stdin required".into());
    };

    if args.strict {
        inputs.solver.strict = true;
    }
    if let Some(n) = args.max_iterations {
        inputs.solver.max_iterations = n;
    }
    if let Some(tol) = args.tolerance {
        inputs.solver.tolerance = tol;
    }
    if let Some(guess) = args.initial_guess {
        inputs.solver.initial_guess = guess;
    }

    debug!(?inputs, "resolved bond inputs");
    Ok(inputs)
}

fn resolve_as_of(date: Option<NaiveDate>) -> DateTime<Utc> {
    match date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(midnight) => Utc.from_utc_datetime(&midnight),
        None => Utc::now(),
    }
}
