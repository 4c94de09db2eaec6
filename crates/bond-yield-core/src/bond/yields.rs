use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bond::inputs::{DerivedParameters, SolverConfig};
use crate::error::BondYieldError;
use crate::types::{Money, Rate};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Whether the returned YTM satisfied the price tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum YtmConvergence {
    /// |PV(r) - price| fell below tolerance after `iterations` Newton updates.
    Converged { iterations: u32 },
    /// Iteration cap reached; the rate is a best-effort estimate.
    Estimate {
        iterations: u32,
        #[serde(with = "rust_decimal::serde::float")]
        residual: Money,
    },
}

impl YtmConvergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, YtmConvergence::Converged { .. })
    }

    pub fn iterations(&self) -> u32 {
        match self {
            YtmConvergence::Converged { iterations } => *iterations,
            YtmConvergence::Estimate { iterations, .. } => *iterations,
        }
    }
}

/// Periodic yield solved from the pricing equation.
#[derive(Debug, Clone, PartialEq)]
pub struct YtmSolution {
    /// Rate per coupon period (not annualized).
    pub periodic_rate: Rate,
    pub convergence: YtmConvergence,
}

impl YtmSolution {
    /// Nominal annual yield in percent: periodic rate x periods per year x 100.
    pub fn annualized_pct(&self, periods_per_year: u32) -> BondYieldResult<Decimal> {
        self.periodic_rate
            .checked_mul(Decimal::from(periods_per_year))
            .and_then(|annual| annual.checked_mul(dec!(100)))
            .ok_or_else(|| BondYieldError::NumericalFailure {
                context: format!("annualized yield overflowed for periodic rate {}", self.periodic_rate),
            })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Current yield in percent: annual coupon income over market price.
pub fn current_yield_pct(
    face_value: Money,
    coupon_rate_pct: Decimal,
    market_price: Money,
) -> BondYieldResult<Decimal> {
    (coupon_rate_pct / dec!(100))
        .checked_mul(face_value)
        .and_then(|income| income.checked_div(market_price))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .ok_or_else(|| BondYieldError::NumericalFailure {
            context: format!("current yield overflowed for face {face_value} at price {market_price}"),
        })
}

/// Price of the bond at periodic rate `r`, and its derivative dPV/dr.
///
/// Each flow is weighted by v^t with v = 1/(1+r), built up by repeated
/// multiplication. At high rates v^t shrinks towards zero, so only rates
/// close to -100% can leave the representable range.
pub fn present_value(
    params: &DerivedParameters,
    face_value: Money,
    r: Rate,
) -> BondYieldResult<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE
        .checked_add(r)
        .ok_or_else(|| BondYieldError::NumericalFailure {
            context: format!("periodic rate {r} is out of range"),
        })?;
    if one_plus_r <= Decimal::ZERO {
        return Err(BondYieldError::NumericalFailure {
            context: format!("periodic rate {r} is at or below -100%"),
        });
    }
    let v = Decimal::ONE
        .checked_div(one_plus_r)
        .ok_or_else(|| overflow(r, 1))?;

    let mut pv = Decimal::ZERO;
    let mut dpv = Decimal::ZERO;
    let mut v_t = Decimal::ONE;

    for t in 1..=params.total_periods {
        v_t = v_t.checked_mul(v).ok_or_else(|| overflow(r, t))?;
        let amount = if t == params.total_periods {
            params
                .period_coupon
                .checked_add(face_value)
                .ok_or_else(|| overflow(r, t))?
        } else {
            params.period_coupon
        };
        accumulate(&mut pv, &mut dpv, amount, t, v_t, v).ok_or_else(|| overflow(r, t))?;
    }

    Ok((pv, dpv))
}

/// Solve for the periodic rate whose present value equals `market_price`
/// using Newton-Raphson.
///
/// When the iteration cap is reached the last rate is returned tagged as an
/// estimate, unless `config.strict` is set, in which case the solve fails.
pub fn solve_ytm(
    params: &DerivedParameters,
    face_value: Money,
    market_price: Money,
    config: &SolverConfig,
) -> BondYieldResult<YtmSolution> {
    let mut r = config.initial_guess;

    for iteration in 0..config.max_iterations {
        let (pv, dpv) = present_value(params, face_value, r)?;
        let residual = price_residual(pv, market_price)?;

        if residual.abs() < config.tolerance {
            debug!(iterations = iteration, rate = %r, "YTM converged");
            return Ok(YtmSolution {
                periodic_rate: r,
                convergence: YtmConvergence::Converged { iterations: iteration },
            });
        }

        r = newton_step(r, residual, dpv)?;
    }

    // Judge the rate actually returned, not the one before the last update.
    let (pv, _) = present_value(params, face_value, r)?;
    let residual = price_residual(pv, market_price)?;
    let iterations = config.max_iterations;

    if residual.abs() < config.tolerance {
        debug!(iterations, rate = %r, "YTM converged on final update");
        return Ok(YtmSolution {
            periodic_rate: r,
            convergence: YtmConvergence::Converged { iterations },
        });
    }

    if config.strict {
        return Err(BondYieldError::ConvergenceFailure {
            function: "YTM Newton-Raphson".into(),
            iterations,
            last_delta: residual,
        });
    }

    warn!(iterations, rate = %r, residual = %residual, "YTM did not converge; returning estimate");
    Ok(YtmSolution {
        periodic_rate: r,
        convergence: YtmConvergence::Estimate { iterations, residual },
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Adds `amount * v^t` to the price and `-t * amount * v^(t+1)` to the slope.
fn accumulate(
    pv: &mut Decimal,
    dpv: &mut Decimal,
    amount: Money,
    t: u32,
    v_t: Decimal,
    v: Decimal,
) -> Option<()> {
    let discounted = amount.checked_mul(v_t)?;
    let slope = discounted.checked_mul(v)?.checked_mul(Decimal::from(t))?;
    *pv = pv.checked_add(discounted)?;
    *dpv = dpv.checked_sub(slope)?;
    Some(())
}

fn price_residual(pv: Money, market_price: Money) -> BondYieldResult<Money> {
    pv.checked_sub(market_price)
        .ok_or_else(|| BondYieldError::NumericalFailure {
            context: format!("price residual overflowed (PV {pv}, price {market_price})"),
        })
}

/// r_{n+1} = r_n - f(r_n) / f'(r_n), refusing a zero derivative.
fn newton_step(r: Rate, residual: Money, derivative: Decimal) -> BondYieldResult<Rate> {
    if derivative.is_zero() {
        return Err(BondYieldError::NumericalFailure {
            context: format!("YTM derivative is zero at periodic rate {r}"),
        });
    }
    let step = residual
        .checked_div(derivative)
        .ok_or_else(|| BondYieldError::NumericalFailure {
            context: format!("Newton step overflowed at periodic rate {r}"),
        })?;
    r.checked_sub(step).ok_or_else(|| BondYieldError::NumericalFailure {
        context: format!("Newton update overflowed at periodic rate {r}"),
    })
}

fn overflow(r: Rate, period: u32) -> BondYieldError {
    BondYieldError::NumericalFailure {
        context: format!("discounted cash flow overflowed at period {period} for periodic rate {r}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::inputs::{BondInputs, CouponFrequency};
    use rust_decimal_macros::dec;

    fn params_for(
        coupon_pct: Decimal,
        years: Decimal,
        frequency: CouponFrequency,
    ) -> (BondInputs, DerivedParameters) {
        let inputs = BondInputs::new(dec!(1000), coupon_pct, dec!(1000), years, frequency);
        let params = DerivedParameters::from_inputs(&inputs).unwrap();
        (inputs, params)
    }

    #[test]
    fn test_current_yield() {
        // 50 / 950 * 100 = 5.263...
        let cy = current_yield_pct(dec!(1000), dec!(5), dec!(950)).unwrap();
        assert!((cy - dec!(5.2631578947)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_present_value_at_coupon_rate_is_par() {
        let (_, params) = params_for(dec!(5), dec!(5), CouponFrequency::Annual);
        let (pv, dpv) = present_value(&params, dec!(1000), dec!(0.05)).unwrap();
        assert!((pv - dec!(1000)).abs() < dec!(0.0000001), "PV at coupon rate {pv}");
        assert!(dpv < Decimal::ZERO);
    }

    #[test]
    fn test_present_value_zero_rate_is_undiscounted_sum() {
        let (_, params) = params_for(dec!(5), dec!(5), CouponFrequency::Annual);
        let (pv, _) = present_value(&params, dec!(1000), Decimal::ZERO).unwrap();
        assert_eq!(pv, dec!(1250));
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let (_, params) = params_for(dec!(6), dec!(10), CouponFrequency::SemiAnnual);
        let r = dec!(0.03);
        let h = dec!(0.000001);
        let (_, dpv) = present_value(&params, dec!(1000), r).unwrap();
        let (up, _) = present_value(&params, dec!(1000), r + h).unwrap();
        let (down, _) = present_value(&params, dec!(1000), r - h).unwrap();
        let fd = (up - down) / (dec!(2) * h);
        assert!((fd - dpv).abs() < dec!(0.01), "analytic {dpv} vs numeric {fd}");
    }

    #[test]
    fn test_present_value_rejects_rate_at_minus_one() {
        let (_, params) = params_for(dec!(5), dec!(5), CouponFrequency::Annual);
        assert!(matches!(
            present_value(&params, dec!(1000), dec!(-1)),
            Err(BondYieldError::NumericalFailure { .. })
        ));
    }

    #[test]
    fn test_present_value_at_huge_rate_discounts_to_zero() {
        let (_, params) = params_for(dec!(5), dec!(30), CouponFrequency::SemiAnnual);
        let (pv, dpv) = present_value(&params, dec!(1000), dec!(1000000)).unwrap();
        // Only the first coupon survives: 25 / 1000001
        assert!(pv > Decimal::ZERO && pv < dec!(0.0001), "PV {pv}");
        assert!(dpv <= Decimal::ZERO);
    }

    #[test]
    fn test_present_value_overflow_near_minus_one() {
        // v = 1e7, so v^60 is far beyond the representable range
        let (_, params) = params_for(dec!(5), dec!(30), CouponFrequency::SemiAnnual);
        assert!(matches!(
            present_value(&params, dec!(1000), dec!(-0.9999999)),
            Err(BondYieldError::NumericalFailure { .. })
        ));
    }

    #[test]
    fn test_current_yield_overflow_is_numerical_failure() {
        assert!(matches!(
            current_yield_pct(dec!(10000000000), dec!(20), dec!(0.00000000000000000001)),
            Err(BondYieldError::NumericalFailure { .. })
        ));
    }

    #[test]
    fn test_solve_par_bond_converges_immediately() {
        let (inputs, params) = params_for(dec!(5), dec!(5), CouponFrequency::Annual);
        let sol = solve_ytm(&params, dec!(1000), dec!(1000), &inputs.solver).unwrap();
        assert_eq!(sol.convergence, YtmConvergence::Converged { iterations: 0 });
        assert_eq!(sol.annualized_pct(1).unwrap(), dec!(5.00));
    }

    #[test]
    fn test_solve_semi_annual_par_bond() {
        let (inputs, params) = params_for(dec!(5), dec!(10), CouponFrequency::SemiAnnual);
        let sol = solve_ytm(&params, dec!(1000), dec!(1000), &inputs.solver).unwrap();
        assert!(sol.convergence.is_converged());
        assert!((sol.periodic_rate - dec!(0.025)).abs() < dec!(0.000001));
        assert!((sol.annualized_pct(2).unwrap() - dec!(5)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_solve_discount_bond_reprices() {
        let (inputs, params) = params_for(dec!(5), dec!(10), CouponFrequency::SemiAnnual);
        let sol = solve_ytm(&params, dec!(1000), dec!(950), &inputs.solver).unwrap();
        assert!(sol.convergence.is_converged());
        let (pv, _) = present_value(&params, dec!(1000), sol.periodic_rate).unwrap();
        assert!((pv - dec!(950)).abs() < dec!(0.0001));
        // Roughly 5.66% nominal annual
        let ytm = sol.annualized_pct(2).unwrap();
        assert!(ytm > dec!(5.6) && ytm < dec!(5.7), "YTM {ytm}");
    }

    #[test]
    fn test_zero_coupon_bond_closed_form() {
        // Zero coupon: (1000/800)^(1/5) - 1 = 4.5640%
        let (inputs, params) = params_for(dec!(0), dec!(5), CouponFrequency::Annual);
        let sol = solve_ytm(&params, dec!(1000), dec!(800), &inputs.solver).unwrap();
        assert!((sol.periodic_rate - dec!(0.045640)).abs() < dec!(0.00001));
    }

    #[test]
    fn test_iteration_cap_returns_estimate() {
        let (mut inputs, params) = params_for(dec!(5), dec!(10), CouponFrequency::SemiAnnual);
        inputs.solver.max_iterations = 1;
        let sol = solve_ytm(&params, dec!(1000), dec!(950), &inputs.solver).unwrap();
        match sol.convergence {
            YtmConvergence::Estimate { iterations, residual } => {
                assert_eq!(iterations, 1);
                assert!(residual.abs() >= inputs.solver.tolerance);
            }
            other => panic!("expected estimate, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_mode_reports_convergence_failure() {
        let (mut inputs, params) = params_for(dec!(5), dec!(10), CouponFrequency::SemiAnnual);
        inputs.solver.max_iterations = 1;
        inputs.solver.strict = true;
        let err = solve_ytm(&params, dec!(1000), dec!(950), &inputs.solver).unwrap_err();
        assert!(matches!(
            err,
            BondYieldError::ConvergenceFailure { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_huge_seed_fails_loudly() {
        let (mut inputs, params) = params_for(dec!(5), dec!(30), CouponFrequency::SemiAnnual);
        inputs.solver.initial_guess = dec!(1000000);
        assert!(matches!(
            solve_ytm(&params, dec!(1000), dec!(950), &inputs.solver),
            Err(BondYieldError::NumericalFailure { .. })
        ));
    }

    #[test]
    fn test_deep_discount_bond_converges() {
        // 20% semi-annual coupon priced at 4% of face: periodic yield near 2.5
        let inputs = BondInputs::new(dec!(1000), dec!(20), dec!(40), dec!(30), CouponFrequency::SemiAnnual);
        let params = DerivedParameters::from_inputs(&inputs).unwrap();
        let sol = solve_ytm(&params, dec!(1000), dec!(40), &inputs.solver).unwrap();
        assert!(sol.convergence.is_converged(), "{:?}", sol.convergence);
        assert!(sol.periodic_rate > dec!(2), "periodic rate {}", sol.periodic_rate);
        let (pv, _) = present_value(&params, dec!(1000), sol.periodic_rate).unwrap();
        assert!((pv - dec!(40)).abs() < inputs.solver.tolerance, "PV {pv}");
    }

    #[test]
    fn test_newton_step_zero_derivative() {
        assert!(matches!(
            newton_step(dec!(0.05), dec!(-10), Decimal::ZERO),
            Err(BondYieldError::NumericalFailure { .. })
        ));
        assert_eq!(newton_step(dec!(0.05), dec!(-10), dec!(-1000)).unwrap(), dec!(0.04));
    }

    #[test]
    fn test_convergence_serializes_tagged() {
        let json = serde_json::to_value(YtmConvergence::Converged { iterations: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "converged", "iterations": 4}));
    }
}
