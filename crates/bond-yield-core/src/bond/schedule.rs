use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bond::inputs::DerivedParameters;
use crate::error::BondYieldError;
use crate::types::{round_display, Money};
use crate::BondYieldResult;

/// One coupon date in the projected schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEntry {
    /// 1-based period index.
    pub period: u32,
    pub payment_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub coupon_payment: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub cumulative_interest: Money,
    /// Face value on the final period, zero before it. No amortization.
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining_principal: Money,
}

/// Build the full coupon schedule anchored at `as_of`.
///
/// Period `i` pays on `as_of + i * months_per_period` calendar months. When
/// the target month is shorter, the day clamps to its last day. The running
/// interest total accumulates the unrounded coupon and is rounded only when
/// each entry is emitted.
pub fn generate_cash_flows(
    params: &DerivedParameters,
    face_value: Money,
    as_of: DateTime<Utc>,
) -> BondYieldResult<Vec<CashFlowEntry>> {
    let coupon_payment = round_display(params.period_coupon);
    let mut cumulative = Decimal::ZERO;
    let mut flows = Vec::with_capacity(params.total_periods as usize);

    for period in 1..=params.total_periods {
        cumulative = cumulative
            .checked_add(params.period_coupon)
            .ok_or_else(|| BondYieldError::NumericalFailure {
                context: format!("cumulative interest overflowed at period {period}"),
            })?;

        let months = period
            .checked_mul(params.months_per_period)
            .ok_or_else(|| BondYieldError::DateError(format!("month offset overflow at period {period}")))?;
        let payment_date = as_of.checked_add_months(Months::new(months)).ok_or_else(|| {
            BondYieldError::DateError(format!(
                "payment date for period {period} ({months} months after {as_of}) is out of range"
            ))
        })?;

        flows.push(CashFlowEntry {
            period,
            payment_date,
            coupon_payment,
            cumulative_interest: round_display(cumulative),
            remaining_principal: if period == params.total_periods {
                face_value
            } else {
                Decimal::ZERO
            },
        });
    }

    Ok(flows)
}
