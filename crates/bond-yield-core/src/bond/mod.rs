//! Fixed-coupon bond valuation: current yield, Newton-Raphson YTM, total
//! interest, premium/discount/par status and the periodic coupon schedule.

pub mod analytics;
pub mod inputs;
pub mod schedule;
pub mod yields;

pub use analytics::{analyze_bond, calculate, BondResult, BondStatus};
pub use inputs::{BondInputs, CouponFrequency, DerivedParameters, SolverConfig};
pub use schedule::CashFlowEntry;
pub use yields::{YtmConvergence, YtmSolution};
