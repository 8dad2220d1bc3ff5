// 7.0 risk.rs: risk oracle collaborator. sizes the maximum borrowable
// principal against a net down payment, and caps the interest a position can
// accrue over its lifetime. callers can never push interest above this cap.

use crate::types::{Amount, AssetId, Bps, Timestamp};
use serde::{Deserialize, Serialize};

pub trait RiskOracle {
    /// Maximum principal that may be borrowed against `down_payment`
    /// (net of the open fee) for the given pair.
    fn max_principal(
        &self,
        collateral_asset: AssetId,
        principal_asset: AssetId,
        down_payment: Amount,
    ) -> Amount;

    /// Maximum interest accrued on `principal` between `opened_at` and `now`.
    fn max_interest(
        &self,
        collateral_asset: AssetId,
        principal: Amount,
        opened_at: Timestamp,
        now: Timestamp,
    ) -> Amount;
}

/// Reference oracle: a flat leverage cap and a flat hourly interest rate,
/// pair-independent. 40_000 bps leverage sizes 380 of principal against a
/// 95 net down payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageRiskOracle {
    pub max_leverage: Bps,
    pub hourly_interest: Bps,
}

impl LeverageRiskOracle {
    pub fn new(max_leverage: Bps, hourly_interest: Bps) -> Self {
        Self {
            max_leverage,
            hourly_interest,
        }
    }
}

impl RiskOracle for LeverageRiskOracle {
    fn max_principal(
        &self,
        _collateral_asset: AssetId,
        _principal_asset: AssetId,
        down_payment: Amount,
    ) -> Amount {
        self.max_leverage.apply(down_payment)
    }

    fn max_interest(
        &self,
        _collateral_asset: AssetId,
        principal: Amount,
        opened_at: Timestamp,
        now: Timestamp,
    ) -> Amount {
        let per_hour = self.hourly_interest.apply(principal);
        let hours = opened_at.elapsed_hours(&now) as u128;
        Amount::new(per_hour.raw().saturating_mul(hours))
    }
}
