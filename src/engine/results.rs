// 11.1 engine/results.rs: result types and the error taxonomy for engine
// operations. every error aborts and fully reverses the triggering operation;
// there is no partial-success path.

use crate::custody::CustodyError;
use crate::exchange::ExchangeError;
use crate::order::OrderError;
use crate::types::{Address, Amount, PositionId};
use crate::vault::VaultError;

/// What a close or liquidation settled to, after all deductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    /// residual value paid to the trader
    pub payout: Amount,
    pub principal_repaid: Amount,
    pub interest_paid: Amount,
    /// close fee, computed on the residual after principal and interest
    pub fee_amount: Amount,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    // authentication / authorization
    #[error("order: {0}")]
    Order(#[from] OrderError),

    #[error("order kind does not match the requested operation")]
    WrongOrderKind,

    #[error("order does not match the supplied position")]
    OrderPositionMismatch,

    #[error("caller {0} is not an authorized liquidator")]
    UnauthorizedLiquidator(Address),

    // economic limits
    #[error("requested principal {requested} exceeds maximum {maximum}")]
    PrincipalTooHigh { requested: Amount, maximum: Amount },

    #[error("collateral received {received} below minimum {minimum}")]
    InsufficientCollateralReceived { received: Amount, minimum: Amount },

    #[error("liquidation threshold not reached: payout {payout} above {threshold}")]
    LiquidationThresholdNotReached { payout: Amount, threshold: Amount },

    // liquidity
    #[error("insufficient available principal: need {needed}, have {available}")]
    InsufficientAvailablePrincipal { needed: Amount, available: Amount },

    #[error("insufficient settlement liquidity: need {needed}, have {available}")]
    InsufficientSettlementLiquidity { needed: Amount, available: Amount },

    #[error("trade fee {fee} exceeds down payment {down_payment}")]
    FeeExceedsDownPayment { fee: Amount, down_payment: Amount },

    // integrity
    #[error("position {0} does not match its stored commitment")]
    InvalidPosition(PositionId),

    #[error("position {0} is already open")]
    PositionAlreadyOpen(PositionId),

    #[error("at least one exchange call is required to unwind collateral")]
    SwapFunctionNeeded,

    #[error("reentrant engine call rejected")]
    ReentrantCall,

    #[error("arithmetic overflow in settlement math")]
    Overflow,

    // collaborator failures
    #[error("custody: {0}")]
    Custody(#[from] CustodyError),

    #[error("vault: {0}")]
    Vault(#[from] VaultError),

    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),
}
