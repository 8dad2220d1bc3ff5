// 10.0: every state change produces an event. used for audit trails and for
// notifying indexers. events emitted inside an operation that later fails are
// rolled back together with the rest of the state.

use crate::types::{Address, Amount, AssetId, PositionId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // position lifecycle
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionSettledEvent),
    PositionLiquidated(PositionSettledEvent),

    // vault
    VaultDeposit(VaultDepositEvent),
    VaultWithdrawal(VaultWithdrawalEvent),
    InterestRecorded(InterestRecordedEvent),
    LossRecorded(LossRecordedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub id: PositionId,
    pub trader: Address,
    pub principal_asset: AssetId,
    pub collateral_asset: AssetId,
    pub down_payment: Amount,
    pub principal: Amount,
    pub collateral_amount: Amount,
    pub fees_to_be_paid: Amount,
}

/// Shared by close and liquidation; the payload variant tells them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSettledEvent {
    pub id: PositionId,
    pub trader: Address,
    pub payout: Amount,
    pub principal_repaid: Amount,
    pub interest_paid: Amount,
    pub fee_amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultDepositEvent {
    pub depositor: Address,
    pub receiver: Address,
    pub amount: Amount,
    pub shares: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultWithdrawalEvent {
    pub owner: Address,
    pub receiver: Address,
    pub shares: Amount,
    pub assets: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRecordedEvent {
    pub position_id: PositionId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossRecordedEvent {
    pub position_id: PositionId,
    pub amount: Amount,
}
