// 3.0: the position record. one leveraged trade: borrowed principal plus the
// trader's down payment, converted into collateral, open until closed or
// liquidated. only the commitment digest of this struct is persisted; the
// struct itself is replayed by the caller on close and revalidated.

use crate::commitment::Commitment;
use crate::types::{Address, Amount, AssetId, PositionId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub trader: Address,
    /// asset the principal was borrowed in. AssetId::NATIVE means the position
    /// settles in native currency (held as the wrapped asset while open).
    pub principal_asset: AssetId,
    pub collateral_asset: AssetId,
    pub opened_at: Timestamp,
    pub down_payment: Amount,
    pub principal: Amount,
    /// measured collateral delta at open, not a declared figure
    pub collateral_amount: Amount,
    /// open fee withheld from the down payment, paid out at close
    pub fees_to_be_paid: Amount,
}

impl Position {
    // 3.1: canonical encoding. every field in fixed order, fixed width.
    // changing any field changes the commitment, which is the whole point.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 8 + 4 + 4 + 8 + 16 * 4);
        buf.extend_from_slice(&self.id.0.to_be_bytes());
        buf.extend_from_slice(self.trader.as_bytes());
        buf.extend_from_slice(&self.principal_asset.0.to_be_bytes());
        buf.extend_from_slice(&self.collateral_asset.0.to_be_bytes());
        buf.extend_from_slice(&self.opened_at.0.to_be_bytes());
        buf.extend_from_slice(&self.down_payment.raw().to_be_bytes());
        buf.extend_from_slice(&self.principal.raw().to_be_bytes());
        buf.extend_from_slice(&self.collateral_amount.raw().to_be_bytes());
        buf.extend_from_slice(&self.fees_to_be_paid.raw().to_be_bytes());
        buf
    }

    pub fn commitment(&self) -> Commitment {
        Commitment::digest(&self.canonical_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_position() -> Position {
        Position {
            id: PositionId(1),
            trader: Address([7u8; 32]),
            principal_asset: AssetId(2),
            collateral_asset: AssetId(3),
            opened_at: Timestamp::from_millis(1_000),
            down_payment: Amount::new(100),
            principal: Amount::new(300),
            collateral_amount: Amount::new(395),
            fees_to_be_paid: Amount::new(5),
        }
    }

    #[test]
    fn commitment_is_stable() {
        let pos = test_position();
        assert_eq!(pos.commitment(), pos.commitment());
        assert_eq!(pos.commitment(), pos.clone().commitment());
    }

    #[test]
    fn tampering_any_field_changes_commitment() {
        let base = test_position();
        let reference = base.commitment();

        let mut tampered = base.clone();
        tampered.principal = Amount::new(301);
        assert_ne!(tampered.commitment(), reference);

        let mut tampered = base.clone();
        tampered.trader = Address([8u8; 32]);
        assert_ne!(tampered.commitment(), reference);

        let mut tampered = base.clone();
        tampered.opened_at = Timestamp::from_millis(1_001);
        assert_ne!(tampered.commitment(), reference);

        let mut tampered = base;
        tampered.fees_to_be_paid = Amount::ZERO;
        assert_ne!(tampered.commitment(), reference);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        // moving value between adjacent fields must not preserve the digest
        let mut a = test_position();
        a.down_payment = Amount::new(100);
        a.principal = Amount::new(300);

        let mut b = test_position();
        b.down_payment = Amount::new(300);
        b.principal = Amount::new(100);

        assert_ne!(a.commitment(), b.commitment());
    }
}
