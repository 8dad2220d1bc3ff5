// 4.0: signed orders. an order describes one requested action (open or close),
// carries the exchange-call list the engine must execute verbatim, and is
// authenticated by an ed25519 signature over its canonical digest.
// 4.2 has the validation entry point. validation is pure: no side effects.

use crate::types::{Address, Amount, AssetId, PositionId, Timestamp};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One opaque external call the engine executes to realize an asset
/// conversion. The engine never interprets the payload; it only measures
/// balance deltas around the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCall {
    pub target: Address,
    /// native value attached to the call
    pub value: Amount,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Open,
    Close,
}

impl OrderKind {
    fn tag(&self) -> u8 {
        match self {
            OrderKind::Open => 0,
            OrderKind::Close => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub kind: OrderKind,
    pub id: PositionId,
    pub trader: Address,
    pub principal_asset: AssetId,
    pub collateral_asset: AssetId,
    pub principal: Amount,
    pub down_payment: Amount,
    /// minimum acceptable collateral delta from the exchange calls
    pub min_collateral: Amount,
    pub expires_at: Timestamp,
    pub exchange_calls: Vec<ExchangeCall>,
}

impl Order {
    // 4.1: canonical encoding. fixed field order, fixed widths, length-prefixed
    // variable parts. the signature covers the digest of exactly these bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.push(self.kind.tag());
        buf.extend_from_slice(&self.id.0.to_be_bytes());
        buf.extend_from_slice(self.trader.as_bytes());
        buf.extend_from_slice(&self.principal_asset.0.to_be_bytes());
        buf.extend_from_slice(&self.collateral_asset.0.to_be_bytes());
        buf.extend_from_slice(&self.principal.raw().to_be_bytes());
        buf.extend_from_slice(&self.down_payment.raw().to_be_bytes());
        buf.extend_from_slice(&self.min_collateral.raw().to_be_bytes());
        buf.extend_from_slice(&self.expires_at.0.to_be_bytes());
        buf.extend_from_slice(&(self.exchange_calls.len() as u32).to_be_bytes());
        for call in &self.exchange_calls {
            buf.extend_from_slice(call.target.as_bytes());
            buf.extend_from_slice(&call.value.raw().to_be_bytes());
            buf.extend_from_slice(&(call.payload.len() as u32).to_be_bytes());
            buf.extend_from_slice(&call.payload);
        }
        buf
    }

    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("signature does not verify against the order's trader")]
    InvalidSignature,

    #[error("order expired at {expires_at:?}, now {now:?}")]
    OrderExpired { expires_at: Timestamp, now: Timestamp },
}

/// An order together with the trader's signature over its digest.
#[derive(Debug, Clone)]
pub struct SignedOrder {
    pub order: Order,
    pub signature: Signature,
}

impl SignedOrder {
    /// Sign an order whose `trader` field must be the verifying-key bytes of
    /// `key`. Used by the sim and tests; real orders are signed off-platform.
    pub fn sign(order: Order, key: &SigningKey) -> Self {
        let signature = key.sign(&order.digest());
        Self { order, signature }
    }

    // 4.2: recompute the canonical digest, resolve the stated trader to a
    // verifying key, and check the signature and the expiry. stateless.
    pub fn validate(&self, now: Timestamp) -> Result<(), OrderError> {
        if now > self.order.expires_at {
            return Err(OrderError::OrderExpired {
                expires_at: self.order.expires_at,
                now,
            });
        }

        let key = VerifyingKey::from_bytes(self.order.trader.as_bytes())
            .map_err(|_| OrderError::InvalidSignature)?;
        key.verify_strict(&self.order.digest(), &self.signature)
            .map_err(|_| OrderError::InvalidSignature)
    }
}

/// Address of the account controlled by `key`: its verifying-key bytes.
pub fn address_of(key: &SigningKey) -> Address {
    Address(key.verifying_key().to_bytes())
}
