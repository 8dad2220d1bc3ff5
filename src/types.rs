// 1.0: all the primitives live here. nothing in the engine works without these types.
// addresses, asset ids, amounts, basis points, timestamps. each is a newtype so the
// compiler catches type mixups.

use serde::{Deserialize, Serialize};
use std::fmt;

// 1.1: account identity. for traders this is their ed25519 verifying-key bytes,
// for everything else (fee receiver, swap programs, vault depositors) an opaque key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 8 hex chars are enough to tell addresses apart in logs
        write!(f, "0x{}", &hex::encode(self.0)[..8])
    }
}

// 1.2: asset identifier. AssetId::NATIVE is a sentinel for the platform's native
// currency, which is never held directly by the engine. it must be wrapped first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl AssetId {
    pub const NATIVE: AssetId = AssetId(0);

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "asset-{}", self.0)
        }
    }
}

// 1.3: trader-chosen position identifier. uniqueness is enforced by the commitment map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 1.4: unsigned integer amount with no implicit scaling. all value math in the
// engine runs through this type; there is no negative amount anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn min(self, other: Amount) -> Amount {
        Amount(self.0.min(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.5: the settlement deduction primitive. takes `amount` out of `payout`,
// saturating at zero: returns (remaining payout, actually deducted) where
// actually_deducted = min(payout, amount).
pub fn deduct(payout: Amount, amount: Amount) -> (Amount, Amount) {
    let taken = payout.min(amount);
    (payout.saturating_sub(taken), taken)
}

// 1.6: basis points. 100 bps = 1%. apply() floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(pub u32);

impl Bps {
    pub fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    // exact floor of amount * bps / 10_000 without intermediate overflow
    pub fn apply(&self, amount: Amount) -> Amount {
        let r = amount.raw();
        let b = self.0 as u128;
        Amount::new(r / 10_000 * b + r % 10_000 * b / 10_000)
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

// 1.7: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    // whole hours elapsed since `self`, zero if `other` is earlier
    pub fn elapsed_hours(&self, other: &Timestamp) -> u64 {
        let diff_ms = (other.0 - self.0).max(0);
        (diff_ms / 3_600_000) as u64
    }
}
