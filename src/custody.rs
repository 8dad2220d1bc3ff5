// 5.0 custody.rs: the engine's asset ledger. balances per (owner, asset),
// transfers, and native wrap/unwrap. this models the platform token ledger
// the settlement logic runs against; balances here are the ground truth the
// engine measures around exchange calls.

use crate::types::{Address, Amount, AssetId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("insufficient balance of {asset}: have {available}, need {requested}")]
    InsufficientBalance {
        asset: AssetId,
        available: Amount,
        requested: Amount,
    },

    #[error("native transfer rejected by recipient {0}")]
    TransferRejected(Address),

    #[error("balance overflow for {0}")]
    BalanceOverflow(AssetId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCustody {
    balances: HashMap<(Address, AssetId), Amount>,
    // recipients that refuse incoming native value, mirroring contracts
    // without a payable fallback
    rejecting: HashSet<Address>,
    wrapped_native: AssetId,
}

impl AssetCustody {
    pub fn new(wrapped_native: AssetId) -> Self {
        Self {
            balances: HashMap::new(),
            rejecting: HashSet::new(),
            wrapped_native,
        }
    }

    pub fn wrapped_native(&self) -> AssetId {
        self.wrapped_native
    }

    pub fn balance_of(&self, owner: Address, asset: AssetId) -> Amount {
        self.balances
            .get(&(owner, asset))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Create balance out of thin air. Setup hook for sims and tests; the
    /// engine itself never mints.
    pub fn mint(&mut self, owner: Address, asset: AssetId, amount: Amount) {
        let entry = self.balances.entry((owner, asset)).or_insert(Amount::ZERO);
        *entry = entry
            .checked_add(amount)
            .unwrap_or(Amount::new(u128::MAX));
    }

    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        if asset.is_native() && self.rejecting.contains(&to) {
            return Err(CustodyError::TransferRejected(to));
        }
        self.debit(from, asset, amount)?;
        self.credit(to, asset, amount)?;
        Ok(())
    }

    /// Convert `amount` of the owner's native balance into the wrapped asset.
    pub fn wrap_native(&mut self, owner: Address, amount: Amount) -> Result<(), CustodyError> {
        self.debit(owner, AssetId::NATIVE, amount)?;
        self.credit(owner, self.wrapped_native, amount)?;
        Ok(())
    }

    /// Convert `amount` of the owner's wrapped balance back to native.
    pub fn unwrap_native(&mut self, owner: Address, amount: Amount) -> Result<(), CustodyError> {
        self.debit(owner, self.wrapped_native, amount)?;
        self.credit(owner, AssetId::NATIVE, amount)?;
        Ok(())
    }

    /// Mark an address as refusing incoming native value.
    pub fn set_rejecting(&mut self, addr: Address, rejects: bool) {
        if rejects {
            self.rejecting.insert(addr);
        } else {
            self.rejecting.remove(&addr);
        }
    }

    fn debit(&mut self, owner: Address, asset: AssetId, amount: Amount) -> Result<(), CustodyError> {
        let held = self.balance_of(owner, asset);
        let remaining = held
            .checked_sub(amount)
            .ok_or(CustodyError::InsufficientBalance {
                asset,
                available: held,
                requested: amount,
            })?;
        if remaining.is_zero() {
            self.balances.remove(&(owner, asset));
        } else {
            self.balances.insert((owner, asset), remaining);
        }
        Ok(())
    }

    fn credit(&mut self, owner: Address, asset: AssetId, amount: Amount) -> Result<(), CustodyError> {
        let entry = self.balances.entry((owner, asset)).or_insert(Amount::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or(CustodyError::BalanceOverflow(asset))?;
        Ok(())
    }
}
