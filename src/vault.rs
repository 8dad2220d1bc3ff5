// 9.0 vault.rs: share-based lender pool. depositors fund the principal the
// engine lends out; shares appreciate as interest is credited and absorb
// losses when a close comes back short. the vault never holds tradeable
// assets itself: deposits are forwarded to the paired engine, and
// total_asset_value is the authoritative figure, not any physical balance.

use crate::custody::{AssetCustody, CustodyError};
use crate::types::{Address, Amount, AssetId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("caller {0} is not the paired engine")]
    UnauthorizedCaller(Address),

    #[error("insufficient shares: have {available}, need {requested}")]
    InsufficientShares { available: Amount, requested: Amount },

    #[error("insufficient allowance: have {available}, need {requested}")]
    InsufficientAllowance { available: Amount, requested: Amount },

    #[error("loss {loss} exceeds recorded asset value {available}")]
    LossExceedsAssets { loss: Amount, available: Amount },

    #[error("native deposits require a wrapped-native vault asset")]
    NotWrappedNative,

    #[error("share math overflow")]
    Overflow,

    #[error("custody: {0}")]
    Custody(#[from] CustodyError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultLedger {
    asset: AssetId,
    /// the only address allowed to record interest and losses
    engine: Address,
    total_asset_value: Amount,
    total_shares: Amount,
    holdings: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
}

impl VaultLedger {
    pub fn new(asset: AssetId, engine: Address) -> Self {
        Self {
            asset,
            engine,
            total_asset_value: Amount::ZERO,
            total_shares: Amount::ZERO,
            holdings: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    /// The tracked value figure is authoritative. Assets live with the
    /// engine, so a literal balance check would always read zero here.
    pub fn total_assets(&self) -> Amount {
        self.total_asset_value
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    pub fn shares_of(&self, holder: Address) -> Amount {
        self.holdings.get(&holder).copied().unwrap_or(Amount::ZERO)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    // 9.1: conversion at the current value/share ratio, 1:1 on an empty pool
    pub fn convert_to_shares(&self, assets: Amount) -> Result<Amount, VaultError> {
        if self.total_shares.is_zero() || self.total_asset_value.is_zero() {
            return Ok(assets);
        }
        assets
            .raw()
            .checked_mul(self.total_shares.raw())
            .map(|x| Amount::new(x / self.total_asset_value.raw()))
            .ok_or(VaultError::Overflow)
    }

    pub fn convert_to_assets(&self, shares: Amount) -> Result<Amount, VaultError> {
        if self.total_shares.is_zero() {
            return Ok(Amount::ZERO);
        }
        shares
            .raw()
            .checked_mul(self.total_asset_value.raw())
            .map(|x| Amount::new(x / self.total_shares.raw()))
            .ok_or(VaultError::Overflow)
    }

    // 9.2: pull the vault asset from the depositor, forward it to the paired
    // engine, mint shares to the receiver.
    pub fn deposit(
        &mut self,
        custody: &mut AssetCustody,
        depositor: Address,
        amount: Amount,
        receiver: Address,
    ) -> Result<Amount, VaultError> {
        if amount.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        let shares = self.convert_to_shares(amount)?;

        custody.transfer(depositor, self.engine, self.asset, amount)?;

        self.mint_shares(receiver, shares)?;
        self.total_asset_value = self
            .total_asset_value
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        Ok(shares)
    }

    /// Native-currency deposit entry point. Only valid when the vault's asset
    /// is the wrapped-native asset; the funds are wrapped in place and then
    /// forwarded like a regular deposit.
    pub fn deposit_native(
        &mut self,
        custody: &mut AssetCustody,
        depositor: Address,
        amount: Amount,
        receiver: Address,
    ) -> Result<Amount, VaultError> {
        if amount.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        if self.asset != custody.wrapped_native() {
            return Err(VaultError::NotWrappedNative);
        }
        custody.wrap_native(depositor, amount)?;
        self.deposit(custody, depositor, amount, receiver)
    }

    // 9.3: burn shares (spending allowance when caller != owner) and have the
    // engine pay the assets out. fails when the engine cannot source the
    // liquidity, since live positions may have it deployed.
    pub fn withdraw(
        &mut self,
        custody: &mut AssetCustody,
        caller: Address,
        owner: Address,
        shares: Amount,
        receiver: Address,
    ) -> Result<Amount, VaultError> {
        if shares.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        if caller != owner {
            let allowed = self.allowance(owner, caller);
            let remaining =
                allowed
                    .checked_sub(shares)
                    .ok_or(VaultError::InsufficientAllowance {
                        available: allowed,
                        requested: shares,
                    })?;
            self.approve(owner, caller, remaining);
        }

        let assets = self.convert_to_assets(shares)?;
        self.burn_shares(owner, shares)?;

        custody.transfer(self.engine, receiver, self.asset, assets)?;

        self.total_asset_value = self.total_asset_value.saturating_sub(assets);
        Ok(assets)
    }

    // 9.4: engine-only hooks. interest grows the pool, losses shrink it, and
    // a loss larger than the recorded value is an invariant violation that
    // must fail the enclosing operation rather than saturate.
    pub fn record_interest_earned(
        &mut self,
        caller: Address,
        amount: Amount,
    ) -> Result<(), VaultError> {
        if caller != self.engine {
            return Err(VaultError::UnauthorizedCaller(caller));
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.total_asset_value = self
            .total_asset_value
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        Ok(())
    }

    pub fn record_loss(&mut self, caller: Address, amount: Amount) -> Result<(), VaultError> {
        if caller != self.engine {
            return Err(VaultError::UnauthorizedCaller(caller));
        }
        self.total_asset_value =
            self.total_asset_value
                .checked_sub(amount)
                .ok_or(VaultError::LossExceedsAssets {
                    loss: amount,
                    available: self.total_asset_value,
                })?;
        Ok(())
    }

    fn mint_shares(&mut self, receiver: Address, shares: Amount) -> Result<(), VaultError> {
        self.total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        let entry = self.holdings.entry(receiver).or_insert(Amount::ZERO);
        *entry = entry.checked_add(shares).ok_or(VaultError::Overflow)?;
        Ok(())
    }

    fn burn_shares(&mut self, owner: Address, shares: Amount) -> Result<(), VaultError> {
        let held = self.shares_of(owner);
        let remaining = held
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientShares {
                available: held,
                requested: shares,
            })?;
        if remaining.is_zero() {
            self.holdings.remove(&owner);
        } else {
            self.holdings.insert(owner, remaining);
        }
        self.total_shares = self.total_shares.saturating_sub(shares);
        Ok(())
    }
}
