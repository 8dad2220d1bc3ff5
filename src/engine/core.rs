// 11.2 engine/core.rs: main engine. owns the custody ledger, the paired
// vault, the position commitment map, and the audit log. collaborators (fee
// policy, risk oracle, exchange router) are trait objects injected at
// construction; there is no ambient registry.
//
// every public entry point runs through `transactional`: reentrancy is
// rejected, a snapshot is taken at entry, and any error restores it in full.
// the platform serializes operations; the snapshot only has to defend
// against partial effects of the operation itself.

use super::config::{ConfigError, EngineConfig};
use super::results::EngineError;
use crate::commitment::Commitment;
use crate::custody::AssetCustody;
use crate::events::{
    Event, EventId, EventPayload, VaultDepositEvent, VaultWithdrawalEvent,
};
use crate::exchange::ExchangeRouter;
use crate::fees::FeePolicy;
use crate::risk::RiskOracle;
use crate::types::{Address, Amount, AssetId, PositionId, Timestamp};
use crate::vault::VaultLedger;
use std::collections::HashMap;
use std::fmt;

pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) fee_policy: Box<dyn FeePolicy>,
    pub(super) risk_oracle: Box<dyn RiskOracle>,
    pub(super) router: Box<dyn ExchangeRouter>,
    pub(super) custody: AssetCustody,
    pub(super) vault: VaultLedger,
    pub(super) commitments: HashMap<PositionId, Commitment>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    pub(super) in_flight: bool,
}

/// Everything an operation may mutate, captured at entry and restored on
/// any failure. Collaborators are deliberately absent: they are stateless
/// from the engine's point of view except for custody, which is included.
pub(super) struct Snapshot {
    custody: AssetCustody,
    vault: VaultLedger,
    commitments: HashMap<PositionId, Commitment>,
    events_len: usize,
    next_event_id: u64,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        vault_asset: AssetId,
        fee_policy: Box<dyn FeePolicy>,
        risk_oracle: Box<dyn RiskOracle>,
        router: Box<dyn ExchangeRouter>,
    ) -> Self {
        let custody = AssetCustody::new(config.wrapped_native);
        let vault = VaultLedger::new(vault_asset, config.engine_address);
        Self {
            config,
            fee_policy,
            risk_oracle,
            router,
            custody,
            vault,
            commitments: HashMap::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
            in_flight: false,
        }
    }

    /// Checked construction: rejects an inconsistent config up front instead
    /// of letting it surface mid-operation.
    pub fn try_new(
        config: EngineConfig,
        vault_asset: AssetId,
        fee_policy: Box<dyn FeePolicy>,
        risk_oracle: Box<dyn RiskOracle>,
        router: Box<dyn ExchangeRouter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config, vault_asset, fee_policy, risk_oracle, router))
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn engine_address(&self) -> Address {
        self.config.engine_address
    }

    pub fn custody(&self) -> &AssetCustody {
        &self.custody
    }

    /// Setup access for sims and tests: seeding balances, marking rejecting
    /// recipients. Operations go through the engine's entry points.
    pub fn custody_mut(&mut self) -> &mut AssetCustody {
        &mut self.custody
    }

    /// Swap the exchange router. Sims and tests use this to move the market
    /// between an open and its close.
    pub fn set_router(&mut self, router: Box<dyn ExchangeRouter>) {
        self.router = router;
    }

    pub fn vault(&self) -> &VaultLedger {
        &self.vault
    }

    pub fn commitment_of(&self, id: PositionId) -> Option<Commitment> {
        self.commitments.get(&id).copied()
    }

    pub fn position_is_open(&self, id: PositionId) -> bool {
        self.commitments.contains_key(&id)
    }

    pub fn open_position_count(&self) -> usize {
        self.commitments.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    /// The asset the engine actually holds for a position's principal asset:
    /// native positions are carried as the wrapped asset while open.
    pub(super) fn settlement_asset(&self, asset: AssetId) -> AssetId {
        if asset.is_native() {
            self.config.wrapped_native
        } else {
            asset
        }
    }

    // 11.3: transaction wrapper. all-or-nothing semantics for one operation.
    pub(super) fn transactional<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if self.in_flight {
            return Err(EngineError::ReentrantCall);
        }
        self.in_flight = true;
        let snapshot = self.snapshot();
        let result = f(self);
        if result.is_err() {
            self.restore(snapshot);
        }
        self.in_flight = false;
        result
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            custody: self.custody.clone(),
            vault: self.vault.clone(),
            commitments: self.commitments.clone(),
            events_len: self.events.len(),
            next_event_id: self.next_event_id,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.custody = snapshot.custody;
        self.vault = snapshot.vault;
        self.commitments = snapshot.commitments;
        self.events.truncate(snapshot.events_len);
        self.next_event_id = snapshot.next_event_id;
    }

    // 11.4: vault entry points. routed through the engine so they share the
    // serialization guard and the custody ledger.
    pub fn vault_deposit(
        &mut self,
        depositor: Address,
        amount: Amount,
        receiver: Address,
    ) -> Result<Amount, EngineError> {
        self.transactional(|eng| {
            let shares = eng
                .vault
                .deposit(&mut eng.custody, depositor, amount, receiver)?;
            eng.emit_event(EventPayload::VaultDeposit(VaultDepositEvent {
                depositor,
                receiver,
                amount,
                shares,
            }));
            Ok(shares)
        })
    }

    pub fn vault_deposit_native(
        &mut self,
        depositor: Address,
        amount: Amount,
        receiver: Address,
    ) -> Result<Amount, EngineError> {
        self.transactional(|eng| {
            let shares =
                eng.vault
                    .deposit_native(&mut eng.custody, depositor, amount, receiver)?;
            eng.emit_event(EventPayload::VaultDeposit(VaultDepositEvent {
                depositor,
                receiver,
                amount,
                shares,
            }));
            Ok(shares)
        })
    }

    pub fn vault_withdraw(
        &mut self,
        caller: Address,
        owner: Address,
        shares: Amount,
        receiver: Address,
    ) -> Result<Amount, EngineError> {
        self.transactional(|eng| {
            let assets = eng
                .vault
                .withdraw(&mut eng.custody, caller, owner, shares, receiver)?;
            eng.emit_event(EventPayload::VaultWithdrawal(VaultWithdrawalEvent {
                owner,
                receiver,
                shares,
                assets,
            }));
            Ok(assets)
        })
    }

    pub fn vault_approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), EngineError> {
        self.transactional(|eng| {
            eng.vault.approve(owner, spender, amount);
            Ok(())
        })
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("engine_address", &self.config.engine_address)
            .field("open_positions", &self.commitments.len())
            .field("vault_assets", &self.vault.total_assets())
            .field("events", &self.events.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
