// 13.0 engine/close.rs: settlement. close_position and liquidate_position
// share one path: replay the position against its commitment, unwind the
// collateral through the order's exchange calls, and deduct from the measured
// proceeds in strict order principal, interest, fee. whatever remains goes to
// the trader; a principal shortfall is booked against the vault.

use super::core::Engine;
use super::results::{CloseOutcome, EngineError};
use crate::events::{
    EventPayload, InterestRecordedEvent, LossRecordedEvent, PositionSettledEvent,
};
use crate::order::{ExchangeCall, OrderKind, SignedOrder};
use crate::position::Position;
use crate::types::{deduct, Address, Amount, AssetId};

impl Engine {
    pub fn close_position(
        &mut self,
        signed: &SignedOrder,
        position: &Position,
        interest_override: Amount,
    ) -> Result<CloseOutcome, EngineError> {
        self.transactional(|eng| {
            signed.validate(eng.current_time)?;
            let order = &signed.order;
            if order.kind != OrderKind::Close {
                return Err(EngineError::WrongOrderKind);
            }
            if order.trader != position.trader || order.id != position.id {
                return Err(EngineError::OrderPositionMismatch);
            }

            let outcome =
                eng.close_internal(position, &order.exchange_calls, interest_override)?;
            eng.emit_event(EventPayload::PositionClosed(settled_event(
                position, &outcome,
            )));
            Ok(outcome)
        })
    }

    // 13.1: liquidation is a close driven by an authorized third party. it may
    // only finalize when the trader's residual payout is small enough, so a
    // healthy position cannot be liquidated out from under its owner.
    pub fn liquidate_position(
        &mut self,
        caller: Address,
        position: &Position,
        exchange_calls: &[ExchangeCall],
        interest_override: Amount,
    ) -> Result<CloseOutcome, EngineError> {
        self.transactional(|eng| {
            if !eng.config.liquidators.contains(&caller) {
                return Err(EngineError::UnauthorizedLiquidator(caller));
            }

            let outcome = eng.close_internal(position, exchange_calls, interest_override)?;

            let threshold = eng.config.liquidation_threshold.apply(position.principal);
            if outcome.payout > threshold {
                return Err(EngineError::LiquidationThresholdNotReached {
                    payout: outcome.payout,
                    threshold,
                });
            }

            eng.emit_event(EventPayload::PositionLiquidated(settled_event(
                position, &outcome,
            )));
            Ok(outcome)
        })
    }

    fn close_internal(
        &mut self,
        position: &Position,
        exchange_calls: &[ExchangeCall],
        interest_override: Amount,
    ) -> Result<CloseOutcome, EngineError> {
        let stored = self
            .commitments
            .get(&position.id)
            .copied()
            .ok_or(EngineError::InvalidPosition(position.id))?;
        if stored != position.commitment() {
            return Err(EngineError::InvalidPosition(position.id));
        }
        if exchange_calls.is_empty() {
            return Err(EngineError::SwapFunctionNeeded);
        }

        // 13.2: the interest cap is what the oracle says this position can
        // have accrued. an override of zero, or one above the cap, means the
        // cap itself; a caller can only ever lower the charge.
        let cap = self.risk_oracle.max_interest(
            position.collateral_asset,
            position.principal,
            position.opened_at,
            self.current_time,
        );
        let interest = if interest_override.is_zero() || interest_override > cap {
            cap
        } else {
            interest_override
        };

        let engine_addr = self.config.engine_address;
        let settle_asset = self.settlement_asset(position.principal_asset);

        let before = self.custody.balance_of(engine_addr, settle_asset);
        self.router
            .execute(exchange_calls, &mut self.custody, engine_addr)?;
        let after = self.custody.balance_of(engine_addr, settle_asset);
        let proceeds = after.saturating_sub(before);

        let (remaining, principal_repaid) = deduct(proceeds, position.principal);
        let (remaining, interest_paid) = deduct(remaining, interest);
        let close_fee = self.fee_policy.compute_trade_fee(remaining);
        let (payout, fee_amount) = deduct(remaining, close_fee);

        if principal_repaid < position.principal {
            // deduction order guarantees nothing is left once principal went
            // underpaid; residual value here would mean the loss about to be
            // booked is overstated
            if !payout.is_zero() {
                return Err(EngineError::InsufficientCollateralReceived {
                    received: proceeds,
                    minimum: position.principal,
                });
            }
            let shortfall = position.principal.saturating_sub(principal_repaid);
            log::warn!(
                target: "margin::engine",
                "{} settled short: proceeds {} against principal {}",
                position.id,
                proceeds,
                position.principal,
            );
            self.vault.record_loss(engine_addr, shortfall)?;
            self.emit_event(EventPayload::LossRecorded(LossRecordedEvent {
                position_id: position.id,
                amount: shortfall,
            }));
        } else if !interest_paid.is_zero() {
            self.vault.record_interest_earned(engine_addr, interest_paid)?;
            self.emit_event(EventPayload::InterestRecorded(InterestRecordedEvent {
                position_id: position.id,
                amount: interest_paid,
            }));
        }

        let total_fees = position
            .fees_to_be_paid
            .checked_add(fee_amount)
            .ok_or(EngineError::Overflow)?;
        let owed = payout.checked_add(total_fees).ok_or(EngineError::Overflow)?;

        // 13.3: native positions pay out in native currency. unwrap exactly
        // the gap; the engine's wrapped balance backs the vault's book value
        // and must not be drained past what this settlement owes.
        let payout_asset = if position.principal_asset.is_native() {
            let native_held = self.custody.balance_of(engine_addr, AssetId::NATIVE);
            if native_held < owed {
                let gap = owed.saturating_sub(native_held);
                self.custody.unwrap_native(engine_addr, gap).map_err(|_| {
                    EngineError::InsufficientSettlementLiquidity {
                        needed: owed,
                        available: self
                            .custody
                            .balance_of(engine_addr, settle_asset)
                            .checked_add(native_held)
                            .unwrap_or(Amount::new(u128::MAX)),
                    }
                })?;
            }
            AssetId::NATIVE
        } else {
            let held = self.custody.balance_of(engine_addr, settle_asset);
            if held < owed {
                return Err(EngineError::InsufficientSettlementLiquidity {
                    needed: owed,
                    available: held,
                });
            }
            settle_asset
        };

        if !payout.is_zero() {
            self.custody
                .transfer(engine_addr, position.trader, payout_asset, payout)?;
        }
        if !total_fees.is_zero() {
            self.custody.transfer(
                engine_addr,
                self.fee_policy.fee_receiver(),
                payout_asset,
                total_fees,
            )?;
        }

        self.commitments.remove(&position.id);

        log::debug!(
            target: "margin::engine",
            "settled {} proceeds={} repaid={} interest={} fees={} payout={}",
            position.id,
            proceeds,
            principal_repaid,
            interest_paid,
            total_fees,
            payout,
        );

        Ok(CloseOutcome {
            payout,
            principal_repaid,
            interest_paid,
            fee_amount,
        })
    }
}

fn settled_event(position: &Position, outcome: &CloseOutcome) -> PositionSettledEvent {
    PositionSettledEvent {
        id: position.id,
        trader: position.trader,
        payout: outcome.payout,
        principal_repaid: outcome.principal_repaid,
        interest_paid: outcome.interest_paid,
        fee_amount: outcome.fee_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::exchange::{encode_swap, FixedRateDex, SwapProgram};
    use crate::fees::BpsFeePolicy;
    use crate::order::{address_of, Order};
    use crate::risk::LeverageRiskOracle;
    use crate::types::{Bps, PositionId, Timestamp};
    use ed25519_dalek::SigningKey;

    const USDC: AssetId = AssetId(2);
    const TOKEN: AssetId = AssetId(3);
    const HOUR_MS: i64 = 3_600_000;

    fn dex_addr() -> Address {
        Address([0xDD; 32])
    }

    fn fee_receiver() -> Address {
        Address([5u8; 32])
    }

    fn liquidator() -> Address {
        Address([0xAA; 32])
    }

    fn trader_key() -> SigningKey {
        SigningKey::from_bytes(&[42u8; 32])
    }

    fn sell_collateral(amount: u128) -> ExchangeCall {
        ExchangeCall {
            target: dex_addr(),
            value: Amount::ZERO,
            payload: encode_swap(TOKEN, USDC, Amount::new(amount)),
        }
    }

    /// Funded engine with one open position: 100 down payment (5 fee),
    /// 300 principal, 395 TOKEN collateral bought 1:1.
    fn setup(unwind_rate: SwapProgram) -> (Engine, Position) {
        let mut dex = FixedRateDex::new();
        dex.register(dex_addr(), SwapProgram { rate_num: 1, rate_den: 1 });

        let mut config = EngineConfig::default();
        config.liquidators.insert(liquidator());
        let mut engine = Engine::new(
            config,
            USDC,
            Box::new(BpsFeePolicy::new(Bps::new(500), fee_receiver())),
            Box::new(LeverageRiskOracle::new(Bps::new(40_000), Bps::new(50))),
            Box::new(dex),
        );
        engine.set_time(Timestamp::from_millis(0));

        let lender = Address([1u8; 32]);
        engine.custody_mut().mint(lender, USDC, Amount::new(1_000));
        engine.vault_deposit(lender, Amount::new(1_000), lender).unwrap();
        engine
            .custody_mut()
            .mint(dex_addr(), TOKEN, Amount::new(10_000));
        engine
            .custody_mut()
            .mint(dex_addr(), USDC, Amount::new(10_000));

        let trader = address_of(&trader_key());
        engine.custody_mut().mint(trader, USDC, Amount::new(100));

        let open = Order {
            kind: OrderKind::Open,
            id: PositionId(1),
            trader,
            principal_asset: USDC,
            collateral_asset: TOKEN,
            principal: Amount::new(300),
            down_payment: Amount::new(100),
            min_collateral: Amount::new(395),
            expires_at: Timestamp::from_millis(10_000),
            exchange_calls: vec![ExchangeCall {
                target: dex_addr(),
                value: Amount::ZERO,
                payload: encode_swap(USDC, TOKEN, Amount::new(395)),
            }],
        };
        let position = engine
            .open_position(&SignedOrder::sign(open, &trader_key()))
            .unwrap();

        // swap out the open-rate program for the close-rate one
        let mut dex = FixedRateDex::new();
        dex.register(dex_addr(), unwind_rate);
        engine.router = Box::new(dex);

        // ten whole hours accrue 10 of interest on the 300 principal
        engine.advance_time(10 * HOUR_MS);
        (engine, position)
    }

    fn close_order(position: &Position, sell_amount: u128) -> SignedOrder {
        let order = Order {
            kind: OrderKind::Close,
            id: position.id,
            trader: position.trader,
            principal_asset: position.principal_asset,
            collateral_asset: position.collateral_asset,
            principal: position.principal,
            down_payment: position.down_payment,
            min_collateral: Amount::ZERO,
            expires_at: Timestamp::from_millis(100 * HOUR_MS),
            exchange_calls: vec![sell_collateral(sell_amount)],
        };
        SignedOrder::sign(order, &trader_key())
    }

    #[test]
    fn profitable_close_pays_trader_and_vault() {
        // 395 collateral at 80/79 realizes 400
        let (mut engine, position) = setup(SwapProgram { rate_num: 80, rate_den: 79 });
        let signed = close_order(&position, 395);

        let outcome = engine
            .close_position(&signed, &position, Amount::ZERO)
            .unwrap();

        // 400 - 300 principal - 10 interest = 90, close fee 4, trader 86
        assert_eq!(outcome.principal_repaid, Amount::new(300));
        assert_eq!(outcome.interest_paid, Amount::new(10));
        assert_eq!(outcome.fee_amount, Amount::new(4));
        assert_eq!(outcome.payout, Amount::new(86));

        let trader = position.trader;
        assert_eq!(engine.custody().balance_of(trader, USDC), Amount::new(86));
        // open fee 5 plus close fee 4
        assert_eq!(
            engine.custody().balance_of(fee_receiver(), USDC),
            Amount::new(9)
        );
        assert_eq!(engine.vault().total_assets(), Amount::new(1_010));
        assert!(!engine.position_is_open(position.id));
    }

    #[test]
    fn shortfall_is_booked_against_the_vault() {
        // 395 at 50/79 realizes only 250
        let (mut engine, position) = setup(SwapProgram { rate_num: 50, rate_den: 79 });
        let signed = close_order(&position, 395);

        let outcome = engine
            .close_position(&signed, &position, Amount::ZERO)
            .unwrap();

        assert_eq!(outcome.principal_repaid, Amount::new(250));
        assert_eq!(outcome.interest_paid, Amount::ZERO);
        assert_eq!(outcome.payout, Amount::ZERO);

        // the 50 shortfall came out of the lenders' book value
        assert_eq!(engine.vault().total_assets(), Amount::new(950));
        assert_eq!(
            engine.custody().balance_of(position.trader, USDC),
            Amount::ZERO
        );
        // the withheld open fee is still paid
        assert_eq!(
            engine.custody().balance_of(fee_receiver(), USDC),
            Amount::new(5)
        );
    }

    #[test]
    fn interest_override_can_only_lower_the_charge() {
        let (mut engine, position) = setup(SwapProgram { rate_num: 80, rate_den: 79 });

        // an override below the 10 cap is honored
        let outcome = engine
            .close_position(&close_order(&position, 395), &position, Amount::new(6))
            .unwrap();
        assert_eq!(outcome.interest_paid, Amount::new(6));
    }

    #[test]
    fn interest_override_above_cap_uses_cap() {
        let (mut engine, position) = setup(SwapProgram { rate_num: 80, rate_den: 79 });

        let outcome = engine
            .close_position(&close_order(&position, 395), &position, Amount::new(50))
            .unwrap();
        assert_eq!(outcome.interest_paid, Amount::new(10));
    }

    #[test]
    fn tampered_position_replay_is_rejected() {
        let (mut engine, position) = setup(SwapProgram { rate_num: 80, rate_den: 79 });

        let mut tampered = position.clone();
        tampered.principal = Amount::new(200);
        let signed = close_order(&tampered, 395);

        let err = engine
            .close_position(&signed, &tampered, Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPosition(PositionId(1))));
        assert!(engine.position_is_open(position.id));
    }

    #[test]
    fn close_requires_at_least_one_exchange_call() {
        let (mut engine, position) = setup(SwapProgram { rate_num: 80, rate_den: 79 });

        let mut signed = close_order(&position, 395);
        signed.order.exchange_calls.clear();
        let signed = SignedOrder::sign(signed.order, &trader_key());

        let err = engine
            .close_position(&signed, &position, Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, EngineError::SwapFunctionNeeded));
    }

    #[test]
    fn order_must_match_the_position() {
        let (mut engine, position) = setup(SwapProgram { rate_num: 80, rate_den: 79 });

        let mut signed = close_order(&position, 395);
        signed.order.id = PositionId(2);
        let signed = SignedOrder::sign(signed.order, &trader_key());

        let err = engine
            .close_position(&signed, &position, Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, EngineError::OrderPositionMismatch));
    }

    #[test]
    fn liquidation_finalizes_at_the_threshold() {
        // 395 at 65/79 realizes 325: residual 15 equals 5% of the 300 principal
        let (mut engine, position) = setup(SwapProgram { rate_num: 65, rate_den: 79 });

        let outcome = engine
            .liquidate_position(liquidator(), &position, &[sell_collateral(395)], Amount::ZERO)
            .unwrap();
        assert_eq!(outcome.payout, Amount::new(15));
        assert!(!engine.position_is_open(position.id));
        // the residual still belongs to the trader
        assert_eq!(
            engine.custody().balance_of(position.trader, USDC),
            Amount::new(15)
        );
    }

    #[test]
    fn healthy_position_cannot_be_liquidated() {
        // 395 at 66/79 realizes 330: residual 19 is above the 15 threshold
        let (mut engine, position) = setup(SwapProgram { rate_num: 66, rate_den: 79 });
        let vault_before = engine.vault().total_assets();

        let err = engine
            .liquidate_position(liquidator(), &position, &[sell_collateral(395)], Amount::ZERO)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::LiquidationThresholdNotReached { .. }
        ));

        // fully rolled back: position still open, collateral still held
        assert!(engine.position_is_open(position.id));
        let addr = engine.engine_address();
        assert_eq!(engine.custody().balance_of(addr, TOKEN), Amount::new(395));
        assert_eq!(engine.vault().total_assets(), vault_before);
    }

    #[test]
    fn liquidation_requires_authorization() {
        let (mut engine, position) = setup(SwapProgram { rate_num: 65, rate_den: 79 });
        let outsider = Address([0xBB; 32]);

        let err = engine
            .liquidate_position(outsider, &position, &[sell_collateral(395)], Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnauthorizedLiquidator(_)));
        assert!(engine.position_is_open(position.id));
    }

    #[test]
    fn native_close_pays_out_unwrapped() {
        let mut dex = FixedRateDex::new();
        dex.register(dex_addr(), SwapProgram { rate_num: 1, rate_den: 1 });

        let config = EngineConfig::default();
        let wnative = config.wrapped_native;
        let mut engine = Engine::new(
            config,
            wnative,
            Box::new(BpsFeePolicy::new(Bps::new(500), fee_receiver())),
            Box::new(LeverageRiskOracle::new(Bps::new(40_000), Bps::new(50))),
            Box::new(dex),
        );
        engine.set_time(Timestamp::from_millis(0));

        let lender = Address([1u8; 32]);
        engine
            .custody_mut()
            .mint(lender, AssetId::NATIVE, Amount::new(1_000));
        engine
            .vault_deposit_native(lender, Amount::new(1_000), lender)
            .unwrap();
        engine
            .custody_mut()
            .mint(dex_addr(), TOKEN, Amount::new(10_000));
        engine
            .custody_mut()
            .mint(dex_addr(), wnative, Amount::new(10_000));

        let trader = address_of(&trader_key());
        engine
            .custody_mut()
            .mint(trader, AssetId::NATIVE, Amount::new(100));

        let open = Order {
            kind: OrderKind::Open,
            id: PositionId(1),
            trader,
            principal_asset: AssetId::NATIVE,
            collateral_asset: TOKEN,
            principal: Amount::new(300),
            down_payment: Amount::new(100),
            min_collateral: Amount::new(395),
            expires_at: Timestamp::from_millis(10_000),
            exchange_calls: vec![ExchangeCall {
                target: dex_addr(),
                value: Amount::ZERO,
                payload: encode_swap(wnative, TOKEN, Amount::new(395)),
            }],
        };
        let position = engine
            .open_position(&SignedOrder::sign(open, &trader_key()))
            .unwrap();
        engine.advance_time(10 * HOUR_MS);

        // unwind at 80/79 into the wrapped asset
        let mut dex = FixedRateDex::new();
        dex.register(dex_addr(), SwapProgram { rate_num: 80, rate_den: 79 });
        engine.router = Box::new(dex);

        let close = Order {
            kind: OrderKind::Close,
            id: position.id,
            trader,
            principal_asset: AssetId::NATIVE,
            collateral_asset: TOKEN,
            principal: position.principal,
            down_payment: position.down_payment,
            min_collateral: Amount::ZERO,
            expires_at: Timestamp::from_millis(100 * HOUR_MS),
            exchange_calls: vec![ExchangeCall {
                target: dex_addr(),
                value: Amount::ZERO,
                payload: encode_swap(TOKEN, wnative, Amount::new(395)),
            }],
        };
        let outcome = engine
            .close_position(
                &SignedOrder::sign(close, &trader_key()),
                &position,
                Amount::ZERO,
            )
            .unwrap();
        assert_eq!(outcome.payout, Amount::new(86));

        // both payout and fees arrive as native currency
        assert_eq!(
            engine.custody().balance_of(trader, AssetId::NATIVE),
            Amount::new(86)
        );
        assert_eq!(
            engine
                .custody()
                .balance_of(fee_receiver(), AssetId::NATIVE),
            Amount::new(9)
        );
    }

    #[test]
    fn rejecting_recipient_aborts_a_native_close() {
        let mut dex = FixedRateDex::new();
        dex.register(dex_addr(), SwapProgram { rate_num: 1, rate_den: 1 });

        let config = EngineConfig::default();
        let wnative = config.wrapped_native;
        let mut engine = Engine::new(
            config,
            wnative,
            Box::new(BpsFeePolicy::new(Bps::new(500), fee_receiver())),
            Box::new(LeverageRiskOracle::new(Bps::new(40_000), Bps::new(50))),
            Box::new(dex),
        );
        engine.set_time(Timestamp::from_millis(0));

        let lender = Address([1u8; 32]);
        engine
            .custody_mut()
            .mint(lender, AssetId::NATIVE, Amount::new(1_000));
        engine
            .vault_deposit_native(lender, Amount::new(1_000), lender)
            .unwrap();
        engine
            .custody_mut()
            .mint(dex_addr(), TOKEN, Amount::new(10_000));
        engine
            .custody_mut()
            .mint(dex_addr(), wnative, Amount::new(10_000));

        let trader = address_of(&trader_key());
        engine
            .custody_mut()
            .mint(trader, AssetId::NATIVE, Amount::new(100));

        let open = Order {
            kind: OrderKind::Open,
            id: PositionId(1),
            trader,
            principal_asset: AssetId::NATIVE,
            collateral_asset: TOKEN,
            principal: Amount::new(300),
            down_payment: Amount::new(100),
            min_collateral: Amount::new(395),
            expires_at: Timestamp::from_millis(10_000),
            exchange_calls: vec![ExchangeCall {
                target: dex_addr(),
                value: Amount::ZERO,
                payload: encode_swap(wnative, TOKEN, Amount::new(395)),
            }],
        };
        let position = engine
            .open_position(&SignedOrder::sign(open, &trader_key()))
            .unwrap();

        // trader refuses incoming native value
        engine.custody_mut().set_rejecting(trader, true);

        let mut dex = FixedRateDex::new();
        dex.register(dex_addr(), SwapProgram { rate_num: 80, rate_den: 79 });
        engine.router = Box::new(dex);

        let close = Order {
            kind: OrderKind::Close,
            id: position.id,
            trader,
            principal_asset: AssetId::NATIVE,
            collateral_asset: TOKEN,
            principal: position.principal,
            down_payment: position.down_payment,
            min_collateral: Amount::ZERO,
            expires_at: Timestamp::from_millis(100 * HOUR_MS),
            exchange_calls: vec![ExchangeCall {
                target: dex_addr(),
                value: Amount::ZERO,
                payload: encode_swap(TOKEN, wnative, Amount::new(395)),
            }],
        };
        let err = engine
            .close_position(
                &SignedOrder::sign(close, &trader_key()),
                &position,
                Amount::ZERO,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Custody(crate::custody::CustodyError::TransferRejected(_))
        ));

        // rolled back whole: the position survives the failed payout
        assert!(engine.position_is_open(position.id));
        let addr = engine.engine_address();
        assert_eq!(engine.custody().balance_of(addr, TOKEN), Amount::new(395));
    }
}
