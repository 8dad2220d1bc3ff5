// 12.0 engine/open.rs: position opening. pulls the down payment, sizes the
// borrow against the risk oracle, executes the order's exchange calls, and
// measures the collateral delta. only the position's commitment is persisted;
// the full struct is returned to the caller, who must replay it at close.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, PositionOpenedEvent};
use crate::order::{OrderKind, SignedOrder};
use crate::position::Position;
use crate::types::AssetId;

impl Engine {
    pub fn open_position(&mut self, signed: &SignedOrder) -> Result<Position, EngineError> {
        self.transactional(|eng| eng.open_inner(signed))
    }

    fn open_inner(&mut self, signed: &SignedOrder) -> Result<Position, EngineError> {
        signed.validate(self.current_time)?;
        let order = &signed.order;
        if order.kind != OrderKind::Open {
            return Err(EngineError::WrongOrderKind);
        }
        if self.commitments.contains_key(&order.id) {
            return Err(EngineError::PositionAlreadyOpen(order.id));
        }

        let engine_addr = self.config.engine_address;

        // 12.1: the down payment comes in as the principal asset itself.
        // native funds are wrapped on receipt; the engine never carries bare
        // native balance for an open position.
        self.custody.transfer(
            order.trader,
            engine_addr,
            order.principal_asset,
            order.down_payment,
        )?;
        if order.principal_asset.is_native() {
            self.custody.wrap_native(engine_addr, order.down_payment)?;
        }

        let fee = self.fee_policy.compute_trade_fee(order.down_payment);
        let net_down_payment =
            order
                .down_payment
                .checked_sub(fee)
                .ok_or(EngineError::FeeExceedsDownPayment {
                    fee,
                    down_payment: order.down_payment,
                })?;

        let maximum = self.risk_oracle.max_principal(
            order.collateral_asset,
            order.principal_asset,
            net_down_payment,
        );
        if order.principal > maximum {
            return Err(EngineError::PrincipalTooHigh {
                requested: order.principal,
                maximum,
            });
        }

        // 12.2: funding check. the swap spends principal plus the net down
        // payment; the withheld fee never leaves the engine until close.
        let needed = order
            .principal
            .checked_add(net_down_payment)
            .ok_or(EngineError::Overflow)?;
        let hold_asset = self.settlement_asset(order.principal_asset);
        let held = self.custody.balance_of(engine_addr, hold_asset);
        if held < needed {
            let gap = needed.saturating_sub(held);
            let native_held = self.custody.balance_of(engine_addr, AssetId::NATIVE);
            if hold_asset == self.config.wrapped_native && native_held >= gap {
                self.custody.wrap_native(engine_addr, gap)?;
            } else {
                return Err(EngineError::InsufficientAvailablePrincipal {
                    needed,
                    available: held,
                });
            }
        }

        // 12.3: execute the calls verbatim and take the measured collateral
        // delta as truth, never the router's word for it.
        let before = self
            .custody
            .balance_of(engine_addr, order.collateral_asset);
        self.router
            .execute(&order.exchange_calls, &mut self.custody, engine_addr)?;
        let after = self
            .custody
            .balance_of(engine_addr, order.collateral_asset);
        let collateral_amount = after.saturating_sub(before);

        if collateral_amount < order.min_collateral {
            return Err(EngineError::InsufficientCollateralReceived {
                received: collateral_amount,
                minimum: order.min_collateral,
            });
        }

        let position = Position {
            id: order.id,
            trader: order.trader,
            principal_asset: order.principal_asset,
            collateral_asset: order.collateral_asset,
            opened_at: self.current_time,
            down_payment: order.down_payment,
            principal: order.principal,
            collateral_amount,
            fees_to_be_paid: fee,
        };
        self.commitments.insert(position.id, position.commitment());

        log::debug!(
            target: "margin::engine",
            "opened {} trader={} principal={} collateral={}",
            position.id,
            position.trader,
            position.principal,
            position.collateral_amount,
        );
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            id: position.id,
            trader: position.trader,
            principal_asset: position.principal_asset,
            collateral_asset: position.collateral_asset,
            down_payment: position.down_payment,
            principal: position.principal,
            collateral_amount: position.collateral_amount,
            fees_to_be_paid: position.fees_to_be_paid,
        }));

        Ok(position)
    }
}
