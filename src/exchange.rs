// 8.0 exchange.rs: the external value-exchange boundary. the engine hands a
// router an opaque call list exactly once per operation and trusts nothing it
// reports; ground truth is always re-derived from custody balance deltas.
// FixedRateDex is the reference venue used by the sim and tests.

use crate::custody::{AssetCustody, CustodyError};
use crate::order::ExchangeCall;
use crate::types::{Address, Amount, AssetId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("no swap program registered at {0}")]
    UnknownTarget(Address),

    #[error("malformed swap payload")]
    MalformedPayload,

    #[error("swap output overflow")]
    OutputOverflow,

    #[error("custody: {0}")]
    Custody(#[from] CustodyError),
}

/// Executes an order's exchange-call list verbatim against the custody
/// ledger. Implementations never receive the engine itself, so they cannot
/// reenter it; they can only move balances.
pub trait ExchangeRouter {
    fn execute(
        &mut self,
        calls: &[ExchangeCall],
        custody: &mut AssetCustody,
        engine: Address,
    ) -> Result<(), ExchangeError>;
}

/// One registered swap program: converts its input at a fixed rate
/// `amount_out = amount_in * rate_num / rate_den` out of its own inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapProgram {
    pub rate_num: u128,
    pub rate_den: u128,
}

/// Payload layout for FixedRateDex calls: asset_in, asset_out, amount_in.
pub fn encode_swap(asset_in: AssetId, asset_out: AssetId, amount_in: Amount) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&asset_in.0.to_be_bytes());
    buf.extend_from_slice(&asset_out.0.to_be_bytes());
    buf.extend_from_slice(&amount_in.raw().to_be_bytes());
    buf
}

fn decode_swap(payload: &[u8]) -> Result<(AssetId, AssetId, Amount), ExchangeError> {
    if payload.len() != 24 {
        return Err(ExchangeError::MalformedPayload);
    }
    let asset_in = AssetId(u32::from_be_bytes(
        payload[0..4].try_into().map_err(|_| ExchangeError::MalformedPayload)?,
    ));
    let asset_out = AssetId(u32::from_be_bytes(
        payload[4..8].try_into().map_err(|_| ExchangeError::MalformedPayload)?,
    ));
    let amount_in = Amount::new(u128::from_be_bytes(
        payload[8..24].try_into().map_err(|_| ExchangeError::MalformedPayload)?,
    ));
    Ok((asset_in, asset_out, amount_in))
}

#[derive(Debug, Clone, Default)]
pub struct FixedRateDex {
    programs: HashMap<Address, SwapProgram>,
}

impl FixedRateDex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: Address, program: SwapProgram) {
        self.programs.insert(target, program);
    }
}

impl ExchangeRouter for FixedRateDex {
    fn execute(
        &mut self,
        calls: &[ExchangeCall],
        custody: &mut AssetCustody,
        engine: Address,
    ) -> Result<(), ExchangeError> {
        for call in calls {
            let program = self
                .programs
                .get(&call.target)
                .copied()
                .ok_or(ExchangeError::UnknownTarget(call.target))?;

            if !call.value.is_zero() {
                custody.transfer(engine, call.target, AssetId::NATIVE, call.value)?;
            }

            let (asset_in, asset_out, amount_in) = decode_swap(&call.payload)?;
            let amount_out = amount_in
                .raw()
                .checked_mul(program.rate_num)
                .map(|x| x / program.rate_den)
                .ok_or(ExchangeError::OutputOverflow)?;

            // input to the program's inventory, output back to the engine
            custody.transfer(engine, call.target, asset_in, amount_in)?;
            custody.transfer(call.target, engine, asset_out, Amount::new(amount_out))?;
        }
        Ok(())
    }
}
