// margin-core: leveraged trading settlement engine.
// custody-first architecture: balance deltas are ground truth, every
// operation settles all-or-nothing. all computation is deterministic
// with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, AssetId, Amount, Bps, Timestamp
//   2.x  commitment.rs: sha-256 position commitments
//   3.x  position.rs: position record and canonical encoding
//   4.x  order.rs: signed open/close orders, ed25519 validation
//   5.x  custody.rs: asset ledger, transfers, native wrap/unwrap
//   6.x  fees.rs: trade fee policy
//   7.x  risk.rs: principal sizing and interest caps
//   8.x  exchange.rs: opaque exchange-call routing, FixedRateDex
//   9.x  vault.rs: share-based lender pool
//   10.x events.rs: state transition events for audit
//   11.x engine/: core engine: config, transactions, vault entry points
//   12.x engine/open.rs: position opening
//   13.x engine/close.rs: close, liquidation, shared settlement

pub mod commitment;
pub mod custody;
pub mod engine;
pub mod events;
pub mod exchange;
pub mod fees;
pub mod order;
pub mod position;
pub mod risk;
pub mod types;
pub mod vault;

// re exports for convenience
pub use commitment::Commitment;
pub use custody::{AssetCustody, CustodyError};
pub use engine::{CloseOutcome, ConfigError, Engine, EngineConfig, EngineError};
pub use events::{Event, EventId, EventPayload};
pub use exchange::{encode_swap, ExchangeError, ExchangeRouter, FixedRateDex, SwapProgram};
pub use fees::{BpsFeePolicy, FeePolicy};
pub use order::{address_of, ExchangeCall, Order, OrderError, OrderKind, SignedOrder};
pub use position::Position;
pub use risk::{LeverageRiskOracle, RiskOracle};
pub use types::{deduct, Address, Amount, AssetId, Bps, PositionId, Timestamp};
pub use vault::{VaultError, VaultLedger};
