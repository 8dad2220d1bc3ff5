// 11.x engine/: the position lifecycle core, split by operation:
//   config.rs  engine configuration and validation
//   core.rs    engine state, transactions, reentrancy guard, vault entry points
//   open.rs    open_position
//   close.rs   close_position, liquidate_position, shared settlement path
//   results.rs outcome structs and the error taxonomy

mod close;
mod config;
mod core;
mod open;
mod results;

pub use config::{ConfigError, EngineConfig};
pub use core::Engine;
pub use results::{CloseOutcome, EngineError};
