// 11.0 engine/config.rs: engine settings. collaborators are injected at
// construction, so the config only carries identities and limits.

use crate::types::{Address, AssetId, Bps};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// the engine's own ledger identity; holds pooled principal and collateral
    pub engine_address: Address,
    /// asset the native currency wraps into
    pub wrapped_native: AssetId,
    /// a liquidation may only finalize when the residual payout is at or
    /// below this fraction of principal. 500 bps = 5%.
    pub liquidation_threshold: Bps,
    /// addresses allowed to call liquidate_position
    pub liquidators: HashSet<Address>,
    pub max_events: usize,
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_address: Address([0xEE; 32]),
            wrapped_native: AssetId(1),
            liquidation_threshold: Bps::new(500),
            liquidators: HashSet::new(),
            max_events: 10_000,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("liquidation threshold must be at most 10000 bps")]
    ThresholdTooHigh,

    #[error("wrapped-native asset cannot be the native sentinel")]
    WrappedNativeIsSentinel,

    #[error("max_events must be non-zero")]
    NoEventCapacity,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liquidation_threshold.value() > 10_000 {
            return Err(ConfigError::ThresholdTooHigh);
        }
        if self.wrapped_native.is_native() {
            return Err(ConfigError::WrappedNativeIsSentinel);
        }
        if self.max_events == 0 {
            return Err(ConfigError::NoEventCapacity);
        }
        Ok(())
    }
}
