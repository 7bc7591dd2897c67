//! Engine configuration.
//!
//! [`EngineConfig`] carries everything the distributor needs at construction:
//! the quarter clock, the reference asset principal is normalized into, the
//! governance and keeper identities, and the initial mining parameters.
//! Defaults mirror the protocol constants.

use serde::{Deserialize, Serialize};

use crate::constants::{EPOCH_DURATION, START_TIME};
use crate::error::ParameterError;
use crate::params::MiningParameters;
use crate::types::Address;

/// Configuration for a rewards distributor instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Start of quarter 1 (Unix seconds).
    pub start_time: u64,
    /// Length of a quarter in seconds.
    pub epoch_duration: u64,
    /// Asset every strategy's principal is normalized into.
    pub reference_asset: Address,
    /// Only this caller may change mining parameters or keepers.
    pub governance: Address,
    /// Relayers allowed to submit signed claims.
    pub keepers: Vec<Address>,
    /// Garden receiving claim-and-stake deposits.
    pub heart_garden: Option<Address>,
    pub mining: MiningParameters,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_time: START_TIME,
            epoch_duration: EPOCH_DURATION,
            reference_asset: Address::ZERO,
            governance: Address::ZERO,
            keepers: Vec::new(),
            heart_garden: None,
            mining: MiningParameters::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.epoch_duration == 0 {
            return Err(ParameterError::ZeroEpoch);
        }
        self.mining.validate()
    }

    pub fn is_keeper(&self, who: &Address) -> bool {
        self.keepers.contains(who)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PERCENT;

    #[test]
    fn default_uses_protocol_clock() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.start_time, START_TIME);
        assert_eq!(cfg.epoch_duration, EPOCH_DURATION);
        assert!(cfg.heart_garden.is_none());
    }

    #[test]
    fn default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_epoch_rejected() {
        let cfg = EngineConfig { epoch_duration: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ParameterError::ZeroEpoch));
    }

    #[test]
    fn invalid_mining_parameters_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.mining.strategist_share = 20 * PERCENT;
        assert!(matches!(cfg.validate(), Err(ParameterError::RoleSplit(_))));
    }

    #[test]
    fn keeper_lookup() {
        let k = Address([7; 32]);
        let cfg = EngineConfig { keepers: vec![k], ..Default::default() };
        assert!(cfg.is_keeper(&k));
        assert!(!cfg.is_keeper(&Address([8; 32])));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"start_time": 1000}"#).unwrap();
        assert_eq!(cfg.start_time, 1000);
        assert_eq!(cfg.epoch_duration, EPOCH_DURATION);
        assert_eq!(cfg.mining, MiningParameters::default());
    }
}
