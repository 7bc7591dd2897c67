//! Governance-controlled mining parameters and keeper set.

use std::collections::BTreeSet;

use tracing::info;

use babl_core::error::RewardsError;
use babl_core::params::MiningParameters;
use babl_core::types::Address;

#[derive(Clone, Debug)]
pub struct GovernanceParameterStore {
    governance: Address,
    params: MiningParameters,
    keepers: BTreeSet<Address>,
}

impl GovernanceParameterStore {
    /// Fails with [`RewardsError::InvalidParameterSet`] if `params` is invalid.
    pub fn new(
        governance: Address,
        params: MiningParameters,
        keepers: impl IntoIterator<Item = Address>,
    ) -> Result<Self, RewardsError> {
        params.validate()?;
        Ok(Self {
            governance,
            params,
            keepers: keepers.into_iter().collect(),
        })
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn params(&self) -> &MiningParameters {
        &self.params
    }

    fn authorize(&self, caller: &Address) -> Result<(), RewardsError> {
        if *caller != self.governance {
            return Err(RewardsError::Unauthorized);
        }
        Ok(())
    }

    /// Replace the mining parameters. Only governance may call; the new set
    /// must validate.
    pub fn set_mining_parameters(&mut self, caller: &Address, params: MiningParameters) -> Result<(), RewardsError> {
        self.authorize(caller)?;
        params.validate()?;
        self.params = params;
        info!(
            strategist = params.strategist_share,
            steward = params.steward_share,
            lp = params.lp_share,
            creator = params.creator_bonus,
            profit_weight = params.profit_weight,
            principal_weight = params.principal_weight,
            "mining parameters updated"
        );
        Ok(())
    }

    /// Returns `false` if `keeper` was already registered.
    pub fn add_keeper(&mut self, caller: &Address, keeper: Address) -> Result<bool, RewardsError> {
        self.authorize(caller)?;
        let added = self.keepers.insert(keeper);
        if added {
            info!(keeper = %keeper.short(), "keeper added");
        }
        Ok(added)
    }

    /// Returns `false` if `keeper` was not registered.
    pub fn remove_keeper(&mut self, caller: &Address, keeper: &Address) -> Result<bool, RewardsError> {
        self.authorize(caller)?;
        let removed = self.keepers.remove(keeper);
        if removed {
            info!(keeper = %keeper.short(), "keeper removed");
        }
        Ok(removed)
    }

    pub fn is_keeper(&self, who: &Address) -> bool {
        self.keepers.contains(who)
    }

    pub fn keepers(&self) -> impl Iterator<Item = &Address> {
        self.keepers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babl_core::constants::{PERCENT, WAD};
    use babl_core::error::ParameterError;
    use babl_core::params::Benchmark;

    const GOV: Address = Address([0xEE; 32]);

    fn store() -> GovernanceParameterStore {
        GovernanceParameterStore::new(GOV, MiningParameters::default(), []).unwrap()
    }

    #[test]
    fn governance_can_update() {
        let mut s = store();
        let p = MiningParameters {
            strategist_share: 20 * PERCENT,
            lp_share: 60 * PERCENT,
            ..Default::default()
        };
        s.set_mining_parameters(&GOV, p).unwrap();
        assert_eq!(*s.params(), p);
    }

    #[test]
    fn others_are_unauthorized() {
        let mut s = store();
        let err = s.set_mining_parameters(&Address([1; 32]), MiningParameters::default());
        assert_eq!(err, Err(RewardsError::Unauthorized));
        assert_eq!(s.add_keeper(&Address([1; 32]), Address([2; 32])), Err(RewardsError::Unauthorized));
    }

    #[test]
    fn invalid_set_rejected_and_old_kept() {
        let mut s = store();
        let bad = MiningParameters {
            benchmark: Benchmark::from_array([90 * PERCENT, 103 * PERCENT, 80 * PERCENT, 80 * PERCENT, 90 * PERCENT]),
            ..Default::default()
        };
        assert_eq!(
            s.set_mining_parameters(&GOV, bad),
            Err(RewardsError::InvalidParameterSet(ParameterError::BoostIsPenalty(90 * PERCENT)))
        );
        assert_eq!(*s.params(), MiningParameters::default());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut s = store();
        let bad = MiningParameters { profit_weight: WAD, ..Default::default() };
        assert!(matches!(
            s.set_mining_parameters(&GOV, bad),
            Err(RewardsError::InvalidParameterSet(ParameterError::WeightSplit(_)))
        ));
    }

    #[test]
    fn keeper_management() {
        let mut s = store();
        let k = Address([3; 32]);
        assert!(!s.is_keeper(&k));
        assert!(s.add_keeper(&GOV, k).unwrap());
        assert!(!s.add_keeper(&GOV, k).unwrap());
        assert!(s.is_keeper(&k));
        assert!(s.remove_keeper(&GOV, &k).unwrap());
        assert!(!s.is_keeper(&k));
    }

    #[test]
    fn invalid_initial_params_rejected() {
        let bad = MiningParameters { lp_share: 0, ..Default::default() };
        assert!(GovernanceParameterStore::new(GOV, bad, []).is_err());
    }
}
