use serde::{Serialize, Deserialize};

use crate::ledger::Claim;
use crate::state::Amount;

/// Economics of submitting a challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitModel {
    /// Stake escrowed with each challenge
    pub challenge_stake: Amount,
    /// Expected cost of submitting the challenge and the resolution
    pub estimated_gas_cost: Amount,
    /// Challenges are only submitted when the expected profit exceeds this
    pub min_profit: Amount,
}

impl Default for ProfitModel {
    fn default() -> Self {
        Self {
            challenge_stake: 1_000_000_000_000_000,
            estimated_gas_cost: 100_000_000_000_000,
            min_profit: 0,
        }
    }
}

impl ProfitModel {
    /// Both stakes go to the winning challenger
    pub fn potential_reward(&self, claim: &Claim) -> Amount {
        claim.stake.saturating_add(self.challenge_stake)
    }

    /// `potential_reward - challenge_stake - estimated_gas_cost`; may be negative
    pub fn expected_profit(&self, claim: &Claim) -> i128 {
        let reward = self.potential_reward(claim).min(i128::MAX as u128) as i128;
        let costs = self
            .challenge_stake
            .saturating_add(self.estimated_gas_cost)
            .min(i128::MAX as u128) as i128;
        reward - costs
    }

    pub fn is_profitable(&self, expected_profit: i128) -> bool {
        expected_profit > self.min_profit.min(i128::MAX as u128) as i128
    }
}
