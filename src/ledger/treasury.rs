use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use crate::state::{AccountId, Amount};

/// Stake custody failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("{account} holds {available}, needs {required}")]
    InsufficientFunds {
        account: AccountId,
        required: Amount,
        available: Amount,
    },

    #[error("Escrow holds {available}, payout needs {required}")]
    EscrowShortfall { required: Amount, available: Amount },

    #[error("Treasury unavailable: {0}")]
    Unavailable(String),
}

/// Custody of escrowed stakes
#[async_trait]
pub trait Treasury: Send + Sync {
    /// Move `amount` from `from` into escrow
    async fn collect(&self, from: &AccountId, amount: Amount) -> Result<(), TreasuryError>;

    /// Release `amount` from escrow to `to`
    async fn pay(&self, to: &AccountId, amount: Amount) -> Result<(), TreasuryError>;

    /// Total currently held in escrow
    fn escrowed(&self) -> Amount;
}

/// Account-balance treasury kept in memory
#[derive(Debug, Default)]
pub struct InMemoryTreasury {
    balances: DashMap<AccountId, Amount>,
    escrow: Mutex<Amount>,
}

impl InMemoryTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` outside of any claim
    pub fn fund(&self, account: &AccountId, amount: Amount) {
        let mut balance = self.balances.entry(account.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).map(|b| *b).unwrap_or(0)
    }
}

#[async_trait]
impl Treasury for InMemoryTreasury {
    async fn collect(&self, from: &AccountId, amount: Amount) -> Result<(), TreasuryError> {
        let mut balance = self.balances.entry(from.clone()).or_insert(0);
        if *balance < amount {
            return Err(TreasuryError::InsufficientFunds {
                account: from.clone(),
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        let mut escrow = self.escrow.lock();
        *escrow = escrow.saturating_add(amount);
        Ok(())
    }

    async fn pay(&self, to: &AccountId, amount: Amount) -> Result<(), TreasuryError> {
        {
            let mut escrow = self.escrow.lock();
            if *escrow < amount {
                return Err(TreasuryError::EscrowShortfall {
                    required: amount,
                    available: *escrow,
                });
            }
            *escrow -= amount;
        }
        self.fund(to, amount);
        Ok(())
    }

    fn escrowed(&self) -> Amount {
        *self.escrow.lock()
    }
}
