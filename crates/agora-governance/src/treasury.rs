//! Treasury ledger.
//!
//! Holds the pooled balance and an append-only transaction log. Deposits are
//! unconditional; the only way out is a disbursement made while executing a
//! fund allocation proposal.

use agora_types::{Address, Amount, Height};
use serde::{Deserialize, Serialize};
use crate::error::GovernanceError;
use crate::repository::{MemoryRepository, Repository};

/// Kind of treasury movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Funds paid in
    Deposit { source: Address },
    /// Funds paid out for an executed proposal
    Disbursement { proposal_id: u64, recipient: Address },
}

/// Audit record of a treasury movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryTransaction {
    pub id: u64,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub height: Height,
}

impl TreasuryTransaction {
    pub fn is_disbursement(&self) -> bool {
        matches!(self.kind, TransactionKind::Disbursement { .. })
    }
}

/// Treasury balance and transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryLedger {
    balance: Amount,
    transactions: MemoryRepository<u64, TreasuryTransaction>,
    next_tx_id: u64,
    total_deposited: Amount,
    total_disbursed: Amount,
}

impl TreasuryLedger {
    pub fn new() -> Self {
        Self {
            balance: 0,
            transactions: MemoryRepository::new(),
            next_tx_id: 1,
            total_deposited: 0,
            total_disbursed: 0,
        }
    }

    /// Deposit funds into treasury.
    pub fn deposit(&mut self, source: Address, amount: Amount, now: Height) -> Result<u64, GovernanceError> {
        let balance = self.balance.checked_add(amount).ok_or(GovernanceError::Overflow)?;
        let total_deposited = self
            .total_deposited
            .checked_add(amount)
            .ok_or(GovernanceError::Overflow)?;

        let id = self.append(TransactionKind::Deposit { source }, amount, now)?;
        self.balance = balance;
        self.total_deposited = total_deposited;
        Ok(id)
    }

    /// Check that `amount` could be disbursed right now.
    pub fn ensure_available(&self, amount: Amount) -> Result<(), GovernanceError> {
        if amount > self.balance {
            return Err(GovernanceError::TreasuryInsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Pay `amount` to `recipient` for an executed proposal.
    ///
    /// Crate-private: only the execution path of the engine may call this.
    pub(crate) fn debit(
        &mut self,
        proposal_id: u64,
        recipient: Address,
        amount: Amount,
        now: Height,
    ) -> Result<u64, GovernanceError> {
        self.ensure_available(amount)?;
        let total_disbursed = self
            .total_disbursed
            .checked_add(amount)
            .ok_or(GovernanceError::Overflow)?;

        let id = self.append(
            TransactionKind::Disbursement {
                proposal_id,
                recipient,
            },
            amount,
            now,
        )?;
        // ensure_available guarantees amount <= balance
        self.balance -= amount;
        self.total_disbursed = total_disbursed;
        Ok(id)
    }

    fn append(&mut self, kind: TransactionKind, amount: Amount, height: Height) -> Result<u64, GovernanceError> {
        let id = self.next_tx_id;
        let next_tx_id = id.checked_add(1).ok_or(GovernanceError::Overflow)?;
        self.transactions.put(
            id,
            TreasuryTransaction {
                id,
                kind,
                amount,
                height,
            },
        );
        self.next_tx_id = next_tx_id;
        Ok(id)
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn transaction(&self, id: u64) -> Option<&TreasuryTransaction> {
        self.transactions.get(&id)
    }

    /// Transactions in id order.
    pub fn transactions(&self) -> impl Iterator<Item = &TreasuryTransaction> {
        self.transactions.values()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn total_disbursed(&self) -> Amount {
        self.total_disbursed
    }

    /// Check the id sequence and totals of a loaded ledger.
    pub fn verify(&self) -> Result<(), GovernanceError> {
        if self.next_tx_id == 0 {
            return Err(GovernanceError::corrupt("next transaction id is zero"));
        }
        for (id, tx) in self.transactions.iter() {
            if tx.id != *id {
                return Err(GovernanceError::corrupt(format!(
                    "transaction stored under {} has id {}",
                    id, tx.id
                )));
            }
            if *id >= self.next_tx_id {
                return Err(GovernanceError::corrupt(format!(
                    "transaction {} not below next id {}",
                    id, self.next_tx_id
                )));
            }
        }
        if self.total_deposited.checked_sub(self.total_disbursed) != Some(self.balance) {
            return Err(GovernanceError::corrupt(format!(
                "treasury balance {} does not match deposits {} minus disbursements {}",
                self.balance, self.total_deposited, self.total_disbursed
            )));
        }
        Ok(())
    }
}

impl Default for TreasuryLedger {
    fn default() -> Self {
        Self::new()
    }
}
