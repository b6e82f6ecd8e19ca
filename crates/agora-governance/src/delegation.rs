//! Delegation registry.
//!
//! A delegator hands its base voting power to a single delegate. The power is
//! captured when the delegation is made and is not recomputed when the
//! delegator stakes again later; the delegate's aggregate only moves when a
//! delegation is created, replaced or revoked.
//!
//! Delegation is not transitive: if B delegates to C, C receives B's base
//! power only, not the power B received from others.

use agora_types::{Address, Amount, Height};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use crate::error::GovernanceError;
use crate::repository::{MemoryRepository, Repository};

/// Delegation record, one per delegator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Delegator (who is delegating)
    pub delegator: Address,
    /// Delegate (who receives voting power)
    pub delegate: Address,
    /// Height when the delegation was made
    pub delegated_at: Height,
    /// Whether delegation is still active
    pub active: bool,
    /// Power added to the delegate's aggregate when the delegation was made
    pub power: Amount,
    /// Height when revoked (if revoked)
    pub revoked_at: Option<Height>,
}

impl Delegation {
    pub fn new(delegator: Address, delegate: Address, power: Amount, delegated_at: Height) -> Self {
        Self {
            delegator,
            delegate,
            delegated_at,
            active: true,
            power,
            revoked_at: None,
        }
    }

    /// Inactive copy of this delegation.
    pub fn revoked(&self, height: Height) -> Self {
        Self {
            active: false,
            revoked_at: Some(height),
            ..*self
        }
    }
}

/// Power delegated to a single delegate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedPower {
    pub total_power: Amount,
    pub delegator_count: u32,
}

impl DelegatedPower {
    /// Aggregate after adding one delegator's contribution.
    pub fn with(&self, power: Amount) -> Result<Self, GovernanceError> {
        Ok(Self {
            total_power: self
                .total_power
                .checked_add(power)
                .ok_or(GovernanceError::Overflow)?,
            delegator_count: self
                .delegator_count
                .checked_add(1)
                .ok_or(GovernanceError::Overflow)?,
        })
    }

    /// Aggregate after removing one delegator's contribution.
    ///
    /// # Panics
    /// If the contribution was never added. That means the registry lost an
    /// update and can no longer be trusted.
    pub fn without(&self, power: Amount) -> Self {
        match (
            self.total_power.checked_sub(power),
            self.delegator_count.checked_sub(1),
        ) {
            (Some(total_power), Some(delegator_count)) => Self {
                total_power,
                delegator_count,
            },
            _ => panic!(
                "delegated power aggregate underflow: removing {} from {:?}",
                power, self
            ),
        }
    }
}

/// Delegations and per-delegate aggregates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegationRegistry {
    /// delegator -> latest delegation record
    delegations: MemoryRepository<Address, Delegation>,
    /// delegate -> aggregate of active delegations
    aggregates: MemoryRepository<Address, DelegatedPower>,
}

impl DelegationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate `from`'s base power (`power`) to `to`.
    ///
    /// An existing active delegation is replaced: its contribution leaves the
    /// old delegate's aggregate in the same update that adds the new one.
    pub fn delegate(
        &mut self,
        from: Address,
        to: Address,
        power: Amount,
        now: Height,
    ) -> Result<Delegation, GovernanceError> {
        if from == to {
            return Err(GovernanceError::SelfDelegation);
        }

        // Stage every aggregate change before touching the repositories
        let mut staged: Vec<(Address, DelegatedPower)> = Vec::with_capacity(2);
        let previous = self.active_delegation(&from).copied();
        if let Some(prev) = previous {
            let current = self.delegated_power(&prev.delegate);
            staged.push((prev.delegate, current.without(prev.power)));
        }

        let base = staged
            .iter()
            .find(|(addr, _)| *addr == to)
            .map(|(_, aggregate)| *aggregate)
            .unwrap_or_else(|| self.delegated_power(&to));
        let updated = base.with(power)?;
        staged.retain(|(addr, _)| *addr != to);
        staged.push((to, updated));

        let delegation = Delegation::new(from, to, power, now);
        for (addr, aggregate) in staged {
            self.aggregates.put(addr, aggregate);
        }
        self.delegations.put(from, delegation);

        info!(
            delegator = %from,
            delegate = %to,
            power,
            replaced = ?previous.map(|p| p.delegate),
            "delegation recorded"
        );
        Ok(delegation)
    }

    /// Revoke `from`'s active delegation.
    pub fn revoke(&mut self, from: Address, now: Height) -> Result<Delegation, GovernanceError> {
        let current = self
            .active_delegation(&from)
            .copied()
            .ok_or_else(|| GovernanceError::NotAuthorized(format!("{} has no active delegation", from)))?;

        let aggregate = self.delegated_power(&current.delegate).without(current.power);
        let revoked = current.revoked(now);

        self.aggregates.put(current.delegate, aggregate);
        self.delegations.put(from, revoked);

        info!(delegator = %from, delegate = %current.delegate, power = current.power, "delegation revoked");
        Ok(revoked)
    }

    /// Latest delegation record for `delegator`, active or not.
    pub fn delegation(&self, delegator: &Address) -> Option<&Delegation> {
        self.delegations.get(delegator)
    }

    fn active_delegation(&self, delegator: &Address) -> Option<&Delegation> {
        self.delegations.get(delegator).filter(|d| d.active)
    }

    /// Check if an address has delegated its power away.
    pub fn is_delegating(&self, address: &Address) -> bool {
        self.active_delegation(address).is_some()
    }

    /// Aggregate for `delegate`; zero if nobody delegates to it.
    pub fn delegated_power(&self, delegate: &Address) -> DelegatedPower {
        self.aggregates.get(delegate).copied().unwrap_or_default()
    }

    /// Check that every aggregate is exactly the sum of the active
    /// contributions pointing at its delegate.
    pub fn verify(&self) -> Result<(), GovernanceError> {
        let mut expected: BTreeMap<Address, DelegatedPower> = BTreeMap::new();
        for (delegator, delegation) in self.delegations.iter() {
            if delegation.delegator != *delegator {
                return Err(GovernanceError::corrupt(format!(
                    "delegation stored under {} belongs to {}",
                    delegator, delegation.delegator
                )));
            }
            if delegation.delegator == delegation.delegate {
                return Err(GovernanceError::corrupt(format!("{} delegates to itself", delegator)));
            }
            if delegation.active {
                let entry = expected.entry(delegation.delegate).or_default();
                *entry = entry.with(delegation.power).map_err(|_| {
                    GovernanceError::corrupt(format!("aggregate of {} overflows", delegation.delegate))
                })?;
            }
        }

        for (delegate, aggregate) in self.aggregates.iter() {
            let want = expected.remove(delegate).unwrap_or_default();
            if *aggregate != want {
                return Err(GovernanceError::corrupt(format!(
                    "aggregate of {} is {:?}, active delegations give {:?}",
                    delegate, aggregate, want
                )));
            }
        }
        if let Some((delegate, want)) = expected.into_iter().next() {
            return Err(GovernanceError::corrupt(format!(
                "no aggregate for {}, active delegations give {:?}",
                delegate, want
            )));
        }
        Ok(())
    }

    /// Active delegators of `delegate`.
    pub fn delegators(&self, delegate: &Address) -> Vec<Address> {
        self.delegations
            .values()
            .filter(|d| d.active && d.delegate == *delegate)
            .map(|d| d.delegator)
            .collect()
    }
}
