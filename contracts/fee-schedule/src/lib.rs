//! StakePlay Fee Schedule Contract
//!
//! Admin-editable table mapping (currency, entry amount) to the processing
//! fee charged on top of a challenge entry. Lookup is exact-match only: an
//! entry amount without a row is an error, never a default of zero.
//!
//! Callers snapshot the fee (and the schedule version it was read at) onto
//! the challenge at creation time; later edits to the schedule do not
//! retroactively change existing challenges.
#![no_std]
#![allow(unexpected_cfgs)]

use shared::Currency;
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env,
};

pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    NotAuthorized = 3,
    InvalidAmount = 4,
    UnknownEntryTier = 5,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Version,
    Row(Currency, i128),
}

#[contractevent]
pub struct Initialized {
    pub admin: Address,
}

#[contractevent]
pub struct RowSet {
    pub currency: Currency,
    pub entry_amount: i128,
    pub processing_fee: i128,
    pub version: u32,
}

#[contractevent]
pub struct RowRemoved {
    pub currency: Currency,
    pub entry_amount: i128,
    pub version: u32,
}

#[contract]
pub struct FeeSchedule;

#[contractimpl]
impl FeeSchedule {
    pub fn init(env: Env, admin: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Version, &0u32);

        Initialized { admin }.publish(&env);

        Ok(())
    }

    /// Create or replace the row for (currency, entry_amount). Admin only.
    /// A zero fee is a valid row; absence of a row is what makes lookup fail.
    pub fn set_row(
        env: Env,
        admin: Address,
        currency: Currency,
        entry_amount: i128,
        processing_fee: i128,
    ) -> Result<(), Error> {
        require_admin(&env, &admin)?;

        if entry_amount <= 0 || processing_fee < 0 {
            return Err(Error::InvalidAmount);
        }

        env.storage()
            .instance()
            .set(&DataKey::Row(currency, entry_amount), &processing_fee);
        let version = bump_version(&env);

        env.storage()
            .instance()
            .extend_ttl(PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        RowSet {
            currency,
            entry_amount,
            processing_fee,
            version,
        }
        .publish(&env);

        Ok(())
    }

    pub fn remove_row(
        env: Env,
        admin: Address,
        currency: Currency,
        entry_amount: i128,
    ) -> Result<(), Error> {
        require_admin(&env, &admin)?;

        let key = DataKey::Row(currency, entry_amount);
        if !env.storage().instance().has(&key) {
            return Err(Error::UnknownEntryTier);
        }
        env.storage().instance().remove(&key);
        let version = bump_version(&env);

        RowRemoved {
            currency,
            entry_amount,
            version,
        }
        .publish(&env);

        Ok(())
    }

    /// Exact-match fee lookup. Used only at challenge create/join time; the
    /// result is snapshotted by the caller and never re-looked-up.
    pub fn lookup_fee(env: Env, currency: Currency, entry_amount: i128) -> Result<i128, Error> {
        if !env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::NotInitialized);
        }

        env.storage()
            .instance()
            .get(&DataKey::Row(currency, entry_amount))
            .ok_or(Error::UnknownEntryTier)
    }

    /// Monotonic counter bumped on every schedule edit.
    pub fn version(env: Env) -> u32 {
        env.storage().instance().get(&DataKey::Version).unwrap_or(0)
    }
}

fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn bump_version(env: &Env) -> u32 {
    let version: u32 = env.storage().instance().get(&DataKey::Version).unwrap_or(0);
    let next = version.saturating_add(1);
    env.storage().instance().set(&DataKey::Version, &next);
    next
}

#[cfg(test)]
mod tests;
