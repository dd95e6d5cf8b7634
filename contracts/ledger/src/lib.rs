//! StakePlay Ledger Contract
//!
//! Append-only record of every balance-affecting operation per user per
//! currency, plus the cached wallet balances derived from it. Funds move
//! only through `charge`, `credit`, and admin `adjust`; nothing else writes
//! a balance.
//!
//! ## Storage Strategy
//! - `instance()`: Admin, Paused, Operator registry, NextEntryId. Small,
//!   fixed-size contract config sharing one ledger entry and TTL.
//! - `persistent()`: one `Entry(id)` record per ledger entry, one
//!   `Balance(user, currency)` per wallet, and the per-reference /
//!   per-currency accounting counters. Each has its own TTL, bumped on
//!   every write.
//!
//! ## Invariant
//! `Balance(user, currency)` equals the sum of all entries for that user
//! and currency at all times: the balance write and the entry append happen
//! in the same invocation, and a failed invocation rolls both back. A
//! balance is never negative; `charge` and `adjust` refuse any operation
//! that would take it below zero.
#![no_std]
#![allow(unexpected_cfgs)]

use shared::Currency;
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env,
};

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    NotAuthorized = 3,
    InvalidAmount = 4,
    InvalidKind = 5,
    InsufficientBalance = 6,
    EntryNotFound = 7,
    Overflow = 8,
    ContractPaused = 9,
    AlreadyPaused = 10,
    NotPaused = 11,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

/// What a ledger entry represents.
///
/// `ChargeEntry`/`Refund`/`Prize` are the prize-pool flows: their net per
/// challenge reference must return to zero once the challenge is terminal.
/// `ChargeFee`/`RefundFee` are processing-fee flows tracked separately as
/// platform revenue. `Adjustment` is a manual admin edit outside both.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntryKind {
    ChargeEntry = 0,
    ChargeFee = 1,
    Refund = 2,
    RefundFee = 3,
    Prize = 4,
    Adjustment = 5,
}

/// Immutable record of one balance-affecting operation. `amount` is signed:
/// negative for charges, positive for credits and positive adjustments.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedgerEntry {
    pub id: u64,
    pub user: Address,
    pub currency: Currency,
    pub amount: i128,
    pub kind: EntryKind,
    /// Challenge id this entry belongs to; 0 for adjustments.
    pub reference: u64,
    pub created_at: u64,
}

#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Paused,
    NextEntryId,
    Operator(Address),
    // --- persistent() ---
    Entry(u64),
    Balance(Address, Currency),
    /// Net of ChargeEntry/Refund/Prize amounts per challenge reference.
    RefNet(u64),
    /// Net of ChargeFee/RefundFee amounts per challenge reference.
    RefFees(u64),
    /// Platform revenue: net processing fees collected per currency.
    FeeRevenue(Currency),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Initialized {
    pub admin: Address,
}

#[contractevent]
pub struct OperatorSet {
    #[topic]
    pub operator: Address,
    pub authorized: bool,
}

#[contractevent]
pub struct Charged {
    #[topic]
    pub user: Address,
    #[topic]
    pub reference: u64,
    pub currency: Currency,
    pub amount: i128,
    pub kind: EntryKind,
    pub entry_id: u64,
}

#[contractevent]
pub struct Credited {
    #[topic]
    pub user: Address,
    #[topic]
    pub reference: u64,
    pub currency: Currency,
    pub amount: i128,
    pub kind: EntryKind,
    pub entry_id: u64,
}

#[contractevent]
pub struct Adjusted {
    #[topic]
    pub user: Address,
    pub currency: Currency,
    pub amount: i128,
    pub entry_id: u64,
}

#[contractevent]
pub struct PauseChanged {
    pub paused: bool,
    pub admin: Address,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct Ledger;

#[contractimpl]
impl Ledger {
    /// Initialize the ledger. May only be called once.
    pub fn init(env: Env, admin: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Paused, &false);
        env.storage().instance().set(&DataKey::NextEntryId, &0u64);

        Initialized { admin }.publish(&env);

        Ok(())
    }

    /// Authorize or deauthorize an operator contract (e.g., the challenge
    /// hub) to move funds. Admin only.
    pub fn set_operator(
        env: Env,
        admin: Address,
        operator: Address,
        authorized: bool,
    ) -> Result<(), Error> {
        require_admin(&env, &admin)?;

        env.storage()
            .instance()
            .set(&DataKey::Operator(operator.clone()), &authorized);

        OperatorSet {
            operator,
            authorized,
        }
        .publish(&env);

        Ok(())
    }

    /// Debit `amount` from `user`'s wallet and append the matching entry.
    ///
    /// Fails with `InsufficientBalance` if the resulting balance would go
    /// negative. The balance check, the balance write, and the entry append
    /// are one invocation: a concurrent spend against the same wallet cannot
    /// pass a check computed against a stale read, and a read after this
    /// call returns reflects the charge.
    pub fn charge(
        env: Env,
        operator: Address,
        user: Address,
        currency: Currency,
        amount: i128,
        kind: EntryKind,
        reference: u64,
    ) -> Result<u64, Error> {
        require_operator(&env, &operator)?;
        ensure_not_paused(&env)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        if !matches!(kind, EntryKind::ChargeEntry | EntryKind::ChargeFee) {
            return Err(Error::InvalidKind);
        }

        let balance = get_balance(&env, &user, currency);
        if amount > balance {
            return Err(Error::InsufficientBalance);
        }
        let new_balance = balance.checked_sub(amount).ok_or(Error::Overflow)?;
        set_balance(&env, &user, currency, new_balance);

        track_flow(&env, kind, currency, reference, -amount)?;

        let entry_id = append_entry(&env, &user, currency, -amount, kind, reference)?;

        Charged {
            user,
            reference,
            currency,
            amount,
            kind,
            entry_id,
        }
        .publish(&env);

        Ok(entry_id)
    }

    /// Credit `amount` to `user`'s wallet and append the matching entry.
    /// Crediting cannot fail on balance grounds.
    pub fn credit(
        env: Env,
        operator: Address,
        user: Address,
        currency: Currency,
        amount: i128,
        kind: EntryKind,
        reference: u64,
    ) -> Result<u64, Error> {
        require_operator(&env, &operator)?;
        ensure_not_paused(&env)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        if !matches!(
            kind,
            EntryKind::Refund | EntryKind::RefundFee | EntryKind::Prize
        ) {
            return Err(Error::InvalidKind);
        }

        let balance = get_balance(&env, &user, currency);
        let new_balance = balance.checked_add(amount).ok_or(Error::Overflow)?;
        set_balance(&env, &user, currency, new_balance);

        track_flow(&env, kind, currency, reference, amount)?;

        let entry_id = append_entry(&env, &user, currency, amount, kind, reference)?;

        Credited {
            user,
            reference,
            currency,
            amount,
            kind,
            entry_id,
        }
        .publish(&env);

        Ok(entry_id)
    }

    /// Manual balance edit. Admin only; recorded as an `Adjustment` entry
    /// with reference 0 and excluded from the per-reference accounting.
    /// Still may not take a balance below zero.
    pub fn adjust(
        env: Env,
        admin: Address,
        user: Address,
        currency: Currency,
        amount: i128,
    ) -> Result<u64, Error> {
        require_admin(&env, &admin)?;
        ensure_not_paused(&env)?;

        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let balance = get_balance(&env, &user, currency);
        let new_balance = balance.checked_add(amount).ok_or(Error::Overflow)?;
        if new_balance < 0 {
            return Err(Error::InsufficientBalance);
        }
        set_balance(&env, &user, currency, new_balance);

        let entry_id = append_entry(&env, &user, currency, amount, EntryKind::Adjustment, 0)?;

        Adjusted {
            user,
            currency,
            amount,
            entry_id,
        }
        .publish(&env);

        Ok(entry_id)
    }

    /// Current wallet balance for `user` in `currency`.
    pub fn balance(env: Env, user: Address, currency: Currency) -> i128 {
        get_balance(&env, &user, currency)
    }

    /// Number of entries appended so far; ids run `0..entry_count`.
    pub fn entry_count(env: Env) -> u64 {
        env.storage()
            .instance()
            .get(&DataKey::NextEntryId)
            .unwrap_or(0)
    }

    pub fn get_entry(env: Env, id: u64) -> Result<LedgerEntry, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Entry(id))
            .ok_or(Error::EntryNotFound)
    }

    /// Net of all entry-fee, refund, and prize flows for a challenge
    /// reference. Zero for every challenge that reached a terminal state.
    pub fn reference_net(env: Env, reference: u64) -> i128 {
        get_i128(&env, DataKey::RefNet(reference))
    }

    /// Net processing fees currently retained for a challenge reference.
    pub fn reference_fees(env: Env, reference: u64) -> i128 {
        get_i128(&env, DataKey::RefFees(reference))
    }

    /// Platform revenue: net processing fees collected in `currency`.
    pub fn fee_revenue(env: Env, currency: Currency) -> i128 {
        get_i128(&env, DataKey::FeeRevenue(currency))
    }

    pub fn pause(env: Env, admin: Address) -> Result<(), Error> {
        require_admin(&env, &admin)?;
        if is_paused(&env) {
            return Err(Error::AlreadyPaused);
        }
        env.storage().instance().set(&DataKey::Paused, &true);
        PauseChanged {
            paused: true,
            admin,
        }
        .publish(&env);
        Ok(())
    }

    pub fn unpause(env: Env, admin: Address) -> Result<(), Error> {
        require_admin(&env, &admin)?;
        if !is_paused(&env) {
            return Err(Error::NotPaused);
        }
        env.storage().instance().set(&DataKey::Paused, &false);
        PauseChanged {
            paused: false,
            admin,
        }
        .publish(&env);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

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

fn require_operator(env: &Env, caller: &Address) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    caller.require_auth();
    if !env
        .storage()
        .instance()
        .get(&DataKey::Operator(caller.clone()))
        .unwrap_or(false)
    {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn is_paused(env: &Env) -> bool {
    env.storage()
        .instance()
        .get(&DataKey::Paused)
        .unwrap_or(false)
}

fn ensure_not_paused(env: &Env) -> Result<(), Error> {
    if is_paused(env) {
        return Err(Error::ContractPaused);
    }
    Ok(())
}

fn get_balance(env: &Env, user: &Address, currency: Currency) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Balance(user.clone(), currency))
        .unwrap_or(0)
}

fn set_balance(env: &Env, user: &Address, currency: Currency, balance: i128) {
    let key = DataKey::Balance(user.clone(), currency);
    env.storage().persistent().set(&key, &balance);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

fn get_i128(env: &Env, key: DataKey) -> i128 {
    env.storage().persistent().get(&key).unwrap_or(0)
}

fn add_i128(env: &Env, key: DataKey, delta: i128) -> Result<(), Error> {
    let current: i128 = env.storage().persistent().get(&key).unwrap_or(0);
    let updated = current.checked_add(delta).ok_or(Error::Overflow)?;
    env.storage().persistent().set(&key, &updated);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
    Ok(())
}

/// Route a signed flow into the per-reference and per-currency counters.
/// Fee kinds accrue to platform revenue; the rest net against the prize
/// pool for their reference.
fn track_flow(
    env: &Env,
    kind: EntryKind,
    currency: Currency,
    reference: u64,
    signed_amount: i128,
) -> Result<(), Error> {
    match kind {
        EntryKind::ChargeFee | EntryKind::RefundFee => {
            // Fees collected are negative flows out of the user; revenue
            // accrues with the opposite sign.
            add_i128(env, DataKey::RefFees(reference), -signed_amount)?;
            add_i128(env, DataKey::FeeRevenue(currency), -signed_amount)?;
        }
        EntryKind::ChargeEntry | EntryKind::Refund | EntryKind::Prize => {
            add_i128(env, DataKey::RefNet(reference), signed_amount)?;
        }
        EntryKind::Adjustment => {}
    }
    Ok(())
}

fn append_entry(
    env: &Env,
    user: &Address,
    currency: Currency,
    signed_amount: i128,
    kind: EntryKind,
    reference: u64,
) -> Result<u64, Error> {
    let id: u64 = env
        .storage()
        .instance()
        .get(&DataKey::NextEntryId)
        .unwrap_or(0);
    let next = id.checked_add(1).ok_or(Error::Overflow)?;
    env.storage().instance().set(&DataKey::NextEntryId, &next);

    let entry = LedgerEntry {
        id,
        user: user.clone(),
        currency,
        amount: signed_amount,
        kind,
        reference,
        created_at: env.ledger().timestamp(),
    };
    let key = DataKey::Entry(id);
    env.storage().persistent().set(&key, &entry);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

    Ok(id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
