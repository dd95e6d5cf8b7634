//! Shared types and helpers for StakePlay contracts.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{contracterror, contracttype};

/// Points awarded per correctly predicted pick.
pub const POINTS_PER_CORRECT: u32 = 10;

/// The two platform currencies. Coins are entertainment-only play money;
/// Cash is a redeemable sweepstakes credit. A challenge and every ledger
/// entry carry exactly one of them; the two never intermix.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Currency {
    Coins = 0,
    Cash = 1,
}

/// Common error codes used across StakePlay contracts.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Error {
    InvalidAmount = 1,
    EmptySplit = 2,
    Overflow = 3,
}

/// Score for an entry with `correct` predictions marked correct.
pub fn score_for(correct: u32) -> u32 {
    correct * POINTS_PER_CORRECT
}

/// Split `pool` evenly among `winners` recipients.
///
/// Returns `(share, remainder)` where `remainder < winners`. The caller
/// decides how the remainder units are assigned; it is never dropped.
pub fn split_pool(pool: i128, winners: u32) -> Result<(i128, i128), Error> {
    if pool < 0 {
        return Err(Error::InvalidAmount);
    }
    if winners == 0 {
        return Err(Error::EmptySplit);
    }
    let n = winners as i128;
    let share = pool.checked_div(n).ok_or(Error::Overflow)?;
    let remainder = pool.checked_rem(n).ok_or(Error::Overflow)?;
    Ok((share, remainder))
}
