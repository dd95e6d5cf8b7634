//! StakePlay Challenge Hub Contract
//!
//! The challenge aggregate for peer-to-peer prediction contests:
//! configuration, membership, lifecycle state, and settlement outcome.
//! Entry fees and processing fees are charged, held, refunded, and
//! distributed through the StakePlay ledger contract; the fee schedule is
//! consulted once at creation time and the result snapshotted for the life
//! of the challenge, so later schedule edits never touch existing
//! challenges.
//!
//! ## Lifecycle
//! `Open` (accepting entries) → `Active` (full, awaiting results) →
//! `Settled` (payouts realized) | `Expired` (refunded). Terminal states are
//! absorbing. The settle and sweep paths are the only writers of terminal
//! state and per-entry results, and both are gated on the current state, so
//! a challenge settles or expires at most once.
//!
//! ## Atomicity
//! Every entrypoint is a single invocation whose storage writes roll back
//! on error: the capacity check, duplicate check, ledger charge, entry
//! insert, and seat-count increment of `join` all commit or none do. Two
//! joins racing for the last seat serialize; exactly one succeeds, the
//! other sees `ChallengeFull`.
#![no_std]
#![allow(unexpected_cfgs)]

use fee_schedule::FeeScheduleClient;
use ledger::{EntryKind, LedgerClient};
use shared::{score_for, split_pool, Currency};
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env, String,
    Symbol, Vec,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_PREDICTIONS: u32 = 2;
pub const MAX_PREDICTIONS: u32 = 6;
pub const MIN_PLAYERS: u32 = 2;
pub const MAX_PLAYERS: u32 = 10;

/// Seconds an `Active` challenge may wait for results before the sweeper is
/// allowed to expire and refund it.
pub const RESULTS_GRACE_SECS: u64 = 604_800;

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
    InvalidConfig = 4,
    WrongPredictionCount = 5,
    InvalidPredictions = 6,
    UnknownEntryTier = 7,
    ChallengeNotFound = 8,
    NotOpen = 9,
    ChallengeFull = 10,
    AlreadyJoined = 11,
    NotJoined = 12,
    InsufficientBalance = 13,
    NotActive = 14,
    AlreadySettled = 15,
    NotExpirable = 16,
    LedgerFailure = 17,
    FeeScheduleFailure = 18,
    Overflow = 19,
    ContractPaused = 20,
    AlreadyPaused = 21,
    NotPaused = 22,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChallengeState {
    Open = 0,
    Active = 1,
    Settled = 2,
    Expired = 3,
}

/// One pick: an external subject (match, event, question) and the selection
/// the player committed to for it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prediction {
    pub subject: Symbol,
    pub selection: Symbol,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChallengeData {
    pub id: u64,
    pub name: String,
    pub currency: Currency,
    pub entry_fee: i128,
    /// Processing fee snapshotted from the fee schedule at creation;
    /// never re-looked-up.
    pub processing_fee: i128,
    /// Schedule version the snapshot was taken at.
    pub fee_version: u32,
    pub num_predictions: u32,
    pub max_players: u32,
    pub current_players: u32,
    pub state: ChallengeState,
    pub created_by: Address,
    pub created_at: u64,
    /// Last moment the challenge accepts joins while `Open`.
    pub deadline: u64,
    /// Set when the last seat fills; 0 while `Open`.
    pub activated_at: u64,
    /// Set on the transition into `Settled` or `Expired`; 0 before.
    pub resolved_at: u64,
}

/// One user's participation in a challenge. `score`, `rank`, `is_winner`,
/// and `prize_amount` are meaningful only once the challenge is `Settled`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryData {
    pub user: Address,
    pub joined_at: u64,
    pub predictions: Vec<Prediction>,
    pub score: u32,
    pub rank: u32,
    pub is_winner: bool,
    pub prize_amount: i128,
}

#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Ledger,
    FeeSchedule,
    Paused,
    NextChallengeId,
    // --- persistent() ---
    Challenge(u64),
    /// Entrants in join order; the order decides remainder assignment.
    Players(u64),
    Entry(u64, Address),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Initialized {
    pub admin: Address,
    pub ledger: Address,
    pub fee_schedule: Address,
}

#[contractevent]
pub struct ChallengeCreated {
    #[topic]
    pub challenge_id: u64,
    pub created_by: Address,
    pub currency: Currency,
    pub entry_fee: i128,
    pub processing_fee: i128,
    pub max_players: u32,
}

#[contractevent]
pub struct PlayerJoined {
    #[topic]
    pub challenge_id: u64,
    #[topic]
    pub player: Address,
    pub player_count: u32,
}

#[contractevent]
pub struct PlayerLeft {
    #[topic]
    pub challenge_id: u64,
    #[topic]
    pub player: Address,
    pub player_count: u32,
}

#[contractevent]
pub struct ChallengeActivated {
    #[topic]
    pub challenge_id: u64,
    pub player_count: u32,
}

#[contractevent]
pub struct ChallengeSettled {
    #[topic]
    pub challenge_id: u64,
    pub pool: i128,
    pub winner_count: u32,
    pub void_draw: bool,
}

#[contractevent]
pub struct ChallengeExpired {
    #[topic]
    pub challenge_id: u64,
    pub players_refunded: u32,
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
pub struct ChallengeHub;

#[contractimpl]
impl ChallengeHub {
    /// Initialize the hub with its admin and collaborator contracts. The
    /// hub must also be registered as an operator on the ledger before it
    /// can move funds.
    pub fn init(
        env: Env,
        admin: Address,
        ledger: Address,
        fee_schedule: Address,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Ledger, &ledger);
        env.storage()
            .instance()
            .set(&DataKey::FeeSchedule, &fee_schedule);
        env.storage().instance().set(&DataKey::Paused, &false);
        env.storage().instance().set(&DataKey::NextChallengeId, &1u64);

        Initialized {
            admin,
            ledger,
            fee_schedule,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    /// Create a challenge and enter it as its first player.
    ///
    /// Validates the configuration, snapshots the processing fee for
    /// `(currency, entry_fee)` from the fee schedule, and charges the
    /// creator `entry_fee + processing_fee`. The challenge starts `Open`
    /// with `current_players == 1`.
    pub fn create(
        env: Env,
        creator: Address,
        name: String,
        currency: Currency,
        entry_fee: i128,
        num_predictions: u32,
        max_players: u32,
        deadline: u64,
        predictions: Vec<Prediction>,
    ) -> Result<u64, Error> {
        require_initialized(&env)?;
        ensure_not_paused(&env)?;
        creator.require_auth();

        if name.len() == 0 {
            return Err(Error::InvalidConfig);
        }
        if num_predictions < MIN_PREDICTIONS || num_predictions > MAX_PREDICTIONS {
            return Err(Error::InvalidConfig);
        }
        if max_players < MIN_PLAYERS || max_players > MAX_PLAYERS {
            return Err(Error::InvalidConfig);
        }
        if entry_fee <= 0 {
            return Err(Error::InvalidConfig);
        }
        let now = env.ledger().timestamp();
        if deadline <= now {
            return Err(Error::InvalidConfig);
        }
        validate_predictions(&predictions, num_predictions)?;

        let processing_fee = lookup_fee(&env, currency, entry_fee)?;
        let fee_version = FeeScheduleClient::new(&env, &get_fee_schedule(&env)?).version();

        let challenge_id = next_challenge_id(&env)?;

        charge_escrow(&env, &creator, currency, entry_fee, processing_fee, challenge_id)?;

        let challenge = ChallengeData {
            id: challenge_id,
            name,
            currency,
            entry_fee,
            processing_fee,
            fee_version,
            num_predictions,
            max_players,
            current_players: 1,
            state: ChallengeState::Open,
            created_by: creator.clone(),
            created_at: now,
            deadline,
            activated_at: 0,
            resolved_at: 0,
        };
        save_challenge(&env, &challenge);

        let mut players = Vec::new(&env);
        players.push_back(creator.clone());
        save_players(&env, challenge_id, &players);

        save_entry(
            &env,
            challenge_id,
            &EntryData {
                user: creator.clone(),
                joined_at: now,
                predictions,
                score: 0,
                rank: 0,
                is_winner: false,
                prize_amount: 0,
            },
        );

        ChallengeCreated {
            challenge_id,
            created_by: creator,
            currency,
            entry_fee,
            processing_fee,
            max_players,
        }
        .publish(&env);

        Ok(challenge_id)
    }

    // -----------------------------------------------------------------------
    // join
    // -----------------------------------------------------------------------

    /// Join an open challenge with a full prediction set.
    ///
    /// The state check, capacity check, duplicate check, ledger charge,
    /// entry insert, and seat-count increment are one atomic unit. Filling
    /// the last seat transitions the challenge `Open → Active` in the same
    /// unit.
    pub fn join(
        env: Env,
        challenge_id: u64,
        user: Address,
        predictions: Vec<Prediction>,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        ensure_not_paused(&env)?;
        user.require_auth();

        let mut challenge = get_challenge_data(&env, challenge_id)?;
        let now = env.ledger().timestamp();

        match challenge.state {
            ChallengeState::Open => {
                // Past-deadline challenges stop accepting entries even
                // before the sweeper expires them.
                if now > challenge.deadline {
                    return Err(Error::NotOpen);
                }
            }
            // A full challenge: the losing side of a last-seat race lands
            // here after the winner's join flipped the state.
            ChallengeState::Active => return Err(Error::ChallengeFull),
            ChallengeState::Settled | ChallengeState::Expired => return Err(Error::NotOpen),
        }
        if env
            .storage()
            .persistent()
            .has(&DataKey::Entry(challenge_id, user.clone()))
        {
            return Err(Error::AlreadyJoined);
        }
        if challenge.current_players >= challenge.max_players {
            return Err(Error::ChallengeFull);
        }
        validate_predictions(&predictions, challenge.num_predictions)?;

        charge_escrow(
            &env,
            &user,
            challenge.currency,
            challenge.entry_fee,
            challenge.processing_fee,
            challenge_id,
        )?;

        let mut players = get_players_vec(&env, challenge_id);
        players.push_back(user.clone());
        save_players(&env, challenge_id, &players);

        save_entry(
            &env,
            challenge_id,
            &EntryData {
                user: user.clone(),
                joined_at: now,
                predictions,
                score: 0,
                rank: 0,
                is_winner: false,
                prize_amount: 0,
            },
        );

        challenge.current_players = challenge
            .current_players
            .checked_add(1)
            .ok_or(Error::Overflow)?;
        if challenge.current_players == challenge.max_players {
            challenge.state = ChallengeState::Active;
            challenge.activated_at = now;
            ChallengeActivated {
                challenge_id,
                player_count: challenge.current_players,
            }
            .publish(&env);
        }
        save_challenge(&env, &challenge);

        PlayerJoined {
            challenge_id,
            player: user,
            player_count: challenge.current_players,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // leave
    // -----------------------------------------------------------------------

    /// Withdraw from a challenge that is still `Open`. The player's entry
    /// fee and processing fee are refunded in full and the entry removed.
    /// A challenge whose last entrant leaves has nothing left to settle or
    /// refund and expires immediately.
    pub fn leave(env: Env, challenge_id: u64, user: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        ensure_not_paused(&env)?;
        user.require_auth();

        let mut challenge = get_challenge_data(&env, challenge_id)?;
        if challenge.state != ChallengeState::Open {
            return Err(Error::NotOpen);
        }

        let entry_key = DataKey::Entry(challenge_id, user.clone());
        if !env.storage().persistent().has(&entry_key) {
            return Err(Error::NotJoined);
        }

        refund_escrow(
            &env,
            &user,
            challenge.currency,
            challenge.entry_fee,
            challenge.processing_fee,
            challenge_id,
        )?;

        env.storage().persistent().remove(&entry_key);

        let mut players = get_players_vec(&env, challenge_id);
        for i in 0..players.len() {
            if players.get_unchecked(i) == user {
                players.remove(i);
                break;
            }
        }
        save_players(&env, challenge_id, &players);

        challenge.current_players = challenge
            .current_players
            .checked_sub(1)
            .ok_or(Error::Overflow)?;
        if challenge.current_players == 0 {
            challenge.state = ChallengeState::Expired;
            challenge.resolved_at = env.ledger().timestamp();
            ChallengeExpired {
                challenge_id,
                players_refunded: 0,
            }
            .publish(&env);
        }
        save_challenge(&env, &challenge);

        PlayerLeft {
            challenge_id,
            player: user,
            player_count: challenge.current_players,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // settle
    // -----------------------------------------------------------------------

    /// Settle an `Active` challenge against the authoritative set of
    /// correct predictions. Admin only; result ingestion happens upstream.
    ///
    /// Each entry scores 10 points per prediction present in `correct`; a
    /// prediction absent from `correct` is simply incorrect, never
    /// disqualifying. Entries are ranked by score descending with standard
    /// competition ranking (two entries tied for 1st are both rank 1, the
    /// next distinct score is rank 3). The prize pool is the sum of entry
    /// fees only; processing fees stay with the platform. Rank-1 entries
    /// split the pool evenly, with the integer remainder assigned one unit
    /// at a time in join order. If every entry scores zero the challenge is
    /// a void draw: entry fees are refunded, processing fees are not, and
    /// no winner is declared.
    ///
    /// The `Active` state check makes settlement at-most-once: a second
    /// call sees `Settled` and fails with `AlreadySettled`.
    pub fn settle(
        env: Env,
        admin: Address,
        challenge_id: u64,
        correct: Vec<Prediction>,
    ) -> Result<(), Error> {
        require_admin(&env, &admin)?;
        ensure_not_paused(&env)?;

        let mut challenge = get_challenge_data(&env, challenge_id)?;
        match challenge.state {
            ChallengeState::Active => {}
            ChallengeState::Open => return Err(Error::NotActive),
            ChallengeState::Settled | ChallengeState::Expired => {
                return Err(Error::AlreadySettled)
            }
        }

        let players = get_players_vec(&env, challenge_id);
        let n = players.len();

        // Score every entry before writing anything.
        let mut scores: Vec<u32> = Vec::new(&env);
        let mut top_score = 0u32;
        for player in players.iter() {
            let entry = get_entry_data(&env, challenge_id, &player)?;
            let score = score_for(count_correct(&entry.predictions, &correct));
            if score > top_score {
                top_score = score;
            }
            scores.push_back(score);
        }

        let void_draw = top_score == 0;

        let mut winner_count = 0u32;
        let mut pool = 0i128;
        let mut share = 0i128;
        let mut remainder = 0i128;
        if !void_draw {
            for score in scores.iter() {
                if score == top_score {
                    winner_count += 1;
                }
            }
            pool = challenge
                .entry_fee
                .checked_mul(n as i128)
                .ok_or(Error::Overflow)?;
            let (s, r) = split_pool(pool, winner_count).map_err(|_| Error::Overflow)?;
            share = s;
            remainder = r;
        }

        for i in 0..n {
            let player = players.get_unchecked(i);
            let score = scores.get_unchecked(i);

            let mut rank = 1u32;
            for j in 0..n {
                if scores.get_unchecked(j) > score {
                    rank += 1;
                }
            }

            let mut entry = get_entry_data(&env, challenge_id, &player)?;
            entry.score = score;
            entry.rank = rank;

            if void_draw {
                credit(
                    &env,
                    &player,
                    challenge.currency,
                    challenge.entry_fee,
                    EntryKind::Refund,
                    challenge_id,
                )?;
            } else if rank == 1 {
                let mut prize = share;
                if remainder > 0 {
                    prize += 1;
                    remainder -= 1;
                }
                entry.is_winner = true;
                entry.prize_amount = prize;
                credit(
                    &env,
                    &player,
                    challenge.currency,
                    prize,
                    EntryKind::Prize,
                    challenge_id,
                )?;
            }

            save_entry(&env, challenge_id, &entry);
        }

        challenge.state = ChallengeState::Settled;
        challenge.resolved_at = env.ledger().timestamp();
        save_challenge(&env, &challenge);

        ChallengeSettled {
            challenge_id,
            pool,
            winner_count,
            void_draw,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // sweep
    // -----------------------------------------------------------------------

    /// Expire a stale challenge and refund every entrant in full
    /// (entry fee plus processing fee). Permissionless: anyone may drive
    /// the sweeper.
    ///
    /// A challenge is expirable iff it is `Open` past its deadline, or
    /// `Active` and results have not arrived within `RESULTS_GRACE_SECS`
    /// of activation. The state-conditioned transition makes sweeping
    /// at-most-once and safe to race with itself.
    pub fn sweep(env: Env, challenge_id: u64) -> Result<u32, Error> {
        require_initialized(&env)?;
        ensure_not_paused(&env)?;

        let challenge = get_challenge_data(&env, challenge_id)?;
        sweep_one(&env, challenge)
    }

    /// Drive the sweeper across an id range, skipping challenges that are
    /// not expirable. Returns the number of challenges expired.
    pub fn sweep_batch(env: Env, from_id: u64, to_id: u64) -> Result<u32, Error> {
        require_initialized(&env)?;
        ensure_not_paused(&env)?;

        let highest: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextChallengeId)
            .unwrap_or(1);
        let last = if to_id >= highest { highest - 1 } else { to_id };

        let mut swept = 0u32;
        let mut id = from_id;
        while id <= last {
            let found: Option<ChallengeData> =
                env.storage().persistent().get(&DataKey::Challenge(id));
            if let Some(challenge) = found {
                match sweep_one(&env, challenge) {
                    Ok(_) => swept += 1,
                    Err(Error::NotExpirable) => {}
                    Err(e) => return Err(e),
                }
            }
            id += 1;
        }

        Ok(swept)
    }

    // -----------------------------------------------------------------------
    // getters
    // -----------------------------------------------------------------------

    pub fn get_challenge(env: Env, challenge_id: u64) -> Result<ChallengeData, Error> {
        require_initialized(&env)?;
        get_challenge_data(&env, challenge_id)
    }

    /// Entrants in join order.
    pub fn get_players(env: Env, challenge_id: u64) -> Result<Vec<Address>, Error> {
        require_initialized(&env)?;
        get_challenge_data(&env, challenge_id)?;
        Ok(get_players_vec(&env, challenge_id))
    }

    pub fn get_entry(env: Env, challenge_id: u64, user: Address) -> Result<EntryData, Error> {
        require_initialized(&env)?;
        get_challenge_data(&env, challenge_id)?;
        get_entry_data(&env, challenge_id, &user)
    }

    /// Number of challenges created so far.
    pub fn challenge_count(env: Env) -> u64 {
        let next: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextChallengeId)
            .unwrap_or(1);
        next - 1
    }

    // -----------------------------------------------------------------------
    // pause
    // -----------------------------------------------------------------------

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

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    Ok(())
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

fn get_ledger(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Ledger)
        .ok_or(Error::NotInitialized)
}

fn get_fee_schedule(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::FeeSchedule)
        .ok_or(Error::NotInitialized)
}

fn next_challenge_id(env: &Env) -> Result<u64, Error> {
    let id: u64 = env
        .storage()
        .instance()
        .get(&DataKey::NextChallengeId)
        .unwrap_or(1);
    let next = id.checked_add(1).ok_or(Error::Overflow)?;
    env.storage().instance().set(&DataKey::NextChallengeId, &next);
    Ok(id)
}

fn get_challenge_data(env: &Env, challenge_id: u64) -> Result<ChallengeData, Error> {
    env.storage()
        .persistent()
        .get(&DataKey::Challenge(challenge_id))
        .ok_or(Error::ChallengeNotFound)
}

fn save_challenge(env: &Env, challenge: &ChallengeData) {
    let key = DataKey::Challenge(challenge.id);
    env.storage().persistent().set(&key, challenge);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

fn get_players_vec(env: &Env, challenge_id: u64) -> Vec<Address> {
    env.storage()
        .persistent()
        .get(&DataKey::Players(challenge_id))
        .unwrap_or(Vec::new(env))
}

fn save_players(env: &Env, challenge_id: u64, players: &Vec<Address>) {
    let key = DataKey::Players(challenge_id);
    env.storage().persistent().set(&key, players);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

fn get_entry_data(env: &Env, challenge_id: u64, user: &Address) -> Result<EntryData, Error> {
    env.storage()
        .persistent()
        .get(&DataKey::Entry(challenge_id, user.clone()))
        .ok_or(Error::NotJoined)
}

fn save_entry(env: &Env, challenge_id: u64, entry: &EntryData) {
    let key = DataKey::Entry(challenge_id, entry.user.clone());
    env.storage().persistent().set(&key, entry);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

/// Exactly `expected` predictions, no repeated subject. A repeated subject
/// would let one external result count twice.
fn validate_predictions(predictions: &Vec<Prediction>, expected: u32) -> Result<(), Error> {
    if predictions.len() != expected {
        return Err(Error::WrongPredictionCount);
    }
    for i in 0..predictions.len() {
        let subject = predictions.get_unchecked(i).subject;
        for j in 0..i {
            if predictions.get_unchecked(j).subject == subject {
                return Err(Error::InvalidPredictions);
            }
        }
    }
    Ok(())
}

fn contains_prediction(list: &Vec<Prediction>, prediction: &Prediction) -> bool {
    for candidate in list.iter() {
        if candidate == *prediction {
            return true;
        }
    }
    false
}

fn count_correct(predictions: &Vec<Prediction>, correct: &Vec<Prediction>) -> u32 {
    let mut count = 0u32;
    for prediction in predictions.iter() {
        if contains_prediction(correct, &prediction) {
            count += 1;
        }
    }
    count
}

fn lookup_fee(env: &Env, currency: Currency, entry_fee: i128) -> Result<i128, Error> {
    let client = FeeScheduleClient::new(env, &get_fee_schedule(env)?);
    match client.try_lookup_fee(&currency, &entry_fee) {
        Ok(Ok(fee)) => Ok(fee),
        Err(Ok(fee_schedule::Error::UnknownEntryTier)) => Err(Error::UnknownEntryTier),
        _ => Err(Error::FeeScheduleFailure),
    }
}

fn charge(
    env: &Env,
    user: &Address,
    currency: Currency,
    amount: i128,
    kind: EntryKind,
    reference: u64,
) -> Result<(), Error> {
    let client = LedgerClient::new(env, &get_ledger(env)?);
    match client.try_charge(
        &env.current_contract_address(),
        user,
        &currency,
        &amount,
        &kind,
        &reference,
    ) {
        Ok(_) => Ok(()),
        Err(Ok(ledger::Error::InsufficientBalance)) => Err(Error::InsufficientBalance),
        _ => Err(Error::LedgerFailure),
    }
}

fn credit(
    env: &Env,
    user: &Address,
    currency: Currency,
    amount: i128,
    kind: EntryKind,
    reference: u64,
) -> Result<(), Error> {
    let client = LedgerClient::new(env, &get_ledger(env)?);
    match client.try_credit(
        &env.current_contract_address(),
        user,
        &currency,
        &amount,
        &kind,
        &reference,
    ) {
        Ok(_) => Ok(()),
        _ => Err(Error::LedgerFailure),
    }
}

/// Charge a player's entry fee and processing fee as two ledger entries.
/// A zero processing fee (a valid schedule row) charges nothing.
fn charge_escrow(
    env: &Env,
    user: &Address,
    currency: Currency,
    entry_fee: i128,
    processing_fee: i128,
    reference: u64,
) -> Result<(), Error> {
    charge(env, user, currency, entry_fee, EntryKind::ChargeEntry, reference)?;
    if processing_fee > 0 {
        charge(env, user, currency, processing_fee, EntryKind::ChargeFee, reference)?;
    }
    Ok(())
}

/// Refund a player's full charge: entry fee and processing fee.
fn refund_escrow(
    env: &Env,
    user: &Address,
    currency: Currency,
    entry_fee: i128,
    processing_fee: i128,
    reference: u64,
) -> Result<(), Error> {
    credit(env, user, currency, entry_fee, EntryKind::Refund, reference)?;
    if processing_fee > 0 {
        credit(env, user, currency, processing_fee, EntryKind::RefundFee, reference)?;
    }
    Ok(())
}

fn is_expirable(env: &Env, challenge: &ChallengeData) -> bool {
    let now = env.ledger().timestamp();
    match challenge.state {
        ChallengeState::Open => now > challenge.deadline,
        ChallengeState::Active => {
            now > challenge.activated_at.saturating_add(RESULTS_GRACE_SECS)
        }
        ChallengeState::Settled | ChallengeState::Expired => false,
    }
}

fn sweep_one(env: &Env, mut challenge: ChallengeData) -> Result<u32, Error> {
    if !is_expirable(env, &challenge) {
        return Err(Error::NotExpirable);
    }

    let challenge_id = challenge.id;
    let players = get_players_vec(env, challenge_id);
    for player in players.iter() {
        refund_escrow(
            env,
            &player,
            challenge.currency,
            challenge.entry_fee,
            challenge.processing_fee,
            challenge_id,
        )?;
    }

    challenge.state = ChallengeState::Expired;
    challenge.resolved_at = env.ledger().timestamp();
    save_challenge(env, &challenge);

    let refunded = players.len();
    ChallengeExpired {
        challenge_id,
        players_refunded: refunded,
    }
    .publish(env);

    Ok(refunded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
