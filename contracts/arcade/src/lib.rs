#![no_std]

//! # Arcade
//!
//! Pay-per-play arcade ledger. The owner registers games with a match price;
//! players buy matches, play them, and report their score, which feeds a
//! per-game Top 10. Accepted match prices accumulate in a per-game pot that
//! the owner can route to a reward splitter.
//!
//! ## Match lifecycle
//! 1. `purchase_match` pulls the payment, refunds any surplus over the game
//!    price and queues a `Purchased` entry for the buyer.
//! 2. `play_match` moves the buyer's oldest (or a chosen) `Purchased` entry
//!    to `Played`.
//! 3. `match_played` records the score on a `Played` entry (`Scored`) and
//!    inserts it into the game's leaderboard.
//!
//! Sequence numbers are per game and start at 1. Game ids start at 0.
//!
//! ## Rank rewards
//! Ranked players can claim part of the game pot with `release_reward`. Each
//! leaderboard slot carries a weight (`RANK_WEIGHTS`); a player is entitled to
//! `accrued * weight / total_weight` of everything the game ever accrued,
//! rounded down, minus what was already released to them. Payouts never
//! exceed what is left in the pot.

mod leaderboard;

pub use leaderboard::{LeaderboardEntry, MAX_RANKING_ENTRIES, RANK_WEIGHTS};

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, token, Address,
    Env, String, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvGameRegistered {
    #[topic]
    pub game_id: u32,
    pub name: String,
    pub creator: Address,
}

#[contractevent]
pub struct EvGameDeactivated {
    #[topic]
    pub game_id: u32,
}

#[contractevent]
pub struct EvMatchPurchased {
    #[topic]
    pub game_id: u32,
    pub sequence: u32,
    pub buyer: Address,
}

#[contractevent]
pub struct EvMatchStarted {
    #[topic]
    pub game_id: u32,
    pub sequence: u32,
    pub player: Address,
}

#[contractevent]
pub struct EvScoreSubmitted {
    #[topic]
    pub game_id: u32,
    pub sequence: u32,
    pub score: u32,
}

#[contractevent]
pub struct EvPotWithdrawn {
    #[topic]
    pub game_id: u32,
    pub to: Address,
    pub amount: i128,
}

#[contractevent]
pub struct EvRewardReleased {
    #[topic]
    pub game_id: u32,
    #[topic]
    pub player: Address,
    pub amount: i128,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ArcadeError {
    Unauthorized = 1,
    NotFound = 2,
    GameInactive = 3,
    InsufficientPayment = 4,
    InvalidState = 5,
    AlreadyScored = 6,
    InvalidAmount = 7,
    Overflow = 8,
    TransferFailed = 9,
    NothingDue = 10,
    NotInitialized = 11,
    /// The buyer already holds `MAX_AVAILABLE_MATCHES` unplayed matches.
    TooManyMatches = 12,
    NotRanked = 13,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  State & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Game {
    pub id: u32,
    pub name: String,
    pub creator: Address,
    /// Match price in token units (0 = free game).
    pub price: i128,
    pub active: bool,
}

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MatchState {
    Purchased = 0,
    Played = 1,
    Scored = 2,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MatchEntry {
    pub game_id: u32,
    pub sequence: u32,
    pub buyer: Address,
    pub paid_amount: i128,
    pub state: MatchState,
    /// Only meaningful once `state == Scored`.
    pub score: u32,
}

#[contracttype]
#[derive(Clone)]
enum StorageKey {
    Owner,
    Token,
    GameCount,
    Game(u32),
    /// Highest sequence number issued for a game.
    MatchCount(u32),
    Match(u32, u32),
    /// Sequence numbers still `Purchased`, per (game, buyer), oldest first.
    Available(u32, Address),
    Pot(u32),
    /// Every price ever added to a game's pot, withdrawn or not.
    Accrued(u32),
    Ranking(u32),
    RewardReleased(u32, Address),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL for games, matches and rankings: 120 days
const TTL_SECONDS: u32 = 120 * 24 * 60 * 60;

/// 120 * 24 * 60 * 60 / 5 = 2,073,600 ledgers
const TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

/// Cap on bought-but-unplayed matches per (game, buyer); the queue is a
/// single ledger entry.
pub const MAX_AVAILABLE_MATCHES: u32 = 100;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct ArcadeContract;

#[contractimpl]
impl ArcadeContract {
    /// `token` is the currency every match is paid in.
    pub fn __constructor(env: Env, owner: Address, token: Address) {
        env.storage().instance().set(&StorageKey::Owner, &owner);
        env.storage().instance().set(&StorageKey::Token, &token);
        env.storage().instance().set(&StorageKey::GameCount, &0u32);
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Game registry
    // ───────────────────────────────────────────────────────────────────────────

    /// Register a new game. Owner only. Returns the new game id.
    pub fn register_game(
        env: Env,
        caller: Address,
        name: String,
        creator: Address,
        price: i128,
    ) -> Result<u32, ArcadeError> {
        caller.require_auth();
        Self::require_owner(&env, &caller)?;

        if price < 0 {
            return Err(ArcadeError::InvalidAmount);
        }

        let game_id = Self::game_count(env.clone());
        let next_count = game_id.checked_add(1).ok_or(ArcadeError::Overflow)?;

        let game = Game {
            id: game_id,
            name: name.clone(),
            creator: creator.clone(),
            price,
            active: true,
        };
        Self::write_game(&env, &game);
        env.storage()
            .instance()
            .set(&StorageKey::GameCount, &next_count);

        EvGameRegistered {
            game_id,
            name,
            creator,
        }
        .publish(&env);

        Ok(game_id)
    }

    /// Stop selling matches for a game. Matches already bought can still be
    /// played and scored.
    pub fn deactivate_game(env: Env, caller: Address, game_id: u32) -> Result<(), ArcadeError> {
        caller.require_auth();
        Self::require_owner(&env, &caller)?;

        let mut game = Self::read_game(&env, game_id)?;
        if !game.active {
            return Ok(());
        }
        game.active = false;
        Self::write_game(&env, &game);

        EvGameDeactivated { game_id }.publish(&env);
        Ok(())
    }

    pub fn get_game(env: Env, game_id: u32) -> Result<Game, ArcadeError> {
        Self::read_game(&env, game_id)
    }

    pub fn game_count(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&StorageKey::GameCount)
            .unwrap_or(0)
    }

    pub fn owner(env: Env) -> Result<Address, ArcadeError> {
        Self::load_owner(&env)
    }

    pub fn token(env: Env) -> Result<Address, ArcadeError> {
        Self::load_token(&env)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Match lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    /// Buy one match of `game_id`, paying `payment` token units.
    ///
    /// The whole `payment` is pulled from `player` and everything above the
    /// game price is sent straight back within the same call; if either
    /// transfer fails nothing is recorded. Returns the match sequence number.
    pub fn purchase_match(
        env: Env,
        player: Address,
        game_id: u32,
        payment: i128,
    ) -> Result<u32, ArcadeError> {
        player.require_auth();

        if payment < 0 {
            return Err(ArcadeError::InvalidAmount);
        }

        let game = Self::read_game(&env, game_id)?;
        if !game.active {
            return Err(ArcadeError::GameInactive);
        }
        if payment < game.price {
            return Err(ArcadeError::InsufficientPayment);
        }

        let mut available = Self::read_available(&env, game_id, &player);
        if available.len() >= MAX_AVAILABLE_MATCHES {
            return Err(ArcadeError::TooManyMatches);
        }

        let sequence = Self::read_match_count(&env, game_id)
            .checked_add(1)
            .ok_or(ArcadeError::Overflow)?;
        let pot = Self::read_pot(&env, game_id)
            .checked_add(game.price)
            .ok_or(ArcadeError::Overflow)?;
        let accrued = Self::read_accrued(&env, game_id)
            .checked_add(game.price)
            .ok_or(ArcadeError::Overflow)?;

        let entry = MatchEntry {
            game_id,
            sequence,
            buyer: player.clone(),
            paid_amount: game.price,
            state: MatchState::Purchased,
            score: 0,
        };
        Self::write_match(&env, &entry);
        Self::write_match_count(&env, game_id, sequence);
        Self::write_pot(&env, game_id, pot);
        Self::write_accrued(&env, game_id, accrued);

        available.push_back(sequence);
        Self::write_available(&env, game_id, &player, &available);

        // Accounting is settled; now move the funds.
        let arcade = env.current_contract_address();
        Self::transfer(&env, &player, &arcade, payment)?;
        Self::transfer(&env, &arcade, &player, payment - game.price)?;

        EvMatchPurchased {
            game_id,
            sequence,
            buyer: player,
        }
        .publish(&env);

        Ok(sequence)
    }

    /// Start one of the caller's purchased matches.
    ///
    /// With `sequence == None` the oldest purchased match is used. Returns the
    /// sequence number of the match now in `Played`.
    pub fn play_match(
        env: Env,
        player: Address,
        game_id: u32,
        sequence: Option<u32>,
    ) -> Result<u32, ArcadeError> {
        player.require_auth();

        Self::read_game(&env, game_id)?;
        let mut available = Self::read_available(&env, game_id, &player);

        let sequence = match sequence {
            None => available.pop_front().ok_or(ArcadeError::InvalidState)?,
            Some(sequence) => {
                let entry = Self::read_match(&env, game_id, sequence)?;
                if entry.buyer != player {
                    return Err(ArcadeError::Unauthorized);
                }
                let idx = Self::find_sequence(&available, sequence)
                    .ok_or(ArcadeError::InvalidState)?;
                available.remove(idx);
                sequence
            }
        };

        let mut entry = Self::read_match(&env, game_id, sequence)?;
        if entry.state != MatchState::Purchased {
            return Err(ArcadeError::InvalidState);
        }
        entry.state = MatchState::Played;

        Self::write_match(&env, &entry);
        Self::write_available(&env, game_id, &player, &available);

        EvMatchStarted {
            game_id,
            sequence,
            player,
        }
        .publish(&env);

        Ok(sequence)
    }

    /// Record the final score of a played match and rank it.
    pub fn match_played(
        env: Env,
        player: Address,
        game_id: u32,
        sequence: u32,
        score: u32,
    ) -> Result<(), ArcadeError> {
        player.require_auth();

        let mut entry = Self::read_match(&env, game_id, sequence)?;
        if entry.buyer != player {
            return Err(ArcadeError::Unauthorized);
        }
        match entry.state {
            MatchState::Scored => return Err(ArcadeError::AlreadyScored),
            MatchState::Purchased => return Err(ArcadeError::InvalidState),
            MatchState::Played => {}
        }

        entry.state = MatchState::Scored;
        entry.score = score;
        Self::write_match(&env, &entry);

        let mut ranking = Self::read_ranking(&env, game_id);
        let ranked = leaderboard::insert(
            &mut ranking,
            LeaderboardEntry {
                address: player,
                score,
            },
        );
        if ranked.is_some() {
            Self::write_ranking(&env, game_id, &ranking);
        }

        EvScoreSubmitted {
            game_id,
            sequence,
            score,
        }
        .publish(&env);

        Ok(())
    }

    /// Number of matches `player` has bought for `game_id` and not started yet.
    pub fn get_available_matches(
        env: Env,
        game_id: u32,
        player: Address,
    ) -> Result<u32, ArcadeError> {
        Self::read_game(&env, game_id)?;
        Ok(Self::read_available(&env, game_id, &player).len())
    }

    pub fn get_match(env: Env, game_id: u32, sequence: u32) -> Result<MatchEntry, ArcadeError> {
        Self::read_match(&env, game_id, sequence)
    }

    pub fn get_match_player(
        env: Env,
        game_id: u32,
        sequence: u32,
    ) -> Result<Address, ArcadeError> {
        Ok(Self::read_match(&env, game_id, sequence)?.buyer)
    }

    /// Score of a match. Fails with `InvalidState` until the match is scored.
    pub fn get_match_score(env: Env, game_id: u32, sequence: u32) -> Result<u32, ArcadeError> {
        let entry = Self::read_match(&env, game_id, sequence)?;
        if entry.state != MatchState::Scored {
            return Err(ArcadeError::InvalidState);
        }
        Ok(entry.score)
    }

    /// Highest sequence number issued so far for `game_id` (0 = none sold).
    pub fn match_count(env: Env, game_id: u32) -> Result<u32, ArcadeError> {
        Self::read_game(&env, game_id)?;
        Ok(Self::read_match_count(&env, game_id))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Leaderboard
    // ───────────────────────────────────────────────────────────────────────────

    /// Top scores for a game, best first. At most `MAX_RANKING_ENTRIES` long.
    pub fn get_record_list(env: Env, game_id: u32) -> Result<Vec<LeaderboardEntry>, ArcadeError> {
        Self::read_game(&env, game_id)?;
        Ok(Self::read_ranking(&env, game_id))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Game pot
    // ───────────────────────────────────────────────────────────────────────────

    pub fn pot_balance(env: Env, game_id: u32) -> Result<i128, ArcadeError> {
        Self::read_game(&env, game_id)?;
        Ok(Self::read_pot(&env, game_id))
    }

    /// Send the whole pot of `game_id` to `to`, usually a reward splitter.
    /// Owner only. Returns the amount sent.
    pub fn withdraw_pot(
        env: Env,
        caller: Address,
        game_id: u32,
        to: Address,
    ) -> Result<i128, ArcadeError> {
        caller.require_auth();
        Self::require_owner(&env, &caller)?;

        Self::read_game(&env, game_id)?;
        let amount = Self::read_pot(&env, game_id);
        if amount == 0 {
            return Err(ArcadeError::NothingDue);
        }

        Self::write_pot(&env, game_id, 0);
        Self::transfer(&env, &env.current_contract_address(), &to, amount)?;

        EvPotWithdrawn {
            game_id,
            to,
            amount,
        }
        .publish(&env);

        Ok(amount)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Rank rewards
    // ───────────────────────────────────────────────────────────────────────────

    /// Pay `player` its current rank reward from the pot of `game_id`.
    /// Anyone may trigger it; funds only go to the player. Returns the amount paid.
    pub fn release_reward(env: Env, game_id: u32, player: Address) -> Result<i128, ArcadeError> {
        Self::read_game(&env, game_id)?;

        let owed = Self::reward_owed(&env, game_id, &player)?;
        if owed == 0 {
            return Err(ArcadeError::NothingDue);
        }

        let released = Self::read_reward_released(&env, game_id, &player)
            .checked_add(owed)
            .ok_or(ArcadeError::Overflow)?;
        let pot = Self::read_pot(&env, game_id)
            .checked_sub(owed)
            .ok_or(ArcadeError::Overflow)?;

        // Settle the books before the funds leave
        Self::write_reward_released(&env, game_id, &player, released);
        Self::write_pot(&env, game_id, pot);

        Self::transfer(&env, &env.current_contract_address(), &player, owed)?;

        EvRewardReleased {
            game_id,
            player,
            amount: owed,
        }
        .publish(&env);

        Ok(owed)
    }

    /// Total rank rewards paid to `player` for `game_id` so far.
    pub fn get_released_amount(
        env: Env,
        game_id: u32,
        player: Address,
    ) -> Result<i128, ArcadeError> {
        Self::read_game(&env, game_id)?;
        Ok(Self::read_reward_released(&env, game_id, &player))
    }

    /// Amount `release_reward` would currently pay to `player`.
    pub fn releasable_reward(
        env: Env,
        game_id: u32,
        player: Address,
    ) -> Result<i128, ArcadeError> {
        Self::read_game(&env, game_id)?;
        Self::reward_owed(&env, game_id, &player)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Rewards
    // ═══════════════════════════════════════════════════════════════════════════

    /// `accrued * weight / total_weight - released`, floor division, capped
    /// by the pot. A player who dropped in rank may be owed nothing.
    fn reward_owed(env: &Env, game_id: u32, player: &Address) -> Result<i128, ArcadeError> {
        let ranking = Self::read_ranking(env, game_id);
        let (weight, total_weight) = leaderboard::reward_weight(&ranking, player);
        if weight == 0 {
            return Err(ArcadeError::NotRanked);
        }

        let entitled = Self::read_accrued(env, game_id)
            .checked_mul(weight as i128)
            .ok_or(ArcadeError::Overflow)?
            / (total_weight as i128);
        let released = Self::read_reward_released(env, game_id, player);

        let owed = if entitled > released { entitled - released } else { 0 };
        Ok(owed.min(Self::read_pot(env, game_id)))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Guards & transfers
    // ═══════════════════════════════════════════════════════════════════════════

    fn require_owner(env: &Env, caller: &Address) -> Result<(), ArcadeError> {
        let owner = Self::load_owner(env)?;
        if *caller != owner {
            return Err(ArcadeError::Unauthorized);
        }
        Ok(())
    }

    fn find_sequence(available: &Vec<u32>, sequence: u32) -> Option<u32> {
        for i in 0..available.len() {
            if available.get(i) == Some(sequence) {
                return Some(i);
            }
        }
        None
    }

    fn transfer(env: &Env, from: &Address, to: &Address, amount: i128) -> Result<(), ArcadeError> {
        if amount == 0 {
            return Ok(());
        }
        let token = token::TokenClient::new(env, &Self::load_token(env)?);
        match token.try_transfer(from, to, &amount) {
            Ok(Ok(())) => Ok(()),
            _ => {
                log!(env, "token transfer failed", from.clone(), to.clone(), amount);
                Err(ArcadeError::TransferFailed)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn read_game(env: &Env, game_id: u32) -> Result<Game, ArcadeError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Game(game_id))
            .ok_or(ArcadeError::NotFound)
    }

    fn write_game(env: &Env, game: &Game) {
        Self::write_persistent(env, &StorageKey::Game(game.id), game);
    }

    fn read_match(env: &Env, game_id: u32, sequence: u32) -> Result<MatchEntry, ArcadeError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Match(game_id, sequence))
            .ok_or(ArcadeError::NotFound)
    }

    fn write_match(env: &Env, entry: &MatchEntry) {
        Self::write_persistent(env, &StorageKey::Match(entry.game_id, entry.sequence), entry);
    }

    fn read_match_count(env: &Env, game_id: u32) -> u32 {
        env.storage()
            .persistent()
            .get(&StorageKey::MatchCount(game_id))
            .unwrap_or(0)
    }

    fn write_match_count(env: &Env, game_id: u32, count: u32) {
        Self::write_persistent(env, &StorageKey::MatchCount(game_id), &count);
    }

    fn read_available(env: &Env, game_id: u32, player: &Address) -> Vec<u32> {
        env.storage()
            .persistent()
            .get(&StorageKey::Available(game_id, player.clone()))
            .unwrap_or_else(|| Vec::new(env))
    }

    fn write_available(env: &Env, game_id: u32, player: &Address, available: &Vec<u32>) {
        Self::write_persistent(env, &StorageKey::Available(game_id, player.clone()), available);
    }

    fn read_pot(env: &Env, game_id: u32) -> i128 {
        env.storage()
            .persistent()
            .get(&StorageKey::Pot(game_id))
            .unwrap_or(0)
    }

    fn write_pot(env: &Env, game_id: u32, amount: i128) {
        Self::write_persistent(env, &StorageKey::Pot(game_id), &amount);
    }

    fn read_accrued(env: &Env, game_id: u32) -> i128 {
        env.storage()
            .persistent()
            .get(&StorageKey::Accrued(game_id))
            .unwrap_or(0)
    }

    fn write_accrued(env: &Env, game_id: u32, amount: i128) {
        Self::write_persistent(env, &StorageKey::Accrued(game_id), &amount);
    }

    fn read_reward_released(env: &Env, game_id: u32, player: &Address) -> i128 {
        env.storage()
            .persistent()
            .get(&StorageKey::RewardReleased(game_id, player.clone()))
            .unwrap_or(0)
    }

    fn write_reward_released(env: &Env, game_id: u32, player: &Address, amount: i128) {
        Self::write_persistent(env, &StorageKey::RewardReleased(game_id, player.clone()), &amount);
    }

    fn read_ranking(env: &Env, game_id: u32) -> Vec<LeaderboardEntry> {
        env.storage()
            .persistent()
            .get(&StorageKey::Ranking(game_id))
            .unwrap_or_else(|| Vec::new(env))
    }

    fn write_ranking(env: &Env, game_id: u32, ranking: &Vec<LeaderboardEntry>) {
        Self::write_persistent(env, &StorageKey::Ranking(game_id), ranking);
    }

    fn write_persistent<V>(env: &Env, key: &StorageKey, value: &V)
    where
        V: soroban_sdk::IntoVal<Env, soroban_sdk::Val>,
    {
        env.storage().persistent().set(key, value);
        env.storage()
            .persistent()
            .extend_ttl(key, TTL_LEDGERS, TTL_LEDGERS);
        // Keep instance storage (owner, token, game count) alive
        env.storage().instance().extend_ttl(TTL_LEDGERS, TTL_LEDGERS);
    }

    fn load_owner(env: &Env) -> Result<Address, ArcadeError> {
        env.storage()
            .instance()
            .get(&StorageKey::Owner)
            .ok_or(ArcadeError::NotInitialized)
    }

    fn load_token(env: &Env) -> Result<Address, ArcadeError> {
        env.storage()
            .instance()
            .get(&StorageKey::Token)
            .ok_or(ArcadeError::NotInitialized)
    }
}
