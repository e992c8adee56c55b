#![no_std]

//! # Reward Splitter
//!
//! Splits every token unit the contract ever receives among a fixed set of
//! payees, proportionally to their shares.
//!
//! Funds arrive by any plain token transfer to the contract address (for
//! example an arcade pot withdrawal) or through `deposit`. The total ever
//! received is derived as `balance + total_released`, so no incoming transfer
//! needs to be announced to the contract.
//!
//! A payee is owed `shares * total_received / total_shares - released`,
//! rounded down. The remainder stays in the contract and is paid out once
//! later deposits push it past a whole unit.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, token, Address,
    Env, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvPayeeAdded {
    #[topic]
    pub payee: Address,
    pub shares: u32,
}

#[contractevent]
pub struct EvPaymentReceived {
    #[topic]
    pub from: Address,
    pub amount: i128,
}

#[contractevent]
pub struct EvPaymentReleased {
    #[topic]
    pub payee: Address,
    pub amount: i128,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum SplitterError {
    Unauthorized = 1,
    UnknownPayee = 2,
    DuplicatePayee = 3,
    InvalidShares = 4,
    NothingDue = 5,
    TransferFailed = 6,
    InvalidAmount = 7,
    Overflow = 8,
    /// Payees can no longer be added once anything has been released.
    PayoutsStarted = 9,
    NotInitialized = 10,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  State & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Payee {
    pub address: Address,
    pub shares: u32,
    pub released: i128,
}

#[contracttype]
#[derive(Clone)]
enum StorageKey {
    Owner,
    Token,
    TotalShares,
    TotalReleased,
    /// Payee addresses in the order they were added.
    Payees,
    Payee(Address),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL for payee records: 120 days
const TTL_SECONDS: u32 = 120 * 24 * 60 * 60;

/// 120 * 24 * 60 * 60 / 5 = 2,073,600 ledgers
const TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct RewardSplitter;

#[contractimpl]
impl RewardSplitter {
    pub fn __constructor(env: Env, owner: Address, token: Address) {
        env.storage().instance().set(&StorageKey::Owner, &owner);
        env.storage().instance().set(&StorageKey::Token, &token);
        env.storage().instance().set(&StorageKey::TotalShares, &0u32);
        env.storage().instance().set(&StorageKey::TotalReleased, &0i128);
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Payees
    // ───────────────────────────────────────────────────────────────────────────

    /// Add a payee entitled to `shares` parts of everything received. Owner only.
    pub fn add_payee(
        env: Env,
        caller: Address,
        payee: Address,
        shares: u32,
    ) -> Result<(), SplitterError> {
        caller.require_auth();
        let owner = Self::load_owner(&env)?;
        if caller != owner {
            return Err(SplitterError::Unauthorized);
        }

        if shares == 0 {
            return Err(SplitterError::InvalidShares);
        }
        let key = StorageKey::Payee(payee.clone());
        if env.storage().persistent().has(&key) {
            return Err(SplitterError::DuplicatePayee);
        }
        if Self::read_total_released(&env) > 0 {
            return Err(SplitterError::PayoutsStarted);
        }

        let total_shares = Self::read_total_shares(&env)
            .checked_add(shares)
            .ok_or(SplitterError::Overflow)?;

        Self::write_payee(
            &env,
            &Payee {
                address: payee.clone(),
                shares,
                released: 0,
            },
        );
        let mut payees = Self::payees(env.clone());
        payees.push_back(payee.clone());
        Self::write_payees(&env, &payees);
        env.storage()
            .instance()
            .set(&StorageKey::TotalShares, &total_shares);

        EvPayeeAdded { payee, shares }.publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Funds
    // ───────────────────────────────────────────────────────────────────────────

    /// Pull `amount` from `from` into the pot. Equivalent to a plain token
    /// transfer to this contract, plus an event.
    pub fn deposit(env: Env, from: Address, amount: i128) -> Result<(), SplitterError> {
        from.require_auth();
        if amount <= 0 {
            return Err(SplitterError::InvalidAmount);
        }

        Self::transfer(&env, &from, &env.current_contract_address(), amount)?;

        EvPaymentReceived { from, amount }.publish(&env);
        Ok(())
    }

    /// Pay `payee` everything currently owed to it. Anyone may trigger a
    /// release; funds only ever go to the payee. Returns the amount paid.
    pub fn release(env: Env, payee: Address) -> Result<i128, SplitterError> {
        let mut record = Self::read_payee(&env, &payee)?;

        let owed = Self::owed(&env, &record)?;
        if owed == 0 {
            return Err(SplitterError::NothingDue);
        }

        record.released = record
            .released
            .checked_add(owed)
            .ok_or(SplitterError::Overflow)?;
        let total_released = Self::read_total_released(&env)
            .checked_add(owed)
            .ok_or(SplitterError::Overflow)?;

        // Settle the books before the funds leave
        Self::write_payee(&env, &record);
        env.storage()
            .instance()
            .set(&StorageKey::TotalReleased, &total_released);

        Self::transfer(&env, &env.current_contract_address(), &payee, owed)?;

        EvPaymentReleased {
            payee,
            amount: owed,
        }
        .publish(&env);

        Ok(owed)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Views
    // ───────────────────────────────────────────────────────────────────────────

    pub fn owner(env: Env) -> Result<Address, SplitterError> {
        Self::load_owner(&env)
    }

    pub fn token(env: Env) -> Result<Address, SplitterError> {
        Self::load_token(&env)
    }

    pub fn total_shares(env: Env) -> u32 {
        Self::read_total_shares(&env)
    }

    pub fn total_released(env: Env) -> i128 {
        Self::read_total_released(&env)
    }

    /// Everything the contract has ever received, released or not.
    pub fn total_received(env: Env) -> Result<i128, SplitterError> {
        Self::read_total_received(&env)
    }

    pub fn shares(env: Env, payee: Address) -> Result<u32, SplitterError> {
        Ok(Self::read_payee(&env, &payee)?.shares)
    }

    pub fn released(env: Env, payee: Address) -> Result<i128, SplitterError> {
        Ok(Self::read_payee(&env, &payee)?.released)
    }

    /// Amount `release` would currently pay to `payee`.
    pub fn releasable(env: Env, payee: Address) -> Result<i128, SplitterError> {
        let record = Self::read_payee(&env, &payee)?;
        Self::owed(&env, &record)
    }

    pub fn payees(env: Env) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&StorageKey::Payees)
            .unwrap_or_else(|| Vec::new(&env))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Accounting
    // ═══════════════════════════════════════════════════════════════════════════

    /// `shares * total_received / total_shares - released`, floor division.
    fn owed(env: &Env, payee: &Payee) -> Result<i128, SplitterError> {
        let total_shares = Self::read_total_shares(env);
        if total_shares == 0 {
            return Ok(0);
        }
        let total_received = Self::read_total_received(env)?;

        let entitled = (payee.shares as i128)
            .checked_mul(total_received)
            .ok_or(SplitterError::Overflow)?
            / (total_shares as i128);

        entitled
            .checked_sub(payee.released)
            .ok_or(SplitterError::Overflow)
    }

    fn read_total_received(env: &Env) -> Result<i128, SplitterError> {
        let token = token::TokenClient::new(env, &Self::load_token(env)?);
        token
            .balance(&env.current_contract_address())
            .checked_add(Self::read_total_released(env))
            .ok_or(SplitterError::Overflow)
    }

    fn transfer(env: &Env, from: &Address, to: &Address, amount: i128) -> Result<(), SplitterError> {
        let token = token::TokenClient::new(env, &Self::load_token(env)?);
        match token.try_transfer(from, to, &amount) {
            Ok(Ok(())) => Ok(()),
            _ => {
                log!(env, "token transfer failed", from.clone(), to.clone(), amount);
                Err(SplitterError::TransferFailed)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn read_payee(env: &Env, payee: &Address) -> Result<Payee, SplitterError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Payee(payee.clone()))
            .ok_or(SplitterError::UnknownPayee)
    }

    fn write_payee(env: &Env, payee: &Payee) {
        let key = StorageKey::Payee(payee.address.clone());
        env.storage().persistent().set(&key, payee);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);
        // Keep instance storage (owner, token, totals) alive
        env.storage().instance().extend_ttl(TTL_LEDGERS, TTL_LEDGERS);
    }

    fn write_payees(env: &Env, payees: &Vec<Address>) {
        env.storage().persistent().set(&StorageKey::Payees, payees);
        env.storage()
            .persistent()
            .extend_ttl(&StorageKey::Payees, TTL_LEDGERS, TTL_LEDGERS);
    }

    fn read_total_shares(env: &Env) -> u32 {
        env.storage()
            .instance()
            .get(&StorageKey::TotalShares)
            .unwrap_or(0)
    }

    fn read_total_released(env: &Env) -> i128 {
        env.storage()
            .instance()
            .get(&StorageKey::TotalReleased)
            .unwrap_or(0)
    }

    fn load_owner(env: &Env) -> Result<Address, SplitterError> {
        env.storage()
            .instance()
            .get(&StorageKey::Owner)
            .ok_or(SplitterError::NotInitialized)
    }

    fn load_token(env: &Env) -> Result<Address, SplitterError> {
        env.storage()
            .instance()
            .get(&StorageKey::Token)
            .ok_or(SplitterError::NotInitialized)
    }
}

#[cfg(test)]
mod test;
