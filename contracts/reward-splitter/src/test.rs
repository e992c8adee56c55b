#![cfg(test)]

extern crate std;

use crate::{RewardSplitter, RewardSplitterClient, SplitterError};
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::token::{StellarAssetClient, TokenClient};
use soroban_sdk::{contract, contracterror, contractimpl, contracttype, Address, Env};

// ════════════════════════════════════════════════════════════════════════════
//  Mock Token (refuses transfers to blocked recipients)
// ════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone)]
enum MockTokenKey {
    Balance(Address),
    Blocked(Address),
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum MockTokenError {
    InsufficientBalance = 1,
    RecipientBlocked = 2,
}

#[contract]
pub struct MockToken;

#[contractimpl]
impl MockToken {
    pub fn mint(env: Env, to: Address, amount: i128) {
        let balance = Self::balance(env.clone(), to.clone());
        env.storage()
            .instance()
            .set(&MockTokenKey::Balance(to), &(balance + amount));
    }

    pub fn set_blocked(env: Env, id: Address, blocked: bool) {
        env.storage().instance().set(&MockTokenKey::Blocked(id), &blocked);
    }

    pub fn balance(env: Env, id: Address) -> i128 {
        env.storage()
            .instance()
            .get(&MockTokenKey::Balance(id))
            .unwrap_or(0)
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) -> Result<(), MockTokenError> {
        from.require_auth();
        let blocked: bool = env
            .storage()
            .instance()
            .get(&MockTokenKey::Blocked(to.clone()))
            .unwrap_or(false);
        if blocked {
            return Err(MockTokenError::RecipientBlocked);
        }
        let from_balance = Self::balance(env.clone(), from.clone());
        if from_balance < amount {
            return Err(MockTokenError::InsufficientBalance);
        }
        env.storage()
            .instance()
            .set(&MockTokenKey::Balance(from), &(from_balance - amount));
        let to_balance = Self::balance(env.clone(), to.clone());
        env.storage()
            .instance()
            .set(&MockTokenKey::Balance(to), &(to_balance + amount));
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
//  Helpers
// ════════════════════════════════════════════════════════════════════════════

struct Setup {
    env: Env,
    client: RewardSplitterClient<'static>,
    token: TokenClient<'static>,
    asset: StellarAssetClient<'static>,
    owner: Address,
}

fn test_env() -> Env {
    let env = Env::default();
    env.mock_all_auths();

    env.ledger().set(soroban_sdk::testutils::LedgerInfo {
        timestamp: 1_700_000_000,
        protocol_version: 25,
        sequence_number: 100,
        network_id: Default::default(),
        base_reserve: 10,
        min_temp_entry_ttl: u32::MAX / 2,
        min_persistent_entry_ttl: u32::MAX / 2,
        max_entry_ttl: u32::MAX / 2,
    });
    env
}

fn setup() -> Setup {
    let env = test_env();
    let issuer = Address::generate(&env);
    let token_addr = env.register_stellar_asset_contract_v2(issuer).address();
    let token = TokenClient::new(&env, &token_addr);
    let asset = StellarAssetClient::new(&env, &token_addr);

    let owner = Address::generate(&env);
    let contract_id = env.register(RewardSplitter, (&owner, &token_addr));
    let client = RewardSplitterClient::new(&env, &contract_id);

    Setup {
        env,
        client,
        token,
        asset,
        owner,
    }
}

/// Splitter paid in `MockToken`, whose transfers can be made to fail.
fn setup_with_mock_token() -> (Env, RewardSplitterClient<'static>, MockTokenClient<'static>, Address) {
    let env = test_env();
    let token_addr = env.register(MockToken, ());
    let token = MockTokenClient::new(&env, &token_addr);

    let owner = Address::generate(&env);
    let contract_id = env.register(RewardSplitter, (&owner, &token_addr));
    let client = RewardSplitterClient::new(&env, &contract_id);
    (env, client, token, owner)
}

/// Send `amount` to the splitter the passive way: a plain token transfer.
fn fund(s: &Setup, amount: i128) {
    let sender = Address::generate(&s.env);
    s.asset.mint(&sender, &amount);
    s.token.transfer(&sender, &s.client.address, &amount);
}

fn payees(s: &Setup, shares: &[u32]) -> std::vec::Vec<Address> {
    shares
        .iter()
        .map(|share| {
            let payee = Address::generate(&s.env);
            s.client.add_payee(&s.owner, &payee, share);
            payee
        })
        .collect()
}

fn assert_splitter_error<T, E>(
    result: &Result<Result<T, E>, Result<SplitterError, soroban_sdk::InvokeError>>,
    expected: SplitterError,
) {
    match result {
        Err(Ok(actual)) => assert_eq!(*actual, expected),
        Err(Err(invoke_err)) => panic!("Expected {:?}, got invoke error: {:?}", expected, invoke_err),
        Ok(_) => panic!("Expected {:?}, but operation succeeded", expected),
    }
}

// ════════════════════════════════════════════════════════════════════════════
//  Setup & payees
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_init_empty() {
    let s = setup();
    assert_eq!(s.client.owner(), s.owner);
    assert_eq!(s.client.token(), s.token.address);
    assert_eq!(s.client.total_shares(), 0);
    assert_eq!(s.client.total_received(), 0);
    assert_eq!(s.client.total_released(), 0);
    assert_eq!(s.client.payees().len(), 0);
}

#[test]
fn test_add_payees() {
    let s = setup();
    let list = payees(&s, &[3, 1]);

    assert_eq!(s.client.total_shares(), 4);
    assert_eq!(s.client.shares(&list[0]), 3);
    assert_eq!(s.client.shares(&list[1]), 1);
    assert_eq!(s.client.released(&list[0]), 0);

    let stored = s.client.payees();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.get(0).unwrap(), list[0]);
    assert_eq!(stored.get(1).unwrap(), list[1]);
}

#[test]
fn test_non_owner_cannot_add_payee() {
    let s = setup();
    let rando = Address::generate(&s.env);
    let result = s.client.try_add_payee(&rando, &rando, &1);
    assert_splitter_error(&result, SplitterError::Unauthorized);
    assert_eq!(s.client.total_shares(), 0);
}

#[test]
fn test_duplicate_payee_rejected() {
    let s = setup();
    let list = payees(&s, &[1]);
    let result = s.client.try_add_payee(&s.owner, &list[0], &5);
    assert_splitter_error(&result, SplitterError::DuplicatePayee);
    assert_eq!(s.client.shares(&list[0]), 1);
    assert_eq!(s.client.total_shares(), 1);
}

#[test]
fn test_zero_shares_rejected() {
    let s = setup();
    let payee = Address::generate(&s.env);
    let result = s.client.try_add_payee(&s.owner, &payee, &0);
    assert_splitter_error(&result, SplitterError::InvalidShares);
}

#[test]
fn test_payees_frozen_after_first_release() {
    let s = setup();
    let list = payees(&s, &[1]);
    fund(&s, 10);
    s.client.release(&list[0]);

    let late = Address::generate(&s.env);
    let result = s.client.try_add_payee(&s.owner, &late, &1);
    assert_splitter_error(&result, SplitterError::PayoutsStarted);
}

#[test]
fn test_payee_added_after_deposit_shares_it() {
    let s = setup();
    fund(&s, 100);
    let list = payees(&s, &[1, 1]);

    assert_eq!(s.client.release(&list[0]), 50);
    assert_eq!(s.client.release(&list[1]), 50);
}

// ════════════════════════════════════════════════════════════════════════════
//  Deposits
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_deposit_counts_toward_total_received() {
    let s = setup();
    let from = Address::generate(&s.env);
    s.asset.mint(&from, &500);

    s.client.deposit(&from, &300);
    fund(&s, 200);

    assert_eq!(s.token.balance(&from), 200);
    assert_eq!(s.client.total_received(), 500);
}

#[test]
fn test_deposit_rejects_non_positive_amount() {
    let s = setup();
    let from = Address::generate(&s.env);
    assert_splitter_error(&s.client.try_deposit(&from, &0), SplitterError::InvalidAmount);
    assert_splitter_error(&s.client.try_deposit(&from, &-3), SplitterError::InvalidAmount);
}

#[test]
fn test_deposit_without_funds_fails() {
    let s = setup();
    let from = Address::generate(&s.env);
    assert_splitter_error(&s.client.try_deposit(&from, &10), SplitterError::TransferFailed);
    assert_eq!(s.client.total_received(), 0);
}

// ════════════════════════════════════════════════════════════════════════════
//  Release
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn test_single_payee_receives_whole_pot() {
    let s = setup();
    let list = payees(&s, &[1]);
    fund(&s, 1_000);

    assert_eq!(s.client.release(&list[0]), 1_000);
    assert_eq!(s.token.balance(&list[0]), 1_000);
    assert_eq!(s.token.balance(&s.client.address), 0);
    assert_eq!(s.client.total_received(), 1_000);
}

#[test]
fn test_two_equal_payees_one_unit_each() {
    let s = setup();
    let list = payees(&s, &[1, 1]);
    fund(&s, 2);

    assert_eq!(s.client.releasable(&list[0]), 1);
    assert_eq!(s.client.release(&list[0]), 1);
    assert_eq!(s.client.release(&list[1]), 1);
}

#[test]
fn test_odd_pot_leaves_remainder() {
    let s = setup();
    let list = payees(&s, &[1, 1]);
    fund(&s, 107 * 2 + 1);

    assert_eq!(s.client.release(&list[0]), 107);
    assert_eq!(s.client.release(&list[1]), 107);
    assert_eq!(s.token.balance(&s.client.address), 1);
    assert_eq!(s.client.total_released(), 214);

    assert_splitter_error(&s.client.try_release(&list[0]), SplitterError::NothingDue);
    assert_splitter_error(&s.client.try_release(&list[1]), SplitterError::NothingDue);

    // The leftover unit pays out once the next deposit completes it
    fund(&s, 1);
    assert_eq!(s.client.release(&list[0]), 1);
    assert_eq!(s.client.release(&list[1]), 1);
    assert_eq!(s.token.balance(&s.client.address), 0);
}

#[test]
fn test_unequal_shares_floor_division() {
    let s = setup();
    let list = payees(&s, &[1, 2]);
    fund(&s, 100);

    assert_eq!(s.client.release(&list[0]), 33);
    assert_eq!(s.client.release(&list[1]), 66);
    assert_eq!(s.token.balance(&s.client.address), 1);
}

#[test]
fn test_release_twice_without_new_funds() {
    let s = setup();
    let list = payees(&s, &[1, 3]);
    fund(&s, 40);

    assert_eq!(s.client.release(&list[1]), 30);
    assert_splitter_error(&s.client.try_release(&list[1]), SplitterError::NothingDue);
    assert_eq!(s.client.released(&list[1]), 30);
    assert_eq!(s.token.balance(&list[1]), 30);
}

#[test]
fn test_release_unknown_payee() {
    let s = setup();
    payees(&s, &[1]);
    fund(&s, 10);
    let stranger = Address::generate(&s.env);
    assert_splitter_error(&s.client.try_release(&stranger), SplitterError::UnknownPayee);
    assert_splitter_error(&s.client.try_releasable(&stranger), SplitterError::UnknownPayee);
}

#[test]
fn test_nothing_due_before_any_deposit() {
    let s = setup();
    let list = payees(&s, &[1]);
    assert_splitter_error(&s.client.try_release(&list[0]), SplitterError::NothingDue);
}

#[test]
fn test_released_never_exceeds_received() {
    let s = setup();
    let shares = [5u32, 3, 2, 7];
    let list = payees(&s, &shares);
    let total_shares: i128 = shares.iter().map(|share| *share as i128).sum();

    let deposits = [13i128, 1, 250, 7, 99, 3, 1_001];
    for (round, amount) in deposits.iter().enumerate() {
        fund(&s, *amount);

        // Release for a rotating subset of payees each round
        for (i, payee) in list.iter().enumerate() {
            if (i + round) % 2 == 0 {
                let _ = s.client.try_release(payee);
            }
        }

        let received = s.client.total_received();
        let mut released_sum = 0i128;
        for (i, payee) in list.iter().enumerate() {
            let released = s.client.released(payee);
            assert!(released <= shares[i] as i128 * received / total_shares);
            released_sum += released;
        }
        assert!(released_sum <= received);
        assert_eq!(released_sum, s.client.total_released());
        assert_eq!(s.token.balance(&s.client.address), received - released_sum);
    }

    // Draining everyone leaves at most one unit per payee but the last
    for payee in list.iter() {
        let _ = s.client.try_release(payee);
    }
    let leftover = s.token.balance(&s.client.address);
    assert!(leftover <= (list.len() as i128) - 1);
}

#[test]
fn test_failed_release_credits_nothing() {
    let (env, client, token, owner) = setup_with_mock_token();
    let payee = Address::generate(&env);
    client.add_payee(&owner, &payee, &1);
    token.mint(&client.address, &500);

    token.set_blocked(&payee, &true);
    assert_splitter_error(&client.try_release(&payee), SplitterError::TransferFailed);
    assert_eq!(client.released(&payee), 0);
    assert_eq!(client.total_released(), 0);
    assert_eq!(client.releasable(&payee), 500);
    assert_eq!(token.balance(&client.address), 500);
    assert_eq!(token.balance(&payee), 0);

    // The retry pays the full amount exactly once
    token.set_blocked(&payee, &false);
    assert_eq!(client.release(&payee), 500);
    assert_eq!(token.balance(&payee), 500);
    assert_eq!(client.total_released(), 500);
    assert_splitter_error(&client.try_release(&payee), SplitterError::NothingDue);
}
