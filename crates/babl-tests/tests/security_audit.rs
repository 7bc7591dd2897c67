//! BABL Adversarial Security Test Suite
//!
//! Each test plays an attacker against the distributor and checks that the
//! attempt is rejected with the right error and leaves no partial effect.

use babl_core::constants::{EPOCH_DURATION, PERCENT, START_TIME, WAD};
use babl_core::crypto::{ClaimAndStakeMessage, ClaimRewardsMessage, KeyPair};
use babl_core::error::{CollaboratorError, CryptoError, ParameterError, RewardsError};
use babl_core::params::{Benchmark, MiningParameters};
use babl_core::traits::{Garden, RewardToken};
use babl_tests::helpers::*;

const GARDEN: u8 = 0x10;
const OTHER_GARDEN: u8 = 0x11;
const STRATEGY: u8 = 0x30;
const STRATEGIST: u8 = 0x31;

struct Setup {
    w: World,
    alice: KeyPair,
    end: u64,
}

/// One finalized, profitable strategy; alice is the only LP.
fn settled() -> Setup {
    let mut w = World::new();
    let alice = keypair(1);
    w.add_garden(addr(GARDEN), addr(0x20));
    w.add_garden(addr(OTHER_GARDEN), addr(0x20));
    w.add_strategy(addr(STRATEGY), addr(GARDEN), addr(STRATEGIST), EPOCH_DURATION);
    w.deposit(addr(GARDEN), alice.address(), START_TIME - 1_000, 100 * WAD);
    w.execute(addr(STRATEGY), START_TIME, WAD);
    let end = START_TIME + EPOCH_DURATION;
    w.finish(addr(STRATEGY), end, WAD + WAD / 10);
    Setup { w, alice, end }
}

fn claim_message(s: &Setup) -> ClaimRewardsMessage {
    let alice = s.alice.address();
    let pending = s.w.dist.get_rewards(&addr(GARDEN), &alice, &[addr(STRATEGY)]).unwrap();
    ClaimRewardsMessage {
        garden: addr(GARDEN),
        contributor: alice,
        babl: pending.total_babl,
        profit: pending.total_profit(),
        nonce: s.w.dist.nonce(&addr(GARDEN), &alice),
        max_fee: WAD,
    }
}

// ======================================================================
// Replay and nonce ordering
// Attack: resubmit a signed payload, or submit one signed for a future
// nonce, to collect the same rewards twice.
// ======================================================================

#[test]
fn vuln_signed_claim_replay() {
    let mut s = settled();
    let msg = claim_message(&s);
    let sig = msg.sign(&s.alice);
    let keeper = ctx(KEEPER, s.end + 60);
    s.w.dist.claim_rewards_by_sig(&keeper, &msg, 0, &sig).unwrap();
    let paid = s.w.token.total_supply();

    let replay = s.w.dist.claim_rewards_by_sig(&keeper, &msg, 0, &sig);
    assert_eq!(replay, Err(RewardsError::InvalidNonce { expected: msg.nonce + 1, got: msg.nonce }));
    assert_eq!(s.w.token.total_supply(), paid);
}

#[test]
fn vuln_future_nonce_rejected_like_stale() {
    let mut s = settled();
    let msg = ClaimRewardsMessage { nonce: claim_message(&s).nonce + 5, ..claim_message(&s) };
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end), &msg, 0, &sig);
    assert!(matches!(result, Err(RewardsError::InvalidNonce { .. })));
    assert_eq!(s.w.token.total_supply(), 0);
}

#[test]
fn vuln_direct_claim_then_stale_signature() {
    let mut s = settled();
    let msg = claim_message(&s);
    let sig = msg.sign(&s.alice);
    let alice = s.alice.address();
    s.w.dist.claim_returns(&ctx(alice, s.end + 1), &[addr(STRATEGY)]).unwrap();
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end + 2), &msg, 0, &sig);
    assert!(matches!(result, Err(RewardsError::InvalidNonce { .. })));
}

#[test]
fn vuln_deposit_invalidates_outstanding_signature() {
    let mut s = settled();
    let msg = claim_message(&s);
    let sig = msg.sign(&s.alice);
    let alice = s.alice.address();
    s.w.deposit(addr(GARDEN), alice, s.end + 1, WAD);
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end + 2), &msg, 0, &sig);
    assert!(matches!(result, Err(RewardsError::InvalidNonce { .. })));
}

// ======================================================================
// Signature forgery
// Attack: alter signed amounts, or sign for someone else's address.
// ======================================================================

#[test]
fn vuln_tampered_amount() {
    let mut s = settled();
    let msg = claim_message(&s);
    let sig = msg.sign(&s.alice);
    let inflated = ClaimRewardsMessage { babl: msg.babl + 1, ..msg };
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end), &inflated, 0, &sig);
    assert_eq!(result, Err(RewardsError::Crypto(CryptoError::VerificationFailed)));
}

#[test]
fn vuln_signing_for_another_contributor() {
    let mut s = settled();
    let msg = claim_message(&s);
    let mallory = keypair(9);
    let sig = msg.sign(&mallory);
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end), &msg, 0, &sig);
    assert_eq!(result, Err(RewardsError::Crypto(CryptoError::SignerMismatch)));
}

#[test]
fn vuln_claim_signature_reused_as_stake() {
    let mut s = settled();
    let claim = claim_message(&s);
    let sig = claim.sign(&s.alice);
    let stake = ClaimAndStakeMessage {
        garden: claim.garden,
        stake_garden: HEART_GARDEN,
        contributor: claim.contributor,
        babl: claim.babl,
        profit: claim.profit,
        min_amount_out: 0,
        nonce: claim.nonce,
        nonce_heart: 0,
        max_fee: claim.max_fee,
        price_per_share: WAD,
    };
    let result = s.w.dist.claim_and_stake_rewards_by_sig(&ctx(KEEPER, s.end), &stake, 0, &sig);
    assert_eq!(result, Err(RewardsError::Crypto(CryptoError::VerificationFailed)));
}

// ======================================================================
// Relayer abuse
// Attack: a relayer takes more than the signed fee cap, or a non-keeper
// relays.
// ======================================================================

#[test]
fn vuln_fee_above_signed_cap() {
    let mut s = settled();
    let msg = ClaimRewardsMessage { max_fee: 10, ..claim_message(&s) };
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end), &msg, 11, &sig);
    assert_eq!(result, Err(RewardsError::FeeTooHigh { fee: 11, max_fee: 10 }));
}

#[test]
fn vuln_unregistered_relayer() {
    let mut s = settled();
    let msg = claim_message(&s);
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_rewards_by_sig(&ctx(addr(0x66), s.end), &msg, 0, &sig);
    assert_eq!(result, Err(RewardsError::Unauthorized));
}

#[test]
fn vuln_removed_keeper_loses_relay_rights() {
    let mut s = settled();
    let gov = ctx(GOVERNANCE, s.end);
    assert!(s.w.dist.remove_keeper(&gov, &KEEPER).unwrap());
    let msg = claim_message(&s);
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_rewards_by_sig(&ctx(KEEPER, s.end), &msg, 0, &sig);
    assert_eq!(result, Err(RewardsError::Unauthorized));
}

// ======================================================================
// Claim bookkeeping bypass
// Attack: mix strategies of another garden into a claim, or repeat a
// strategy in the list, to be paid outside the per-garden records.
// ======================================================================

#[test]
fn vuln_cross_fund_claim() {
    let mut s = settled();
    let foreign = addr(0x35);
    s.w.add_strategy(foreign, addr(OTHER_GARDEN), addr(STRATEGIST), EPOCH_DURATION);
    let alice = s.alice.address();
    let list = [addr(STRATEGY), foreign];
    assert_eq!(s.w.dist.get_rewards(&addr(GARDEN), &alice, &list), Err(RewardsError::CrossFundClaim));
    assert_eq!(
        s.w.dist.claim_returns(&ctx(alice, s.end), &list),
        Err(RewardsError::CrossFundClaim)
    );
    assert_eq!(s.w.token.total_supply(), 0);
}

#[test]
fn vuln_duplicate_strategy_in_list() {
    let mut s = settled();
    let alice = s.alice.address();
    let once = s.w.dist.get_rewards(&addr(GARDEN), &alice, &[addr(STRATEGY)]).unwrap();
    let twice = s
        .w
        .dist
        .get_rewards(&addr(GARDEN), &alice, &[addr(STRATEGY), addr(STRATEGY)])
        .unwrap();
    assert_eq!(once, twice);
    s.w.dist
        .claim_returns(&ctx(alice, s.end), &[addr(STRATEGY), addr(STRATEGY)])
        .unwrap();
    assert_eq!(s.w.token.balance_of(&alice), once.total_babl);
}

#[test]
fn vuln_profit_beyond_set_aside_is_atomic() {
    let mut s = settled();
    let alice = s.alice.address();
    // Drain the pot behind the distributor's back.
    let garden = s.w.gardens[&addr(GARDEN)].clone();
    let pot = garden.reserve_asset_rewards_set_aside();
    garden.send_reserve_rewards(&addr(0x77), pot).unwrap();

    let result = s.w.dist.claim_returns(&ctx(alice, s.end), &[addr(STRATEGY)]);
    assert!(matches!(
        result,
        Err(RewardsError::Collaborator(CollaboratorError::InsufficientBalance { .. }))
    ));
    assert_eq!(s.w.token.total_supply(), 0);
    assert!(!s.w.dist.get_rewards(&addr(GARDEN), &alice, &[addr(STRATEGY)]).unwrap().is_zero());
}

// ======================================================================
// Flash deposits and share burns
// Attack: deposit in the same instant capital is deployed to capture LP
// rewards; burn a contributor's shares after the window to erase them.
// ======================================================================

#[test]
fn vuln_flash_deposit_at_execution() {
    let mut w = World::new();
    let honest = addr(0x50);
    let flash = addr(0x51);
    w.add_garden(addr(GARDEN), addr(0x20));
    w.add_strategy(addr(STRATEGY), addr(GARDEN), addr(STRATEGIST), EPOCH_DURATION);
    w.deposit(addr(GARDEN), honest, START_TIME - 1, WAD);
    w.deposit(addr(GARDEN), flash, START_TIME, 1_000_000 * WAD);
    w.execute(addr(STRATEGY), START_TIME, WAD);
    w.withdraw(addr(GARDEN), flash, START_TIME, 1_000_000 * WAD);
    let end = START_TIME + EPOCH_DURATION;
    w.finish(addr(STRATEGY), end, WAD);

    assert_eq!(w.dist.get_prior_balance(&addr(GARDEN), &flash, START_TIME), 0);
    let share = w
        .dist
        .get_safe_user_share_per_strategy(&addr(GARDEN), &flash, &addr(STRATEGY), end)
        .unwrap();
    assert_eq!(share, 0);
    let rewards = w.dist.get_rewards(&addr(GARDEN), &flash, &[addr(STRATEGY)]).unwrap();
    assert_eq!(rewards.lp_babl, 0);
    let honest_share = w
        .dist
        .get_safe_user_share_per_strategy(&addr(GARDEN), &honest, &addr(STRATEGY), end)
        .unwrap();
    assert_eq!(honest_share, WAD);
}

#[test]
fn vuln_burn_after_window_keeps_earned_share() {
    let mut s = settled();
    let alice = s.alice.address();
    let before = s.w.dist.get_rewards(&addr(GARDEN), &alice, &[addr(STRATEGY)]).unwrap();
    s.w.dist
        .burn(addr(GARDEN), alice, block_at(s.end + 10), s.end + 10, 100 * WAD)
        .unwrap();
    let after = s.w.dist.get_rewards(&addr(GARDEN), &alice, &[addr(STRATEGY)]).unwrap();
    assert_eq!(before, after);
}

// ======================================================================
// Claim-and-stake
// Attack: redirect the stake into an arbitrary garden, or accept a
// price that mints fewer shares than signed for.
// ======================================================================

fn stake_message(s: &Setup) -> ClaimAndStakeMessage {
    let claim = claim_message(s);
    ClaimAndStakeMessage {
        garden: claim.garden,
        stake_garden: HEART_GARDEN,
        contributor: claim.contributor,
        babl: claim.babl,
        profit: claim.profit,
        min_amount_out: claim.babl,
        nonce: claim.nonce,
        nonce_heart: s.w.dist.nonce(&HEART_GARDEN, &claim.contributor),
        max_fee: 0,
        price_per_share: WAD,
    }
}

#[test]
fn vuln_stake_into_non_heart_garden() {
    let mut s = settled();
    let msg = ClaimAndStakeMessage { stake_garden: addr(OTHER_GARDEN), ..stake_message(&s) };
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_and_stake_rewards_by_sig(&ctx(KEEPER, s.end), &msg, 0, &sig);
    assert!(matches!(result, Err(RewardsError::UnknownGarden(_))));
}

#[test]
fn vuln_stake_slippage() {
    let mut s = settled();
    let msg = ClaimAndStakeMessage { price_per_share: WAD + 1, ..stake_message(&s) };
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_and_stake_rewards_by_sig(&ctx(KEEPER, s.end), &msg, 0, &sig);
    assert!(matches!(result, Err(RewardsError::SlippageExceeded { .. })));
    assert_eq!(s.w.token.total_supply(), 0);
    assert_eq!(s.w.dist.get_current_balance(&HEART_GARDEN, &s.alice.address()), 0);
}

#[test]
fn vuln_stale_heart_nonce() {
    let mut s = settled();
    let alice = s.alice.address();
    s.w.deposit(HEART_GARDEN, alice, s.end, WAD);
    let msg = ClaimAndStakeMessage { nonce_heart: 0, ..stake_message(&s) };
    let sig = msg.sign(&s.alice);
    let result = s.w.dist.claim_and_stake_rewards_by_sig(&ctx(KEEPER, s.end + 1), &msg, 0, &sig);
    assert_eq!(result, Err(RewardsError::InvalidNonce { expected: 1, got: 0 }));
}

// ======================================================================
// Governance
// Attack: push a parameter set that breaks the reward invariants, or
// change parameters without authority.
// ======================================================================

#[test]
fn vuln_benchmark_boost_configured_as_penalty() {
    let mut s = settled();
    let bad = MiningParameters {
        benchmark: Benchmark::from_array([
            90 * PERCENT,
            103 * PERCENT,
            80 * PERCENT,
            80 * PERCENT,
            90 * PERCENT,
        ]),
        ..Default::default()
    };
    let result = s.w.dist.set_mining_parameters(&ctx(GOVERNANCE, s.end), bad);
    assert_eq!(
        result,
        Err(RewardsError::InvalidParameterSet(ParameterError::BoostIsPenalty(90 * PERCENT)))
    );
    assert_eq!(s.w.dist.get_mining_parameters(), MiningParameters::default());
}

#[test]
fn vuln_role_split_over_one_hundred_percent() {
    let mut s = settled();
    let bad = MiningParameters { lp_share: 80 * PERCENT, ..Default::default() };
    let result = s.w.dist.set_mining_parameters(&ctx(GOVERNANCE, s.end), bad);
    assert_eq!(
        result,
        Err(RewardsError::InvalidParameterSet(ParameterError::RoleSplit(110 * PERCENT)))
    );
}

#[test]
fn vuln_parameters_from_non_governance() {
    let mut s = settled();
    let alice = s.alice.address();
    let result = s.w.dist.set_mining_parameters(&ctx(alice, s.end), MiningParameters::default());
    assert_eq!(result, Err(RewardsError::Unauthorized));
    assert_eq!(s.w.dist.add_keeper(&ctx(alice, s.end), alice), Err(RewardsError::Unauthorized));
    assert!(!s.w.dist.is_keeper(&alice));
}

#[test]
fn vuln_out_of_order_capital_event() {
    let mut s = settled();
    let late = addr(0x36);
    s.w.add_strategy(late, addr(GARDEN), addr(STRATEGIST), EPOCH_DURATION);
    let result = s.w.dist.capital_allocated(&late, START_TIME - 1 + EPOCH_DURATION / 2, WAD);
    assert!(matches!(result, Err(RewardsError::Ledger(_))));
    assert_eq!(s.w.dist.check_mining(1, &late).principal, 0);
    assert!(s.w.dist.engine().strategies().record(&late).is_none());
}
