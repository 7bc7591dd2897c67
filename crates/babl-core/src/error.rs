//! Error types for BABL mining.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuarterError {
    #[error("quarters are numbered from 1")] ZeroQuarter,
    #[error("timestamp {0} precedes the protocol start")] BeforeStart(u64),
}

/// Ledger corruption or impossible event ordering. Always fatal for the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("event out of order: last checkpoint at {last}, got {got}")] OutOfOrder { last: u64, got: u64 },
    #[error("principal underflow: have {have}, removing {remove}")] PrincipalUnderflow { have: u128, remove: u128 },
    #[error("balance underflow: have {have}, removing {remove}")] BalanceUnderflow { have: u128, remove: u128 },
    #[error("quarter ordering corrupted at quarter {0}")] CorruptQuarterOrder(u64),
    #[error("strategy ledger is read-only after finalization")] Finalized,
    #[error(transparent)] Quarter(#[from] QuarterError),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("role percentages sum to {0}, expected 100%")] RoleSplit(u128),
    #[error("profit and principal weights sum to {0}, expected 100%")] WeightSplit(u128),
    #[error("benchmark thresholds not increasing: low {low} >= high {high}")] ThresholdOrder { low: u128, high: u128 },
    #[error("benchmark segments not ordered: {seg1} <= {seg2} <= {seg3} violated")] SegmentOrder { seg1: u128, seg2: u128, seg3: u128 },
    #[error("benchmark boost segment {0} is a penalty")] BoostIsPenalty(u128),
    #[error("profit sharing sums to {0}, above 100%")] ProfitSharing(u128),
    #[error("epoch duration must be non-zero")] ZeroEpoch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("signature verification failed")] VerificationFailed,
    #[error("signer does not match contributor")] SignerMismatch,
}

/// Failures reported by external collaborators (garden, token, oracle).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("no price for {0}")] MissingPrice(String),
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("{0}")] Rejected(String),
}

/// The error surface of every mutating and query operation on the distributor.
///
/// All variants are raised before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardsError {
    #[error("caller is not authorized")] Unauthorized,
    #[error("invalid nonce: expected {expected}, got {got}")] InvalidNonce { expected: u64, got: u64 },
    #[error("address holds no position in the garden")] NotAContributor,
    #[error("nothing left to claim")] AlreadyClaimed,
    #[error("strategies belong to more than one garden")] CrossFundClaim,
    #[error("invalid parameter set: {0}")] InvalidParameterSet(#[from] ParameterError),
    #[error("unknown strategy: {0}")] UnknownStrategy(String),
    #[error("unknown garden: {0}")] UnknownGarden(String),
    #[error("strategy {0} is not active")] StrategyNotActive(String),
    #[error("strategy {0} already finalized")] AlreadyFinalized(String),
    #[error("fee {fee} above max fee {max_fee}")] FeeTooHigh { fee: u128, max_fee: u128 },
    #[error("claim exceeds pending rewards")] ClaimExceedsPending,
    #[error("stake below minimum: wanted {min_out}, got {got}")] SlippageExceeded { min_out: u128, got: u128 },
    #[error("collaborator: {0}")] Collaborator(#[from] CollaboratorError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Quarter(#[from] QuarterError),
}
