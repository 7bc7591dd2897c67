//! # babl-distributor: the BABL rewards distributor.
//!
//! Wires the mining ledgers of `babl-mining` to the outside world:
//!
//! - **Events**: ordered capital, lifecycle and share events drive the
//!   ledgers ([`ProtocolEvent`], [`RewardsDistributor::apply`]).
//! - **Queries**: supply and power snapshots, reward estimates, per-contributor
//!   pending rewards.
//! - **Claims**: direct claims, keeper-relayed signed claims and
//!   claim-and-stake, with per-garden nonces ([`ClaimProcessor`]).
//! - **Governance**: mining parameters and the keeper set
//!   ([`GovernanceParameterStore`]).

pub mod claims;
pub mod distributor;
pub mod event;
pub mod governance;

pub use claims::{ClaimProcessor, ClaimRecord};
pub use distributor::{ClaimReceipt, Collaborators, RewardsDistributor, SettledStrategy, SharedDistributor};
pub use event::{CallContext, ProtocolEvent};
pub use governance::GovernanceParameterStore;
