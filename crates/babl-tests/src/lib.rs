//! End-to-end and adversarial test suite for BABL mining.
//!
//! Integration tests drive a full [`babl_distributor::RewardsDistributor`]
//! over in-memory collaborators and try to break the accounting from a
//! contributor's, a relayer's and an attacker's point of view.

pub mod helpers;
