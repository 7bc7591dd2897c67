//! # babl-core
//! Foundation types, fixed-point math and collaborator traits for BABL mining.

pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod math;
pub mod memory;
pub mod params;
pub mod supply;
pub mod traits;
pub mod types;
