//! Key set registry.
//!
//! This crate manages a published JSON Web Key Set of RSA signing keys: it
//! validates the document, enforces the key identifier policy, mints and
//! proves new keypairs, and appends them durably.
//!
//! # Modules
//!
//! - [`constants`]: Identifier pattern, key type and configuration defaults
//! - [`error`]: Error types shared by every operation
//! - [`jwk`]: Key set document model and base64url helpers
//! - [`keypair`]: RSA keypair minting
//! - [`kid`]: Key identifier parsing and version policy
//! - [`prover`]: Sign/verify round trip for new keypairs
//! - [`repository`]: Loading and revision-checked persistence of the document
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing fixtures
//! - [`validation`]: Key set invariant checks
//! - [`workflow`]: The registration state machine

pub mod constants;
pub mod error;
pub mod jwk;
pub mod keypair;
pub mod kid;
pub mod prover;
pub mod repository;
pub mod settings;
pub mod test_support;
pub mod validation;
pub mod workflow;
