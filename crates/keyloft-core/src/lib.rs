//! Secret encryption and key management for keyloft.
//!
//! Secrets are arbitrary string values scoped to named environments, each
//! encrypted at rest under a named, rotatable 256-bit key. This crate wires
//! the pieces together:
//!
//! - [`KeyStore`] — key generation, lookup, lifecycle (active/retired/deleted)
//! - [`SecretStore`] — secret record CRUD and the tag codec
//! - [`EnvironmentStore`] — the scoping containers
//! - [`SecretCryptoService`] — encrypt-on-write, decrypt-on-read, rotation
//!
//! Persistence goes through the repository traits in `keyloft-storage`; the
//! AEAD primitive lives in `keyloft-crypto`.

mod environments;
mod error;
mod keys;
mod secrets;
mod service;

pub use environments::EnvironmentStore;
pub use error::VaultError;
pub use keys::KeyStore;
pub use secrets::{decode_tags, encode_tags, SecretStore};
pub use service::{CreateSecret, SecretCryptoService, SecretLookup, SecretSummary, UpdateSecret};
