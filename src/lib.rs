#![cfg_attr(not(test), no_std)]

//! `ctap-core` is the protocol core of a FIDO2/CTAP2 authenticator:
//! a canonical CBOR codec, a CTAPHID packet framer and a CBOR command
//! dispatcher, each byte-exact against the published FIDO CTAP 2.x
//! wire formats.
//!
//! The crate deliberately stops at the protocol boundary. Physical USB
//! transport, credential storage and the cryptographic operations behind
//! makeCredential / getAssertion are expected from the application,
//! which plugs in through [`authenticator::Handler`] registrations and
//! feeds raw 64-byte report frames to a [`ctaphid::Framer`].
//!
//! Time and randomness are injected ([`ctaphid::Clock`], any
//! `rand_core` CSPRNG), so the whole core runs deterministically under
//! test and on bare metal alike.

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[macro_use]
extern crate delog;
generate_macros!();

pub use heapless;
pub use heapless::{String, Vec};
pub use heapless_bytes;
pub use heapless_bytes::Bytes;

pub mod authenticator;
pub mod cbor;
pub mod ctap2;
pub mod ctaphid;
pub(crate) mod operation;
pub mod sizes;

pub use ctap2::{Error, Result};
