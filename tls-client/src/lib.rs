//! A client-side driver for the TLS 1.0/1.1-era handshake: strict
//! message ordering, transcript-hash binding, and fatal-on-deviation
//! semantics, with every cryptographic primitive (X.509 parsing, RSA/
//! DSA/DH key math, the transcript hash, the master-secret/key-block
//! PRF, record-layer encryption, the PRNG) supplied by the caller
//! through the traits in [`collaborators`] and [`key`].
//!
//! This crate does not itself dial a socket, parse a certificate, or
//! perform any RSA/DH arithmetic — see spec §1's scoping. What it does
//! own is the state machine: which message is legal next, what must be
//! checked before accepting it, and in what order the client's own
//! reply flight goes out.

#![forbid(unsafe_code)]

pub mod collaborators;
pub mod error;
pub mod key;
pub mod keys;
mod machine;
pub mod message;
pub mod state;
pub mod suite;
pub mod transcript;
pub mod version;

pub use collaborators::{
    CertificateParser, ClientAuthProvider, ClientSigner, Kdf, NoClientAuth, Policy, RandomSource,
    RecordReader, RecordWriter, TranscriptHash,
};
pub use error::{AlertDescription, TlsError};
pub use key::{DhKeyExchange, PeerKey, RsaEncryptor, RsaPeerKey, ServerKexParser, SignatureVerifier};
pub use keys::{FinishedLabel, MasterSecret, SessionKeys};
pub use machine::ClientHandshake;
pub use suite::CipherSuite;
pub use transcript::Sha256Transcript;
pub use version::ProtocolVersion;
