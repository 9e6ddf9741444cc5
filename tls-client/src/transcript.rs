//! A default [`TranscriptHash`] implementation for tests and for
//! callers that don't care about wire-level MD5+SHA-1 interop.
//!
//! RFC 2246 §5 (TLS 1.0) and RFC 4346 §5 (TLS 1.1) both define the
//! handshake transcript hash as the *concatenation* of an MD5 and a
//! SHA-1 running digest, not a single modern hash. Producing that
//! exactly is a record-layer/crypto-library concern this driver
//! deliberately stays out of; `Sha256Transcript` exists so
//! the state machine and its tests have something concrete to drive
//! against. A production caller wiring this up against a real peer
//! supplies its own `TranscriptHash` that reproduces the RFC digest.

use sha2::{Digest, Sha256};

use crate::collaborators::TranscriptHash;

#[derive(Clone, Default)]
pub struct Sha256Transcript {
    hasher: Sha256,
}

impl Sha256Transcript {
    pub fn new() -> Self {
        Sha256Transcript { hasher: Sha256::default() }
    }
}

impl TranscriptHash for Sha256Transcript {
    fn update(&mut self, data: &[u8]) {
        self.hasher.input(data);
    }

    fn finish(&self) -> Vec<u8> {
        self.hasher.clone().result().to_vec()
    }
}
