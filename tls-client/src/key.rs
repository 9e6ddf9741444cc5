//! Key-exchange and signature collaborators.
//!
//! RSA, DSA and DH key math are explicitly out of scope: they are
//! external collaborators the core only consumes through an interface.
//! The original Botan driver discriminated between them with
//! `dynamic_cast`; we replace that with a tagged-variant enumeration,
//! so every place the driver
//! needs to ask "is this a DH key?" is a compile-time-exhaustive match
//! instead of a runtime type test.

use std::fmt;

use crate::collaborators::RandomSource;
use crate::error::TlsError;

/// A certificate's (or ServerKeyExchange's) public key, signature, or
/// key-exchange verb is carried with it via trait objects — only the
/// operation the driver actually needs.
pub trait SignatureVerifier: fmt::Debug {
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool;
}

pub trait RsaEncryptor: fmt::Debug {
    /// Encrypts `plaintext` (the 48-byte pre-master secret) under this
    /// RSA public key per PKCS#1 v1.5, as RFC 5246 §7.4.7.1 requires.
    fn encrypt_pkcs1(&self, rng: &mut dyn RandomSource, plaintext: &[u8]) -> Vec<u8>;
}

/// An RSA key usable for both purposes: the cert it came from may be
/// signing a DHE_RSA ServerKeyExchange, or — for a static RSA suite —
/// may itself be the key-exchange public key.
pub trait RsaPeerKey: SignatureVerifier + RsaEncryptor {}
impl<T: SignatureVerifier + RsaEncryptor + ?Sized> RsaPeerKey for T {}

pub trait DhKeyExchange: fmt::Debug {
    /// Derives the shared pre-master secret and the client's own DH
    /// public value to send back in ClientKeyExchange.
    fn derive_pre_master(&self, rng: &mut dyn RandomSource) -> (Vec<u8>, Vec<u8>);
}

/// Parses the DH parameters embedded in a ServerKeyExchange body,
/// returning the key and the number of leading bytes of the body that
/// made up those parameters (the rest, if any, is the signature).
pub trait ServerKexParser {
    fn parse_dh_params(&self, body: &[u8]) -> Result<(Box<dyn DhKeyExchange>, usize), TlsError>;
}

/// The discriminated union that replaces runtime `dynamic_cast` on the
/// server's key-exchange public key. Only `Rsa` and `Dh` ever
/// participate in key exchange; `Dsa` exists because a leaf certificate
/// may carry a DSA key usable only to verify a DHE_DSS
/// ServerKeyExchange signature.
pub enum PeerKey {
    Rsa(Box<dyn RsaPeerKey>),
    Dsa(Box<dyn SignatureVerifier>),
    Dh(Box<dyn DhKeyExchange>),
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PeerKey::Rsa(k) => write!(f, "PeerKey::Rsa({:?})", k),
            PeerKey::Dsa(k) => write!(f, "PeerKey::Dsa({:?})", k),
            PeerKey::Dh(k) => write!(f, "PeerKey::Dh({:?})", k),
        }
    }
}

impl PeerKey {
    pub fn is_rsa(&self) -> bool {
        matches!(self, PeerKey::Rsa(_))
    }

    pub fn is_dsa(&self) -> bool {
        matches!(self, PeerKey::Dsa(_))
    }

    pub fn is_dh(&self) -> bool {
        matches!(self, PeerKey::Dh(_))
    }

    /// Verifies a signature using whichever signer variant this key is.
    /// Returns `false` (never panics) for `Dh`, which never signs —
    /// callers only reach this arm if an earlier suite/key-type
    /// consistency check was skipped, so treating it as a verification
    /// failure (rather than an unreachable!()) keeps the driver total.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            PeerKey::Rsa(k) => k.verify(message, signature),
            PeerKey::Dsa(k) => k.verify(message, signature),
            PeerKey::Dh(_) => false,
        }
    }
}
