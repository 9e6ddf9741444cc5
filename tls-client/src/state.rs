//! The handshake's phase, modeled as an explicit state enum rather than
//! the "struct of optionals" the original carried (a `server_certs`,
//! `server_kex`, ... each independently `Option`-ish, with validity
//! inferred from which ones happen to be populated). Each variant here
//! holds exactly the data that is actually available in that phase, so
//! the driver can't read a field that hasn't arrived yet, and can't
//! represent a combination the protocol forbids.
//!
//! [`PostHello`] further resolves an ordering question left open by the
//! wire format itself: whether CertificateRequest may precede
//! ServerKeyExchange. RFC 5246 §7.3 fixes the order as Certificate, then
//! ServerKeyExchange,
//! then CertificateRequest, then ServerHelloDone, so `PostHello` is a
//! cursor that only ever advances forward through that sequence.
//! Certificate and ServerKeyExchange are each independently optional
//! (an anonymous-DH suite sends no Certificate; a static-RSA suite
//! sends no ServerKeyExchange), so the cursor can jump straight from
//! `Hello` to `Kex` or to `CertReq`.

use crate::key::PeerKey;
use crate::suite::CipherSuite;
use crate::version::ProtocolVersion;

/// `cert_key` is the leaf certificate's public key, used only to verify
/// a ServerKeyExchange signature (or, for a `NoKex` suite, to encrypt
/// the pre-master secret directly). `kex_key` is the fresh key a
/// ServerKeyExchange supplies; it is a distinct value from `cert_key`
/// and the two are never confused, even though both ultimately feed
/// ClientKeyExchange.
#[derive(Debug)]
pub enum PostHello {
    /// ServerHello has been processed; nothing else has.
    Hello,
    /// A Certificate message has been accepted. Always non-empty
    /// `chain`; `cert_key`'s variant matches the suite's `sig_type`.
    Cert { chain: Vec<Vec<u8>>, cert_key: PeerKey },
    /// A ServerKeyExchange has been accepted. `cert_key` is absent iff
    /// no Certificate preceded it (anonymous suite).
    Kex {
        chain: Vec<Vec<u8>>,
        cert_key: Option<PeerKey>,
        kex_key: PeerKey,
    },
    /// A CertificateRequest has been accepted; the last optional
    /// message before ServerHelloDone. `kex_key` is absent iff the
    /// suite never sends a ServerKeyExchange (`NoKex`).
    CertReq {
        chain: Vec<Vec<u8>>,
        cert_key: Option<PeerKey>,
        kex_key: Option<PeerKey>,
        certificate_types: Vec<u8>,
    },
}

impl PostHello {
    pub fn accepts_certificate(&self) -> bool {
        matches!(self, PostHello::Hello)
    }

    pub fn accepts_server_kex(&self) -> bool {
        matches!(self, PostHello::Hello | PostHello::Cert { .. })
    }

    /// spec.md §4.B's precondition for CertificateRequest is
    /// `server_certs present`, unconditionally — not just "not yet
    /// requested". An anonymous suite, which never sends a Certificate
    /// (see `handle_certificate`'s `SigType::Anon` rejection), can
    /// therefore never legally receive a CertificateRequest either.
    /// `Kex` alone doesn't prove a Certificate was received — an
    /// anonymous suite reaches `Kex` straight from `Hello` via an
    /// unsigned ServerKeyExchange, with `cert_key: None` — so that arm
    /// must check presence explicitly rather than just matching the
    /// variant.
    pub fn accepts_certificate_request(&self) -> bool {
        match self {
            PostHello::Cert { .. } => true,
            PostHello::Kex { cert_key, .. } => cert_key.is_some(),
            PostHello::Hello | PostHello::CertReq { .. } => false,
        }
    }

    pub fn do_client_auth(&self) -> bool {
        matches!(self, PostHello::CertReq { .. })
    }

    pub fn certificate_types(&self) -> &[u8] {
        match self {
            PostHello::CertReq { certificate_types, .. } => certificate_types,
            _ => &[],
        }
    }

    /// Consumes the cursor, yielding the certificate's public key (for
    /// signature verification / direct RSA encryption) and the fresh
    /// key-exchange key (for DH), whichever are present.
    pub fn into_keys(self) -> (Option<PeerKey>, Option<PeerKey>) {
        match self {
            PostHello::Hello => (None, None),
            PostHello::Cert { cert_key, .. } => (Some(cert_key), None),
            PostHello::Kex { cert_key, kex_key, .. } => (cert_key, Some(kex_key)),
            PostHello::CertReq { cert_key, kex_key, .. } => (cert_key, kex_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SignatureVerifier;

    #[derive(Debug)]
    struct StubDsa;
    impl SignatureVerifier for StubDsa {
        fn verify(&self, _message: &[u8], _signature: &[u8]) -> bool {
            false
        }
    }

    #[test]
    fn hello_accepts_certificate_and_kex_but_not_cert_req_without_a_certificate() {
        let hello = PostHello::Hello;
        assert!(hello.accepts_certificate());
        assert!(hello.accepts_server_kex());
        // spec.md §4.B: CertificateRequest's precondition is
        // `server_certs present` — an anonymous suite that never sends
        // a Certificate can never legally receive one either.
        assert!(!hello.accepts_certificate_request());
        assert!(!hello.do_client_auth());
    }

    #[test]
    fn cert_no_longer_accepts_another_certificate() {
        let cert = PostHello::Cert { chain: vec![vec![1]], cert_key: PeerKey::Dsa(Box::new(StubDsa)) };
        assert!(!cert.accepts_certificate());
        assert!(cert.accepts_server_kex());
        assert!(cert.accepts_certificate_request());
    }

    #[test]
    fn kex_no_longer_accepts_certificate_or_another_kex() {
        let kex = PostHello::Kex {
            chain: vec![vec![1]],
            cert_key: Some(PeerKey::Dsa(Box::new(StubDsa))),
            kex_key: PeerKey::Dsa(Box::new(StubDsa)),
        };
        assert!(!kex.accepts_certificate());
        assert!(!kex.accepts_server_kex());
        assert!(kex.accepts_certificate_request());
    }

    #[test]
    fn kex_without_a_prior_certificate_still_rejects_certificate_request() {
        // An anonymous suite reaches `Kex` straight from `Hello` via an
        // unsigned ServerKeyExchange: no Certificate was ever sent, so
        // `cert_key` is `None` even though the cursor is past `Hello`.
        let kex = PostHello::Kex { chain: Vec::new(), cert_key: None, kex_key: PeerKey::Dh(Box::new(StubDh)) };
        assert!(!kex.accepts_certificate_request());
    }

    #[derive(Debug)]
    struct StubDh;
    impl crate::key::DhKeyExchange for StubDh {
        fn derive_pre_master(&self, _rng: &mut dyn crate::collaborators::RandomSource) -> (Vec<u8>, Vec<u8>) {
            (Vec::new(), Vec::new())
        }
    }

    #[test]
    fn cert_req_is_terminal_and_marks_client_auth() {
        let cert_req = PostHello::CertReq {
            chain: vec![],
            cert_key: None,
            kex_key: None,
            certificate_types: vec![1, 64],
        };
        assert!(!cert_req.accepts_certificate());
        assert!(!cert_req.accepts_server_kex());
        assert!(!cert_req.accepts_certificate_request());
        assert!(cert_req.do_client_auth());
        assert_eq!(cert_req.certificate_types(), &[1, 64]);
    }
}

/// The handshake's overall phase. Unlike `PostHello`, which tracks
/// progress *within* the single flight from ServerHello to
/// ServerHelloDone, `State` tracks the coarser phases the top-level
/// `process_handshake_msg` dispatch switches on.
#[derive(Debug)]
pub enum State {
    /// Waiting for ServerHello. `offered_suites`/`offered_version` are
    /// what the client advertised, kept so ServerHello can be checked
    /// against them.
    AwaitingServerHello {
        client_random: [u8; 32],
        offered_suites: Vec<u16>,
        offered_version: ProtocolVersion,
    },
    /// ServerHello through ServerHelloDone. `offered_version` is
    /// retained from `AwaitingServerHello` because the pre-master
    /// secret's version-rollback bytes bind to what the client
    /// *advertised*, not the negotiated version.
    AfterServerHello {
        client_random: [u8; 32],
        server_random: [u8; 32],
        suite: CipherSuite,
        version: ProtocolVersion,
        offered_version: ProtocolVersion,
        post_hello: PostHello,
    },
    /// The client's flight (Certificate?, ClientKeyExchange,
    /// CertificateVerify?, ChangeCipherSpec, Finished) has been sent;
    /// waiting for the server's ChangeCipherSpec. `expected_verify_data`
    /// is precomputed here, since no further message is hashed into the
    /// transcript between the client's Finished and the server's.
    AwaitingServerCcs {
        master_secret: crate::keys::MasterSecret,
        suite: CipherSuite,
        session_keys: crate::keys::SessionKeys,
        expected_verify_data: Vec<u8>,
    },
    /// The server's ChangeCipherSpec arrived; waiting for the server's
    /// Finished. Decrypting that record under the just-installed read
    /// keys is the record layer's job, not this driver's.
    AwaitingServerFinished {
        master_secret: crate::keys::MasterSecret,
        expected_verify_data: Vec<u8>,
    },
    /// The handshake is complete; the driver rejects any further
    /// handshake message as unexpected until a fresh HelloRequest
    /// starts a new one (renegotiation mid-channel is a non-goal).
    Active,
    /// A handler rejected its message after taking ownership of the
    /// prior state. Distinct from `Active` so a failed transition can
    /// never be mistaken for a completed handshake; the channel must
    /// refuse all further handshake input from here (spec.md §4.B's
    /// terminal-failure contract).
    Failed,
}
