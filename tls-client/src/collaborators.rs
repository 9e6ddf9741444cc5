//! The external collaborators this driver consumes only through their
//! interfaces: the X.509 parser/validator, the
//! PRNG, the record-layer reader/writer, the master-secret/key-block
//! PRF, and the caller's client-auth policy. None of these are
//! implemented here — only the seams they plug into. A `testing`-gated
//! `mock` module provides minimal stand-ins for unit tests.

use crate::error::TlsError;
use crate::key::PeerKey;
use crate::keys::{FinishedLabel, MasterSecret, SessionKeys};
use crate::suite::CipherSuite;
use crate::version::ProtocolVersion;

/// Source of randomness for the handshake (client random, pre-master
/// padding, ...). Also the sink for "mix every inbound handshake
/// message's bytes into the entropy pool".
pub trait RandomSource {
    fn add_entropy(&mut self, data: &[u8]);
    fn random_bytes(&mut self, len: usize) -> Vec<u8>;
}

/// The caller's policy: which versions are acceptable, and whether a
/// certificate chain is trusted. Deliberately thin — this *is* the
/// configuration surface for this driver; there is no
/// config file or environment variable underneath it.
pub trait Policy {
    fn min_version(&self) -> ProtocolVersion;
    fn pref_version(&self) -> ProtocolVersion;
    fn check_cert(&self, chain: &[Vec<u8>]) -> bool;
}

/// X.509 parsing/validation, named only by the interface the core
/// consumes: turn a chain of leaf-first DER blobs into the leaf's
/// public key.
pub trait CertificateParser {
    fn parse_leaf_key(&self, chain: &[Vec<u8>]) -> Result<PeerKey, TlsError>;
}

/// The running transcript-hash accumulator.
/// Fed every handshake message except ChangeCipherSpec, HelloRequest
/// and Finished. The concrete hash algorithm is itself external in a
/// full implementation — TLS 1.0/1.1 use the MD5+SHA-1 concatenation of
/// RFC 2246 §5 — so this is a pluggable trait; see [`Sha256Transcript`]
/// in `transcript.rs` for the bundled reference/test implementation.
pub trait TranscriptHash {
    fn update(&mut self, data: &[u8]);
    /// Snapshots the current digest without consuming the accumulator
    /// (more handshake messages may follow).
    fn finish(&self) -> Vec<u8>;
}

/// The master-secret/key-block PRF and the Finished-message MAC. The
/// driver only ever calls these three operations; it never touches a
/// hash/HMAC primitive directly for this purpose.
pub trait Kdf {
    fn derive_master_secret(
        &self,
        suite: &CipherSuite,
        version: ProtocolVersion,
        pre_master_secret: &[u8],
        client_random: [u8; 32],
        server_random: [u8; 32],
    ) -> MasterSecret;

    fn derive_key_block(
        &self,
        suite: &CipherSuite,
        version: ProtocolVersion,
        master_secret: &MasterSecret,
        client_random: [u8; 32],
        server_random: [u8; 32],
    ) -> SessionKeys;

    fn finished_verify_data(
        &self,
        master_secret: &MasterSecret,
        version: ProtocolVersion,
        label: FinishedLabel,
        transcript_hash: &[u8],
    ) -> Vec<u8>;
}

/// Emits handshake records and eventually carries the negotiated
/// session keys for the client's write direction. Record-layer framing
/// below the handshake body and any encryption are this collaborator's
/// job, not the driver's.
pub trait RecordWriter {
    fn set_version(&mut self, version: ProtocolVersion);
    fn send_handshake(&mut self, msg_type: u8, body: &[u8]) -> Result<(), TlsError>;
    fn send_change_cipher_spec(&mut self) -> Result<(), TlsError>;
    fn install_write_keys(&mut self, suite: &CipherSuite, keys: &SessionKeys);
    fn flush(&mut self) -> Result<(), TlsError>;
}

/// Mirror of [`RecordWriter`] for the read direction.
pub trait RecordReader {
    fn set_version(&mut self, version: ProtocolVersion);
    fn install_read_keys(&mut self, suite: &CipherSuite, keys: &SessionKeys);
}

/// The extension point a caller uses to supply client-authentication
/// material. Called only when the server sent a CertificateRequest.
/// Returning `None` is legal (an empty client Certificate, no
/// CertificateVerify); the driver never silently omits CertificateVerify
/// when a chain is actually presented.
pub trait ClientAuthProvider {
    fn select(
        &mut self,
        acceptable_types: &[u8],
    ) -> Option<(Vec<Vec<u8>>, Box<dyn ClientSigner>)>;
}

pub trait ClientSigner {
    fn sign(&self, transcript_hash: &[u8]) -> Vec<u8>;
}

/// A [`ClientAuthProvider`] that always presents an empty certificate
/// (the RFC-legal "I have no certificate" response), for callers that
/// don't support client authentication at all.
pub struct NoClientAuth;

impl ClientAuthProvider for NoClientAuth {
    fn select(&mut self, _acceptable_types: &[u8]) -> Option<(Vec<Vec<u8>>, Box<dyn ClientSigner>)> {
        None
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod mock {
    use super::*;
    use crate::key::{DhKeyExchange, RsaEncryptor, ServerKexParser, SignatureVerifier};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Deterministic, non-cryptographic `RandomSource` for tests: bytes
    /// are whatever was queued up front, entropy contributions are
    /// ignored. Never use outside tests.
    #[derive(Default)]
    pub struct FixedRandom {
        pub queued: RefCell<Vec<u8>>,
    }

    impl FixedRandom {
        pub fn new(bytes: Vec<u8>) -> Self {
            FixedRandom { queued: RefCell::new(bytes) }
        }
    }

    impl RandomSource for FixedRandom {
        fn add_entropy(&mut self, _data: &[u8]) {}

        fn random_bytes(&mut self, len: usize) -> Vec<u8> {
            let mut queued = self.queued.borrow_mut();
            if queued.len() >= len {
                queued.drain(0..len).collect()
            } else {
                vec![0u8; len]
            }
        }
    }

    /// A policy that accepts any certificate and any version down to
    /// TLS 1.0 — fine for exercising the state machine, not for
    /// anything real.
    pub struct PermissivePolicy {
        pub min: ProtocolVersion,
        pub pref: ProtocolVersion,
    }

    impl Default for PermissivePolicy {
        fn default() -> Self {
            PermissivePolicy { min: ProtocolVersion::TLS1_0, pref: ProtocolVersion::TLS1_1 }
        }
    }

    impl Policy for PermissivePolicy {
        fn min_version(&self) -> ProtocolVersion {
            self.min
        }

        fn pref_version(&self) -> ProtocolVersion {
            self.pref
        }

        fn check_cert(&self, chain: &[Vec<u8>]) -> bool {
            !chain.is_empty()
        }
    }

    #[derive(Default)]
    struct VecRecordWriterInner {
        version: Option<ProtocolVersion>,
        records: Vec<(Option<u8>, Vec<u8>)>,
        write_keys_installed: bool,
    }

    /// Collects every record the driver emits, tagged by handshake type
    /// (or `None` for ChangeCipherSpec). Cloning shares the same
    /// recorded state (`Rc<RefCell<_>>`), so a test can hand one clone
    /// to `ClientHandshake::new` and keep another to inspect afterward.
    #[derive(Clone, Default)]
    pub struct VecRecordWriter(Rc<RefCell<VecRecordWriterInner>>);

    impl VecRecordWriter {
        pub fn new() -> Self {
            VecRecordWriter::default()
        }

        pub fn records(&self) -> Vec<(Option<u8>, Vec<u8>)> {
            self.0.borrow().records.clone()
        }

        pub fn write_keys_installed(&self) -> bool {
            self.0.borrow().write_keys_installed
        }
    }

    impl RecordWriter for VecRecordWriter {
        fn set_version(&mut self, version: ProtocolVersion) {
            self.0.borrow_mut().version = Some(version);
        }

        fn send_handshake(&mut self, msg_type: u8, body: &[u8]) -> Result<(), TlsError> {
            self.0.borrow_mut().records.push((Some(msg_type), body.to_vec()));
            Ok(())
        }

        fn send_change_cipher_spec(&mut self) -> Result<(), TlsError> {
            self.0.borrow_mut().records.push((None, Vec::new()));
            Ok(())
        }

        fn install_write_keys(&mut self, _suite: &CipherSuite, _keys: &SessionKeys) {
            self.0.borrow_mut().write_keys_installed = true;
        }

        fn flush(&mut self) -> Result<(), TlsError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullRecordReaderInner {
        version: Option<ProtocolVersion>,
        read_keys_installed: bool,
    }

    /// Mirrors [`VecRecordWriter`]'s sharing for the read direction;
    /// tests only ever check whether read keys were installed.
    #[derive(Clone, Default)]
    pub struct NullRecordReader(Rc<RefCell<NullRecordReaderInner>>);

    impl NullRecordReader {
        pub fn new() -> Self {
            NullRecordReader::default()
        }

        pub fn read_keys_installed(&self) -> bool {
            self.0.borrow().read_keys_installed
        }
    }

    impl RecordReader for NullRecordReader {
        fn set_version(&mut self, version: ProtocolVersion) {
            self.0.borrow_mut().version = Some(version);
        }

        fn install_read_keys(&mut self, _suite: &CipherSuite, _keys: &SessionKeys) {
            self.0.borrow_mut().read_keys_installed = true;
        }
    }

    /// A toy Kdf: not a real PRF, just deterministic so scenario tests
    /// can assert both sides compute the same Finished verify-data.
    pub struct ToyKdf;

    impl Kdf for ToyKdf {
        fn derive_master_secret(
            &self,
            _suite: &CipherSuite,
            _version: ProtocolVersion,
            pre_master_secret: &[u8],
            client_random: [u8; 32],
            server_random: [u8; 32],
        ) -> MasterSecret {
            let mut out = [0u8; 48];
            let mix = [pre_master_secret, &client_random, &server_random].concat();
            for (i, byte) in out.iter_mut().enumerate() {
                *byte = mix[i % mix.len()] ^ (i as u8);
            }
            MasterSecret(out)
        }

        fn derive_key_block(
            &self,
            _suite: &CipherSuite,
            _version: ProtocolVersion,
            master_secret: &MasterSecret,
            _client_random: [u8; 32],
            _server_random: [u8; 32],
        ) -> SessionKeys {
            let seed = &master_secret.0;
            let chunk = |offset: usize| seed[offset % 48..(offset % 48) + 8.min(48 - offset % 48)].to_vec();
            SessionKeys {
                client_write_mac_key: chunk(0),
                server_write_mac_key: chunk(8),
                client_write_key: chunk(16),
                server_write_key: chunk(24),
                client_write_iv: chunk(32),
                server_write_iv: chunk(40),
            }
        }

        fn finished_verify_data(
            &self,
            master_secret: &MasterSecret,
            _version: ProtocolVersion,
            label: FinishedLabel,
            transcript_hash: &[u8],
        ) -> Vec<u8> {
            let tag = match label {
                FinishedLabel::Client => 0xAAu8,
                FinishedLabel::Server => 0x55u8,
            };
            let mut out = vec![0u8; 12];
            for (i, byte) in out.iter_mut().enumerate() {
                *byte = master_secret.0[i] ^ transcript_hash[i % transcript_hash.len()] ^ tag;
            }
            out
        }
    }

    /// A deterministic, non-cryptographic MAC shared between the mock
    /// signer (used when a test builds a wire message) and
    /// [`DummySigningKey::verify`], so the two always agree without
    /// either side running real RSA/DSA math.
    pub fn mock_mac(tag: u8, message: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = tag ^ message[i % message.len()] ^ (i as u8);
        }
        out
    }

    /// Stands in for either an RSA or a DSA leaf key, tagged so a test
    /// can construct a signature/ciphertext the verifier or driver
    /// will accept without any real public-key arithmetic.
    #[derive(Debug)]
    pub struct DummySigningKey {
        pub tag: u8,
    }

    impl SignatureVerifier for DummySigningKey {
        fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
            signature == mock_mac(self.tag, message)
        }
    }

    impl RsaEncryptor for DummySigningKey {
        fn encrypt_pkcs1(&self, _rng: &mut dyn RandomSource, plaintext: &[u8]) -> Vec<u8> {
            plaintext.iter().map(|b| b ^ self.tag).collect()
        }
    }

    #[derive(Debug)]
    pub struct DummyDhKey {
        pub blob: Vec<u8>,
    }

    impl DhKeyExchange for DummyDhKey {
        fn derive_pre_master(&self, rng: &mut dyn RandomSource) -> (Vec<u8>, Vec<u8>) {
            let pre_master = rng.random_bytes(48);
            let client_pub = self.blob.iter().map(|b| b ^ 0xAA).collect();
            (pre_master, client_pub)
        }
    }

    /// A leaf certificate, for this mock's purposes, is exactly two
    /// bytes: a tag byte and a type marker (`1` = RSA, `2` = DSA).
    pub struct DummyCertificateParser;

    impl CertificateParser for DummyCertificateParser {
        fn parse_leaf_key(&self, chain: &[Vec<u8>]) -> Result<PeerKey, TlsError> {
            let leaf = chain.first().ok_or(TlsError::UnsupportedCertificate)?;
            let tag = *leaf.first().ok_or(TlsError::UnsupportedCertificate)?;
            match leaf.get(1) {
                Some(1) => Ok(PeerKey::Rsa(Box::new(DummySigningKey { tag }))),
                Some(2) => Ok(PeerKey::Dsa(Box::new(DummySigningKey { tag }))),
                _ => Err(TlsError::UnsupportedCertificate),
            }
        }
    }

    /// Parses this mock's DH parameter encoding: a 2-byte big-endian
    /// length followed by an opaque blob. Real DH structure (p, g, Ys)
    /// is exactly the kind of detail left to this collaborator; the
    /// mock only needs *a* framing, not the real one.
    pub struct DummyKexParser;

    impl ServerKexParser for DummyKexParser {
        fn parse_dh_params(&self, body: &[u8]) -> Result<(Box<dyn DhKeyExchange>, usize), TlsError> {
            if body.len() < 2 {
                return Err(TlsError::HandshakeFailure("DH params truncated".to_string()));
            }
            let len = ((body[0] as usize) << 8) | body[1] as usize;
            if body.len() < 2 + len {
                return Err(TlsError::HandshakeFailure("DH params truncated".to_string()));
            }
            let blob = body[2..2 + len].to_vec();
            Ok((Box::new(DummyDhKey { blob }), 2 + len))
        }
    }

    /// Encodes a ServerKeyExchange body matching [`DummyKexParser`]'s
    /// framing, with an optional trailing signature matching
    /// `message::ServerKeyExchangeMsg::parse`'s expectations.
    pub fn encode_dh_server_kex(blob: &[u8], signature: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(blob.len() as u16).to_be_bytes());
        out.extend_from_slice(blob);
        if let Some(sig) = signature {
            out.extend_from_slice(&(sig.len() as u16).to_be_bytes());
            out.extend_from_slice(sig);
        }
        out
    }

    struct DummyClientSigner {
        tag: u8,
    }

    impl ClientSigner for DummyClientSigner {
        fn sign(&self, transcript_hash: &[u8]) -> Vec<u8> {
            mock_mac(self.tag, transcript_hash)
        }
    }

    /// A [`ClientAuthProvider`] that always presents the same one-entry
    /// chain, signed with [`mock_mac`] under `tag`. Exercises the
    /// non-empty-Certificate-plus-CertificateVerify path; pair with
    /// [`mock_mac`] in a test to check the driver signed what it claims
    /// to have signed.
    pub struct FixedClientAuth {
        pub chain: Vec<Vec<u8>>,
        pub tag: u8,
    }

    impl ClientAuthProvider for FixedClientAuth {
        fn select(
            &mut self,
            _acceptable_types: &[u8],
        ) -> Option<(Vec<Vec<u8>>, Box<dyn ClientSigner>)> {
            Some((self.chain.clone(), Box::new(DummyClientSigner { tag: self.tag })))
        }
    }
}
