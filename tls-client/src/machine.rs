//! The handshake driver itself. `ClientHandshake` owns the state
//! record and every external collaborator; it never touches concrete
//! X.509, RSA/DSA/DH, or record-layer crypto directly.
//!
//! The constructor sends the initial ClientHello eagerly, so by the
//! time a `ClientHandshake` exists a handshake is already underway —
//! there is no "not started yet" state to resume from. A HelloRequest
//! therefore always names a renegotiation, which this driver does not
//! support (session resumption and DTLS are already out of scope; we
//! add renegotiation to that list rather than silently drop or
//! half-implement it). The original driver this is modeled on quietly
//! ignores a HelloRequest received mid-handshake; we diverge and reject
//! it with a fatal handshake-failure error instead of the original's
//! leniency.

use crate::collaborators::{
    CertificateParser, ClientAuthProvider, ClientSigner, Kdf, Policy, RandomSource, RecordReader,
    RecordWriter, TranscriptHash,
};
use crate::error::TlsError;
use crate::key::{DhKeyExchange, PeerKey, RsaEncryptor, ServerKexParser};
use crate::keys::FinishedLabel;
use crate::message::{
    encode_certificate_verify, encode_client_key_exchange, parse_server_hello_done,
    CertificateMsg, CertificateRequestMsg, ClientHello, FinishedMsg, HandshakeType, ServerHello,
    ServerKeyExchangeMsg,
};
use crate::state::{PostHello, State};
use crate::suite::{self, CipherSuite, KexType, SigType};
use crate::version::ProtocolVersion;

pub struct ClientHandshake {
    policy: Box<dyn Policy>,
    certs: Box<dyn CertificateParser>,
    kex_parser: Box<dyn ServerKexParser>,
    kdf: Box<dyn Kdf>,
    writer: Box<dyn RecordWriter>,
    reader: Box<dyn RecordReader>,
    rng: Box<dyn RandomSource>,
    client_auth: Box<dyn ClientAuthProvider>,
    transcript: Box<dyn TranscriptHash>,
    state: State,
}

impl ClientHandshake {
    pub fn new(
        policy: Box<dyn Policy>,
        certs: Box<dyn CertificateParser>,
        kex_parser: Box<dyn ServerKexParser>,
        kdf: Box<dyn Kdf>,
        writer: Box<dyn RecordWriter>,
        reader: Box<dyn RecordReader>,
        rng: Box<dyn RandomSource>,
        client_auth: Box<dyn ClientAuthProvider>,
        transcript: Box<dyn TranscriptHash>,
        offered_suites: Vec<u16>,
    ) -> Result<Self, TlsError> {
        let mut machine = ClientHandshake {
            policy,
            certs,
            kex_parser,
            kdf,
            writer,
            reader,
            rng,
            client_auth,
            transcript,
            state: State::Failed,
        };
        machine.start(offered_suites)?;
        Ok(machine)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active)
    }

    fn transcript_update(&mut self, msg_type: u8, body: &[u8]) {
        let mut framed = Vec::with_capacity(4 + body.len());
        framed.push(msg_type);
        framed.push((body.len() >> 16) as u8);
        framed.push((body.len() >> 8) as u8);
        framed.push(body.len() as u8);
        framed.extend_from_slice(body);
        self.transcript.update(&framed);
    }

    fn start(&mut self, offered_suites: Vec<u16>) -> Result<(), TlsError> {
        let mut client_random = [0u8; 32];
        client_random.copy_from_slice(&self.rng.random_bytes(32));
        let offered_version = self.policy.pref_version();

        let hello = ClientHello {
            version: offered_version,
            random: client_random,
            cipher_suites: offered_suites.clone(),
        };
        let body = hello.encode();

        self.writer.set_version(offered_version);
        self.transcript_update(HandshakeType::ClientHello as u8, &body);
        self.writer.send_handshake(HandshakeType::ClientHello as u8, &body)?;
        self.writer.flush()?;

        log::debug!(
            "sent ClientHello offering {} suites at {:?}",
            offered_suites.len(),
            offered_version
        );

        self.state = State::AwaitingServerHello { client_random, offered_suites, offered_version };
        Ok(())
    }

    /// Dispatches one inbound handshake message. ChangeCipherSpec is
    /// not a handshake message (it is its own TLS record content type,
    /// carrying no handshake-style type/length header) and arrives via
    /// [`process_change_cipher_spec`](Self::process_change_cipher_spec)
    /// instead.
    pub fn process_handshake_msg(&mut self, msg_type: u8, body: &[u8]) -> Result<(), TlsError> {
        self.rng.add_entropy(body);

        let handshake_type = HandshakeType::from_u8(msg_type).ok_or_else(|| {
            TlsError::UnexpectedMessage(format!("unrecognized handshake message type {}", msg_type))
        })?;

        use HandshakeType::*;
        match handshake_type {
            HelloRequest => self.handle_hello_request(),
            ServerHello => self.handle_server_hello(body),
            Certificate => self.handle_certificate(body),
            ServerKeyExchange => self.handle_server_key_exchange(body),
            CertificateRequest => self.handle_certificate_request(body),
            ServerHelloDone => self.handle_server_hello_done(body),
            Finished => self.handle_finished(body),
            CertificateVerify | ClientKeyExchange => Err(TlsError::UnexpectedMessage(format!(
                "{:?} is sent by the client, never received from the server",
                handshake_type
            ))),
        }
    }

    pub fn process_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::AwaitingServerCcs { master_secret, suite, session_keys, expected_verify_data } => {
                self.reader.install_read_keys(&suite, &session_keys);
                log::debug!("ChangeCipherSpec received, read keys installed");
                self.state = State::AwaitingServerFinished { master_secret, expected_verify_data };
                Ok(())
            }
            _ => Err(TlsError::UnexpectedMessage(
                "ChangeCipherSpec is not valid in the current phase".to_string(),
            )),
        }
    }

    fn handle_hello_request(&mut self) -> Result<(), TlsError> {
        Err(TlsError::UnexpectedMessage(
            "HelloRequest received; this driver does not support renegotiation".to_string(),
        ))
    }

    fn handle_server_hello(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let (client_random, offered_suites, offered_version) =
            match std::mem::replace(&mut self.state, State::Failed) {
                State::AwaitingServerHello { client_random, offered_suites, offered_version } => {
                    (client_random, offered_suites, offered_version)
                }
                _ => {
                    return Err(TlsError::UnexpectedMessage(
                        "ServerHello is not valid in the current phase".to_string(),
                    ))
                }
            };

        self.transcript_update(HandshakeType::ServerHello as u8, body);
        let hello = ServerHello::parse(body)?;

        if !offered_suites.contains(&hello.cipher_suite) {
            return Err(TlsError::HandshakeFailure(
                "server selected a ciphersuite the client did not offer".to_string(),
            ));
        }
        let suite = suite::lookup(hello.cipher_suite).ok_or_else(|| {
            TlsError::HandshakeFailure("server selected an unrecognized ciphersuite".to_string())
        })?;
        if hello.version > offered_version {
            return Err(TlsError::HandshakeFailure(
                "server negotiated a version higher than the client offered".to_string(),
            ));
        }
        if hello.version < self.policy.min_version() {
            return Err(TlsError::ProtocolVersion);
        }

        self.writer.set_version(hello.version);
        self.reader.set_version(hello.version);

        log::debug!("ServerHello accepted: suite {:#06x}, version {:?}", suite.id, hello.version);
        log::trace!(
            "client_random={} server_random={}",
            hex::encode(client_random),
            hex::encode(hello.random)
        );

        self.state = State::AfterServerHello {
            client_random,
            server_random: hello.random,
            suite,
            version: hello.version,
            offered_version,
            post_hello: PostHello::Hello,
        };
        Ok(())
    }

    fn handle_certificate(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let (client_random, server_random, suite, version, offered_version, post_hello) =
            self.take_after_server_hello("Certificate")?;

        if !post_hello.accepts_certificate() {
            return Err(TlsError::UnexpectedMessage("Certificate arrived out of order".to_string()));
        }
        if suite.sig_type == SigType::Anon {
            return Err(TlsError::HandshakeFailure(
                "an anonymous suite must not send a Certificate".to_string(),
            ));
        }

        self.transcript_update(HandshakeType::Certificate as u8, body);

        let msg = CertificateMsg::parse(body)?;
        if msg.chain.is_empty() {
            return Err(TlsError::HandshakeFailure("empty certificate chain".to_string()));
        }
        if !self.policy.check_cert(&msg.chain) {
            return Err(TlsError::BadCertificate);
        }
        let cert_key = self.certs.parse_leaf_key(&msg.chain)?;
        let consistent = match suite.sig_type {
            SigType::Rsa => cert_key.is_rsa(),
            SigType::Dsa => cert_key.is_dsa(),
            SigType::Anon => unreachable!("anonymous suites are rejected above"),
        };
        if !consistent {
            return Err(TlsError::IllegalParameter(
                "certificate key type does not match the negotiated suite".to_string(),
            ));
        }

        log::debug!("Certificate accepted ({} entries)", msg.chain.len());

        self.state = State::AfterServerHello {
            client_random,
            server_random,
            suite,
            version,
            offered_version,
            post_hello: PostHello::Cert { chain: msg.chain, cert_key },
        };
        Ok(())
    }

    fn handle_server_key_exchange(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let (client_random, server_random, suite, version, offered_version, post_hello) =
            self.take_after_server_hello("ServerKeyExchange")?;

        if !post_hello.accepts_server_kex() {
            return Err(TlsError::UnexpectedMessage(
                "ServerKeyExchange arrived out of order".to_string(),
            ));
        }
        if suite.kex_type == KexType::NoKex {
            return Err(TlsError::HandshakeFailure(
                "negotiated suite does not use ServerKeyExchange".to_string(),
            ));
        }

        self.transcript_update(HandshakeType::ServerKeyExchange as u8, body);

        let (chain, cert_key) = match post_hello {
            PostHello::Hello => (Vec::new(), None),
            PostHello::Cert { chain, cert_key } => (chain, Some(cert_key)),
            PostHello::Kex { .. } | PostHello::CertReq { .. } => {
                unreachable!("accepts_server_kex only allows Hello or Cert")
            }
        };

        let anonymous = suite.sig_type == SigType::Anon;
        let msg = ServerKeyExchangeMsg::parse(body, anonymous, self.kex_parser.as_ref())?;

        if !anonymous {
            let signer = cert_key.as_ref().ok_or_else(|| {
                TlsError::HandshakeFailure(
                    "non-anonymous suite sent ServerKeyExchange without a prior Certificate"
                        .to_string(),
                )
            })?;
            let signature = msg.signature.as_deref().ok_or_else(|| {
                TlsError::HandshakeFailure("ServerKeyExchange is missing its signature".to_string())
            })?;
            let mut signed = Vec::with_capacity(64 + msg.params.len());
            signed.extend_from_slice(&client_random);
            signed.extend_from_slice(&server_random);
            signed.extend_from_slice(&msg.params);
            if !signer.verify(&signed, signature) {
                return Err(TlsError::DecryptError(
                    "ServerKeyExchange signature did not verify".to_string(),
                ));
            }
        }

        log::debug!("ServerKeyExchange accepted ({} param bytes)", msg.params.len());

        self.state = State::AfterServerHello {
            client_random,
            server_random,
            suite,
            version,
            offered_version,
            post_hello: PostHello::Kex { chain, cert_key, kex_key: msg.key },
        };
        Ok(())
    }

    fn handle_certificate_request(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let (client_random, server_random, suite, version, offered_version, post_hello) =
            self.take_after_server_hello("CertificateRequest")?;

        if !post_hello.accepts_certificate_request() {
            return Err(TlsError::UnexpectedMessage(
                "CertificateRequest arrived out of order".to_string(),
            ));
        }

        self.transcript_update(HandshakeType::CertificateRequest as u8, body);
        let msg = CertificateRequestMsg::parse(body)?;

        let (chain, cert_key, kex_key) = match post_hello {
            PostHello::Cert { chain, cert_key } => (chain, Some(cert_key), None),
            PostHello::Kex { chain, cert_key, kex_key } => (chain, cert_key, Some(kex_key)),
            PostHello::Hello | PostHello::CertReq { .. } => {
                unreachable!("accepts_certificate_request only allows Cert or Kex")
            }
        };

        log::debug!(
            "CertificateRequest accepted ({} acceptable types)",
            msg.certificate_types.len()
        );

        self.state = State::AfterServerHello {
            client_random,
            server_random,
            suite,
            version,
            offered_version,
            post_hello: PostHello::CertReq {
                chain,
                cert_key,
                kex_key,
                certificate_types: msg.certificate_types,
            },
        };
        Ok(())
    }

    fn handle_server_hello_done(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let (client_random, server_random, suite, version, offered_version, post_hello) =
            self.take_after_server_hello("ServerHelloDone")?;

        parse_server_hello_done(body)?;
        self.transcript_update(HandshakeType::ServerHelloDone as u8, body);

        let do_client_auth = post_hello.do_client_auth();
        let certificate_types = post_hello.certificate_types().to_vec();
        let (cert_key, kex_key) = post_hello.into_keys();

        // The signer, if any, is invoked only after ClientKeyExchange has
        // been hashed into the transcript below: RFC 5246 §7.4.8 defines
        // CertificateVerify's signed `handshake_messages` as everything
        // up to but not including CertificateVerify itself, which
        // includes the immediately preceding ClientKeyExchange.
        let mut pending_signer: Option<Box<dyn ClientSigner>> = None;
        if do_client_auth {
            match self.client_auth.select(&certificate_types) {
                Some((chain, signer)) => {
                    let msg = CertificateMsg { chain };
                    let encoded = msg.encode();
                    self.transcript_update(HandshakeType::Certificate as u8, &encoded);
                    self.writer.send_handshake(HandshakeType::Certificate as u8, &encoded)?;
                    pending_signer = Some(signer);
                }
                None => {
                    let encoded = CertificateMsg::default().encode();
                    self.transcript_update(HandshakeType::Certificate as u8, &encoded);
                    self.writer.send_handshake(HandshakeType::Certificate as u8, &encoded)?;
                }
            }
        }

        let pre_master_secret = match suite.kex_type {
            KexType::NoKex => {
                let cert_key = cert_key.ok_or_else(|| {
                    TlsError::HandshakeFailure("RSA suite requires a server Certificate".to_string())
                })?;
                let rsa_key = match cert_key {
                    PeerKey::Rsa(k) => k,
                    _ => {
                        return Err(TlsError::IllegalParameter(
                            "RSA suite's certificate key is not RSA".to_string(),
                        ))
                    }
                };
                let mut pre_master = self.rng.random_bytes(48);
                let (major, minor) = offered_version.to_wire();
                pre_master[0] = major;
                pre_master[1] = minor;
                let encrypted = rsa_key.encrypt_pkcs1(&mut *self.rng, &pre_master);
                let cke_body = encode_client_key_exchange(&encrypted);
                self.transcript_update(HandshakeType::ClientKeyExchange as u8, &cke_body);
                self.writer.send_handshake(HandshakeType::ClientKeyExchange as u8, &cke_body)?;
                pre_master
            }
            KexType::Dh => {
                let kex_key = kex_key.ok_or_else(|| {
                    TlsError::HandshakeFailure("DH suite requires a ServerKeyExchange".to_string())
                })?;
                let dh_key = match kex_key {
                    PeerKey::Dh(k) => k,
                    _ => {
                        return Err(TlsError::IllegalParameter(
                            "DH suite's key-exchange key is not DH".to_string(),
                        ))
                    }
                };
                let (pre_master, client_pub) = dh_key.derive_pre_master(&mut *self.rng);
                let cke_body = encode_client_key_exchange(&client_pub);
                self.transcript_update(HandshakeType::ClientKeyExchange as u8, &cke_body);
                self.writer.send_handshake(HandshakeType::ClientKeyExchange as u8, &cke_body)?;
                pre_master
            }
            KexType::Rsa => {
                return Err(TlsError::HandshakeFailure(
                    "export-grade RSA key exchange is not supported".to_string(),
                ));
            }
        };

        if let Some(signer) = pending_signer {
            let transcript_hash = self.transcript.finish();
            let signature = signer.sign(&transcript_hash);
            let verify_body = encode_certificate_verify(&signature);
            self.transcript_update(HandshakeType::CertificateVerify as u8, &verify_body);
            self.writer.send_handshake(HandshakeType::CertificateVerify as u8, &verify_body)?;
        }

        let master_secret = self.kdf.derive_master_secret(
            &suite,
            version,
            &pre_master_secret,
            client_random,
            server_random,
        );
        let session_keys =
            self.kdf.derive_key_block(&suite, version, &master_secret, client_random, server_random);

        // Finished messages are excluded from the transcript hash, so
        // this same snapshot serves both sides' verify-data.
        let transcript_hash = self.transcript.finish();
        let client_verify_data = self.kdf.finished_verify_data(
            &master_secret,
            version,
            FinishedLabel::Client,
            &transcript_hash,
        );
        let expected_server_verify_data = self.kdf.finished_verify_data(
            &master_secret,
            version,
            FinishedLabel::Server,
            &transcript_hash,
        );

        self.writer.send_change_cipher_spec()?;
        self.writer.install_write_keys(&suite, &session_keys);
        self.writer.send_handshake(HandshakeType::Finished as u8, &client_verify_data)?;
        self.writer.flush()?;

        log::debug!("client flight sent, awaiting server ChangeCipherSpec");

        self.state = State::AwaitingServerCcs {
            master_secret,
            suite,
            session_keys,
            expected_verify_data: expected_server_verify_data,
        };
        Ok(())
    }

    fn handle_finished(&mut self, body: &[u8]) -> Result<(), TlsError> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::AwaitingServerFinished { expected_verify_data, .. } => {
                let msg = FinishedMsg::parse(body);
                if msg.verify_data != expected_verify_data {
                    return Err(TlsError::DecryptError(
                        "server Finished MAC did not verify".to_string(),
                    ));
                }
                log::debug!("server Finished verified, channel active");
                self.state = State::Active;
                Ok(())
            }
            _ => Err(TlsError::UnexpectedMessage(
                "Finished is not valid in the current phase".to_string(),
            )),
        }
    }

    /// Takes ownership of an `AfterServerHello` state, leaving
    /// `State::Failed` (a poison value distinct from the real `Active`
    /// success state) in its place. On the success path every caller
    /// overwrites `self.state` before returning; on an error path the
    /// poison value itself enforces "the channel must not continue
    /// after rejection", so there is nothing to restore, and
    /// `is_active()` correctly reports `false`.
    #[allow(clippy::type_complexity)]
    fn take_after_server_hello(
        &mut self,
        ctx: &str,
    ) -> Result<
        ([u8; 32], [u8; 32], CipherSuite, ProtocolVersion, ProtocolVersion, PostHello),
        TlsError,
    > {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::AfterServerHello { client_random, server_random, suite, version, offered_version, post_hello } => {
                Ok((client_random, server_random, suite, version, offered_version, post_hello))
            }
            _ => Err(TlsError::UnexpectedMessage(format!(
                "{} is not valid in the current phase",
                ctx
            ))),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl ClientHandshake {
    /// The verify-data this driver expects in the server's Finished
    /// message, once it has been computed (i.e. after ServerHelloDone).
    /// Lets a test feed back a genuinely matching Finished without
    /// re-deriving the KDF itself.
    pub fn expected_server_finished(&self) -> Option<&[u8]> {
        match &self.state {
            State::AwaitingServerFinished { expected_verify_data, .. } => Some(expected_verify_data),
            _ => None,
        }
    }
}
