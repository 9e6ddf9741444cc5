//! Wire encoding/decoding for the handshake message bodies this driver
//! understands. Record framing (length-prefixing the whole record) and
//! record-layer encryption are the record layer's job, not ours; these
//! functions only see/produce the handshake body (`contents` in
//! spec terms — the record layer has already stripped the outer length).
//!
//! The structure *inside* a certificate or a DH/RSA key is someone
//! else's problem (X.509 parsing and RSA/DSA/DH key math are external
//! collaborators); this module only frames the handshake-level
//! container formats that RFC 5246 §7.4 actually defines.

use byteorder::{BigEndian, ByteOrder};

use crate::error::TlsError;
use crate::key::{PeerKey, ServerKexParser};
use crate::version::ProtocolVersion;

/// Handshake message type tags, RFC 5246 §7.4.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use HandshakeType::*;
        Some(match v {
            0 => HelloRequest,
            1 => ClientHello,
            2 => ServerHello,
            11 => Certificate,
            12 => ServerKeyExchange,
            13 => CertificateRequest,
            14 => ServerHelloDone,
            15 => CertificateVerify,
            16 => ClientKeyExchange,
            20 => Finished,
            _ => return None,
        })
    }
}

fn handshake_failure(msg: &str) -> TlsError {
    TlsError::HandshakeFailure(msg.to_string())
}

fn read_u24(b: &[u8]) -> usize {
    (b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize
}

fn write_u24(out: &mut Vec<u8>, len: usize) {
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
}

/// `ClientHello`, the only message this driver ever *builds from
/// scratch* rather than just framing. Extensions are out of scope
/// (TLS 1.2+ extensions are a Non-goal); session resumption is a
/// Non-goal too, so `session_id` is always empty.
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub version: ProtocolVersion,
    pub random: [u8; 32],
    pub cipher_suites: Vec<u16>,
}

impl ClientHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.version.major);
        out.push(self.version.minor);
        out.extend_from_slice(&self.random);
        out.push(0); // session_id length: resumption is a non-goal
        let suites_len = self.cipher_suites.len() * 2;
        out.extend_from_slice(&(suites_len as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            out.extend_from_slice(&suite.to_be_bytes());
        }
        out.push(1); // compression_methods length
        out.push(0); // null compression
        out
    }

    pub fn offered(&self, suite_id: u16) -> bool {
        self.cipher_suites.contains(&suite_id)
    }
}

#[derive(Debug, Clone)]
pub struct ServerHello {
    pub version: ProtocolVersion,
    pub random: [u8; 32],
    pub cipher_suite: u16,
}

impl ServerHello {
    pub fn parse(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() < 2 + 32 + 1 {
            return Err(handshake_failure("ServerHello too short"));
        }
        let version = ProtocolVersion::from_wire(body[0], body[1]);
        let mut random = [0u8; 32];
        random.copy_from_slice(&body[2..34]);

        let session_id_len = body[34] as usize;
        let after_session_id = 35 + session_id_len;
        if body.len() < after_session_id + 3 {
            return Err(handshake_failure("ServerHello truncated session id"));
        }
        let cipher_suite = BigEndian::read_u16(&body[after_session_id..after_session_id + 2]);
        // compression_method byte follows; extensions (if any) are ignored.
        Ok(ServerHello { version, random, cipher_suite })
    }
}

/// Server (or client) certificate chain, leaf first.
#[derive(Debug, Clone, Default)]
pub struct CertificateMsg {
    pub chain: Vec<Vec<u8>>,
}

impl CertificateMsg {
    pub fn parse(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() < 3 {
            return Err(handshake_failure("Certificate message too short"));
        }
        let total_len = read_u24(&body[0..3]);
        if body.len() != 3 + total_len {
            return Err(handshake_failure("Certificate message length mismatch"));
        }
        let mut chain = Vec::new();
        let mut pos = 3;
        while pos < body.len() {
            if body.len() < pos + 3 {
                return Err(handshake_failure("truncated certificate entry"));
            }
            let cert_len = read_u24(&body[pos..pos + 3]);
            pos += 3;
            if body.len() < pos + cert_len {
                return Err(handshake_failure("truncated certificate body"));
            }
            chain.push(body[pos..pos + cert_len].to_vec());
            pos += cert_len;
        }
        Ok(CertificateMsg { chain })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut certs = Vec::new();
        for cert in &self.chain {
            write_u24(&mut certs, cert.len());
            certs.extend_from_slice(cert);
        }
        let mut out = Vec::new();
        write_u24(&mut out, certs.len());
        out.extend_from_slice(&certs);
        out
    }
}

/// ServerKeyExchange, restricted to the DH case (the only kex type this
/// driver ever receives a ServerKeyExchange for; static-RSA suites never
/// send one). `params` are the raw bytes the signature (if any) covers;
/// their internal DH structure is parsed by a [`ServerKexParser`]
/// collaborator, not here.
#[derive(Debug, Clone)]
pub struct ServerKeyExchangeMsg {
    pub key: PeerKey,
    pub params: Vec<u8>,
    pub signature: Option<Vec<u8>>,
}

impl ServerKeyExchangeMsg {
    pub fn parse(
        body: &[u8],
        anonymous: bool,
        kex_parser: &dyn ServerKexParser,
    ) -> Result<Self, TlsError> {
        let (dh_key, consumed) = kex_parser.parse_dh_params(body)?;
        let params = body[..consumed].to_vec();

        let signature = if anonymous {
            if body.len() != consumed {
                return Err(handshake_failure(
                    "anonymous ServerKeyExchange carries trailing bytes",
                ));
            }
            None
        } else {
            let rest = &body[consumed..];
            if rest.len() < 2 {
                return Err(handshake_failure("ServerKeyExchange missing signature"));
            }
            let sig_len = BigEndian::read_u16(&rest[0..2]) as usize;
            if rest.len() != 2 + sig_len {
                return Err(handshake_failure("ServerKeyExchange signature length mismatch"));
            }
            Some(rest[2..].to_vec())
        };

        Ok(ServerKeyExchangeMsg { key: PeerKey::Dh(dh_key), params, signature })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateRequestMsg {
    pub certificate_types: Vec<u8>,
}

impl CertificateRequestMsg {
    pub fn parse(body: &[u8]) -> Result<Self, TlsError> {
        if body.is_empty() {
            return Err(handshake_failure("CertificateRequest too short"));
        }
        let count = body[0] as usize;
        if body.len() < 1 + count + 2 {
            return Err(handshake_failure("CertificateRequest truncated"));
        }
        let certificate_types = body[1..1 + count].to_vec();
        // The certificate_authorities list follows; which DN a caller's
        // certificate must chain to is a policy decision delegated to
        // ClientAuthProvider, so we don't parse it further here.
        Ok(CertificateRequestMsg { certificate_types })
    }
}

pub fn parse_server_hello_done(body: &[u8]) -> Result<(), TlsError> {
    if !body.is_empty() {
        return Err(handshake_failure("ServerHelloDone carries unexpected bytes"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FinishedMsg {
    pub verify_data: Vec<u8>,
}

impl FinishedMsg {
    pub fn parse(body: &[u8]) -> Self {
        FinishedMsg { verify_data: body.to_vec() }
    }
}

pub fn encode_client_key_exchange(encrypted_or_public: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + encrypted_or_public.len());
    out.extend_from_slice(&(encrypted_or_public.len() as u16).to_be_bytes());
    out.extend_from_slice(encrypted_or_public);
    out
}

pub fn encode_certificate_verify(signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + signature.len());
    out.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    out.extend_from_slice(signature);
    out
}
