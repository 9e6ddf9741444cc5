//! End-to-end handshake scenarios, each driving a `ClientHandshake`
//! through a full message sequence with in-memory collaborators. These
//! exercise the state machine's ordering and cryptographic-binding
//! rules, not any real X.509/RSA/DH/PRF math — the mocks in
//! `tls_client::collaborators::mock` stand in for all of that.

use tls_client::collaborators::mock::{
    encode_dh_server_kex, mock_mac, DummyCertificateParser, DummyKexParser, FixedClientAuth,
    FixedRandom, NullRecordReader, PermissivePolicy, ToyKdf, VecRecordWriter,
};
use tls_client::message::{CertificateMsg, HandshakeType};
use tls_client::{suite, ClientHandshake, NoClientAuth, Policy, ProtocolVersion, Sha256Transcript, TlsError};

fn encode_server_hello(version: (u8, u8), random: [u8; 32], suite_id: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(version.0);
    out.push(version.1);
    out.extend_from_slice(&random);
    out.push(0); // session_id length: no resumption
    out.extend_from_slice(&suite_id.to_be_bytes());
    out.push(0); // compression method: null
    out
}

fn build_handshake(offered_suites: Vec<u16>) -> (ClientHandshake, VecRecordWriter, NullRecordReader) {
    build_handshake_with_auth(offered_suites, Box::new(NoClientAuth))
}

fn build_handshake_with_auth(
    offered_suites: Vec<u16>,
    client_auth: Box<dyn tls_client::ClientAuthProvider>,
) -> (ClientHandshake, VecRecordWriter, NullRecordReader) {
    let writer = VecRecordWriter::new();
    let writer_handle = writer.clone();
    let reader = NullRecordReader::new();
    let reader_handle = reader.clone();

    let hs = ClientHandshake::new(
        Box::new(PermissivePolicy::default()),
        Box::new(DummyCertificateParser),
        Box::new(DummyKexParser),
        Box::new(ToyKdf),
        Box::new(writer),
        Box::new(reader),
        Box::new(FixedRandom::new(vec![0u8; 256])),
        client_auth,
        Box::new(Sha256Transcript::new()),
        offered_suites,
    )
    .expect("constructing a handshake only sends a ClientHello and cannot fail here");

    (hs, writer_handle, reader_handle)
}

/// Builds a CertificateRequest body: a one-byte count of acceptable
/// certificate types, the types themselves, then an empty (2-byte
/// zero-length) certificate_authorities list.
fn encode_certificate_request(types: &[u8]) -> Vec<u8> {
    let mut out = vec![types.len() as u8];
    out.extend_from_slice(types);
    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

/// Scenario 1 (spec §8): full handshake, RSA suite, Certificate only.
#[test]
fn full_handshake_rsa_suite_activates_channel() {
    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, writer, reader) = build_handshake(vec![suite_id]);

    let server_hello = encode_server_hello((3, 2), [7u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();

    let cert_body = CertificateMsg { chain: vec![vec![9, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();

    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();

    let records = writer.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].0, Some(HandshakeType::ClientHello as u8));
    assert_eq!(records[1].0, Some(HandshakeType::ClientKeyExchange as u8));
    assert_eq!(records[2].0, None, "ChangeCipherSpec carries no handshake type");
    assert_eq!(records[3].0, Some(HandshakeType::Finished as u8));
    assert!(writer.write_keys_installed());

    hs.process_change_cipher_spec().unwrap();
    assert!(reader.read_keys_installed());

    let good_finished = hs.expected_server_finished().expect("verify-data is ready").to_vec();
    hs.process_handshake_msg(HandshakeType::Finished as u8, &good_finished).unwrap();
    assert!(hs.is_active());
}

/// Scenario 2: DHE_RSA suite — Certificate then a signed ServerKeyExchange.
#[test]
fn dhe_rsa_suite_verifies_signature_and_derives_dh() {
    let suite_id = suite::TLS_DHE_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, writer, reader) = build_handshake(vec![suite_id]);

    let server_random = [11u8; 32];
    let server_hello = encode_server_hello((3, 2), server_random, suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();

    let cert_body = CertificateMsg { chain: vec![vec![5, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();

    let dh_blob = vec![1, 2, 3, 4, 5];
    let mut params = Vec::new();
    params.extend_from_slice(&(dh_blob.len() as u16).to_be_bytes());
    params.extend_from_slice(&dh_blob);
    let mut signed = Vec::new();
    signed.extend_from_slice(&[0u8; 32]); // client random: FixedRandom yields zeros first
    signed.extend_from_slice(&server_random);
    signed.extend_from_slice(&params);
    let signature = mock_mac(5, &signed);
    let kex_body = encode_dh_server_kex(&dh_blob, Some(&signature));
    hs.process_handshake_msg(HandshakeType::ServerKeyExchange as u8, &kex_body).unwrap();

    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();
    assert_eq!(writer.records()[1].0, Some(HandshakeType::ClientKeyExchange as u8));
    assert!(writer.write_keys_installed());

    hs.process_change_cipher_spec().unwrap();
    assert!(reader.read_keys_installed());
    let good_finished = hs.expected_server_finished().unwrap().to_vec();
    hs.process_handshake_msg(HandshakeType::Finished as u8, &good_finished).unwrap();
    assert!(hs.is_active());
}

/// Scenario 3: anonymous DH suite — no Certificate, unsigned ServerKeyExchange.
#[test]
fn anonymous_dh_suite_accepts_unsigned_server_kex() {
    let suite_id = suite::TLS_DH_ANON_WITH_AES_128_CBC_SHA.id;
    let (mut hs, writer, reader) = build_handshake(vec![suite_id]);

    let server_hello = encode_server_hello((3, 2), [3u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();

    let kex_body = encode_dh_server_kex(&[9, 9, 9], None);
    hs.process_handshake_msg(HandshakeType::ServerKeyExchange as u8, &kex_body).unwrap();

    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();
    assert!(writer.write_keys_installed());

    hs.process_change_cipher_spec().unwrap();
    assert!(reader.read_keys_installed());
    let good_finished = hs.expected_server_finished().unwrap().to_vec();
    hs.process_handshake_msg(HandshakeType::Finished as u8, &good_finished).unwrap();
    assert!(hs.is_active());
}

/// Scenario 4: server picks a ciphersuite the client never offered.
#[test]
fn server_hello_with_unoffered_suite_is_rejected() {
    let offered = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, _writer, _reader) = build_handshake(vec![offered]);

    let not_offered = suite::TLS_DHE_RSA_WITH_AES_128_CBC_SHA.id;
    let server_hello = encode_server_hello((3, 2), [1u8; 32], not_offered);
    let err = hs
        .process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello)
        .unwrap_err();
    assert!(matches!(err, TlsError::HandshakeFailure(_)));
    assert_eq!(err.alert(), tls_client::AlertDescription::HandshakeFailure);
    assert!(!hs.is_active());
}

/// Scenario 5: server's negotiated version is below the policy minimum.
#[test]
fn server_hello_below_policy_minimum_is_rejected() {
    struct Tls11OnlyPolicy;

    impl Policy for Tls11OnlyPolicy {
        fn min_version(&self) -> ProtocolVersion {
            ProtocolVersion::TLS1_1
        }
        fn pref_version(&self) -> ProtocolVersion {
            ProtocolVersion::TLS1_1
        }
        fn check_cert(&self, chain: &[Vec<u8>]) -> bool {
            !chain.is_empty()
        }
    }

    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let mut hs = ClientHandshake::new(
        Box::new(Tls11OnlyPolicy),
        Box::new(DummyCertificateParser),
        Box::new(DummyKexParser),
        Box::new(ToyKdf),
        Box::new(VecRecordWriter::new()),
        Box::new(NullRecordReader::new()),
        Box::new(FixedRandom::new(vec![0u8; 256])),
        Box::new(NoClientAuth),
        Box::new(Sha256Transcript::new()),
        vec![suite_id],
    )
    .unwrap();

    let server_hello = encode_server_hello((3, 1), [1u8; 32], suite_id); // TLS 1.0, below the 1.1 floor
    let err = hs
        .process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello)
        .unwrap_err();
    assert!(matches!(err, TlsError::ProtocolVersion));
}

/// Scenario 6: the server's Finished MAC does not verify.
#[test]
fn bad_server_finished_mac_is_rejected() {
    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, writer, reader) = build_handshake(vec![suite_id]);

    let server_hello = encode_server_hello((3, 2), [4u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();
    let cert_body = CertificateMsg { chain: vec![vec![2, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();
    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();
    assert!(writer.write_keys_installed());

    hs.process_change_cipher_spec().unwrap();
    assert!(reader.read_keys_installed());

    let mut bad_finished = hs.expected_server_finished().unwrap().to_vec();
    bad_finished[0] ^= 0xFF;
    let err = hs.process_handshake_msg(HandshakeType::Finished as u8, &bad_finished).unwrap_err();
    assert!(matches!(err, TlsError::DecryptError(_)));
    assert!(!hs.is_active());
}

/// A static-RSA suite never sends ServerKeyExchange; receiving one is a
/// handshake failure, not something silently skipped.
#[test]
fn server_key_exchange_rejected_for_static_rsa_suite() {
    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, _writer, _reader) = build_handshake(vec![suite_id]);

    let server_hello = encode_server_hello((3, 2), [4u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();
    let cert_body = CertificateMsg { chain: vec![vec![2, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();

    let kex_body = encode_dh_server_kex(&[1, 2, 3], Some(&mock_mac(2, b"irrelevant")));
    let err = hs
        .process_handshake_msg(HandshakeType::ServerKeyExchange as u8, &kex_body)
        .unwrap_err();
    assert!(matches!(err, TlsError::HandshakeFailure(_)));
}

/// The RFC 5246 §7.3 ordering decision: once a ServerKeyExchange has
/// been accepted, a Certificate can no longer arrive.
#[test]
fn certificate_after_server_key_exchange_is_rejected() {
    let suite_id = suite::TLS_DHE_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, _writer, _reader) = build_handshake(vec![suite_id]);

    let server_random = [6u8; 32];
    let server_hello = encode_server_hello((3, 2), server_random, suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();

    let cert_body = CertificateMsg { chain: vec![vec![3, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();

    let dh_blob = vec![7, 7];
    let mut params = Vec::new();
    params.extend_from_slice(&(dh_blob.len() as u16).to_be_bytes());
    params.extend_from_slice(&dh_blob);
    let mut signed = Vec::new();
    signed.extend_from_slice(&[0u8; 32]);
    signed.extend_from_slice(&server_random);
    signed.extend_from_slice(&params);
    let signature = mock_mac(3, &signed);
    let kex_body = encode_dh_server_kex(&dh_blob, Some(&signature));
    hs.process_handshake_msg(HandshakeType::ServerKeyExchange as u8, &kex_body).unwrap();

    let second_cert = CertificateMsg { chain: vec![vec![3, 1]] }.encode();
    let err = hs
        .process_handshake_msg(HandshakeType::Certificate as u8, &second_cert)
        .unwrap_err();
    assert!(matches!(err, TlsError::UnexpectedMessage(_)));
}

/// spec.md §4.B: CertificateRequest's precondition is `server_certs
/// present` — it cannot arrive before any Certificate, even on a suite
/// that otherwise allows ServerKeyExchange straight after ServerHello.
#[test]
fn certificate_request_before_any_certificate_is_rejected() {
    let suite_id = suite::TLS_DH_ANON_WITH_AES_128_CBC_SHA.id;
    let (mut hs, _writer, _reader) = build_handshake(vec![suite_id]);

    let server_hello = encode_server_hello((3, 2), [8u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();

    let cert_req_body = encode_certificate_request(&[1]);
    let err = hs
        .process_handshake_msg(HandshakeType::CertificateRequest as u8, &cert_req_body)
        .unwrap_err();
    assert!(matches!(err, TlsError::UnexpectedMessage(_)));
}

/// The client-authentication hook: when the server requests a client
/// certificate and the caller's `ClientAuthProvider` supplies one, the
/// driver must send a non-empty Certificate followed by a
/// CertificateVerify signing the transcript up to that point — never
/// silently dropping the CertificateVerify for a presented chain.
#[test]
fn certificate_request_with_client_cert_sends_certificate_verify() {
    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let client_chain = vec![vec![42, 1]];
    let (mut hs, writer, reader) = build_handshake_with_auth(
        vec![suite_id],
        Box::new(FixedClientAuth { chain: client_chain.clone(), tag: 0x77 }),
    );

    let server_hello = encode_server_hello((3, 2), [9u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();
    let cert_body = CertificateMsg { chain: vec![vec![1, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();
    let cert_req_body = encode_certificate_request(&[1]);
    hs.process_handshake_msg(HandshakeType::CertificateRequest as u8, &cert_req_body).unwrap();

    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();

    let records = writer.records();
    // ClientHello, client Certificate, ClientKeyExchange,
    // CertificateVerify, ChangeCipherSpec, Finished.
    assert_eq!(records.len(), 6);
    assert_eq!(records[1].0, Some(HandshakeType::Certificate as u8));
    let sent_client_cert = CertificateMsg::parse(&records[1].1).unwrap();
    assert_eq!(sent_client_cert.chain, client_chain);
    assert_eq!(records[2].0, Some(HandshakeType::ClientKeyExchange as u8));
    assert_eq!(records[3].0, Some(HandshakeType::CertificateVerify as u8));
    assert_eq!(records[4].0, None, "ChangeCipherSpec carries no handshake type");
    assert_eq!(records[5].0, Some(HandshakeType::Finished as u8));

    hs.process_change_cipher_spec().unwrap();
    assert!(reader.read_keys_installed());
    let good_finished = hs.expected_server_finished().unwrap().to_vec();
    hs.process_handshake_msg(HandshakeType::Finished as u8, &good_finished).unwrap();
    assert!(hs.is_active());
}

/// RFC 5246 §7.4.8: CertificateVerify's signed `handshake_messages` must
/// cover everything up to and including the immediately preceding
/// ClientKeyExchange. Independently recompute the transcript the driver
/// should have signed and check it against the signature actually sent.
#[test]
fn certificate_verify_signs_a_transcript_that_includes_client_key_exchange() {
    use sha2::{Digest, Sha256};

    fn framed(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![msg_type, (body.len() >> 16) as u8, (body.len() >> 8) as u8, body.len() as u8];
        out.extend_from_slice(body);
        out
    }

    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let client_chain = vec![vec![42, 1]];
    let (mut hs, writer, _reader) = build_handshake_with_auth(
        vec![suite_id],
        Box::new(FixedClientAuth { chain: client_chain, tag: 0x77 }),
    );

    let server_hello = encode_server_hello((3, 2), [9u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();
    let cert_body = CertificateMsg { chain: vec![vec![1, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();
    let cert_req_body = encode_certificate_request(&[1]);
    hs.process_handshake_msg(HandshakeType::CertificateRequest as u8, &cert_req_body).unwrap();
    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();

    let records = writer.records();
    let client_hello_body = &records[0].1;
    let client_cert_body = &records[1].1;
    let client_kex_body = &records[2].1;
    let verify_body = &records[3].1;

    let mut expected = Sha256::default();
    expected.input(&framed(HandshakeType::ClientHello as u8, client_hello_body));
    expected.input(&framed(HandshakeType::ServerHello as u8, &server_hello));
    expected.input(&framed(HandshakeType::Certificate as u8, &cert_body));
    expected.input(&framed(HandshakeType::CertificateRequest as u8, &cert_req_body));
    expected.input(&framed(HandshakeType::ServerHelloDone as u8, &[]));
    expected.input(&framed(HandshakeType::Certificate as u8, client_cert_body));
    expected.input(&framed(HandshakeType::ClientKeyExchange as u8, client_kex_body));
    let expected_hash = expected.result().to_vec();

    let signature = &verify_body[2..];
    assert_eq!(signature, mock_mac(0x77, &expected_hash));
}

/// When the caller's `ClientAuthProvider` declines (the `NoClientAuth`
/// default), the driver must still send the RFC-legal empty
/// Certificate and must not send a CertificateVerify at all.
#[test]
fn certificate_request_without_a_client_cert_sends_empty_certificate_only() {
    let suite_id = suite::TLS_RSA_WITH_AES_128_CBC_SHA.id;
    let (mut hs, writer, _reader) = build_handshake(vec![suite_id]);

    let server_hello = encode_server_hello((3, 2), [10u8; 32], suite_id);
    hs.process_handshake_msg(HandshakeType::ServerHello as u8, &server_hello).unwrap();
    let cert_body = CertificateMsg { chain: vec![vec![1, 1]] }.encode();
    hs.process_handshake_msg(HandshakeType::Certificate as u8, &cert_body).unwrap();
    let cert_req_body = encode_certificate_request(&[1]);
    hs.process_handshake_msg(HandshakeType::CertificateRequest as u8, &cert_req_body).unwrap();

    hs.process_handshake_msg(HandshakeType::ServerHelloDone as u8, &[]).unwrap();

    let records = writer.records();
    // ClientHello, empty client Certificate, ClientKeyExchange,
    // ChangeCipherSpec, Finished — no CertificateVerify.
    assert_eq!(records.len(), 5);
    assert_eq!(records[1].0, Some(HandshakeType::Certificate as u8));
    let sent_client_cert = CertificateMsg::parse(&records[1].1).unwrap();
    assert!(sent_client_cert.chain.is_empty());
    assert_eq!(records[2].0, Some(HandshakeType::ClientKeyExchange as u8));
    assert_eq!(records[3].0, None, "ChangeCipherSpec carries no handshake type");
    assert_eq!(records[4].0, Some(HandshakeType::Finished as u8));
}
