/// Key-exchange algorithm a cipher suite negotiates. `NoKex` names the
/// static-RSA suites: the client encrypts the pre-master secret
/// directly under the leaf certificate's key and no ServerKeyExchange
/// is ever sent for them. `Rsa` is reserved for the historical
/// export-grade suites that *do* send an ephemeral RSA key via
/// ServerKeyExchange; this driver recognizes no such suite, but the
/// variant documents why ServerKeyExchange's precondition is phrased
/// as "kex_type != NoKex" rather than "kex_type == Dh".
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KexType {
    NoKex,
    Rsa,
    Dh,
}

/// Signature algorithm used to authenticate the key exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SigType {
    Anon,
    Rsa,
    Dsa,
}

/// A negotiated cipher suite. The symmetric cipher/MAC the suite also
/// names are irrelevant to the handshake driver itself — they are
/// consumed only once the record layer installs keys — so this carries
/// just the two fields the state machine branches on, plus the raw wire
/// id used to check "did the server pick something we offered".
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CipherSuite {
    pub id: u16,
    pub kex_type: KexType,
    pub sig_type: SigType,
}

impl CipherSuite {
    pub const fn new(id: u16, kex_type: KexType, sig_type: SigType) -> Self {
        CipherSuite { id, kex_type, sig_type }
    }
}

/// The well-known TLS 1.0/1.1-era suites this driver recognizes. A
/// policy/offer list is built from these; recognizing a suite id the
/// table below doesn't contain is itself a handshake failure (an
/// "unknown ciphersuite" is not offered, so it fails the ciphersuite
/// membership check for free).
pub const TLS_RSA_WITH_AES_128_CBC_SHA: CipherSuite =
    CipherSuite::new(0x002F, KexType::NoKex, SigType::Rsa);
pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA: CipherSuite =
    CipherSuite::new(0x0033, KexType::Dh, SigType::Rsa);
pub const TLS_DHE_DSS_WITH_AES_128_CBC_SHA: CipherSuite =
    CipherSuite::new(0x0032, KexType::Dh, SigType::Dsa);
pub const TLS_DH_ANON_WITH_AES_128_CBC_SHA: CipherSuite =
    CipherSuite::new(0x0034, KexType::Dh, SigType::Anon);

pub fn lookup(id: u16) -> Option<CipherSuite> {
    [
        TLS_RSA_WITH_AES_128_CBC_SHA,
        TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
        TLS_DHE_DSS_WITH_AES_128_CBC_SHA,
        TLS_DH_ANON_WITH_AES_128_CBC_SHA,
    ]
    .into_iter()
    .find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_each_known_suite_by_id() {
        assert_eq!(lookup(0x002F), Some(TLS_RSA_WITH_AES_128_CBC_SHA));
        assert_eq!(lookup(0x0033), Some(TLS_DHE_RSA_WITH_AES_128_CBC_SHA));
        assert_eq!(lookup(0x0032), Some(TLS_DHE_DSS_WITH_AES_128_CBC_SHA));
        assert_eq!(lookup(0x0034), Some(TLS_DH_ANON_WITH_AES_128_CBC_SHA));
    }

    #[test]
    fn lookup_rejects_an_unrecognized_id() {
        assert_eq!(lookup(0xFFFF), None);
    }

    #[test]
    fn static_rsa_suite_is_no_kex_not_rsa_kex() {
        // A ServerKeyExchange precondition of "kex_type != NoKex" only
        // rejects one for this suite if it is tagged NoKex, not Rsa.
        assert_eq!(TLS_RSA_WITH_AES_128_CBC_SHA.kex_type, KexType::NoKex);
    }
}
