use std::{error, fmt, io};

/// TLS alert descriptions the driver can surface. Only the subset this
/// driver actually raises is represented; the record layer is expected
/// to encode these onto the wire before tearing the channel down.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlertDescription {
    UnexpectedMessage,
    BadCertificate,
    UnsupportedCertificate,
    DecryptError,
    ProtocolVersion,
    HandshakeFailure,
    IllegalParameter,
}

/// Every error this driver can raise is fatal to the handshake: there is
/// no local recovery, and the channel must refuse further handshake
/// input once one of these has been returned from
/// [`ClientHandshake::process_handshake_msg`](crate::ClientHandshake::process_handshake_msg).
#[derive(Debug)]
pub enum TlsError {
    /// The state machine forbids the incoming message type in the
    /// current phase.
    UnexpectedMessage(String),
    /// The peer violated a protocol invariant (empty certificate chain,
    /// ciphersuite not offered, version higher than offered, unknown key
    /// type in ServerKeyExchange).
    HandshakeFailure(String),
    /// The server's negotiated version is below the policy minimum.
    ProtocolVersion,
    /// `Policy::check_cert` rejected the certificate chain.
    BadCertificate,
    /// The leaf certificate's public key is neither RSA nor DSA.
    UnsupportedCertificate,
    /// The certificate's key type does not match the negotiated
    /// suite's key-exchange/signature type.
    IllegalParameter(String),
    /// A signature (ServerKeyExchange) or MAC (Finished) failed to
    /// verify.
    DecryptError(String),
    /// The record-layer reader or writer returned an I/O failure.
    Io(io::Error),
}

impl TlsError {
    /// The alert code this error maps to, per the state transition
    /// table's error handling design.
    pub fn alert(&self) -> AlertDescription {
        use TlsError::*;
        match self {
            UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            HandshakeFailure(_) => AlertDescription::HandshakeFailure,
            ProtocolVersion => AlertDescription::ProtocolVersion,
            BadCertificate => AlertDescription::BadCertificate,
            UnsupportedCertificate => AlertDescription::UnsupportedCertificate,
            IllegalParameter(_) => AlertDescription::IllegalParameter,
            DecryptError(_) => AlertDescription::DecryptError,
            Io(_) => AlertDescription::HandshakeFailure,
        }
    }
}

impl error::Error for TlsError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            TlsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TlsError::*;
        match self {
            UnexpectedMessage(msg) => write!(f, "unexpected handshake message: {}", msg),
            HandshakeFailure(msg) => write!(f, "handshake failure: {}", msg),
            ProtocolVersion => write!(f, "server negotiated a version below policy minimum"),
            BadCertificate => write!(f, "server certificate rejected by policy"),
            UnsupportedCertificate => write!(f, "unsupported certificate public key type"),
            IllegalParameter(msg) => write!(f, "illegal parameter: {}", msg),
            DecryptError(msg) => write!(f, "decrypt error: {}", msg),
            Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl From<io::Error> for TlsError {
    fn from(e: io::Error) -> Self {
        TlsError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_variant_maps_to_the_alert_spec_7_names() {
        assert_eq!(TlsError::UnexpectedMessage("x".into()).alert(), AlertDescription::UnexpectedMessage);
        assert_eq!(TlsError::HandshakeFailure("x".into()).alert(), AlertDescription::HandshakeFailure);
        assert_eq!(TlsError::ProtocolVersion.alert(), AlertDescription::ProtocolVersion);
        assert_eq!(TlsError::BadCertificate.alert(), AlertDescription::BadCertificate);
        assert_eq!(TlsError::UnsupportedCertificate.alert(), AlertDescription::UnsupportedCertificate);
        assert_eq!(TlsError::IllegalParameter("x".into()).alert(), AlertDescription::IllegalParameter);
        assert_eq!(TlsError::DecryptError("x".into()).alert(), AlertDescription::DecryptError);
    }

    #[test]
    fn io_errors_surface_as_a_source() {
        use std::error::Error;
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "broken");
        let wrapped: TlsError = io_err.into();
        assert!(wrapped.source().is_some());
        assert_eq!(wrapped.alert(), AlertDescription::HandshakeFailure);
    }

    #[test]
    fn display_messages_are_non_empty() {
        assert!(!TlsError::BadCertificate.to_string().is_empty());
        assert!(!TlsError::ProtocolVersion.to_string().is_empty());
    }
}
