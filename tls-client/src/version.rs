/// A TLS protocol version, encoded as the wire pair it always is
/// (`3, 1` for TLS 1.0, `3, 2` for TLS 1.1, ...). Ordered the way the
/// wire encoding already orders it, so policy checks can use `<`/`>`
/// directly as the original does.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const TLS1_0: ProtocolVersion = ProtocolVersion { major: 3, minor: 1 };
    pub const TLS1_1: ProtocolVersion = ProtocolVersion { major: 3, minor: 2 };

    pub fn from_wire(major: u8, minor: u8) -> Self {
        ProtocolVersion { major, minor }
    }

    pub fn to_wire(self) -> (u8, u8) {
        (self.major, self.minor)
    }
}
