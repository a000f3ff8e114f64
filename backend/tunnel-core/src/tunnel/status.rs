use std::fmt::{Display, Formatter, Result as FormatResult};

/// Connection status of the tunnel process.
///
/// Raw values follow the platform VPN status numbering; anything outside the
/// known range is kept as [`TunnelStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelStatus {
    Invalid,
    Disconnected,
    Connecting,
    Connected,
    Reasserting,
    Disconnecting,
    Unknown(i32),
}

impl TunnelStatus {
    pub fn raw_value(self) -> i32 {
        match self {
            TunnelStatus::Invalid => 0,
            TunnelStatus::Disconnected => 1,
            TunnelStatus::Connecting => 2,
            TunnelStatus::Connected => 3,
            TunnelStatus::Reasserting => 4,
            TunnelStatus::Disconnecting => 5,
            TunnelStatus::Unknown(raw) => raw,
        }
    }

    /// Whether the tunnel is down or about to go down.
    pub fn is_down(self) -> bool {
        matches!(
            self,
            TunnelStatus::Invalid | TunnelStatus::Disconnected | TunnelStatus::Disconnecting
        )
    }
}

impl From<i32> for TunnelStatus {
    fn from(raw: i32) -> Self {
        match raw {
            0 => TunnelStatus::Invalid,
            1 => TunnelStatus::Disconnected,
            2 => TunnelStatus::Connecting,
            3 => TunnelStatus::Connected,
            4 => TunnelStatus::Reasserting,
            5 => TunnelStatus::Disconnecting,
            other => TunnelStatus::Unknown(other),
        }
    }
}

impl Display for TunnelStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            TunnelStatus::Invalid => write!(formatter, "invalid"),
            TunnelStatus::Disconnected => write!(formatter, "disconnected"),
            TunnelStatus::Connecting => write!(formatter, "connecting"),
            TunnelStatus::Connected => write!(formatter, "connected"),
            TunnelStatus::Reasserting => write!(formatter, "reasserting"),
            TunnelStatus::Disconnecting => write!(formatter, "disconnecting"),
            TunnelStatus::Unknown(raw) => write!(formatter, "unknown({raw})"),
        }
    }
}
