use cloak_net_transport::TransportStatus;

/// Network state derived from the transport status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectivityState {
    #[default]
    Unknown,
    Connecting,
    Connected,
    Disconnected,
    /// Reachable only for connections we initiate.
    Blocked,
    PortConflict,
    Error,
}

impl ConnectivityState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// States that warrant a warning when entered.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Blocked | Self::PortConflict | Self::Error
        )
    }
}

/// Map a transport status to a [`ConnectivityState`]. Total and side-effect free.
pub fn classify(status: &TransportStatus) -> ConnectivityState {
    use TransportStatus::*;

    match status {
        Unknown
        | Ipv4DisabledIpv6Unknown
        | Ipv4FirewalledIpv6Unknown
        | Ipv4SnatIpv6Unknown
        | Ipv4UnknownIpv6Firewalled => ConnectivityState::Connecting,

        Ok
        | Ipv4DisabledIpv6Ok
        | Ipv4FirewalledIpv6Ok
        | Ipv4SnatIpv6Ok
        | Ipv4UnknownIpv6Ok
        | Ipv4OkIpv6Firewalled
        | Ipv4OkIpv6Unknown
        | Ipv4DisabledIpv6Firewalled => ConnectivityState::Connected,

        Different => ConnectivityState::Error,
        Hosed => ConnectivityState::PortConflict,
        Disconnected => ConnectivityState::Disconnected,
        RejectUnsolicited => ConnectivityState::Blocked,
        Unrecognized(_) => ConnectivityState::Disconnected,
    }
}
