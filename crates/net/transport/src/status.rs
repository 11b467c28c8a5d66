/// Connectivity status reported by the transport provider.
///
/// Names follow the provider's reachability codes. Codes this node does not
/// know are kept verbatim in [`TransportStatus::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TransportStatus {
    // Still testing reachability.
    Unknown,
    Ipv4DisabledIpv6Unknown,
    Ipv4FirewalledIpv6Unknown,
    Ipv4SnatIpv6Unknown,
    Ipv4UnknownIpv6Firewalled,

    // Reachable.
    Ok,
    Ipv4DisabledIpv6Ok,
    Ipv4FirewalledIpv6Ok,
    Ipv4SnatIpv6Ok,
    Ipv4UnknownIpv6Ok,
    Ipv4OkIpv6Firewalled,
    Ipv4OkIpv6Unknown,
    Ipv4DisabledIpv6Firewalled,

    /// Symmetric NAT.
    Different,
    /// Port conflict.
    Hosed,
    Disconnected,
    RejectUnsolicited,

    #[strum(default)]
    Unrecognized(String),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!(TransportStatus::from_str("OK").unwrap(), TransportStatus::Ok);
        assert_eq!(
            TransportStatus::from_str("IPV4_SNAT_IPV6_UNKNOWN").unwrap(),
            TransportStatus::Ipv4SnatIpv6Unknown
        );
        assert_eq!(
            TransportStatus::from_str("reject_unsolicited").unwrap(),
            TransportStatus::RejectUnsolicited
        );
        assert_eq!(
            TransportStatus::from_str("SOMETHING_NEW").unwrap(),
            TransportStatus::Unrecognized("SOMETHING_NEW".to_owned())
        );
    }

    #[test]
    fn test_display_code() {
        assert_eq!(TransportStatus::Ipv4OkIpv6Firewalled.to_string(), "IPV4_OK_IPV6_FIREWALLED");
        assert_eq!(
            TransportStatus::Unrecognized("FOO".to_owned()).to_string(),
            "FOO"
        );
    }
}
