//! Built-in bootstrap seeds.

use cloak_net_primitives::{DEFAULT_NETWORK, NetworkTag};

use crate::peer::NetworkPeer;

const SEED_A_ADDRESS: &str = "I7SBNbVvrKB3thzOW6g49Mh6GpGZW~SiCwP~SgavJjy7lOWau2G2e71hgM1t7ymTRPIm9qfjP6g1tuzoP6eN3KRnnfYniISkvgvu5MU27Bvnf2BnIpiDGCfvmgIltUefX3ZVa7GSFtnTJobTlxFa0JEjfMSupuhEOnsApobo~Ux8DfSuoFfD0Fx9IdeBvMi~4nJHK7bGAx~LiNwdYVTGVwIEW0lGlEi8sLpymb0VhCxl8yo79AUWH-gD4LUJwy8ZVvovp0C2-BnWAwuIVPSWNepHB7Z6a0v6TF70lVZoXmJICDKho72uejYVgptZ~ugSdZRrXS6OiraMq1G39eLSSkxKQGgxL4G3-L~Mm5AYYg49G48KN1XJdROOjQSCxp3cRD1tbsjCVvB4xkjbmv-TbHF9OmrDzqwlT6WWigxxPMv~EyHmGJmanz80aOf3cJOHAd7OjK2sDfVPoqFW1NCt4vq4Nbu4wzUQeakwbB~eZS7NkuINqlVc06ke34MXgjYEAAAA";
const SEED_A_FINGERPRINT: &str = "WLlzrHpbI2ABJShBCFJF5f1nh1CI6U2iT6~HS2Al~~U=";
const SEED_KEY_TYPE: &str = "ElGamal/None/NoPadding";

/// Seeds shipped with the node, used when none are configured.
///
/// Only the default overlay has built-in seeds.
pub fn default_seeds(network: &NetworkTag) -> Vec<NetworkPeer> {
    if network.as_str() != DEFAULT_NETWORK {
        return Vec::new();
    }

    vec![
        NetworkPeer::new(network.clone(), SEED_A_ADDRESS, SEED_A_FINGERPRINT)
            .with_key_type(SEED_KEY_TYPE),
    ]
}
