//! Rebuilds a usable private key from the raw RSA components the control
//! plane hands back (`e`, `n`, `d`, `p`, `q`), mirroring the original's
//! `Tunnel.rsa_to_pkey`. `ssh2` authenticates from a PEM blob in memory, so
//! this exports PKCS#1 rather than handing libssh2 the raw integers.

use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};

use crate::control::RsaComponents;
use crate::error::SshDialError;

/// PEM-encoded PKCS#1 private key, ready for `Session::userauth_pubkey_memory`.
pub fn rebuild_private_key_pem(key: &RsaComponents) -> anyhow::Result<String> {
    let parse = |field: &str, label: &'static str| -> anyhow::Result<BigUint> {
        field
            .parse::<BigUint>()
            .map_err(|e| SshDialError(format!("malformed rsa component {label}: {e}")).into())
    };

    let e = parse(&key.e, "e")?;
    let n = parse(&key.n, "n")?;
    let d = parse(&key.d, "d")?;
    let p = parse(&key.p, "p")?;
    let q = parse(&key.q, "q")?;

    let private_key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|err| SshDialError(format!("invalid rsa key components: {err}")))?;

    private_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|err| SshDialError(format!("pem encoding failed: {err}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_numeric_component() {
        let key = RsaComponents {
            e: "not-a-number".to_string(),
            n: "1".to_string(),
            d: "1".to_string(),
            p: "1".to_string(),
            q: "1".to_string(),
        };
        assert!(rebuild_private_key_pem(&key).is_err());
    }
}
