//! Control-plane client: reserve/unreserve a device tunnel slot against
//! the HTTPS REST API before dialing SSH. Grounded in `appurify/utils.py`
//! (`url()`, `get()`, `post()`) and `appurify/constants.py`'s defaults;
//! the blocking HTTP call is wrapped in `smol::unblock`, the same idiom
//! the teacher uses around `ureq` in `crates/httproxy/src/start/mod.rs`.

use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ReservationError;

const DEFAULT_API_PROTO: &str = "https";
const DEFAULT_API_HOST: &str = "live.appurify.com";
const DEFAULT_API_PORT: u16 = 443;
const DEFAULT_RETRY_ON_FAILURE: bool = true;
const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
const DEFAULT_MAX_RETRY: u32 = 3;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `https://live.appurify.com:443/resource/<resource>/`, overridable via
/// `APPURIFY_API_{PROTO,HOST,PORT}`.
fn resource_url(resource: &str) -> String {
    let proto = std::env::var("APPURIFY_API_PROTO").unwrap_or_else(|_| DEFAULT_API_PROTO.to_string());
    let host = std::env::var("APPURIFY_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
    let port: u16 = env_or("APPURIFY_API_PORT", DEFAULT_API_PORT);
    format!("{proto}://{host}:{port}/resource/{resource}/")
}

/// Mirrors the shape of `appurify/utils.py`'s `user_agent()`
/// (`appurify-client/<ver> python-requests/<ver> <impl>/<pyver> <os>/<rel>`),
/// filled in with Rust/target info in place of the Python runtime bits.
fn user_agent() -> String {
    format!(
        "devtunnel/{} {}-{} {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        std::env::consts::FAMILY,
        std::env::consts::OS,
    )
}

/// Raw RSA key components the control plane hands back, matching the
/// `key` sub-object in the original's reservation response.
#[derive(Debug, Deserialize)]
pub struct RsaComponents {
    pub e: String,
    pub n: String,
    pub d: String,
    pub p: String,
    pub q: String,
}

/// `r.json()['response']` in `Tunnel.reserve_proxy_port`, field names
/// kept as the API returns them.
#[derive(Debug, Deserialize)]
pub struct ReservationResponse {
    pub proxy_port: u16,
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub key: RsaComponents,
}

/// Either shape the original's credentials dict could take: an API
/// key/secret pair, or a plain username/password login.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey { key: String, secret: String },
    Password { username: String, password: String },
}

impl Credentials {
    fn as_form(&self) -> Vec<(&str, &str)> {
        match self {
            Credentials::ApiKey { key, secret } => {
                vec![("api_key", key.as_str()), ("api_secret", secret.as_str())]
            }
            Credentials::Password { username, password } => vec![
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
        }
    }
}

pub struct ControlClient {
    credentials: Credentials,
}

impl ControlClient {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn reserve(&self) -> anyhow::Result<ReservationResponse> {
        let form = self.credentials.as_form();
        let body = self.post_with_retry("tunnel/reserve", &form)?;
        serde_json::from_str(&body)
            .map_err(|e| ReservationError(format!("malformed reservation response: {e}")).into())
    }

    pub fn unreserve(&self, proxy_port: u16) -> anyhow::Result<()> {
        let proxy_port_str = proxy_port.to_string();
        let mut form = self.credentials.as_form();
        form.push(("proxy_port", &proxy_port_str));
        self.post_with_retry("tunnel/unreserve", &form)?;
        Ok(())
    }

    fn post_with_retry(&self, resource: &str, form: &[(&str, &str)]) -> anyhow::Result<String> {
        let retry_on_failure = env_or("APPURIFY_API_RETRY_ON_FAILURE", DEFAULT_RETRY_ON_FAILURE as u8) != 0;
        let max_retry = env_or("APPURIFY_API_MAX_RETRY", DEFAULT_MAX_RETRY);
        let retry_delay = Duration::from_secs(env_or("APPURIFY_API_RETRY_DELAY", DEFAULT_RETRY_DELAY_SECS));

        let url = resource_url(resource);
        let form: Vec<(String, String)> = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut attempt = 0u32;
        loop {
            log::info!("HTTP POST {url}");
            match post_once(&url, &form) {
                Ok((status, text)) if status == 200 => return Ok(text),
                Ok((status, text)) => {
                    if retry_on_failure && attempt < max_retry {
                        attempt += 1;
                        thread::sleep(retry_delay);
                        continue;
                    }
                    return Err(ReservationError(format!("status {status}: {text}")).into());
                }
                Err(e) => {
                    if retry_on_failure && attempt < max_retry {
                        attempt += 1;
                        thread::sleep(retry_delay);
                        continue;
                    }
                    return Err(ReservationError(e.to_string()).into());
                }
            }
        }
    }
}

fn post_once(url: &str, form: &[(String, String)]) -> anyhow::Result<(u16, String)> {
    let body: String = form
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let request = ureq::http::Request::builder()
        .method("POST")
        .uri(url)
        .header("user-agent", user_agent())
        .header("content-type", "application/x-www-form-urlencoded")
        .body(body)?;

    let agent: ureq::Agent = ureq::config::Config::builder()
        .max_redirects(0)
        .build()
        .into();
    let mut resp = agent.run(request)?;
    let status = resp.status().as_u16();
    let text = resp.body_mut().read_to_string()?;
    Ok((status, text))
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_url_uses_defaults_without_env_overrides() {
        // SAFETY: single-threaded test, no overlapping env mutation.
        unsafe {
            std::env::remove_var("APPURIFY_API_PROTO");
            std::env::remove_var("APPURIFY_API_HOST");
            std::env::remove_var("APPURIFY_API_PORT");
        }
        assert_eq!(
            resource_url("tunnel/reserve"),
            "https://live.appurify.com:443/resource/tunnel/reserve/"
        );
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b/c"), "a%20b%2Fc");
        assert_eq!(urlencode("a+b"), "a%2Bb");
    }
}
