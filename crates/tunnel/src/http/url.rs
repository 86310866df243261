//! Request-target parsing: absolute-form, origin-form and authority-form
//! (the last one only ever seen on a CONNECT request-line).

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTarget {
    pub raw: String,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl RequestTarget {
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.split_once("://") {
            return Self::parse_absolute(raw, rest.0, rest.1);
        }
        if raw.starts_with('/') || raw == "*" {
            return Self::parse_origin(raw);
        }
        // authority-form, e.g. "example.com:443" from a CONNECT line.
        let (host, port) = split_host_port(raw);
        Self {
            raw: raw.to_string(),
            scheme: None,
            host: Some(host),
            port,
            path: String::new(),
            query: String::new(),
            fragment: String::new(),
        }
    }

    fn parse_absolute(raw: &str, scheme: &str, rest: &str) -> Self {
        let (authority, after_authority) = match rest.find(['/', '?', '#']) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let (host, port) = split_host_port(authority);
        let (path, query, fragment) = split_path_query_fragment(after_authority);
        Self {
            raw: raw.to_string(),
            scheme: Some(scheme.to_string()),
            host: Some(host),
            port,
            path,
            query,
            fragment,
        }
    }

    fn parse_origin(raw: &str) -> Self {
        let (path, query, fragment) = split_path_query_fragment(raw);
        Self {
            raw: raw.to_string(),
            scheme: None,
            host: None,
            port: None,
            path,
            query,
            fragment,
        }
    }

    /// origin-form reconstruction: `path[?query][#fragment]`, `path`
    /// defaults to `/`.
    pub fn origin_form(&self) -> String {
        let mut out = if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path.clone()
        };
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            out.push('#');
            out.push_str(&self.fragment);
        }
        out
    }
}

fn split_host_port(authority: &str) -> (String, Option<u16>) {
    if let Some(stripped) = authority.strip_prefix('[') {
        // IPv6 literal: [::1]:8080
        if let Some(end) = stripped.find(']') {
            let host = format!("[{}]", &stripped[..end]);
            let after = &stripped[end + 1..];
            let port = after.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            (host.to_string(), port.parse().ok())
        }
        _ => (authority.to_string(), None),
    }
}

fn split_path_query_fragment(s: &str) -> (String, String, String) {
    let (before_fragment, fragment) = match s.find('#') {
        Some(idx) => (&s[..idx], s[idx + 1..].to_string()),
        None => (s, String::new()),
    };
    let (path, query) = match before_fragment.find('?') {
        Some(idx) => (
            before_fragment[..idx].to_string(),
            before_fragment[idx + 1..].to_string(),
        ),
        None => (before_fragment.to_string(), String::new()),
    };
    (path, query, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_form_with_query_and_fragment() {
        let t = RequestTarget::parse("https://example.com/path/dir/?a=b&c=d#p=q");
        assert_eq!(t.host.as_deref(), Some("example.com"));
        assert_eq!(t.port, None);
        assert_eq!(t.origin_form(), "/path/dir/?a=b&c=d#p=q");
    }

    #[test]
    fn absolute_form_with_port_and_no_path() {
        let t = RequestTarget::parse("http://localhost:8080");
        assert_eq!(t.host.as_deref(), Some("localhost"));
        assert_eq!(t.port, Some(8080));
        assert_eq!(t.origin_form(), "/");
    }

    #[test]
    fn authority_form() {
        let t = RequestTarget::parse("httpbin.org:80");
        assert_eq!(t.host.as_deref(), Some("httpbin.org"));
        assert_eq!(t.port, Some(80));
        assert_eq!(t.scheme, None);
    }

    #[test]
    fn origin_form_passthrough() {
        let t = RequestTarget::parse("/user-agent?x=1");
        assert_eq!(t.host, None);
        assert_eq!(t.origin_form(), "/user-agent?x=1");
    }
}
