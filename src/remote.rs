use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Local host used when a declaration gives a local port but no local host.
pub const DEFAULT_LOCAL_HOST: &str = "0.0.0.0";
/// Remote host used when a declaration gives only a remote port.
pub const DEFAULT_REMOTE_HOST: &str = "127.0.0.1";

/// Errors from parsing a tunnel declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' does not match any accepted tunnel form")]
    Format(String),
    #[error("invalid port '{0}'")]
    Port(String),
    #[error("empty host segment in '{0}'")]
    Host(String),
}

/// Local side of a tunnel. Present once declared explicitly or once the
/// broker assigns an ephemeral port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    pub host: String,
    pub port: u16,
    /// True when the port came from the allocator rather than the declaration.
    #[serde(default)]
    pub random: bool,
}

/// One tunnel declaration: an optional local bind endpoint, the remote
/// endpoint to forward to, and an optional ACL restricting who may use it.
///
/// Accepted textual forms, least to most explicit:
/// - `<remote-port>`
/// - `<remote-host>:<remote-port>`
/// - `<local-port>:<remote-host>:<remote-port>`
/// - `<local-host>:<local-port>:<remote-host>:<remote-port>`
///
/// each optionally followed by `(acl:<value>)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub remote_host: String,
    pub remote_port: u16,
    pub acl: Option<String>,
    pub local: Option<Local>,
}

/// Equivalence key for reconciliation. Two tunnels with equal keys are
/// operationally interchangeable across reconnects: the key carries the
/// remote endpoint, the ACL (absence included), and the local endpoint —
/// unless the local port was ephemeral or never declared, in which case the
/// local side collapses to a wildcard and the concrete port is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TunnelKey {
    remote_host: String,
    remote_port: u16,
    acl: Option<String>,
    local: LocalKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LocalKey {
    Any,
    Fixed(String, u16),
}

impl Remote {
    /// True iff the declaration itself specified a local host or port.
    /// Broker-assigned ephemeral ports don't count.
    pub fn is_local_explicit(&self) -> bool {
        self.local.as_ref().is_some_and(|l| !l.random)
    }

    /// Record an ephemeral local port chosen by the allocator. Only
    /// meaningful for tunnels without an explicit local part.
    pub fn assign_local_port(&mut self, port: u16) {
        self.local = Some(Local {
            host: DEFAULT_LOCAL_HOST.to_string(),
            port,
            random: true,
        });
    }

    /// Identity key used by the reconciliation engine.
    pub fn key(&self) -> TunnelKey {
        let local = match &self.local {
            Some(l) if !l.random => LocalKey::Fixed(l.host.clone(), l.port),
            _ => LocalKey::Any,
        };
        TunnelKey {
            remote_host: self.remote_host.clone(),
            remote_port: self.remote_port,
            acl: self.acl.clone(),
            local,
        }
    }
}

impl fmt::Display for Remote {
    /// Canonical render: the most explicit form actually known. A fixed
    /// local endpoint is emitted literally; an ephemeral or unspecified one
    /// renders as the `::` sentinel.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local {
            Some(l) if !l.random => write!(f, "{}:{}:", l.host, l.port)?,
            _ => f.write_str("::")?,
        }
        write!(f, "{}:{}", self.remote_host, self.remote_port)?;
        if let Some(acl) = &self.acl {
            write!(f, "(acl:{})", acl)?;
        }
        Ok(())
    }
}

fn parse_port(text: &str, segment: &str) -> Result<u16, ParseError> {
    match segment.parse::<u16>() {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(ParseError::Port(if segment.is_empty() {
            text.to_string()
        } else {
            segment.to_string()
        })),
    }
}

fn require_host(text: &str, segment: &str) -> Result<String, ParseError> {
    if segment.is_empty() {
        return Err(ParseError::Host(text.to_string()));
    }
    Ok(segment.to_string())
}

impl FromStr for Remote {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Optional ACL suffix: "...(acl:<value>)"
        let (spec, acl) = match s.strip_suffix(')') {
            Some(head) => match head.rsplit_once("(acl:") {
                Some((spec, acl)) if !acl.is_empty() => (spec, Some(acl.to_string())),
                _ => return Err(ParseError::Format(s.to_string())),
            },
            None => (s, None),
        };

        // A leading "::" is the canonical sentinel for "no local part".
        let spec = spec.strip_prefix("::").unwrap_or(spec);

        let parts: Vec<&str> = spec.split(':').collect();
        let (local, remote_host, remote_port) = match parts[..] {
            [rport] => (None, DEFAULT_REMOTE_HOST.to_string(), parse_port(s, rport)?),
            [rhost, rport] => (None, require_host(s, rhost)?, parse_port(s, rport)?),
            [lport, rhost, rport] => (
                Some(Local {
                    host: DEFAULT_LOCAL_HOST.to_string(),
                    port: parse_port(s, lport)?,
                    random: false,
                }),
                require_host(s, rhost)?,
                parse_port(s, rport)?,
            ),
            [lhost, lport, rhost, rport] => (
                Some(Local {
                    host: require_host(s, lhost)?,
                    port: parse_port(s, lport)?,
                    random: false,
                }),
                require_host(s, rhost)?,
                parse_port(s, rport)?,
            ),
            _ => return Err(ParseError::Format(s.to_string())),
        };

        Ok(Remote {
            local,
            remote_host,
            remote_port,
            acl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Remote {
        s.parse().unwrap()
    }

    #[test]
    fn parse_remote_port_only() {
        let r = parse("3000");
        assert_eq!(r.local, None);
        assert_eq!(r.remote_host, "127.0.0.1");
        assert_eq!(r.remote_port, 3000);
        assert_eq!(r.acl, None);
    }

    #[test]
    fn parse_remote_host_and_port() {
        let r = parse("foobar.com:3000");
        assert_eq!(r.local, None);
        assert_eq!(r.remote_host, "foobar.com");
        assert_eq!(r.remote_port, 3000);
    }

    #[test]
    fn parse_local_port_form() {
        let r = parse("3000:site.com:80");
        let local = r.local.unwrap();
        assert_eq!(local.host, "0.0.0.0");
        assert_eq!(local.port, 3000);
        assert!(!local.random);
        assert_eq!(r.remote_host, "site.com");
        assert_eq!(r.remote_port, 80);
    }

    #[test]
    fn parse_fully_explicit() {
        let r = parse("192.168.0.1:3000:google.com:80");
        let local = r.local.unwrap();
        assert_eq!(local.host, "192.168.0.1");
        assert_eq!(local.port, 3000);
        assert_eq!(r.remote_host, "google.com");
        assert_eq!(r.remote_port, 80);
    }

    #[test]
    fn parse_acl_suffix() {
        let r = parse("2222:127.0.0.1:22(acl:95.67.52.213)");
        assert_eq!(r.acl.as_deref(), Some("95.67.52.213"));
        assert_eq!(r.local.unwrap().port, 2222);
        assert_eq!(r.remote_port, 22);
    }

    #[test]
    fn parse_unspecified_sentinel() {
        let r = parse("::foobar.com:3000");
        assert_eq!(r.local, None);
        assert_eq!(r.remote_host, "foobar.com");
        assert_eq!(r.remote_port, 3000);
    }

    #[test]
    fn parse_rejects_bad_ports() {
        assert_eq!(
            "abc".parse::<Remote>(),
            Err(ParseError::Port("abc".to_string()))
        );
        assert_eq!(
            "site.com:0".parse::<Remote>(),
            Err(ParseError::Port("0".to_string()))
        );
        assert_eq!(
            "site.com:70000".parse::<Remote>(),
            Err(ParseError::Port("70000".to_string()))
        );
        assert!("3000:site.com:x".parse::<Remote>().is_err());
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!("".parse::<Remote>().is_err());
        assert!("a:1:b:2:c:3".parse::<Remote>().is_err());
        assert_eq!(
            ":80".parse::<Remote>(),
            Err(ParseError::Host(":80".to_string()))
        );
        assert_eq!(
            ":3000:site.com:80".parse::<Remote>(),
            Err(ParseError::Host(":3000:site.com:80".to_string()))
        );
        assert!("site.com:80(acl:)".parse::<Remote>().is_err());
    }

    #[test]
    fn render_most_explicit_known_form() {
        assert_eq!(parse("3000").to_string(), "::127.0.0.1:3000");
        assert_eq!(parse("foobar.com:3000").to_string(), "::foobar.com:3000");
        assert_eq!(
            parse("3000:site.com:80").to_string(),
            "0.0.0.0:3000:site.com:80"
        );
        assert_eq!(
            parse("192.168.0.1:3000:google.com:80").to_string(),
            "192.168.0.1:3000:google.com:80"
        );
    }

    #[test]
    fn render_acl_suffix() {
        assert_eq!(
            parse("3333:127.0.0.1:22(acl:95.67.52.214)").to_string(),
            "0.0.0.0:3333:127.0.0.1:22(acl:95.67.52.214)"
        );
    }

    #[test]
    fn render_hides_ephemeral_port() {
        let mut r = parse("foobar.com:3000");
        r.assign_local_port(5001);
        assert_eq!(r.to_string(), "::foobar.com:3000");
    }

    #[test]
    fn parse_render_round_trip_keeps_identity() {
        for s in [
            "3000",
            "foobar.com:3000",
            "3000:site.com:80",
            "192.168.0.1:3000:google.com:80",
            "2222:127.0.0.1:22(acl:95.67.52.213)",
            "22(acl:10.0.0.0/8)",
        ] {
            let r = parse(s);
            let reparsed = parse(&r.to_string());
            assert_eq!(reparsed.key(), r.key(), "round-trip of {}", s);
        }
    }

    #[test]
    fn local_explicit_only_for_declared_locals() {
        assert!(!parse("3000").is_local_explicit());
        assert!(!parse("foobar.com:3000").is_local_explicit());
        assert!(parse("3000:site.com:80").is_local_explicit());
        assert!(parse("192.168.0.1:3000:google.com:80").is_local_explicit());

        let mut r = parse("foobar.com:3000");
        r.assign_local_port(5001);
        assert!(!r.is_local_explicit());
    }

    #[test]
    fn key_ignores_ephemeral_port() {
        let undeclared = parse("foobar.com:22");
        let mut p1 = parse("foobar.com:22");
        p1.assign_local_port(5001);
        let mut p2 = parse("foobar.com:22");
        p2.assign_local_port(5002);

        assert_eq!(p1.key(), undeclared.key());
        assert_eq!(p1.key(), p2.key());
    }

    #[test]
    fn key_keeps_explicit_local_distinct() {
        let explicit = parse("0.0.0.0:5001:foobar.com:22");
        let mut ephemeral = parse("foobar.com:22");
        ephemeral.assign_local_port(5001);
        assert_ne!(explicit.key(), ephemeral.key());

        assert_ne!(
            parse("2222:127.0.0.1:22").key(),
            parse("3333:127.0.0.1:22").key()
        );
    }

    #[test]
    fn key_is_acl_sensitive() {
        assert_ne!(
            parse("22(acl:95.67.52.213)").key(),
            parse("22(acl:95.67.52.214)").key()
        );
        assert_ne!(parse("22(acl:95.67.52.213)").key(), parse("22").key());
        assert_eq!(
            parse("22(acl:95.67.52.213)").key(),
            parse("22(acl:95.67.52.213)").key()
        );
    }

    #[test]
    fn key_compares_remote_endpoint() {
        assert_ne!(parse("google.com:80").key(), parse("google.com:8080").key());
        assert_ne!(parse("google.com:80").key(), parse("google.com.ua:80").key());
    }
}
