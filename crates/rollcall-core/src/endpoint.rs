//! Endpoints and address range expansion.
//!
//! A range spec is a dotted quad where each part is one of:
//!   - a literal octet             `192`
//!   - a wildcard                  `*`       (0..=255)
//!   - an inclusive brace range    `{2,4}`   (optional space after the comma)
//!
//! Expansion is the Cartesian product of the four parts, in ascending
//! order with the last octet varying fastest.

use std::fmt;
use std::net::Ipv4Addr;

/// A coordinator candidate: IPv4 address plus HTTP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }

    /// Base URL for HTTP requests against this endpoint.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.addr, self.port)
    }

    /// Parse `ip` or `ip:port`, using `default_port` when no port is given.
    pub fn parse(text: &str, default_port: u16) -> Result<Self, RangeError> {
        let (host, port) = match text.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| RangeError::BadPort(text.to_string()))?;
                (host, port)
            }
            None => (text, default_port),
        };
        let addr = host
            .parse()
            .map_err(|_| RangeError::BadAddress(text.to_string()))?;
        Ok(Self { addr, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range spec {0:?} must have exactly four dot-separated parts")]
    PartCount(String),
    #[error("octet {0} is larger than 255")]
    OctetTooLarge(u32),
    #[error("range {{{0},{1}}} is empty")]
    EmptyRange(u32, u32),
    #[error("unrecognized range part {0:?}")]
    BadPart(String),
    #[error("invalid address {0:?}")]
    BadAddress(String),
    #[error("invalid port in {0:?}")]
    BadPort(String),
}

/// Expand one range spec into every concrete address it names.
pub fn expand(spec: &str) -> Result<Vec<Ipv4Addr>, RangeError> {
    let parts: Vec<&str> = spec.trim().split('.').collect();
    if parts.len() != 4 {
        return Err(RangeError::PartCount(spec.to_string()));
    }

    let a = expand_part(parts[0])?;
    let b = expand_part(parts[1])?;
    let c = expand_part(parts[2])?;
    let d = expand_part(parts[3])?;

    let mut out = Vec::with_capacity(a.len() * b.len() * c.len() * d.len());
    for &o1 in &a {
        for &o2 in &b {
            for &o3 in &c {
                for &o4 in &d {
                    out.push(Ipv4Addr::new(o1, o2, o3, o4));
                }
            }
        }
    }
    Ok(out)
}

/// Expand a list of specs, concatenated in input order.
pub fn expand_all<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Ipv4Addr>, RangeError> {
    let mut out = Vec::new();
    for spec in specs {
        out.extend(expand(spec.as_ref())?);
    }
    Ok(out)
}

/// Expand specs and pair every address with `port`.
pub fn endpoints<S: AsRef<str>>(specs: &[S], port: u16) -> Result<Vec<Endpoint>, RangeError> {
    Ok(expand_all(specs)?
        .into_iter()
        .map(|addr| Endpoint::new(addr, port))
        .collect())
}

fn expand_part(part: &str) -> Result<Vec<u8>, RangeError> {
    if part == "*" {
        return Ok((0..=255).collect());
    }

    if is_decimal(part) {
        return Ok(vec![octet(part)?]);
    }

    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        let (low, high) = inner
            .split_once(',')
            .ok_or_else(|| RangeError::BadPart(part.to_string()))?;
        let high = high.strip_prefix(' ').unwrap_or(high);
        if !is_decimal(low) || !is_decimal(high) {
            return Err(RangeError::BadPart(part.to_string()));
        }
        let (low, high) = (octet(low)?, octet(high)?);
        if low > high {
            return Err(RangeError::EmptyRange(low as u32, high as u32));
        }
        return Ok((low..=high).collect());
    }

    Err(RangeError::BadPart(part.to_string()))
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn octet(s: &str) -> Result<u8, RangeError> {
    // Saturate absurdly long digit strings instead of failing the parse.
    let value = s.parse::<u32>().unwrap_or(u32::MAX);
    u8::try_from(value).map_err(|_| RangeError::OctetTooLarge(value))
}
