//! Per-key peer address restrictions
//!
//! The optional fourth field of a key line is a comma-separated list of
//! numeric IPv4/IPv6 addresses. IPv6 addresses may carry a `%scope` suffix
//! (numeric zone id or interface name) and may be written in brackets.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::ControlFlow;
use std::str::FromStr;

/// IPv6 zone attached to a restriction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Id(u32),
    Interface(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Id(id) => write!(f, "{}", id),
            Scope::Interface(name) => f.write_str(name),
        }
    }
}

/// A single peer address a key may be used with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessRestriction {
    addr: IpAddr,
    scope: Option<Scope>,
}

/// Segment of an access list that is not a numeric address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAddress(pub String);

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid IP address <{}>", self.0)
    }
}

impl std::error::Error for InvalidAddress {}

impl AccessRestriction {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr, scope: None }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Check whether `peer` is the address this restriction names
    ///
    /// A numeric scope must match the peer's IPv6 scope id; interface-name
    /// scopes are not resolved and only the address is compared.
    pub fn permits(&self, peer: &SocketAddr) -> bool {
        if self.addr != peer.ip() {
            return false;
        }
        match (&self.scope, peer) {
            (Some(Scope::Id(id)), SocketAddr::V6(v6)) => *id == v6.scope_id(),
            _ => true,
        }
    }
}

impl FromStr for AccessRestriction {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidAddress(s.to_string());

        let text = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(s);

        let (addr_part, scope) = match text.split_once('%') {
            Some((addr_part, zone)) => {
                if zone.is_empty() {
                    return Err(invalid());
                }
                let scope = match zone.parse::<u32>() {
                    Ok(id) => Scope::Id(id),
                    Err(_) => Scope::Interface(zone.to_string()),
                };
                (addr_part, Some(scope))
            }
            None => (text, None),
        };

        let addr = addr_part.parse::<IpAddr>().map_err(|_| invalid())?;
        if scope.is_some() && addr.is_ipv4() {
            return Err(invalid());
        }

        Ok(Self { addr, scope })
    }
}

impl fmt::Display for AccessRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}%{}", self.addr, scope),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// Parse a comma-separated access list
///
/// Unparsable segments are dropped and handed to `on_invalid`, which decides
/// whether parsing continues. Duplicates are collapsed, file order is kept.
pub fn parse_access_list<F>(token: &[u8], mut on_invalid: F) -> Vec<AccessRestriction>
where
    F: FnMut(InvalidAddress) -> ControlFlow<()>,
{
    let mut list: Vec<AccessRestriction> = Vec::new();

    for segment in token.split(|&b| b == b',') {
        let parsed = std::str::from_utf8(segment)
            .map_err(|_| InvalidAddress(String::from_utf8_lossy(segment).into_owned()))
            .and_then(str::parse::<AccessRestriction>);

        match parsed {
            Ok(restriction) => {
                if !list.contains(&restriction) {
                    list.push(restriction);
                }
            }
            Err(invalid) => {
                if on_invalid(invalid).is_break() {
                    break;
                }
            }
        }
    }

    list
}
