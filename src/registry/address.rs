//! Listen addresses and URI templates.
//!
//! A template looks like `tcp://{account}.cassandra.example.com:10350/dbs/{db}`.
//! Placeholders may only stand for the leading DNS label of the host or for an
//! identifier slot of a `/kind/{id}` path, which is what lets a concrete request
//! URI be folded back into the template it was issued against without scanning
//! every registered template.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv6Addr};

use url::{Host, Url};

use super::error::TemplateError;

const PLACEHOLDER: &str = "{}";
const MIN_TENANT_HOST_LABELS: usize = 3;
const MAX_FOLDABLE_SLOTS: usize = 4;

/// URI template registered for a service.
///
/// Equality and hashing only consider the canonical form, so
/// `tcp://{a}.zone.com:1` and `TCP://{account}.Zone.com:1/` are the same template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    canonical: String,
}

impl UriTemplate {
    /// Parses a template literal.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let (scheme, rest) = raw
            .split_once("://")
            .filter(|(scheme, _)| is_valid_scheme(scheme))
            .ok_or_else(|| TemplateError::MissingScheme(raw.to_string()))?;
        let scheme = scheme.to_ascii_lowercase();

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let (host, port) = split_authority(raw, authority)?;
        let host = canonical_template_host(raw, host)?;
        let port = port.filter(|port| Some(*port) != known_default_port(&scheme));

        let mut segments = Vec::new();
        for (idx, segment) in path.split('/').filter(|s| !s.is_empty()).enumerate() {
            if has_braces(segment) {
                if !is_placeholder(segment) || idx % 2 == 0 {
                    return Err(TemplateError::MisplacedPlaceholder {
                        template: raw.to_string(),
                        segment: segment.to_string(),
                    });
                }
                segments.push(PLACEHOLDER.to_string());
            } else {
                segments.push(segment.to_string());
            }
        }

        let canonical = render(&scheme, &host, port, &segments);
        Ok(Self {
            raw: raw.to_string(),
            scheme,
            canonical,
        })
    }

    /// Folds a concrete request URI into the shape of the template it would
    /// have been registered under if every foldable position were a
    /// placeholder. Returns `None` for URIs without a host.
    pub fn from_uri(uri: &Url) -> Option<Self> {
        let (scheme, host, folded_host) = request_host(uri)?;
        let segments: Vec<String> = path_segments(uri)
            .into_iter()
            .enumerate()
            .map(|(idx, segment)| if idx % 2 == 1 { PLACEHOLDER.to_string() } else { segment })
            .collect();
        Some(Self::folded(scheme, folded_host.as_deref().unwrap_or(&host), uri.port(), &segments))
    }

    /// Every template shape a concrete request URI may have been registered
    /// under, most literal first: the leading host label and each identifier
    /// slot are either kept or folded into `{}`. The last entry equals
    /// `from_uri`. Empty for URIs without a host.
    pub fn candidates(uri: &Url) -> Vec<Self> {
        let Some((scheme, host, folded_host)) = request_host(uri) else {
            return Vec::new();
        };
        let segments = path_segments(uri);
        let slots: Vec<usize> = (1..segments.len()).step_by(2).collect();

        // Past the cap only the literal and the fully folded paths are tried.
        let masks: Vec<Option<u32>> = if slots.len() <= MAX_FOLDABLE_SLOTS {
            (0..1u32 << slots.len()).map(Some).collect()
        } else {
            vec![Some(0), None]
        };
        let mut hosts = vec![(0, host)];
        if let Some(folded) = folded_host {
            hosts.push((1, folded));
        }

        let mut shapes: Vec<(u32, Self)> = Vec::with_capacity(hosts.len() * masks.len());
        for (host_folds, host) in &hosts {
            for mask in &masks {
                let mut shape = segments.clone();
                for (bit, slot) in slots.iter().enumerate() {
                    if mask.map_or(true, |m| bit < MAX_FOLDABLE_SLOTS && m & (1 << bit) != 0) {
                        shape[*slot] = PLACEHOLDER.to_string();
                    }
                }
                let folds = host_folds + shape.iter().filter(|s| *s == PLACEHOLDER).count() as u32;
                shapes.push((folds, Self::folded(scheme.clone(), host, uri.port(), &shape)));
            }
        }
        shapes.sort_by_key(|(folds, _)| *folds);
        shapes.dedup_by(|a, b| a.1 == b.1);
        shapes.into_iter().map(|(_, shape)| shape).collect()
    }

    fn folded(scheme: String, host: &str, port: Option<u16>, segments: &[String]) -> Self {
        let canonical = render(&scheme, host, port, segments);
        Self {
            raw: canonical.clone(),
            scheme,
            canonical,
        }
    }

    /// Lowercased transport scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The literal this template was built from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical form, with every placeholder written as `{}`.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for UriTemplate {}

impl Hash for UriTemplate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Address a service listens under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    /// Literal `host:port` endpoint, resolvable by scheme and port alone.
    SchemeAndPort { scheme: String, endpoint: String },
    /// Multi-tenant URI template.
    Template(UriTemplate),
}

impl ListenAddress {
    pub fn scheme_and_port(scheme: impl Into<String>, endpoint: impl Into<String>) -> Self {
        ListenAddress::SchemeAndPort {
            scheme: scheme.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn template(raw: &str) -> Result<Self, TemplateError> {
        UriTemplate::parse(raw).map(ListenAddress::Template)
    }

    pub fn scheme(&self) -> &str {
        match self {
            ListenAddress::SchemeAndPort { scheme, .. } => scheme,
            ListenAddress::Template(template) => template.scheme(),
        }
    }

    /// Key of the fixed-address map (`"scheme:port"`), only defined for
    /// `SchemeAndPort` addresses.
    pub fn scheme_port_key(&self) -> Option<Result<String, TemplateError>> {
        match self {
            ListenAddress::SchemeAndPort { scheme, endpoint } => {
                let literal = format!("{}://{}", scheme, endpoint);
                let key = Url::parse(&literal)
                    .map_err(|err| TemplateError::InvalidEndpoint {
                        endpoint: literal.clone(),
                        reason: err.to_string(),
                    })
                    .and_then(|uri| {
                        scheme_port_key(&uri).ok_or(TemplateError::MissingPort(literal.clone()))
                    });
                Some(key)
            }
            ListenAddress::Template(_) => None,
        }
    }

    /// The template this address is filed under in the per-scheme map.
    pub fn to_template(&self) -> Result<UriTemplate, TemplateError> {
        match self {
            ListenAddress::SchemeAndPort { scheme, endpoint } => {
                UriTemplate::parse(&format!("{}://{}", scheme, endpoint))
            }
            ListenAddress::Template(template) => Ok(template.clone()),
        }
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::SchemeAndPort { scheme, endpoint } => write!(f, "{}://{}", scheme, endpoint),
            ListenAddress::Template(template) => write!(f, "{}", template),
        }
    }
}

/// Builds the `"scheme:port"` key of a request URI.
pub fn scheme_port_key(uri: &Url) -> Option<String> {
    uri.port_or_known_default()
        .map(|port| format!("{}:{}", uri.scheme().to_ascii_lowercase(), port))
}

// Mirrors the defaults `url` strips from special schemes.
fn known_default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn has_braces(s: &str) -> bool {
    s.contains('{') || s.contains('}')
}

fn is_placeholder(s: &str) -> bool {
    s.len() >= 2
        && s.starts_with('{')
        && s.ends_with('}')
        && !has_braces(&s[1..s.len() - 1])
}

fn split_authority<'a>(raw: &str, authority: &'a str) -> Result<(&'a str, Option<u16>), TemplateError> {
    let (host, port) = if let Some(stripped) = authority.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| TemplateError::MissingHost(raw.to_string()))?;
        let host = &authority[..end + 2];
        let port = stripped[end + 1..].strip_prefix(':');
        (host, port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(TemplateError::MissingHost(raw.to_string()));
    }

    let port = match port {
        Some(port) => Some(
            port.parse::<u16>()
                .map_err(|_| TemplateError::InvalidPort(raw.to_string()))?,
        ),
        None => None,
    };

    Ok((host, port))
}

fn canonical_template_host(raw: &str, host: &str) -> Result<String, TemplateError> {
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        let addr: Ipv6Addr = inner
            .parse()
            .map_err(|_| TemplateError::MissingHost(raw.to_string()))?;
        return Ok(format!("[{}]", addr));
    }

    let labels: Vec<&str> = host.split('.').collect();
    let mut out = Vec::with_capacity(labels.len());
    for (idx, label) in labels.iter().enumerate() {
        if has_braces(label) {
            if !is_placeholder(label) || idx != 0 || labels.len() < MIN_TENANT_HOST_LABELS {
                return Err(TemplateError::MisplacedPlaceholder {
                    template: raw.to_string(),
                    segment: label.to_string(),
                });
            }
            out.push(PLACEHOLDER.to_string());
        } else {
            out.push(label.to_ascii_lowercase());
        }
    }
    Ok(out.join("."))
}

// Lowercased scheme, literal host, and the host with its tenant label folded
// when it has one.
fn request_host(uri: &Url) -> Option<(String, String, Option<String>)> {
    let scheme = uri.scheme().to_ascii_lowercase();
    let (host, folded) = match uri.host()? {
        Host::Ipv4(addr) => (addr.to_string(), None),
        Host::Ipv6(addr) => (format!("[{}]", addr), None),
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            let folded = fold_tenant_label(&domain);
            (domain, folded)
        }
    };
    Some((scheme, host, folded))
}

fn fold_tenant_label(domain: &str) -> Option<String> {
    if domain.parse::<IpAddr>().is_ok() {
        return None;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < MIN_TENANT_HOST_LABELS {
        return None;
    }

    let mut out = String::with_capacity(domain.len());
    out.push_str(PLACEHOLDER);
    for label in &labels[1..] {
        out.push('.');
        out.push_str(label);
    }
    Some(out)
}

fn path_segments(uri: &Url) -> Vec<String> {
    uri.path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn render(scheme: &str, host: &str, port: Option<u16>, segments: &[String]) -> String {
    let mut out = format!("{}://{}", scheme, host);
    if let Some(port) = port {
        out.push(':');
        out.push_str(&port.to_string());
    }
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}
