//! Question-name parsing.
//!
//! Names are interpreted relative to the served domain `D`:
//!
//! ```text
//! [tag|proto]*.<service>.service.D      A, AAAA, SRV
//! _<service>._<tag|proto>.D             SRV only
//! _<service>._<tag|proto>.service.D     SRV only
//! <instance_id>.instance.D              A, AAAA
//! ```

use std::fmt;

use hickory_proto::rr::{DNSClass, Name, RecordType};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Maximum length of a single DNS label, in bytes.
const MAX_LABEL_LEN: usize = 63;

/// Label marking a service query.
const SERVICE_LABEL: &str = "service";

/// Label marking an instance query.
const INSTANCE_LABEL: &str = "instance";

/// Endpoint protocol, used both as a query filter and to pick how an endpoint
/// value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain TCP endpoint, `host[:port]`.
    Tcp,
    /// Plain UDP endpoint, `host[:port]`.
    Udp,
    /// HTTP endpoint, bare host or URL.
    Http,
    /// HTTPS endpoint, bare host or URL.
    Https,
}

impl Protocol {
    /// Parse a protocol token, ignoring ASCII case.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("tcp") {
            Some(Protocol::Tcp)
        } else if token.eq_ignore_ascii_case("udp") {
            Some(Protocol::Udp)
        } else if token.eq_ignore_ascii_case("http") {
            Some(Protocol::Http)
        } else if token.eq_ignore_ascii_case("https") {
            Some(Protocol::Https)
        } else {
            None
        }
    }

    /// Parse a catalog endpoint type. Unlike query tokens, the match is exact.
    pub fn from_endpoint_type(endpoint_type: &str) -> Option<Self> {
        match endpoint_type {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }

    /// Lowercase name, as used for endpoint types in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query for the instances of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceQuery {
    /// Service name.
    pub service_name: String,
    /// Tags every returned instance must carry.
    pub tags: Vec<String>,
    /// Optional endpoint protocol filter.
    pub protocol: Option<Protocol>,
}

/// Query for a single instance by catalog ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceQuery {
    /// Catalog instance ID.
    pub instance_id: String,
}

/// Typed lookup extracted from a question name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    /// `*.service.D` and the SRV shorthand.
    Service(ServiceQuery),
    /// `<id>.instance.D`.
    Instance(InstanceQuery),
}

/// Reject question classes and types that are never served.
pub fn check_question(class: DNSClass, record_type: RecordType) -> Result<(), QueryError> {
    if class != DNSClass::IN {
        return Err(QueryError::UnsupportedClass(class));
    }
    match record_type {
        RecordType::A | RecordType::AAAA | RecordType::SRV => Ok(()),
        other => Err(QueryError::UnsupportedType(other)),
    }
}

/// Raw labels of a domain name, without the root label.
///
/// Labels are taken byte for byte from the wire form, so tags such as
/// `env=prod` reach the catalog unescaped. Fails when a label is empty,
/// longer than 63 bytes, or not valid UTF-8.
pub fn name_labels(name: &Name) -> Result<Vec<String>, QueryError> {
    name.iter()
        .map(|label| {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(QueryError::InvalidName(name.to_string()));
            }
            String::from_utf8(label.to_vec()).map_err(|_| QueryError::InvalidName(name.to_string()))
        })
        .collect()
}

/// Parse a question name into a [`LookupKey`].
///
/// `domain` is the served domain; its labels are matched ignoring ASCII case.
pub fn parse_lookup_key(
    name: &Name,
    record_type: RecordType,
    domain: &Name,
) -> Result<LookupKey, QueryError> {
    let labels = name_labels(name)?;
    if labels.len() < 3 {
        return Err(QueryError::NoSuchName(name.to_string()));
    }

    let domain_labels = name_labels(domain)?;
    let relative = strip_domain(&labels, &domain_labels)
        .ok_or_else(|| QueryError::NoSuchName(name.to_string()))?;

    let is_srv = record_type == RecordType::SRV;

    match relative {
        [service, tag, keyword]
            if is_srv && is_label(keyword, SERVICE_LABEL) && is_shorthand(service, tag) =>
        {
            service_query(&service[1..], &[tag[1..].to_string()], name)
        }
        [tokens @ .., service, keyword] if is_label(keyword, SERVICE_LABEL) => {
            service_query(service, tokens, name)
        }
        [service, tag] if is_srv && is_shorthand(service, tag) => {
            service_query(&service[1..], &[tag[1..].to_string()], name)
        }
        [instance_id, keyword] if is_label(keyword, INSTANCE_LABEL) => match record_type {
            RecordType::A | RecordType::AAAA => Ok(LookupKey::Instance(InstanceQuery {
                instance_id: instance_id.clone(),
            })),
            other => Err(QueryError::UnsupportedInstanceType(other)),
        },
        _ => Err(QueryError::NoSuchName(name.to_string())),
    }
}

/// Strip the served domain from the end of `labels`.
fn strip_domain<'a>(labels: &'a [String], domain: &[String]) -> Option<&'a [String]> {
    if labels.len() < domain.len() {
        return None;
    }
    let (relative, suffix) = labels.split_at(labels.len() - domain.len());
    suffix
        .iter()
        .zip(domain)
        .all(|(label, expected)| label.eq_ignore_ascii_case(expected))
        .then_some(relative)
}

fn is_label(label: &str, keyword: &str) -> bool {
    label.eq_ignore_ascii_case(keyword)
}

fn is_shorthand(service: &str, tag: &str) -> bool {
    service.len() > 1 && tag.len() > 1 && service.starts_with('_') && tag.starts_with('_')
}

/// Build a service query, separating the protocol filter from the tags.
fn service_query(
    service_name: &str,
    tokens: &[String],
    name: &Name,
) -> Result<LookupKey, QueryError> {
    if service_name.is_empty() {
        return Err(QueryError::NoSuchName(name.to_string()));
    }

    let mut protocol: Option<Protocol> = None;
    let mut tags = Vec::with_capacity(tokens.len());

    for token in tokens {
        match Protocol::from_token(token) {
            Some(found) => {
                if let Some(first) = protocol {
                    return Err(QueryError::MultipleProtocols {
                        first,
                        second: found,
                    });
                }
                protocol = Some(found);
            }
            None => tags.push(token.clone()),
        }
    }

    Ok(LookupKey::Service(ServiceQuery {
        service_name: service_name.to_string(),
        tags,
        protocol,
    }))
}
