//! Resource record synthesis from catalog instances.

use hickory_proto::rr::rdata::{A, AAAA, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::warn;

use crate::discovery::{ServiceEndpoint, ServiceInstance};
use crate::metrics::{self, SkipReason};
use crate::query::Protocol;

/// Default port for endpoints reached over plain HTTP.
const HTTP_DEFAULT_PORT: u16 = 80;

/// Default port for endpoints reached over HTTPS.
const HTTPS_DEFAULT_PORT: u16 = 443;

/// Why an instance's endpoint could not be turned into an address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// Endpoint type outside tcp/udp/http/https.
    #[error("unsupported endpoint type: {0}")]
    UnsupportedType(String),

    /// Host part is not a literal IP address.
    #[error("could not parse '{0}' as ip:port")]
    InvalidAddress(String),

    /// Port is not a valid u16.
    #[error("invalid port in '{0}'")]
    InvalidPort(String),
}

/// Literal address and port of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointAddress {
    /// Literal IP address.
    pub ip: IpAddr,
    /// Port, 0 when a tcp/udp endpoint has none.
    pub port: u16,
}

impl EndpointAddress {
    /// The 4-byte form of the address: IPv4, or IPv4-mapped IPv6.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self.ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        }
    }

    /// The 16-byte form of the address.
    pub fn ipv6(&self) -> Ipv6Addr {
        match self.ip {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        }
    }
}

/// Extract the literal address and port of an endpoint.
pub fn endpoint_address(endpoint: &ServiceEndpoint) -> Result<EndpointAddress, EndpointError> {
    match endpoint.protocol() {
        Some(Protocol::Tcp | Protocol::Udp) => parse_host_port(&endpoint.value),
        Some(Protocol::Http | Protocol::Https) => parse_http(&endpoint.value),
        None => Err(EndpointError::UnsupportedType(
            endpoint.endpoint_type.clone(),
        )),
    }
}

/// Parse `host`, `host:port`, `[v6]`, `[v6]:port` or a bare IPv6 literal.
fn parse_host_port(value: &str) -> Result<EndpointAddress, EndpointError> {
    let (host, port) = split_host_port(value);

    let ip: IpAddr = host
        .parse()
        .map_err(|_| EndpointError::InvalidAddress(value.to_string()))?;
    let port = match port {
        Some(port) => port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(value.to_string()))?,
        None => 0,
    };

    Ok(EndpointAddress { ip, port })
}

fn split_host_port(value: &str) -> (&str, Option<&str>) {
    if let Some(rest) = value.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, "")) => (host, None),
            Some((host, tail)) => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => (value, None),
            },
            None => (value, None),
        };
    }

    match value.split_once(':') {
        // More than one colon without brackets is a bare IPv6 literal.
        Some((host, port)) if !port.contains(':') => (host, Some(port)),
        _ => (value, None),
    }
}

/// Parse a bare host or URL; the scheme defaults to `http`.
fn parse_http(value: &str) -> Result<EndpointAddress, EndpointError> {
    let (rest, default_port) = if let Some(rest) = value.strip_prefix("https://") {
        (rest, HTTPS_DEFAULT_PORT)
    } else if let Some(rest) = value.strip_prefix("http://") {
        (rest, HTTP_DEFAULT_PORT)
    } else {
        (value, HTTP_DEFAULT_PORT)
    };

    let authority = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or(rest);
    let host_port = authority
        .rsplit_once('@')
        .map(|(_, host)| host)
        .unwrap_or(authority);

    let mut address = parse_host_port(host_port)?;
    if address.port == 0 {
        address.port = default_port;
    }
    Ok(address)
}

/// Records produced for one question.
#[derive(Debug, Default, Clone)]
pub struct SynthesizedRecords {
    /// Answer section records.
    pub answers: Vec<Record>,
    /// Additional section records (address records accompanying SRV answers).
    pub additionals: Vec<Record>,
}

impl SynthesizedRecords {
    /// Shuffle answers and additionals independently.
    pub fn shuffle(&mut self, rng: &mut fastrand::Rng) {
        rng.shuffle(&mut self.answers);
        rng.shuffle(&mut self.additionals);
    }
}

/// Builds A, AAAA and SRV records for the served domain.
#[derive(Debug, Clone)]
pub struct RecordSynthesizer {
    domain: Name,
    ttl: u32,
}

impl RecordSynthesizer {
    /// Create a synthesizer for the fully-qualified `domain`.
    pub fn new(domain: Name, ttl: u32) -> Self {
        Self { domain, ttl }
    }

    /// Name of an instance within the served domain: `<id>.instance.<domain>`.
    pub fn instance_name(&self, instance_id: &str) -> Result<Name, hickory_proto::ProtoError> {
        Name::from_ascii(instance_id)?
            .append_label("instance")?
            .append_domain(&self.domain)
    }

    /// Build the records answering `record_type` for `instances`.
    ///
    /// Instances whose endpoint cannot be resolved to a literal address are
    /// skipped with a warning.
    pub fn synthesize(
        &self,
        question: &Name,
        record_type: RecordType,
        instances: &[ServiceInstance],
    ) -> SynthesizedRecords {
        let mut records = SynthesizedRecords::default();

        for instance in instances {
            let address = match endpoint_address(&instance.endpoint) {
                Ok(address) => address,
                Err(e) => {
                    warn!(
                        instance_id = %instance.id,
                        name = %question,
                        error = %e,
                        "unable to resolve ip address for instance"
                    );
                    metrics::record_instance_skipped(SkipReason::from(&e));
                    continue;
                }
            };

            match record_type {
                RecordType::A => {
                    if let Some(v4) = address.ipv4() {
                        records.answers.push(self.a_record(question.clone(), v4));
                    }
                }
                RecordType::AAAA => {
                    if address.ipv4().is_none() {
                        records
                            .answers
                            .push(self.aaaa_record(question.clone(), address.ipv6()));
                    }
                }
                RecordType::SRV => {
                    let target = match self.instance_name(&instance.id) {
                        Ok(target) => target,
                        Err(e) => {
                            warn!(
                                instance_id = %instance.id,
                                name = %question,
                                error = %e,
                                "instance id does not form a valid target name"
                            );
                            metrics::record_instance_skipped(SkipReason::InvalidTarget);
                            continue;
                        }
                    };

                    records.answers.push(self.srv_record(
                        question.clone(),
                        address.port,
                        target.clone(),
                    ));
                    let extra = match address.ipv4() {
                        Some(v4) => self.a_record(target, v4),
                        None => self.aaaa_record(target, address.ipv6()),
                    };
                    records.additionals.push(extra);
                }
                _ => {}
            }
        }

        records
    }

    fn a_record(&self, name: Name, ip: Ipv4Addr) -> Record {
        self.record(name, RData::A(A(ip)))
    }

    fn aaaa_record(&self, name: Name, ip: Ipv6Addr) -> Record {
        self.record(name, RData::AAAA(AAAA(ip)))
    }

    fn srv_record(&self, name: Name, port: u16, target: Name) -> Record {
        self.record(name, RData::SRV(SRV::new(0, 0, port, target)))
    }

    fn record(&self, name: Name, rdata: RData) -> Record {
        let mut record = Record::from_rdata(name, self.ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        record
    }
}
