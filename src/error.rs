//! Error types for registry-dns.

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{DNSClass, RecordType};
use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::query::Protocol;

/// Errors that can occur while building or running the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (socket bind, send, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Discovery client construction error
    #[error("Discovery client error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),
}

/// Failure to answer a single DNS question.
///
/// Each variant maps onto the response code written for the whole reply, see
/// [`QueryError::response_code`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// The question name is not a valid domain name.
    #[error("invalid domain name: {0}")]
    InvalidName(String),

    /// Only the `IN` class is served.
    #[error("unsupported DNS question class: {0}")]
    UnsupportedClass(DNSClass),

    /// Only `A`, `AAAA` and `SRV` questions are served.
    #[error("unsupported DNS question type: {0}")]
    UnsupportedType(RecordType),

    /// Instance queries only answer address questions.
    #[error("instance queries do not support {0} questions")]
    UnsupportedInstanceType(RecordType),

    /// The name is outside the served domain.
    #[error("name {0} is outside the served domain")]
    OutOfZone(String),

    /// The name matches neither the service nor the instance grammar.
    #[error("name {0} matches no service or instance query")]
    NoSuchName(String),

    /// More than one protocol token in a service query.
    #[error("more than one protocol specified: {first} and {second}")]
    MultipleProtocols {
        /// Protocol seen first.
        first: Protocol,
        /// The conflicting protocol.
        second: Protocol,
    },

    /// No instance in the catalog carries the requested ID.
    #[error("no instance with id {0}")]
    InstanceNotFound(String),

    /// The discovery backend failed.
    #[error("discovery lookup failed: {0}")]
    Discovery(#[from] DiscoveryError),
}

impl QueryError {
    /// Response code reported to the client for this failure.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            QueryError::InvalidName(_)
            | QueryError::UnsupportedClass(_)
            | QueryError::MultipleProtocols { .. } => ResponseCode::FormErr,
            QueryError::UnsupportedType(_)
            | QueryError::UnsupportedInstanceType(_)
            | QueryError::Discovery(_) => ResponseCode::ServFail,
            QueryError::NoSuchName(_) | QueryError::InstanceNotFound(_) => ResponseCode::NXDomain,
            QueryError::OutOfZone(_) => ResponseCode::Refused,
        }
    }
}
