//! Metrics instrumentation for registry-dns.
//!
//! All metrics are prefixed with `registry_dns.`

use hickory_proto::op::ResponseCode;
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

use crate::records::EndpointError;

/// Record an answered DNS question.
pub fn record_query(record_type: &str, result: QueryResult, duration: Duration) {
    counter!("registry_dns.query.count", "type" => record_type.to_string(), "result" => result.as_str())
        .increment(1);
    histogram!("registry_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Question answered with at least one record.
    Success,
    /// Name error, including zero matching instances.
    NxDomain,
    /// Malformed question.
    FormatError,
    /// Unsupported question or backend failure.
    ServerFailure,
    /// Name outside the served domain.
    Refused,
    /// Anything else.
    Other,
}

impl QueryResult {
    fn as_str(&self) -> &'static str {
        match self {
            QueryResult::Success => "success",
            QueryResult::NxDomain => "nxdomain",
            QueryResult::FormatError => "formerr",
            QueryResult::ServerFailure => "servfail",
            QueryResult::Refused => "refused",
            QueryResult::Other => "other",
        }
    }
}

impl From<ResponseCode> for QueryResult {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::NoError => QueryResult::Success,
            ResponseCode::NXDomain => QueryResult::NxDomain,
            ResponseCode::FormErr => QueryResult::FormatError,
            ResponseCode::ServFail => QueryResult::ServerFailure,
            ResponseCode::Refused => QueryResult::Refused,
            _ => QueryResult::Other,
        }
    }
}

/// Why an instance was left out of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Endpoint type outside tcp/udp/http/https.
    UnsupportedType,
    /// Host or port could not be parsed.
    InvalidAddress,
    /// Instance ID is not a valid DNS label.
    InvalidTarget,
}

impl From<&EndpointError> for SkipReason {
    fn from(err: &EndpointError) -> Self {
        match err {
            EndpointError::UnsupportedType(_) => SkipReason::UnsupportedType,
            EndpointError::InvalidAddress(_) | EndpointError::InvalidPort(_) => {
                SkipReason::InvalidAddress
            }
        }
    }
}

/// Record an instance skipped during record synthesis.
pub fn record_instance_skipped(reason: SkipReason) {
    let reason_str = match reason {
        SkipReason::UnsupportedType => "unsupported_type",
        SkipReason::InvalidAddress => "invalid_address",
        SkipReason::InvalidTarget => "invalid_target",
    };

    counter!("registry_dns.instance.skipped.count", "reason" => reason_str).increment(1);
}

/// Record a failed discovery lookup.
pub fn record_discovery_error() {
    counter!("registry_dns.discovery.error.count").increment(1);
}

/// Record answer records returned for a question.
pub fn record_answers_returned(count: usize) {
    histogram!("registry_dns.query.answers_returned").record(count as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_from_response_code() {
        assert_eq!(QueryResult::from(ResponseCode::NoError), QueryResult::Success);
        assert_eq!(QueryResult::from(ResponseCode::NXDomain), QueryResult::NxDomain);
        assert_eq!(QueryResult::from(ResponseCode::FormErr), QueryResult::FormatError);
        assert_eq!(QueryResult::from(ResponseCode::ServFail), QueryResult::ServerFailure);
        assert_eq!(QueryResult::from(ResponseCode::NotImp), QueryResult::Other);
    }

    #[test]
    fn test_skip_reason_from_endpoint_error() {
        assert_eq!(
            SkipReason::from(&EndpointError::InvalidPort("x".into())),
            SkipReason::InvalidAddress
        );
        assert_eq!(
            SkipReason::from(&EndpointError::UnsupportedType("grpc".into())),
            SkipReason::UnsupportedType
        );
    }
}
