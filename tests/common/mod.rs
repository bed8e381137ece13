//! Shared test infrastructure for DNS integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::SRV;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use registry_dns::{
    DnsConfig, InMemoryCatalog, InstanceRegistration, ServiceDnsHandler, ServiceEndpoint,
};

// --- Constants ---

pub const DOMAIN: &str = "example.com";

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and
/// stored as raw wire-format bytes, which can then be parsed with
/// `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(io::Error::other)?;
        Ok(info)
    }
}

// --- Catalog fixtures ---

pub fn registration(service: &str, kind: &str, value: &str, tags: &[&str]) -> InstanceRegistration {
    InstanceRegistration {
        service_name: service.to_string(),
        service_address: None,
        endpoint: ServiceEndpoint::new(kind, value),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Catalog with two `reviews` instances and one IPv6 `ratings` instance.
pub fn reviews_catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_registrations([
        registration("reviews", "http", "192.168.1.10:9080", &["v1"]),
        registration("reviews", "tcp", "192.168.1.11:9090", &["v2"]),
        registration("ratings", "tcp", "[fd00::5]:7000", &[]),
    ])
}

/// ID the catalog derives for the `reviews` http instance.
pub fn reviews_http_id() -> String {
    registration("reviews", "http", "192.168.1.10:9080", &["v1"]).instance_id()
}

// --- Config/handler builders ---

pub fn test_dns_config() -> DnsConfig {
    DnsConfig::new(0, DOMAIN)
}

pub fn build_handler(config: DnsConfig, catalog: InMemoryCatalog) -> ServiceDnsHandler {
    ServiceDnsHandler::new(&config, Arc::new(catalog)).expect("failed to create handler")
}

// --- Query/Request construction ---

pub fn question(name: &str, record_type: RecordType) -> Query {
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    query
}

/// Build a query message carrying `queries`.
pub fn build_message(queries: Vec<Query>, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    for query in queries {
        msg.add_query(query);
    }
    msg
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` from a message.
pub fn build_request(msg: &Message) -> Request {
    let bytes = msg.to_vec().unwrap();
    let src: SocketAddr = "10.0.0.1:12345".parse().unwrap();
    Request::new(parse_message_request(&bytes), src, Protocol::Udp)
}

// --- Response helpers ---

/// Run a message through the handler and return the parsed response.
pub async fn execute_message(handler: &ServiceDnsHandler, msg: &Message) -> Message {
    let request = build_request(msg);
    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    response.into_message()
}

/// Execute a single question and return the parsed response.
pub async fn execute_query(
    handler: &ServiceDnsHandler,
    name: &str,
    record_type: RecordType,
) -> Message {
    execute_message(handler, &build_message(vec![question(name, record_type)], 1)).await
}

pub fn extract_a_ips(records: &[Record]) -> Vec<Ipv4Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

pub fn extract_aaaa_ips(records: &[Record]) -> Vec<Ipv6Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::AAAA(aaaa) => Some(Ipv6Addr::from(*aaaa)),
            _ => None,
        })
        .collect()
}

pub fn extract_srv(records: &[Record]) -> Vec<SRV> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::SRV(srv) => Some(srv.clone()),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}
