//! Hickory request handler answering service and instance queries.

use async_trait::async_trait;
use hickory_proto::op::{Header, OpCode, Query, ResponseCode};
use hickory_proto::rr::{LowerName, Name, Record};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::config::DnsConfig;
use crate::discovery::Discovery;
use crate::error::{DnsError, QueryError};
use crate::gateway::CatalogGateway;
use crate::metrics::{self, QueryResult, Timer};
use crate::query;
use crate::records::{RecordSynthesizer, SynthesizedRecords};

/// Outcome of processing all questions of one request.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Response code for the whole reply.
    pub response_code: ResponseCode,
    /// Synthesized answer records.
    pub answers: Vec<Record>,
    /// Synthesized additional records.
    pub additionals: Vec<Record>,
}

impl Resolution {
    fn new() -> Self {
        Self {
            response_code: ResponseCode::NoError,
            answers: Vec::new(),
            additionals: Vec::new(),
        }
    }
}

/// Answers A, AAAA and SRV questions for one domain from the service catalog.
#[derive(Clone)]
pub struct ServiceDnsHandler {
    origin: LowerName,
    domain: Name,
    gateway: CatalogGateway,
    synthesizer: RecordSynthesizer,
    shuffle_seed: Option<u64>,
}

impl ServiceDnsHandler {
    /// Create a handler for `config.domain`, normalized to its FQDN form.
    pub fn new(config: &DnsConfig, discovery: Arc<dyn Discovery>) -> Result<Self, DnsError> {
        let mut origin = Name::from_ascii(&config.domain)?;
        origin.set_fqdn(true);

        Ok(Self {
            domain: origin.clone(),
            synthesizer: RecordSynthesizer::new(origin.clone(), config.ttl),
            origin: origin.into(),
            gateway: CatalogGateway::new(discovery),
            shuffle_seed: config.shuffle_seed,
        })
    }

    /// Served domain.
    pub fn origin(&self) -> &LowerName {
        &self.origin
    }

    /// Random source for one request.
    fn rng(&self) -> fastrand::Rng {
        match self.shuffle_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }

    /// Process questions in order, stopping at the first one that fails.
    pub async fn resolve(&self, queries: &[Query], rng: &mut fastrand::Rng) -> Resolution {
        let mut resolution = Resolution::new();

        for (i, query) in queries.iter().enumerate() {
            let timer = Timer::start();
            let rtype_str = query.query_type().to_string();

            match self.answer(query).await {
                Ok(mut records) if !records.answers.is_empty() => {
                    records.shuffle(rng);
                    debug!(
                        name = %query.name(),
                        rtype = %rtype_str,
                        answers = records.answers.len(),
                        additionals = records.additionals.len(),
                        "answering question"
                    );
                    metrics::record_answers_returned(records.answers.len());
                    metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                    resolution.answers.append(&mut records.answers);
                    resolution.additionals.append(&mut records.additionals);
                    resolution.response_code = ResponseCode::NoError;
                }
                Ok(_) => {
                    debug!(name = %query.name(), rtype = %rtype_str, "no records for question");
                    metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
                    resolution.response_code = ResponseCode::NXDomain;
                }
                Err(e) => {
                    let code = e.response_code();
                    if code == ResponseCode::ServFail {
                        error!(error = %e, question = i, name = %query.name(), "Error handling DNS question");
                    } else {
                        debug!(error = %e, question = i, name = %query.name(), "Rejected DNS question");
                    }
                    metrics::record_query(&rtype_str, QueryResult::from(code), timer.elapsed());
                    resolution.response_code = code;
                    break;
                }
            }
        }

        resolution
    }

    /// Parse, resolve and synthesize a single question.
    async fn answer(&self, query: &Query) -> Result<SynthesizedRecords, QueryError> {
        let name = query.name();
        if !self.origin.zone_of(&LowerName::from(name)) {
            return Err(QueryError::OutOfZone(name.to_string()));
        }

        query::check_question(query.query_class(), query.query_type())?;

        let key = query::parse_lookup_key(name, query.query_type(), &self.domain)?;
        trace!(name = %name, ?key, "parsed lookup key");

        let instances = self.gateway.resolve(&key).await?;
        Ok(self
            .synthesizer
            .synthesize(name, query.query_type(), &instances))
    }
}

#[async_trait]
impl RequestHandler for ServiceDnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_recursion_available(false);

        trace!(
            id = request.header().id(),
            src = %request.src(),
            questions = request.queries().len(),
            "DNS request"
        );

        let op_code = request.header().op_code();
        let resolution = if op_code == OpCode::Query {
            let queries: Vec<Query> = request
                .queries()
                .iter()
                .map(|q| q.original().clone())
                .collect();
            let mut rng = self.rng();
            self.resolve(&queries, &mut rng).await
        } else {
            debug!(?op_code, "unsupported op code");
            Resolution {
                response_code: ResponseCode::NotImp,
                ..Resolution::new()
            }
        };

        header.set_response_code(resolution.response_code);

        let mut additionals: Vec<Record> = request.additionals().to_vec();
        additionals.extend(resolution.additionals);

        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            resolution.answers.iter(),
            &[],
            &[],
            additionals.iter(),
        );

        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "Error writing DNS response");
                header.into()
            }
        }
    }
}
