//! The lookup state machine. Every transport funnels into
//! [Resolver::resolve] (wire form) or [Resolver::resolve_json]: local
//! records and the cache first, then the upstreams, then NXDOMAIN.

use crate::cache::{AnswerCache, CachedRecord};
use crate::datastore::{Command, StoredRecord};
use crate::enums::{Rcode, RecordClass, RecordType};
use crate::error::IbexError;
use crate::forwarding;
use crate::message::{build_query, parse_response};
use crate::normalize_name;
use crate::querylog::{Outcome, QueryLog, Source, Transport};
use crate::reply::{reply_nxdomain, reply_refused, Reply};
use crate::resourcerecord::AnswerRecord;
use crate::{Header, Question};
use serde::Serialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, instrument, trace, warn};

/// How long a record store round-trip may take before the resolver
/// carries on without manual records.
const STORE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize)]
pub struct JsonQuestion {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
}

#[derive(Debug, Serialize)]
pub struct JsonRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// The `application/dns-json` response body.
#[derive(Debug, Serialize)]
pub struct JsonResponse {
    #[serde(rename = "Status")]
    pub status: u32,
    #[serde(rename = "Question")]
    pub question: Vec<JsonQuestion>,
    #[serde(rename = "Answer")]
    pub answer: Vec<JsonRecord>,
}

/// One candidate answer, whichever side of the store it came from.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    record_type: String,
    value: String,
    ttl: u32,
    preference: Option<u16>,
}

impl Candidate {
    fn identity(&self) -> String {
        let mut key = format!(
            "{}:{}:{}",
            normalize_name(&self.name),
            self.record_type.to_uppercase(),
            self.value.to_lowercase()
        );
        if let Some(preference) = self.preference {
            key.push(':');
            key.push_str(&preference.to_string());
        }
        key
    }
}

impl From<CachedRecord> for Candidate {
    fn from(record: CachedRecord) -> Self {
        Candidate {
            name: record.name,
            record_type: record.record_type,
            value: record.value,
            ttl: record.ttl,
            preference: record.preference,
        }
    }
}

impl From<StoredRecord> for Candidate {
    fn from(record: StoredRecord) -> Self {
        Candidate {
            name: record.name,
            record_type: record.record_type,
            value: record.value,
            ttl: record.ttl.max(0) as u32,
            preference: record.preference.map(|preference| preference as u16),
        }
    }
}

#[derive(Clone)]
pub struct Resolver {
    cache: AnswerCache,
    store: mpsc::Sender<Command>,
    upstreams: Vec<(String, u16)>,
    qlog: QueryLog,
}

impl Resolver {
    pub fn new(
        cache: AnswerCache,
        store: mpsc::Sender<Command>,
        upstreams: Vec<(String, u16)>,
        qlog: QueryLog,
    ) -> Self {
        Resolver {
            cache,
            store,
            upstreams,
            qlog,
        }
    }

    /// Answer a wire-format query. The returned bytes always carry the
    /// client's transaction id, whether they were composed here or
    /// passed through from an upstream.
    #[instrument(level = "debug", skip_all, fields(transport = %transport))]
    pub async fn resolve(
        &self,
        data: &[u8],
        client_ip: Option<IpAddr>,
        transport: Transport,
    ) -> Result<Vec<u8>, IbexError> {
        let header = Header::from_wire(data)?;
        trace!("parsed {header}");
        let id = header.id;
        let question = Question::from_wire(data)?;
        let question_section = question.section_bytes(data);

        if question.qclass != RecordClass::Internet {
            debug!("refusing non-Internet class question: {question}");
            return reply_refused(id, question_section).as_bytes();
        }

        let qname = question.normalized_name();
        let qtype = question.qtype;

        // unknown types can only be answered by an upstream
        let candidates = if qtype.supported() {
            self.gather_local(&qname, qtype).await
        } else {
            vec![]
        };

        if !candidates.is_empty() {
            let answers: Vec<AnswerRecord> = candidates
                .iter()
                .filter_map(|candidate| {
                    AnswerRecord::from_strings(
                        &candidate.record_type,
                        &candidate.value,
                        candidate.ttl,
                        candidate.preference,
                    )
                    .ok()
                })
                .collect();
            let answer_count = answers.len();
            let bytes = Reply::new(id, question_section, answers, Rcode::NoError).as_bytes()?;
            self.qlog.record(
                &qname,
                qtype,
                transport,
                Outcome::Success,
                answer_count,
                Source::Cached,
                client_ip,
            );
            return Ok(bytes);
        }

        if let Ok(response) = forwarding::forward(&self.upstreams, data).await {
            let answer_count = self.ingest_upstream(&response);
            self.qlog.record(
                &qname,
                qtype,
                transport,
                Outcome::Success,
                answer_count,
                Source::Upstream,
                client_ip,
            );
            return Ok(response);
        }

        let bytes = reply_nxdomain(id, question_section).as_bytes()?;
        self.qlog.record(
            &qname,
            qtype,
            transport,
            Outcome::NxDomain,
            0,
            Source::Upstream,
            client_ip,
        );
        Ok(bytes)
    }

    /// Answer a DoH JSON question. Infallible by construction: anything
    /// that can't be resolved comes back as Status 3.
    #[instrument(level = "debug", skip_all, fields(name = %name, rrtype = %rrtype))]
    pub async fn resolve_json(
        &self,
        name: &str,
        rrtype: RecordType,
        client_ip: Option<IpAddr>,
    ) -> JsonResponse {
        let qname = normalize_name(name);
        let question = vec![JsonQuestion {
            name: qname.clone(),
            record_type: rrtype.to_string(),
        }];

        let candidates = self.gather_local(&qname, rrtype).await;
        if !candidates.is_empty() {
            let answer: Vec<JsonRecord> = candidates
                .into_iter()
                .map(|candidate| JsonRecord {
                    name: candidate.name,
                    record_type: candidate.record_type,
                    ttl: candidate.ttl,
                    data: Some(candidate.value),
                })
                .collect();
            self.qlog.record(
                &qname,
                rrtype,
                Transport::DohJson,
                Outcome::Success,
                answer.len(),
                Source::Cached,
                client_ip,
            );
            return JsonResponse {
                status: 0,
                question,
                answer,
            };
        }

        if let Ok(query) = build_query(rand::random::<u16>(), &qname, rrtype) {
            if let Ok(response) = forwarding::forward(&self.upstreams, &query).await {
                if let Ok(parsed) = parse_response(&response) {
                    let cache = self.cache.clone();
                    let for_cache = parsed.clone();
                    tokio::spawn(async move { cache.cache_response(&for_cache) });
                    let answer: Vec<JsonRecord> = parsed
                        .answers
                        .into_iter()
                        .map(|answer| JsonRecord {
                            name: answer.name,
                            record_type: answer.rrtype.to_string(),
                            ttl: answer.ttl,
                            data: answer.data,
                        })
                        .collect();
                    self.qlog.record(
                        &qname,
                        rrtype,
                        Transport::DohJson,
                        Outcome::Success,
                        answer.len(),
                        Source::Upstream,
                        client_ip,
                    );
                    return JsonResponse {
                        status: parsed.rcode as u32,
                        question,
                        answer,
                    };
                }
            }
        }

        self.qlog.record(
            &qname,
            rrtype,
            Transport::DohJson,
            Outcome::NxDomain,
            0,
            Source::Upstream,
            client_ip,
        );
        JsonResponse {
            status: 3,
            question,
            answer: vec![],
        }
    }

    /// Cache-then-manual gathering, de-duplicated by record identity in
    /// favor of the manual copy.
    async fn gather_local(&self, qname: &str, qtype: RecordType) -> Vec<Candidate> {
        let cached: Vec<Candidate> = match qtype {
            RecordType::ANY => self.cache.lookup_any(qname),
            other => self.cache.lookup(qname, &other.to_string()),
        }
        .into_iter()
        .map(Candidate::from)
        .collect();

        let manual: Vec<Candidate> = self
            .manual_records(qname, qtype)
            .await
            .into_iter()
            .map(Candidate::from)
            .collect();

        let manual_identities: HashSet<String> = manual
            .iter()
            .map(|candidate| candidate.identity())
            .collect();

        let mut answers: Vec<Candidate> = cached
            .into_iter()
            .filter(|candidate| !manual_identities.contains(&candidate.identity()))
            .collect();
        answers.extend(manual);
        answers
    }

    /// Manual records from the store, with a short timeout so a wedged
    /// store degrades to forward-only resolution instead of stalling.
    async fn manual_records(&self, qname: &str, qtype: RecordType) -> Vec<StoredRecord> {
        let (tx_oneshot, rx_oneshot) = oneshot::channel();
        let command = match qtype {
            RecordType::ANY => Command::LookupAny {
                name: qname.to_string(),
                resp: tx_oneshot,
            },
            other => Command::Lookup {
                name: qname.to_string(),
                record_type: other.to_string(),
                resp: tx_oneshot,
            },
        };
        if let Err(err) = self.store.send(command).await {
            warn!("record store unreachable: {err}");
            return vec![];
        }
        match timeout(STORE_TIMEOUT, rx_oneshot).await {
            Ok(Ok(records)) => records,
            Ok(Err(_)) | Err(_) => {
                warn!("record store did not answer in time for {qname}");
                vec![]
            }
        }
    }

    /// Kick off the cache write-through for an upstream response and
    /// report how many answers it carried. The write happens on its own
    /// task: a client hanging up must not cancel cache population.
    fn ingest_upstream(&self, response: &[u8]) -> usize {
        match parse_response(response) {
            Ok(parsed) => {
                let answer_count = parsed.answers.len();
                let cache = self.cache.clone();
                tokio::spawn(async move { cache.cache_response(&parsed) });
                answer_count
            }
            Err(err) => {
                debug!("upstream response did not parse for caching: {err}");
                0
            }
        }
    }
}
