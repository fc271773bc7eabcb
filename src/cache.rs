//! The shared answer cache: TTL-bounded RR sets keyed by (name, type),
//! with per-record identity uniqueness and wholesale bucket replacement
//! on refresh.

use crate::error::IbexError;
use crate::message::ParsedResponse;
use crate::normalize_name;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Entries stay readable for their DNS TTL plus this margin, matching
/// the expiry the backing store would apply.
pub const CACHE_TTL_MARGIN: Duration = Duration::from_secs(60);

/// One cached RR in its presentation form. Typed rdata exists on
/// either side of the cache; only the string form crosses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    pub name: String,
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
    pub preference: Option<u16>,
}

impl CachedRecord {
    /// The identity of a record within its bucket: same identity, same
    /// record. Preference participates so two MX rows with different
    /// priorities coexist.
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

#[derive(Debug, Clone)]
struct CacheEntry {
    record: CachedRecord,
    expires_at: Instant,
}

type BucketKey = (String, String);

/// A shareable handle to the cache; `clone` hands out another view of
/// the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct AnswerCache {
    buckets: Arc<Mutex<BTreeMap<BucketKey, BTreeMap<String, CacheEntry>>>>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache misbehavior must never take resolution down with it, so a
    /// poisoned lock is logged and then shrugged off rather than
    /// propagated.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<BucketKey, BTreeMap<String, CacheEntry>>> {
        match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("{}", IbexError::CacheUnavailable);
                poisoned.into_inner()
            }
        }
    }

    fn bucket_key(name: &str, record_type: &str) -> BucketKey {
        (normalize_name(name), record_type.to_uppercase())
    }

    /// Live members of the (name, type) bucket. Dead entries are pruned
    /// on the way through.
    pub fn lookup(&self, name: &str, record_type: &str) -> Vec<CachedRecord> {
        self.lookup_at(name, record_type, Instant::now())
    }

    pub(crate) fn lookup_at(
        &self,
        name: &str,
        record_type: &str,
        now: Instant,
    ) -> Vec<CachedRecord> {
        let key = Self::bucket_key(name, record_type);
        let mut buckets = self.lock();
        let Some(bucket) = buckets.get_mut(&key) else {
            return vec![];
        };
        bucket.retain(|_, entry| entry.expires_at > now);
        let records = bucket.values().map(|entry| entry.record.clone()).collect();
        if bucket.is_empty() {
            buckets.remove(&key);
        }
        records
    }

    /// Union of the live members of every bucket for the name,
    /// regardless of type. Serves qtype=ANY.
    pub fn lookup_any(&self, name: &str) -> Vec<CachedRecord> {
        self.lookup_any_at(name, Instant::now())
    }

    pub(crate) fn lookup_any_at(&self, name: &str, now: Instant) -> Vec<CachedRecord> {
        let name = normalize_name(name);
        let mut buckets = self.lock();
        let mut records = vec![];
        let mut empties = vec![];
        for (key, bucket) in buckets.iter_mut() {
            if key.0 != name {
                continue;
            }
            bucket.retain(|_, entry| entry.expires_at > now);
            records.extend(bucket.values().map(|entry| entry.record.clone()));
            if bucket.is_empty() {
                empties.push(key.clone());
            }
        }
        for key in empties {
            buckets.remove(&key);
        }
        records
    }

    /// Store one record; a record with the same identity is replaced.
    pub fn insert(&self, record: CachedRecord) {
        self.insert_at(record, Instant::now());
    }

    pub(crate) fn insert_at(&self, record: CachedRecord, now: Instant) {
        let key = Self::bucket_key(&record.name, &record.record_type);
        let expires_at = now + Duration::from_secs(record.ttl as u64) + CACHE_TTL_MARGIN;
        let mut buckets = self.lock();
        buckets
            .entry(key)
            .or_default()
            .insert(record.identity(), CacheEntry { record, expires_at });
    }

    /// Drop the whole (name, type) bucket.
    pub fn delete(&self, name: &str, record_type: &str) {
        self.lock().remove(&Self::bucket_key(name, record_type));
    }

    /// Write-through for a fresh upstream response. Every (name, type)
    /// bucket touched by the response is replaced wholesale, so a reader
    /// racing this sees the old set or the new set, never a mix of TTL
    /// generations. All answer RRs are cached under their own owner and
    /// type, CNAME chain members included. Error responses aren't cached.
    pub fn cache_response(&self, response: &ParsedResponse) {
        self.cache_response_at(response, Instant::now());
    }

    pub(crate) fn cache_response_at(&self, response: &ParsedResponse, now: Instant) {
        if response.rcode != 0 {
            return;
        }

        let mut records = vec![];
        for answer in &response.answers {
            let Some(value) = &answer.data else {
                continue;
            };
            let mut value = value.clone();
            let mut preference = None;
            // MX rdata arrives as "<pref> <exchange>"; split it apart
            // here. A pref that isn't numeric degrades to no preference.
            if answer.rrtype == crate::enums::RecordType::MX {
                if let Some((left, right)) = value.split_once(' ') {
                    if let Ok(parsed) = left.parse::<u16>() {
                        preference = Some(parsed);
                        value = right.to_string();
                    }
                }
            }
            records.push(CachedRecord {
                name: normalize_name(&answer.name),
                record_type: answer.rrtype.to_string(),
                value,
                ttl: answer.ttl,
                preference,
            });
        }

        let mut buckets = self.lock();
        for record in &records {
            buckets.remove(&Self::bucket_key(&record.name, &record.record_type));
        }
        for record in records {
            let key = Self::bucket_key(&record.name, &record.record_type);
            let expires_at = now + Duration::from_secs(record.ttl as u64) + CACHE_TTL_MARGIN;
            trace!("caching {} {} {}", record.name, record.record_type, record.value);
            buckets
                .entry(key)
                .or_default()
                .insert(record.identity(), CacheEntry { record, expires_at });
        }
    }
}
