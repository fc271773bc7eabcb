use crate::enums::RecordType;
use crate::error::IbexError;
use crate::message::encode_name;
use std::net::{Ipv4Addr, Ipv6Addr};

/// `<character-string>`: a single length octet followed by that many
/// characters, capped at 255 of them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DNSCharString {
    pub data: Vec<u8>,
}

impl From<&str> for DNSCharString {
    fn from(input: &str) -> Self {
        let mut data: Vec<u8> = input.as_bytes().to_vec();
        data.truncate(255);
        DNSCharString { data }
    }
}

impl DNSCharString {
    fn as_bytes(&self) -> Vec<u8> {
        let mut res: Vec<u8> = vec![self.data.len() as u8];
        res.extend(&self.data);
        res
    }
}

/// Typed rdata, one variant per record type the engine composes
/// locally. Constructed at the codec boundary; the string forms used by
/// the cache and the store only exist outside this type.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RecordData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    /// CNAME, NS and PTR all carry a single name
    Name(String),
    MX {
        preference: u16,
        exchange: String,
    },
    TXT(DNSCharString),
}

impl RecordData {
    fn to_wire(&self) -> Result<Vec<u8>, IbexError> {
        match self {
            RecordData::A(address) => Ok(address.octets().to_vec()),
            RecordData::AAAA(address) => Ok(address.octets().to_vec()),
            RecordData::Name(name) => encode_name(name),
            RecordData::MX {
                preference,
                exchange,
            } => {
                let mut out = preference.to_be_bytes().to_vec();
                out.extend(encode_name(exchange)?);
                Ok(out)
            }
            RecordData::TXT(text) => Ok(text.as_bytes()),
        }
    }
}

/// An answer RR ready for the wire. The owner name is always emitted as
/// a compression pointer back to the question name at offset 12, so the
/// name itself isn't carried here.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AnswerRecord {
    pub rrtype: RecordType,
    pub ttl: u32,
    pub data: RecordData,
}

impl AnswerRecord {
    /// Build a stored or cached record into its typed form. The value
    /// strings come from the store and the cache, so a bad one is an
    /// invalid record, not a protocol error.
    pub fn from_strings(
        rrtype: &str,
        value: &str,
        ttl: u32,
        preference: Option<u16>,
    ) -> Result<Self, IbexError> {
        let rrtype = RecordType::from_name(rrtype)
            .ok_or_else(|| IbexError::invalid_record("record_type", format!("unknown record type {rrtype}")))?;
        let data = match rrtype {
            RecordType::A => RecordData::A(
                value
                    .parse::<Ipv4Addr>()
                    .map_err(|_| IbexError::invalid_record("value", "invalid IPv4 address for A record"))?,
            ),
            RecordType::AAAA => RecordData::AAAA(
                value
                    .parse::<Ipv6Addr>()
                    .map_err(|_| IbexError::invalid_record("value", "invalid IPv6 address for AAAA record"))?,
            ),
            RecordType::CNAME | RecordType::NS | RecordType::PTR => {
                RecordData::Name(value.to_string())
            }
            RecordType::MX => RecordData::MX {
                preference: preference.unwrap_or(0),
                exchange: value.to_string(),
            },
            RecordType::TXT => RecordData::TXT(DNSCharString::from(value)),
            RecordType::ANY | RecordType::Other(_) => {
                return Err(IbexError::invalid_record(
                    "record_type",
                    format!("{rrtype} records cannot be composed locally"),
                ))
            }
        };
        Ok(AnswerRecord { rrtype, ttl, data })
    }

    /// Wire bytes for this answer: pointer owner, type, class IN, TTL,
    /// RDLENGTH, then the rdata.
    pub fn wire_bytes(&self) -> Result<Vec<u8>, IbexError> {
        let mut retval: Vec<u8> = vec![0xC0, 0x0C];
        retval.extend(self.rrtype.code().to_be_bytes());
        retval.extend(1u16.to_be_bytes());
        retval.extend(self.ttl.to_be_bytes());
        let rdata = self.data.to_wire()?;
        retval.extend((rdata.len() as u16).to_be_bytes());
        retval.extend(rdata);
        Ok(retval)
    }
}
