//! Byte-level decoding of whole DNS messages, compression pointers
//! included. Nothing in here does I/O.

use crate::enums::{OpCode, PacketType, RecordType};
use crate::error::IbexError;
use crate::{Header, HEADER_BYTES, MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use packed_struct::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr};

/// How many compression pointers we'll chase before declaring a loop.
const MAX_POINTER_HOPS: usize = 128;

/// Decode a name starting at `start`, following 14-bit compression
/// pointers. Returns the dotted, trailing-dot form and the offset just
/// past the name in the original stream. When a pointer was followed,
/// the returned offset is just past the two pointer octets, not past
/// the pointer target.
///
/// Decompression is bounded: more than `MAX_POINTER_HOPS` hops or more
/// than 255 octets of labels is a malformed message, so no input causes
/// unbounded work.
pub fn decode_name(data: &[u8], start: usize) -> Result<(String, usize), IbexError> {
    let mut labels: Vec<Vec<u8>> = vec![];
    let mut cursor = start;
    // set when the first pointer is followed
    let mut return_to: Option<usize> = None;
    let mut hops = 0usize;
    let mut consumed = 0usize;

    loop {
        let len_byte = *data.get(cursor).ok_or(IbexError::MalformedMessage)?;
        if len_byte == 0 {
            cursor += 1;
            break;
        }
        if len_byte & 0xC0 == 0xC0 {
            let low = *data.get(cursor + 1).ok_or(IbexError::MalformedMessage)?;
            let target = (((len_byte & 0x3F) as usize) << 8) | low as usize;
            if return_to.is_none() {
                return_to = Some(cursor + 2);
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(IbexError::MalformedMessage);
            }
            cursor = target;
            continue;
        }
        let label_len = len_byte as usize;
        if label_len > MAX_LABEL_LENGTH {
            return Err(IbexError::MalformedMessage);
        }
        let label_end = cursor + 1 + label_len;
        if label_end > data.len() {
            return Err(IbexError::MalformedMessage);
        }
        consumed += label_len + 1;
        if consumed > MAX_NAME_LENGTH {
            return Err(IbexError::MalformedMessage);
        }
        labels.push(data[cursor + 1..label_end].to_vec());
        cursor = label_end;
    }

    let mut name = String::new();
    for label in &labels {
        let text = std::str::from_utf8(label).map_err(|_| IbexError::MalformedMessage)?;
        name.push_str(text);
        name.push('.');
    }
    if labels.is_empty() {
        name.push('.');
    }
    Ok((name, return_to.unwrap_or(cursor)))
}

/// Encode a dotted name into label-length wire form. Never emits
/// compression pointers.
pub fn encode_name(name: &str) -> Result<Vec<u8>, IbexError> {
    let mut out: Vec<u8> = Vec::with_capacity(name.len() + 2);
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        let bytes = label.as_bytes();
        if bytes.len() > MAX_LABEL_LENGTH {
            return Err(IbexError::InvalidName(format!(
                "label longer than {MAX_LABEL_LENGTH} octets in {name}"
            )));
        }
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    if out.len() > MAX_NAME_LENGTH {
        return Err(IbexError::InvalidName(format!(
            "name longer than {MAX_NAME_LENGTH} octets: {name}"
        )));
    }
    Ok(out)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, IbexError> {
    if data.len() < offset + 2 {
        return Err(IbexError::MalformedMessage);
    }
    Ok(u16::from_be_bytes([data[offset], data[offset + 1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, IbexError> {
    if data.len() < offset + 4 {
        return Err(IbexError::MalformedMessage);
    }
    Ok(u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub name: String,
    pub qtype: RecordType,
}

/// One answer RR as pulled off the wire. `data` is the presentation
/// form used for the JSON transport and the cache; types we can't
/// present stay `None` and are never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnswer {
    pub name: String,
    pub rrtype: RecordType,
    pub ttl: u32,
    pub data: Option<String>,
}

/// The parts of an upstream response the resolver cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub id: u16,
    pub rcode: u8,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub questions: Vec<ParsedQuestion>,
    pub answers: Vec<ParsedAnswer>,
}

/// Parse a whole response message: header, questions, then the answer
/// section. Authority and additional sections are left unread - the
/// resolver returns upstream bytes verbatim, so nothing downstream
/// needs them.
pub fn parse_response(data: &[u8]) -> Result<ParsedResponse, IbexError> {
    if data.len() < HEADER_BYTES {
        return Err(IbexError::MalformedMessage);
    }
    let id = read_u16(data, 0)?;
    let flags = read_u16(data, 2)?;
    let qdcount = read_u16(data, 4)?;
    let ancount = read_u16(data, 6)?;

    let mut offset = HEADER_BYTES;
    let mut questions = Vec::with_capacity(qdcount as usize);
    for _ in 0..qdcount {
        let (name, after_name) = decode_name(data, offset)?;
        let qtype = read_u16(data, after_name)?;
        offset = after_name + 4;
        questions.push(ParsedQuestion {
            name,
            qtype: RecordType::from_code(qtype),
        });
    }

    let mut answers = Vec::with_capacity(ancount as usize);
    for _ in 0..ancount {
        let (name, after_name) = decode_name(data, offset)?;
        let atype = read_u16(data, after_name)?;
        let ttl = read_u32(data, after_name + 4)?;
        let rdlength = read_u16(data, after_name + 8)? as usize;
        let rdata_start = after_name + 10;
        if data.len() < rdata_start + rdlength {
            return Err(IbexError::MalformedMessage);
        }
        let rdata = &data[rdata_start..rdata_start + rdlength];
        offset = rdata_start + rdlength;

        let rrtype = RecordType::from_code(atype);
        let value = match rrtype {
            RecordType::A if rdlength == 4 => {
                Some(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]).to_string())
            }
            RecordType::AAAA if rdlength == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(rdata);
                Some(Ipv6Addr::from(octets).to_string())
            }
            RecordType::NS | RecordType::CNAME | RecordType::PTR => {
                // names in rdata may point back into the message
                Some(decode_name(data, rdata_start)?.0)
            }
            RecordType::MX if rdlength >= 3 => {
                let preference = read_u16(data, rdata_start)?;
                let (exchange, _) = decode_name(data, rdata_start + 2)?;
                Some(format!("{preference} {exchange}"))
            }
            RecordType::TXT if rdlength >= 1 => {
                let text_len = rdata[0] as usize;
                let end = (1 + text_len).min(rdata.len());
                Some(String::from_utf8_lossy(&rdata[1..end]).to_string())
            }
            _ => None,
        };
        answers.push(ParsedAnswer {
            name,
            rrtype,
            ttl,
            data: value,
        });
    }

    Ok(ParsedResponse {
        id,
        rcode: (flags & 0x000F) as u8,
        truncated: (flags >> 9) & 1 == 1,
        recursion_desired: (flags >> 8) & 1 == 1,
        recursion_available: (flags >> 7) & 1 == 1,
        questions,
        answers,
    })
}

/// Compose a fresh recursive query for the given name and type, used by
/// the JSON transport where there are no client bytes to pass through.
pub fn build_query(id: u16, name: &str, qtype: RecordType) -> Result<Vec<u8>, IbexError> {
    let header = Header {
        id,
        qr: PacketType::Query,
        opcode: OpCode::Query,
        recursion_desired: true,
        qdcount: 1,
        ..Default::default()
    };
    let mut out = header.pack()?.to_vec();
    out.extend(encode_name(name)?);
    out.extend(qtype.code().to_be_bytes());
    out.extend(1u16.to_be_bytes());
    Ok(out)
}
