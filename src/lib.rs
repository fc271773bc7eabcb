use crate::enums::{OpCode, PacketType, Rcode, RecordClass, RecordType};
use crate::error::IbexError;
use crate::message::{decode_name, encode_name};
use packed_struct::prelude::*;
use std::fmt::Display;

/// The in-memory answer cache shared between the transports.
pub mod cache;
/// Command-line interface definitions.
pub mod cli;
/// Configuration handling for the server.
pub mod config;
/// The storage backend for administrator-entered records.
pub mod datastore;
pub mod enums;
pub mod error;
/// Stub-forwarding of unanswered queries to the configured upstreams.
pub mod forwarding;
/// Wire-format message decoding, name compression included.
pub mod message;
/// The query log sink.
pub mod querylog;
pub mod reply;
/// The lookup state machine: local records, cache, then upstream.
pub mod resolver;
pub mod resourcerecord;
/// UDP and TCP listeners.
pub mod servers;
#[cfg(test)]
mod tests;
/// The HTTPS side of things: DoH and the management API.
pub mod web;

/// Internal limit of in-flight requests
pub const MAX_IN_FLIGHT: usize = 512;
/// The size of a DNS message header
pub const HEADER_BYTES: usize = 12;
/// The maximum size of a classic UDP DNS packet
pub const UDP_BUFFER_SIZE: usize = 512;
/// Longest a single label can be on the wire
pub const MAX_LABEL_LENGTH: usize = 63;
/// Longest a whole name can be on the wire
pub const MAX_NAME_LENGTH: usize = 255;

/// The header of a DNS transmission, either a Query or Reply. Ref [RFC1035](https://www.rfc-editor.org/rfc/rfc1035#section-4.1.1) section 4.1.1.
#[derive(Debug, PackedStruct, PartialEq, Eq, Clone)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "12")]
pub struct Header {
    /// The query ID
    #[packed_field(bits = "0..=15", endian = "msb")]
    pub id: u16,
    /// Is it a query or a response
    #[packed_field(bits = "16", ty = "enum")]
    pub qr: PacketType,
    #[packed_field(bits = "17..=20", ty = "enum")]
    pub opcode: OpCode,
    #[packed_field(bits = "21")]
    pub authoritative: bool,
    #[packed_field(bits = "22")]
    pub truncated: bool,
    /// RD - set in a query and copied into the response, asks the server to recurse
    #[packed_field(bits = "23")]
    pub recursion_desired: bool,
    #[packed_field(bits = "24")]
    pub recursion_available: bool,
    /// reserved, must be 0
    #[packed_field(bits = "25")]
    pub z: bool,
    #[packed_field(bits = "26")]
    pub ad: bool,
    #[packed_field(bits = "27")]
    pub cd: bool,
    #[packed_field(bits = "28..=31", ty = "enum")]
    pub rcode: Rcode,
    /// number of entries in the question section
    #[packed_field(bits = "32..=47", endian = "msb")]
    pub qdcount: u16,
    /// number of entries in the answer section
    #[packed_field(bits = "48..=63", endian = "msb")]
    pub ancount: u16,
    /// number of name server resource records in the authority section
    #[packed_field(bits = "64..=79", endian = "msb")]
    pub nscount: u16,
    /// number of resource records in the additional section
    #[packed_field(bits = "80..=95", endian = "msb")]
    pub arcount: u16,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            id: 0,
            qr: PacketType::Query,
            opcode: OpCode::Query,
            authoritative: false,
            truncated: false,
            recursion_desired: false,
            recursion_available: false,
            z: false,
            ad: false,
            cd: false,
            rcode: Rcode::NoError,
            qdcount: 0,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }
}

impl Header {
    /// Unpack the leading 12 octets of a message.
    pub fn from_wire(buf: &[u8]) -> Result<Self, IbexError> {
        if buf.len() < HEADER_BYTES {
            return Err(IbexError::MalformedMessage);
        }
        let mut header_bytes: [u8; HEADER_BYTES] = [0; HEADER_BYTES];
        header_bytes.copy_from_slice(&buf[0..HEADER_BYTES]);
        Header::unpack(&header_bytes).map_err(|_| IbexError::MalformedMessage)
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "id={} qr={:?} opcode={:?} rcode={:?} qdcount={} ancount={}",
            self.id, self.qr, self.opcode, self.rcode, self.qdcount, self.ancount
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A DNS Question section, from Ref [RFC1035](https://www.rfc-editor.org/rfc/rfc1035#section-4.1.2) section 4.1.2 "Question section format".
pub struct Question {
    /// The name which is being queried, dotted form with the trailing dot
    pub qname: String,
    /// The record type being requested, eg A, NS, MX, TXT etc.
    pub qtype: RecordType,
    /// The class, typically IN for "Internet"
    pub qclass: RecordClass,
    /// Where the question section ends in the original message
    end_offset: usize,
}

impl Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "QNAME={} QTYPE={} QCLASS={}",
            self.qname, self.qtype, self.qclass
        ))
    }
}

impl Question {
    /// Parse the question section out of a whole message, starting just past the header.
    pub fn from_wire(buf: &[u8]) -> Result<Self, IbexError> {
        let (qname, offset) = decode_name(buf, HEADER_BYTES)?;
        if buf.len() < offset + 4 {
            return Err(IbexError::MalformedMessage);
        }
        let qtype = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        let qclass = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]);
        Ok(Question {
            qname,
            qtype: RecordType::from_code(qtype),
            qclass: RecordClass::from(&qclass),
            end_offset: offset + 4,
        })
    }

    /// Lowercased, trailing-dot form used for store and cache keys.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.qname)
    }

    /// The raw question section bytes, for echoing back in a reply.
    pub fn section_bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[HEADER_BYTES..self.end_offset]
    }

    /// Turn a question back into wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IbexError> {
        let mut retval = encode_name(&self.qname)?;
        retval.extend((self.qtype.code()).to_be_bytes());
        retval.extend((self.qclass as u16).to_be_bytes());
        Ok(retval)
    }
}

/// Canonical form for names: lowercase, trailing dot.
pub fn normalize_name(name: &str) -> String {
    let mut name = name.trim().to_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}
