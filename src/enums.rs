use packed_struct::prelude::*;
use std::fmt::Display;

#[derive(Debug, Eq, PartialEq, PrimitiveEnum_u8, Copy, Clone)]
/// A four bit field that specifies kind of query in this message.
/// This value is set by the originator of a query and copied into the response.
pub enum OpCode {
    /// A standard query (QUERY)
    Query = 0,
    /// An inverse query (IQUERY), obsolete per <https://www.rfc-editor.org/rfc/rfc3425>
    IQuery = 1,
    /// Server status request (STATUS)
    Status = 2,
    /// 3-15 reserved for future use
    Reserved = 15,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, Eq, PartialEq)]
/// Response code, things like NOERROR, SERVFAIL, NXDOMAIN etc.
pub enum Rcode {
    NoError = 0,
    /// Format error - the server was unable to interpret the query.
    FormatError = 1,
    /// Server failure - the server was unable to process this query.
    ServFail = 2,
    /// Name Error - the domain name referenced in the query does not exist.
    NameError = 3,
    /// The server does not support the requested kind of query.
    NotImplemented = 4,
    /// The server refuses to perform the specified operation for policy reasons.
    Refused = 5,
}

#[derive(Debug, PrimitiveEnum_u8, Clone, Copy, Eq, PartialEq)]
pub enum PacketType {
    Query = 0,
    Answer = 1,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// RRType, eg A, NS, MX etc. Codes the engine doesn't know are kept
/// as-is so upstream answers can pass through untouched.
pub enum RecordType {
    /// A host address
    A,
    /// Authoritative name server
    NS,
    /// The canonical name for an alias
    CNAME,
    /// A domain name pointer
    PTR,
    /// Mail exchange
    MX,
    /// Text strings
    TXT,
    /// IPv6 host address <https://www.rfc-editor.org/rfc/rfc3596#section-2.1>
    AAAA,
    /// A request for all records (*)
    ANY,
    /// Anything else, preserved as the numeric code
    Other(u16),
}

/// The types an administrator can store locally.
pub const STORABLE_TYPES: [RecordType; 7] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::MX,
    RecordType::NS,
    RecordType::PTR,
    RecordType::TXT,
];

impl RecordType {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            12 => Self::PTR,
            15 => Self::MX,
            16 => Self::TXT,
            28 => Self::AAAA,
            255 => Self::ANY,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::A => 1,
            Self::NS => 2,
            Self::CNAME => 5,
            Self::PTR => 12,
            Self::MX => 15,
            Self::TXT => 16,
            Self::AAAA => 28,
            Self::ANY => 255,
            Self::Other(code) => code,
        }
    }

    /// Look up a type by its presentation name. Only the recognized set
    /// parses; anything else is a caller problem.
    pub fn from_name(input: &str) -> Option<Self> {
        match input.to_uppercase().as_str() {
            "A" => Some(Self::A),
            "NS" => Some(Self::NS),
            "CNAME" => Some(Self::CNAME),
            "PTR" => Some(Self::PTR),
            "MX" => Some(Self::MX),
            "TXT" => Some(Self::TXT),
            "AAAA" => Some(Self::AAAA),
            "ANY" => Some(Self::ANY),
            _ => None,
        }
    }

    /// Whether the engine can answer this type from local data. Unknown
    /// types only ever travel the upstream passthrough path.
    pub fn supported(self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::NS => write!(f, "NS"),
            Self::CNAME => write!(f, "CNAME"),
            Self::PTR => write!(f, "PTR"),
            Self::MX => write!(f, "MX"),
            Self::TXT => write!(f, "TXT"),
            Self::AAAA => write!(f, "AAAA"),
            Self::ANY => write!(f, "ANY"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// CLASS fields appear in resource records, almost always IN. Ref RFC1035 3.2.4.
pub enum RecordClass {
    /// IN - Internet
    Internet = 1,
    /// CS - CSNET (obsolete)
    CsNet = 2,
    /// CH - Chaos
    Chaos = 3,
    /// Hesiod [Dyer 87]
    Hesiod = 4,

    Invalid = 0,
}

impl Display for RecordClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}",
            match self {
                RecordClass::Internet => "IN",
                RecordClass::CsNet => "CS",
                RecordClass::Chaos => "CHAOS",
                RecordClass::Hesiod => "HESIOD",
                RecordClass::Invalid => "Invalid",
            }
        ))
    }
}

impl From<&u16> for RecordClass {
    fn from(input: &u16) -> Self {
        match input {
            1 => Self::Internet,
            2 => Self::CsNet,
            3 => Self::Chaos,
            4 => Self::Hesiod,
            _ => Self::Invalid,
        }
    }
}
