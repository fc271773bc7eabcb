use crate::enums::{OpCode, PacketType, Rcode};
use crate::error::IbexError;
use crate::resourcerecord::AnswerRecord;
use crate::Header;
use packed_struct::prelude::*;

/// A response under construction: the client's transaction id, the
/// question section echoed verbatim, and the answers.
#[derive(Debug)]
pub struct Reply {
    pub id: u16,
    pub rcode: Rcode,
    pub question: Vec<u8>,
    pub answers: Vec<AnswerRecord>,
}

impl Reply {
    pub fn new(id: u16, question: &[u8], answers: Vec<AnswerRecord>, rcode: Rcode) -> Self {
        Reply {
            id,
            rcode,
            question: question.to_vec(),
            answers,
        }
    }

    /// Serialize into a full message. With answers and NOERROR this
    /// yields the 0x8180 flag word; NXDOMAIN yields 0x8183.
    pub fn as_bytes(&self) -> Result<Vec<u8>, IbexError> {
        let header = Header {
            id: self.id,
            qr: PacketType::Answer,
            opcode: OpCode::Query,
            recursion_desired: true,
            recursion_available: true,
            rcode: self.rcode,
            qdcount: 1,
            ancount: self.answers.len() as u16,
            ..Default::default()
        };
        let mut retval: Vec<u8> = header.pack()?.to_vec();
        retval.extend(&self.question);
        for answer in &self.answers {
            retval.extend(answer.wire_bytes()?);
        }
        Ok(retval)
    }
}

/// An empty NXDOMAIN response echoing the question.
pub fn reply_nxdomain(id: u16, question: &[u8]) -> Reply {
    Reply::new(id, question, vec![], Rcode::NameError)
}

/// Refusal, used for non-Internet-class questions.
pub fn reply_refused(id: u16, question: &[u8]) -> Reply {
    Reply::new(id, question, vec![], Rcode::Refused)
}
