//! Protocol message decoding (BER, definite length)

use super::constants::{context, tags, universal};
use super::message::{LdapResponse, LdapResult, ResponseOp, ResultCode};
use std::io;

/// Maximum LDAPMessage length (16 MiB).
///
/// Bind and extended responses are tiny; anything larger is rejected before
/// allocation so a crafted length header cannot exhaust memory.
const MAX_MESSAGE_LENGTH: usize = 16 * 1024 * 1024;

/// Decode one LDAPMessage from the front of `data`
///
/// # Returns
/// `Ok((msg, consumed))` - Message and number of bytes consumed
/// `Err(e)` with [`io::ErrorKind::UnexpectedEof`] - more bytes are needed
/// `Err(e)` with any other kind - the stream is corrupt
pub fn decode_message(data: &[u8]) -> io::Result<(LdapResponse, usize)> {
    if data.len() < 2 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete message header",
        ));
    }

    if data[0] != universal::SEQUENCE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected LDAPMessage sequence, got tag 0x{:02X}", data[0]),
        ));
    }

    let (header_len, len) = read_length(&data[1..])?;

    if len > MAX_MESSAGE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "message length {} exceeds maximum allowed {}",
                len, MAX_MESSAGE_LENGTH
            ),
        ));
    }

    let total = 1 + header_len + len;
    if data.len() < total {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete message body",
        ));
    }

    let mut reader = BerReader::new(&data[1 + header_len..total]);

    let (tag, id_bytes) = reader.read_tlv()?;
    expect_tag(tag, universal::INTEGER, "messageID")?;
    let message_id = i32::try_from(decode_integer(id_bytes)?)
        .map_err(|_| invalid("messageID out of range"))?;

    let (op_tag, op_bytes) = reader.read_tlv()?;
    let op = match op_tag {
        tags::BIND_RESPONSE => decode_bind_response(op_bytes)?,
        tags::EXTENDED_RESPONSE => decode_extended_response(op_bytes)?,
        _ => {
            return Err(invalid(&format!(
                "unsupported protocol operation tag: 0x{:02X}",
                op_tag
            )))
        }
    };

    // Trailing controls are accepted and ignored
    if !reader.is_empty() {
        let (tag, _) = reader.read_tlv()?;
        expect_tag(tag, context::CONTROLS, "controls")?;
    }

    Ok((LdapResponse { message_id, op }, total))
}

fn decode_bind_response(data: &[u8]) -> io::Result<ResponseOp> {
    let mut reader = BerReader::new(data);
    let result = decode_ldap_result(&mut reader)?;

    // serverSaslCreds is only meaningful for SASL binds
    while !reader.is_empty() {
        let (tag, _) = reader.read_tlv()?;
        if tag != context::SERVER_SASL_CREDS && tag != context::REFERRAL {
            return Err(invalid(&format!(
                "unexpected element 0x{:02X} in BindResponse",
                tag
            )));
        }
    }

    Ok(ResponseOp::Bind(result))
}

fn decode_extended_response(data: &[u8]) -> io::Result<ResponseOp> {
    let mut reader = BerReader::new(data);
    let result = decode_ldap_result(&mut reader)?;
    let mut name = None;

    while !reader.is_empty() {
        let (tag, value) = reader.read_tlv()?;
        match tag {
            context::EXTENDED_RESPONSE_NAME => {
                name = Some(String::from_utf8_lossy(value).to_string());
            }
            context::EXTENDED_RESPONSE_VALUE | context::REFERRAL => {}
            _ => {
                return Err(invalid(&format!(
                    "unexpected element 0x{:02X} in ExtendedResponse",
                    tag
                )))
            }
        }
    }

    Ok(ResponseOp::Extended { result, name })
}

fn decode_ldap_result(reader: &mut BerReader<'_>) -> io::Result<LdapResult> {
    let (tag, code) = reader.read_tlv()?;
    expect_tag(tag, universal::ENUMERATED, "resultCode")?;
    let code = u32::try_from(decode_integer(code)?)
        .map_err(|_| invalid("negative resultCode"))?;

    let (tag, matched_dn) = reader.read_tlv()?;
    expect_tag(tag, universal::OCTET_STRING, "matchedDN")?;

    let (tag, diagnostic) = reader.read_tlv()?;
    expect_tag(tag, universal::OCTET_STRING, "diagnosticMessage")?;

    Ok(LdapResult {
        code: ResultCode(code),
        matched_dn: String::from_utf8_lossy(matched_dn).to_string(),
        diagnostic: String::from_utf8_lossy(diagnostic).to_string(),
    })
}

/// Read a BER definite length; returns `(bytes used by the length, length)`
fn read_length(data: &[u8]) -> io::Result<(usize, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "length"))?;

    if first < 0x80 {
        return Ok((1, first as usize));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        return Err(invalid("indefinite length is not allowed in LDAP"));
    }
    if count > 4 {
        return Err(invalid("length field too long"));
    }
    if data.len() < 1 + count {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "long-form length"));
    }

    let len = data[1..=count]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((1 + count, len))
}

fn decode_integer(data: &[u8]) -> io::Result<i64> {
    if data.is_empty() || data.len() > 8 {
        return Err(invalid("integer length out of range"));
    }
    let negative = data[0] & 0x80 != 0;
    let init: i64 = if negative { -1 } else { 0 };
    Ok(data.iter().fold(init, |acc, &b| (acc << 8) | b as i64))
}

fn expect_tag(actual: u8, expected: u8, what: &str) -> io::Result<()> {
    if actual != expected {
        return Err(invalid(&format!(
            "expected tag 0x{:02X} for {}, got 0x{:02X}",
            expected, what, actual
        )));
    }
    Ok(())
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Cursor over the elements of a complete BER value
struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read the next element; truncation inside a complete frame is corruption
    fn read_tlv(&mut self) -> io::Result<(u8, &'a [u8])> {
        let rest = &self.data[self.pos..];
        if rest.len() < 2 {
            return Err(invalid("truncated element"));
        }
        let tag = rest[0];
        let (header_len, len) = read_length(&rest[1..]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                invalid("truncated element length")
            } else {
                e
            }
        })?;
        let start = 1 + header_len;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= rest.len())
            .ok_or_else(|| invalid("element exceeds enclosing value"))?;
        self.pos += end;
        Ok((tag, &rest[start..end]))
    }
}
