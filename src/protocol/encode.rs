//! Protocol message encoding (BER, definite length)

use super::constants::{context, tags, universal};
use super::message::LdapRequest;
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a request wrapped in an LDAPMessage envelope
pub fn encode_message(message_id: i32, msg: &LdapRequest) -> io::Result<BytesMut> {
    let mut body = BytesMut::new();
    put_integer(&mut body, universal::INTEGER, i64::from(message_id));

    match msg {
        LdapRequest::SimpleBind {
            version,
            name,
            password,
        } => {
            encode_bind(&mut body, *version, name, password);
        }
        LdapRequest::Extended { name } => {
            encode_extended(&mut body, name);
        }
        LdapRequest::Unbind => {
            body.put_u8(tags::UNBIND_REQUEST);
            body.put_u8(0);
        }
    }

    let mut buf = BytesMut::with_capacity(body.len() + 6);
    put_tlv(&mut buf, universal::SEQUENCE, &body);
    Ok(buf)
}

fn encode_bind(buf: &mut BytesMut, version: u8, name: &str, password: &str) {
    let mut op = BytesMut::new();
    put_integer(&mut op, universal::INTEGER, i64::from(version));
    put_tlv(&mut op, universal::OCTET_STRING, name.as_bytes());
    put_tlv(&mut op, context::AUTH_SIMPLE, password.as_bytes());
    put_tlv(buf, tags::BIND_REQUEST, &op);
}

fn encode_extended(buf: &mut BytesMut, oid: &str) {
    let mut op = BytesMut::new();
    put_tlv(&mut op, context::EXTENDED_REQUEST_NAME, oid.as_bytes());
    put_tlv(buf, tags::EXTENDED_REQUEST, &op);
}

/// Write a tag-length-value triple
pub fn put_tlv(buf: &mut BytesMut, tag: u8, value: &[u8]) {
    buf.put_u8(tag);
    put_length(buf, value.len());
    buf.put_slice(value);
}

/// Write a BER definite length (short form below 128, long form above)
pub fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }

    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let significant = &bytes[skip..];
    buf.put_u8(0x80 | significant.len() as u8);
    buf.put_slice(significant);
}

/// Write a minimal two's-complement INTEGER (or ENUMERATED) with the given tag
pub fn put_integer(buf: &mut BytesMut, tag: u8, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Strip redundant sign-extension bytes
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    put_tlv(buf, tag, &bytes[start..]);
}
