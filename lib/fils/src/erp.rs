// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EAP Re-authentication Protocol packets (RFC 6696) carried in the FILS
//! authentication exchange as wrapped data.
//!
//! Only the Re-auth message type is handled; full EAP transport is out of
//! scope here. The station builds EAP-Initiate/Re-auth and verifies the
//! EAP-Finish/Re-auth it gets back.

use crate::akm::HashKind;
use crate::error::{Error, Result};
use crate::kdf::{ct_compare, hmac_hash};
use wlan_common::buffer_reader::BufferReader;
use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{AsBytes, FromBytes, Unaligned};

pub const EAP_CODE_INITIATE: u8 = 5;
pub const EAP_CODE_FINISH: u8 = 6;
pub const EAP_TYPE_REAUTH: u8 = 2;

// RFC 6696, 5.3.2: R | B | L, then reserved.
pub const FLAG_BOOTSTRAP: u8 = 0x40;
pub const FLAG_LIFETIME: u8 = 0x20;

// RFC 6696, 5.3.2 TV/TLV attribute types.
const TLV_KEYNAME_NAI: u8 = 1;
const TV_RRK_LIFETIME: u8 = 2;
const TV_RMSK_LIFETIME: u8 = 3;
const TLV_DOMAIN_NAME: u8 = 4;
const TLV_CRYPTOSUITE_LIST: u8 = 5;
const TLV_AUTH_INDICATION: u8 = 6;

pub const CRYPTOSUITE_HMAC_SHA256_64: u8 = 1;
pub const CRYPTOSUITE_HMAC_SHA256_128: u8 = 2;
pub const CRYPTOSUITE_HMAC_SHA256_256: u8 = 3;

/// Authentication tag width for a cryptosuite. The 64-bit truncation is
/// deliberately refused.
pub fn tag_len(cryptosuite: u8) -> Result<usize> {
    match cryptosuite {
        CRYPTOSUITE_HMAC_SHA256_128 => Ok(16),
        CRYPTOSUITE_HMAC_SHA256_256 => Ok(32),
        other => Err(Error::UnsupportedCryptosuite(other)),
    }
}

#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy, Debug)]
pub struct ErpHeader {
    pub code: u8,
    pub identifier: u8,
    pub length: U16<BigEndian>,
    pub type_: u8,
    pub flags: u8,
    pub seq: U16<BigEndian>,
}

pub const ERP_HEADER_LEN: usize = std::mem::size_of::<ErpHeader>();

/// Attributes lifted from the TLV region of an EAP-Finish/Re-auth packet.
#[derive(Debug, Default, PartialEq)]
pub struct ErpAttributes {
    pub keyname_nai: Option<Vec<u8>>,
    pub rrk_lifetime: Option<u32>,
    pub rmsk_lifetime: Option<u32>,
    pub domain_name: Option<Vec<u8>>,
}

/// A verified EAP-Finish/Re-auth packet.
#[derive(Debug, PartialEq)]
pub struct FinishReauth {
    pub identifier: u8,
    pub flags: u8,
    pub seq: u16,
    pub attributes: ErpAttributes,
}

/// Builds an EAP-Initiate/Re-auth packet carrying `keyname_nai` and
/// authenticated with `rik` under HMAC-SHA256-128.
pub fn build_initiate_reauth(identifier: u8, seq: u16, keyname_nai: &[u8], rik: &[u8]) -> Vec<u8> {
    let cryptosuite = CRYPTOSUITE_HMAC_SHA256_128;
    let tag_len = 16usize;
    let total = ERP_HEADER_LEN + 2 + keyname_nai.len() + 1 + tag_len;
    let header = ErpHeader {
        code: EAP_CODE_INITIATE,
        identifier,
        length: U16::new(total as u16),
        type_: EAP_TYPE_REAUTH,
        flags: 0,
        seq: U16::new(seq),
    };
    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(header.as_bytes());
    packet.push(TLV_KEYNAME_NAI);
    packet.push(keyname_nai.len() as u8);
    packet.extend_from_slice(keyname_nai);
    packet.push(cryptosuite);
    // The tag covers the packet from the code field through the cryptosuite.
    let tag = hmac_hash(HashKind::Sha256, rik, &[&packet]);
    packet.extend_from_slice(&tag[..tag_len]);
    packet
}

// The cryptosuite octet sits between the attributes and the tag, and its
// value fixes the tag width, so it is located from the end of the packet by
// trying each supported width. Attribute parsing is then bounded to the
// region before it; the supported suite numbers collide with attribute type
// numbers, so the walk must never enter the cryptosuite/tag region.
fn locate_cryptosuite(packet: &[u8], length: usize) -> Result<(usize, usize)> {
    let candidates =
        [(CRYPTOSUITE_HMAC_SHA256_256, 32usize), (CRYPTOSUITE_HMAC_SHA256_128, 16)];
    for (suite, tag_len) in candidates {
        if let Some(offset) = length.checked_sub(tag_len + 1) {
            if offset >= ERP_HEADER_LEN && packet[offset] == suite {
                return Ok((offset, tag_len));
            }
        }
    }
    // HMAC-SHA256-64 carries an 8-byte tag; recognize it only to refuse it.
    if let Some(offset) = length.checked_sub(8 + 1) {
        if offset >= ERP_HEADER_LEN && packet[offset] == CRYPTOSUITE_HMAC_SHA256_64 {
            return Err(Error::UnsupportedCryptosuite(CRYPTOSUITE_HMAC_SHA256_64));
        }
    }
    Err(Error::MalformedErp("no recognized cryptosuite"))
}

// Walks the bounded attribute region. TV attributes carry a fixed 4-byte
// value with no length octet; everything else is TLV. An unrecognized type
// ends the walk with the remaining region unconsumed.
fn parse_attributes(region: &[u8]) -> Result<ErpAttributes> {
    let mut attrs = ErpAttributes::default();
    let mut reader = BufferReader::new(region);
    while let Some(&type_) = reader.peek_remaining().first() {
        match type_ {
            TLV_KEYNAME_NAI | TLV_DOMAIN_NAME | TLV_CRYPTOSUITE_LIST | TLV_AUTH_INDICATION => {
                let _ = reader.read_byte();
                let len = reader
                    .read_byte()
                    .ok_or(Error::MalformedErp("attribute missing length"))?
                    as usize;
                let value = reader
                    .read_bytes(len)
                    .ok_or(Error::MalformedErp("attribute value truncated"))?;
                match type_ {
                    TLV_KEYNAME_NAI => attrs.keyname_nai = Some(value.to_vec()),
                    TLV_DOMAIN_NAME => attrs.domain_name = Some(value.to_vec()),
                    // Contents are advisory; presence is all that matters.
                    _ => {}
                }
            }
            TV_RRK_LIFETIME | TV_RMSK_LIFETIME => {
                let _ = reader.read_byte();
                let value = reader
                    .read_u32_be()
                    .ok_or(Error::MalformedErp("lifetime attribute truncated"))?;
                match type_ {
                    TV_RRK_LIFETIME => attrs.rrk_lifetime = Some(value),
                    _ => attrs.rmsk_lifetime = Some(value),
                }
            }
            _ => return Ok(attrs),
        }
    }
    Ok(attrs)
}

/// Parses and verifies an EAP-Finish/Re-auth packet.
///
/// The authentication tag is checked before any attribute is surfaced to the
/// caller. A sequence number older than the one we sent is rejected as a
/// replay.
pub fn parse_finish_reauth(packet: &[u8], sent_seq: u16, rik: &[u8]) -> Result<FinishReauth> {
    let mut reader = BufferReader::new(packet);
    let header = reader
        .read::<ErpHeader>()
        .ok_or(Error::MalformedErp("packet shorter than header"))?;
    if header.code != EAP_CODE_FINISH {
        return Err(Error::MalformedErp("not an EAP-Finish packet"));
    }
    if header.type_ != EAP_TYPE_REAUTH {
        return Err(Error::MalformedErp("not a re-auth message"));
    }
    let length = header.length.get() as usize;
    if length > packet.len() || length < ERP_HEADER_LEN {
        return Err(Error::MalformedErp("length field inconsistent"));
    }
    let seq = header.seq.get();
    if seq < sent_seq {
        return Err(Error::ErpSequenceStale { sent: sent_seq, got: seq });
    }
    let identifier = header.identifier;
    let flags = header.flags;

    let (cryptosuite_offset, tag_len) = locate_cryptosuite(packet, length)?;
    let attributes = parse_attributes(&packet[ERP_HEADER_LEN..cryptosuite_offset])?;
    let tag_offset = cryptosuite_offset + 1;
    let tag = &packet[tag_offset..length];
    let expected = hmac_hash(HashKind::Sha256, rik, &[&packet[..tag_offset]]);
    if !ct_compare(&expected[..tag_len], tag) {
        return Err(Error::AuthTagMismatch);
    }
    Ok(FinishReauth { identifier, flags, seq, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIK: [u8; 32] = [0x5a; 32];

    fn build_finish(seq: u16, attrs: &[u8], cryptosuite: u8, rik: &[u8]) -> Vec<u8> {
        let tag_len = tag_len(cryptosuite).unwrap();
        let total = ERP_HEADER_LEN + attrs.len() + 1 + tag_len;
        let header = ErpHeader {
            code: EAP_CODE_FINISH,
            identifier: 9,
            length: U16::new(total as u16),
            type_: EAP_TYPE_REAUTH,
            flags: FLAG_LIFETIME,
            seq: U16::new(seq),
        };
        let mut packet = Vec::with_capacity(total);
        packet.extend_from_slice(header.as_bytes());
        packet.extend_from_slice(attrs);
        packet.push(cryptosuite);
        let tag = hmac_hash(HashKind::Sha256, rik, &[&packet]);
        packet.extend_from_slice(&tag[..tag_len]);
        packet
    }

    fn keyname_attr(nai: &[u8]) -> Vec<u8> {
        let mut out = vec![1u8, nai.len() as u8];
        out.extend_from_slice(nai);
        out
    }

    #[test]
    fn initiate_layout_and_tag() {
        let packet = build_initiate_reauth(3, 7, b"user@realm", &RIK);
        assert_eq!(packet[0], EAP_CODE_INITIATE);
        assert_eq!(packet[1], 3);
        assert_eq!(
            u16::from_be_bytes([packet[2], packet[3]]) as usize,
            packet.len()
        );
        assert_eq!(packet[4], EAP_TYPE_REAUTH);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 7);
        // keyname-NAI TLV follows the header.
        assert_eq!(packet[8], 1);
        assert_eq!(packet[9] as usize, b"user@realm".len());
        // Tag verifies over everything before it.
        let tag_start = packet.len() - 16;
        let expected = hmac_hash(HashKind::Sha256, &RIK, &[&packet[..tag_start]]);
        assert_eq!(&packet[tag_start..], &expected[..16]);
    }

    #[test]
    fn finish_round_trip() {
        let mut attrs = keyname_attr(b"user@realm");
        attrs.extend_from_slice(&[3, 0x00, 0x01, 0x51, 0x80]); // rMSK lifetime 86400
        let packet = build_finish(7, &attrs, CRYPTOSUITE_HMAC_SHA256_128, &RIK);
        let parsed = parse_finish_reauth(&packet, 7, &RIK).unwrap();
        assert_eq!(parsed.seq, 7);
        assert_eq!(parsed.flags, FLAG_LIFETIME);
        assert_eq!(parsed.attributes.keyname_nai.as_deref(), Some(&b"user@realm"[..]));
        assert_eq!(parsed.attributes.rmsk_lifetime, Some(86400));
    }

    #[test]
    fn finish_sha256_256_tag_accepted() {
        let packet =
            build_finish(4, &keyname_attr(b"a@b"), CRYPTOSUITE_HMAC_SHA256_256, &RIK);
        let parsed = parse_finish_reauth(&packet, 4, &RIK).unwrap();
        assert_eq!(parsed.attributes.keyname_nai.as_deref(), Some(&b"a@b"[..]));
    }

    #[test]
    fn flipped_tag_bit_rejected() {
        let mut packet = build_finish(7, &keyname_attr(b"a@b"), CRYPTOSUITE_HMAC_SHA256_128, &RIK);
        let last = packet.len() - 1;
        packet[last] ^= 0x01;
        assert_eq!(parse_finish_reauth(&packet, 7, &RIK), Err(Error::AuthTagMismatch));
    }

    #[test]
    fn stale_sequence_rejected() {
        let packet = build_finish(6, &keyname_attr(b"a@b"), CRYPTOSUITE_HMAC_SHA256_128, &RIK);
        assert_eq!(
            parse_finish_reauth(&packet, 7, &RIK),
            Err(Error::ErpSequenceStale { sent: 7, got: 6 })
        );
    }

    #[test]
    fn unsupported_cryptosuite_rejected() {
        // HMAC-SHA256-64 packets are refused before tag verification.
        let mut attrs = keyname_attr(b"a@b");
        attrs.push(CRYPTOSUITE_HMAC_SHA256_64);
        let total = ERP_HEADER_LEN + attrs.len() + 8;
        let header = ErpHeader {
            code: EAP_CODE_FINISH,
            identifier: 1,
            length: U16::new(total as u16),
            type_: EAP_TYPE_REAUTH,
            flags: 0,
            seq: U16::new(2),
        };
        let mut packet = Vec::new();
        packet.extend_from_slice(header.as_bytes());
        packet.extend_from_slice(&attrs);
        packet.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            parse_finish_reauth(&packet, 2, &RIK),
            Err(Error::UnsupportedCryptosuite(CRYPTOSUITE_HMAC_SHA256_64))
        );
    }

    #[test]
    fn truncated_attribute_rejected() {
        // keyname-NAI claims 20 bytes but the cryptosuite begins first.
        let attrs = [1u8, 20, b'a', b'b'];
        let packet = build_finish(2, &attrs, CRYPTOSUITE_HMAC_SHA256_128, &RIK);
        assert_eq!(
            parse_finish_reauth(&packet, 2, &RIK),
            Err(Error::MalformedErp("attribute value truncated"))
        );
    }

    #[test]
    fn cryptosuite_octet_not_consumed_as_attribute() {
        // With no attributes at all, the byte after the header is the
        // cryptosuite. Its value (2) collides with the rRK-lifetime
        // attribute type, so a naive forward walk would eat it.
        let packet = build_finish(5, &[], CRYPTOSUITE_HMAC_SHA256_128, &RIK);
        let parsed = parse_finish_reauth(&packet, 5, &RIK).unwrap();
        assert_eq!(parsed.attributes, ErpAttributes::default());
        assert_eq!(parsed.seq, 5);
    }

    #[test]
    fn lifetime_attribute_next_to_cryptosuite_parsed() {
        // An rRK-lifetime TV directly followed by the cryptosuite octet:
        // both carry type/suite numbers from the same small range, so the
        // attribute walk must stop exactly at the cryptosuite boundary.
        let attrs = [TV_RRK_LIFETIME, 0x00, 0x01, 0x51, 0x80];
        let packet = build_finish(3, &attrs, CRYPTOSUITE_HMAC_SHA256_256, &RIK);
        let parsed = parse_finish_reauth(&packet, 3, &RIK).unwrap();
        assert_eq!(parsed.attributes.rrk_lifetime, Some(86400));
        assert_eq!(parsed.attributes.keyname_nai, None);
    }

    #[test]
    fn short_packet_rejected() {
        assert_eq!(
            parse_finish_reauth(&[6, 0, 0], 0, &RIK),
            Err(Error::MalformedErp("packet shorter than header"))
        );
    }
}
