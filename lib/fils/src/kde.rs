// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Key delivery elements carried in the encrypted portion of the FILS
//! association response.

use bitfield::bitfield;
use nom::bytes::complete::take;
use nom::combinator::{eof, map};
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{le_u16, le_u8};
use nom::IResult;

use crate::error::{Error, Result};

pub const TYPE: u8 = 0xDD;
const PADDING_DATA_LEN: u8 = 0;
/// Octets taken by OUI and data type.
const HDR_OUI_TYPE_LEN: usize = 4;

const OUI_DOT11: [u8; 3] = [0x00, 0x0F, 0xAC];

// IEEE Std 802.11-2016 Table 12-6
const GTK_DATA_TYPE: u8 = 1;
const IGTK_DATA_TYPE: u8 = 9;

/// A GTK KDE's fixed length.
/// Note: The KDE consists of a fixed and variable length (the GTK).
const GTK_FIXED_LEN: usize = 2;

const IGTK_IPN_LEN: usize = 6;
const IGTK_FIXED_LEN: usize = 2 + IGTK_IPN_LEN;

// IEEE Std 802.11-2016, 12.7.2, Figure 12-34
#[derive(Default, Debug, PartialEq)]
pub struct Header {
    pub type_: u8,
    pub len: u8,
    pub oui: [u8; 3],
    pub data_type: u8,
}

impl Header {
    fn new(type_: u8, len: u8, oui: &[u8], data_type: u8) -> Header {
        let mut oui_buf = [0u8; 3];
        oui_buf.copy_from_slice(oui);
        Header { type_, len, data_type, oui: oui_buf }
    }

    fn new_dot11(data_type: u8, data_len: usize) -> Header {
        Header { type_: TYPE, len: (HDR_OUI_TYPE_LEN + data_len) as u8, data_type, oui: OUI_DOT11 }
    }

    fn data_len(&self) -> usize {
        (self.len as usize).saturating_sub(HDR_OUI_TYPE_LEN)
    }
}

// IEEE Std 802.11-2016, 12.7.2, j)
pub enum GtkInfoTx {
    _OnlyRx = 0,
    BothRxTx = 1,
}

// IEEE Std 802.11-2016, 12.7.2, Figure 12-35
bitfield! {
    pub struct GtkInfo(u8);
    impl Debug;
    pub key_id, set_key_id: 1, 0;
    pub tx, set_tx: 2, 2;
    // Bit 3-7 reserved.
    pub value, _: 7,0;
}

impl PartialEq for GtkInfo {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// GTK KDE:
/// IEEE Std 802.11-2016, 12.7.2, Figure 12-35
#[derive(Debug, PartialEq)]
pub struct Gtk {
    pub info: GtkInfo,
    // 1 byte reserved.
    pub gtk: Vec<u8>,
}

impl Gtk {
    pub fn new(key_id: u8, tx: GtkInfoTx, gtk: &[u8]) -> Self {
        let mut gtk_info = GtkInfo(0);
        gtk_info.set_key_id(key_id);
        gtk_info.set_tx(tx as u8);
        Self { info: gtk_info, gtk: gtk.to_vec() }
    }

    /// Length of the GTK KDE including its fixed fields, not just the GTK.
    pub fn len(&self) -> usize {
        GTK_FIXED_LEN + self.gtk.len()
    }
}

/// IGTK KDE:
/// IEEE Std 802.11-2016, 12.7.2, Figure 12-42
#[derive(Debug, PartialEq)]
pub struct Igtk {
    pub id: u16,
    // IGTK Packet Number
    pub ipn: [u8; IGTK_IPN_LEN],
    pub igtk: Vec<u8>,
}

impl Igtk {
    pub fn new(id: u16, ipn: &[u8], igtk: &[u8]) -> Self {
        let mut ipn_buf = [0u8; IGTK_IPN_LEN];
        ipn_buf.copy_from_slice(ipn);
        Self { id, ipn: ipn_buf, igtk: igtk.to_vec() }
    }

    pub fn len(&self) -> usize {
        IGTK_FIXED_LEN + self.igtk.len()
    }
}

#[derive(Debug, PartialEq)]
pub enum Element {
    Gtk(Header, Gtk),
    Igtk(Header, Igtk),
    UnsupportedKde(Header),
    Padding,
}

fn parse_header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, type_) = le_u8(input)?;
    let (input, length) = le_u8(input)?;
    let (input, oui) = take(3usize)(input)?;
    let (input, data_type) = le_u8(input)?;
    Ok((input, Header::new(type_, length, oui, data_type)))
}

fn parse_padding(input: &[u8]) -> IResult<&[u8], Element> {
    if input.iter().all(|&x| x == 0) {
        Ok((&[], Element::Padding))
    } else {
        // Everything after the zero-length marker must be padding bytes.
        Err(nom::Err::Error(NomError::new(input, ErrorKind::Eof)))
    }
}

fn parse_gtk(data_len: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Gtk> {
    move |input: &[u8]| {
        let (input, info) = map(le_u8, GtkInfo)(input)?;
        // 1 byte reserved.
        let (input, _) = take(1usize)(input)?;
        let (input, gtk) = take(data_len - GTK_FIXED_LEN)(input)?;
        let (input, _) = eof(input)?;
        Ok((input, Gtk { info, gtk: gtk.to_vec() }))
    }
}

fn parse_igtk(data_len: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Igtk> {
    move |input: &[u8]| {
        let (input, id) = le_u16(input)?;
        let (input, ipn) = take(IGTK_IPN_LEN)(input)?;
        let (input, igtk) = take(data_len - IGTK_FIXED_LEN)(input)?;
        let (input, _) = eof(input)?;
        Ok((input, Igtk::new(id, ipn, igtk)))
    }
}

fn parse(i0: &[u8]) -> IResult<&[u8], Element> {
    // Check whether parsing is finished.
    if i0.len() <= 1 {
        return Ok((&i0[i0.len()..], Element::Padding));
    }

    // Check whether the remaining data is padding.
    let data_len = i0[1];
    if data_len == PADDING_DATA_LEN {
        return parse_padding(&i0[1..]);
    }

    // Read the KDE Header first.
    let (i1, hdr) = parse_header(i0)?;
    let data_len = hdr.data_len();
    let (i2, bytes) = take(data_len)(i1)?;
    if hdr.oui != OUI_DOT11 {
        return Ok((i2, Element::UnsupportedKde(hdr)));
    }
    match hdr.data_type {
        GTK_DATA_TYPE => {
            if data_len < GTK_FIXED_LEN {
                return Err(nom::Err::Error(NomError::new(bytes, ErrorKind::LengthValue)));
            }
            let (_, gtk) = parse_gtk(data_len)(bytes)?;
            Ok((i2, Element::Gtk(hdr, gtk)))
        }
        IGTK_DATA_TYPE => {
            if data_len < IGTK_FIXED_LEN {
                return Err(nom::Err::Error(NomError::new(bytes, ErrorKind::LengthValue)));
            }
            let (_, igtk) = parse_igtk(data_len)(bytes)?;
            Ok((i2, Element::Igtk(hdr, igtk)))
        }
        _ => Ok((i2, Element::UnsupportedKde(hdr))),
    }
}

/// Parses the whole key-data region into its elements. Unknown vendor
/// elements are reported as unsupported rather than dropped silently;
/// truncation anywhere fails the whole region.
pub fn extract_elements(key_data: &[u8]) -> Result<Vec<Element>> {
    let mut elements = vec![];
    let mut remaining = key_data;
    while !remaining.is_empty() {
        let (rest, element) = parse(remaining)
            .map_err(|_| Error::MalformedKde("truncated or inconsistent element"))?;
        if element != Element::Padding {
            elements.push(element);
        }
        remaining = rest;
    }
    Ok(elements)
}

/// KDE writer building the plaintext key-data region delivered to the
/// supplicant's key installer.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: vec![] }
    }

    pub fn bytes_written(&self) -> usize {
        self.buf.len()
    }

    fn write_kde_hdr(&mut self, hdr: Header) {
        self.buf.push(hdr.type_);
        self.buf.push(hdr.len);
        self.buf.extend_from_slice(&hdr.oui);
        self.buf.push(hdr.data_type);
    }

    pub fn write_gtk(&mut self, gtk_kde: &Gtk) {
        let hdr = Header::new_dot11(GTK_DATA_TYPE, gtk_kde.len());
        self.write_kde_hdr(hdr);
        self.buf.push(gtk_kde.info.value());
        self.buf.push(0);
        self.buf.extend_from_slice(&gtk_kde.gtk[..]);
    }

    pub fn write_igtk(&mut self, igtk_kde: &Igtk) {
        let hdr = Header::new_dot11(IGTK_DATA_TYPE, igtk_kde.len());
        self.write_kde_hdr(hdr);
        self.buf.extend_from_slice(&igtk_kde.id.to_le_bytes()[..]);
        self.buf.extend_from_slice(&igtk_kde.ipn[..]);
        self.buf.extend_from_slice(&igtk_kde.igtk[..]);
    }

    pub fn finalize(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
