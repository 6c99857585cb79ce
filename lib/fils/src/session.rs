// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Station-side FILS shared-key session.
//!
//! One `FilsSession` covers a single association attempt: it wraps the ERP
//! exchange into the authentication frames, derives the FILS key hierarchy,
//! produces and checks the key confirmations, and protects the association
//! frames with AES-SIV. Every failure is terminal for the session; the
//! caller starts a fresh one to retry.
//!
//! All derived secrets live in `Zeroizing` buffers and are wiped when the
//! session is dropped, whether it succeeded or not.

use crate::akm::{Cipher, FilsAkm, HashKind};
use crate::erp::{self, CRYPTOSUITE_HMAC_SHA256_128};
use crate::error::{Error, Result};
use crate::ft;
use crate::kdf::{ct_compare, hash, hmac_hash, kdf, prf_plus};
use crate::kde::{self, Element};
use crate::siv;
use log::{debug, warn};
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroizing;

pub const FILS_NONCE_LEN: usize = 16;

// RFC 6696, 4.1 and 4.3.
const RIK_LABEL: &[u8] = b"Re-authentication Integrity Key@ietf.org";
const RMSK_LABEL: &[u8] = b"Re-authentication Master Session Key@ietf.org";
const RIK_LEN: usize = 32;
const RMSK_LEN: usize = 64;

/// ERP bootstrap material from a previous full EAP run.
pub struct ErpCredentials {
    pub keyname_nai: Vec<u8>,
    pub rrk: Zeroizing<Vec<u8>>,
    /// Sequence number for the next EAP-Initiate/Re-auth.
    pub next_seq: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AuthRequestBuilt,
    AuthResponseParsed,
    KeysDerived,
    AssocRequestEncrypted,
    Connected,
    Failed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::AuthRequestBuilt => "auth-request-built",
            State::AuthResponseParsed => "auth-response-parsed",
            State::KeysDerived => "keys-derived",
            State::AssocRequestEncrypted => "assoc-request-encrypted",
            State::Connected => "connected",
            State::Failed => "failed",
        }
    }
}

/// Key material handed to the installer once the exchange completed.
pub struct ConnectionKeys {
    pub pmk: Zeroizing<Vec<u8>>,
    pub pmkid: [u8; 16],
    pub tk: Zeroizing<Vec<u8>>,
    pub gtk: kde::Gtk,
    pub igtk: Option<kde::Igtk>,
}

pub struct FilsSession {
    akm: FilsAkm,
    cipher: Cipher,
    sta_addr: MacAddr,
    bssid: MacAddr,
    snonce: [u8; FILS_NONCE_LEN],
    anonce: Option<[u8; FILS_NONCE_LEN]>,
    erp: Option<ErpCredentials>,
    erp_request: Option<Vec<u8>>,
    erp_seq_sent: u16,
    pmk: Option<Zeroizing<Vec<u8>>>,
    pmkid: Option<[u8; 16]>,
    ick: Option<Zeroizing<Vec<u8>>>,
    kek: Option<Zeroizing<Vec<u8>>>,
    tk: Option<Zeroizing<Vec<u8>>>,
    fils_ft: Option<Zeroizing<Vec<u8>>>,
    gtk: Option<kde::Gtk>,
    igtk: Option<kde::Igtk>,
    state: State,
}

impl FilsSession {
    pub fn new(
        akm: FilsAkm,
        cipher: Cipher,
        sta_addr: MacAddr,
        bssid: MacAddr,
        snonce: [u8; FILS_NONCE_LEN],
        erp: Option<ErpCredentials>,
    ) -> Self {
        Self {
            akm,
            cipher,
            sta_addr,
            bssid,
            snonce,
            anonce: None,
            erp,
            erp_request: None,
            erp_seq_sent: 0,
            pmk: None,
            pmkid: None,
            ick: None,
            kek: None,
            tk: None,
            fils_ft: None,
            gtk: None,
            igtk: None,
            state: State::Idle,
        }
    }

    fn expect_state(&self, expected: State) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(self.state.name()));
        }
        Ok(())
    }

    fn fail<T>(&mut self, e: Error) -> Result<T> {
        warn!("FILS exchange with {} failed: {}", self.bssid.to_mac_str(), e);
        self.state = State::Failed;
        Err(e)
    }

    /// Builds the ERP wrapped data for the FILS authentication request.
    ///
    /// Returns `Ok(None)` when no ERP credentials are available; the caller
    /// then authenticates against a cached PMKSA and supplies the PMK via
    /// [`FilsSession::adopt_pmksa`].
    pub fn build_auth_wrapped_data(&mut self, eap_identifier: u8) -> Result<Option<Vec<u8>>> {
        self.expect_state(State::Idle)?;
        let erp = match &mut self.erp {
            None => {
                debug!("no ERP credentials; authenticating from cached PMKSA");
                self.state = State::AuthRequestBuilt;
                return Ok(None);
            }
            Some(erp) => erp,
        };
        let rik = derive_rik(&erp.rrk);
        let seq = erp.next_seq;
        erp.next_seq = erp.next_seq.wrapping_add(1);
        let packet = erp::build_initiate_reauth(eap_identifier, seq, &erp.keyname_nai, &rik);
        self.erp_seq_sent = seq;
        self.erp_request = Some(packet.clone());
        self.state = State::AuthRequestBuilt;
        Ok(Some(packet))
    }

    /// Installs a PMKSA obtained outside of ERP (cached from a previous
    /// association). Takes the place of [`FilsSession::process_auth_wrapped_data`].
    pub fn adopt_pmksa(
        &mut self,
        anonce: [u8; FILS_NONCE_LEN],
        pmk: Zeroizing<Vec<u8>>,
        pmkid: [u8; 16],
    ) -> Result<()> {
        self.expect_state(State::AuthRequestBuilt)?;
        if self.erp_request.is_some() {
            return Err(Error::InvalidState("ERP exchange in flight"));
        }
        self.anonce = Some(anonce);
        self.pmk = Some(pmk);
        self.pmkid = Some(pmkid);
        self.state = State::AuthResponseParsed;
        Ok(())
    }

    /// Verifies the EAP-Finish/Re-auth from the authentication response and
    /// derives RMSK, PMK and PMKID.
    ///
    /// Nothing is populated unless the packet verifies; a tag or sequence
    /// failure poisons the session.
    pub fn process_auth_wrapped_data(
        &mut self,
        anonce: [u8; FILS_NONCE_LEN],
        wrapped: &[u8],
    ) -> Result<()> {
        self.expect_state(State::AuthRequestBuilt)?;
        let (rrk, erp_request) = match (&self.erp, &self.erp_request) {
            (Some(erp), Some(request)) => (&erp.rrk, request),
            _ => return Err(Error::InvalidState("no ERP exchange in flight")),
        };
        let rik = derive_rik(rrk);
        let finish = match erp::parse_finish_reauth(wrapped, self.erp_seq_sent, &rik) {
            Ok(finish) => finish,
            Err(e) => return self.fail(e),
        };

        let hash_kind = self.akm.hash();
        let rmsk = derive_rmsk(rrk, finish.seq);
        let mut pmk_key = [0u8; 2 * FILS_NONCE_LEN];
        pmk_key[..FILS_NONCE_LEN].copy_from_slice(&self.snonce);
        pmk_key[FILS_NONCE_LEN..].copy_from_slice(&anonce);
        // IEEE Std 802.11ai-2016, 12.12.2.5.2: PMK = HMAC-Hash(SNonce ||
        // ANonce, rMSK) and PMKID names the EAP-Initiate/Re-auth frame.
        let pmk = Zeroizing::new(hmac_hash(hash_kind, &pmk_key, &[&rmsk[..]]));
        let pmkid_digest = hash(hash_kind, &[&erp_request[..]]);
        let mut pmkid = [0u8; 16];
        pmkid.copy_from_slice(&pmkid_digest[..16]);

        self.anonce = Some(anonce);
        self.pmk = Some(pmk);
        self.pmkid = Some(pmkid);
        self.state = State::AuthResponseParsed;
        Ok(())
    }

    /// Expands the PMK into ICK, KEK, TK and (for FT AKMs) FILS-FT with one
    /// KDF invocation, sliced at the table-driven offsets.
    pub fn derive_ptk_material(&mut self) -> Result<()> {
        self.expect_state(State::AuthResponseParsed)?;
        let pmk = self.pmk.as_ref().ok_or(Error::InvalidState("no PMK"))?;
        let anonce = self.anonce.ok_or(Error::InvalidState("no ANonce"))?;
        let sizes = self.akm.key_sizes();
        let tk_len = self.cipher.tk_len();
        let ft_len = if self.akm.is_ft() { sizes.fils_ft } else { 0 };
        let total = sizes.ick + sizes.kek + tk_len + ft_len;

        // IEEE Std 802.11ai-2016, 12.12.2.5.3.
        let context: [&[u8]; 4] = [&self.sta_addr, &self.bssid, &self.snonce, &anonce];
        let key_data =
            Zeroizing::new(kdf(self.akm.hash(), pmk, b"FILS PTK Derivation", &context, total));

        let mut offset = 0;
        let mut slice = |len: usize| {
            let out = Zeroizing::new(key_data[offset..offset + len].to_vec());
            offset += len;
            out
        };
        self.ick = Some(slice(sizes.ick));
        self.kek = Some(slice(sizes.kek));
        self.tk = Some(slice(tk_len));
        if ft_len > 0 {
            self.fils_ft = Some(slice(ft_len));
        }
        self.state = State::KeysDerived;
        Ok(())
    }

    /// Key confirmation the station sends: `HMAC-Hash(ICK, SNonce || ANonce
    /// || STA-MAC || AP-BSSID)`.
    pub fn sta_key_confirmation(&self) -> Result<Vec<u8>> {
        let (ick, anonce) = self.confirmation_inputs()?;
        Ok(hmac_hash(
            self.akm.hash(),
            ick,
            &[&self.snonce, &anonce, &self.sta_addr, &self.bssid],
        ))
    }

    /// Checks the AP's key confirmation, which swaps both the nonce and the
    /// address order relative to the station's.
    pub fn verify_ap_key_confirmation(&mut self, tag: &[u8]) -> Result<()> {
        let (ick, anonce) = self.confirmation_inputs()?;
        let expected = hmac_hash(
            self.akm.hash(),
            ick,
            &[&anonce, &self.snonce, &self.bssid, &self.sta_addr],
        );
        if !ct_compare(&expected, tag) {
            return self.fail(Error::KeyConfirmationMismatch);
        }
        Ok(())
    }

    fn confirmation_inputs(&self) -> Result<(&[u8], [u8; FILS_NONCE_LEN])> {
        if !matches!(
            self.state,
            State::KeysDerived | State::AssocRequestEncrypted | State::Connected
        ) {
            return Err(Error::InvalidState(self.state.name()));
        }
        let ick = self.ick.as_ref().ok_or(Error::InvalidState("no ICK"))?;
        let anonce = self.anonce.ok_or(Error::InvalidState("no ANonce"))?;
        Ok((ick, anonce))
    }

    /// For FT AKMs: derives PMK-R0 from FILS-FT and returns the PMKR1Name to
    /// advertise toward `r1kh_id`. The rewritten RSNE comes from
    /// [`ft::rsne_insert_pmkid`].
    pub fn ft_pmkr1_name(
        &self,
        ssid: &[u8],
        mdid: &[u8; ft::MDID_LEN],
        r0kh_id: &[u8],
        r1kh_id: &[u8; 6],
    ) -> Result<[u8; ft::PMKID_LEN]> {
        if !matches!(self.state, State::KeysDerived | State::AssocRequestEncrypted) {
            return Err(Error::InvalidState(self.state.name()));
        }
        let fils_ft = self.fils_ft.as_ref().ok_or(Error::InvalidState("AKM is not FT"))?;
        let r0 = ft::derive_pmkr0(self.akm, fils_ft, ssid, mdid, r0kh_id, &self.sta_addr);
        Ok(ft::derive_pmkr1_name(self.akm.hash(), &r0.name, r1kh_id, &self.sta_addr))
    }

    /// Encrypts the association request body under the KEK. `frame_head` is
    /// everything in the frame preceding the encrypted portion.
    pub fn aead_encrypt_frame(&mut self, frame_head: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.expect_state(State::KeysDerived)?;
        let kek = self.kek.as_ref().ok_or(Error::InvalidState("no KEK"))?;
        let anonce = self.anonce.ok_or(Error::InvalidState("no ANonce"))?;
        let ads: [&[u8]; 5] = [&self.sta_addr, &self.bssid, &self.snonce, &anonce, frame_head];
        let out = siv::aead_encrypt(kek, &ads, plaintext)?;
        self.state = State::AssocRequestEncrypted;
        Ok(out)
    }

    /// Decrypts and verifies the association response, then lifts the GTK
    /// (mandatory) and IGTK out of its key delivery elements.
    pub fn aead_decrypt_frame(&mut self, frame_head: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        self.expect_state(State::AssocRequestEncrypted)?;
        let kek = self.kek.as_ref().ok_or(Error::InvalidState("no KEK"))?;
        let anonce = self.anonce.ok_or(Error::InvalidState("no ANonce"))?;
        // AD order mirrors the AP's view of the exchange.
        let ads: [&[u8]; 5] = [&self.bssid, &self.sta_addr, &anonce, &self.snonce, frame_head];
        let plaintext = match siv::aead_decrypt(kek, &ads, data) {
            Ok(plaintext) => plaintext,
            Err(e) => return self.fail(e),
        };
        match self.install_key_elements(&plaintext) {
            Ok(()) => {}
            Err(e) => return self.fail(e),
        }
        self.state = State::Connected;
        Ok(plaintext)
    }

    fn install_key_elements(&mut self, key_data: &[u8]) -> Result<()> {
        for element in kde::extract_elements(key_data)? {
            match element {
                Element::Gtk(_, gtk) => self.gtk = Some(gtk),
                Element::Igtk(_, igtk) => self.igtk = Some(igtk),
                Element::UnsupportedKde(hdr) => {
                    debug!("ignoring unsupported KDE data type {}", hdr.data_type)
                }
                Element::Padding => {}
            }
        }
        if self.gtk.is_none() {
            return Err(Error::MissingGtk);
        }
        Ok(())
    }

    /// Consumes the completed session, handing the installable keys to the
    /// caller. Everything left behind is zeroized on drop.
    pub fn into_keys(mut self) -> Result<ConnectionKeys> {
        self.expect_state(State::Connected)?;
        // All fields are present in Connected; treat anything else as a bug.
        match (self.pmk.take(), self.pmkid.take(), self.tk.take(), self.gtk.take()) {
            (Some(pmk), Some(pmkid), Some(tk), Some(gtk)) => {
                Ok(ConnectionKeys { pmk, pmkid, tk, gtk, igtk: self.igtk.take() })
            }
            _ => Err(Error::InvalidState("connected without key material")),
        }
    }

    pub fn pmk(&self) -> Option<&[u8]> {
        self.pmk.as_deref().map(|k| &k[..])
    }

    pub fn pmkid(&self) -> Option<&[u8; 16]> {
        self.pmkid.as_ref()
    }

    pub fn tk(&self) -> Option<&[u8]> {
        self.tk.as_deref().map(|k| &k[..])
    }

    pub fn is_failed(&self) -> bool {
        self.state == State::Failed
    }
}

// RFC 6696, 4.1: rIK = KDF(rRK, label | 0x00 | cryptosuite | length).
fn derive_rik(rrk: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut seed = Vec::with_capacity(RIK_LABEL.len() + 4);
    seed.extend_from_slice(RIK_LABEL);
    seed.push(0);
    seed.push(CRYPTOSUITE_HMAC_SHA256_128);
    seed.extend_from_slice(&(RIK_LEN as u16).to_be_bytes());
    Zeroizing::new(prf_plus(HashKind::Sha256, rrk, &seed, RIK_LEN))
}

// RFC 6696, 4.3: rMSK = KDF(rRK, label | 0x00 | SEQ | length).
fn derive_rmsk(rrk: &[u8], seq: u16) -> Zeroizing<Vec<u8>> {
    let mut seed = Vec::with_capacity(RMSK_LABEL.len() + 5);
    seed.extend_from_slice(RMSK_LABEL);
    seed.push(0);
    seed.extend_from_slice(&seq.to_be_bytes());
    seed.extend_from_slice(&(RMSK_LEN as u16).to_be_bytes());
    Zeroizing::new(prf_plus(HashKind::Sha256, rrk, &seed, RMSK_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erp::{ErpHeader, ERP_HEADER_LEN, EAP_CODE_FINISH, EAP_TYPE_REAUTH};
    use crate::kde::{Gtk, GtkInfoTx, Igtk, Writer};
    use zerocopy::byteorder::U16;
    use zerocopy::AsBytes;

    const STA: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
    const AP: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
    const SNONCE: [u8; FILS_NONCE_LEN] = [0x11; FILS_NONCE_LEN];
    const ANONCE: [u8; FILS_NONCE_LEN] = [0x22; FILS_NONCE_LEN];
    const RRK: [u8; 64] = [0x77; 64];

    fn erp_credentials() -> ErpCredentials {
        ErpCredentials {
            keyname_nai: b"sta@example.org".to_vec(),
            rrk: Zeroizing::new(RRK.to_vec()),
            next_seq: 5,
        }
    }

    fn new_session(akm: FilsAkm, cipher: Cipher) -> FilsSession {
        FilsSession::new(akm, cipher, STA, AP, SNONCE, Some(erp_credentials()))
    }

    // Server-side EAP-Finish/Re-auth, authenticated with the same rIK the
    // station derives.
    fn build_finish(seq: u16) -> Vec<u8> {
        let rik = derive_rik(&RRK);
        let attrs = {
            let mut a = vec![1u8, 15];
            a.extend_from_slice(b"sta@example.org");
            a
        };
        let total = ERP_HEADER_LEN + attrs.len() + 1 + 16;
        let header = ErpHeader {
            code: EAP_CODE_FINISH,
            identifier: 1,
            length: U16::new(total as u16),
            type_: EAP_TYPE_REAUTH,
            flags: 0,
            seq: U16::new(seq),
        };
        let mut packet = Vec::with_capacity(total);
        packet.extend_from_slice(header.as_bytes());
        packet.extend_from_slice(&attrs);
        packet.push(CRYPTOSUITE_HMAC_SHA256_128);
        let tag = hmac_hash(HashKind::Sha256, &rik, &[&packet]);
        packet.extend_from_slice(&tag[..16]);
        packet
    }

    fn authenticated_session(akm: FilsAkm, cipher: Cipher) -> FilsSession {
        let mut session = new_session(akm, cipher);
        session.build_auth_wrapped_data(1).expect("build failed").expect("no packet");
        session.process_auth_wrapped_data(ANONCE, &build_finish(5)).expect("process failed");
        session.derive_ptk_material().expect("derive failed");
        session
    }

    #[test]
    fn ptk_material_lengths_sha256() {
        let session = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        assert_eq!(session.ick.as_ref().unwrap().len(), 32);
        assert_eq!(session.kek.as_ref().unwrap().len(), 32);
        assert_eq!(session.tk().unwrap().len(), 16);
        assert!(session.fils_ft.is_none());
        assert_eq!(session.pmk().unwrap().len(), 32);
    }

    #[test]
    fn ptk_material_lengths_sha384_ft() {
        let session = authenticated_session(FilsAkm::FtFilsSha384, Cipher::Gcmp256);
        assert_eq!(session.ick.as_ref().unwrap().len(), 48);
        assert_eq!(session.kek.as_ref().unwrap().len(), 64);
        assert_eq!(session.tk().unwrap().len(), 32);
        assert_eq!(session.fils_ft.as_ref().unwrap().len(), 48);
        assert_eq!(session.pmk().unwrap().len(), 48);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        let b = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        assert_eq!(a.pmk().unwrap(), b.pmk().unwrap());
        assert_eq!(a.pmkid().unwrap(), b.pmkid().unwrap());
        assert_eq!(a.tk().unwrap(), b.tk().unwrap());
    }

    #[test]
    fn flipped_auth_tag_bit_populates_nothing() {
        let mut session = new_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        session.build_auth_wrapped_data(1).expect("build failed");
        let mut finish = build_finish(5);
        let last = finish.len() - 1;
        finish[last] ^= 0x01;
        assert_eq!(
            session.process_auth_wrapped_data(ANONCE, &finish),
            Err(Error::AuthTagMismatch)
        );
        assert!(session.pmk().is_none());
        assert!(session.pmkid().is_none());
        assert!(session.is_failed());
        // The session stays poisoned.
        assert_eq!(session.derive_ptk_material(), Err(Error::InvalidState("failed")));
    }

    #[test]
    fn stale_finish_sequence_rejected() {
        let mut session = new_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        session.build_auth_wrapped_data(1).expect("build failed");
        assert_eq!(
            session.process_auth_wrapped_data(ANONCE, &build_finish(4)),
            Err(Error::ErpSequenceStale { sent: 5, got: 4 })
        );
        assert!(session.is_failed());
    }

    #[test]
    fn erp_sequence_increments_per_build() {
        let mut session = new_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        let packet = session.build_auth_wrapped_data(1).unwrap().unwrap();
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 5);
        assert_eq!(session.erp.as_ref().unwrap().next_seq, 6);
    }

    #[test]
    fn key_confirmation_is_asymmetric() {
        let session = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        let sta_tag = session.sta_key_confirmation().expect("no STA tag");
        // The AP's tag swaps nonce and address order; the two must differ.
        let ick = session.ick.as_ref().unwrap();
        let ap_tag = hmac_hash(HashKind::Sha256, ick, &[&ANONCE, &SNONCE, &AP, &STA]);
        assert_ne!(sta_tag, ap_tag);

        let mut session = session;
        session.verify_ap_key_confirmation(&ap_tag).expect("AP tag must verify");
        assert_eq!(
            session.verify_ap_key_confirmation(&sta_tag),
            Err(Error::KeyConfirmationMismatch)
        );
    }

    #[test]
    fn assoc_exchange_round_trip() {
        let mut session = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        let kek = session.kek.as_ref().unwrap().to_vec();

        let request_head = b"assoc-req-header";
        let protected =
            session.aead_encrypt_frame(request_head, b"request elements").expect("encrypt failed");
        // The AP decrypts with the mirrored AD order.
        let ap_ads: [&[u8]; 5] = [&STA, &AP, &SNONCE, &ANONCE, request_head];
        let recovered = siv::aead_decrypt(&kek, &ap_ads, &protected).expect("AP decrypt failed");
        assert_eq!(recovered, b"request elements");

        // AP response carrying GTK and IGTK KDEs.
        let mut writer = Writer::new();
        writer.write_gtk(&Gtk::new(1, GtkInfoTx::BothRxTx, &[0xAB; 16]));
        writer.write_igtk(&Igtk::new(4, &[1, 2, 3, 4, 5, 6], &[0xCD; 16]));
        let key_data = writer.finalize();
        let response_head = b"assoc-resp-header";
        let resp_ads: [&[u8]; 5] = [&AP, &STA, &ANONCE, &SNONCE, response_head];
        let protected_resp = siv::aead_encrypt(&kek, &resp_ads, &key_data).expect("AP encrypt");

        session.aead_decrypt_frame(response_head, &protected_resp).expect("decrypt failed");
        let keys = session.into_keys().expect("no keys");
        assert_eq!(keys.gtk.gtk, vec![0xAB; 16]);
        assert_eq!(keys.igtk.expect("no IGTK").ipn, [1, 2, 3, 4, 5, 6]);
        assert_eq!(keys.tk.len(), 16);
    }

    #[test]
    fn assoc_response_without_gtk_rejected() {
        let mut session = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        let kek = session.kek.as_ref().unwrap().to_vec();
        session.aead_encrypt_frame(b"head", b"req").expect("encrypt failed");

        let mut writer = Writer::new();
        writer.write_igtk(&Igtk::new(4, &[0; 6], &[0xCD; 16]));
        let key_data = writer.finalize();
        let resp_ads: [&[u8]; 5] = [&AP, &STA, &ANONCE, &SNONCE, b"head2"];
        let protected = siv::aead_encrypt(&kek, &resp_ads, &key_data).expect("AP encrypt");

        assert_eq!(session.aead_decrypt_frame(b"head2", &protected), Err(Error::MissingGtk));
        assert!(session.is_failed());
    }

    #[test]
    fn tampered_assoc_response_rejected() {
        let mut session = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        let kek = session.kek.as_ref().unwrap().to_vec();
        session.aead_encrypt_frame(b"head", b"req").expect("encrypt failed");

        let resp_ads: [&[u8]; 5] = [&AP, &STA, &ANONCE, &SNONCE, b"head"];
        let mut protected = siv::aead_encrypt(&kek, &resp_ads, b"key data").expect("AP encrypt");
        protected[0] ^= 0x80;
        assert_eq!(session.aead_decrypt_frame(b"head", &protected), Err(Error::SivMismatch));
        assert!(session.is_failed());
    }

    #[test]
    fn operations_gated_by_state() {
        let mut session = new_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        assert_eq!(session.derive_ptk_material(), Err(Error::InvalidState("idle")));
        assert_eq!(
            session.aead_encrypt_frame(b"", b""),
            Err(Error::InvalidState("idle"))
        );
        session.build_auth_wrapped_data(1).expect("build failed");
        assert_eq!(
            session.build_auth_wrapped_data(1),
            Err(Error::InvalidState("auth-request-built"))
        );
    }

    #[test]
    fn pmksa_path_skips_erp() {
        let mut session = FilsSession::new(FilsAkm::FilsSha256, Cipher::Ccmp128, STA, AP, SNONCE, None);
        assert_eq!(session.build_auth_wrapped_data(1), Ok(None));
        session
            .adopt_pmksa(ANONCE, Zeroizing::new(vec![0x42; 32]), [9; 16])
            .expect("adopt failed");
        session.derive_ptk_material().expect("derive failed");
        assert_eq!(session.tk().unwrap().len(), 16);
    }

    #[test]
    fn ft_pmkr1_name_requires_ft_akm() {
        let session = authenticated_session(FilsAkm::FilsSha256, Cipher::Ccmp128);
        assert_eq!(
            session.ft_pmkr1_name(b"ssid", &[0, 1], b"r0kh", &[1; 6]),
            Err(Error::InvalidState("AKM is not FT"))
        );

        let session = authenticated_session(FilsAkm::FtFilsSha384, Cipher::Gcmp256);
        let name = session
            .ft_pmkr1_name(b"ssid", &[0, 1], b"r0kh", &[1; 6])
            .expect("FT name derivation failed");
        assert_ne!(name, [0; 16]);
    }
}
