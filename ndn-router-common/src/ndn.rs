//! Interest, Data and Name, with their TLV wire codecs.
//!
//! These are the packet types the forwarding plane moves around. The
//! registration workflow additionally leans on [`SignatureInfo`] to pick
//! apart signed command names.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
mod tests;

/// Maximum size of an NDN packet.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// SignatureType value for a plain SHA-256 digest signature.
pub const SIGNATURE_DIGEST_SHA256: u64 = 0;

/* ---------------------------------------------------------------- *\
 * Name and NameComponent
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT {
            return Err(Error::NdnPacket(format!(
                "type {} is not a name component TLV",
                element.tlv_type
            )));
        }
        if element.value.is_empty() {
            return Err(Error::NdnPacket("zero-length name component".into()));
        }
        Ok(Self(element.value.clone()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self.0.iter().all(|&b| b.is_ascii_graphic() || b == b' ');
        if printable && !self.0.is_empty() {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in &self.0 {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a URI-style name such as `/app/video/1`. Empty components are
    /// ignored, so `"/"` and `""` both yield the root name.
    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(comp.as_bytes().to_vec()))
            .collect();
        Self { components }
    }

    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns the name truncated to its first `len` components.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::NdnPacket(format!(
                "type {} is not a Name TLV",
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&e)?);
        }
        Ok(Self { components })
    }

    /// Decodes a full Name TLV (type, length and components) from raw bytes.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = bytes;
        let element = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&element)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

/* ---------------------------------------------------------------- *\
 * Interest
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime_ms: Option<u64>,
    pub hop_limit: Option<u8>,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let nonce = (now.as_nanos() % u32::MAX as u128) as u32;

        Self {
            name,
            nonce,
            lifetime_ms: None,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
        }
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_lifetime(mut self, lifetime_ms: u64) -> Self {
        self.lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        self.name.to_tlv().encode(&mut buf);
        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut buf);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NONCE, self.nonce.to_be_bytes().to_vec()).encode(&mut buf);
        if let Some(lifetime) = self.lifetime_ms {
            let mut value = BytesMut::new();
            tlv::encode_nonneg_int(lifetime, &mut value);
            TlvElement::new(tlv::TLV_INTEREST_LIFETIME, value.freeze()).encode(&mut buf);
        }
        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, vec![hop_limit]).encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_INTEREST, buf.freeze())
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.to_tlv().encode(&mut buf);
        buf.freeze()
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::NdnPacket(format!(
                "type {} is not an Interest TLV",
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let first = TlvElement::decode(&mut buf)?;
        let name = Name::from_tlv(&first)?;

        let mut interest = Self {
            name,
            nonce: 0,
            lifetime_ms: None,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
        };

        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            match e.tlv_type {
                tlv::TLV_CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_NONCE => {
                    if e.value.len() != 4 {
                        return Err(Error::NdnPacket(format!(
                            "Nonce must be 4 bytes, got {}",
                            e.value.len()
                        )));
                    }
                    interest.nonce =
                        u32::from_be_bytes([e.value[0], e.value[1], e.value[2], e.value[3]]);
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    interest.lifetime_ms = Some(tlv::decode_nonneg_int(&e.value)?);
                }
                tlv::TLV_HOP_LIMIT => {
                    if e.value.len() == 1 {
                        interest.hop_limit = Some(e.value[0]);
                    }
                }
                // Unrecognized fields (selectors, parameters) are skipped.
                _ => {}
            }
        }

        Ok(interest)
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = bytes;
        let element = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&element)
    }
}

/* ---------------------------------------------------------------- *\
 * SignatureInfo
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature_type: u64,
    pub key_locator: Option<Name>,
}

impl SignatureInfo {
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        let mut sig_type = BytesMut::new();
        tlv::encode_nonneg_int(self.signature_type, &mut sig_type);
        TlvElement::new(tlv::TLV_SIGNATURE_TYPE, sig_type.freeze()).encode(&mut buf);
        if let Some(key_name) = &self.key_locator {
            let mut locator = BytesMut::new();
            key_name.to_tlv().encode(&mut locator);
            TlvElement::new(tlv::TLV_KEY_LOCATOR, locator.freeze()).encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_SIGNATURE_INFO, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_SIGNATURE_INFO {
            return Err(Error::NdnPacket(format!(
                "type {} is not a SignatureInfo TLV",
                element.tlv_type
            )));
        }

        let mut info = Self::default();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            match e.tlv_type {
                tlv::TLV_SIGNATURE_TYPE => {
                    info.signature_type = tlv::decode_nonneg_int(&e.value)?;
                }
                tlv::TLV_KEY_LOCATOR => {
                    let mut locator = e.value.clone();
                    let inner = TlvElement::decode(&mut locator)?;
                    // Only Name key locators are understood; digests are skipped.
                    if inner.tlv_type == tlv::TLV_NAME {
                        info.key_locator = Some(Name::from_tlv(&inner)?);
                    }
                }
                _ => {}
            }
        }
        Ok(info)
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = bytes;
        let element = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&element)
    }
}

impl Default for SignatureInfo {
    fn default() -> Self {
        Self {
            signature_type: SIGNATURE_DIGEST_SHA256,
            key_locator: None,
        }
    }
}

/* ---------------------------------------------------------------- *\
 * Data
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub name: Name,
    pub freshness_ms: Option<u64>,
    pub content: Bytes,
    pub signature_info: SignatureInfo,
    pub signature_value: Bytes,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            freshness_ms: None,
            content: content.into(),
            signature_info: SignatureInfo::default(),
            signature_value: Bytes::new(),
        }
    }

    pub fn with_freshness(mut self, freshness_ms: u64) -> Self {
        self.freshness_ms = Some(freshness_ms);
        self
    }

    fn signed_portion_into(&self, buf: &mut BytesMut) {
        self.name.to_tlv().encode(buf);
        if let Some(freshness) = self.freshness_ms {
            let mut period = BytesMut::new();
            tlv::encode_nonneg_int(freshness, &mut period);
            let mut meta = BytesMut::new();
            TlvElement::new(tlv::TLV_FRESHNESS_PERIOD, period.freeze()).encode(&mut meta);
            TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(buf);
        }
        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(buf);
        self.signature_info.to_tlv().encode(buf);
    }

    /// The byte range a signature covers: Name through SignatureInfo.
    pub fn signed_portion(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.signed_portion_into(&mut buf);
        buf.freeze()
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        self.signed_portion_into(&mut buf);
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature_value.clone()).encode(&mut buf);
        TlvElement::new(tlv::TLV_DATA, buf.freeze())
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.to_tlv().encode(&mut buf);
        buf.freeze()
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket(format!(
                "type {} is not a Data TLV",
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let first = TlvElement::decode(&mut buf)?;
        let name = Name::from_tlv(&first)?;

        let mut data = Self::new(name, Bytes::new());
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            match e.tlv_type {
                tlv::TLV_META_INFO => {
                    let mut meta = e.value.clone();
                    while meta.has_remaining() {
                        let m = TlvElement::decode(&mut meta)?;
                        if m.tlv_type == tlv::TLV_FRESHNESS_PERIOD {
                            data.freshness_ms = Some(tlv::decode_nonneg_int(&m.value)?);
                        }
                    }
                }
                tlv::TLV_CONTENT => data.content = e.value.clone(),
                tlv::TLV_SIGNATURE_INFO => data.signature_info = SignatureInfo::from_tlv(&e)?,
                tlv::TLV_SIGNATURE_VALUE => data.signature_value = e.value.clone(),
                _ => {}
            }
        }
        Ok(data)
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = bytes;
        let element = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&element)
    }
}

/* ---------------------------------------------------------------- *\
 * Packet
\* ---------------------------------------------------------------- */

/// Either kind of NDN packet a face can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}

impl Packet {
    /// Parses a packet from raw bytes, dispatching on the outer TLV type.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.first() {
            Some(&tlv::TLV_INTEREST) => Ok(Packet::Interest(Interest::from_wire(bytes)?)),
            Some(&tlv::TLV_DATA) => Ok(Packet::Data(Data::from_wire(bytes)?)),
            Some(&t) => Err(Error::NdnPacket(format!(
                "type {} is neither Interest nor Data",
                t
            ))),
            None => Err(Error::NdnPacket("zero-length packet".into())),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Packet::Interest(interest) => interest.to_bytes(),
            Packet::Data(data) => data.to_bytes(),
        }
    }

    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(interest) => &interest.name,
            Packet::Data(data) => &data.name,
        }
    }

    pub fn packet_type(&self) -> &'static str {
        match self {
            Packet::Interest(_) => "Interest",
            Packet::Data(_) => "Data",
        }
    }

    /// Looks at the start of a byte stream and reports how long the next
    /// packet frame is, once enough of the TLV header has arrived.
    ///
    /// Returns `Ok(None)` while the header is still incomplete, and an error
    /// when the stream cannot possibly carry a valid packet (wrong outer
    /// type, oversized frame) so the caller can tear the connection down.
    pub fn frame_length(buf: &[u8]) -> Result<Option<usize>, Error> {
        let Some(&packet_type) = buf.first() else {
            return Ok(None);
        };
        if packet_type != tlv::TLV_INTEREST && packet_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket(format!(
                "type {} is neither Interest nor Data",
                packet_type
            )));
        }
        let Some(&first) = buf.get(1) else {
            return Ok(None);
        };

        let (header_len, value_len) = match first {
            0..=252 => (2, first as usize),
            253 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (4, u16::from_be_bytes([buf[2], buf[3]]) as usize)
            }
            254 => {
                if buf.len() < 6 {
                    return Ok(None);
                }
                (6, u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize)
            }
            255 => return Err(Error::Tlv("8-byte TLV lengths are not handled".into())),
        };

        if header_len + value_len > MAX_NDN_PACKET_SIZE {
            return Err(Error::NdnPacket(format!(
                "Packet of {} bytes exceeds the {} byte limit",
                header_len + value_len,
                MAX_NDN_PACKET_SIZE
            )));
        }

        Ok(Some(header_len + value_len))
    }
}

/* ---------------------------------------------------------------- *\
 * ControlResponse
\* ---------------------------------------------------------------- */

/// Builds an NFD ControlResponse body: `{StatusCode, StatusText}`.
pub fn control_response(status_code: u64, status_text: &str) -> Bytes {
    let mut code = BytesMut::new();
    tlv::encode_nonneg_int(status_code, &mut code);
    let mut body = BytesMut::new();
    TlvElement::new(tlv::TLV_STATUS_CODE, code.freeze()).encode(&mut body);
    TlvElement::new(tlv::TLV_STATUS_TEXT, status_text.as_bytes().to_vec()).encode(&mut body);
    let mut buf = BytesMut::new();
    TlvElement::new(tlv::TLV_CONTROL_RESPONSE, body.freeze()).encode(&mut buf);
    buf.freeze()
}

/// The ControlResponse returned for an accepted prefix registration.
pub fn control_response_success() -> Bytes {
    control_response(200, "Success")
}
