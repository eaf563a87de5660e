//! Signing of locally produced Data packets.
//!
//! The router only ever signs the Data packets it synthesizes itself (the
//! registration replies), so a SHA-256 digest "signature" is all that is
//! needed here. Validation of producer signatures is the manager's job.

use crate::ndn::{Data, SignatureInfo, SIGNATURE_DIGEST_SHA256};
use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Signs Data packets on behalf of the router.
#[derive(Debug, Default)]
pub struct KeyChain;

impl KeyChain {
    pub fn new() -> Self {
        Self
    }

    /// Attaches a DigestSha256 signature covering Name through SignatureInfo.
    pub fn sign(&self, data: &mut Data) {
        data.signature_info = SignatureInfo {
            signature_type: SIGNATURE_DIGEST_SHA256,
            key_locator: None,
        };
        let digest = Sha256::digest(data.signed_portion());
        data.signature_value = Bytes::copy_from_slice(&digest);
    }

    /// Checks a DigestSha256 signature. Used by peers and tests; the router
    /// itself never verifies.
    pub fn verify(&self, data: &Data) -> bool {
        if data.signature_info.signature_type != SIGNATURE_DIGEST_SHA256 {
            return false;
        }
        let digest = Sha256::digest(data.signed_portion());
        data.signature_value.as_ref() == digest.as_slice()
    }
}
