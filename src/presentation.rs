//! The wire presentation: deserialized straight off the client's JSON body,
//! then decoded into typed curve/scalar values the rest of the pipeline
//! works with.
//!
//! `Presentation` only ever derives `Deserialize` — the verifier never
//! re-serializes a presentation, so there is no round-trip to keep in sync.
//! Unknown JSON fields are ignored by default (serde's behavior unless
//! `deny_unknown_fields` is set, which it deliberately is not here).

#![allow(missing_docs)]

use p256::ProjectivePoint;
use serde::Deserialize;

use crate::crypto::{b64url_decode, decode_point, decode_scalar};
use crate::error::BrassError;
use crate::proof::DleqProof;

/// A DLEQ proof as it appears on the wire: two base64url-encoded scalars.
#[derive(Debug, Deserialize)]
pub struct DleqProofWire {
    pub c: String,
    pub r: String,
}

impl DleqProofWire {
    fn decode(&self) -> Result<DleqProof, BrassError> {
        let c = decode_scalar(&b64url_decode(&self.c)?)?;
        let r = decode_scalar(&b64url_decode(&self.r)?)?;
        Ok(DleqProof { c, r })
    }
}

/// The raw presentation as submitted by the client.
#[derive(Debug, Deserialize)]
pub struct Presentation {
    #[serde(rename = "KID")]
    pub kid: String,
    #[serde(rename = "AADr")]
    pub aad_r: String,
    pub origin: String,
    pub epoch: i64,
    #[serde(rename = "P")]
    pub p: String,
    #[serde(rename = "M")]
    pub m: String,
    #[serde(rename = "Z")]
    pub z: String,
    #[serde(rename = "Zprime")]
    pub z_prime: String,
    pub c: String,
    #[serde(rename = "piI")]
    pub pi_i: DleqProofWire,
    #[serde(rename = "piC")]
    pub pi_c: DleqProofWire,
    #[serde(default)]
    pub d_client: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub http_path: Option<String>,
    #[serde(default)]
    pub http_body_hash_b64: Option<String>,
    #[serde(default)]
    pub tls_exporter_b64: Option<String>,
}

/// A presentation with every field decoded into its typed form, ready for
/// the proof verifier and derivation layer. Presentations are ephemeral:
/// this value is built, consumed once by the handler, and dropped.
pub struct DecodedPresentation {
    pub kid: String,
    pub aad_r: String,
    pub origin: String,
    pub epoch: i64,
    pub p: ProjectivePoint,
    pub m: ProjectivePoint,
    pub z: ProjectivePoint,
    pub z_prime: ProjectivePoint,
    pub z_prime_enc: [u8; 33],
    pub c: Vec<u8>,
    pub pi_i: DleqProof,
    pub pi_c: DleqProof,
    pub d_client: Option<[u8; 32]>,
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    pub http_body_hash: Option<Vec<u8>>,
    pub tls_exporter: Option<Vec<u8>>,
}

impl Presentation {
    /// Decode and validate every point and scalar. Malformed base64url,
    /// wrong-length scalars, and the point codec's own checks (canonical
    /// form, on-curve, non-identity) all fail here before anything else in
    /// the pipeline runs.
    pub fn decode(&self) -> Result<DecodedPresentation, BrassError> {
        let p = decode_point(&b64url_decode(&self.p)?)?;
        let m = decode_point(&b64url_decode(&self.m)?)?;
        let z = decode_point(&b64url_decode(&self.z)?)?;
        let z_prime_bytes = b64url_decode(&self.z_prime)?;
        let z_prime = decode_point(&z_prime_bytes)?;
        let mut z_prime_enc = [0u8; 33];
        z_prime_enc.copy_from_slice(&z_prime_bytes);

        let c = b64url_decode(&self.c)?;
        let pi_i = self.pi_i.decode()?;
        let pi_c = self.pi_c.decode()?;

        let d_client = self
            .d_client
            .as_ref()
            .map(|s| b64url_decode(s))
            .transpose()?
            .map(|bytes| {
                let mut out = [0u8; 32];
                if bytes.len() != 32 {
                    return Err(BrassError::server_error("d_client must be 32 bytes"));
                }
                out.copy_from_slice(&bytes);
                Ok(out)
            })
            .transpose()?;

        let http_body_hash = self
            .http_body_hash_b64
            .as_ref()
            .map(|s| b64url_decode(s))
            .transpose()?;
        let tls_exporter = self
            .tls_exporter_b64
            .as_ref()
            .map(|s| b64url_decode(s))
            .transpose()?;

        Ok(DecodedPresentation {
            kid: self.kid.clone(),
            aad_r: self.aad_r.clone(),
            origin: self.origin.clone(),
            epoch: self.epoch,
            p,
            m,
            z,
            z_prime,
            z_prime_enc,
            c,
            pi_i,
            pi_c,
            d_client,
            http_method: self.http_method.clone(),
            http_path: self.http_path.clone(),
            http_body_hash,
            tls_exporter,
        })
    }
}
