//! Webhook signature verification (Stripe scheme)
//!
//! Header format: `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. Each `v1` is
//! HMAC-SHA256 over `"<t>.<raw body>"` keyed with the endpoint secret. Any
//! matching `v1` is accepted; comparison is constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

pub fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    SignatureError::MalformedHeader("timestamp is not an integer".to_string())
                })?)
            }
            "v1" => signatures.push(hex::decode(value).map_err(|_| {
                SignatureError::MalformedHeader("v1 signature is not hex".to_string())
            })?),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader("missing v1 signature".to_string()));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::MalformedHeader("invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// `tolerance_secs <= 0` disables the timestamp check
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;

    let mut matched = false;
    for signature in &parsed.signatures {
        if mac_for(secret, parsed.timestamp, payload)?
            .verify_slice(signature)
            .is_ok()
        {
            matched = true;
            break;
        }
    }
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    let age_secs = now - parsed.timestamp;
    if tolerance_secs > 0 && age_secs.abs() > tolerance_secs {
        return Err(SignatureError::StaleTimestamp { age_secs });
    }

    Ok(())
}

#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mac = mac_for(secret, timestamp, payload).expect("HMAC can take key of any size");
    hex::encode(mac.finalize().into_bytes())
}
