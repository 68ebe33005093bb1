use crate::{EndpointConfig, GatewayConfig};
use tracing::debug;

// For signature verification
use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Helper function for verifying a `sha256=<hex>` HMAC webhook signature
pub fn verify_signature(secret: &[u8], payload: &[u8], signature_header: &str) -> bool {
    let Some(hex_signature) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        debug!("Signature header is missing the sha256= prefix");
        return false;
    };

    let signature = match hex_decode(hex_signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            debug!("Signature header is not valid hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&signature).is_ok()
}

/// Computes the `sha256=<hex>` header value for a payload.
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Finds the endpoint config with the given name.
pub fn find_endpoint<'a>(config: &'a GatewayConfig, name: &str) -> Option<&'a EndpointConfig> {
    config.endpoint.iter().find(|endpoint| endpoint.name == name)
}

pub fn find_endpoint_owned(config: &GatewayConfig, name: &str) -> Option<EndpointConfig> {
    find_endpoint(config, name).cloned()
}
