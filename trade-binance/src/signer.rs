use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

/// Query parameters, kept sorted by key so encoding is canonical.
pub type QueryParams = BTreeMap<&'static str, String>;

/// Form-urlencode `params` in key order, pairs joined with `&`.
pub fn encode_query(params: &QueryParams) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Lowercase hex HMAC-SHA256 of the canonical encoding of `params`.
///
/// The caller appends the result as the `signature` parameter.
pub fn sign(secret_key: &str, params: &QueryParams) -> String {
    hmac_sha256_hex(secret_key, &encode_query(params))
}

pub fn hmac_sha256_hex(secret_key: &str, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
