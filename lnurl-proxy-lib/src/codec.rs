//! LNURL locator codec.
//!
//! An LNURL is the callback URL bech32-encoded under the `lnurl` human
//! readable part and presented in upper case (it is usually rendered as a QR
//! code, where upper case compresses better).
//!
//! # Example
//!
//! ```
//! use lnurl_proxy_lib::codec;
//!
//! let lnurl = codec::encode("https://example.com/withdraw?id=abc").unwrap();
//! assert!(lnurl.starts_with("LNURL1"));
//! assert_eq!(
//!     codec::decode(&lnurl).unwrap(),
//!     "https://example.com/withdraw?id=abc"
//! );
//! ```

use crate::CodecError;
use bech32::{Bech32, Hrp};

/// Human readable part of every LNURL.
pub const LNURL_HRP: &str = "lnurl";

/// URI scheme wallets may prepend to an LNURL.
const LIGHTNING_SCHEME: &str = "lightning:";

/// Encode a URL into its upper-case LNURL form.
pub fn encode(url: &str) -> Result<String, CodecError> {
    let hrp = Hrp::parse(LNURL_HRP).map_err(|e| CodecError::Encode(e.to_string()))?;
    bech32::encode_upper::<Bech32>(hrp, url.as_bytes())
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode an LNURL (either case, optionally `lightning:`-prefixed) back into
/// the URL it carries.
pub fn decode(locator: &str) -> Result<String, CodecError> {
    let trimmed = locator.trim();
    let bech = match trimmed.get(..LIGHTNING_SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LIGHTNING_SCHEME) => {
            &trimmed[LIGHTNING_SCHEME.len()..]
        }
        _ => trimmed,
    };

    let (hrp, data) = bech32::decode(bech).map_err(|e| CodecError::Decode(e.to_string()))?;
    let hrp = hrp.to_string();
    if !hrp.eq_ignore_ascii_case(LNURL_HRP) {
        return Err(CodecError::UnexpectedHrp(hrp));
    }

    String::from_utf8(data).map_err(|_| CodecError::InvalidUtf8)
}

/// Extract the withdraw id from the `id` query parameter of a callback URL.
///
/// Returns `None` when the URL has no (or an empty) `id` parameter.
pub fn withdraw_id_from_url(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "id")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Pluggable locator encoding used by the registry.
///
/// [`Bech32Codec`] is the only production implementation; the trait exists so
/// tests can exercise codec failures.
pub trait LocatorCodec: Send + Sync {
    /// Encode a callback URL into a wallet-facing locator.
    fn encode(&self, url: &str) -> Result<String, CodecError>;

    /// Decode a wallet-facing locator back into its URL.
    fn decode(&self, locator: &str) -> Result<String, CodecError>;
}

/// Standard LNURL bech32 codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bech32Codec;

impl LocatorCodec for Bech32Codec {
    fn encode(&self, url: &str) -> Result<String, CodecError> {
        encode(url)
    }

    fn decode(&self, locator: &str) -> Result<String, CodecError> {
        decode(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_upper_case_lnurl() {
        let lnurl = encode("https://service.com/api?q=3fc3645b439ce8e7").unwrap();
        assert!(lnurl.starts_with("LNURL1"));
        assert_eq!(lnurl, lnurl.to_uppercase());
    }

    #[test]
    fn test_decode_accepts_lower_case_and_lightning_prefix() {
        let url = "https://service.com/withdraw?id=42";
        let lnurl = encode(url).unwrap();

        assert_eq!(decode(&lnurl.to_lowercase()).unwrap(), url);
        assert_eq!(decode(&format!("lightning:{}", lnurl)).unwrap(), url);
        assert_eq!(decode(&format!("LIGHTNING:{}", lnurl)).unwrap(), url);
    }

    #[test]
    fn test_long_urls_are_not_limited_to_90_chars() {
        let url = format!("https://service.com/withdraw?id={}", "a".repeat(200));
        let lnurl = encode(&url).unwrap();
        assert!(lnurl.len() > 90);
        assert_eq!(decode(&lnurl).unwrap(), url);
    }

    #[test]
    fn test_decode_rejects_other_hrp() {
        let hrp = Hrp::parse("npub").unwrap();
        let other = bech32::encode::<Bech32>(hrp, b"https://x.com").unwrap();
        assert!(matches!(decode(&other), Err(CodecError::UnexpectedHrp(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not-an-lnurl"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_withdraw_id_from_url() {
        assert_eq!(
            withdraw_id_from_url("https://gude/withdraw?id=4324;4345-53453"),
            Some("4324;4345-53453".to_string())
        );
        assert_eq!(
            withdraw_id_from_url("https://gude/withdraw?x=1&id=a%20b"),
            Some("a b".to_string())
        );
        assert_eq!(withdraw_id_from_url("https://gude/withdraw?id="), None);
        assert_eq!(withdraw_id_from_url("https://gude/withdraw"), None);
    }
}
