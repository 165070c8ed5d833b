//! Reversible content handles.
//!
//! A handle is the URL's UTF-8 bytes in URL-safe base64 without padding,
//! so it survives query strings and JSON unescaped. Decoding accepts both
//! the URL-safe alphabet and the standard alphabet, padded or not.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};

use crate::Error;

/// Encode a URL into an opaque handle.
pub fn encode_handle(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

/// Decode a handle back into its URL.
///
/// # Errors
///
/// Returns `InvalidHandle` for blank input, bytes that are not base64 in
/// either alphabet, or a payload that is not UTF-8.
pub fn decode_handle(handle: &str) -> Result<String, Error> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(Error::InvalidHandle("empty handle".into()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(handle)
        .or_else(|_| STANDARD.decode(handle))
        .or_else(|_| STANDARD_NO_PAD.decode(handle))
        .map_err(|e| Error::InvalidHandle(format!("not base64: {e}")))?;

    String::from_utf8(bytes).map_err(|_| Error::InvalidHandle("payload is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_handle_is_url_safe() {
        let handle = encode_handle("https://example.com/search?q=a+b&lang=en#top");
        assert!(
            handle
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_decode_standard_alphabet() {
        // "https://a.io/?" in the standard alphabet, with and without padding.
        assert_eq!(decode_handle("aHR0cHM6Ly9hLmlvLz8=").unwrap(), "https://a.io/?");
        assert_eq!(decode_handle("aHR0cHM6Ly9hLmlvLz8").unwrap(), "https://a.io/?");
    }

    #[test]
    fn test_decode_malformed_handle() {
        for bad in ["", "   ", "not a handle!", "%%%"] {
            assert!(matches!(decode_handle(bad), Err(Error::InvalidHandle(_))), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let handle = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        let err = decode_handle(&handle).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_unicode_url_round_trip() {
        let url = "https://ja.wikipedia.org/wiki/所有権";
        assert_eq!(decode_handle(&encode_handle(url)).unwrap(), url);
    }

    proptest! {
        #[test]
        fn prop_handle_round_trips(url in "\\PC{0,200}") {
            prop_assume!(!url.trim().is_empty());
            prop_assert_eq!(decode_handle(&encode_handle(&url)).unwrap(), url);
        }
    }
}
