//! Response body decoding with encoding fallback.

use encoding_rs::Encoding;

/// Encodings tried, in order, when a body is not valid in the declared charset.
pub const FALLBACK_ENCODINGS: [&str; 4] = ["utf-8", "latin-1", "cp1252", "iso-8859-1"];

/// Decode a response body.
///
/// The charset from the `Content-Type` header is tried first, then each of
/// [`FALLBACK_ENCODINGS`]. Returns `None` when no encoding decodes the body
/// without errors.
pub fn decode_body(bytes: &[u8], declared_charset: Option<&str>) -> Option<String> {
    declared_charset
        .into_iter()
        .chain(FALLBACK_ENCODINGS)
        .filter_map(|label| Encoding::for_label(label.trim().as_bytes()))
        .find_map(|encoding| {
            encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
        })
}

/// Extract the charset parameter from a `Content-Type` header value.
pub(crate) fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8() {
        let body = "Vakansiya: Məlumat analitiki".as_bytes();
        assert_eq!(
            decode_body(body, None).as_deref(),
            Some("Vakansiya: Məlumat analitiki")
        );
    }

    #[test]
    fn falls_back_to_latin1() {
        // "Café" in ISO-8859-1
        let body = [0x43, 0x61, 0x66, 0xE9];
        assert_eq!(decode_body(&body, None).as_deref(), Some("Café"));
    }

    #[test]
    fn declared_charset_wins() {
        // valid utf-8 for "é", but the server says windows-1252
        let body = [0xC3, 0xA9];
        assert_eq!(decode_body(&body, None).as_deref(), Some("é"));
        assert_eq!(
            decode_body(&body, Some("windows-1252")).as_deref(),
            Some("Ã©")
        );
    }

    #[test]
    fn fallback_chain_accepts_any_bytes() {
        let body: Vec<u8> = (0..=255).collect();
        let text = decode_body(&body, Some("utf-8")).unwrap();
        assert_eq!(text.chars().count(), 256);
    }

    #[test]
    fn unknown_declared_charset_is_skipped() {
        assert_eq!(
            decode_body(b"plain", Some("x-unknown")).as_deref(),
            Some("plain")
        );
    }

    #[test]
    fn parses_charset_parameter() {
        assert_eq!(
            charset_of("text/html; charset=\"ISO-8859-1\""),
            Some("ISO-8859-1")
        );
        assert_eq!(charset_of("text/html"), None);
        assert_eq!(charset_of("application/json;Charset=utf-8"), Some("utf-8"));
    }
}
