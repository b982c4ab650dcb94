//! Decoding of `application/x-www-form-urlencoded` bodies.
//!
//! Keys and values are `&`-separated `key=value` pairs. `+` stands for a
//! space and `%XX` runs are bytes in the request's character encoding.

use encoding_rs::Encoding;
use percent_encoding::percent_decode_str;

use crate::api::ParameterDecodingDegraded;
use crate::prometheus::report_parameter_decoding_degraded;
use crate::request::ParameterMap;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Used when the request does not declare a character encoding.
pub const DEFAULT_ENCODING: &str = "ISO-8859-1";

/// Resolves a charset label the way browsers do, so `latin1` and
/// `ISO-8859-1` both map to windows-1252.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, ParameterDecodingDegraded> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| ParameterDecodingDegraded::UnsupportedEncoding(label.to_string()))
}

/// Whether a `Content-Type` value announces form-urlencoded content.
///
/// This is a plain substring check, so media type parameters or unrelated
/// types embedding the token also match.
pub fn is_form_urlencoded(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains(FORM_URLENCODED))
}

/// Decodes one key or value.
fn url_decode(
    raw: &str,
    encoding: &Result<&'static Encoding, ParameterDecodingDegraded>,
) -> Result<String, ParameterDecodingDegraded> {
    let encoding = encoding.clone()?;
    let bytes = raw.as_bytes();
    let mut decoded = String::with_capacity(raw.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                decoded.push(' ');
                i += 1;
            }
            b'%' => {
                let start = i;
                while i < bytes.len() && bytes[i] == b'%' {
                    let well_formed = bytes.len() > i + 2
                        && bytes[i + 1].is_ascii_hexdigit()
                        && bytes[i + 2].is_ascii_hexdigit();
                    if !well_formed {
                        return Err(ParameterDecodingDegraded::MalformedEscape(raw.to_string()));
                    }
                    i += 3;
                }
                let escaped: Vec<u8> = percent_decode_str(&raw[start..i]).collect();
                let (text, _) = encoding.decode_without_bom_handling(&escaped);
                decoded.push_str(&text);
            }
            _ => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'+' && bytes[i] != b'%' {
                    i += 1;
                }
                decoded.push_str(&raw[start..i]);
            }
        }
    }

    Ok(decoded)
}

/// Parses a form body.
///
/// Segments without a key before `=` keep their raw text as the key, and a
/// `=` with nothing after it yields a `None` value.
pub fn parse_form(body: &[u8], encoding: &str) -> Result<ParameterMap, ParameterDecodingDegraded> {
    let encoding = encoding_for_label(encoding);
    let body = String::from_utf8_lossy(body);
    let mut params = ParameterMap::new();

    for pair in body.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(idx) if idx > 0 => {
                let key = url_decode(&pair[..idx], &encoding)?;
                let value = if pair.len() > idx + 1 {
                    Some(url_decode(&pair[idx + 1..], &encoding)?)
                } else {
                    None
                };
                (key, value)
            }
            _ => (pair.to_string(), None),
        };

        params.entry(key).or_default().push(value);
    }

    Ok(params)
}

/// Overlays the parameters parsed from `body` on `native`. Parsed keys
/// replace native ones entirely.
pub fn merge_form_parameters(
    native: ParameterMap,
    body: &[u8],
    encoding: Option<&str>,
) -> Result<ParameterMap, ParameterDecodingDegraded> {
    let parsed = parse_form(body, encoding.unwrap_or(DEFAULT_ENCODING))?;
    let mut params = native;
    params.extend(parsed);
    Ok(params)
}

/// Like [`merge_form_parameters`], falling back to the native parameters
/// when the body cannot be decoded.
pub fn form_parameters_or_native(
    native: ParameterMap,
    body: &[u8],
    encoding: Option<&str>,
) -> ParameterMap {
    match merge_form_parameters(native.clone(), body, encoding) {
        Ok(params) => params,
        Err(e) => {
            tracing::error!("could not decode form parameters, using request parameters: {}", e);
            report_parameter_decoding_degraded();
            native
        }
    }
}
