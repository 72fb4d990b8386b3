use encoding_rs::Encoding;
use std::borrow::Cow;
use tracing::warn;

/// Return the bytes as UTF-8, decoding with `fallback_label` (a WHATWG label
/// such as `EUC-KR`) when they are not valid UTF-8 already.
pub fn decode_to_utf8<'a>(bytes: &'a [u8], fallback_label: &str) -> Result<Cow<'a, str>, String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(Cow::Borrowed(s.strip_prefix('\u{feff}').unwrap_or(s)));
    }

    let encoding = Encoding::for_label(fallback_label.trim().as_bytes())
        .ok_or_else(|| format!("unknown fallback encoding {:?}", fallback_label))?;
    warn!(encoding = encoding.name(), "input is not UTF-8, transcoding");

    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(format!("input is neither UTF-8 nor valid {}", encoding.name()));
    }
    Ok(text)
}
