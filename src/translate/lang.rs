//! Language code normalization and source-language detection.
//! Every code is collapsed to a bare ISO 639 primary subtag before it reaches
//! key derivation, queue grouping, or the provider, so regional variants share
//! one cache lane.

use std::sync::OnceLock;

use regex::Regex;

fn primary_subtag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2,3}$").expect("static regex"))
}

/// Canonical form of `code`, or `fallback` when `code` is not a usable tag.
///
/// `en-US`, `EN_us` and ` en ` all become `en`. Deprecated ISO codes are
/// mapped to their current form.
pub fn normalize_language_code(code: &str, fallback: &str) -> String {
    let lowered = code.trim().to_ascii_lowercase().replace('_', "-");
    let primary = lowered.split('-').next().unwrap_or_default();
    let canonical = match primary {
        "iw" => "he",
        "in" => "id",
        "ji" => "yi",
        "jw" => "jv",
        "mo" => "ro",
        other => other,
    };
    if primary_subtag().is_match(canonical) {
        canonical.to_string()
    } else {
        fallback.to_string()
    }
}

/// Detects the dominant language of `text` using whatlang.
/// Returns an ISO 639-1 code or None if detection is unreliable.
pub fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if !info.is_reliable() {
        return None;
    }
    lang_to_code(info.lang()).map(str::to_string)
}

fn lang_to_code(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang::*;
    let code = match lang {
        Eng => "en",
        Cmn => "zh",
        Jpn => "ja",
        Kor => "ko",
        Fra => "fr",
        Deu => "de",
        Spa => "es",
        Rus => "ru",
        Por => "pt",
        Ita => "it",
        Ara => "ar",
        Heb => "he",
        Hin => "hi",
        Tur => "tr",
        Vie => "vi",
        Tha => "th",
        Nld => "nl",
        Pol => "pl",
        Ukr => "uk",
        Swe => "sv",
        Ind => "id",
        _ => return None,
    };
    Some(code)
}
