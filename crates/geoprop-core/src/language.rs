//! Request language resolution and multilingual field selection.

use crate::property::LocalizedText;

/// One entry of an `Accept-Language` header.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguagePreference {
    /// Lower-cased primary subtag, e.g. `fr` for `fr-FR`.
    pub primary: String,
    pub quality: f32,
}

/// Parses an `Accept-Language` header into preferences ordered by quality.
///
/// Entries with `q=0`, unparseable weights, wildcards, or malformed tags are
/// dropped. Equal weights keep header order.
#[must_use]
pub fn parse_accept_language(header: &str) -> Vec<LanguagePreference> {
    let mut prefs: Vec<LanguagePreference> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = pieces.next()?.trim();
            let primary = tag.split('-').next()?.trim().to_ascii_lowercase();
            if primary.is_empty()
                || primary.len() > 8
                || !primary.chars().all(|c| c.is_ascii_alphabetic())
            {
                return None;
            }

            let mut quality = 1.0_f32;
            for param in pieces {
                if let Some(raw) = param.trim().strip_prefix("q=") {
                    quality = raw.trim().parse::<f32>().ok()?;
                }
            }
            if !(quality > 0.0 && quality <= 1.0) {
                return None;
            }

            Some(LanguagePreference { primary, quality })
        })
        .collect();

    prefs.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    prefs
}

/// Picks the language for a request.
///
/// An explicit option wins, then the top-quality `Accept-Language` entry,
/// then `default_language`.
#[must_use]
pub fn resolve_language(
    explicit: Option<&str>,
    accept_language: Option<&str>,
    default_language: &str,
) -> String {
    if let Some(primary) = explicit
        .and_then(|lang| lang.split('-').next())
        .map(|lang| lang.trim().to_ascii_lowercase())
        .filter(|lang| !lang.is_empty())
    {
        return primary;
    }

    accept_language
        .and_then(|header| parse_accept_language(header).into_iter().next())
        .map_or_else(|| default_language.to_string(), |pref| pref.primary)
}

/// Resolves a multilingual map to one string.
///
/// Prefers `language`; otherwise the first non-empty value in key order.
#[must_use]
pub fn resolve_localized(text: &LocalizedText, language: &str) -> Option<String> {
    text.get(language)
        .filter(|value| !value.is_empty())
        .or_else(|| text.values().find(|value| !value.is_empty()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanish_header_resolves_to_es() {
        assert_eq!(
            resolve_language(None, Some("es-ES,es;q=0.9,en;q=0.8"), "en"),
            "es"
        );
    }

    #[test]
    fn french_header_resolves_to_fr() {
        assert_eq!(
            resolve_language(None, Some("fr-FR,fr;q=0.9,en;q=0.8"), "en"),
            "fr"
        );
    }

    #[test]
    fn higher_quality_wins_over_header_order() {
        assert_eq!(
            resolve_language(None, Some("en;q=0.3, de;q=0.9"), "fr"),
            "de"
        );
    }

    #[test]
    fn empty_or_absent_header_uses_default() {
        assert_eq!(resolve_language(None, Some(""), "en"), "en");
        assert_eq!(resolve_language(None, None, "en"), "en");
        assert_eq!(resolve_language(None, Some("*"), "pt"), "pt");
    }

    #[test]
    fn explicit_language_beats_header() {
        assert_eq!(
            resolve_language(Some("IT"), Some("es-ES,es;q=0.9"), "en"),
            "it"
        );
        assert_eq!(resolve_language(Some("  "), Some("es"), "en"), "es");
    }

    #[test]
    fn zero_and_invalid_quality_entries_are_dropped() {
        let prefs = parse_accept_language("fr;q=0, de;q=abc, nl;q=0.5");
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].primary, "nl");
    }

    #[test]
    fn localized_prefers_requested_language() {
        let mut text = LocalizedText::new();
        text.insert("en".into(), "Flat".into());
        text.insert("fr".into(), "Appartement".into());
        assert_eq!(resolve_localized(&text, "fr").as_deref(), Some("Appartement"));
    }

    #[test]
    fn localized_falls_back_to_first_value_in_key_order() {
        let mut text = LocalizedText::new();
        text.insert("it".into(), "Appartamento".into());
        text.insert("de".into(), "Wohnung".into());
        assert_eq!(resolve_localized(&text, "es").as_deref(), Some("Wohnung"));
        assert_eq!(resolve_localized(&LocalizedText::new(), "es"), None);
    }
}
