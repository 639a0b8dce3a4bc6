//! Text-to-value parsers for the fields of a posting card.
//!
//! Every parser accepts whatever text the card happened to render and falls
//! back to `None` (or 0 for parking) instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;

const AREA_MARKER: &str = "m²";

static CONDO_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)condom[ií]nio").unwrap());
static BEDROOMS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*quartos?").unwrap());
static BATHROOMS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*ban").unwrap());
static PARKING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*vagas?").unwrap());
static DOTTED_THOUSANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{3})+$").unwrap());

/// Split a combined "R$ 2.500 R$ 450 Condominio" block into price and condo fee.
///
/// The first token is the price, the second the condo fee, but only when the
/// block has exactly two tokens. Any token that is not all digits is dropped.
pub fn parse_price_condo(raw: &str) -> (Option<i64>, Option<i64>) {
    let cleaned = raw.replace("R$", " ").replace('.', "");
    let cleaned = CONDO_WORD.replace_all(&cleaned, " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let price = tokens.first().and_then(|t| parse_digits(t));
    let condo = if tokens.len() == 2 {
        parse_digits(tokens[1])
    } else {
        None
    };

    (price, condo)
}

/// Usable area in square meters.
///
/// With two or more "m²" markers the second one is used (the first is usually
/// the total lot), otherwise the only one. The number is the token right
/// before the marker, or right after it when nothing numeric precedes it.
pub fn parse_area(features: &str) -> Option<f64> {
    let positions: Vec<usize> = features
        .match_indices(AREA_MARKER)
        .map(|(pos, _)| pos)
        .collect();

    let at = match positions.as_slice() {
        [] => return None,
        [only] => *only,
        [_, second, ..] => *second,
    };

    let before = &features[..at];
    let after = &features[at + AREA_MARKER.len()..];

    before
        .split_whitespace()
        .last()
        .and_then(parse_decimal)
        .or_else(|| after.split_whitespace().next().and_then(parse_decimal))
}

pub fn parse_bedrooms(features: &str) -> Option<u32> {
    capture_count(&BEDROOMS, features)
}

pub fn parse_bathrooms(features: &str) -> Option<u32> {
    capture_count(&BATHROOMS, features)
}

/// Parking spaces; a card without a "vagas" entry has none
pub fn parse_parking(features: &str) -> u32 {
    capture_count(&PARKING, features).unwrap_or(0)
}

/// District name from "Savassi, Belo Horizonte"
pub fn split_district(location: &str) -> Option<String> {
    location
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Street part of "Rua Pernambuco, 1000" when the text has a comma, else the whole text
pub fn split_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return None;
    }

    let segments: Vec<&str> = trimmed.split(',').collect();
    let picked = if segments.len() >= 2 {
        segments[0].trim()
    } else {
        trimmed
    };

    if picked.is_empty() {
        None
    } else {
        Some(picked.to_string())
    }
}

fn capture_count(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_digits(token: &str) -> Option<i64> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn parse_decimal(token: &str) -> Option<f64> {
    let token = token.trim_end_matches(AREA_MARKER);
    if !token.chars().any(|c| c.is_ascii_digit())
        || !token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    let normalized = if token.contains(',') {
        token.replace('.', "").replace(',', ".")
    } else if DOTTED_THOUSANDS.is_match(token) {
        token.replace('.', "")
    } else {
        token.to_string()
    };

    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_alone_has_no_condo() {
        assert_eq!(parse_price_condo("2500"), (Some(2500), None));
        assert_eq!(parse_price_condo("R$ 2.500"), (Some(2500), None));
    }

    #[test]
    fn price_and_condo() {
        assert_eq!(parse_price_condo("2500 450"), (Some(2500), Some(450)));
        assert_eq!(
            parse_price_condo("R$ 1.250.000\nR$ 1.100 Condominio"),
            (Some(1_250_000), Some(1100))
        );
        assert_eq!(
            parse_price_condo("R$ 3.000 R$ 700 Condomínio"),
            (Some(3000), Some(700))
        );
    }

    #[test]
    fn non_digit_tokens_become_none() {
        assert_eq!(parse_price_condo("Consulte"), (None, None));
        assert_eq!(parse_price_condo("2500 abc"), (Some(2500), None));
        assert_eq!(parse_price_condo("2500 450 12"), (Some(2500), None));
        assert_eq!(parse_price_condo(""), (None, None));
    }

    #[test]
    fn area_single_marker() {
        assert_eq!(parse_area("2 quartos 80 m² 1 ban 1 vagas"), Some(80.0));
        assert_eq!(parse_area("80m² 2 quartos"), Some(80.0));
        assert_eq!(parse_area("m² 95 útil"), Some(95.0));
        assert_eq!(parse_area("72,5 m²"), Some(72.5));
    }

    #[test]
    fn area_two_markers_uses_second() {
        assert_eq!(parse_area("120 m² tot. 95 m² útil 3 quartos"), Some(95.0));
        assert_eq!(parse_area("1.200 m² 1.050 m²"), Some(1050.0));
    }

    #[test]
    fn area_missing() {
        assert_eq!(parse_area("3 quartos 2 ban"), None);
        assert_eq!(parse_area("área m² indisponível"), None);
    }

    #[test]
    fn counts_from_feature_text() {
        let text = "2 quartos 80 m² 1 ban 1 vagas";
        assert_eq!(parse_bedrooms(text), Some(2));
        assert_eq!(parse_bathrooms(text), Some(1));
        assert_eq!(parse_parking(text), 1);
    }

    #[test]
    fn missing_counts_are_asymmetric() {
        let text = "65 m²";
        assert_eq!(parse_bedrooms(text), None);
        assert_eq!(parse_bathrooms(text), None);
        assert_eq!(parse_parking(text), 0);
    }

    #[test]
    fn singular_units() {
        assert_eq!(parse_bedrooms("1 quarto 1 banheiro 1 vaga"), Some(1));
        assert_eq!(parse_parking("1 quarto 1 banheiro 1 vaga"), 1);
    }

    #[test]
    fn district_is_first_segment() {
        assert_eq!(split_district("Savassi, Belo Horizonte"), Some("Savassi".into()));
        assert_eq!(split_district("Sion"), Some("Sion".into()));
        assert_eq!(split_district("  "), None);
    }

    #[test]
    fn address_split() {
        assert_eq!(split_address("Rua Pernambuco, 1000"), Some("Rua Pernambuco".into()));
        assert_eq!(split_address("Avenida Afonso Pena"), Some("Avenida Afonso Pena".into()));
        assert_eq!(split_address(""), None);
        assert_eq!(split_address(", 12"), None);
    }
}
