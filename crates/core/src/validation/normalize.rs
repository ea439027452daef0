//! Normalization of raw field text into typed values.
//!
//! Every parser returns a human-readable reason on failure; the validator
//! passes it straight to the user as part of the re-prompt.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::form::PropertyKind;

/// Marker → currency code. Checked in order, first hit wins.
const CURRENCY_CODES: &[(&str, &str)] = &[
    ("us$", "USD"),
    ("usd", "USD"),
    ("dollar", "USD"),
    ("mxn", "MXN"),
    ("peso", "MXN"),
    ("eur", "EUR"),
    ("€", "EUR"),
    ("cad", "CAD"),
    ("gbp", "GBP"),
    ("£", "GBP"),
];

/// Longest markers first so nothing is left half-stripped.
const CURRENCY_MARKERS: &[&str] = &[
    "us$", "dollars", "dollar", "usd", "pesos", "peso", "mxn", "euros", "euro", "eur", "€", "cad",
    "gbp", "£", "$",
];

const MONEY_FILLER: &[&str] = &[
    "about",
    "around",
    "approximately",
    "approx",
    "roughly",
    "up",
    "to",
    "max",
    "maximum",
    "of",
    "budget",
    "is",
    "my",
    "a",
    "an",
    "the",
    "~",
    "under",
    "below",
    "less",
    "than",
    "at",
    "most",
];

const AREA_FILLER: &[&str] =
    &["about", "around", "approximately", "approx", "roughly", "at", "least", "minimum", "min", "of", "a", "an", "the", "~", "total"];

const METER_UNITS: &[&str] = &[
    "m2",
    "m²",
    "m^2",
    "sqm",
    "sq m",
    "sq. m",
    "sq.m",
    "square meter",
    "square meters",
    "square metre",
    "square metres",
    "meter",
    "meters",
    "metre",
    "metres",
    "m",
    "mts",
    "metros",
    "metros cuadrados",
    "metro cuadrado",
];

const FEET_UNITS: &[&str] = &[
    "ft2",
    "ft²",
    "ft^2",
    "sqft",
    "sq ft",
    "sq. ft",
    "sq.ft",
    "square foot",
    "square feet",
    "feet",
    "ft",
    "pies",
    "pies cuadrados",
];

/// Keyword → property kind. Matched on word boundaries.
pub const PROPERTY_KEYWORDS: &[(&str, PropertyKind)] = &[
    ("office", PropertyKind::Office),
    ("offices", PropertyKind::Office),
    ("oficina", PropertyKind::Office),
    ("oficinas", PropertyKind::Office),
    ("coworking", PropertyKind::Office),
    ("co-working", PropertyKind::Office),
    ("workspace", PropertyKind::Office),
    ("retail", PropertyKind::Retail),
    ("store", PropertyKind::Retail),
    ("storefront", PropertyKind::Retail),
    ("shop", PropertyKind::Retail),
    ("showroom", PropertyKind::Retail),
    ("restaurant", PropertyKind::Retail),
    ("local comercial", PropertyKind::Retail),
    ("warehouse", PropertyKind::Warehouse),
    ("warehouses", PropertyKind::Warehouse),
    ("bodega", PropertyKind::Warehouse),
    ("distribution center", PropertyKind::Warehouse),
    ("industrial", PropertyKind::Industrial),
    ("factory", PropertyKind::Industrial),
    ("manufacturing", PropertyKind::Industrial),
    ("nave industrial", PropertyKind::Industrial),
    ("land", PropertyKind::Land),
    ("plot", PropertyKind::Land),
    ("vacant lot", PropertyKind::Land),
    ("terreno", PropertyKind::Land),
    ("residential", PropertyKind::Residential),
    ("house", PropertyKind::Residential),
    ("apartment", PropertyKind::Residential),
    ("apartments", PropertyKind::Residential),
    ("condo", PropertyKind::Residential),
    ("casa", PropertyKind::Residential),
    ("departamento", PropertyKind::Residential),
    ("mixed use", PropertyKind::MixedUse),
    ("mixed-use", PropertyKind::MixedUse),
];

const MAX_PLACE_CHARS: usize = 120;

/// Byte offsets where `needle` occurs in `haystack` bounded by
/// non-alphanumeric characters (or the ends of the string).
pub fn word_positions(haystack: &str, needle: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    if needle.is_empty() {
        return positions;
    }

    let mut start = 0;
    while let Some(offset) = haystack[start..].find(needle) {
        let index = start + offset;
        let end = index + needle.len();
        let before_ok =
            haystack[..index].chars().next_back().map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            positions.push(index);
        }
        start = end;
    }
    positions
}

pub fn multiplier_for(word: &str) -> Option<Decimal> {
    match word {
        "" => Some(Decimal::ONE),
        "k" | "thousand" | "mil" | "grand" => Some(Decimal::from(1_000)),
        "m" | "mm" | "million" | "millions" | "millon" | "millón" | "millones" => {
            Some(Decimal::from(1_000_000))
        }
        "b" | "bn" | "billion" => Some(Decimal::from(1_000_000_000_u64)),
        _ => None,
    }
}

/// Parses `500`, `20,000`, `1.5m`, `500k` and friends. Expects lower-case input.
pub fn parse_scaled_number(token: &str) -> Option<Decimal> {
    let token = token.trim().trim_end_matches(['.', ',', ';', ':', '!', '?']);
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let digits_end = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(token.len());
    let (number, suffix) = token.split_at(digits_end);
    let number = number.replace(',', "");
    let number = number.trim_end_matches('.');
    if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let value = Decimal::from_str(number).ok()?;
    let scaled = value.checked_mul(multiplier_for(suffix)?)?;
    Some(if negative { -scaled } else { scaled })
}

pub fn detect_currency(lowered: &str) -> Option<String> {
    CURRENCY_CODES
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|(_, code)| (*code).to_string())
}

/// Budget amounts: positive, with an optional currency.
pub fn parse_money(raw: &str) -> Result<(Decimal, Option<String>), String> {
    let lowered = raw.trim().to_lowercase();
    let currency = detect_currency(&lowered);

    let mut cleaned = lowered.replace(',', "");
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, " ");
    }

    let tokens =
        cleaned.split_whitespace().filter(|token| !MONEY_FILLER.contains(token)).collect::<Vec<_>>();
    let amount = match tokens.as_slice() {
        [number] => parse_scaled_number(number),
        [number, scale] => match (parse_scaled_number(number), multiplier_for(scale)) {
            (Some(value), Some(multiplier)) if multiplier != Decimal::ONE => {
                value.checked_mul(multiplier)
            }
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(|| format!("I couldn't read \"{}\" as an amount of money.", raw.trim()))?;

    if amount <= Decimal::ZERO {
        return Err("The budget has to be a positive amount.".to_string());
    }

    Ok((amount.normalize(), currency))
}

/// Floor area in square meters. Square feet are converted; a bare number is
/// taken as square meters.
pub fn parse_area(raw: &str) -> Result<Decimal, String> {
    let unreadable =
        || format!("I couldn't read \"{}\" as a floor area; something like 500 m² works.", raw.trim());

    let lowered = raw.trim().to_lowercase();
    let joined = lowered
        .split_whitespace()
        .filter(|token| !AREA_FILLER.contains(token))
        .collect::<Vec<_>>()
        .join(" ");

    let digits_end = joined
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(joined.len());
    let (number, unit) = joined.split_at(digits_end);
    let number = number.replace(',', "");
    let number = number.trim_end_matches('.');
    let unit = unit.trim().trim_end_matches(['.', ',', ';', '!', '?']);

    if number.is_empty() {
        return Err(unreadable());
    }
    let value = Decimal::from_str(number).map_err(|_| unreadable())?;

    let square_meters = if unit.is_empty() || METER_UNITS.contains(&unit) {
        value
    } else if FEET_UNITS.contains(&unit) {
        (value * Decimal::new(9_290_304, 8)).round_dp(2)
    } else {
        return Err(unreadable());
    };

    if square_meters <= Decimal::ZERO {
        return Err("The size has to be larger than zero.".to_string());
    }

    Ok(square_meters.normalize())
}

/// The property kind mentioned last in `text`, with its byte offset.
pub fn find_property_kind(text: &str) -> Option<(usize, PropertyKind)> {
    let lowered = text.to_lowercase();
    PROPERTY_KEYWORDS
        .iter()
        .filter_map(|(keyword, kind)| {
            word_positions(&lowered, keyword).last().map(|position| (*position, *kind))
        })
        .max_by_key(|(position, _)| *position)
}

pub fn parse_property_kind(raw: &str) -> Result<PropertyKind, String> {
    find_property_kind(raw).map(|(_, kind)| kind).ok_or_else(|| {
        let options = PropertyKind::ALL.iter().map(PropertyKind::label).collect::<Vec<_>>();
        format!(
            "\"{}\" is not a property type I can search for (options: {}).",
            raw.trim(),
            options.join(", ")
        )
    })
}

pub fn parse_place(raw: &str) -> Result<String, String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = collapsed
        .trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\''))
        .trim()
        .to_string();

    if name.is_empty() {
        return Err("The location can't be empty.".to_string());
    }
    if !name.chars().any(char::is_alphabetic) {
        return Err(format!("\"{name}\" doesn't look like a city or area name."));
    }
    if name.chars().count() > MAX_PLACE_CHARS {
        return Err("That location is too long; a city or area name is enough.".to_string());
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        find_property_kind, parse_area, parse_money, parse_place, parse_property_kind,
        parse_scaled_number, word_positions,
    };
    use crate::domain::form::PropertyKind;

    #[test]
    fn scaled_numbers_cover_common_shorthand() {
        assert_eq!(parse_scaled_number("500k"), Some(Decimal::from(500_000)));
        assert_eq!(parse_scaled_number("1.5m"), Some(Decimal::from(1_500_000)));
        assert_eq!(parse_scaled_number("20,000"), Some(Decimal::from(20_000)));
        assert_eq!(parse_scaled_number("300k."), Some(Decimal::from(300_000)));
        assert_eq!(parse_scaled_number("seats"), None);
        assert_eq!(parse_scaled_number("12x"), None);
    }

    #[test]
    fn money_accepts_currency_words_and_multipliers() {
        assert_eq!(parse_money("500k"), Ok((Decimal::from(500_000), None)));
        assert_eq!(
            parse_money("20,000 USD"),
            Ok((Decimal::from(20_000), Some("USD".to_string())))
        );
        assert_eq!(
            parse_money("$1.2 million dollars"),
            Ok((Decimal::from(1_200_000), Some("USD".to_string())))
        );
        assert_eq!(
            parse_money("around 50 mil pesos"),
            Ok((Decimal::from(50_000), Some("MXN".to_string())))
        );
    }

    #[test]
    fn money_rejects_text_and_non_positive_amounts() {
        assert!(parse_money("a lot").is_err());
        assert!(parse_money("").is_err());
        let negative = parse_money("-300").expect_err("negative budget");
        assert!(negative.contains("positive"));
        assert!(parse_money("0").is_err());
    }

    #[test]
    fn area_converts_square_feet() {
        assert_eq!(parse_area("500m²"), Ok(Decimal::from(500)));
        assert_eq!(parse_area("300 square meters"), Ok(Decimal::from(300)));
        assert_eq!(parse_area("at least 1,200 sqm"), Ok(Decimal::from(1_200)));
        assert_eq!(parse_area("2000 sq ft"), Ok(Decimal::new(18_581, 2)));
        assert_eq!(parse_area("450"), Ok(Decimal::from(450)));
    }

    #[test]
    fn area_rejects_unknown_units_and_words() {
        assert!(parse_area("big").is_err());
        assert!(parse_area("3 acres").is_err());
        assert!(parse_area("0 m2").is_err());
    }

    #[test]
    fn property_kind_uses_last_mention() {
        assert_eq!(parse_property_kind("an office space"), Ok(PropertyKind::Office));
        assert_eq!(parse_property_kind("Warehouse"), Ok(PropertyKind::Warehouse));
        assert_eq!(
            find_property_kind("not a retail store, a warehouse").map(|(_, kind)| kind),
            Some(PropertyKind::Warehouse)
        );
        assert!(parse_property_kind("castle").is_err());
    }

    #[test]
    fn property_keywords_respect_word_boundaries() {
        assert!(find_property_kind("shopping for a deal").is_none());
        assert!(word_positions("landlord", "land").is_empty());
        assert_eq!(word_positions("land, more land", "land"), vec![0, 11]);
    }

    #[test]
    fn place_names_are_trimmed_and_checked() {
        assert_eq!(parse_place("  Mexico   City. "), Ok("Mexico City".to_string()));
        assert!(parse_place("   ").is_err());
        assert!(parse_place("12345").is_err());
        assert!(parse_place(&"a".repeat(200)).is_err());
    }
}
