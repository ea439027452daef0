//! Deterministic extractor: regexes and keyword tables, no model calls.
//!
//! Candidates are collected per field and the last mention in the message
//! wins. Raw text is passed through untouched; normalization belongs to the
//! validator.

use async_trait::async_trait;
use intake_core::domain::form::{Form, FormDelta};
use intake_core::domain::schema::{FieldKey, SemanticType};
use intake_core::validation::normalize::{find_property_kind, word_positions};
use regex::{Captures, Regex};
use tracing::debug;

use super::{ExtractionError, FieldExtractor};

const AREA_PATTERN: &str = r"(?i)(?P<number>\d[\d,]*(?:\.\d+)?)\s*(?P<unit>m²|m\^2|m2\b|sq\.?\s?m\b|sqm\b|square\s+met(?:er|re)s?\b|metros\s+cuadrados\b|metro\s+cuadrado\b|metros\b|met(?:er|re)s?\b|mts\b|ft²|ft\^2|ft2\b|sq\.?\s?ft\b|sqft\b|square\s+f(?:ee|oo)t\b|pies\s+cuadrados\b|pies\b|feet\b|ft\b)";

const MONEY_PATTERN: &str = r"(?i)(?P<symbol>us\$|\$|€|£)?\s*(?P<number>\d[\d,]*(?:\.\d+)?)(?:\s*(?P<scale>thousand|millones|million|billion|grand|mil|mm|bn|k|m|b)\b)?(?:\s*(?P<currency>usd|mxn|eur|cad|gbp|dollars?|pesos?|euros?)\b)?";

const AREA_CONTEXT_PATTERN: &str =
    r"(?i)\b(?:size|space|area|surface|footprint)\b[^\d\n]{0,24}?(?P<number>\d[\d,]*(?:\.\d+)?)";

const LOCATION_PATTERN: &str = r"(?:\b(?i:located\s+in|based\s+in|in|at|near|around|within)\s+|\b(?i:city|location|area|zone)\s*(?i:is|:|=)\s*|\b(?i:city\s+of)\s+)(?P<place>\p{Lu}[\p{L}'.\-]*(?:\s+(?:(?:de|del|la|las|los|el|of|the)\s+)?\p{Lu}[\p{L}'.\-]*)*)";

const TIME_FRAME_PATTERN: &str = r"(?i)\b(?:asap|as\s+soon\s+as\s+possible|immediately|right\s+away|next\s+(?:week|month|quarter|year)|(?:by|before|starting|from|within|in|after)\s+(?:(?:the\s+)?(?:next|this|end\s+of(?:\s+the)?)\s+(?:week|month|quarter|year)|(?:early|mid|late)[\s-]+(?:january|february|march|april|may|june|july|august|september|october|november|december|\d{4})|(?:january|february|march|april|may|june|july|august|september|october|november|december)(?:\s+\d{4})?|\d+\s+(?:days?|weeks?|months?|years?)|q[1-4](?:\s+\d{4})?|\d{4}))\b";

const PARKING_COUNT_PATTERN: &str =
    r"(?i)\b(?P<count>\d+)\s+(?:parking(?:\s+(?:spaces|spots|lots?))?|(?:spaces|spots)\s+(?:of|for)\s+parking)\b";

/// Words that make a bare number a budget when they appear between the
/// previous number and this one.
const BUDGET_CONTEXT: &[&str] = &[
    "budget",
    "spend",
    "spending",
    "afford",
    "pay",
    "price",
    "cost",
    "invest",
    "presupuesto",
    "up to",
    "max",
    "maximum",
    "under",
    "below",
];

/// Scales that read as money on their own. A bare `m` is too easily meters.
const MONEY_SCALES: &[&str] =
    &["thousand", "millones", "million", "billion", "grand", "mil", "mm", "bn", "k", "b"];

/// Keyword → (additional key, value). Matched on word boundaries.
const PREFERENCE_KEYWORDS: &[(&str, &str, &str)] = &[
    ("parking", "parking", "requested"),
    ("estacionamiento", "parking", "requested"),
    ("security", "security", "requested"),
    ("24/7 security", "security", "24/7"),
    ("loading dock", "loading_dock", "requested"),
    ("loading docks", "loading_dock", "requested"),
    ("furnished", "furnished", "yes"),
    ("unfurnished", "furnished", "no"),
    ("air conditioning", "air_conditioning", "requested"),
    ("elevator", "elevator", "requested"),
    ("meeting rooms", "meeting_rooms", "requested"),
    ("conference room", "meeting_rooms", "requested"),
    ("natural light", "natural_light", "requested"),
    ("ground floor", "ground_floor", "requested"),
    ("pet friendly", "pet_friendly", "yes"),
    ("downtown", "area_preference", "downtown"),
    ("city center", "area_preference", "city center"),
    ("city centre", "area_preference", "city center"),
    ("suburban", "area_preference", "suburban"),
    ("suburbs", "area_preference", "suburban"),
];

/// Capitalized words that follow `in`/`at` but never name a place.
const NOT_A_PLACE: &[&str] = &[
    "usd", "mxn", "eur", "cad", "gbp", "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december", "monday", "tuesday",
    "wednesday", "thursday", "friday", "saturday", "sunday", "downtown", "suburbs", "total",
    "least", "most", "the", "a", "an", "my", "our", "asap",
];

/// Tokens that end a place name ("in Chicago I need ...").
const PLACE_STOP_WORDS: &[&str] = &[
    "i", "i'm", "i'd", "i've", "we", "we're", "my", "our", "and", "but", "with", "for", "also",
    "please", "thanks", "it", "it's", "budget",
];

const PLACE_CONNECTORS: &[&str] = &["de", "del", "la", "las", "los", "el", "of", "the"];

const SMALL_TALK: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank", "ok", "okay", "sure", "yes", "yeah", "yep", "no",
    "nope", "nothing", "none", "bye", "cool", "great", "good", "perfect",
];

/// Hedges and questions. A reply containing any of these answers nothing.
const NON_ANSWERS: &[&str] = &[
    "not", "sure", "unsure", "maybe", "perhaps", "dunno", "idk", "don't", "know", "what", "why",
    "how", "where", "which", "who", "can", "could", "would", "repeat", "mean", "again", "later",
    "whatever", "anything", "anywhere", "hmm", "sorry", "pardon", "help",
];

/// Things a number can count that are not floor area.
const COUNTED_NOUNS: &[&str] = &[
    "people", "persons", "person", "employees", "employee", "staff", "workers", "team", "cars",
    "car", "vehicles", "trucks", "desks", "desk", "seats", "seat", "workstations", "spots", "spaces",
    "guests", "rooms", "offices", "units", "floors", "stories", "levels",
];

/// Abbreviations that end in a period inside a place name ("St. Louis").
const PLACE_ABBREVIATIONS: &[&str] = &["st", "mt", "ft", "pt", "sta", "d.c", "n.y", "l.a"];

const MAX_DIRECT_ANSWER_WORDS: usize = 6;
const MAX_NUMERIC_ANSWER_WORDS: usize = 4;
const MAX_NAME_ANSWER_WORDS: usize = 4;

#[derive(Clone, Debug)]
struct Patterns {
    area: Regex,
    money: Regex,
    area_context: Regex,
    location: Regex,
    time_frame: Regex,
    parking_count: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            area: Regex::new(AREA_PATTERN)?,
            money: Regex::new(MONEY_PATTERN)?,
            area_context: Regex::new(AREA_CONTEXT_PATTERN)?,
            location: Regex::new(LOCATION_PATTERN)?,
            time_frame: Regex::new(TIME_FRAME_PATTERN)?,
            parking_count: Regex::new(PARKING_COUNT_PATTERN)?,
        })
    }
}

/// A value found in the message together with where it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Mention {
    position: usize,
    text: String,
}

#[derive(Clone, Debug)]
pub struct RuleBasedExtractor {
    patterns: Patterns,
}

impl RuleBasedExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { patterns: Patterns::compile()? })
    }

    /// Synchronous core of [`FieldExtractor::extract`].
    pub fn extract_delta(&self, message: &str, form: &Form) -> FormDelta {
        let mut delta = FormDelta::new();

        let area_mentions = self.area_mentions(message);
        let area_spans = area_mentions
            .iter()
            .map(|mention| (mention.position, mention.position + mention.text.len()))
            .collect::<Vec<_>>();

        if let Some(budget) = self.budget_mentions(message, &area_spans).pop() {
            delta.insert(FieldKey::Budget.as_str(), budget.text);
        }
        if let Some(size) = last_mention(area_mentions, self.area_context_mentions(message)) {
            delta.insert(FieldKey::TotalSize.as_str(), size.text);
        }
        if let Some((_, kind)) = find_property_kind(message) {
            delta.insert(FieldKey::PropertyType.as_str(), kind.label());
        }
        if let Some(place) = self.location_mentions(message).pop() {
            delta.insert(FieldKey::Location.as_str(), place.text);
        }

        for (name, value) in self.preferences(message) {
            delta.insert(&name, value);
        }

        if delta.is_empty() {
            if let Some((key, value)) = direct_answer(message, form) {
                debug!(field = key.as_str(), "message read as a direct answer");
                delta.insert(key.as_str(), value);
            }
        }

        delta
    }

    fn area_mentions(&self, message: &str) -> Vec<Mention> {
        self.patterns
            .area
            .find_iter(message)
            .map(|found| Mention { position: found.start(), text: found.as_str().to_string() })
            .collect()
    }

    /// "the space should be around 450" – a number right after a size word.
    fn area_context_mentions(&self, message: &str) -> Vec<Mention> {
        self.patterns
            .area_context
            .captures_iter(message)
            .filter(|captures| {
                captures.get(0).map_or(false, |whole| !preceded_by_parking(&message[..whole.start()]))
            })
            .filter_map(|captures| captures.name("number"))
            .filter(|number| {
                let rest = &message[number.end()..];
                !followed_by_money_marker(rest) && !followed_by_counted_noun(rest)
            })
            .map(|number| Mention { position: number.start(), text: number.as_str().to_string() })
            .collect()
    }

    fn budget_mentions(&self, message: &str, area_spans: &[(usize, usize)]) -> Vec<Mention> {
        let mut mentions = Vec::new();
        let mut previous_end = 0;

        for captures in self.patterns.money.captures_iter(message) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let (start, end) = (whole.start(), whole.end());
            let overlaps_area =
                area_spans.iter().any(|(area_start, area_end)| start < *area_end && *area_start < end);
            let segment = message.get(previous_end..start).unwrap_or_default().to_lowercase();
            previous_end = end;

            if overlaps_area {
                continue;
            }
            if has_money_evidence(&captures) || has_budget_context(&segment) {
                mentions.push(Mention { position: start, text: whole.as_str().trim().to_string() });
            }
        }

        mentions
    }

    fn location_mentions(&self, message: &str) -> Vec<Mention> {
        self.patterns
            .location
            .captures_iter(message)
            .filter_map(|captures| captures.name("place"))
            .filter_map(|place| {
                clean_place(place.as_str())
                    .map(|text| Mention { position: place.start(), text })
            })
            .collect()
    }

    fn preferences(&self, message: &str) -> Vec<(String, String)> {
        let lowered = message.to_lowercase();
        let mut found = Vec::<(usize, &str, String)>::new();

        for (keyword, key, value) in PREFERENCE_KEYWORDS {
            if let Some(position) = word_positions(&lowered, keyword).last() {
                found.push((*position, *key, (*value).to_string()));
            }
        }
        for captures in self.patterns.parking_count.captures_iter(message) {
            if let (Some(whole), Some(count)) = (captures.get(0), captures.name("count")) {
                let noun = if count.as_str() == "1" { "space" } else { "spaces" };
                found.push((whole.end(), "parking", format!("{} {noun}", count.as_str())));
            }
        }
        if let Some(time_frame) = self.patterns.time_frame.find_iter(message).last() {
            found.push((time_frame.start(), "time_frame", time_frame.as_str().to_string()));
        }

        // Ascending by position so later mentions overwrite earlier ones.
        found.sort_by_key(|(position, _, _)| *position);
        found.into_iter().map(|(_, key, value)| (key.to_string(), value)).collect()
    }
}

#[async_trait]
impl FieldExtractor for RuleBasedExtractor {
    async fn extract(&self, message: &str, form: &Form) -> Result<FormDelta, ExtractionError> {
        Ok(self.extract_delta(message, form))
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

fn last_mention(first: Vec<Mention>, second: Vec<Mention>) -> Option<Mention> {
    first.into_iter().chain(second).max_by_key(|mention| mention.position)
}

fn has_money_evidence(captures: &Captures<'_>) -> bool {
    if captures.name("symbol").is_some() || captures.name("currency").is_some() {
        return true;
    }
    captures
        .name("scale")
        .map(|scale| MONEY_SCALES.contains(&scale.as_str().to_lowercase().as_str()))
        .unwrap_or(false)
}

fn has_budget_context(segment: &str) -> bool {
    BUDGET_CONTEXT.iter().any(|word| !word_positions(segment, word).is_empty())
}

fn followed_by_money_marker(rest: &str) -> bool {
    let next = rest.trim_start().to_lowercase();
    ["k", "usd", "dollars", "mxn", "pesos", "eur", "euros", "thousand", "million"]
        .iter()
        .any(|marker| word_positions(&next, marker).first() == Some(&0))
}

/// "parking space for 2" describes parking, not the premises.
fn preceded_by_parking(before: &str) -> bool {
    before
        .split_whitespace()
        .next_back()
        .map_or(false, |word| word.to_lowercase().starts_with("parking"))
}

fn followed_by_counted_noun(rest: &str) -> bool {
    first_word(rest).map_or(false, |word| COUNTED_NOUNS.contains(&word.as_str()))
}

fn first_word(text: &str) -> Option<String> {
    let word = text.split_whitespace().next()?;
    Some(word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'').to_lowercase())
}

/// Cuts trailing sentence words off a captured place and rejects captures
/// that are months, currencies and similar.
fn clean_place(raw: &str) -> Option<String> {
    let mut tokens = Vec::new();
    for token in raw.split_whitespace() {
        let bare = token.trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
        if PLACE_STOP_WORDS.contains(&bare.to_lowercase().as_str()) {
            break;
        }
        tokens.push(token);
        if token.ends_with([',', ';', ':', '!', '?']) || ends_sentence(token) {
            break;
        }
    }
    while tokens
        .last()
        .map_or(false, |token| PLACE_CONNECTORS.contains(&token.to_lowercase().as_str()))
    {
        tokens.pop();
    }

    let first = tokens.first()?.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    if NOT_A_PLACE.contains(&first.as_str()) {
        return None;
    }

    let place = tokens
        .join(" ")
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .to_string();
    (place.chars().filter(|c| c.is_alphabetic()).count() >= 2).then_some(place)
}

/// A trailing period ends the sentence unless the token is a known
/// abbreviation.
fn ends_sentence(token: &str) -> bool {
    let Some(bare) = token.strip_suffix('.') else {
        return false;
    };
    !PLACE_ABBREVIATIONS.contains(&bare.to_lowercase().as_str())
}

/// A short reply with nothing recognisable is taken as the answer to the
/// question the assistant asked last: the first pending required field.
fn direct_answer(message: &str, form: &Form) -> Option<(FieldKey, String)> {
    let trimmed = message.trim();
    let words = trimmed.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() || words.len() > MAX_DIRECT_ANSWER_WORDS {
        return None;
    }

    if trimmed.contains('?') {
        return None;
    }
    let lowered = words
        .iter()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'').to_lowercase())
        .collect::<Vec<_>>();
    if SMALL_TALK.contains(&lowered[0].as_str())
        || lowered.iter().any(|word| NON_ANSWERS.contains(&word.as_str()))
    {
        return None;
    }

    let key = *form.missing_fields().first()?;
    let has_digits = trimmed.chars().any(|c| c.is_ascii_digit());
    let accepted = match key.spec().semantic {
        SemanticType::Money | SemanticType::Area => {
            has_digits
                && words.len() <= MAX_NUMERIC_ANSWER_WORDS
                && !lowered.iter().any(|word| COUNTED_NOUNS.contains(&word.as_str()))
        }
        SemanticType::PropertyKind => !has_digits && words.len() <= MAX_NAME_ANSWER_WORDS,
        SemanticType::Place => words.len() <= MAX_NAME_ANSWER_WORDS && looks_like_place(&words),
    };

    accepted.then(|| (key, trimmed.to_string()))
}

/// Letters with the odd apostrophe, hyphen or period; no digits.
fn looks_like_place(words: &[&str]) -> bool {
    words.iter().all(|word| {
        let word = word.trim_end_matches(['.', ',', '!']);
        word.chars().any(char::is_alphabetic)
            && word.chars().all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use intake_core::domain::form::{Form, FormDelta};
    use intake_core::domain::schema::FieldKey;
    use intake_core::FormValidator;

    use super::RuleBasedExtractor;

    fn extractor() -> RuleBasedExtractor {
        RuleBasedExtractor::new().expect("patterns compile")
    }

    fn extract(message: &str) -> FormDelta {
        extractor().extract_delta(message, &Form::new())
    }

    fn required(delta: &FormDelta, key: FieldKey) -> Option<&str> {
        delta.required.get(&key).map(String::as_str)
    }

    #[test]
    fn budget_and_location_in_one_message() {
        let delta = extract("budget is 500k, looking in Chicago");

        assert_eq!(required(&delta, FieldKey::Budget), Some("500k"));
        assert_eq!(required(&delta, FieldKey::Location), Some("Chicago"));
        assert_eq!(delta.required.len(), 2);
        assert!(delta.additional.is_empty());
    }

    #[test]
    fn full_requirements_sentence() {
        let delta = extract(
            "I need a 300 square meters office in Mexico City, budget of $1.2 million dollars",
        );

        assert_eq!(required(&delta, FieldKey::TotalSize), Some("300 square meters"));
        assert_eq!(required(&delta, FieldKey::PropertyType), Some("office"));
        assert_eq!(required(&delta, FieldKey::Location), Some("Mexico City"));
        assert_eq!(required(&delta, FieldKey::Budget), Some("$1.2 million dollars"));
    }

    #[test]
    fn square_feet_and_meters_are_sizes_not_budgets() {
        let delta = extract("a warehouse of 2000 sq ft");
        assert_eq!(required(&delta, FieldKey::TotalSize), Some("2000 sq ft"));
        assert_eq!(required(&delta, FieldKey::Budget), None);

        let delta = extract("I need 500m²");
        assert_eq!(required(&delta, FieldKey::TotalSize), Some("500m²"));
        assert_eq!(required(&delta, FieldKey::Budget), None);
    }

    #[test]
    fn size_word_followed_by_bare_number() {
        let delta = extract("the space should be around 450");
        assert_eq!(required(&delta, FieldKey::TotalSize), Some("450"));
    }

    #[test]
    fn last_budget_mention_wins() {
        let delta = extract("my budget was 500k but make it 300k");
        assert_eq!(required(&delta, FieldKey::Budget), Some("300k"));
    }

    #[test]
    fn unrelated_numbers_are_not_budgets() {
        let delta = extract("budget is 500k, and I need 3 parking spaces");

        assert_eq!(required(&delta, FieldKey::Budget), Some("500k"));
        assert_eq!(delta.additional.get("parking").map(String::as_str), Some("3 spaces"));
    }

    #[test]
    fn conflicting_property_types_keep_the_last() {
        let delta = extract("not a retail store, a warehouse");
        assert_eq!(required(&delta, FieldKey::PropertyType), Some("warehouse"));
    }

    #[test]
    fn months_and_currencies_are_not_places() {
        let delta = extract("moving in March, paying in USD");
        assert_eq!(required(&delta, FieldKey::Location), None);
        assert_eq!(delta.additional.get("time_frame").map(String::as_str), Some("in March"));
    }

    #[test]
    fn place_stops_before_sentence_words() {
        let delta = extract("it's in Miami and I want parking");
        assert_eq!(required(&delta, FieldKey::Location), Some("Miami"));
        assert_eq!(delta.additional.get("parking").map(String::as_str), Some("requested"));
    }

    #[test]
    fn additional_preferences_are_collected() {
        let delta = extract("furnished, with a loading dock, downtown, ideally within 3 months");

        assert_eq!(delta.additional.get("furnished").map(String::as_str), Some("yes"));
        assert_eq!(delta.additional.get("loading_dock").map(String::as_str), Some("requested"));
        assert_eq!(delta.additional.get("area_preference").map(String::as_str), Some("downtown"));
        assert_eq!(
            delta.additional.get("time_frame").map(String::as_str),
            Some("within 3 months")
        );
        assert!(delta.required.is_empty());
    }

    #[test]
    fn unfurnished_is_not_furnished() {
        let delta = extract("unfurnished is fine");
        assert_eq!(delta.additional.get("furnished").map(String::as_str), Some("no"));
    }

    #[test]
    fn small_talk_yields_nothing() {
        assert!(extract("hello there").is_empty());
        assert!(extract("thanks!").is_empty());
    }

    #[test]
    fn short_reply_answers_the_pending_field() {
        let extractor = extractor();
        let mut form = Form::new();

        let delta = extractor.extract_delta("300000", &form);
        assert_eq!(required(&delta, FieldKey::Budget), Some("300000"));

        form.apply(&delta);
        form.record_verdicts(&FormValidator::new().evaluate(&form).verdicts);
        let delta = extractor.extract_delta("about 450", &form);
        assert_eq!(required(&delta, FieldKey::TotalSize), Some("about 450"));
    }

    #[test]
    fn short_place_reply_fills_location_last() {
        let extractor = extractor();
        let mut form = Form::new();
        form.apply(
            &FormDelta::new()
                .with_field(FieldKey::Budget, "500k")
                .with_field(FieldKey::TotalSize, "300 m2")
                .with_field(FieldKey::PropertyType, "office"),
        );
        form.record_verdicts(&FormValidator::new().evaluate(&form).verdicts);

        let delta = extractor.extract_delta("barcelona", &form);
        assert_eq!(required(&delta, FieldKey::Location), Some("barcelona"));
    }

    fn all_but_location() -> Form {
        let mut form = Form::new();
        form.apply(
            &FormDelta::new()
                .with_field(FieldKey::Budget, "500k")
                .with_field(FieldKey::TotalSize, "300 m2")
                .with_field(FieldKey::PropertyType, "office"),
        );
        form.record_verdicts(&FormValidator::new().evaluate(&form).verdicts);
        form
    }

    #[test]
    fn hedges_and_questions_do_not_answer_the_pending_field() {
        let extractor = extractor();
        let form = all_but_location();

        for message in
            ["not sure yet", "what do you mean?", "can you repeat", "I don't know", "no idea, later"]
        {
            let delta = extractor.extract_delta(message, &form);
            assert!(delta.is_empty(), "{message:?} produced {delta:?}");
        }

        let mut form = form;
        form.apply(&extractor.extract_delta("not sure yet", &form));
        assert!(!FormValidator::new().evaluate(&form).is_complete());
    }

    #[test]
    fn numeric_direct_answers_need_a_bare_amount() {
        let extractor = extractor();
        let form = Form::new();

        assert!(extractor.extract_delta("for 20 people", &form).is_empty());
        assert!(extractor.extract_delta("what about 2?", &form).is_empty());
        assert_eq!(
            required(&extractor.extract_delta("around 300000", &form), FieldKey::Budget),
            Some("around 300000")
        );
    }

    #[test]
    fn place_ends_at_the_sentence_period() {
        let delta = extract("I want an office in Chicago. Need 300 m2.");
        assert_eq!(required(&delta, FieldKey::Location), Some("Chicago"));
        assert_eq!(required(&delta, FieldKey::TotalSize), Some("300 m2"));
        assert_eq!(required(&delta, FieldKey::PropertyType), Some("office"));

        let delta = extract("An office in Austin. Parking too");
        assert_eq!(required(&delta, FieldKey::Location), Some("Austin"));
        assert_eq!(delta.additional.get("parking").map(String::as_str), Some("requested"));
    }

    #[test]
    fn abbreviated_places_keep_their_period() {
        let delta = extract("looking for a shop in St. Louis");
        assert_eq!(required(&delta, FieldKey::Location), Some("St. Louis"));
    }

    #[test]
    fn head_counts_are_not_floor_area() {
        let delta = extract("I need space for 20 employees");
        assert!(delta.required.is_empty(), "unexpected {delta:?}");

        let delta = extract("parking space for 2 cars");
        assert_eq!(required(&delta, FieldKey::TotalSize), None);
        assert_eq!(delta.additional.get("parking").map(String::as_str), Some("requested"));

        let delta = extract("budget is 500k, space for 12 people");
        assert_eq!(required(&delta, FieldKey::Budget), Some("500k"));
        assert_eq!(delta.required.len(), 1);
    }
}
