use std::fmt;

use serde::{Deserialize, Serialize};

/// Required fields of the property requirements form.
///
/// The set is closed: a form always carries exactly these four entries, and
/// the declaration order matches the follow-up priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Budget,
    TotalSize,
    PropertyType,
    Location,
}

impl FieldKey {
    pub const ALL: [FieldKey; 4] =
        [FieldKey::Budget, FieldKey::TotalSize, FieldKey::PropertyType, FieldKey::Location];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::TotalSize => "total_size",
            Self::PropertyType => "property_type",
            Self::Location => "location",
        }
    }

    pub fn spec(&self) -> &'static FieldSpec {
        match self {
            Self::Budget => &FIELD_SCHEMA[0],
            Self::TotalSize => &FIELD_SCHEMA[1],
            Self::PropertyType => &FIELD_SCHEMA[2],
            Self::Location => &FIELD_SCHEMA[3],
        }
    }

    /// Resolves an externally supplied field name (model output, tool input)
    /// to a required field. Unknown names belong to the additional preferences.
    pub fn from_name(name: &str) -> Option<Self> {
        match normalize_field_name(name).as_str() {
            "budget" => Some(Self::Budget),
            "total_size" | "size" => Some(Self::TotalSize),
            "property_type" | "real_estate_type" | "type" => Some(Self::PropertyType),
            "location" | "city" => Some(Self::Location),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cases a field name and folds spaces and hyphens into underscores.
pub fn normalize_field_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for word in name.trim().split(|c: char| c.is_whitespace() || c == '-' || c == '_') {
        if word.is_empty() {
            continue;
        }
        if !normalized.is_empty() {
            normalized.push('_');
        }
        normalized.push_str(&word.to_lowercase());
    }
    normalized
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// Positive monetary amount, optionally tagged with a currency.
    Money,
    /// Positive floor area, normalized to square meters.
    Area,
    /// One of the known property kinds.
    PropertyKind,
    /// Free-text place name.
    Place,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub label: &'static str,
    pub semantic: SemanticType,
    /// Lower asks first.
    pub priority: u8,
    pub description: &'static str,
    pub examples: &'static [&'static str],
    pub question: &'static str,
}

pub static FIELD_SCHEMA: [FieldSpec; 4] = [
    FieldSpec {
        key: FieldKey::Budget,
        label: "Budget",
        semantic: SemanticType::Money,
        priority: 1,
        description: "Budget for the property (e.g., 20,000 USD)",
        examples: &["I have a budget of 20,000 USD", "My budget is 50,000 dollars"],
        question: "What budget do you have in mind for the property?",
    },
    FieldSpec {
        key: FieldKey::TotalSize,
        label: "Total Size",
        semantic: SemanticType::Area,
        priority: 2,
        description: "Total size requirement (e.g., 500m²)",
        examples: &["I need 500m²", "I'm looking for 300 square meters"],
        question: "How much space do you need? A rough size in square meters is fine.",
    },
    FieldSpec {
        key: FieldKey::PropertyType,
        label: "Property Type",
        semantic: SemanticType::PropertyKind,
        priority: 3,
        description: "Type of real estate (e.g., office, retail, warehouse)",
        examples: &["I am looking for an office space", "I need a retail location"],
        question: "What type of property are you looking for (office, retail, warehouse, ...)?",
    },
    FieldSpec {
        key: FieldKey::Location,
        label: "Location",
        semantic: SemanticType::Place,
        priority: 4,
        description: "City or area where the property should be (e.g., Mexico City)",
        examples: &["I want a property in Mexico City", "Looking in Barcelona"],
        question: "Which city or area should the property be in?",
    },
];

/// Schema entries ordered by follow-up priority.
pub fn by_priority() -> Vec<&'static FieldSpec> {
    let mut specs = FIELD_SCHEMA.iter().collect::<Vec<_>>();
    specs.sort_by_key(|spec| spec.priority);
    specs
}

/// Renders the schema as a bullet list for model prompts.
pub fn describe_schema() -> String {
    by_priority()
        .into_iter()
        .map(|spec| {
            let examples =
                spec.examples.iter().map(|example| format!("\"{example}\"")).collect::<Vec<_>>();
            format!("- {}: {} (Examples: {}).", spec.key, spec.description, examples.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{by_priority, describe_schema, normalize_field_name, FieldKey, FIELD_SCHEMA};

    #[test]
    fn schema_entries_line_up_with_keys() {
        for key in FieldKey::ALL {
            assert_eq!(key.spec().key, key);
        }
        assert_eq!(FIELD_SCHEMA.len(), FieldKey::ALL.len());
    }

    #[test]
    fn priority_order_is_budget_size_type_location() {
        let order = by_priority().into_iter().map(|spec| spec.key).collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![FieldKey::Budget, FieldKey::TotalSize, FieldKey::PropertyType, FieldKey::Location]
        );
    }

    #[test]
    fn field_names_resolve_with_aliases() {
        assert_eq!(FieldKey::from_name("Budget"), Some(FieldKey::Budget));
        assert_eq!(FieldKey::from_name("total size"), Some(FieldKey::TotalSize));
        assert_eq!(FieldKey::from_name("Real Estate Type"), Some(FieldKey::PropertyType));
        assert_eq!(FieldKey::from_name("city"), Some(FieldKey::Location));
        assert_eq!(FieldKey::from_name("parking"), None);
    }

    #[test]
    fn normalizes_free_form_names() {
        assert_eq!(normalize_field_name("  Move-In  Date "), "move_in_date");
        assert_eq!(normalize_field_name("parking"), "parking");
    }

    #[test]
    fn schema_description_mentions_every_field() {
        let description = describe_schema();
        for key in FieldKey::ALL {
            assert!(description.contains(key.as_str()), "missing {key}");
        }
    }
}
