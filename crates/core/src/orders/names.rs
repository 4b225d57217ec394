//! Person name schemes used for attendee and invoice names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name parts keyed by scheme field (`given_name`, `family_name`, ...).
pub type NameParts = BTreeMap<String, String>;

/// How an event asks for person names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameScheme {
    #[default]
    Full,
    GivenFamily,
    TitleGivenFamily,
    FamilyGiven,
    CallingFull,
}

impl NameScheme {
    /// Field keys in display order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            NameScheme::Full => &["full_name"],
            NameScheme::GivenFamily => &["given_name", "family_name"],
            NameScheme::TitleGivenFamily => &["title", "given_name", "family_name"],
            NameScheme::FamilyGiven => &["family_name", "given_name"],
            NameScheme::CallingFull => &["calling_name", "full_name"],
        }
    }

    /// Sample values shown in previews.
    pub fn sample(&self) -> NameParts {
        let pairs: &[(&str, &str)] = match self {
            NameScheme::Full => &[("full_name", "John Doe")],
            NameScheme::GivenFamily => &[("given_name", "John"), ("family_name", "Doe")],
            NameScheme::TitleGivenFamily => &[
                ("title", "Dr"),
                ("given_name", "John"),
                ("family_name", "Doe"),
            ],
            NameScheme::FamilyGiven => &[("family_name", "Doe"), ("given_name", "John")],
            NameScheme::CallingFull => &[("calling_name", "John"), ("full_name", "John Doe")],
        };
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Join name parts into a single display name.
    pub fn concatenate(&self, parts: &NameParts) -> String {
        match self {
            NameScheme::FamilyGiven => join_nonempty(
                &[field(parts, "family_name"), field(parts, "given_name")],
                ", ",
            ),
            NameScheme::CallingFull => field(parts, "full_name").to_string(),
            _ => join_nonempty(
                &self
                    .fields()
                    .iter()
                    .map(|f| field(parts, f))
                    .collect::<Vec<_>>(),
                " ",
            ),
        }
    }
}

fn field<'a>(parts: &'a NameParts, key: &str) -> &'a str {
    parts.get(key).map(String::as_str).unwrap_or("")
}

fn join_nonempty(values: &[&str], separator: &str) -> String {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
