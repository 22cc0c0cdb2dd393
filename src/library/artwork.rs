use serde::{Deserialize, Serialize};

/// Remote-relative image path returned by the catalog (e.g. `/abc123.jpg`).
///
/// Never empty: "no artwork" is `Option::<ArtworkRef>::None`, so there is no
/// empty-string case to confuse with absence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtworkRef(String);

impl ArtworkRef {
    /// Parse a catalog value, mapping empty or blank strings to `None`.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Convenience for optional catalog fields.
    pub fn from_optional(value: Option<String>) -> Option<Self> {
        value.and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtworkRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value).ok_or_else(|| "artwork reference must not be empty".to_string())
    }
}

impl From<ArtworkRef> for String {
    fn from(value: ArtworkRef) -> Self {
        value.0
    }
}

impl std::fmt::Display for ArtworkRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
