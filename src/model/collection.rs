use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Identifier of a crawled repository, e.g. `"owner/name"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Collection(String);

impl Collection {
    /// Parses and validates a collection identifier
    ///
    /// The identifier must have the form `owner/name`, where both parts are
    /// non-empty and made of alphanumerics, `-`, `_` or `.`.
    ///
    /// # Example
    ///
    /// ```
    /// use pr_crawler::model::Collection;
    ///
    /// let collection = Collection::parse("apache/spark").unwrap();
    /// assert_eq!(collection.slug(), "apache_spark");
    /// assert!(Collection::parse("spark").is_err());
    /// ```
    pub fn parse(id: &str) -> Result<Self, ConfigError> {
        let (owner, name) = id
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidCollection(format!("'{}' is not owner/name", id)))?;

        for part in [owner, name] {
            if part.is_empty() || part == "." || part == ".." {
                return Err(ConfigError::InvalidCollection(format!(
                    "'{}' has an empty or relative path segment",
                    id
                )));
            }

            if !part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(ConfigError::InvalidCollection(format!(
                    "'{}' contains invalid characters",
                    id
                )));
            }
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.parts().0
    }

    pub fn name(&self) -> &str {
        self.parts().1
    }

    fn parts(&self) -> (&str, &str) {
        self.0.split_once('/').unwrap_or((&self.0, ""))
    }

    /// Relative directory holding the collection's state: `owner/name`
    ///
    /// Segments never contain a separator, so distinct collections always
    /// get distinct directories.
    pub fn state_dir(&self) -> PathBuf {
        Path::new(self.owner()).join(self.name())
    }

    /// Flat name used in export file names, e.g. `apache_spark`
    pub fn slug(&self) -> String {
        self.0.replace('/', "_")
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Collection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Collection {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Collection> for String {
    fn from(collection: Collection) -> Self {
        collection.0
    }
}
