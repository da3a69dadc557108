use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A named grouping mapped to the tags that make an asset eligible for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemesFile {
    pub themes: Vec<Theme>,
}

impl ThemesFile {
    /// Case-insensitive lookup by theme name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.themes
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.themes.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Load and validate the themes configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_themes(path: &Path) -> Result<ThemesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ThemesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_themes(&content)
}

/// Parse and validate themes YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_themes(content: &str) -> Result<ThemesFile, ConfigError> {
    let mut themes_file: ThemesFile =
        serde_yaml::from_str(content).map_err(ConfigError::ThemesFileParse)?;

    for theme in &mut themes_file.themes {
        theme.tags = theme
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
    }

    validate_themes(&themes_file)?;
    Ok(themes_file)
}

fn validate_themes(themes_file: &ThemesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for theme in &themes_file.themes {
        if theme.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "theme name must be non-empty".to_string(),
            ));
        }

        if theme.tags.is_empty() {
            return Err(ConfigError::Validation(format!(
                "theme '{}' must list at least one tag",
                theme.name
            )));
        }

        if !seen_names.insert(theme.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate theme name: '{}'",
                theme.name
            )));
        }
    }

    Ok(())
}
