use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

use crate::utils::error::{AppError, Result};

/// A product page to watch. `name` is the identity key used by the found cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub name: String,
    pub url: String,
}

impl TrackedItem {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Reads the tracked items list. The file is JSON5 so that comments and
/// unquoted keys are accepted:
///
/// ```text
/// {
///   items: [
///     { name: "Adjustable dumbbells", url: "https://www.amazon.com/dp/B001" },
///   ],
/// }
/// ```
pub fn load_items(path: &Path) -> Result<Vec<TrackedItem>> {
    let items_error = |message: String| AppError::ItemsFile {
        path: path.display().to_string(),
        message,
    };

    if !path.is_file() {
        return Err(items_error("file not found".to_string()));
    }

    let document = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json5).required(true))
        .build()
        .map_err(|e| items_error(e.to_string()))?;

    let items: Vec<TrackedItem> = document
        .get("items")
        .map_err(|e| items_error(e.to_string()))?;

    validate_items(&items).map_err(items_error)?;
    Ok(items)
}

fn validate_items(items: &[TrackedItem]) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();

    for item in items {
        if item.name.trim().is_empty() {
            return Err(format!("item with url '{}' has an empty name", item.url));
        }
        if !seen.insert(item.name.as_str()) {
            return Err(format!("duplicate item name '{}'", item.name));
        }
        if let Err(e) = Url::parse(&item.url) {
            return Err(format!("item '{}' has an invalid url '{}': {}", item.name, item.url, e));
        }
    }

    Ok(())
}
