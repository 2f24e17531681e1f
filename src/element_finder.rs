use scraper::{Html, Selector};

use crate::utils::error::{AppError, Result};

/// Query helpers over one rendered document.
///
/// `Html` is not `Send`, so a finder must be built and dropped without
/// crossing an `.await`.
pub struct ElementFinder {
    document: Html,
}

pub fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|_| AppError::Selector {
        selector: selector.to_string(),
    })
}

impl ElementFinder {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    pub fn exists(&self, selector: &Selector) -> bool {
        self.document.select(selector).next().is_some()
    }

    /// Text of every match, one line per element.
    pub fn text_of(&self, selector: &Selector) -> Option<String> {
        let parts: Vec<String> = self
            .document
            .select(selector)
            .map(|element| element.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Value of `attribute` on the first match.
    pub fn attribute(&self, selector: &Selector, attribute: &str) -> Option<String> {
        self.document
            .select(selector)
            .next()
            .and_then(|element| element.value().attr(attribute))
            .map(|value| value.to_string())
    }
}
