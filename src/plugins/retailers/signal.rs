use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use scraper::Selector;

use crate::element_finder::{compile_selector, ElementFinder};
use crate::models::{AvailabilityVerdict, TrackedItem};
use crate::plugins::traits::Probe;
use crate::scraper::{fetch_rendered, BrowsingSession};
use crate::utils::error::Result;

/// The page markers a retailer uses to say an item can or cannot be bought.
#[derive(Debug, Clone, Copy)]
pub struct PageSignals {
    /// Present when a purchase control is on the page and enabled.
    pub add_to_cart: &'static str,
    /// Case-insensitive out-of-stock copy.
    pub out_of_stock: &'static [&'static str],
    /// Restricts the out-of-stock search to this element's text. The whole
    /// rendered document is searched when unset.
    pub out_of_stock_scope: Option<&'static str>,
}

/// Probe driven entirely by a retailer's `PageSignals`.
pub struct SignalProbe {
    name: String,
    add_to_cart: Selector,
    out_of_stock: Vec<Regex>,
    scope: Option<Selector>,
}

impl SignalProbe {
    pub fn new(name: impl Into<String>, signals: &PageSignals) -> Result<Self> {
        let out_of_stock = signals
            .out_of_stock
            .iter()
            .map(|text| RegexBuilder::new(&regex::escape(text)).case_insensitive(true).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let scope = signals.out_of_stock_scope.map(compile_selector).transpose()?;

        Ok(Self {
            name: name.into(),
            add_to_cart: compile_selector(signals.add_to_cart)?,
            out_of_stock,
            scope,
        })
    }

    /// Returns `(can_add, not_in_stock)` for a rendered page.
    pub fn signals(&self, finder: &ElementFinder, html: &str) -> (bool, bool) {
        let can_add = finder.exists(&self.add_to_cart);

        let not_in_stock = match &self.scope {
            Some(scope) => finder
                .text_of(scope)
                .is_some_and(|text| self.out_of_stock.iter().any(|re| re.is_match(&text))),
            None => self.out_of_stock.iter().any(|re| re.is_match(html)),
        };

        (can_add, not_in_stock)
    }

    pub fn evaluate(&self, html: &str) -> AvailabilityVerdict {
        let finder = ElementFinder::parse(html);
        let (can_add, not_in_stock) = self.signals(&finder, html);
        tracing::debug!(retailer = %self.name, can_add, not_in_stock, "Evaluated page signals");

        if can_add && !not_in_stock {
            AvailabilityVerdict::Available
        } else {
            AvailabilityVerdict::Unavailable
        }
    }
}

#[async_trait]
impl Probe for SignalProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_availability(
        &self,
        session: &mut dyn BrowsingSession,
        item: &TrackedItem,
    ) -> Result<AvailabilityVerdict> {
        let html = fetch_rendered(session, &item.url).await?;
        Ok(self.evaluate(&html))
    }
}
