use async_trait::async_trait;
use scraper::Selector;
use serde::Deserialize;

use super::signal::{PageSignals, SignalProbe};
use crate::element_finder::{compile_selector, ElementFinder};
use crate::models::{AvailabilityVerdict, TrackedItem};
use crate::plugins::traits::Probe;
use crate::scraper::{fetch_rendered, BrowsingSession};
use crate::utils::error::{AppError, Result};

const PRODUCT_DETAILS: &str = "#productDetails";
const VARIANTS_ATTR: &str = "data-variants";

const FALLBACK: PageSignals = PageSignals {
    add_to_cart: "button[name=add]:not([disabled])",
    out_of_stock: &["Sold out"],
    out_of_stock_scope: None,
};

#[derive(Debug, Deserialize)]
struct VariantStock {
    #[serde(rename = "qtyInStock")]
    qty_in_stock: i64,
}

/// The store embeds per-variant inventory as JSON on the product details
/// node. The first variant's quantity is the purchase signal; when that JSON
/// is missing or malformed the add-to-cart button is used instead.
pub struct CoreHomeFitnessProbe {
    details: Selector,
    fallback: SignalProbe,
}

impl CoreHomeFitnessProbe {
    pub const NAME: &'static str = "Core Home Fitness";

    pub fn new() -> Result<Self> {
        Ok(Self {
            details: compile_selector(PRODUCT_DETAILS)?,
            fallback: SignalProbe::new(Self::NAME, &FALLBACK)?,
        })
    }

    fn stock_quantity(&self, finder: &ElementFinder) -> Option<i64> {
        let raw = finder.attribute(&self.details, VARIANTS_ATTR)?;

        match parse_stock(&raw) {
            Ok(quantity) => {
                tracing::debug!("Product details: {} in stock", quantity);
                Some(quantity)
            }
            Err(e) => {
                tracing::warn!("Failed to parse product details, using add-to-cart button: {}", e);
                None
            }
        }
    }

    pub fn evaluate(&self, html: &str) -> AvailabilityVerdict {
        let finder = ElementFinder::parse(html);
        let (can_add, not_in_stock) = self.fallback.signals(&finder, html);

        let purchasable = match self.stock_quantity(&finder) {
            Some(quantity) => quantity > 0,
            None => can_add,
        };

        if purchasable && !not_in_stock {
            AvailabilityVerdict::Available
        } else {
            AvailabilityVerdict::Unavailable
        }
    }
}

fn parse_stock(raw: &str) -> Result<i64> {
    let variants: Vec<VariantStock> = serde_json::from_str(raw).map_err(|e| AppError::Parse {
        message: format!("invalid variants JSON: {}", e),
    })?;

    variants
        .first()
        .map(|variant| variant.qty_in_stock)
        .ok_or_else(|| AppError::Parse {
            message: "variants list is empty".to_string(),
        })
}

#[async_trait]
impl Probe for CoreHomeFitnessProbe {
    fn name(&self) -> &str {
        Self::NAME
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
