// Retailer probe implementations
pub mod core_home_fitness;
pub mod signal;

pub use core_home_fitness::CoreHomeFitnessProbe;
pub use signal::{PageSignals, SignalProbe};

use std::sync::Arc;

use crate::plugins::registry::RetailerBinding;
use crate::utils::error::Result;

pub const AMAZON: PageSignals = PageSignals {
    add_to_cart: "#add-to-cart-button",
    out_of_stock: &["in stock on"],
    out_of_stock_scope: None,
};

pub const WALMART: PageSignals = PageSignals {
    add_to_cart: ".prod-product-cta-add-to-cart",
    out_of_stock: &["Get In-Stock Alert", "Delivery not available"],
    out_of_stock_scope: None,
};

pub const TARGET: PageSignals = PageSignals {
    add_to_cart: "[data-test=shippingATCButton]",
    out_of_stock: &["Not available"],
    out_of_stock_scope: None,
};

pub const BESTBUY: PageSignals = PageSignals {
    add_to_cart: ".add-to-cart-button:not(.btn-disabled)",
    out_of_stock: &["Sold Out"],
    out_of_stock_scope: Some(".fulfillment-add-to-cart-button"),
};

pub const DICKS_SPORTING_GOODS: PageSignals = PageSignals {
    add_to_cart: "#add-to-cart:not([disabled])",
    out_of_stock: &["Out of Stock", "Not Available Online"],
    out_of_stock_scope: None,
};

/// Supported retailers in resolution order. Retailers named in `disabled`
/// (case-insensitive) are registered but never probed.
pub fn default_bindings(disabled: &[String]) -> Result<Vec<RetailerBinding>> {
    let is_enabled = |name: &str| !disabled.iter().any(|d| d.eq_ignore_ascii_case(name));

    let signal_retailers = [
        ("Amazon", r"amazon\.com", AMAZON),
        ("Walmart", r"walmart\.com", WALMART),
        ("Target", r"target\.com", TARGET),
        ("Bestbuy", r"bestbuy\.com", BESTBUY),
    ];

    let mut bindings = Vec::new();
    for (name, pattern, signals) in signal_retailers {
        let probe = Arc::new(SignalProbe::new(name, &signals)?);
        bindings.push(RetailerBinding::new(pattern, probe)?.enabled(is_enabled(name)));
    }

    let core_home_fitness = Arc::new(CoreHomeFitnessProbe::new()?);
    bindings.push(
        RetailerBinding::new(r"corehomefitness\.com", core_home_fitness)?
            .enabled(is_enabled(CoreHomeFitnessProbe::NAME)),
    );

    let dicks = Arc::new(SignalProbe::new("Dicks Sporting Goods", &DICKS_SPORTING_GOODS)?);
    bindings.push(
        RetailerBinding::new(r"dickssportinggoods\.com", dicks)?
            .enabled(is_enabled("Dicks Sporting Goods")),
    );

    Ok(bindings)
}
