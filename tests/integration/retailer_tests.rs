use super::*;
use chrono::Utc;
use stock_watcher::cache::FoundCache;

const WALMART_BUYABLE: &str = r#"<html><body>
<h1>Adjustable Dumbbells</h1>
<button class="prod-product-cta-add-to-cart">Add to cart</button>
</body></html>"#;

const TARGET_SOLD_OUT: &str = r#"<html><body>
<button data-test="shippingATCButton" disabled>Add to cart</button>
<div>Not available</div>
</body></html>"#;

fn default_harness(pages: Vec<(String, String)>) -> Harness {
    let registry = RetailerRegistry::with_default_retailers(&["Bestbuy".to_string()]).unwrap();
    Harness::new(registry, FakeLauncher::new(pages.into_iter().collect()))
}

#[tokio::test]
async fn test_walmart_item_found_and_persisted() -> anyhow::Result<()> {
    let mut harness = default_harness(vec![page("https://walmart.com/ip/1", WALMART_BUYABLE)]);
    let mut cache = FoundCache::new();

    let before = Utc::now();
    let report = harness
        .runner
        .run_cycle(&[item("A", "https://walmart.com/ip/1")], &mut cache)
        .await?;

    assert_eq!(report.available, 1);
    let found_at = cache.last_found("A").expect("A recorded");
    assert!(found_at >= before - chrono::Duration::milliseconds(1));

    let events = harness.drain_notifications();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].url, "https://walmart.com/ip/1");

    let persisted = FoundCache::load(&harness.cache_path)?;
    assert_eq!(persisted.last_found("A"), Some(found_at));
    Ok(())
}

#[tokio::test]
async fn test_target_out_of_stock() -> anyhow::Result<()> {
    let mut harness = default_harness(vec![page("https://www.target.com/p/-/A-1", TARGET_SOLD_OUT)]);
    let mut cache = FoundCache::new();

    let report = harness
        .runner
        .run_cycle(&[item("bench", "https://www.target.com/p/-/A-1")], &mut cache)
        .await?;

    assert_eq!(report.unavailable, 1);
    assert!(cache.is_empty());
    assert!(harness.drain_notifications().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_core_home_fitness_inventory() -> anyhow::Result<()> {
    let in_stock = r#"<div id="productDetails" data-variants='[{"qtyInStock": 2}]'></div>"#;
    let empty = r#"<div id="productDetails" data-variants='[{"qtyInStock": 0}]'></div><button name="add">Add</button>"#;
    let mut harness = default_harness(vec![
        page("https://corehomefitness.com/products/dumbbells", in_stock),
        page("https://corehomefitness.com/products/stand", empty),
    ]);
    let mut cache = FoundCache::new();

    let report = harness
        .runner
        .run_cycle(
            &[
                item("dumbbells", "https://corehomefitness.com/products/dumbbells"),
                item("stand", "https://corehomefitness.com/products/stand"),
            ],
            &mut cache,
        )
        .await?;

    assert_eq!(report.available, 1);
    assert_eq!(report.unavailable, 1);
    assert!(cache.last_found("dumbbells").is_some());
    assert!(cache.last_found("stand").is_none());
    assert_eq!(harness.drain_notifications().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_disabled_retailer_is_not_visited() -> anyhow::Result<()> {
    let buyable = r#"<div class="fulfillment-add-to-cart-button"><button class="add-to-cart-button">Add</button></div>"#;
    let mut harness = default_harness(vec![page("https://www.bestbuy.com/site/1", buyable)]);
    let mut cache = FoundCache::new();

    let report = harness
        .runner
        .run_cycle(&[item("rack", "https://www.bestbuy.com/site/1")], &mut cache)
        .await?;

    assert_eq!(report.unavailable, 1);
    assert!(harness.log.visited().is_empty());
    assert!(cache.is_empty());
    assert!(harness.drain_notifications().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_regional_storefront_is_unmatched() -> anyhow::Result<()> {
    let harness = default_harness(Vec::new());
    let mut cache = FoundCache::new();

    let report = harness
        .runner
        .run_cycle(&[item("kettlebell", "https://www.amazon.co.uk/dp/B000")], &mut cache)
        .await?;

    assert_eq!(report.unmatched, 1);
    assert_eq!(harness.log.opened(), 1);
    assert!(harness.log.visited().is_empty());
    Ok(())
}
