//! eBay search-results extraction.

use std::sync::LazyLock;

use pricewatch_core::models::{Marketplace, ProductRecord};
use pricewatch_core::price::parse_price;
use scraper::{Html, Selector};

use super::text_of;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.s-item").expect("valid selector"));
static NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3.s-item__title").expect("valid selector"));
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.s-item__price").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.s-item__link").expect("valid selector"));
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.s-item__image").expect("valid selector"));

pub(super) fn extract(html: &str, max_results: usize) -> Vec<ProductRecord> {
    let document = Html::parse_document(html);
    document
        .select(&CONTAINER)
        .take(max_results)
        .filter_map(parse_container)
        .collect()
}

fn parse_container(container: scraper::ElementRef<'_>) -> Option<ProductRecord> {
    let name = container.select(&NAME).next().map(text_of)?;
    // eBay pads results with a promotional "Shop on eBay" tile.
    if name.is_empty() || name.contains("Shop on eBay") {
        return None;
    }

    let price_text = container.select(&PRICE).next().map(text_of)?;
    let price = parse_price(&price_text)?;

    let url = container
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default()
        .to_string();

    let image_url = container
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or_default()
        .to_string();

    Some(ProductRecord {
        name,
        price,
        original_price: None,
        url,
        image_url,
        // Listed items are available by definition.
        availability: true,
        seller_name: "eBay".to_string(),
        rating: None,
        marketplace: Marketplace::Ebay,
    })
}
