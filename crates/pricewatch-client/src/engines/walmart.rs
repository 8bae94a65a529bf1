//! Walmart search-results extraction.

use std::sync::LazyLock;

use pricewatch_core::models::{Marketplace, ProductRecord};
use pricewatch_core::price::parse_price;
use scraper::{Html, Selector};

use super::{resolve_url, text_of};

const BASE_URL: &str = "https://www.walmart.com";

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="item-stack"]"#).expect("valid selector"));
static NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span[data-automation-id="product-title"]"#).expect("valid selector")
});
static PRICE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span[data-automation-id="product-price"]"#).expect("valid selector")
});
static LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[data-automation-id="product-title"]"#).expect("valid selector")
});
static IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"img[data-testid="product-image"]"#).expect("valid selector")
});

pub(super) fn extract(html: &str, max_results: usize) -> Vec<ProductRecord> {
    let document = Html::parse_document(html);
    document
        .select(&CONTAINER)
        .take(max_results)
        .filter_map(parse_container)
        .collect()
}

fn parse_container(container: scraper::ElementRef<'_>) -> Option<ProductRecord> {
    let name = container
        .select(&NAME)
        .next()
        .map(text_of)
        .filter(|n| !n.is_empty())?;

    let price_text = container.select(&PRICE).next().map(text_of)?;
    let price = parse_price(&price_text)?;

    let url = container
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_url(BASE_URL, href))
        .unwrap_or_default();

    let image_url = container
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or_default()
        .to_string();

    let availability = !text_of(container).contains("Out of stock");

    Some(ProductRecord {
        name,
        price,
        original_price: None,
        url,
        image_url,
        availability,
        seller_name: "Walmart".to_string(),
        rating: None,
        marketplace: Marketplace::Walmart,
    })
}
