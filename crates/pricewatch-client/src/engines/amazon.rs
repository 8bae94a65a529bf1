//! Amazon search-results extraction.

use std::sync::LazyLock;

use pricewatch_core::models::{Marketplace, ProductRecord};
use pricewatch_core::price::parse_price;
use scraper::{Html, Selector};

use super::{parse_rating, resolve_url, text_of};

const BASE_URL: &str = "https://www.amazon.com";

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[data-component-type="s-search-result"]"#).expect("valid selector")
});
static NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.a-size-mini").expect("valid selector"));
static NAME_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-size-medium").expect("valid selector"));
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-price-whole").expect("valid selector"));
static PRICE_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-offscreen").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.a-size-mini a").expect("valid selector"));
static LINK_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.a-link-normal").expect("valid selector"));
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.s-image").expect("valid selector"));
static RATING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-icon-alt").expect("valid selector"));

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
        .or_else(|| container.select(&NAME_FALLBACK).next())
        .map(text_of)
        .filter(|n| !n.is_empty())?;

    let price_text = container
        .select(&PRICE)
        .next()
        .or_else(|| container.select(&PRICE_FALLBACK).next())
        .map(text_of)?;
    let price = parse_price(&price_text)?;

    let url = container
        .select(&LINK)
        .next()
        .or_else(|| container.select(&LINK_FALLBACK).next())
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_url(BASE_URL, href))
        .unwrap_or_default();

    let image_url = container
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or_default()
        .to_string();

    let rating = container
        .select(&RATING)
        .next()
        .and_then(|r| parse_rating(&text_of(r)));

    let availability = !text_of(container).contains("Currently unavailable");

    Some(ProductRecord {
        name,
        price,
        original_price: None,
        url,
        image_url,
        availability,
        seller_name: "Amazon".to_string(),
        rating,
        marketplace: Marketplace::Amazon,
    })
}
