//! Selector-driven extraction for sites without a dedicated engine.

use pricewatch_core::error::AppError;
use pricewatch_core::models::{ProductRecord, SiteConfig};
use pricewatch_core::price::parse_price;
use scraper::{ElementRef, Html, Selector};

use super::{resolve_url, text_of};

pub(super) fn extract(
    site: &SiteConfig,
    html: &str,
    max_results: usize,
) -> Result<Vec<ProductRecord>, AppError> {
    site.selectors.validate()?;

    let container = parse_selector("container", &site.selectors.container)?;
    let name = parse_selector("name", &site.selectors.name)?;
    let price = parse_selector("price", &site.selectors.price)?;
    let url = parse_optional("url", &site.selectors.url)?;
    let image = parse_optional("image", &site.selectors.image)?;
    let availability = parse_optional("availability", &site.selectors.availability)?;

    let document = Html::parse_document(html);
    let mut records = Vec::new();
    for element in document.select(&container).take(max_results) {
        let Some(record) = parse_container(
            site,
            element,
            &name,
            &price,
            url.as_ref(),
            image.as_ref(),
            availability.as_ref(),
        ) else {
            continue;
        };
        records.push(record);
    }
    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn parse_container(
    site: &SiteConfig,
    container: ElementRef<'_>,
    name_sel: &Selector,
    price_sel: &Selector,
    url_sel: Option<&Selector>,
    image_sel: Option<&Selector>,
    availability_sel: Option<&Selector>,
) -> Option<ProductRecord> {
    let name = container
        .select(name_sel)
        .next()
        .map(text_of)
        .filter(|n| !n.is_empty())?;

    let price_text = container.select(price_sel).next().map(text_of)?;
    let price = parse_price(&price_text)?;

    let url = url_sel
        .and_then(|sel| container.select(sel).next())
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_url(&site.base_url, href))
        .unwrap_or_default();

    let image_url = image_sel
        .and_then(|sel| container.select(sel).next())
        .and_then(|img| img.value().attr("src"))
        .map(|src| resolve_url(&site.base_url, src))
        .unwrap_or_default();

    // No availability selector means assume in stock.
    let availability = availability_sel
        .and_then(|sel| container.select(sel).next())
        .map(|el| {
            let status = text_of(el).to_lowercase();
            !status.contains("out of stock") && !status.contains("unavailable")
        })
        .unwrap_or(true);

    Some(ProductRecord {
        name,
        price,
        original_price: None,
        url,
        image_url,
        availability,
        seller_name: site.name.clone(),
        rating: None,
        marketplace: site.marketplace,
    })
}

fn parse_selector(field: &str, raw: &str) -> Result<Selector, AppError> {
    Selector::parse(raw)
        .map_err(|e| AppError::ConfigError(format!("Invalid '{field}' selector '{raw}': {e}")))
}

fn parse_optional(field: &str, raw: &str) -> Result<Option<Selector>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_selector(field, raw).map(Some)
}
