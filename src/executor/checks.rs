//! Built-in product page checks, one procedure per `(category, id)`.
//!
//! Structural candidates follow common storefront markup (test ids first,
//! then theme classes, then schema.org microdata, then bare tags).

use serde_json::json;

use super::locate::Target;
use super::registry::{CheckContext, CheckRegistry};
use super::types::CheckResult;
use crate::capability::MULTIPLE_IMAGES;

pub const CORE_PRODUCT_INFO: &str = "core-product-info";
pub const PRICING: &str = "pricing";
pub const VARIANT_SELECTION: &str = "variant-selection";
pub const ADD_TO_CART: &str = "add-to-cart";
pub const PRODUCT_MEDIA: &str = "product-media";

const TITLE: Target<'static> = Target::new(
    "Locate the product title",
    &[
        "[data-testid=\"product-title\"]",
        "h1.product-title",
        "h1.product__title",
        ".product-single__title",
        "h1[itemprop=\"name\"]",
        "main h1",
        "h1",
    ],
);

const DESCRIPTION: Target<'static> = Target::new(
    "Locate the product description",
    &[
        "[data-testid=\"product-description\"]",
        ".product-description",
        ".product__description",
        ".product-single__description",
        "[itemprop=\"description\"]",
        "#product-description",
    ],
);

const BREADCRUMBS: Target<'static> = Target::new(
    "Locate the breadcrumb navigation",
    &[
        "[data-testid=\"breadcrumbs\"]",
        "nav[aria-label=\"breadcrumb\"]",
        "nav[aria-label=\"Breadcrumb\"]",
        ".breadcrumbs",
        ".breadcrumb",
    ],
);

const SKU: Target<'static> = Target::new(
    "Locate the product SKU",
    &[
        "[data-testid=\"product-sku\"]",
        "[itemprop=\"sku\"]",
        ".product-sku",
        ".product__sku",
        ".sku",
    ],
);

const PRICE: Target<'static> = Target::new(
    "Locate the current product price",
    &[
        "[data-testid=\"product-price\"]",
        ".price__current",
        ".product-price",
        ".product__price",
        "[itemprop=\"price\"]",
        ".price",
    ],
);

const SALE_MARKER: Target<'static> = Target::new(
    "Locate the original (compare-at) price or sale badge",
    &[
        "[data-testid=\"compare-at-price\"]",
        ".price__compare",
        ".compare-at-price",
        ".price--on-sale",
        ".was-price",
        ".sale-badge",
        "s.price",
        "del",
    ],
);

const VARIANT_DROPDOWN: Target<'static> = Target::new(
    "Locate the variant dropdown",
    &[
        "select[data-testid=\"variant-select\"]",
        "select[name=\"id\"]",
        ".product-form__input select",
        "select.variant-select",
        "select[name*=\"option\"]",
    ],
);

const VARIANT_SWATCH: Target<'static> = Target::new(
    "Locate a variant option swatch",
    &[
        "[data-testid=\"variant-swatch\"]",
        ".variant-swatch",
        ".swatch label",
        ".product-form__input label",
        "[role=\"radiogroup\"] [role=\"radio\"]",
    ],
);

const VARIANT_ANY: Target<'static> = Target::new(
    "Locate the variant selector (size, color or style options)",
    &[
        "select[data-testid=\"variant-select\"]",
        "[data-testid=\"variant-swatch\"]",
        "select[name=\"id\"]",
        ".product-form__input select",
        ".variant-swatch",
        ".swatch label",
        "[role=\"radiogroup\"]",
    ],
);

const ADD_TO_CART_BUTTON: Target<'static> = Target::new(
    "Locate the add to cart button",
    &[
        "[data-testid=\"add-to-cart\"]",
        "button[name=\"add\"]",
        "#AddToCart",
        ".product-form__submit",
        "button.add-to-cart",
        "form[action*=\"/cart/add\"] button[type=\"submit\"]",
    ],
);

const CART_FEEDBACK: Target<'static> = Target::new(
    "Locate the cart count or added-to-cart confirmation",
    &[
        "[data-testid=\"cart-count\"]",
        ".cart-count-bubble",
        ".cart-count",
        "#CartCount",
        "[data-cart-count]",
        ".cart-notification",
        ".cart-drawer[open]",
    ],
);

const QUANTITY: Target<'static> = Target::new(
    "Locate the quantity input",
    &[
        "[data-testid=\"quantity-input\"]",
        "input[name=\"quantity\"]",
        ".quantity__input",
        "input.quantity",
    ],
);

const MAIN_IMAGE: Target<'static> = Target::new(
    "Locate the main product image",
    &[
        "[data-testid=\"product-image\"]",
        ".product__media img",
        ".product-single__photo img",
        ".product-image img",
        "img[itemprop=\"image\"]",
        "main img",
    ],
);

const GALLERY_IMAGES: Target<'static> = Target::new(
    "Locate the product image gallery",
    &[
        "[data-testid=\"product-gallery\"] img",
        ".product__media-list img",
        ".product-gallery img",
        ".product-images img",
    ],
);

const THUMBNAIL: Target<'static> = Target::new(
    "Locate a product image thumbnail",
    &[
        "[data-testid=\"product-thumbnail\"]",
        ".product__media-toggle",
        ".product-thumbnails img",
        ".thumbnails img",
        ".thumbnail",
    ],
);

/// Populate `registry` with every built-in check
pub fn register_builtin(registry: &mut CheckRegistry) {
    registry
        .register(CORE_PRODUCT_INFO, "title-visible", title_visible)
        .register(CORE_PRODUCT_INFO, "description-visible", description_visible)
        .register(CORE_PRODUCT_INFO, "breadcrumbs-visible", breadcrumbs_visible)
        .register(CORE_PRODUCT_INFO, "sku-visible", sku_visible)
        .register(PRICING, "price-visible", price_visible)
        .register(PRICING, "sale-price-shown", sale_price_shown)
        .register(PRICING, "price-format", price_format)
        .register(VARIANT_SELECTION, "variant-selector-visible", variant_selector_visible)
        .register(VARIANT_SELECTION, "select-variant", select_variant)
        .register(ADD_TO_CART, "add-to-cart-visible", add_to_cart_visible)
        .register(ADD_TO_CART, "add-to-cart-click", add_to_cart_click)
        .register(ADD_TO_CART, "quantity-selector", quantity_selector)
        .register(PRODUCT_MEDIA, "main-image-visible", main_image_visible)
        .register(PRODUCT_MEDIA, "image-gallery", image_gallery)
        .register(PRODUCT_MEDIA, "thumbnail-click", thumbnail_click);
}

/// Read the text of `selector` into an `extract` step
fn read_text(ctx: &mut CheckContext<'_>, instruction: &str, selector: &str) -> CheckResult<String> {
    let text = ctx.page.text_content(selector)?.unwrap_or_default();
    let text = text.trim().to_string();
    ctx.log.extract(instruction, Some(selector), json!(text));
    Ok(text)
}

// core-product-info

fn title_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let selector = ctx.require_visible(&TITLE, "product title")?;
    let title = read_text(ctx, "Read the product title", &selector)?;
    ctx.ensure(
        !title.is_empty(),
        "product title has text",
        Some(selector.as_str()),
        "non-empty title",
        format!("{:?}", title),
    )
}

fn description_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.require_visible(&DESCRIPTION, "product description").map(drop)
}

fn breadcrumbs_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.require_visible(&BREADCRUMBS, "breadcrumb navigation").map(drop)
}

fn sku_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let selector = ctx.require_visible(&SKU, "product SKU")?;
    read_text(ctx, "Read the product SKU", &selector).map(drop)
}

// pricing

fn price_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let selector = ctx.require_visible(&PRICE, "product price")?;
    let price = read_text(ctx, "Read the displayed price", &selector)?;
    ctx.ensure(
        price.chars().any(|c| c.is_ascii_digit()),
        "price text contains an amount",
        Some(selector.as_str()),
        "a numeric amount",
        format!("{:?}", price),
    )
}

fn sale_price_shown(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.require_visible(&SALE_MARKER, "sale price marker")?;
    ctx.require_visible(&PRICE, "current sale price").map(drop)
}

fn price_format(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let selector = ctx.require_visible(&PRICE, "product price")?;
    let price = read_text(ctx, "Read the displayed price", &selector)?;
    ctx.ensure(
        has_currency_marker(&price),
        "price shows a currency",
        Some(selector.as_str()),
        "currency symbol or ISO code",
        format!("{:?}", price),
    )
}

/// Currency symbol or a three-letter uppercase code next to the amount
pub(crate) fn has_currency_marker(price: &str) -> bool {
    const SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₽', '₺', '₫', '฿', '₪'];
    if price.contains(SYMBOLS) {
        return true;
    }
    price
        .split(|c: char| !c.is_ascii_alphabetic())
        .any(|word| word.len() == 3 && word.chars().all(|c| c.is_ascii_uppercase()))
}

// variant-selection

fn variant_selector_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.require_visible(&VARIANT_ANY, "variant selector").map(drop)
}

fn select_variant(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    if let Some(dropdown) = first_structural(ctx, &VARIANT_DROPDOWN)? {
        ctx.log.act("Select the second variant option", &dropdown, Some(json!({ "index": 1 })));
        ctx.page.select_option(&dropdown, 1)?;
    } else {
        let swatch = ctx.require_visible(&VARIANT_SWATCH, "variant swatch")?;
        ctx.log.act("Click a variant swatch", &swatch, None);
        ctx.page.click(&swatch)?;
    }
    ctx.page.wait(ctx.settings.settle);
    ctx.require_visible(&PRICE, "price after variant change").map(drop)
}

/// Structural-only lookup that records an observe step on success
fn first_structural(ctx: &mut CheckContext<'_>, target: &Target<'_>) -> CheckResult<Option<String>> {
    for candidate in target.candidates {
        if ctx.page.is_visible(candidate)? {
            ctx.log.observe(
                target.instruction,
                Some(*candidate),
                json!({ "strategy": "structural", "visible": true }),
            );
            return Ok(Some((*candidate).to_string()));
        }
    }
    Ok(None)
}

// add-to-cart

fn add_to_cart_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let selector = ctx.require_visible(&ADD_TO_CART_BUTTON, "add to cart button")?;
    let enabled = ctx.page.is_enabled(&selector)?;
    ctx.ensure(
        enabled,
        "add to cart button is enabled",
        Some(selector.as_str()),
        "enabled",
        if enabled { "enabled" } else { "disabled" },
    )
}

fn add_to_cart_click(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let button = ctx.require_visible(&ADD_TO_CART_BUTTON, "add to cart button")?;
    ctx.log.act("Click the add to cart button", &button, None);
    ctx.page.click(&button)?;
    ctx.page.wait(ctx.settings.settle);
    ctx.require_visible(&CART_FEEDBACK, "cart update indicator").map(drop)
}

fn quantity_selector(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.require_visible(&QUANTITY, "quantity input").map(drop)
}

// product-media

fn main_image_visible(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    ctx.require_visible(&MAIN_IMAGE, "main product image").map(drop)
}

fn image_gallery(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let selector = ctx.require_visible(&GALLERY_IMAGES, "product image gallery")?;
    let count = ctx.page.count(&selector)?;
    ctx.log.extract("Count gallery images", Some(selector.as_str()), json!(count));

    let expected = if ctx.tokens.contains(MULTIPLE_IMAGES) { 2 } else { 1 };
    ctx.ensure(
        count >= expected,
        "gallery shows the expected number of images",
        Some(selector.as_str()),
        &format!("at least {}", expected),
        count.to_string(),
    )
}

fn thumbnail_click(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let thumbnail = ctx.require_visible(&THUMBNAIL, "product thumbnail")?;
    ctx.log.act("Click a product thumbnail", &thumbnail, None);
    ctx.page.click(&thumbnail)?;
    ctx.page.wait(ctx.settings.settle);
    ctx.require_visible(&MAIN_IMAGE, "main image after thumbnail click").map(drop)
}

/// Fallback for categories without procedures: discover the element the
/// entry describes and require it to be visible.
pub fn generic_check(ctx: &mut CheckContext<'_>) -> CheckResult<()> {
    let instruction = if ctx.entry.description.trim().is_empty() {
        ctx.entry.name.clone()
    } else {
        ctx.entry.description.clone()
    };
    let target = Target::new(&instruction, &[]);
    let what = ctx.entry.name.clone();
    ctx.require_visible(&target, &what).map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_marker() {
        assert!(has_currency_marker("$19.99"));
        assert!(has_currency_marker("19,99 €"));
        assert!(has_currency_marker("1 299 SEK"));
        assert!(!has_currency_marker("19.99"));
        assert!(!has_currency_marker("Now 19.99"));
    }

    #[test]
    fn test_every_target_has_candidates() {
        let targets = [
            TITLE, DESCRIPTION, BREADCRUMBS, SKU, PRICE, SALE_MARKER, VARIANT_DROPDOWN,
            VARIANT_SWATCH, VARIANT_ANY, ADD_TO_CART_BUTTON, CART_FEEDBACK, QUANTITY,
            MAIN_IMAGE, GALLERY_IMAGES, THUMBNAIL,
        ];
        for target in targets {
            assert!(!target.candidates.is_empty(), "{}", target.instruction);
            assert!(target.candidates.iter().all(|c| !crate::browser::is_path_query(c)));
        }
    }
}
