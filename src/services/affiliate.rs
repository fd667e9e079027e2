const FOOD: &[&str] = &[
    "https://s.shopee.tw/2VkTZLnxpK",
    "https://www.momoshop.com.tw/food_link_example",
    "https://www.amazon.com/s?k=food",
];

const TECH: &[&str] = &["https://www.amazon.com/s?k=tech", "https://s.shopee.tw/tech_link_example"];

const DEFAULT: &[&str] = &["https://s.shopee.tw/2VkTZLnxpK"];

const SEARCH_URL: &str = "https://www.google.com/search?q=";

fn candidates(category_hint: &str) -> &'static [&'static str] {
    match category_hint {
        "food" => FOOD,
        "tech" => TECH,
        _ => DEFAULT,
    }
}

/// Promotional URL for a category. Always the first candidate; unknown
/// categories use the default list.
pub fn choose_affiliate_link(_keyword: &str, category_hint: &str) -> &'static str {
    candidates(category_hint)
        .first()
        .or_else(|| DEFAULT.first())
        .copied()
        .unwrap_or_default()
}

/// HTML buy-button block appended to every article.
///
/// The keyword is URL-escaped in the search link but echoed verbatim in the
/// visible label.
pub fn affiliate_block(keyword: &str, category_hint: &str) -> String {
    let url = choose_affiliate_link(keyword, category_hint);
    if url.is_empty() {
        return String::new();
    }
    let search_url = format!("{}{}", SEARCH_URL, urlencoding::encode(keyword));

    format!(
        r#"<div class="affiliate-box">
<a class="affiliate-button" href="{url}" target="_blank" rel="nofollow sponsored noopener">🛒 Shop {keyword}</a>
<a class="affiliate-search" href="{search_url}" target="_blank" rel="nofollow noopener">Compare prices</a>
</div>"#
    )
}
