//! Absolute asset path rewriting

/// Point root-relative `/media/` and `/static/` references at the origin so
/// assets load directly instead of through the proxy.
///
/// `href="/static/` is rewritten to a `src=` attribute. Pages served through
/// the proxy rely on this exact output, so it is kept as is.
pub fn rewrite_asset_paths(content: &str, scheme: &str, origin_domain: &str) -> String {
    let base_url = format!("{}{}", scheme, origin_domain);
    content
        .replace("src=\"/media/", &format!("src=\"{}/media/", base_url))
        .replace("href=\"/media/", &format!("href=\"{}/media/", base_url))
        .replace("src=\"/static/", &format!("src=\"{}/static/", base_url))
        .replace("href=\"/static/", &format!("src=\"{}/static/", base_url))
}
