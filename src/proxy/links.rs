//! Anchor rewriting so navigation stays inside the proxy

use lol_html::{element, rewrite_str, RewriteStrSettings};
use tracing::{debug, warn};

use crate::db::Site;

/// Compute the proxied form of an anchor's `href`, or `None` to leave it.
///
/// Matching is by substring on both the scheme and the origin domain. An
/// href containing the scheme but not the domain (another site) is kept;
/// everything else, including `mailto:` and fragment links, is routed to
/// `/{site}/{origin_domain}/{path}`.
pub fn proxied_href(href: &str, origin_domain: &str, site_name: &str, scheme: &str) -> Option<String> {
    let has_scheme = href.contains(scheme);
    if has_scheme && !href.contains(origin_domain) {
        return None;
    }

    let stripped = if has_scheme {
        href.replace(scheme, "").replace(origin_domain, "")
    } else {
        href.to_string()
    };

    Some(format!("/{}/{}/{}", site_name, origin_domain, stripped.trim_matches('/')))
}

/// Rewrite every `<a href>` in `content` through [`proxied_href`].
///
/// Parsing is lenient: ambiguous markup does not stop the rewrite. If the
/// document still cannot be rewritten the content is returned unchanged.
pub fn rewrite_links(content: &str, origin_domain: &str, site: &Site, scheme: &str) -> String {
    let settings = RewriteStrSettings {
        element_content_handlers: vec![element!("a[href]", |el| {
            if let Some(href) = el.get_attribute("href") {
                if let Some(rewritten) = proxied_href(&href, origin_domain, &site.name, scheme) {
                    el.set_attribute("href", &rewritten)?;
                }
            }
            Ok(())
        })],
        strict: false,
        ..RewriteStrSettings::default()
    };

    match rewrite_str(content, settings) {
        Ok(rewritten) => {
            debug!("Rewrote links for site {} via {}", site.name, origin_domain);
            rewritten
        }
        Err(e) => {
            warn!("Link rewriting failed for site {}: {}", site.name, e);
            content.to_string()
        }
    }
}
