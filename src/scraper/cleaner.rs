use url::{Host, Url};

// ── Domains ───────────────────────────────────────────────────────────────────

/// Turn a text fragment into a canonical lowercase hostname.
/// "www.Oui.sncf/train" → "www.oui.sncf" | "https://a.b/c?d" → "a.b" | "Trains pas chers" → None
/// Bare words ("Annonce", "localhost") are not hostnames: a domain needs at least one dot.
pub fn normalize_domain(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let candidate = if has_http_scheme(text) {
        text.to_string()
    } else {
        format!("http://{}", text)
    };

    let url = Url::parse(&candidate).ok()?;
    let host = match url.host()? {
        Host::Domain(d) if d.contains('.') => d.to_lowercase(),
        Host::Domain(_) => return None,
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };

    if host.is_empty() { None } else { Some(host) }
}

fn has_http_scheme(text: &str) -> bool {
    let head = text.get(..8).unwrap_or(text).to_ascii_lowercase();
    head.starts_with("http://") || head.starts_with("https://")
}

/// First whitespace-separated token. Organic listings lead with their URL.
pub fn first_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

/// Metric-safe form of a domain: dots become underscores.
/// "www.oui.sncf" → "www_oui_sncf"
pub fn metric_segment(domain: &str) -> String {
    domain.replace('.', "_")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
