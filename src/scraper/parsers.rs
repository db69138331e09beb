use crate::config::SeaStrategy;
use crate::errors::ScrapeError;
use crate::models::{Device, NOT_FOUND, UNPARSEABLE};
use crate::scraper::cleaner::{first_token, normalize_domain};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

pub const AD_MARKER_SELECTOR: &str = "span";
pub const ORGANIC_CONTAINER_SELECTOR: &str = "div[id=ires]";
pub const DESKTOP_ORGANIC_SELECTOR: &str = "cite";
pub const MOBILE_ORGANIC_SELECTOR: &str = "span";
const LEGACY_AD_SELECTOR: &str = "cite";

/// A listing as found in the document. Positions are assigned by the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub raw: String,
    pub selector: &'static str,
    pub domain: String,
    /// False for matches that are not rank-ordered.
    pub ranked: bool,
}

/// Receives listings in document order.
pub trait ExtractionSink {
    fn paid(&mut self, listing: Extracted);
    fn organic(&mut self, listing: Extracted);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalCounts {
    pub markers: usize,
    pub organic: usize,
}

// ── Selector policy ───────────────────────────────────────────────────────────

/// Compiled selectors plus the device-dependent choice of organic candidates.
pub struct SelectorPolicy {
    marker: Selector,
    organic_container: Selector,
    desktop_organic: Selector,
    mobile_organic: Selector,
    legacy_ad: Selector,
    ad_label: String,
    strategy: SeaStrategy,
}

impl SelectorPolicy {
    pub fn new(ad_label: impl Into<String>, strategy: SeaStrategy) -> Result<Self, ScrapeError> {
        Ok(Self {
            marker: compile(AD_MARKER_SELECTOR)?,
            organic_container: compile(ORGANIC_CONTAINER_SELECTOR)?,
            desktop_organic: compile(DESKTOP_ORGANIC_SELECTOR)?,
            mobile_organic: compile(MOBILE_ORGANIC_SELECTOR)?,
            legacy_ad: compile(LEGACY_AD_SELECTOR)?,
            ad_label: ad_label.into(),
            strategy,
        })
    }

    fn organic_candidates(&self, device: Device) -> &Selector {
        match device {
            Device::Desktop => &self.desktop_organic,
            Device::Mobile => &self.mobile_organic,
        }
    }
}

fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector(format!("{}: {:?}", selector, e)))
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

// ── Traversal ─────────────────────────────────────────────────────────────────

/// Parse a results page and run both extraction passes over it.
pub fn traverse(
    html: &str,
    policy: &SelectorPolicy,
    device: Device,
    sink: &mut impl ExtractionSink,
) -> TraversalCounts {
    let doc = Html::parse_document(html);
    let markers = extract_paid(&doc, policy, sink);
    let organic = extract_organic(&doc, policy, device, sink);
    debug!("Traversal done: {} ad markers, {} organic listings", markers, organic);
    TraversalCounts { markers, organic }
}

// ── Paid listings ─────────────────────────────────────────────────────────────

/// Exactly one listing per ad marker, unparseable when nothing near it is a hostname.
pub fn extract_paid(doc: &Html, policy: &SelectorPolicy, sink: &mut impl ExtractionSink) -> usize {
    let mut markers = 0;

    for marker in doc
        .select(&policy.marker)
        .filter(|el| element_text(el) == policy.ad_label)
    {
        markers += 1;
        let listing = match policy.strategy {
            SeaStrategy::Sibling => sibling_listing(marker),
            SeaStrategy::ParentCite => parent_cite_listing(marker, &policy.legacy_ad),
        };
        trace!("Ad marker {} → {}", markers, listing.domain);
        sink.paid(listing);
    }

    markers
}

/// Element siblings of `el` in document order, `el` excluded.
fn siblings<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.parent()
        .into_iter()
        .flat_map(|parent| parent.children())
        .filter_map(ElementRef::wrap)
        .filter(move |sibling| *sibling != el)
}

fn sibling_listing(marker: ElementRef<'_>) -> Extracted {
    for sibling in siblings(marker) {
        let text = element_text(&sibling);
        if let Some(domain) = normalize_domain(&text) {
            return Extracted {
                raw: text,
                selector: AD_MARKER_SELECTOR,
                domain,
                ranked: true,
            };
        }
    }

    Extracted {
        raw: NOT_FOUND.to_string(),
        selector: AD_MARKER_SELECTOR,
        domain: UNPARSEABLE.to_string(),
        ranked: true,
    }
}

fn parent_cite_listing(marker: ElementRef<'_>, cite: &Selector) -> Extracted {
    let found = marker
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.select(cite).next());

    let Some(cite) = found else {
        return Extracted {
            raw: NOT_FOUND.to_string(),
            selector: AD_MARKER_SELECTOR,
            domain: UNPARSEABLE.to_string(),
            ranked: false,
        };
    };

    let raw = element_text(&cite);
    let domain = normalize_domain(&raw).unwrap_or_else(|| UNPARSEABLE.to_string());
    Extracted {
        raw,
        selector: AD_MARKER_SELECTOR,
        domain,
        ranked: false,
    }
}

// ── Organic listings ──────────────────────────────────────────────────────────

/// Candidates whose leading token is not a hostname are skipped without a position.
pub fn extract_organic(
    doc: &Html,
    policy: &SelectorPolicy,
    device: Device,
    sink: &mut impl ExtractionSink,
) -> usize {
    let candidates = policy.organic_candidates(device);
    let mut emitted = 0;

    for container in doc.select(&policy.organic_container) {
        for candidate in container.select(candidates) {
            let text = element_text(&candidate);
            let Some(domain) = first_token(&text).and_then(normalize_domain) else {
                trace!("Skipping organic candidate {:?}", text);
                continue;
            };

            sink.organic(Extracted {
                raw: text,
                selector: ORGANIC_CONTAINER_SELECTOR,
                domain,
                ranked: true,
            });
            emitted += 1;
        }
    }

    emitted
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collected {
        paid: Vec<Extracted>,
        organic: Vec<Extracted>,
    }

    impl ExtractionSink for Collected {
        fn paid(&mut self, listing: Extracted) {
            self.paid.push(listing);
        }
        fn organic(&mut self, listing: Extracted) {
            self.organic.push(listing);
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="ad"><span>Annonce</span><span>Trains pas chers</span><span>www.oui.sncf/train</span></div>
          <div class="ad"><span>Annonce</span><span>Réservez maintenant</span></div>
          <div class="ad"><span>Annonce</span><cite>https://www.trainline.fr/</cite></div>
          <div id="ires">
            <div class="g"><cite>www.sncf.com › voyages</cite></div>
            <div class="g"><cite>Pas une adresse</cite></div>
            <div class="g"><cite>www.oui.sncf › billets</cite><span>m.oui.sncf mobile</span></div>
            <div class="g"><cite>www.sncf.com › gares</cite></div>
          </div>
        </body></html>
    "#;

    fn policy(strategy: SeaStrategy) -> SelectorPolicy {
        SelectorPolicy::new("Annonce", strategy).unwrap()
    }

    #[test]
    fn test_one_paid_listing_per_marker() {
        let mut sink = Collected::default();
        let counts = traverse(PAGE, &policy(SeaStrategy::Sibling), Device::Desktop, &mut sink);

        assert_eq!(counts.markers, 3);
        let domains: Vec<_> = sink.paid.iter().map(|l| l.domain.as_str()).collect();
        assert_eq!(domains, ["www.oui.sncf", UNPARSEABLE, "www.trainline.fr"]);
        assert_eq!(sink.paid[0].raw, "www.oui.sncf/train");
        assert_eq!(sink.paid[1].raw, NOT_FOUND);
        assert!(sink.paid.iter().all(|l| l.ranked && l.selector == "span"));
    }

    #[test]
    fn test_marker_label_must_match_exactly() {
        let html = r#"<div><span>Annonces</span><span>www.a.com</span></div>
                      <div><span> Annonce </span><span>www.b.com</span></div>"#;
        let mut sink = Collected::default();
        traverse(html, &policy(SeaStrategy::Sibling), Device::Desktop, &mut sink);
        assert!(sink.paid.is_empty());
    }

    #[test]
    fn test_organic_desktop_skips_unparseable() {
        let mut sink = Collected::default();
        let counts = traverse(PAGE, &policy(SeaStrategy::Sibling), Device::Desktop, &mut sink);

        assert_eq!(counts.organic, 3);
        let domains: Vec<_> = sink.organic.iter().map(|l| l.domain.as_str()).collect();
        assert_eq!(domains, ["www.sncf.com", "www.oui.sncf", "www.sncf.com"]);
        assert_eq!(sink.organic[0].selector, ORGANIC_CONTAINER_SELECTOR);
        assert_eq!(sink.organic[0].raw, "www.sncf.com › voyages");
    }

    #[test]
    fn test_organic_mobile_uses_span_family() {
        let mut sink = Collected::default();
        traverse(PAGE, &policy(SeaStrategy::Sibling), Device::Mobile, &mut sink);

        let domains: Vec<_> = sink.organic.iter().map(|l| l.domain.as_str()).collect();
        assert_eq!(domains, ["m.oui.sncf"]);
    }

    #[test]
    fn test_legacy_parent_cite_is_unranked() {
        let mut sink = Collected::default();
        traverse(PAGE, &policy(SeaStrategy::ParentCite), Device::Desktop, &mut sink);

        assert_eq!(sink.paid.len(), 3);
        assert!(sink.paid.iter().all(|l| !l.ranked));
        assert_eq!(sink.paid[0].domain, UNPARSEABLE);
        assert_eq!(sink.paid[2].domain, "www.trainline.fr");
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        let mut sink = Collected::default();
        let counts = traverse("<html></html>", &policy(SeaStrategy::Sibling), Device::Desktop, &mut sink);
        assert_eq!(counts, TraversalCounts::default());
        assert!(sink.paid.is_empty() && sink.organic.is_empty());
    }
}
