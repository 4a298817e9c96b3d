//! Traffic source classification and location enrichment.
//!
//! Classification is a priority-ordered decision list evaluated once per
//! session: paid, email, social, organic, referral, direct. Location comes
//! from the collector and is attached only when the lookup resolves.

use chrono::{DateTime, Utc};
use footprint_core::{Error, LocationSignal, Result, SessionId, SourceType, TrafficSource};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::debug;
use url::Url;

use crate::platform::{PageContext, PlatformTransport};

/// A known referrer domain and the display name it maps to.
struct KnownDomain {
    /// Registrable domain; a trailing `.*` matches any TLD.
    domain: &'static str,
    name: &'static str,
}

const WEBMAIL_DOMAINS: &[KnownDomain] = &[
    KnownDomain { domain: "mail.google.com", name: "Gmail" },
    KnownDomain { domain: "outlook.live.com", name: "Outlook" },
    KnownDomain { domain: "outlook.office.com", name: "Outlook" },
    KnownDomain { domain: "outlook.office365.com", name: "Outlook" },
    KnownDomain { domain: "mail.yahoo.com", name: "Yahoo Mail" },
    KnownDomain { domain: "mail.aol.com", name: "AOL Mail" },
    KnownDomain { domain: "mail.proton.me", name: "Proton Mail" },
    KnownDomain { domain: "mail.zoho.com", name: "Zoho Mail" },
];

const SOCIAL_DOMAINS: &[KnownDomain] = &[
    KnownDomain { domain: "facebook.com", name: "Facebook" },
    KnownDomain { domain: "fb.com", name: "Facebook" },
    KnownDomain { domain: "instagram.com", name: "Instagram" },
    KnownDomain { domain: "twitter.com", name: "Twitter" },
    KnownDomain { domain: "x.com", name: "Twitter" },
    KnownDomain { domain: "t.co", name: "Twitter" },
    KnownDomain { domain: "linkedin.com", name: "LinkedIn" },
    KnownDomain { domain: "lnkd.in", name: "LinkedIn" },
    KnownDomain { domain: "pinterest.com", name: "Pinterest" },
    KnownDomain { domain: "reddit.com", name: "Reddit" },
    KnownDomain { domain: "youtube.com", name: "YouTube" },
    KnownDomain { domain: "tiktok.com", name: "TikTok" },
    KnownDomain { domain: "whatsapp.com", name: "WhatsApp" },
];

/// A search engine and how its results pages look.
struct SearchEngine {
    site: KnownDomain,
    result_paths: &'static [&'static str],
    query_keys: &'static [&'static str],
}

const SEARCH_ENGINES: &[SearchEngine] = &[
    SearchEngine {
        site: KnownDomain { domain: "google.*", name: "Google" },
        result_paths: &["/search", "/url"],
        query_keys: &["q"],
    },
    SearchEngine {
        site: KnownDomain { domain: "bing.com", name: "Bing" },
        result_paths: &["/search"],
        query_keys: &["q"],
    },
    SearchEngine {
        site: KnownDomain { domain: "search.yahoo.com", name: "Yahoo" },
        result_paths: &["/search"],
        query_keys: &["p"],
    },
    SearchEngine {
        site: KnownDomain { domain: "duckduckgo.com", name: "DuckDuckGo" },
        result_paths: &[],
        query_keys: &["q"],
    },
    SearchEngine {
        site: KnownDomain { domain: "baidu.com", name: "Baidu" },
        result_paths: &["/s"],
        query_keys: &["wd"],
    },
    SearchEngine {
        site: KnownDomain { domain: "yandex.*", name: "Yandex" },
        result_paths: &["/search"],
        query_keys: &["text"],
    },
    SearchEngine {
        site: KnownDomain { domain: "ecosia.org", name: "Ecosia" },
        result_paths: &["/search"],
        query_keys: &["q"],
    },
];

/// Classification result before it is bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub source_type: SourceType,
    pub source_name: String,
    pub medium: String,
    pub campaign: Option<String>,
}

/// Classifies a visit from its referrer, landing-page query parameters and
/// the current page host. Pure and deterministic.
pub fn classify_source(
    referrer: &str,
    query: &[(String, String)],
    current_host: &str,
) -> Classification {
    let param = |key: &str| {
        query
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    };
    let utm_source = param("utm_source");
    let utm_medium = param("utm_medium").map(str::to_lowercase);
    let campaign = param("utm_campaign").map(str::to_string);

    let referrer_url = Url::parse(referrer.trim()).ok();
    let referrer_host = referrer_url
        .as_ref()
        .and_then(|u| u.host_str())
        .map(|h| strip_www(&h.to_lowercase()).to_string());

    let build = |source_type: SourceType, source_name: &str| Classification {
        source_type,
        source_name: source_name.to_string(),
        medium: utm_medium
            .clone()
            .unwrap_or_else(|| source_type.as_str().to_string()),
        campaign: campaign.clone(),
    };

    // 1. Paid: click ids or cpc medium.
    if param("gclid").is_some() {
        return build(SourceType::Paid, utm_source.unwrap_or("Google Ads"));
    }
    if param("fbclid").is_some() {
        return build(SourceType::Paid, utm_source.unwrap_or("Facebook Ads"));
    }
    if utm_medium.as_deref() == Some("cpc") {
        return build(SourceType::Paid, utm_source.unwrap_or("Paid"));
    }

    // 2. Email: utm medium or webmail referrer.
    if utm_medium.as_deref() == Some("email") {
        return build(SourceType::Email, utm_source.unwrap_or("Email"));
    }
    if let Some(site) = referrer_host.as_deref().and_then(|h| match_domain(h, WEBMAIL_DOMAINS)) {
        return build(SourceType::Email, site.name);
    }

    // 3. Social.
    if let Some(site) = referrer_host.as_deref().and_then(|h| match_domain(h, SOCIAL_DOMAINS)) {
        return build(SourceType::Social, site.name);
    }

    // 4. Organic: search engine results page.
    if let (Some(url), Some(host)) = (referrer_url.as_ref(), referrer_host.as_deref()) {
        if let Some(engine) = SEARCH_ENGINES
            .iter()
            .find(|e| domain_matches(host, e.site.domain) && is_results_page(url, e))
        {
            return build(SourceType::Organic, engine.site.name);
        }
    }

    // 5. Referral: another host.
    if let Some(host) = referrer_host.as_deref() {
        if host != strip_www(&current_host.to_lowercase()) {
            return build(SourceType::Referral, host);
        }
    }

    // 6. Direct.
    build(SourceType::Direct, "Direct")
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn match_domain<'a>(host: &str, sites: &'a [KnownDomain]) -> Option<&'a KnownDomain> {
    sites.iter().find(|site| domain_matches(host, site.domain))
}

/// Labels that sit under a country code as a registry level, as in
/// `co.uk` or `com.br`.
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "net", "org", "ac", "gov", "edu", "ne", "or"];

/// Exact match or subdomain. `name.*` matches `name.<tld>` and
/// `name.<second level>.<cc>` (and their subdomains), never a longer suffix.
fn domain_matches(host: &str, domain: &str) -> bool {
    if let Some(base) = domain.strip_suffix(".*") {
        let labels: Vec<&str> = host.split('.').collect();
        return labels.iter().enumerate().any(|(i, label)| {
            *label == base
                && match &labels[i + 1..] {
                    [tld] => !tld.is_empty(),
                    [second, cc] => SECOND_LEVEL_LABELS.contains(second) && !cc.is_empty(),
                    _ => false,
                }
        });
    }
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn is_results_page(url: &Url, engine: &SearchEngine) -> bool {
    let path = url.path();
    let on_results_path = engine
        .result_paths
        .iter()
        .any(|p| path == *p || path.starts_with(&format!("{}/", p)));
    let has_query = url
        .query_pairs()
        .any(|(k, _)| engine.query_keys.contains(&k.as_ref()));
    on_results_path || has_query
}

/// Resolves enrichment for outgoing events.
pub struct EnrichmentResolver {
    transport: Arc<dyn PlatformTransport>,
    location_timeout: Duration,
}

impl EnrichmentResolver {
    pub fn new(transport: Arc<dyn PlatformTransport>, location_timeout: Duration) -> Self {
        Self {
            transport,
            location_timeout,
        }
    }

    /// Builds the session's traffic source from its landing page.
    pub fn traffic_source(
        &self,
        session_id: SessionId,
        ctx: &PageContext,
        now: DateTime<Utc>,
    ) -> TrafficSource {
        let classification = classify_source(&ctx.referrer, &ctx.query_pairs(), ctx.host());
        debug!(
            session_id = %session_id,
            source_type = %classification.source_type,
            source_name = %classification.source_name,
            "Classified traffic source"
        );
        TrafficSource {
            session_id,
            source_type: classification.source_type,
            source_name: classification.source_name,
            medium: classification.medium,
            campaign: classification.campaign,
            referrer_url: (!ctx.referrer.is_empty()).then(|| ctx.referrer.clone()),
            landing_page: ctx.path().to_string(),
            timestamp: now,
        }
    }

    /// Looks up the caller's location, bounded by the configured timeout.
    pub async fn request_location(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<LocationSignal> {
        metrics().location_lookups.inc();
        let lookup = tokio::time::timeout(self.location_timeout, self.transport.fetch_location());

        match lookup.await {
            Ok(Ok(location)) => Ok(LocationSignal::new(session_id, location, now)),
            Ok(Err(e)) => {
                metrics().location_failures.inc();
                Err(e)
            }
            Err(_) => {
                metrics().location_failures.inc();
                Err(Error::lookup(format!(
                    "timed out after {}ms",
                    self.location_timeout.as_millis()
                )))
            }
        }
    }
}
