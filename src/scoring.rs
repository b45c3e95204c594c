//! Website quality scoring for merged listings.
//!
//! Turns the signals collected for a business (Google Business Profile
//! details plus checks run against its website) into a penalty score.
//! Higher is worse; anything at or above `BAD_THRESHOLD` is a lead worth
//! pitching a rebuild to.

use serde::{Deserialize, Serialize};

// ============================================================================
// Score Thresholds
// ============================================================================

/// Score at or above which a website counts as bad
pub const BAD_THRESHOLD: i32 = 60;

/// Site builders that usually mean a one-page site
pub const ONE_PAGE_BUILDERS: [&str; 3] = ["Wix", "Carrd", "Squarespace"];

/// Heavy SPA frameworks and older libraries that get penalized
pub const PENALIZED_FRAMEWORKS: [&str; 6] = ["Angular", "React", "Vue", "Ember.js", "Backbone", "Dojo"];

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpCheck {
    pub ssl_bad: bool,
    pub http_allowed: bool,
    pub redirects_to_https: bool,
}

impl Default for HttpCheck {
    fn default() -> Self {
        Self {
            ssl_bad: false,
            http_allowed: false,
            redirects_to_https: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteBuilderCheck {
    pub builders_detected: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenericTitleCheck {
    pub is_generic: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LastUpdateCheck {
    pub latest_year_in_text: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SitemapCheck {
    pub sitemap_found: bool,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpeedCheck {
    pub load_time_seconds: f64,
}

/// Signals collected for one listing. Absent checks default to "passed", so
/// a partially collected record is never penalized for what was not measured.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebsiteMetrics {
    pub gbp_is_verified: bool,
    pub gbp_categories: Vec<String>,
    pub gbp_amount_of_attributes: u32,
    pub has_website: bool,
    #[serde(rename = "isHttpAllowed")]
    pub http: HttpCheck,
    pub responsive: bool,
    #[serde(rename = "siteBuilder")]
    pub site_builder: SiteBuilderCheck,
    pub favicon: bool,
    pub html5: bool,
    #[serde(rename = "genericTitle")]
    pub generic_title: GenericTitleCheck,
    #[serde(rename = "metaDescription")]
    pub meta_description: bool,
    pub h1: bool,
    pub analytics: bool,
    pub words: u32,
    pub images: u32,
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<LastUpdateCheck>,
    pub sitemap: SitemapCheck,
    pub framework: Vec<String>,
    #[serde(rename = "usesJs")]
    pub uses_js: Option<bool>,
    pub jquery: Option<bool>,
    #[serde(rename = "speedMetrics")]
    pub speed: SpeedCheck,
}

impl Default for WebsiteMetrics {
    fn default() -> Self {
        Self {
            gbp_is_verified: true,
            gbp_categories: Vec::new(),
            gbp_amount_of_attributes: 0,
            has_website: true,
            http: HttpCheck::default(),
            responsive: true,
            site_builder: SiteBuilderCheck::default(),
            favicon: true,
            html5: true,
            generic_title: GenericTitleCheck::default(),
            meta_description: true,
            h1: true,
            analytics: true,
            words: 0,
            images: 0,
            last_update: None,
            sitemap: SitemapCheck::default(),
            framework: Vec::new(),
            uses_js: None,
            jquery: None,
            speed: SpeedCheck::default(),
        }
    }
}

// ============================================================================
// Score
// ============================================================================

/// One penalty line: human-readable reason and points added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reason {
    pub reason: String,
    pub penalty: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityScore {
    pub score: i32,
    pub is_bad: bool,
    pub reasons: Vec<Reason>, // highest penalty first
}

struct Tally {
    score: i32,
    reasons: Vec<Reason>,
}

impl Tally {
    fn add(&mut self, reason: impl Into<String>, penalty: i32) {
        self.score += penalty;
        self.reasons.push(Reason {
            reason: reason.into(),
            penalty,
        });
    }
}

fn profile_penalties(m: &WebsiteMetrics, t: &mut Tally) {
    if !m.gbp_is_verified {
        t.add("Unverified Google Business Profile", 120);
    }
    if let [only] = m.gbp_categories.as_slice() {
        t.add(format!("Only one GBP category ({})", only), 30);
    }
    if m.gbp_amount_of_attributes <= 1 {
        t.add(format!("Few GBP attributes ({})", m.gbp_amount_of_attributes), 40);
    }
}

fn security_penalties(m: &WebsiteMetrics, t: &mut Tally) {
    if m.http.ssl_bad {
        t.add("Invalid or expired SSL certificate", 120);
    } else if m.http.http_allowed && !m.http.redirects_to_https {
        t.add("HTTP access allowed (no forced HTTPS)", 100);
    }
    if !m.responsive {
        t.add("Not responsive", 100);
    }
    for builder in &m.site_builder.builders_detected {
        if ONE_PAGE_BUILDERS.contains(&builder.as_str()) {
            t.add(format!("One-page site builder ({})", builder), 30);
        }
    }
}

fn structure_penalties(m: &WebsiteMetrics, t: &mut Tally) {
    if !m.favicon {
        t.add("No favicon", 40);
    }
    if !m.html5 {
        t.add("Not using HTML5", 60);
    }
    if m.generic_title.is_generic {
        t.add("Generic title", 20);
    }
    if !m.meta_description {
        t.add("No meta description", 20);
    }
    if !m.h1 {
        t.add("No H1 tag", 30);
    }
    if !m.analytics {
        t.add("No analytics or tracking", 25);
    }
}

fn content_penalties(m: &WebsiteMetrics, current_year: i32, t: &mut Tally) {
    if m.words < 200 {
        let penalty = (0.2 * (200 - m.words) as f64) as i32;
        t.add(format!("Low text content ({} words)", m.words), penalty.min(80));
    }
    if m.images < 3 {
        let penalty = (15 * (3 - m.images) as i32).min(60);
        t.add(format!("Few images ({})", m.images), penalty);
    }

    let years_old = m
        .last_update
        .as_ref()
        .and_then(|u| u.latest_year_in_text)
        .filter(|&year| year != 0)
        .map_or(0, |year| (current_year - year).max(0));
    if years_old > 1 {
        t.add(
            format!("Very old content ({} years old)", years_old),
            (15 * years_old).min(150),
        );
    }

    if m.sitemap.sitemap_found && m.sitemap.total_pages < 5 {
        let penalty = 10 * (5 - m.sitemap.total_pages) as i32;
        t.add(format!("Small sitemap ({} pages)", m.sitemap.total_pages), penalty);
    } else if !m.sitemap.sitemap_found {
        t.add("No sitemap found", 30);
    }
}

fn tech_penalties(m: &WebsiteMetrics, t: &mut Tally) {
    let unknown_stack = m.framework.iter().any(|f| f == "Unknown");
    if m
        .framework
        .iter()
        .any(|f| PENALIZED_FRAMEWORKS.contains(&f.as_str()))
    {
        t.add(format!("Frameworks detected ({})", m.framework.join(", ")), 30);
    } else if unknown_stack && m.uses_js == Some(false) {
        t.add("No JavaScript", 30);
    } else if unknown_stack && m.jquery == Some(true) {
        t.add("jQuery", 30);
    }

    let load_time = m.speed.load_time_seconds;
    if load_time > 3.0 {
        let penalty = ((5.0 * (load_time - 3.0)) as i32).min(50);
        t.add(format!("Slow load time ({:.1}s)", load_time), penalty);
    }
}

/// Score one listing's website. `current_year` anchors the content-age check.
pub fn score_website(metrics: &WebsiteMetrics, current_year: i32) -> QualityScore {
    let mut tally = Tally {
        score: 0,
        reasons: Vec::new(),
    };

    profile_penalties(metrics, &mut tally);
    if !metrics.has_website {
        tally.add("No website listed in GBP", 120);
    } else {
        security_penalties(metrics, &mut tally);
        structure_penalties(metrics, &mut tally);
        content_penalties(metrics, current_year, &mut tally);
        tech_penalties(metrics, &mut tally);
    }

    // Stable sort keeps rule order among equal penalties
    tally.reasons.sort_by(|a, b| b.penalty.cmp(&a.penalty));

    QualityScore {
        score: tally.score,
        is_bad: tally.score >= BAD_THRESHOLD,
        reasons: tally.reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A site that passes every check.
    fn clean() -> WebsiteMetrics {
        WebsiteMetrics {
            gbp_categories: vec!["Roofer".into(), "Contractor".into()],
            gbp_amount_of_attributes: 5,
            words: 800,
            images: 10,
            sitemap: SitemapCheck {
                sitemap_found: true,
                total_pages: 12,
            },
            framework: vec!["Unknown".into()],
            uses_js: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_site_scores_zero() {
        let result = score_website(&clean(), 2026);
        assert_eq!(result.score, 0);
        assert!(!result.is_bad);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_no_website_skips_site_checks() {
        let metrics = WebsiteMetrics {
            has_website: false,
            words: 0,
            ..clean()
        };
        let result = score_website(&metrics, 2026);
        assert_eq!(result.score, 120);
        assert!(result.is_bad);
        assert_eq!(result.reasons[0].reason, "No website listed in GBP");
    }

    #[test]
    fn test_content_penalties_are_capped() {
        let metrics = WebsiteMetrics {
            words: 0,
            images: 0,
            last_update: Some(LastUpdateCheck {
                latest_year_in_text: Some(2000),
            }),
            ..clean()
        };
        let result = score_website(&metrics, 2026);
        let penalties: Vec<i32> = result.reasons.iter().map(|r| r.penalty).collect();
        assert_eq!(penalties, vec![150, 45, 40]);
        assert_eq!(result.score, 235);
    }

    #[test]
    fn test_reasons_sorted_by_penalty() {
        let metrics = WebsiteMetrics {
            favicon: false,
            responsive: false,
            generic_title: GenericTitleCheck { is_generic: true },
            ..clean()
        };
        let result = score_website(&metrics, 2026);
        let penalties: Vec<i32> = result.reasons.iter().map(|r| r.penalty).collect();
        assert_eq!(penalties, vec![100, 40, 20]);
        assert_eq!(result.score, 160);
    }

    #[test]
    fn test_ssl_outranks_http_check() {
        let metrics = WebsiteMetrics {
            http: HttpCheck {
                ssl_bad: true,
                http_allowed: true,
                redirects_to_https: false,
            },
            ..clean()
        };
        let result = score_website(&metrics, 2026);
        assert_eq!(result.reasons.len(), 1);
        assert_eq!(result.score, 120);
    }

    #[test]
    fn test_framework_and_jquery() {
        let react = WebsiteMetrics {
            framework: vec!["React".into()],
            ..clean()
        };
        assert_eq!(score_website(&react, 2026).score, 30);

        let jquery = WebsiteMetrics {
            jquery: Some(true),
            ..clean()
        };
        assert_eq!(score_website(&jquery, 2026).reasons[0].reason, "jQuery");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "gbp_is_verified": false,
            "gbp_categories": ["Roofer"],
            "isHttpAllowed": {"http_allowed": true, "redirects_to_https": false},
            "speedMetrics": {"load_time_seconds": 7.5}
        }"#;
        let metrics: WebsiteMetrics = serde_json::from_str(json).unwrap();
        assert!(!metrics.gbp_is_verified);
        assert!(metrics.has_website);
        assert!(metrics.favicon);
        assert!(metrics.http.http_allowed);
        assert!(!metrics.http.ssl_bad);

        let result = score_website(&metrics, 2026);
        assert!(result.is_bad);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.reason == "Slow load time (7.5s)" && r.penalty == 22));
    }
}
