//! Success-criterion features and the doc sections they call for.

use std::collections::HashSet;

/// Doc keys linked for one product feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDocs {
    pub feature: &'static str,
    /// Keys into `doc_sections`, appended to a platform's base URL.
    pub platform_sections: &'static [&'static str],
    /// Keys into `product_docs`.
    pub product_docs: &'static [&'static str],
    /// Keys into `integration_docs`.
    pub integration_docs: &'static [&'static str],
}

pub const FEATURE_DOCS: &[FeatureDocs] = &[
    FeatureDocs {
        feature: "Error Monitoring",
        platform_sections: &["getting_started", "error_monitoring"],
        product_docs: &[],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "Performance Monitoring",
        platform_sections: &["performance"],
        product_docs: &["performance", "web_vitals", "distributed_tracing"],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "Session Replay",
        platform_sections: &["session_replay"],
        product_docs: &["session_replay"],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "Release Health",
        platform_sections: &["releases"],
        product_docs: &["release_health", "releases"],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "Effective Alerts",
        platform_sections: &[],
        product_docs: &["alerts", "issue_alerts", "metric_alerts"],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "Discover & Dashboards",
        platform_sections: &[],
        product_docs: &["dashboards", "discover"],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "Integrations",
        platform_sections: &[],
        product_docs: &[],
        integration_docs: &["slack", "jira", "github"],
    },
    FeatureDocs {
        feature: "Profiling",
        platform_sections: &["profiling"],
        product_docs: &["profiling"],
        integration_docs: &[],
    },
    FeatureDocs {
        feature: "User Feedback",
        platform_sections: &["user_feedback"],
        product_docs: &["user_feedback"],
        integration_docs: &[],
    },
];

/// Match a free-text feature name: exact, then prefix either way, then any
/// shared word. Case-insensitive.
pub fn match_feature(feature: &str) -> Option<&'static FeatureDocs> {
    let wanted = feature.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if let Some(docs) = FEATURE_DOCS
        .iter()
        .find(|d| d.feature.to_lowercase() == wanted)
    {
        return Some(docs);
    }

    if let Some(docs) = FEATURE_DOCS.iter().find(|d| {
        let key = d.feature.to_lowercase();
        wanted.starts_with(&key) || key.starts_with(&wanted)
    }) {
        return Some(docs);
    }

    let wanted_words: HashSet<&str> = wanted.split_whitespace().collect();
    FEATURE_DOCS.iter().find(|d| {
        let key = d.feature.to_lowercase();
        key.split_whitespace().any(|w| wanted_words.contains(w))
    })
}
