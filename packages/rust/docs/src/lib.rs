//! Maps a customer's tech stack and success criteria to documentation links.
//!
//! A [`Taxonomy`] describes platforms, their framework guides and the doc URL
//! tables. [`DocsResolver`] indexes it for fuzzy name lookup and generates
//! the link list for a POC.

pub mod features;
pub mod taxonomy;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pocsync_shared::Result;

pub use features::{FEATURE_DOCS, FeatureDocs, match_feature};
pub use taxonomy::{Guide, IntegrationDoc, Platform, Taxonomy};

/// A platform or guide a technology name resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformMatch {
    pub display_name: String,
    pub base_url: String,
    pub platform_key: String,
    /// Set when the match is a framework guide rather than the platform.
    pub guide_key: Option<String>,
}

/// One technology in a customer's stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechStackEntry {
    pub id: Option<String>,
    pub name: String,
    /// Explicit platform or guide key; takes precedence over `name`.
    pub platform_key: Option<String>,
}

impl TechStackEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub feature: String,
    pub priority: Priority,
}

/// A generated documentation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocLink {
    pub tech_stack_entry_id: Option<String>,
    pub category: String,
    pub title: String,
    pub url: String,
    pub relevance_note: Option<String>,
    pub sort_order: u32,
}

/// An entry for a tech-stack picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformOption {
    pub category: String,
    pub name: String,
    pub platform_key: String,
    pub guide_key: Option<String>,
}

/// Taxonomy plus a lowercase name index over platforms and guides.
pub struct DocsResolver {
    taxonomy: Taxonomy,
    /// Lowercased display names and keys, in taxonomy order. A later
    /// duplicate replaces the earlier value but keeps its position.
    index: Vec<(String, PlatformMatch)>,
    positions: HashMap<String, usize>,
}

impl DocsResolver {
    pub fn new(taxonomy: Taxonomy) -> Self {
        let mut resolver = Self {
            taxonomy,
            index: Vec::new(),
            positions: HashMap::new(),
        };
        resolver.build_index();
        resolver
    }

    /// Resolver over the built-in taxonomy.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Taxonomy::builtin()?))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(Taxonomy::from_path(path)?))
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    fn build_index(&mut self) {
        let mut entries = Vec::new();
        for platform in &self.taxonomy.platforms {
            let entry = PlatformMatch {
                display_name: platform.display_name.clone(),
                base_url: platform.base_url.clone(),
                platform_key: platform.key.clone(),
                guide_key: None,
            };
            entries.push((platform.display_name.to_lowercase(), entry.clone()));
            entries.push((platform.key.to_lowercase(), entry));

            for guide in &platform.guides {
                let entry = PlatformMatch {
                    display_name: guide.display_name.clone(),
                    base_url: guide.base_url.clone(),
                    platform_key: platform.key.clone(),
                    guide_key: Some(guide.key.clone()),
                };
                entries.push((guide.display_name.to_lowercase(), entry.clone()));
                entries.push((guide.key.to_lowercase(), entry));
            }
        }

        for (key, entry) in entries {
            match self.positions.get(&key) {
                Some(&pos) => self.index[pos].1 = entry,
                None => {
                    self.positions.insert(key.clone(), self.index.len());
                    self.index.push((key, entry));
                }
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<&PlatformMatch> {
        self.positions.get(key).map(|&pos| &self.index[pos].1)
    }

    /// Resolve a technology name such as "React", "Next JS" or "iOS".
    ///
    /// Tries an exact lowercase match, then a match with `.js`, dots,
    /// spaces and dashes removed, then a substring match in either
    /// direction where the longest index key wins.
    pub fn resolve_platform(&self, name: &str) -> Option<PlatformMatch> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        if let Some(found) = self.lookup(&key) {
            return Some(found.clone());
        }

        let normalized = normalize(&key);
        if let Some((_, found)) = self
            .index
            .iter()
            .find(|(index_key, _)| normalize(index_key) == normalized)
        {
            return Some(found.clone());
        }

        // First of equal-length candidates wins.
        let mut best: Option<&(String, PlatformMatch)> = None;
        for candidate in &self.index {
            let index_key = &candidate.0;
            let overlaps = key.contains(index_key.as_str()) || index_key.contains(key.as_str());
            if overlaps && best.is_none_or(|b| index_key.len() > b.0.len()) {
                best = Some(candidate);
            }
        }
        if best.is_none() {
            debug!(name, "no platform match");
        }
        best.map(|(_, found)| found.clone())
    }

    /// Build the documentation links for a tech stack.
    ///
    /// Every resolved entry gets a Getting Started link, followed by links
    /// for each HIGH priority criterion whose feature is recognized.
    /// Unresolved entries are skipped. Links are de-duplicated by URL,
    /// first occurrence kept.
    pub fn generate_links(
        &self,
        tech_stack: &[TechStackEntry],
        criteria: &[SuccessCriterion],
    ) -> Vec<DocLink> {
        let high_priority: Vec<&str> = criteria
            .iter()
            .filter(|c| c.priority == Priority::High && !c.feature.trim().is_empty())
            .map(|c| c.feature.as_str())
            .collect();

        let mut links = Vec::new();
        let mut sort_order = 0u32;
        let mut push = |links: &mut Vec<DocLink>,
                        entry: &TechStackEntry,
                        category: &str,
                        title: String,
                        url: String,
                        note: String| {
            sort_order += 1;
            links.push(DocLink {
                tech_stack_entry_id: entry.id.clone(),
                category: category.to_string(),
                title,
                url,
                relevance_note: Some(note),
                sort_order,
            });
        };

        for entry in tech_stack {
            let explicit = entry
                .platform_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .and_then(|k| self.lookup(&k.trim().to_lowercase()).cloned());
            let Some(resolved) = explicit.or_else(|| self.resolve_platform(&entry.name)) else {
                debug!(name = %entry.name, "skipping unresolved tech stack entry");
                continue;
            };

            let base_url = format!("{}/", resolved.base_url.trim_end_matches('/'));
            let display = &resolved.display_name;

            push(
                &mut links,
                entry,
                "getting_started",
                format!("Getting Started with {display}"),
                base_url.clone(),
                format!("Setup and installation guide for {display}."),
            );

            for feature in &high_priority {
                let Some(docs) = match_feature(feature) else {
                    continue;
                };

                for &section in docs.platform_sections {
                    if section == "getting_started" {
                        continue;
                    }
                    let Some(path) = self
                        .taxonomy
                        .doc_sections
                        .get(section)
                        .filter(|p| !p.is_empty())
                    else {
                        continue;
                    };
                    push(
                        &mut links,
                        entry,
                        section,
                        format!("{display} - {}", title_case(section)),
                        format!("{base_url}{path}"),
                        format!("Relevant for success criterion: {feature}."),
                    );
                }

                for &product in docs.product_docs {
                    let Some(url) = self.taxonomy.product_docs.get(product) else {
                        continue;
                    };
                    push(
                        &mut links,
                        entry,
                        "product_docs",
                        format!("Sentry {}", title_case(product)),
                        url.clone(),
                        format!("Product documentation relevant to: {feature}."),
                    );
                }

                for &integration in docs.integration_docs {
                    let Some(doc) = self.taxonomy.integration_docs.get(integration) else {
                        continue;
                    };
                    push(
                        &mut links,
                        entry,
                        "integration",
                        format!("{} Integration", doc.display_name),
                        doc.url.clone(),
                        format!("Integration setup for: {feature}."),
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        links.retain(|link| seen.insert(link.url.clone()));
        info!(links = links.len(), "generated documentation links");
        links
    }

    /// Every platform followed by its guides, for a tech-stack picker.
    pub fn available_platforms(&self) -> Vec<PlatformOption> {
        let mut options = Vec::new();
        for platform in &self.taxonomy.platforms {
            options.push(PlatformOption {
                category: platform.category.clone(),
                name: platform.display_name.clone(),
                platform_key: platform.key.clone(),
                guide_key: None,
            });
            options.extend(platform.guides.iter().map(|guide| PlatformOption {
                category: "framework".into(),
                name: guide.display_name.clone(),
                platform_key: platform.key.clone(),
                guide_key: Some(guide.key.clone()),
            }));
        }
        options
    }
}

fn normalize(key: &str) -> String {
    key.replace(".js", "")
        .replace(['.', ' ', '-'], "")
}

/// `web_vitals` → `Web Vitals`.
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DocsResolver {
        DocsResolver::builtin().expect("builtin taxonomy")
    }

    fn high(feature: &str) -> SuccessCriterion {
        SuccessCriterion {
            feature: feature.into(),
            priority: Priority::High,
        }
    }

    #[test]
    fn resolves_exact_names_and_keys() {
        let r = resolver();
        let react = r.resolve_platform("React").unwrap();
        assert_eq!(react.platform_key, "javascript");
        assert_eq!(react.guide_key.as_deref(), Some("react"));

        let python = r.resolve_platform("  python ").unwrap();
        assert_eq!(python.display_name, "Python");
        assert_eq!(python.guide_key, None);

        assert_eq!(r.resolve_platform("iOS").unwrap().guide_key.as_deref(), Some("ios"));
    }

    #[test]
    fn resolves_normalized_names() {
        let r = resolver();
        assert_eq!(
            r.resolve_platform("Next JS").unwrap().guide_key.as_deref(),
            Some("nextjs")
        );
        assert_eq!(
            r.resolve_platform("aspnet core").unwrap().guide_key.as_deref(),
            Some("aspnetcore")
        );
        assert_eq!(r.resolve_platform("NodeJS").unwrap().platform_key, "node");
    }

    #[test]
    fn substring_match_prefers_longest_key() {
        let r = resolver();
        // Both "django" and "go" occur in the name.
        let found = r.resolve_platform("Django REST framework").unwrap();
        assert_eq!(found.guide_key.as_deref(), Some("django"));
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let r = resolver();
        assert_eq!(r.resolve_platform("COBOL"), None);
        assert_eq!(r.resolve_platform(""), None);
    }

    #[test]
    fn getting_started_then_high_priority_feature_links() {
        let r = resolver();
        let entry = TechStackEntry {
            id: Some("t1".into()),
            name: "Django".into(),
            platform_key: None,
        };
        let criteria = vec![
            high("Performance"),
            SuccessCriterion {
                feature: "Session Replay".into(),
                priority: Priority::Low,
            },
        ];

        let links = r.generate_links(&[entry], &criteria);
        assert_eq!(links[0].category, "getting_started");
        assert_eq!(links[0].title, "Getting Started with Django");
        assert!(links[0].url.ends_with('/'));
        assert_eq!(links[1].category, "performance");
        assert_eq!(links[1].title, "Django - Performance");
        assert!(links[1].url.ends_with("tracing/"));
        let products: Vec<&str> = links
            .iter()
            .filter(|l| l.category == "product_docs")
            .map(|l| l.title.as_str())
            .collect();
        assert_eq!(
            products,
            ["Sentry Performance", "Sentry Web Vitals", "Sentry Distributed Tracing"]
        );
        assert!(links.iter().all(|l| l.tech_stack_entry_id.as_deref() == Some("t1")));
        assert!(!links.iter().any(|l| l.category == "session_replay"));

        let orders: Vec<u32> = links.iter().map(|l| l.sort_order).collect();
        assert_eq!(orders, (1..=links.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn error_monitoring_skips_duplicate_getting_started() {
        let r = resolver();
        let links = r.generate_links(&[TechStackEntry::named("Go")], &[high("Error Monitoring")]);
        let categories: Vec<&str> = links.iter().map(|l| l.category.as_str()).collect();
        assert_eq!(categories, ["getting_started", "error_monitoring"]);
    }

    #[test]
    fn links_are_deduplicated_by_url_keeping_first() {
        let r = resolver();
        let stack = [TechStackEntry::named("React"), TechStackEntry::named("Vue")];
        let links = r.generate_links(&stack, &[high("Integrations"), high("Alerts")]);

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        let unique: HashSet<&str> = urls.iter().copied().collect();
        assert_eq!(urls.len(), unique.len());

        // Shared product links stay attached to the first entry only.
        let slack: Vec<&DocLink> = links.iter().filter(|l| l.title == "Slack Integration").collect();
        assert_eq!(slack.len(), 1);
        assert_eq!(slack[0].category, "integration");
        let vue_links = links.iter().filter(|l| l.title.contains("Vue")).count();
        assert_eq!(vue_links, 1);
    }

    #[test]
    fn explicit_platform_key_wins_and_unresolved_entries_are_skipped() {
        let r = resolver();
        let stack = [
            TechStackEntry {
                id: Some("a".into()),
                name: "our backend".into(),
                platform_key: Some("rails".into()),
            },
            TechStackEntry::named("COBOL"),
        ];
        let links = r.generate_links(&stack, &[]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "Getting Started with Rails");
        assert_eq!(links[0].tech_stack_entry_id.as_deref(), Some("a"));
    }

    #[test]
    fn available_platforms_lists_guides_after_their_platform() {
        let options = resolver().available_platforms();
        assert_eq!(options[0].name, "JavaScript");
        assert_eq!(options[0].category, "language");
        assert_eq!(options[1].category, "framework");
        assert_eq!(options[1].platform_key, "javascript");
        assert_eq!(options[1].guide_key.as_deref(), Some("react"));

        let unity = options.iter().find(|o| o.platform_key == "unity").unwrap();
        assert_eq!(unity.category, "game_engine");
    }

    #[test]
    fn title_case_splits_on_underscores() {
        assert_eq!(title_case("web_vitals"), "Web Vitals");
        assert_eq!(title_case("profiling"), "Profiling");
    }
}
