/*!
 * Shared terminology map for consistent term translation.
 *
 * Terms flow in from the draft-phase extraction, the model's
 * terminology review and the user's custom list, with custom terms
 * always winning. The wire format is one `source | target` line per
 * term; the model occasionally substitutes a fullwidth or look-alike
 * bar, so parsing accepts those too.
 */

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TERM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(.+?)[ \t]*[|｜丨][ \t]*(.+?)[ \t]*$").unwrap());

/// Ordered source-term to target-term map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminologyMap {
    terms: BTreeMap<String, String>,
}

impl TerminologyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source | target` lines, skipping anything malformed
    pub fn parse_term_lines(text: &str) -> Self {
        let mut map = Self::new();
        for caps in TERM_LINE.captures_iter(text) {
            let source = caps[1].trim();
            let target = caps[2].trim();
            if !source.is_empty() && !target.is_empty() {
                map.insert(source, target);
            }
        }
        map
    }

    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.terms.insert(source.into(), target.into());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.terms.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Overlay another map; its entries win on conflict
    pub fn apply_overrides(&mut self, overrides: &TerminologyMap) {
        for (source, target) in overrides.iter() {
            self.insert(source, target);
        }
    }

    /// Terms longest-source-first, so multi-word terms are applied (or
    /// listed) before their substrings.
    pub fn sorted_by_length(&self) -> Vec<(&str, &str)> {
        let mut terms: Vec<(&str, &str)> = self.iter().collect();
        terms.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then(a.0.cmp(b.0)));
        terms
    }

    /// The `source | target` listing sent for terminology review
    pub fn as_term_lines(&self) -> String {
        self.sorted_by_length()
            .iter()
            .map(|(source, target)| format!("{} | {}", source, target))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Numbered reference section for the refinement prompt, capped at
    /// `limit` longest terms.
    pub fn prompt_section(&self, limit: usize) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut section = String::from("术语表参考（确保一致使用）:\n");
        for (i, (source, target)) in self.sorted_by_length().into_iter().take(limit).enumerate() {
            section.push_str(&format!("{}. {}: {}\n", i + 1, source, target));
        }
        section
    }

    /// Replace known source terms in text, longest first
    pub fn apply_to(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (source, target) in self.sorted_by_length() {
            if result.contains(source) {
                result = result.replace(source, target);
            }
        }
        result
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read terminology file {}", path.display()))?;
        let terms: BTreeMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid terminology JSON in {}", path.display()))?;
        Ok(Self { terms })
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.terms)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write terminology file {}", path.display()))
    }

    /// Import from a two-column CSV, tolerating quoted fields and an
    /// optional `source,target` header row.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read terminology file {}", path.display()))?;

        let mut map = Self::new();
        for (line_number, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line_number == 0 && line.eq_ignore_ascii_case("source,target") {
                continue;
            }

            let (source, target) = line
                .split_once(',')
                .ok_or_else(|| anyhow!("Malformed CSV line {}: {}", line_number + 1, line))?;
            let source = source.trim().trim_matches('"');
            let target = target.trim().trim_matches('"');
            if !source.is_empty() && !target.is_empty() {
                map.insert(source, target);
            }
        }
        Ok(map)
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let mut out = String::from("source,target\n");
        for (source, target) in self.iter() {
            out.push_str(&format!("\"{}\",\"{}\"\n", source, target));
        }
        std::fs::write(path, out)
            .with_context(|| format!("Failed to write terminology file {}", path.display()))
    }
}

impl FromIterator<(String, String)> for TerminologyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}
