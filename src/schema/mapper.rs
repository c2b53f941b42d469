//! Raw header to unified field resolution.
//!
//! Every raw header runs through an ordered chain of resolvers (alias
//! table, normalized exact match, fuzzy similarity). The first resolver
//! that returns a confident match wins; a header no resolver claims passes
//! through under its own name.

use super::UnifiedSchema;
use super::normalize::normalize_for_matching;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Which tier of the resolution chain produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Alias,
    Normalized,
    Fuzzy,
}

/// A confident match returned by one resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub field: String,
    pub score: f64,
}

/// One tier of the resolution chain
#[derive(Debug, Clone)]
pub enum Resolver {
    /// Curated spellings, keyed by match-normalized header
    Alias(HashMap<String, String>),
    /// Match-normalized header equals a match-normalized field
    NormalizedExact(HashMap<String, String>),
    /// Best similarity against every field, accepted at or above the cutoff
    Fuzzy {
        candidates: Vec<(String, String)>,
        cutoff: f64,
    },
}

impl Resolver {
    pub fn strategy(&self) -> MatchStrategy {
        match self {
            Resolver::Alias(_) => MatchStrategy::Alias,
            Resolver::NormalizedExact(_) => MatchStrategy::Normalized,
            Resolver::Fuzzy { .. } => MatchStrategy::Fuzzy,
        }
    }

    /// Resolve a match-normalized header, or `None` when not confident
    pub fn resolve(&self, normalized: &str) -> Option<Resolution> {
        match self {
            Resolver::Alias(table) | Resolver::NormalizedExact(table) => {
                table.get(normalized).map(|field| Resolution {
                    field: field.clone(),
                    score: 1.0,
                })
            }
            Resolver::Fuzzy { candidates, cutoff } => {
                let mut best: Option<(&str, f64)> = None;
                for (candidate, field) in candidates {
                    let score = similarity(normalized, candidate);
                    // strict comparison keeps the earliest catalog entry on ties
                    if best.is_none_or(|(_, best_score)| score > best_score) {
                        best = Some((field.as_str(), score));
                    }
                }

                best.filter(|(_, score)| *score >= *cutoff)
                    .map(|(field, score)| Resolution {
                        field: field.to_string(),
                        score,
                    })
            }
        }
    }
}

/// Normalized similarity of two strings on a 0..=1 scale
pub fn similarity(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

/// How one raw header was resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingDecision {
    /// Unified field name, or the raw header itself when unmapped
    pub target: String,
    /// `None` for pass-through headers
    pub strategy: Option<MatchStrategy>,
    /// Similarity score of the accepted match
    pub score: Option<f64>,
}

impl MappingDecision {
    pub fn is_mapped(&self) -> bool {
        self.strategy.is_some()
    }
}

/// Number of headers resolved by each tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingStats {
    pub alias: usize,
    pub normalized: usize,
    pub fuzzy: usize,
    pub unmapped: usize,
}

/// Total, read-only mapping from every observed raw header to its target
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderMapping {
    decisions: BTreeMap<String, MappingDecision>,
}

impl HeaderMapping {
    /// Target for a raw header; unknown headers pass through unchanged
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        let key = raw.trim();
        self.decisions
            .get(key)
            .map(|decision| decision.target.as_str())
            .unwrap_or(key)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.decisions.contains_key(raw.trim())
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Decisions in raw-header order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MappingDecision)> {
        self.decisions.iter()
    }

    /// Raw headers that no resolver claimed
    pub fn unmapped(&self) -> impl Iterator<Item = &String> {
        self.decisions
            .iter()
            .filter(|(_, decision)| !decision.is_mapped())
            .map(|(raw, _)| raw)
    }

    pub fn stats(&self) -> MappingStats {
        let mut stats = MappingStats::default();
        for decision in self.decisions.values() {
            match decision.strategy {
                Some(MatchStrategy::Alias) => stats.alias += 1,
                Some(MatchStrategy::Normalized) => stats.normalized += 1,
                Some(MatchStrategy::Fuzzy) => stats.fuzzy += 1,
                None => stats.unmapped += 1,
            }
        }
        stats
    }

    /// Pretty JSON rendering for the mapping report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds the corpus-wide header mapping
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    chain: Vec<Resolver>,
}

impl SchemaMapper {
    /// Standard three-tier chain over the given schema
    pub fn new(schema: &UnifiedSchema, fuzzy_cutoff: f64) -> Self {
        let aliases = schema
            .aliases()
            .iter()
            .map(|(alias, field)| (normalize_for_matching(alias), field.clone()))
            .collect();

        let mut normalized_fields = HashMap::new();
        let mut candidates = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let normalized = normalize_for_matching(field);
            normalized_fields
                .entry(normalized.clone())
                .or_insert_with(|| field.clone());
            candidates.push((normalized, field.clone()));
        }

        Self::with_chain(vec![
            Resolver::Alias(aliases),
            Resolver::NormalizedExact(normalized_fields),
            Resolver::Fuzzy {
                candidates,
                cutoff: fuzzy_cutoff,
            },
        ])
    }

    /// Mapper over an explicit resolver chain
    pub fn with_chain(chain: Vec<Resolver>) -> Self {
        Self { chain }
    }

    /// Resolve one raw header through the chain
    pub fn decide(&self, raw: &str) -> MappingDecision {
        let raw = raw.trim();
        let normalized = normalize_for_matching(raw);

        for resolver in &self.chain {
            if let Some(resolution) = resolver.resolve(&normalized) {
                if resolver.strategy() == MatchStrategy::Fuzzy {
                    debug!(
                        "Fuzzy matched '{}' -> '{}' (score {:.3})",
                        raw, resolution.field, resolution.score
                    );
                }
                return MappingDecision {
                    target: resolution.field,
                    strategy: Some(resolver.strategy()),
                    score: Some(resolution.score),
                };
            }
        }

        debug!("No match found for '{}', keeping original", raw);
        MappingDecision {
            target: raw.to_string(),
            strategy: None,
            score: None,
        }
    }

    /// Build the mapping for the union of all raw headers.
    ///
    /// Each decision depends only on the header text, so the result is the
    /// same for any ordering of the input.
    pub fn build<I, S>(&self, raw_headers: I) -> HeaderMapping
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut decisions = BTreeMap::new();
        for raw in raw_headers {
            let key = raw.as_ref().trim().to_string();
            if decisions.contains_key(&key) {
                continue;
            }
            let decision = self.decide(&key);
            decisions.insert(key, decision);
        }

        let mapping = HeaderMapping { decisions };
        let stats = mapping.stats();
        info!(
            "Built mapping for {} columns ({} alias, {} normalized, {} fuzzy, {} unmapped)",
            mapping.len(),
            stats.alias,
            stats.normalized,
            stats.fuzzy,
            stats.unmapped
        );
        mapping
    }
}
