//! Adaptive prioritizer: ranks candidate URLs for the frontier.
//!
//! The frontier itself stays the scheduler's existing binary heap; this
//! module only computes the priority value that populates each queued
//! entry, replacing what used to be a caller-supplied constant.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const POSITIVE_KEYWORDS: &[&str] = &["news", "update", "release", "announcement", "regulation"];
const NEGATIVE_KEYWORDS: &[&str] = &["login", "signup", "register", "comment", "print"];
const MAX_PATH_SEGMENTS_FREE: usize = 4;
const DEFAULT_MAX_PATTERNS: usize = 10_000;

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}/\d{1,2}/\d{1,2}\b").unwrap());

struct PatternStat {
    weight: f32,
    last_seen: u64,
}

/// A bounded `HashMap<String, f32>`-shaped learner: every path segment and
/// query key seen during outcome recording gets a weight nudged by the
/// outcome's relevance. Capacity-limited by recency x magnitude eviction.
struct PatternLearner {
    max_patterns: usize,
    patterns: Mutex<HashMap<String, PatternStat>>,
    tick: AtomicU64,
}

impl PatternLearner {
    fn new(max_patterns: usize) -> Self {
        Self {
            max_patterns: max_patterns.max(1),
            patterns: Mutex::new(HashMap::new()),
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::SeqCst)
    }

    fn evaluate(&self, tokens: &[String]) -> f32 {
        let patterns = self.patterns.lock().expect("pattern learner mutex poisoned");
        tokens
            .iter()
            .filter_map(|t| patterns.get(t).map(|s| s.weight))
            .sum()
    }

    fn update(&self, token: &str, delta: f32) {
        let now = self.next_tick();
        let mut patterns = self.patterns.lock().expect("pattern learner mutex poisoned");

        if !patterns.contains_key(token) && patterns.len() >= self.max_patterns {
            if let Some(evict_key) = patterns
                .iter()
                .min_by(|(_, a), (_, b)| {
                    eviction_score(a, now)
                        .partial_cmp(&eviction_score(b, now))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(k, _)| k.clone())
            {
                patterns.remove(&evict_key);
            }
        }

        let entry = patterns.entry(token.to_string()).or_insert(PatternStat {
            weight: 0.0,
            last_seen: now,
        });
        entry.weight += delta;
        entry.last_seen = now;
    }

    fn len(&self) -> usize {
        self.patterns.lock().expect("pattern learner mutex poisoned").len()
    }
}

fn eviction_score(stat: &PatternStat, now: u64) -> f32 {
    let age = (now.saturating_sub(stat.last_seen)) as f32 + 1.0;
    stat.weight.abs() / age
}

fn path_and_query_tokens(url: &str) -> Vec<String> {
    let Ok(parsed) = url::Url::parse(url) else {
        return Vec::new();
    };
    let mut tokens: Vec<String> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    tokens.extend(parsed.query_pairs().map(|(k, _)| k.into_owned()));
    tokens
}

fn pattern_bonus(url: &str) -> f32 {
    let mut bonus = 0.0f32;
    let lower = url.to_lowercase();

    if DATE_PATTERN.is_match(&lower) {
        bonus += 0.5;
    }
    for keyword in POSITIVE_KEYWORDS {
        if lower.contains(keyword) {
            bonus += 0.3;
        }
    }
    for keyword in NEGATIVE_KEYWORDS {
        if lower.contains(keyword) {
            bonus -= 0.4;
        }
    }

    if let Ok(parsed) = url::Url::parse(url) {
        let segment_count = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).count())
            .unwrap_or(0);
        if segment_count > MAX_PATH_SEGMENTS_FREE {
            bonus -= 0.1 * (segment_count - MAX_PATH_SEGMENTS_FREE) as f32;
        }
    }

    bonus
}

/// Ranks candidate URLs by a learned relevance score, adapting over the run
/// as outcomes (`success`, `relevant`) are recorded.
pub struct AdaptivePrioritizer {
    learner: PatternLearner,
    hits: Mutex<HashMap<String, u32>>,
}

impl AdaptivePrioritizer {
    pub fn new() -> Self {
        Self::with_max_patterns(DEFAULT_MAX_PATTERNS)
    }

    pub fn with_max_patterns(max_patterns: usize) -> Self {
        Self {
            learner: PatternLearner::new(max_patterns),
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn hits_for(&self, url: &str) -> u32 {
        self.hits
            .lock()
            .expect("hit counter mutex poisoned")
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// `1 + learner.evaluate + adaptiveStrategy.priority + patternBonus -
    /// log(1+hits)*0.1`, clamped to a non-negative result. The adaptive
    /// strategy term has no independent signal beyond the pattern learner
    /// and pattern bonus in this implementation, so it contributes 0.
    pub fn score(&self, url: &str) -> f64 {
        let tokens = path_and_query_tokens(url);
        let learner_score = self.learner.evaluate(&tokens) as f64;
        let bonus = pattern_bonus(url) as f64;
        let hits = self.hits_for(url) as f64;
        let raw = 1.0 + learner_score + bonus - (1.0 + hits).ln() * 0.1;
        raw.max(0.0)
    }

    /// Returns the top `k` URLs from `urls` by score, breaking ties by
    /// original (insertion) order.
    pub fn prioritize_urls(&self, urls: &[String], k: usize) -> Vec<String> {
        let mut scored: Vec<(usize, f64, &String)> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| (i, self.score(url), url))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        scored.into_iter().take(k).map(|(_, _, url)| url.clone()).collect()
    }

    /// Updates the pattern learner from an observed outcome and bumps the
    /// per-URL hit counter.
    pub fn record_outcome(&self, url: &str, success: bool, relevant: bool) {
        let delta = if success && relevant { 1.0 } else { -0.5 };
        for token in path_and_query_tokens(url) {
            self.learner.update(&token, delta);
        }
        *self
            .hits
            .lock()
            .expect("hit counter mutex poisoned")
            .entry(url.to_string())
            .or_insert(0) += 1;
    }

    pub fn pattern_count(&self) -> usize {
        self.learner.len()
    }
}

impl Default for AdaptivePrioritizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_pattern_and_keywords_boost_score() {
        let prioritizer = AdaptivePrioritizer::new();
        let with_news = prioritizer.score("https://example.com/2024/6/1/news/update");
        let bare = prioritizer.score("https://example.com/about");
        assert!(with_news > bare);
    }

    #[test]
    fn negative_keywords_reduce_score() {
        let prioritizer = AdaptivePrioritizer::new();
        let login = prioritizer.score("https://example.com/login");
        let neutral = prioritizer.score("https://example.com/articles");
        assert!(login < neutral);
    }

    #[test]
    fn deep_paths_are_penalized() {
        let prioritizer = AdaptivePrioritizer::new();
        let shallow = prioritizer.score("https://example.com/a/b");
        let deep = prioritizer.score("https://example.com/a/b/c/d/e/f/g");
        assert!(deep < shallow);
    }

    #[test]
    fn prioritize_urls_returns_top_k_stable_on_ties() {
        let prioritizer = AdaptivePrioritizer::new();
        let urls = vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
            "https://example.com/c".to_string(),
        ];
        let top = prioritizer.prioritize_urls(&urls, 2);
        assert_eq!(top, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn relevant_outcomes_increase_future_scores_for_shared_segments() {
        let prioritizer = AdaptivePrioritizer::new();
        let before = prioritizer.score("https://example.com/topics/energy");
        prioritizer.record_outcome("https://example.com/topics/energy", true, true);
        let after = prioritizer.score("https://example.com/topics/energy-policy");
        assert!(after > before);
    }

    #[test]
    fn hits_counter_discounts_repeated_urls() {
        let prioritizer = AdaptivePrioritizer::new();
        let url = "https://example.com/x";
        let first = prioritizer.score(url);
        prioritizer.record_outcome(url, true, false);
        let second = prioritizer.score(url);
        assert!(second <= first);
    }

    #[test]
    fn pattern_learner_evicts_when_over_capacity() {
        let prioritizer = AdaptivePrioritizer::with_max_patterns(4);
        for i in 0..20 {
            prioritizer.record_outcome(&format!("https://example.com/p{i}"), true, true);
        }
        assert!(prioritizer.pattern_count() <= 4);
    }
}
