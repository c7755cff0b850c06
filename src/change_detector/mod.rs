//! Change detector: per-URL version history with significance classification.
//!
//! Hashing uses SHA-256 over the raw fetched bytes, the same crate already
//! depended on for config-hash auditing. The in-memory version map is keyed
//! per-URL behind its own mutex so distinct URLs never contend with one
//! another, only with themselves.

use crate::kernel::{LifecycleEvent, LifecycleHook};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangeDetectorError {
    #[error("I/O error persisting version history: {0}")]
    Io(#[from] std::io::Error),

    #[error("version history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ChangeDetectorResult<T> = Result<T, ChangeDetectorError>;

/// Classification of a content transition between two fetches of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// No prior version existed for the URL.
    Initial,
    /// Hash unchanged since the prior version.
    None,
    Minor,
    Moderate,
    Major,
    /// Heading/tag-density shift suggests the document's structure changed.
    Structure,
    /// Byte length shifted markedly while the text content barely moved.
    Format,
    /// Current text is empty where a prior version had content.
    Removed,
}

/// A single timestamped fingerprint of a URL's content.
///
/// `raw_len`/`tag_count` are derived from the raw fetched bytes at ingestion
/// time and kept (rather than the bytes themselves, which would roughly
/// double the on-disk history size) so the next fetch's structure/format
/// comparison has real raw-vs-raw numbers instead of falling back to the
/// stripped `text_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageVersion {
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
    pub text_content: String,
    pub raw_len: usize,
    pub tag_count: usize,
    pub change_type: ChangeType,
}

/// The outcome of comparing two consecutive versions' text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignificantChangeReport {
    pub url: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub is_significant: bool,
    pub is_critical: bool,
    pub summary: String,
}

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[a-zA-Z][^>]*>").unwrap());
static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[.!?]+\s+|\n+").unwrap());

fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_BOUNDARY
        .split(text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn count_tags(raw: &[u8]) -> usize {
    let text = String::from_utf8_lossy(raw);
    TAG.find_iter(&text).count()
}

fn sha256_hex(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    hex::encode(hasher.finalize())
}

/// Raw-content fingerprint used by [`classify_change`]: byte length and tag
/// count, both measured against the fetched bytes, never against the
/// stripped text — the Structure and Format branches below only mean
/// anything when both sides are raw-vs-raw.
struct RawFingerprint {
    len: usize,
    tag_count: usize,
}

fn classify_change(
    previous: RawFingerprint,
    previous_text: &str,
    current: RawFingerprint,
    current_text: &str,
) -> (ChangeType, Vec<String>, Vec<String>) {
    let previous_sentences: std::collections::HashSet<String> =
        split_sentences(previous_text).into_iter().collect();
    let current_sentences_vec = split_sentences(current_text);
    let current_sentences: std::collections::HashSet<String> =
        current_sentences_vec.iter().cloned().collect();

    let added: Vec<String> = current_sentences
        .difference(&previous_sentences)
        .cloned()
        .collect();
    let removed: Vec<String> = previous_sentences
        .difference(&current_sentences)
        .cloned()
        .collect();

    if current_text.trim().is_empty() && !previous_text.trim().is_empty() {
        return (ChangeType::Removed, added, removed);
    }

    let total = previous_sentences.len().max(1);
    let changed = added.len() + removed.len();
    let ratio = changed as f64 / total as f64;

    let tag_ratio = if previous.tag_count == 0 {
        0.0
    } else {
        (current.tag_count as f64 - previous.tag_count as f64).abs() / previous.tag_count as f64
    };
    if tag_ratio > 0.3 {
        return (ChangeType::Structure, added, removed);
    }

    let len_ratio = if previous.len == 0 {
        0.0
    } else {
        (current.len as f64 - previous.len as f64).abs() / previous.len as f64
    };
    if len_ratio > 0.2 && ratio < 0.1 {
        return (ChangeType::Format, added, removed);
    }

    let change_type = if ratio > 0.66 {
        ChangeType::Major
    } else if ratio > 0.33 {
        ChangeType::Moderate
    } else {
        ChangeType::Minor
    };

    (change_type, added, removed)
}

/// Tracks version history for every URL the scraper observes.
pub struct ChangeDetector {
    track_versions: bool,
    max_versions_to_keep: usize,
    significant_threshold: usize,
    keyword_alert_list: Vec<String>,
    history_path: PathBuf,
    versions: Mutex<HashMap<String, Arc<Mutex<Vec<PageVersion>>>>>,
}

impl ChangeDetector {
    pub fn new(
        track_versions: bool,
        max_versions_to_keep: u32,
        significant_threshold: u32,
        keyword_alert_list: Vec<String>,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            track_versions,
            max_versions_to_keep: max_versions_to_keep.max(1) as usize,
            significant_threshold: significant_threshold as usize,
            keyword_alert_list: keyword_alert_list
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            history_path: output_dir.as_ref().join("version_history.json"),
            versions: Mutex::new(HashMap::new()),
        }
    }

    fn entry_for(&self, url: &str) -> Arc<Mutex<Vec<PageVersion>>> {
        let mut map = self.versions.lock().expect("version map mutex poisoned");
        map.entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Appends a new version for `url`, classifying its change type against
    /// the immediately prior version, trimming the oldest entry if the
    /// history now exceeds `max_versions_to_keep`.
    pub fn track_page_version(&self, url: &str, raw: &[u8], text: &str) -> PageVersion {
        let hash = sha256_hex(raw);
        let raw_len = raw.len();
        let tag_count = count_tags(raw);
        let entry = self.entry_for(url);
        let mut history = entry.lock().expect("per-url version mutex poisoned");

        let change_type = match history.last() {
            None => ChangeType::Initial,
            Some(previous) if previous.content_hash == hash => ChangeType::None,
            Some(previous) => {
                let (change_type, _, _) = classify_change(
                    RawFingerprint {
                        len: previous.raw_len,
                        tag_count: previous.tag_count,
                    },
                    &previous.text_content,
                    RawFingerprint {
                        len: raw_len,
                        tag_count,
                    },
                    text,
                );
                change_type
            }
        };

        let version = PageVersion {
            timestamp: Utc::now(),
            content_hash: hash,
            text_content: text.to_string(),
            raw_len,
            tag_count,
            change_type,
        };
        history.push(version.clone());

        while history.len() > self.max_versions_to_keep {
            history.remove(0);
        }

        version
    }

    /// Compares the two most recent versions for `url` and reports whether
    /// the change is significant and/or critical. Returns `None` if fewer
    /// than two versions are on record.
    pub fn significant_change_report(&self, url: &str) -> Option<SignificantChangeReport> {
        let entry = self.entry_for(url);
        let history = entry.lock().expect("per-url version mutex poisoned");
        if history.len() < 2 {
            return None;
        }
        let previous = &history[history.len() - 2];
        let current = &history[history.len() - 1];

        let (_, added, removed) = classify_change(
            RawFingerprint {
                len: previous.raw_len,
                tag_count: previous.tag_count,
            },
            &previous.text_content,
            RawFingerprint {
                len: current.raw_len,
                tag_count: current.tag_count,
            },
            &current.text_content,
        );

        let is_significant = added.len() + removed.len() > self.significant_threshold;
        let is_critical = added.iter().any(|sentence| {
            let lower = sentence.to_lowercase();
            self.keyword_alert_list.iter().any(|kw| lower.contains(kw))
        });

        let summary = format!(
            "{} sentence(s) added, {} removed",
            added.len(),
            removed.len()
        );

        Some(SignificantChangeReport {
            url: url.to_string(),
            added,
            removed,
            is_significant,
            is_critical,
            summary,
        })
    }

    pub fn version_count(&self, url: &str) -> usize {
        let entry = self.entry_for(url);
        let history = entry.lock().expect("per-url version mutex poisoned");
        history.len()
    }

    fn snapshot(&self) -> HashMap<String, Vec<PageVersion>> {
        let map = self.versions.lock().expect("version map mutex poisoned");
        map.iter()
            .map(|(url, history)| {
                (
                    url.clone(),
                    history.lock().expect("per-url version mutex poisoned").clone(),
                )
            })
            .collect()
    }

    pub fn save_version_history(&self) -> ChangeDetectorResult<()> {
        if !self.track_versions {
            return Ok(());
        }
        if let Some(parent) = self.history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.history_path, json)?;
        Ok(())
    }

    pub fn load_version_history(&self) -> ChangeDetectorResult<()> {
        if !self.history_path.exists() {
            return Ok(());
        }
        let contents = std::fs::read_to_string(&self.history_path)?;
        let loaded: HashMap<String, Vec<PageVersion>> = serde_json::from_str(&contents)?;
        let mut map = self.versions.lock().expect("version map mutex poisoned");
        for (url, history) in loaded {
            map.insert(url, Arc::new(Mutex::new(history)));
        }
        Ok(())
    }
}

impl LifecycleHook for ChangeDetector {
    fn component_name(&self) -> &'static str {
        "change_detector"
    }

    fn on_event(&self, event: LifecycleEvent) -> Result<(), String> {
        match event {
            LifecycleEvent::Initialize => {
                self.load_version_history().map_err(|e| e.to_string())
            }
            LifecycleEvent::Completed | LifecycleEvent::Stopped => {
                self.save_version_history().map_err(|e| e.to_string())
            }
            LifecycleEvent::Started => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn detector(tmp: &Path) -> ChangeDetector {
        ChangeDetector::new(true, 3, 2, vec!["regulation".to_string()], tmp)
    }

    #[test]
    fn first_version_is_initial() {
        let tmp = tempdir().unwrap();
        let detector = detector(tmp.path());
        let version = detector.track_page_version("http://x.test/", b"hello", "hello");
        assert_eq!(version.change_type, ChangeType::Initial);
    }

    #[test]
    fn unchanged_hash_classifies_as_none_but_still_appends() {
        let tmp = tempdir().unwrap();
        let detector = detector(tmp.path());
        detector.track_page_version("http://x.test/", b"hello", "hello");
        let second = detector.track_page_version("http://x.test/", b"hello", "hello");
        assert_eq!(second.change_type, ChangeType::None);
        assert_eq!(detector.version_count("http://x.test/"), 2);
    }

    #[test]
    fn history_is_capped_at_max_versions() {
        let tmp = tempdir().unwrap();
        let detector = detector(tmp.path());
        for i in 0..10 {
            detector.track_page_version("http://x.test/", format!("body {i}").as_bytes(), &format!("body {i}"));
        }
        assert_eq!(detector.version_count("http://x.test/"), 3);
    }

    #[test]
    fn significant_change_report_detects_critical_keyword() {
        let tmp = tempdir().unwrap();
        let detector = detector(tmp.path());
        detector.track_page_version("http://x.test/", b"short text.", "Short text.");
        detector.track_page_version(
            "http://x.test/",
            b"new content",
            "Short text. New regulation announced. Another sentence. And one more.",
        );

        let report = detector.significant_change_report("http://x.test/").unwrap();
        assert!(report.is_significant);
        assert!(report.is_critical);
    }

    #[test]
    fn removed_content_classifies_as_removed() {
        let tmp = tempdir().unwrap();
        let detector = detector(tmp.path());
        detector.track_page_version("http://x.test/", b"<p>Some text.</p>", "Some text.");
        let second = detector.track_page_version("http://x.test/", b"", "");
        assert_eq!(second.change_type, ChangeType::Removed);
    }

    #[test]
    fn save_and_load_round_trips_history() {
        let tmp = tempdir().unwrap();
        let first = detector(tmp.path());
        first.track_page_version("http://x.test/", b"hello", "hello");
        first.save_version_history().unwrap();

        let reloaded = detector(tmp.path());
        reloaded.load_version_history().unwrap();
        assert_eq!(reloaded.version_count("http://x.test/"), 1);
    }

    #[test]
    fn disabling_tracking_skips_persistence() {
        let tmp = tempdir().unwrap();
        let detector = ChangeDetector::new(false, 3, 2, vec![], tmp.path());
        detector.track_page_version("http://x.test/", b"hello", "hello");
        detector.save_version_history().unwrap();
        assert!(!tmp.path().join("version_history.json").exists());
    }
}
