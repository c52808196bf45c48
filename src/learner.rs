//! Pattern Learner.
//!
//! Records every manual merge resolution into a bounded ring buffer and a
//! preference model with three views (`by_file_type`, `by_provider`,
//! `by_conflict_type`). `predict` combines four weighted signals to guess
//! how a human would resolve a similar conflict.
//!
//! Uses the same ring-buffer shape [`crate::tracker`] uses for bounded
//! history (`VecDeque`, fixed capacity). `export_json` wraps history in an
//! envelope alongside a reserved model blob and an export timestamp,
//! re-encoding each record's resolution tag into a discriminated shape.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::sha256_hex;
use crate::merge::{Conflict, ConflictType};
use crate::provider::ProviderId;
use crate::task::{now_ms, TimestampMs};

const HISTORY_CAPACITY: usize = 1000;
const NEAREST_NEIGHBOR_WINDOW: usize = 20;
const PREDICTION_THRESHOLD: f64 = 0.3;
const MIN_HISTORY: usize = 5;

const WEIGHT_FILE_TYPE: f64 = 0.30;
const WEIGHT_CONFLICT_TYPE: f64 = 0.25;
const WEIGHT_PROVIDER_RATE: f64 = 0.25;
const WEIGHT_NEAREST_NEIGHBOR: f64 = 0.20;

/// A manual resolution, flattened to a string tag for serialization and
/// signal comparison (e.g. `"accept_openai"`, `"merge_union"`).
///
/// `signature` is the record's identity and nearest-neighbour key: the
/// SHA-256 hex digest of `"{conflict_type}|{file_path}|{sorted providers}"`,
/// so two conflicts over the same file touched by the same provider set
/// hash identically regardless of resolution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolutionRecord {
    pub signature: String,
    pub file_path: String,
    pub file_type: String,
    pub conflict_type: String,
    pub providers: Vec<ProviderId>,
    pub chosen_provider: Option<ProviderId>,
    pub resolution_tag: String,
    pub timestamp: TimestampMs,
    pub context: serde_json::Value,
}

impl ResolutionRecord {
    pub fn from_conflict(conflict: &Conflict, resolution_tag: impl Into<String>, chosen_provider: Option<ProviderId>) -> Self {
        let conflict_type = conflict_type_tag(conflict.conflict_type);
        let mut providers: Vec<ProviderId> = conflict.variants.iter().map(|v| v.provider).collect();
        providers.sort_by_key(|p| p.to_string());

        Self {
            signature: record_signature(&conflict_type, &conflict.path, &providers),
            file_path: conflict.path.clone(),
            file_type: file_type_of(&conflict.path),
            conflict_type,
            providers,
            chosen_provider,
            resolution_tag: resolution_tag.into(),
            timestamp: now_ms(),
            context: serde_json::Value::Null,
        }
    }
}

fn record_signature(conflict_type: &str, file_path: &str, sorted_providers: &[ProviderId]) -> String {
    let providers_part = sorted_providers.iter().map(ProviderId::to_string).collect::<Vec<_>>().join(",");
    sha256_hex(&format!("{}|{}|{}", conflict_type, file_path, providers_part))
}

/// A resolution tag decomposed into its discriminated shape for export,
/// rather than the flat string [`ResolutionRecord::resolution_tag`] uses
/// internally for signal matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionTag {
    Provider { provider: String },
    Strategy { strategy: String },
    Content { content: String },
}

impl ResolutionTag {
    fn encode(tag: &str) -> Self {
        if let Some(provider) = tag.strip_prefix("accept_") {
            Self::Provider { provider: provider.to_string() }
        } else if let Some(strategy) = tag.strip_prefix("merge_") {
            Self::Strategy { strategy: strategy.to_string() }
        } else {
            Self::Content { content: tag.to_string() }
        }
    }

    fn decode(&self) -> String {
        match self {
            Self::Provider { provider } => format!("accept_{}", provider),
            Self::Strategy { strategy } => format!("merge_{}", strategy),
            Self::Content { content } => content.clone(),
        }
    }
}

/// An exported resolution record: [`ResolutionRecord`] with its
/// `resolution_tag` re-encoded as a structured [`ResolutionTag`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedResolutionRecord {
    pub signature: String,
    pub file_path: String,
    pub file_type: String,
    pub conflict_type: String,
    pub providers: Vec<ProviderId>,
    pub chosen_provider: Option<ProviderId>,
    pub resolution_tag: ResolutionTag,
    pub timestamp: TimestampMs,
    pub context: serde_json::Value,
}

impl From<&ResolutionRecord> for ExportedResolutionRecord {
    fn from(record: &ResolutionRecord) -> Self {
        Self {
            signature: record.signature.clone(),
            file_path: record.file_path.clone(),
            file_type: record.file_type.clone(),
            conflict_type: record.conflict_type.clone(),
            providers: record.providers.clone(),
            chosen_provider: record.chosen_provider,
            resolution_tag: ResolutionTag::encode(&record.resolution_tag),
            timestamp: record.timestamp,
            context: record.context.clone(),
        }
    }
}

impl From<ExportedResolutionRecord> for ResolutionRecord {
    fn from(exported: ExportedResolutionRecord) -> Self {
        Self {
            signature: exported.signature,
            file_path: exported.file_path,
            file_type: exported.file_type,
            conflict_type: exported.conflict_type,
            providers: exported.providers,
            chosen_provider: exported.chosen_provider,
            resolution_tag: exported.resolution_tag.decode(),
            timestamp: exported.timestamp,
            context: exported.context,
        }
    }
}

/// The on-disk export shape: a history array, an opaque model blob
/// (reserved for future use), and an export timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerExport {
    pub history: Vec<ExportedResolutionRecord>,
    pub model: serde_json::Value,
    pub exported_at: TimestampMs,
}

fn file_type_of(path: &str) -> String {
    path.rsplit('.').next().unwrap_or("").to_lowercase()
}

fn conflict_type_tag(kind: ConflictType) -> String {
    match kind {
        ConflictType::FileLevel => "file_level".to_string(),
        ConflictType::LineLevel => "line_level".to_string(),
        ConflictType::Addition => "addition".to_string(),
    }
}

/// A predicted resolution with its combined confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub resolution_tag: String,
    pub confidence: f64,
}

#[derive(Default)]
struct Inner {
    history: VecDeque<ResolutionRecord>,
}

impl Inner {
    fn record(&mut self, record: ResolutionRecord) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    fn by_file_type(&self, file_type: &str) -> Vec<&ResolutionRecord> {
        self.history.iter().filter(|r| r.file_type == file_type).collect()
    }

    fn by_provider(&self, provider: ProviderId) -> Vec<&ResolutionRecord> {
        self.history.iter().filter(|r| r.chosen_provider == Some(provider)).collect()
    }

    fn by_conflict_type(&self, conflict_type: &str) -> Vec<&ResolutionRecord> {
        self.history.iter().filter(|r| r.conflict_type == conflict_type).collect()
    }

    fn majority_tag<'a>(records: &[&'a ResolutionRecord]) -> Option<(&'a str, f64)> {
        if records.is_empty() {
            return None;
        }
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for r in records {
            *counts.entry(r.resolution_tag.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(tag, count)| (tag, count as f64 / records.len() as f64))
    }
}

/// Pattern Learner handle. Cloning shares the same history.
#[derive(Clone)]
pub struct PatternLearner {
    inner: Arc<Mutex<Inner>>,
}

impl PatternLearner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Record a manual resolution into history.
    pub async fn record(&self, record: ResolutionRecord) {
        self.inner.lock().await.record(record);
    }

    pub async fn by_file_type(&self, file_type: &str) -> Vec<ResolutionRecord> {
        self.inner.lock().await.by_file_type(file_type).into_iter().cloned().collect()
    }

    pub async fn by_provider(&self, provider: ProviderId) -> Vec<ResolutionRecord> {
        self.inner.lock().await.by_provider(provider).into_iter().cloned().collect()
    }

    pub async fn by_conflict_type(&self, conflict_type: &str) -> Vec<ResolutionRecord> {
        self.inner.lock().await.by_conflict_type(conflict_type).into_iter().cloned().collect()
    }

    /// Predict how a human would resolve `conflict`, combining four
    /// weighted signals. Returns `None` if history is too thin
    /// (`< 5` records) or no candidate clears the confidence threshold.
    pub async fn predict(&self, conflict: &Conflict) -> Option<Prediction> {
        let inner = self.inner.lock().await;
        if inner.history.len() < MIN_HISTORY {
            return None;
        }

        let file_type = file_type_of(&conflict.path);
        let conflict_type = conflict_type_tag(conflict.conflict_type);

        let file_type_records = inner.by_file_type(&file_type);
        let (file_type_tag, file_type_rate) = Inner::majority_tag(&file_type_records).unwrap_or(("", 0.0));

        let conflict_type_records = inner.by_conflict_type(&conflict_type);
        let (conflict_type_tag_val, conflict_type_rate) = Inner::majority_tag(&conflict_type_records).unwrap_or(("", 0.0));

        let providers: Vec<ProviderId> = conflict.variants.iter().map(|v| v.provider).collect();
        let mut best_provider_tag = "";
        let mut best_provider_rate = 0.0;
        for provider in &providers {
            let records = inner.by_provider(*provider);
            if let Some((tag, rate)) = Inner::majority_tag(&records) {
                if rate > best_provider_rate {
                    best_provider_tag = tag;
                    best_provider_rate = rate;
                }
            }
        }

        let recent: Vec<&ResolutionRecord> = inner
            .history
            .iter()
            .rev()
            .take(NEAREST_NEIGHBOR_WINDOW)
            .filter(|r| r.file_type == file_type || r.conflict_type == conflict_type)
            .collect();
        let (neighbor_tag, neighbor_rate) = Inner::majority_tag(&recent).unwrap_or(("", 0.0));

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for (tag, rate, weight) in [
            (file_type_tag, file_type_rate, WEIGHT_FILE_TYPE),
            (conflict_type_tag_val, conflict_type_rate, WEIGHT_CONFLICT_TYPE),
            (best_provider_tag, best_provider_rate, WEIGHT_PROVIDER_RATE),
            (neighbor_tag, neighbor_rate, WEIGHT_NEAREST_NEIGHBOR),
        ] {
            if tag.is_empty() {
                continue;
            }
            *scores.entry(tag).or_insert(0.0) += rate * weight;
        }

        let (best_tag, best_confidence) = scores
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())?;

        if best_confidence > PREDICTION_THRESHOLD {
            Some(Prediction {
                resolution_tag: best_tag.to_string(),
                confidence: best_confidence,
            })
        } else {
            None
        }
    }

    /// Serialize the full history to the `{history, model, exported_at}`
    /// envelope, each record's resolution tag re-encoded structurally.
    pub async fn export_json(&self) -> crate::error::Result<String> {
        let inner = self.inner.lock().await;
        let export = LearnerExport {
            history: inner.history.iter().map(ExportedResolutionRecord::from).collect(),
            model: serde_json::json!({}),
            exported_at: now_ms(),
        };
        serde_json::to_string(&export).map_err(crate::error::PipelineError::Json)
    }

    /// Replace history from a previously exported JSON envelope.
    pub async fn import_json(&self, text: &str) -> crate::error::Result<()> {
        let export: LearnerExport = serde_json::from_str(text).map_err(crate::error::PipelineError::Json)?;
        let mut inner = self.inner.lock().await;
        inner.history = export.history.into_iter().map(ResolutionRecord::from).collect();
        Ok(())
    }
}

impl Default for PatternLearner {
    fn default() -> Self {
        Self::new()
    }
}
