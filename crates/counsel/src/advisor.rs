// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::llm::LlmClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tally::DocumentAdvisor;
use tracing::{info, warn};

const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 150;
const TOP_K: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    pub text: String,
    term_frequency: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusIndex {
    chunks: Vec<Chunk>,
    document_frequency: HashMap<String, usize>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(str::to_string)
        .collect()
}

fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let step = CHUNK_SIZE - CHUNK_OVERLAP;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn collect_documents(dir: &Path, documents: &mut Vec<(String, String)>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_documents(&path, documents)?;
            continue;
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        if matches!(extension.as_deref(), Some("txt") | Some("md")) {
            match std::fs::read_to_string(&path) {
                Ok(content) => documents.push((path.display().to_string(), content)),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable document"),
            }
        }
    }
    Ok(())
}

impl CorpusIndex {
    pub fn build(corpus_dir: &Path) -> Result<Self, String> {
        let mut documents = Vec::new();
        collect_documents(corpus_dir, &mut documents)
            .map_err(|e| format!("failed to scan corpus directory: {e}"))?;
        if documents.is_empty() {
            return Err("no documents in knowledge corpus".to_string());
        }

        let mut chunks = Vec::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for (source, content) in documents {
            for text in chunk_text(&content) {
                let tokens = tokenize(&text);
                if tokens.is_empty() {
                    continue;
                }
                let total = tokens.len() as f64;
                let mut term_frequency: HashMap<String, f64> = HashMap::new();
                for token in tokens {
                    *term_frequency.entry(token).or_insert(0.0) += 1.0 / total;
                }
                for term in term_frequency.keys() {
                    *document_frequency.entry(term.clone()).or_insert(0) += 1;
                }
                chunks.push(Chunk {
                    source: source.clone(),
                    text,
                    term_frequency,
                });
            }
        }
        Ok(Self {
            chunks,
            document_frequency,
        })
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read index: {e}"))?;
        serde_json::from_str(&content).map_err(|e| format!("failed to parse index: {e}"))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let payload =
            serde_json::to_string(self).map_err(|e| format!("failed to serialise index: {e}"))?;
        std::fs::write(path, payload).map_err(|e| format!("failed to write index: {e}"))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn idf(&self, term: &str) -> f64 {
        let df = self.document_frequency.get(term).copied().unwrap_or(0);
        ((self.chunks.len() as f64 + 1.0) / (df as f64 + 1.0)).ln()
    }

    /// Top-k chunks by TF-IDF cosine similarity against the query terms.
    pub fn top_chunks(&self, query: &str, k: usize) -> Vec<&Chunk> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }
        let total = tokens.len() as f64;
        let mut query_tf: HashMap<String, f64> = HashMap::new();
        for token in tokens {
            *query_tf.entry(token).or_insert(0.0) += 1.0 / total;
        }
        let query_weights: HashMap<&String, f64> = query_tf
            .iter()
            .map(|(term, tf)| (term, tf * self.idf(term)))
            .collect();
        let query_norm: f64 = query_weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &Chunk)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let mut dot = 0.0;
                let mut chunk_norm = 0.0;
                for (term, tf) in &chunk.term_frequency {
                    let weight = tf * self.idf(term);
                    chunk_norm += weight * weight;
                    if let Some(query_weight) = query_weights.get(term) {
                        dot += weight * query_weight;
                    }
                }
                if chunk_norm == 0.0 || dot == 0.0 {
                    return None;
                }
                Some((dot / (chunk_norm.sqrt() * query_norm), chunk))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, chunk)| chunk).collect()
    }
}

/// Process-lifetime advisor over a local document corpus. Built once at
/// startup and read-only afterwards; the index is only rebuilt on an explicit
/// directive.
pub enum AdvisorState {
    Uninitialized,
    Ready(CorpusIndex),
    Unavailable(String),
}

pub struct KnowledgeAdvisor {
    llm: Arc<dyn LlmClient>,
    state: AdvisorState,
}

impl KnowledgeAdvisor {
    pub fn initialise(
        llm: Arc<dyn LlmClient>,
        corpus_dir: &Path,
        index_path: &Path,
        rebuild: bool,
    ) -> Self {
        let state = Self::initialise_state(corpus_dir, index_path, rebuild);
        match &state {
            AdvisorState::Ready(index) => {
                info!(chunks = index.len(), "knowledge advisor ready");
            }
            AdvisorState::Unavailable(reason) => {
                warn!(reason = %reason, "knowledge advisor unavailable");
            }
            AdvisorState::Uninitialized => {}
        }
        Self { llm, state }
    }

    fn initialise_state(corpus_dir: &Path, index_path: &Path, rebuild: bool) -> AdvisorState {
        if rebuild && index_path.exists() {
            info!(path = %index_path.display(), "rebuild requested, deleting existing index");
            if let Err(err) = std::fs::remove_file(index_path) {
                return AdvisorState::Unavailable(format!("failed to delete index: {err}"));
            }
        }

        if index_path.exists() {
            match CorpusIndex::load(index_path) {
                Ok(index) => return AdvisorState::Ready(index),
                Err(reason) => {
                    return AdvisorState::Unavailable(format!("index loading failed: {reason}"))
                }
            }
        }

        if !corpus_dir.exists() {
            if let Err(err) = std::fs::create_dir_all(corpus_dir) {
                return AdvisorState::Unavailable(format!(
                    "failed to create corpus directory: {err}"
                ));
            }
        }
        match CorpusIndex::build(corpus_dir) {
            Ok(index) => {
                if let Err(reason) = index.save(index_path) {
                    warn!(reason = %reason, "index persistence failed, continuing in memory");
                }
                AdvisorState::Ready(index)
            }
            Err(reason) => AdvisorState::Unavailable(format!("index creation failed: {reason}")),
        }
    }

    pub fn state(&self) -> &AdvisorState {
        &self.state
    }

    fn stuff_prompt(question: &str, chunks: &[&Chunk]) -> String {
        let mut prompt = String::from(
            "Use the following pieces of context to answer the question at the end. If you don't know the answer, say that you don't know.\n\nContext:\n",
        );
        for chunk in chunks {
            prompt.push_str(&chunk.text);
            prompt.push_str("\n---\n");
        }
        prompt.push_str(&format!("\nQuestion: {question}\nHelpful Answer:"));
        prompt
    }
}

#[async_trait]
impl DocumentAdvisor for KnowledgeAdvisor {
    fn is_available(&self) -> bool {
        matches!(self.state, AdvisorState::Ready(_))
    }

    async fn query(&self, question: &str) -> Option<String> {
        let AdvisorState::Ready(index) = &self.state else {
            return None;
        };
        let top = index.top_chunks(question, TOP_K);
        let prompt = Self::stuff_prompt(question, &top);
        match self.llm.generate(&prompt).await {
            Ok(answer) => Some(answer),
            Err(err) => {
                warn!(error = %err, "advisor answer generation failed");
                None
            }
        }
    }
}
