//! Corpus loading and flattening into retrievable units.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CorpusSettings;
use crate::doctree::DocTree;
use crate::error::Error;
use crate::types::{DefinitionEntry, FlatUnit, UnitId};

pub const GLOSSARY_SOURCE: &str = "Glossary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 300, overlap_percent: 0.2 }
    }
}

/// One document tree keyed by its title.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub tree: DocTree,
}

/// Every document tree plus the flat definitions list.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    definitions: Vec<DefinitionEntry>,
}

impl Corpus {
    pub fn new(documents: Vec<Document>, definitions: Vec<DefinitionEntry>) -> Self { Self { documents, definitions } }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn definitions(&self) -> &[DefinitionEntry] { &self.definitions }

    pub fn tree(&self, doc_id: &str) -> Option<&DocTree> {
        self.documents.iter().find(|d| d.id == doc_id).map(|d| &d.tree)
    }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunking(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn chunking(&self) -> &ChunkingConfig { &self.chunking_config }

    pub fn load_corpus(&self, settings: &CorpusSettings) -> Result<Corpus> {
        let specs: Vec<(String, PathBuf)> = if settings.documents.is_empty() {
            self.discover_trees(&settings.doc_dir)?
        } else {
            settings.documents.iter().map(|d| (d.title.clone(), settings.doc_dir.join(&d.file))).collect()
        };
        let mut documents = Vec::new();
        let mut definitions = Vec::new();
        for (file_index, (title, path)) in specs.iter().enumerate() {
            info!(file = %path.display(), "loading document {}/{}", file_index + 1, specs.len());
            if !path.exists() { return Err(Error::NotFound(path.display().to_string()).into()); }
            let mut tree = DocTree::read(path)?;
            if let Some(min) = settings.leaf_min_chars { tree = tree.consolidate_leaves(min); }
            if let Some(min) = settings.paragraph_min_chars { tree = tree.consolidate_paragraphs(min); }
            let defs_path = definitions_path(path);
            if defs_path.exists() {
                let defs = self.read_definitions(&defs_path)?;
                debug!(count = defs.len(), "definitions for {}", title);
                definitions.extend(defs.into_iter().map(|d| DefinitionEntry::new(d, title.clone())));
            }
            documents.push(Document { id: title.clone(), tree });
        }
        if let Some(glossary) = &settings.glossary {
            let path = settings.doc_dir.join(glossary);
            if !path.exists() { return Err(Error::NotFound(path.display().to_string()).into()); }
            definitions.extend(self.read_definitions(&path)?.into_iter().map(|d| DefinitionEntry::new(d, GLOSSARY_SOURCE)));
        }
        info!(documents = documents.len(), definitions = definitions.len(), "corpus loaded");
        Ok(Corpus { documents, definitions })
    }

    /// Flatten every tree into units in corpus order, optionally wrapping each
    /// paragraph with its surrounding context, and split long paragraphs.
    pub fn units(&self, corpus: &Corpus, pre_expand: bool) -> Vec<FlatUnit> {
        let mut units = Vec::new();
        for doc in corpus.documents() {
            for paragraph in doc.tree.flatten() {
                let text = if pre_expand { doc.tree.expand(paragraph.text, &paragraph.tree_index) } else { paragraph.text.to_string() };
                for (chunk_id, chunk) in self.chunk_text(&text).into_iter().enumerate() {
                    units.push(FlatUnit {
                        id: UnitId { doc_id: doc.id.clone(), tree_index: paragraph.tree_index.clone(), paragraph_index: paragraph.paragraph_index, chunk_id },
                        text: chunk,
                    });
                }
            }
        }
        units
    }

    /// Split text longer than `max_words` into overlapping word windows.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let words_per_chunk = self.chunking_config.max_words.max(1);
        if words.len() <= words_per_chunk { return vec![text.to_string()]; }
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    pub fn read_definitions(&self, path: &Path) -> Result<Vec<String>> {
        let content = self.read_file_content(path)?;
        serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Failed to parse definitions {}: {}", path.display(), e))
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    /// Every `*.json` tree under `root` (definition files excluded), titled by its root section.
    fn discover_trees(&self, root: &Path) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if name.ends_with(".json") && !name.ends_with(".defs.json") { files.push(path.to_path_buf()); }
        }
        files.sort();
        let mut out = Vec::with_capacity(files.len());
        for path in files {
            let tree = DocTree::read(&path)?;
            out.push((tree.title().to_string(), path));
        }
        Ok(out)
    }
}

/// `rules.json` -> `rules.defs.json`
pub fn definitions_path(tree_path: &Path) -> PathBuf {
    let stem = tree_path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    tree_path.with_file_name(format!("{}.defs.json", stem))
}
