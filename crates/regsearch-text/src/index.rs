use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, TantivyDocument, Term};
use tracing::{debug, info, warn};

use regsearch_core::traits::Retriever;
use regsearch_core::types::{DefinitionEntry, DefinitionHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer};

pub struct DefinitionIndex {
	index: Index,
	reader: IndexReader,
	entries: Vec<DefinitionEntry>,
	position_field: Field,
	text_field: Field,
}

impl DefinitionIndex {
	pub fn build(entries: Vec<DefinitionEntry>) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let position_field = schema.get_field("position")?;
		let text_field = schema.get_field("text")?;
		let source_field = schema.get_field("source")?;

		let mut index_writer = index.writer(50_000_000)?;
		for (position, entry) in entries.iter().enumerate() {
			index_writer.add_document(doc!(
				position_field => position as u64,
				text_field => entry.text.clone(),
				source_field => entry.source.clone(),
			))?;
		}
		index_writer.commit()?;
		let reader = index.reader()?;
		info!(definitions = entries.len(), "keyword index built");
		Ok(Self { index, reader, entries, position_field, text_field })
	}

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	pub fn entries(&self) -> &[DefinitionEntry] { &self.entries }

	/// Top `k` definitions by BM25 score. Entries sharing no term with the
	/// query never appear, even when fewer than `k` are returned.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<DefinitionHit>> {
		if k == 0 || self.entries.is_empty() || query.trim().is_empty() { return Ok(Vec::new()); }
		let terms = self.query_terms(query)?;
		if terms.is_empty() { return Ok(Vec::new()); }
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.into_iter()
			.map(|term| (Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>))
			.collect();
		let q = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(position) = doc.get_first(self.position_field).and_then(|v| v.as_u64()) else {
				warn!("definition document without position");
				continue;
			};
			if let Some(entry) = self.entries.get(position as usize) {
				hits.push(DefinitionHit { entry: entry.clone(), score });
			}
		}
		debug!(hits = hits.len(), "keyword search");
		Ok(hits)
	}

	/// Distinct terms of `query` after the index analyzer. Operators and
	/// punctuation carry no meaning; every word is an optional term.
	fn query_terms(&self, query: &str) -> Result<Vec<Term>> {
		let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
		let mut stream = analyzer.token_stream(query);
		let mut terms: Vec<Term> = Vec::new();
		stream.process(&mut |token| {
			let term = Term::from_field_text(self.text_field, &token.text);
			if !terms.contains(&term) { terms.push(term); }
		});
		Ok(terms)
	}
}

impl Retriever for DefinitionIndex {
	type Hit = DefinitionHit;

	fn kind(&self) -> SourceKind { SourceKind::Sparse }

	fn search(&self, query: &str, k: usize) -> Result<Vec<DefinitionHit>> { DefinitionIndex::search(self, query, k) }
}
