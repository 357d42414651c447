use regsearch_core::data_processor::Corpus;
use regsearch_core::types::SearchResult;

/// Separates formatted regulation passages.
pub const REG_DIVIDER: &str = "\n\n---\n\n";
/// Separates formatted definitions.
pub const DEFINITION_DIVIDER: &str = "\n\n";

/// `<doc> Regulation: <headings>` followed by the passage in bold, wrapped in
/// its enclosing section and first subsection.
pub fn result_to_string(result: &SearchResult, corpus: &Corpus) -> String {
    let index = &result.unit.tree_index;
    let mut text = format!("**{}**", result.text);
    let mut headings = Vec::new();
    if let Some(tree) = corpus.tree(&result.unit.doc_id) {
        headings = tree.breadcrumbs(index);
        if let Some(sup) = tree.supersection(index) { text = format!("{}\n\n{}", sup, text); }
        if let Some(sub) = tree.subsection(index) { text = format!("{}\n\n{}", text, sub); }
    }
    if headings.len() < 2 { headings.push("None".to_string()); }
    format!("{} Regulation: {}\n\n{}\n", result.unit.doc_id, headings.join(", "), text)
}

pub fn results_to_string(results: &[SearchResult], corpus: &Corpus) -> String {
    results.iter().map(|r| result_to_string(r, corpus)).collect::<Vec<_>>().join(REG_DIVIDER)
}

/// Prompt preamble: definitions first (when given), then regulations.
pub fn build_context(regulations: Option<&str>, definitions: Option<&str>) -> String {
    let mut context = String::new();
    if let Some(definitions) = definitions {
        context.push_str("Here are some potentially useful definitions:\n\n");
        context.push_str(definitions);
        context.push_str(REG_DIVIDER);
    }
    if let Some(regulations) = regulations {
        context.push_str("Here is potentially useful context from the regulations:\n\n");
        context.push_str(regulations);
    }
    context
}

/// What a compound search hands to the language model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    pub regulations: Vec<String>,
    pub definitions: Vec<String>,
}

impl ContextBundle {
    pub fn regulations_text(&self) -> String { self.regulations.join(REG_DIVIDER) }

    pub fn definitions_text(&self) -> String { self.definitions.join(DEFINITION_DIVIDER) }

    pub fn to_context(&self, include_definitions: bool) -> String {
        let definitions = include_definitions.then(|| self.definitions_text());
        build_context(Some(&self.regulations_text()), definitions.as_deref())
    }
}
