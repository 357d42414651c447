use std::fs;
use tempfile::TempDir;

use regsearch_core::config::{AnswerMode, Config, CorpusSettings, DocumentSpec};
use regsearch_core::data_processor::{ChunkingConfig, DataProcessor, GLOSSARY_SOURCE};
use regsearch_core::doctree::{move_up, DocTree, Section, TreeIndex};
use regsearch_core::error::Error;

fn sample_tree() -> DocTree {
    DocTree::from_section(Section::new("Technical Regulations", vec![]).with_children(vec![
        Section::new("ARTICLE 4: CAR WEIGHT", vec!["General provisions on weight.".into()]).with_children(vec![
            Section::new("4.1 Weight", vec!["The minimum weight of the car is 798 kg.".into()]),
            Section::new("4.2 Ballast", vec!["Ballast can be used provided it is secured.".into(), "It must be fixed with tools.".into()]),
        ]),
        Section::new("ARTICLE 5: TYRES", vec!["Tyre pressure must be at least 20 psi.".into()]),
    ]))
}

#[test]
fn move_up_from_root_is_empty_and_parents_are_ancestors() {
    let tree = sample_tree();
    assert_eq!(move_up(&TreeIndex::root()), None);
    let indices: Vec<TreeIndex> = tree.flatten().map(|p| p.tree_index).collect();
    for index in indices.into_iter().filter(|i| !i.is_root()) {
        let parent = move_up(&index).expect("non-root has a parent");
        assert!(parent.is_ancestor_of(&index));
        assert!(tree.get_node(&parent).is_ok());
    }
}

#[test]
fn get_node_out_of_range_fails() {
    let tree = sample_tree();
    assert_eq!(tree.get_node(&TreeIndex::new(vec![0, 1])).expect("4.2").title, "4.2 Ballast");
    match tree.get_node(&TreeIndex::new(vec![0, 7])) {
        Err(Error::IndexOutOfRange(idx)) => assert_eq!(idx, TreeIndex::new(vec![0, 7])),
        other => panic!("expected IndexOutOfRange, got {:?}", other.map(|n| n.title.clone())),
    }
    assert!(tree.find(&TreeIndex::new(vec![9])).is_none());
}

#[test]
fn flatten_is_document_ordered_and_restartable() {
    let tree = sample_tree();
    let first: Vec<(TreeIndex, usize, String)> = tree.flatten().map(|p| (p.tree_index, p.paragraph_index, p.text.to_string())).collect();
    let second: Vec<(TreeIndex, usize, String)> = tree.flatten().map(|p| (p.tree_index, p.paragraph_index, p.text.to_string())).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), tree.paragraph_count());
    let texts: Vec<&str> = first.iter().map(|(_, _, t)| t.as_str()).collect();
    assert_eq!(texts, vec![
        "General provisions on weight.",
        "The minimum weight of the car is 798 kg.",
        "Ballast can be used provided it is secured.",
        "It must be fixed with tools.",
        "Tyre pressure must be at least 20 psi.",
    ]);
    assert_eq!(first[3].0, TreeIndex::new(vec![0, 1]));
    assert_eq!(first[3].1, 1);
}

#[test]
fn expand_context_and_breadcrumbs() {
    let tree = sample_tree();
    let weight = TreeIndex::new(vec![0, 0]);
    let ctx = tree.expand_context(&weight);
    assert_eq!(ctx.supersection.as_deref(), Some("ARTICLE 4: CAR WEIGHT\nGeneral provisions on weight."));
    assert_eq!(ctx.subsection, None);

    let article = TreeIndex::new(vec![0]);
    let ctx = tree.expand_context(&article);
    assert_eq!(ctx.supersection, None, "the root is not a heading-bearing ancestor");
    assert_eq!(ctx.subsection.as_deref(), Some("4.1 Weight\nThe minimum weight of the car is 798 kg."));

    assert_eq!(tree.breadcrumbs(&weight), vec!["ARTICLE 4: CAR WEIGHT".to_string(), "4.1 Weight".to_string()]);
    assert!(tree.breadcrumbs(&TreeIndex::root()).is_empty());
}

#[test]
fn consolidate_leaves_merges_small_leaf_into_preceding_leaf() {
    let tree = DocTree::from_section(Section::new("Doc", vec![]).with_children(vec![
        Section::new("1.1", vec!["A long enough paragraph for the threshold.".into()]),
        Section::new("a)", vec!["tiny".into()]),
        Section::new("b)", vec![]),
    ]));
    let merged = tree.consolidate_leaves(20);
    let root = merged.to_section();
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].contents, vec![
        "A long enough paragraph for the threshold.".to_string(),
        "a) tiny".to_string(),
        "b)".to_string(),
    ]);
    let again = merged.consolidate_leaves(20);
    assert_eq!(again.to_section(), root, "idempotent once merged");
}

#[test]
fn consolidate_leaves_keeps_small_leaf_after_branch() {
    let tree = DocTree::from_section(Section::new("Doc", vec![]).with_children(vec![
        Section::new("1", vec!["x".into()]).with_children(vec![Section::new("1.1", vec!["child".into()])]),
        Section::new("2", vec!["y".into()]),
    ]));
    let merged = tree.consolidate_leaves(100);
    assert_eq!(merged.to_section().children.len(), 2);
    assert_eq!(merged.paragraph_count(), tree.paragraph_count());
}

#[test]
fn consolidate_paragraphs_merges_short_neighbours() {
    let tree = DocTree::from_section(Section::new("Doc", vec!["short".into(), "also".into(), "this one is definitely long enough".into(), "end".into()]));
    let merged = tree.consolidate_paragraphs(10);
    assert_eq!(merged.to_section().contents, vec![
        "short\nalso".to_string(),
        "this one is definitely long enough\nend".to_string(),
    ]);
    let tree = DocTree::from_section(Section::new("Doc", vec!["first long paragraph".into(), "second long paragraph".into()]));
    assert_eq!(tree.consolidate_paragraphs(10).paragraph_count(), 2);
    let once = tree.consolidate_paragraphs(10);
    assert_eq!(once.consolidate_paragraphs(10).to_section(), once.to_section());
}

#[test]
fn from_sections_nests_by_level() {
    let sections = vec![
        Section::new("PREAMBLE", vec!["intro".into()]),
        Section::new("1) GENERAL", vec![]),
        Section::new("1.1", vec!["first".into()]),
        Section::new("a)", vec!["item".into()]),
        Section::new("1.2", vec!["second".into()]),
        Section::new("2) CARS", vec!["cars".into()]),
    ];
    let tree = DocTree::from_sections("Sporting Regulations", sections, &[1, 1, 2, 3, 2, 1]).expect("tree");
    assert_eq!(tree.title(), "Sporting Regulations");
    assert_eq!(tree.section_count(), 7);
    assert_eq!(tree.get_node(&TreeIndex::new(vec![1, 0, 0])).expect("a)").title, "a)");
    assert_eq!(tree.get_node(&TreeIndex::new(vec![1, 1])).expect("1.2").title, "1.2");
    assert_eq!(tree.get_node(&TreeIndex::new(vec![2])).expect("2)").title, "2) CARS");
    assert!(tree.outline().contains("    a) (1 paragraphs)"));
    assert!(DocTree::from_sections("x", vec![Section::new("a", vec![])], &[]).is_err());
}

#[test]
fn tree_json_round_trip_is_lossless() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("regs.json");
    let tree = DocTree::from_section(
        Section::new("Doc", vec![]).with_children(vec![Section::new("1", vec!["p".into()]).with_metadata("file", "regs.pdf").with_metadata("page", 3)]),
    );
    tree.write(&path).unwrap();
    let read = DocTree::read(&path).unwrap();
    assert_eq!(read.to_section(), tree.to_section());
}

#[test]
fn chunk_text_splits_long_paragraphs_with_overlap() {
    let processor = DataProcessor::with_chunking(ChunkingConfig { max_words: 4, overlap_percent: 0.5 });
    assert_eq!(processor.chunk_text("one two three"), vec!["one two three".to_string()]);
    let chunks = processor.chunk_text("a b c d e f");
    assert_eq!(chunks, vec!["a b c d".to_string(), "c d e f".to_string()]);
}

#[test]
fn load_corpus_reads_trees_definitions_and_glossary() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    sample_tree().write(&dir.join("tech.json")).unwrap();
    fs::write(dir.join("tech.defs.json"), r#"["\"Car\": A single-seat, open-wheel vehicle."]"#).unwrap();
    fs::write(dir.join("glossary.json.txt"), r#"["DRS: Drag reduction system."]"#).unwrap();

    let settings = CorpusSettings {
        doc_dir: dir.to_path_buf(),
        documents: vec![DocumentSpec { title: "2023 Technical Regulations".into(), file: "tech.json".into() }],
        glossary: Some("glossary.json.txt".into()),
        leaf_min_chars: None,
        paragraph_min_chars: None,
    };
    let processor = DataProcessor::new();
    let corpus = processor.load_corpus(&settings).expect("corpus");
    assert_eq!(corpus.documents().len(), 1);
    assert!(corpus.tree("2023 Technical Regulations").is_some());
    assert_eq!(corpus.definitions().len(), 2);
    assert_eq!(corpus.definitions()[0].source, "2023 Technical Regulations");
    assert_eq!(corpus.definitions()[1].source, GLOSSARY_SOURCE);

    let units = processor.units(&corpus, false);
    assert_eq!(units.len(), 5);
    assert!(units.iter().all(|u| u.id.chunk_id == 0));
    let expanded = processor.units(&corpus, true);
    assert!(expanded[1].text.starts_with("ARTICLE 4: CAR WEIGHT"));
}

#[test]
fn load_corpus_discovers_trees_when_unlisted() {
    let tmp = TempDir::new().unwrap();
    sample_tree().write(&tmp.path().join("tech.json")).unwrap();
    fs::write(tmp.path().join("tech.defs.json"), "[]").unwrap();
    let settings = CorpusSettings { doc_dir: tmp.path().to_path_buf(), documents: vec![], glossary: None, leaf_min_chars: None, paragraph_min_chars: None };
    let corpus = DataProcessor::new().load_corpus(&settings).expect("corpus");
    assert_eq!(corpus.documents()[0].id, "Technical Regulations");
}

#[test]
fn missing_document_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let settings = CorpusSettings {
        doc_dir: tmp.path().to_path_buf(),
        documents: vec![DocumentSpec { title: "x".into(), file: "missing.json".into() }],
        glossary: None,
        leaf_min_chars: None,
        paragraph_min_chars: None,
    };
    let err = DataProcessor::new().load_corpus(&settings).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
}

#[test]
fn config_merges_toml_over_defaults_and_resolves_paths() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[corpus]\ndoc_dir = \"docs\"\n\n[retrieval]\ntop_k = 3\n\n[llm]\nmode = \"search\"\n").unwrap();
    let settings = Config::load_from(tmp.path()).unwrap().settings().unwrap();
    assert_eq!(settings.retrieval.top_k, 3);
    assert_eq!(settings.retrieval.definitions_k, 5);
    assert_eq!(settings.corpus.doc_dir, tmp.path().join("docs"));
    assert_eq!(settings.llm.mode, AnswerMode::Search);
    assert_eq!(settings.llm.max_calls, 5);
}

#[test]
fn config_rejects_zero_top_k() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[retrieval]\ntop_k = 0\n").unwrap();
    assert!(Config::load_from(tmp.path()).is_err());
    assert!("agentic".parse::<AnswerMode>().is_ok());
    assert!("chatty".parse::<AnswerMode>().is_err());
}
