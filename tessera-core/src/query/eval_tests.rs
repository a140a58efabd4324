//! End-to-end evaluation over an in-memory index

use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::config::{EvalConfig, MovementPolicy, PassageConfig, ProcessingModel, QuorumOrdering};
use crate::context::ScoringContext;
use crate::eval::{Evaluator, ScoredDocument};
use crate::index::{IndexSource, MemoryIndex};
use crate::scoring::{Bm25Scorer, CollectionStatistics, ScoringFunction};
use crate::structures::FieldValue;
use crate::{DocId, Error, TERMINATED};

fn text_index(docs: &[&str]) -> Arc<dyn IndexSource> {
    let mut builder = MemoryIndex::builder();
    for (doc, text) in docs.iter().enumerate() {
        builder.add_text(doc as DocId, "document", text).unwrap();
    }
    Arc::new(builder.build())
}

fn bm25(term: &str) -> QueryNode {
    QueryNode::new("bm25")
        .with_param("b", 0.75)
        .with_param("k", 1.2)
        .with_child(QueryNode::term(term))
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[test]
fn test_bm25_scenario_ranks_matching_document_first() {
    let index = text_index(&["x y", "t a t b c t d e f g", "h i j k l"]);
    let evaluator = Evaluator::new(Arc::clone(&index), EvalConfig::default());
    let results = evaluator.rank_working_set(&bm25("t"), &[2, 1]).unwrap();

    let stats = index.term_statistics("document", "t").unwrap();
    let stats = CollectionStatistics::from_params("bm25", &stats).unwrap();
    let f = Bm25Scorer::new(0.75, 1.2, &stats);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].doc, 1);
    assert!((results[0].score - f.score(3, 10)).abs() < 1e-12);
    assert_eq!(results[1], ScoredDocument { doc: 2, score: f.score(0, 5) });

    // only the matching document is a ranked candidate
    let ranked = evaluator.rank(&bm25("t")).unwrap();
    assert_eq!(ranked.iter().map(|r| r.doc).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_phrase_extents() {
    let index = text_index(&["a b x x x a b"]);
    let factory = NodeFactory::new(index, EvalConfig::default());
    let phrase = QueryNode::new("od")
        .with_param("default", 1i64)
        .with_child(QueryNode::term("a"))
        .with_child(QueryNode::term("b"));
    let mut node = factory.build(&phrase).unwrap().into_extents().unwrap();
    let mut ctx = ScoringContext::new();
    ctx.set_document(0);
    node.sync_to(0);
    assert!(node.has_match(&ctx));
    assert_eq!(node.extents(&ctx).pairs(), vec![(0, 2), (5, 7)]);
}

#[test]
fn test_lognot_of_positive_score_fails_evaluation() {
    let index = text_index(&["a b", "c"]);
    let evaluator = Evaluator::new(index, EvalConfig::default());
    let err = evaluator
        .rank(&QueryNode::new("lognot").with_child(bm25("a")))
        .unwrap_err();
    assert!(matches!(err, Error::Evaluation { ref operator, .. } if operator == "lognot"));
}

#[test]
fn test_filter_with_field_comparison() {
    let mut builder = MemoryIndex::builder();
    for (doc, (text, year)) in [("a b", 1990), ("a", 2010), ("b", 1985), ("a a", 1970)]
        .iter()
        .enumerate()
    {
        builder
            .add_text(doc as DocId, "document", text)
            .unwrap()
            .add_field_value("year", doc as DocId, FieldValue::Int(*year))
            .unwrap();
    }
    let evaluator = Evaluator::new(Arc::new(builder.build()), EvalConfig::default());

    let old_with_a = QueryNode::new("require")
        .with_child(
            QueryNode::new("less")
                .with_param("field", "year")
                .with_param("value", "2000"),
        )
        .with_child(QueryNode::new("bool").with_child(QueryNode::term("a")));
    assert_eq!(evaluator.filter(&old_with_a).unwrap(), vec![0, 3]);

    let not_b = QueryNode::new("reject")
        .with_child(QueryNode::new("bool").with_child(QueryNode::term("b")))
        .with_child(QueryNode::new("bool").with_child(QueryNode::term("a")));
    assert_eq!(evaluator.filter(&not_b).unwrap(), vec![1, 3]);
}

#[test]
fn test_passage_ranking() {
    let index = text_index(&["a b x x x a b", "x x x x"]);
    let config = EvalConfig::default().with_passage(3, 3);
    let evaluator = Evaluator::new(index, config);
    let passages = evaluator.rank_passages(&bm25("a")).unwrap();
    let windows: Vec<(DocId, u32, u32)> = passages.iter().map(|p| (p.doc, p.begin, p.end)).collect();
    assert_eq!(windows, vec![(0, 0, 3), (0, 3, 6)]);
    assert_eq!(passages[0].score, passages[1].score);
}

#[test]
fn test_passages_need_configuration() {
    let evaluator = Evaluator::new(text_index(&["a"]), EvalConfig::default());
    assert!(evaluator.rank_passages(&bm25("a")).is_err());
}

#[test]
fn test_zero_passage_shift_is_rejected() {
    let mut config = EvalConfig::default();
    config.passage = Some(PassageConfig { size: 3, shift: 0 });
    let evaluator = Evaluator::new(text_index(&["a b x a"]), config);
    let err = evaluator.rank_passages(&bm25("a")).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { ref key, .. } if key == "shift"));
}

#[test]
fn test_annotation_tree_to_json() {
    let index = text_index(&["a b", "b"]);
    let evaluator = Evaluator::new(index, EvalConfig::default());
    let query = QueryNode::new("combine").with_child(bm25("a")).with_child(bm25("b"));
    let annotation = evaluator.annotate(&query, 0).unwrap();
    assert_eq!(annotation.operator, "combine");
    assert!(annotation.matched);
    let scorer = annotation.find("bm25").unwrap();
    assert_eq!(scorer.candidate, Some(0));
    let json = annotation.to_json().unwrap();
    assert!(json.contains("\"operator\": \"bm25\""));
}

#[test]
fn test_max_score_small_collection() {
    let index = text_index(&[
        "a a a b",
        "a c",
        "c c d",
        "b b b b a",
        "d",
        "a b c d",
        "c",
    ]);
    let query = QueryNode::new("combine")
        .with_param("1", 2.0)
        .with_child(bm25("a"))
        .with_child(bm25("b"))
        .with_child(bm25("c"));
    let full = Evaluator::new(Arc::clone(&index), EvalConfig::default().with_requested(2))
        .rank(&query)
        .unwrap();
    for ordering in [QuorumOrdering::TotalEntries, QuorumOrdering::Weight] {
        for movement in [MovementPolicy::Lazy, MovementPolicy::Aggressive] {
            let config = EvalConfig::default()
                .with_requested(2)
                .with_processing(ProcessingModel::MaxScore)
                .with_ordering(ordering)
                .with_movement(movement);
            let pruned = Evaluator::new(Arc::clone(&index), config).rank(&query).unwrap();
            assert_eq!(pruned, full, "{:?}/{:?}", ordering, movement);
        }
    }
}

#[test]
fn test_max_score_with_documents_missing_a_field() {
    let mut builder = MemoryIndex::builder();
    builder
        .add_text(0, "document", "w3 w3 w0")
        .unwrap()
        .add_text(1, "document", "w0 w2 w2 w3 w4 w5")
        .unwrap()
        .add_text(1, "title", "w1 w4 w4")
        .unwrap()
        .add_text(2, "document", "w3 w5")
        .unwrap();
    let index: Arc<dyn IndexSource> = Arc::new(builder.build());

    let title = index.field_statistics("title").unwrap();
    assert_eq!(title.get_f64("minLength"), Some(0.0));

    let dirichlet = |field: &str, term: &str| {
        QueryNode::new("dirichlet")
            .with_param("mu", 5.0)
            .with_child(QueryNode::term(term).with_param("field", field))
    };
    let query = QueryNode::new("combine")
        .with_child(dirichlet("title", "w1"))
        .with_child(dirichlet("document", "w3"));
    let full = Evaluator::new(Arc::clone(&index), EvalConfig::default().with_requested(2))
        .rank(&query)
        .unwrap();
    assert_eq!(full.len(), 2);
    for ordering in [QuorumOrdering::TotalEntries, QuorumOrdering::Weight] {
        for movement in [MovementPolicy::Lazy, MovementPolicy::Aggressive] {
            let config = EvalConfig::default()
                .with_requested(2)
                .with_processing(ProcessingModel::MaxScore)
                .with_ordering(ordering)
                .with_movement(movement);
            let pruned = Evaluator::new(Arc::clone(&index), config).rank(&query).unwrap();
            assert_eq!(pruned, full, "{:?}/{:?}", ordering, movement);
        }
    }
}

// ── Properties ───────────────────────────────────────────────────────────

const VOCABULARY: u8 = 6;

fn word(w: u8) -> String {
    format!("w{}", w)
}

/// Per document: non-empty body tokens and possibly empty title tokens
fn corpus() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::vec(
        (
            prop::collection::vec(0..VOCABULARY, 1..12),
            prop::collection::vec(0..VOCABULARY, 0..4),
        ),
        1..40,
    )
}

/// An empty title leaves the document without the field. Document 0
/// falls back to its first body token so the title field is never empty.
fn build_index(docs: &[(Vec<u8>, Vec<u8>)]) -> Arc<dyn IndexSource> {
    let mut builder = MemoryIndex::builder();
    for (doc, (body, title)) in docs.iter().enumerate() {
        builder.add_tokens(doc as DocId, "document", body.iter().map(|&w| word(w))).unwrap();
        let title: &[u8] = if doc == 0 && title.is_empty() { &body[..1] } else { title };
        if !title.is_empty() {
            builder.add_tokens(doc as DocId, "title", title.iter().map(|&w| word(w))).unwrap();
        }
    }
    Arc::new(builder.build())
}

const MODELS: [&str; 5] = ["bm25", "dirichlet", "jm", "pl2", "inl2"];

fn scorer(model: usize, w: u8) -> QueryNode {
    QueryNode::new(MODELS[model % MODELS.len()]).with_child(QueryNode::term(&word(w)))
}

/// Title-field scorer, so documents without a title score from length 0
fn title_scorer(model: usize, w: u8) -> QueryNode {
    QueryNode::new(MODELS[model % MODELS.len()])
        .with_child(QueryNode::term(&word(w)).with_param("field", "title"))
}

const FIELD_COMBINATIONS: [(&str, &str); 4] = [
    ("bm25f", "bm25-field"),
    ("prms", "dirichlet-prob"),
    ("pl2f", "pl2-field"),
    ("prms", "jm-prob"),
];

fn field_combination(kind: usize, w: u8) -> QueryNode {
    let (operator, component) = FIELD_COMBINATIONS[kind % FIELD_COMBINATIONS.len()];
    let field = |name: &str, weight: f64| {
        QueryNode::new(component)
            .with_param("weight", weight)
            .with_child(QueryNode::term(&word(w)).with_param("field", name))
    };
    QueryNode::new(operator)
        .with_child(field("document", 1.0))
        .with_child(field("title", 2.0))
}

fn assert_same_ranking(
    index: &Arc<dyn IndexSource>,
    query: &QueryNode,
    k: usize,
    ordering: QuorumOrdering,
    movement: MovementPolicy,
) -> std::result::Result<(), TestCaseError> {
    let full = Evaluator::new(Arc::clone(index), EvalConfig::default().with_requested(k))
        .rank(query)
        .unwrap();
    let config = EvalConfig::default()
        .with_requested(k)
        .with_processing(ProcessingModel::MaxScore)
        .with_ordering(ordering)
        .with_movement(movement);
    let pruned = Evaluator::new(Arc::clone(index), config).rank(query).unwrap();
    prop_assert_eq!(pruned.len(), full.len());
    for (p, f) in pruned.iter().zip(&full) {
        prop_assert_eq!(p.doc, f.doc);
        prop_assert!((p.score - f.score).abs() < 1e-6, "{} vs {}", p.score, f.score);
    }
    Ok(())
}

fn ordering(aggressive: bool, by_weight: bool) -> (QuorumOrdering, MovementPolicy) {
    (
        if by_weight { QuorumOrdering::Weight } else { QuorumOrdering::TotalEntries },
        if aggressive { MovementPolicy::Aggressive } else { MovementPolicy::Lazy },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pruning_preserves_top_k(
        docs in corpus(),
        terms in prop::collection::vec((0..VOCABULARY, 0.1f64..2.0, 0usize..5), 1..4),
        k in 1usize..6,
        by_weight in any::<bool>(),
        aggressive in any::<bool>(),
    ) {
        let index = build_index(&docs);
        let mut query = QueryNode::new("combine");
        for (i, &(w, weight, model)) in terms.iter().enumerate() {
            query = query
                .with_param(&i.to_string(), weight)
                .with_child(scorer(model, w));
        }
        let (ordering, movement) = ordering(aggressive, by_weight);
        assert_same_ranking(&index, &query, k, ordering, movement)?;
    }

    #[test]
    fn pruning_preserves_top_k_over_missing_fields(
        docs in corpus(),
        terms in prop::collection::vec((0..VOCABULARY, 0usize..5, any::<bool>()), 1..4),
        k in 1usize..6,
        by_weight in any::<bool>(),
        aggressive in any::<bool>(),
    ) {
        let index = build_index(&docs);
        let mut query = QueryNode::new("combine");
        for &(w, model, in_title) in &terms {
            query = query.with_child(if in_title { title_scorer(model, w) } else { scorer(model, w) });
        }
        let (ordering, movement) = ordering(aggressive, by_weight);
        assert_same_ranking(&index, &query, k, ordering, movement)?;
    }

    #[test]
    fn pruning_preserves_top_k_with_field_slots(
        docs in corpus(),
        combined in (0..VOCABULARY, 0usize..4),
        other in (0..VOCABULARY, 0usize..5),
        k in 1usize..6,
        by_weight in any::<bool>(),
        aggressive in any::<bool>(),
    ) {
        let index = build_index(&docs);
        let query = QueryNode::new("combine")
            .with_param("0", 2.0)
            .with_child(field_combination(combined.1, combined.0))
            .with_child(scorer(other.1, other.0));
        let (ordering, movement) = ordering(aggressive, by_weight);
        assert_same_ranking(&index, &query, k, ordering, movement)?;
    }

    #[test]
    fn conjunction_and_disjunction_set_laws(
        docs in corpus(),
        a in 0..VOCABULARY,
        b in 0..VOCABULARY,
    ) {
        let index = build_index(&docs);
        let evaluator = Evaluator::new(Arc::clone(&index), EvalConfig::default());
        let has = |w: u8| -> Vec<DocId> {
            docs.iter()
                .enumerate()
                .filter(|(_, (body, _))| body.contains(&w))
                .map(|(d, _)| d as DocId)
                .collect()
        };
        let (in_a, in_b) = (has(a), has(b));
        let indicator = |w: u8| QueryNode::new("bool").with_child(QueryNode::term(&word(w)));

        let all = QueryNode::new("all").with_child(indicator(a)).with_child(indicator(b));
        let intersection: Vec<DocId> = in_a.iter().copied().filter(|d| in_b.contains(d)).collect();
        prop_assert_eq!(evaluator.filter(&all).unwrap(), intersection);

        let any = QueryNode::new("any").with_child(indicator(a)).with_child(indicator(b));
        let mut union: Vec<DocId> = in_a.iter().chain(&in_b).copied().collect();
        union.sort_unstable();
        union.dedup();
        prop_assert_eq!(evaluator.filter(&any).unwrap(), union);
    }

    #[test]
    fn candidates_are_monotone_and_done_is_absorbing(
        docs in corpus(),
        a in 0..VOCABULARY,
        b in 0..VOCABULARY,
        jumps in prop::collection::vec(0u64..10, 1..20),
    ) {
        let index = build_index(&docs);
        let factory = NodeFactory::new(index, EvalConfig::default());
        let query = QueryNode::new("syn")
            .with_child(QueryNode::term(&word(a)))
            .with_child(QueryNode::term(&word(b)));
        let mut node = factory.build(&query).unwrap().into_mover();
        let mut last = node.doc();
        for jump in jumps {
            let next = if jump % 2 == 0 {
                node.move_past(last)
            } else {
                node.sync_to(last.saturating_add(jump))
            };
            prop_assert!(next >= last || last == TERMINATED);
            if last == TERMINATED {
                prop_assert_eq!(next, TERMINATED);
            }
            last = next;
        }
        node.reset();
        node.move_past(TERMINATED);
        prop_assert!(node.is_done());
        prop_assert_eq!(node.move_past(0), TERMINATED);
    }
}
