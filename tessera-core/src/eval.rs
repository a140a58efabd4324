//! Query evaluation drivers
//!
//! The [`Evaluator`] owns the document loop: it moves the root, points the
//! [`ScoringContext`] at each candidate and reads the root's value.
//!
//! - [`Evaluator::rank`]: top-K documents by score
//! - [`Evaluator::rank_working_set`]: scores for an explicit document list
//! - [`Evaluator::filter`]: documents whose indicator holds
//! - [`Evaluator::rank_passages`]: top-K sliding-window passages
//! - [`Evaluator::annotate`]: debug tree for one document

use std::sync::Arc;

use log::{debug, trace};
use serde::Serialize;

use crate::config::{EvalConfig, ProcessingModel};
use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::index::IndexSource;
use crate::prune::ScoreCollector;
use crate::query::{Annotation, IndicatorIterator, NodeFactory, QueryNode, ScoreIterator};
use crate::{DocId, Score};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub doc: DocId,
    pub score: Score,
}

/// A `[begin, end)` window of a document
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPassage {
    pub doc: DocId,
    pub begin: u32,
    pub end: u32,
    pub score: Score,
}

pub struct Evaluator {
    factory: NodeFactory,
}

impl Evaluator {
    pub fn new(index: Arc<dyn IndexSource>, config: EvalConfig) -> Self {
        Self {
            factory: NodeFactory::new(index, config),
        }
    }

    pub fn config(&self) -> &EvalConfig {
        self.factory.config()
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    /// Top `requested` documents, best first (ties by ascending id)
    pub fn rank(&self, query: &QueryNode) -> Result<Vec<ScoredDocument>> {
        let mut root = self.factory.build(query)?.into_scores()?;
        rank_node(root.as_mut(), self.config().requested)
    }

    /// Scores every document of `docs` (sorted, deduplicated), matched or not
    pub fn rank_working_set(&self, query: &QueryNode, docs: &[DocId]) -> Result<Vec<ScoredDocument>> {
        // every listed document is scored, so nothing can be pruned
        let config = self.config().clone().with_processing(ProcessingModel::Ranked);
        let factory = NodeFactory::new(Arc::clone(self.factory.index()), config);
        let mut root = factory.build(query)?.into_scores()?;

        let mut docs = docs.to_vec();
        docs.sort_unstable();
        docs.dedup();

        let mut ctx = ScoringContext::new();
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            ctx.set_document(doc);
            root.sync_to(doc);
            let score = root.score(&ctx)?;
            trace!("working set: doc {} scored {:.6}", doc, score);
            results.push(ScoredDocument { doc, score });
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc.cmp(&b.doc)));
        debug!("working set: {} documents scored", results.len());
        Ok(results)
    }

    /// Every document the indicator root accepts, in id order
    pub fn filter(&self, query: &QueryNode) -> Result<Vec<DocId>> {
        let mut root = self.factory.build(query)?.into_indicator()?;
        Ok(filter_node(root.as_mut()))
    }

    /// Top `requested` passages of `passage.size` tokens, stepping by
    /// `passage.shift`, over the default field
    pub fn rank_passages(&self, query: &QueryNode) -> Result<Vec<ScoredPassage>> {
        let config = self.config();
        let passage = config
            .passage
            .ok_or_else(|| Error::evaluation("passage", "no passage window configured"))?;
        passage.validate()?;
        let lengths = self.factory.index().lengths(&config.default_field)?;
        let mut root = self.factory.build(query)?.into_scores()?;

        let mut ctx = ScoringContext::new();
        let mut passages = Vec::new();
        let mut documents = 0u64;
        while !root.is_done() {
            let doc = root.doc();
            ctx.set_document(doc);
            root.sync_to(doc);
            if root.has_match(&ctx) {
                documents += 1;
                let length = u32::try_from(lengths.get(doc).unwrap_or(0)).unwrap_or(u32::MAX);
                let mut begin = 0u32;
                loop {
                    let end = begin.saturating_add(passage.size);
                    ctx.set_passage(begin, end);
                    if root.has_match(&ctx) {
                        let score = root.score(&ctx)?;
                        trace!("doc {} passage [{}, {}) scored {:.6}", doc, begin, end, score);
                        passages.push(ScoredPassage {
                            doc,
                            begin,
                            end,
                            score,
                        });
                    }
                    if end >= length {
                        break;
                    }
                    begin = begin.saturating_add(passage.shift);
                }
            }
            root.move_past(doc);
        }

        passages.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc.cmp(&b.doc))
                .then_with(|| a.begin.cmp(&b.begin))
        });
        passages.truncate(config.requested);
        debug!(
            "passages: {} documents matched, {} passages returned",
            documents,
            passages.len()
        );
        Ok(passages)
    }

    /// Debug annotation of the whole tree for `doc`
    pub fn annotate(&self, query: &QueryNode, doc: DocId) -> Result<Annotation> {
        let mut root = self.factory.build(query)?;
        let mover = root.mover_mut();
        let mut ctx = ScoringContext::new();
        ctx.set_document(doc);
        mover.sync_to(doc);
        Ok(mover.annotate(&ctx))
    }
}

/// Document-at-a-time ranking of an already built root
pub fn rank_node(root: &mut dyn ScoreIterator, requested: usize) -> Result<Vec<ScoredDocument>> {
    let mut ctx = ScoringContext::new();
    let mut collector = ScoreCollector::new(requested);
    let mut scored = 0u64;
    while !root.is_done() {
        let doc = root.doc();
        ctx.set_document(doc);
        root.sync_to(doc);
        if root.has_match(&ctx) {
            let score = root.score(&ctx)?;
            scored += 1;
            collector.insert(doc, score);
            trace!("doc {} scored {:.6}", doc, score);
        }
        root.move_past(doc);
    }
    let results: Vec<ScoredDocument> = collector
        .into_sorted_results()
        .into_iter()
        .map(|(doc, score)| ScoredDocument { doc, score })
        .collect();
    debug!(
        "rank: {} candidates scored, {} returned (k={})",
        scored,
        results.len(),
        requested
    );
    Ok(results)
}

/// Documents where the indicator root matches and holds
pub fn filter_node(root: &mut dyn IndicatorIterator) -> Vec<DocId> {
    let mut ctx = ScoringContext::new();
    let mut accepted = Vec::new();
    while !root.is_done() {
        let doc = root.doc();
        ctx.set_document(doc);
        root.sync_to(doc);
        if root.has_match(&ctx) && root.indicator(&ctx) {
            accepted.push(doc);
        }
        root.move_past(doc);
    }
    debug!("filter: {} documents accepted", accepted.len());
    accepted
}
