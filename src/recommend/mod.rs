//! Similarity recommendations: author match, category overlap, and title
//! keyword search, merged per candidate and normalized to [0,1]. Scoring is
//! synchronous; persistence runs off-task with at most one write in flight
//! per source book.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use entities::book_recommendation;
use parking_lot::Mutex;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::domain::models::Book;
use crate::error::{HydrateError, HydrateResult};
use crate::store::{CanonicalStore, CategoryPeer, search};

pub const ALGORITHM_VERSION: i32 = 1;
const AUTHOR_SCORE: f64 = 4.0;
const CATEGORY_MAX_SCORE: f64 = 3.0;
const KEYWORD_MAX_SCORE: f64 = 2.0;
const DEFAULT_TOP_N: usize = 10;
const KEYWORD_CANDIDATES: u32 = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub target: Uuid,
    pub score: f64,
    pub reasons: Vec<String>,
}

pub struct RecommendationEngine {
    store: Arc<CanonicalStore>,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<CanonicalStore>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Compute up to `top_n` similar books for `book`. Returns immediately;
    /// callers persist separately (usually via [`persist_detached`]).
    ///
    /// [`persist_detached`]: RecommendationEngine::persist_detached
    #[tracing::instrument(level = "debug", skip_all, fields(title = %book.title))]
    pub async fn recommend(
        &self,
        book: &Book,
        top_n: Option<usize>,
    ) -> HydrateResult<Vec<Recommendation>> {
        let key = book.id.ok_or(HydrateError::NotFound)?;

        let author_peers = self.store.author_peers(key).await?;
        let category_peers = self.store.category_peers(key).await?;
        let source_categories = self.store.category_count(key).await?;

        let mut keyword_hits = Vec::new();
        if !book.title.trim().is_empty() {
            match search::search_books(
                self.store.connection(),
                &book.title,
                KEYWORD_CANDIDATES,
            )
            .await
            {
                Ok(hits) => {
                    keyword_hits = hits.into_iter().map(|h| (h.book_id, h.relevance)).collect()
                }
                Err(err) => tracing::debug!(error = %err, "keyword strategy unavailable"),
            }
        }

        Ok(merge_scores(
            key,
            &author_peers,
            &category_peers,
            source_categories,
            &keyword_hits,
            top_n.unwrap_or(DEFAULT_TOP_N),
        ))
    }

    /// Persist recommendations off-task. At most one write per source book
    /// is in flight; a second trigger while one runs is dropped.
    pub fn persist_detached(self: &Arc<Self>, source: Uuid, recommendations: Vec<Recommendation>) {
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(source) {
                tracing::debug!(book_id = %source, "recommendation persist already in flight");
                return;
            }
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = this.persist(source, &recommendations).await {
                tracing::warn!(book_id = %source, error = %err, "recommendation persist failed");
            }
            this.in_flight.lock().remove(&source);
        });
    }

    /// Replace the stored recommendation rows for `source`.
    pub async fn persist(
        &self,
        source: Uuid,
        recommendations: &[Recommendation],
    ) -> HydrateResult<()> {
        let db = self.store.connection();
        let now = Utc::now();
        book_recommendation::Entity::delete_many()
            .filter(book_recommendation::Column::SourceBookId.eq(source))
            .exec(db)
            .await?;
        for rec in recommendations {
            book_recommendation::ActiveModel {
                source_book_id: Set(source),
                target_book_id: Set(rec.target),
                score: Set(rec.score),
                reasons: Set(serde_json::to_value(&rec.reasons)?),
                algorithm_version: Set(ALGORITHM_VERSION),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
        }
        Ok(())
    }
}

/// Merge the three strategies: group by candidate, sum scores, collect
/// reasons, normalize by the best observed score, drop self, take the top N.
/// Ties break on the candidate key so output is deterministic.
pub fn merge_scores(
    source: Uuid,
    author_peers: &[Uuid],
    category_peers: &[CategoryPeer],
    source_categories: u32,
    keyword_hits: &[(Uuid, f32)],
    top_n: usize,
) -> Vec<Recommendation> {
    let mut merged: HashMap<Uuid, (f64, Vec<String>)> = HashMap::new();

    for peer in author_peers {
        let entry = merged.entry(*peer).or_default();
        entry.0 += AUTHOR_SCORE;
        entry.1.push("shared-author".to_string());
    }

    for peer in category_peers {
        let denominator = source_categories.max(peer.candidate_total).max(1) as f64;
        let score = (peer.shared as f64 / denominator) * CATEGORY_MAX_SCORE;
        if score > 0.0 {
            let entry = merged.entry(peer.book_id).or_default();
            entry.0 += score;
            entry.1.push("category-overlap".to_string());
        }
    }

    let max_relevance = keyword_hits
        .iter()
        .map(|(_, r)| *r as f64)
        .fold(0.0_f64, f64::max);
    if max_relevance > 0.0 {
        for (candidate, relevance) in keyword_hits {
            let score = (*relevance as f64 / max_relevance) * KEYWORD_MAX_SCORE;
            let entry = merged.entry(*candidate).or_default();
            entry.0 += score;
            entry.1.push("title-keywords".to_string());
        }
    }

    merged.remove(&source);

    let max_score = merged
        .values()
        .map(|(score, _)| *score)
        .fold(0.0_f64, f64::max);
    if max_score <= 0.0 {
        return Vec::new();
    }

    let mut out: Vec<Recommendation> = merged
        .into_iter()
        .map(|(target, (score, mut reasons))| {
            reasons.dedup();
            Recommendation {
                target,
                score: score / max_score,
                reasons,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.target.cmp(&b.target))
    });
    out.truncate(top_n);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn same_author_book_ranks_first() {
        // source has authors ["A"] and categories ["Fiction", "Drama"];
        // corpus: one same-author book, two category-overlapping books
        let source = uuid(1);
        let by_author = uuid(2);
        let fiction_peer = uuid(3);
        let both_categories_peer = uuid(4);

        let recommendations = merge_scores(
            source,
            &[by_author],
            &[
                CategoryPeer {
                    book_id: fiction_peer,
                    shared: 1,
                    candidate_total: 1,
                },
                CategoryPeer {
                    book_id: both_categories_peer,
                    shared: 2,
                    candidate_total: 2,
                },
            ],
            2,
            &[],
            3,
        );

        assert_eq!(recommendations.len(), 3);
        assert_eq!(recommendations[0].target, by_author);
        assert_eq!(recommendations[0].score, 1.0);
        assert!(recommendations[0].reasons.contains(&"shared-author".to_string()));
        // everything is in [0,1]
        for rec in &recommendations {
            assert!(rec.score > 0.0 && rec.score <= 1.0);
        }
        // full overlap (2/2) outranks partial (1/2)
        assert_eq!(recommendations[1].target, both_categories_peer);
    }

    #[test]
    fn self_is_excluded() {
        let source = uuid(1);
        let recommendations = merge_scores(source, &[source, uuid(2)], &[], 0, &[], 10);
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].target, uuid(2));
    }

    #[test]
    fn scores_accumulate_across_strategies() {
        let source = uuid(1);
        let candidate = uuid(2);
        let recommendations = merge_scores(
            source,
            &[candidate],
            &[CategoryPeer {
                book_id: candidate,
                shared: 1,
                candidate_total: 1,
            }],
            1,
            &[(candidate, 0.8)],
            10,
        );
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].score, 1.0);
        assert_eq!(
            recommendations[0].reasons,
            vec!["shared-author", "category-overlap", "title-keywords"]
        );
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        assert!(merge_scores(uuid(1), &[], &[], 0, &[], 10).is_empty());
    }

    #[test]
    fn deterministic_order_on_ties() {
        let a = merge_scores(uuid(1), &[uuid(5), uuid(3)], &[], 0, &[], 10);
        let b = merge_scores(uuid(1), &[uuid(3), uuid(5)], &[], 0, &[], 10);
        assert_eq!(a, b);
        assert_eq!(a[0].target, uuid(3));
    }

    #[test]
    fn top_n_truncates() {
        let peers: Vec<Uuid> = (2..20).map(uuid).collect();
        let recommendations = merge_scores(uuid(1), &peers, &[], 0, &[], 5);
        assert_eq!(recommendations.len(), 5);
    }
}
