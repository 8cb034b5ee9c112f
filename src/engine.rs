//! # Recommendation Engine
//!
//! Turns a [`RecommendationContext`] into an ordered list of [`MediaItem`]s.
//!
//! ## Pipeline
//!
//! 1. **Seed resolution**: explicit seed ids, the current track, the mood
//!    (a `Vibe` node with that label) and the time of day (a `Vibe` node named
//!    after the bucket). Ids the graph does not know are dropped.
//! 2. **Graph ranking**: [`crate::algorithm::rank`] over the shared graph; each
//!    ranked song becomes a `MediaItem` owned by the song's origin service.
//! 3. **Service fallback**: when the graph yields nothing (cold start, isolated
//!    seed) the active service is asked directly, then every other service in
//!    registration order. The first non-empty answer wins.
//!
//! A fresh process with an empty graph therefore still answers, as long as any
//! registered service does.

use crate::algorithm::{self, RankingConfig};
use crate::error::ServiceError;
use crate::graph::{EdgeType, MediaGraph, NodeType, SharedGraph};
use crate::media::{MediaItem, RecommendationContext};
use crate::registry::ServiceRegistry;
use crate::services::MediaService;
use crate::sync::SessionState;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

/// Where a [`RecommendationSet`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendationSource {
    Graph,
    Fallback { service_id: String },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSet {
    pub items: Vec<MediaItem>,
    pub source: RecommendationSource,
}

impl RecommendationSet {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            source: RecommendationSource::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct RecommendationEngine {
    graph: SharedGraph,
    registry: Arc<ServiceRegistry>,
    ranking: RankingConfig,
    service_timeout: Duration,
}

impl RecommendationEngine {
    pub fn new(graph: SharedGraph, registry: Arc<ServiceRegistry>) -> Self {
        let service_timeout = registry.service_timeout();
        Self {
            graph,
            registry,
            ranking: RankingConfig::default(),
            service_timeout,
        }
    }

    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    #[must_use]
    pub fn with_service_timeout(mut self, service_timeout: Duration) -> Self {
        self.service_timeout = service_timeout;
        self
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Recommend for `context`, from the graph if it has an answer and from the
    /// services otherwise.
    ///
    /// The graph-or-services decision is made on the full ranking; the limit
    /// only trims whichever answer won. A limit of zero never reaches a service.
    pub async fn recommend(&self, context: &RecommendationContext) -> RecommendationSet {
        let mut items = self.ranked_items(context);
        if !items.is_empty() {
            log::debug!("Graph produced {} recommendations", items.len());
            if let Some(limit) = context.limit {
                items.truncate(limit);
            }
            return RecommendationSet {
                items,
                source: RecommendationSource::Graph,
            };
        }

        if context.limit == Some(0) {
            return RecommendationSet::empty();
        }

        log::debug!("Graph has no candidates, asking services");
        match self.fallback(context).await {
            Some(set) => set,
            None => RecommendationSet::empty(),
        }
    }

    /// Like [`Self::recommend`], seeded by whatever the poller last saw playing.
    pub async fn recommend_for_session(
        &self,
        state: &SessionState,
        context: &RecommendationContext,
    ) -> RecommendationSet {
        let mut context = context.clone();
        if context.current_track.is_none() {
            context.current_track = state.now_playing.as_ref().map(|p| p.item_id.clone());
        }
        self.recommend(&context).await
    }

    /// Graph-only recommendations. Never touches a service.
    pub fn rank_items(&self, context: &RecommendationContext) -> Vec<MediaItem> {
        let mut items = self.ranked_items(context);
        if let Some(limit) = context.limit {
            items.truncate(limit);
        }
        items
    }

    fn ranked_items(&self, context: &RecommendationContext) -> Vec<MediaItem> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        let seeds = resolve_seeds(&graph, context);
        if seeds.is_empty() {
            return Vec::new();
        }

        algorithm::rank(&graph, &seeds, &self.ranking)
            .into_iter()
            .filter_map(|scored| song_item(&graph, &scored.id))
            .collect()
    }

    /// Services to ask, active first.
    fn fallback_order(&self) -> Vec<Arc<dyn MediaService>> {
        let mut order = Vec::new();
        let active = self.registry.active();
        if let Some(active) = &active {
            order.push(Arc::clone(active));
        }
        order.extend(
            self.registry
                .get_all()
                .into_iter()
                .filter(|s| active.as_ref().map_or(true, |a| a.id() != s.id())),
        );
        order
    }

    async fn fallback(&self, context: &RecommendationContext) -> Option<RecommendationSet> {
        for service in self.fallback_order() {
            let id = service.id().to_string();
            let answer =
                tokio::time::timeout(self.service_timeout, service.get_recommendations(context))
                    .await
                    .unwrap_or_else(|_| Err(ServiceError::timeout(&id, self.service_timeout)));

            match answer {
                Ok(mut items) if !items.is_empty() => {
                    if let Some(limit) = context.limit {
                        items.truncate(limit);
                    }
                    log::debug!("Fallback to `{id}' produced {} items", items.len());
                    return Some(RecommendationSet {
                        items,
                        source: RecommendationSource::Fallback { service_id: id },
                    });
                }
                Ok(_) => log::debug!("Service `{id}' had no recommendations"),
                Err(e) if e.is_transient() => log::info!("Skipping `{id}' for now: {e}"),
                Err(e) => log::warn!("Service `{id}' failed to recommend: {e}"),
            }
        }
        None
    }
}

/// Graph node ids the context points at, in context order, without duplicates.
pub fn resolve_seeds(graph: &MediaGraph, context: &RecommendationContext) -> Vec<String> {
    let mut seeds: Vec<String> = Vec::new();
    let mut push = |id: &str| {
        if graph.contains(id) && !seeds.iter().any(|s| s == id) {
            seeds.push(id.to_string());
        }
    };

    for seed in &context.seeds {
        push(seed);
    }
    if let Some(track) = &context.current_track {
        push(track);
    }
    if let Some(vibe) = context
        .mood
        .as_deref()
        .and_then(|mood| graph.find_by_label(NodeType::Vibe, mood))
    {
        push(&vibe.id);
    }
    if let Some(vibe) = context
        .time_of_day
        .and_then(|time| graph.find_by_label(NodeType::Vibe, time.label()))
    {
        push(&vibe.id);
    }

    seeds
}

fn song_item(graph: &MediaGraph, id: &str) -> Option<MediaItem> {
    let node = graph.node(id)?;
    let artist = graph
        .neighbors(id, &[EdgeType::Related])
        .into_iter()
        .find(|n| n.node.node_type == NodeType::Artist)
        .map(|n| n.node.label.clone());

    let item = MediaItem::track(&node.origin, &node.id, &node.label);
    Some(match artist {
        Some(artist) => item.with_artist(artist),
        None => item,
    })
}
