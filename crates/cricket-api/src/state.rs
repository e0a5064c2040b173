use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use cricket_core::{
    FeedConfig, HttpLoader, LoadError, Loader, MatchFetcher, PlaybackSession, PlayerConfig,
    ResolverConfig, StreamResolver,
};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<MatchFetcher>,
    pub resolver: Arc<StreamResolver>,
    pub loader: Arc<dyn Loader>,
    pub player_config: PlayerConfig,
    pub sessions: Arc<DashMap<Uuid, Arc<PlaybackSession>>>,
}

impl AppState {
    /// One loader shared by the fetcher, the resolver, and every session.
    pub fn new(
        feed: FeedConfig,
        resolver: ResolverConfig,
        player: PlayerConfig,
        loader: Arc<dyn Loader>,
    ) -> Self {
        Self {
            fetcher: Arc::new(MatchFetcher::new(feed, Arc::clone(&loader))),
            resolver: Arc::new(StreamResolver::new(resolver, Arc::clone(&loader))),
            loader,
            player_config: player,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn from_configs(
        feed: FeedConfig,
        resolver: ResolverConfig,
        player: PlayerConfig,
    ) -> Result<Self, LoadError> {
        let loader: Arc<dyn Loader> = Arc::new(HttpLoader::from_config(&feed)?);
        Ok(Self::new(feed, resolver, player, loader))
    }

    pub fn session(&self, id: &Uuid) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(id).map(|r| Arc::clone(r.value()))
    }
}
