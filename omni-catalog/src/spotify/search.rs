use serde::Deserialize;

use super::{Artist, Client, Paging, SimplifiedAlbum, Track};
use crate::{ClientResult, EntityKind};

#[derive(Debug, Clone)]
/// A search against the Spotify catalog.
pub struct SearchRequest {
    /// The query text.
    pub query: String,
    /// The entity kinds to search for.
    pub kinds: Vec<EntityKind>,
    /// Results per kind.
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
/// The result of a search. Only the requested kinds are present.
pub struct SearchResponse {
    /// Matching tracks.
    pub tracks: Option<Paging<Track>>,
    /// Matching albums.
    pub albums: Option<Paging<SimplifiedAlbum>>,
    /// Matching artists.
    pub artists: Option<Paging<Artist>>,
}

impl Client {
    /// Search the catalog.
    pub async fn search(&self, request: &SearchRequest) -> ClientResult<SearchResponse> {
        let kinds = request
            .kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",");
        self.request(
            "search",
            &[
                ("q", request.query.clone()),
                ("type", kinds),
                ("limit", request.limit.to_string()),
            ],
        )
        .await
    }
}
