use serde::{Deserialize, Serialize};

use crate::{Album, Artist, Playlist, Track};

/// What a [`SearchResult`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchResultKind {
    /// A single resolved track.
    Track,
    /// A single resolved album.
    Album,
    /// A single resolved playlist.
    Playlist,
    /// A single resolved artist.
    Artist,
    /// A set of search hits.
    Search,
    /// Search hits plus a best guess across entity types.
    Top,
}

/// The entities in a [`SearchResult`]. Only the relevant lists are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchItems {
    /// Matching tracks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Track>,
    /// Matching playlists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub playlists: Vec<Playlist>,
    /// Matching albums.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub albums: Vec<Album>,
    /// Matching artists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,
    /// The best guess, for [`SearchResultKind::Top`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<TopResult>,
}

/// The canonical result of a search or a URL resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// What the result holds.
    #[serde(rename = "type")]
    pub kind: SearchResultKind,
    /// The entities.
    pub items: SearchItems,
}
impl SearchResult {
    /// A result holding a single track.
    pub fn track(track: Track) -> Self {
        SearchResult {
            kind: SearchResultKind::Track,
            items: SearchItems {
                tracks: vec![track],
                ..Default::default()
            },
        }
    }

    /// A result holding a single album.
    pub fn album(album: Album) -> Self {
        SearchResult {
            kind: SearchResultKind::Album,
            items: SearchItems {
                albums: vec![album],
                ..Default::default()
            },
        }
    }

    /// A result holding a single playlist.
    pub fn playlist(playlist: Playlist) -> Self {
        SearchResult {
            kind: SearchResultKind::Playlist,
            items: SearchItems {
                playlists: vec![playlist],
                ..Default::default()
            },
        }
    }

    /// A result holding a single artist.
    pub fn artist(artist: Artist) -> Self {
        SearchResult {
            kind: SearchResultKind::Artist,
            items: SearchItems {
                artists: vec![artist],
                ..Default::default()
            },
        }
    }

    /// A set of search hits.
    pub fn search(items: SearchItems) -> Self {
        SearchResult {
            kind: SearchResultKind::Search,
            items,
        }
    }

    /// Every track in the result, including those nested in albums and playlists.
    pub fn all_tracks(&self) -> impl Iterator<Item = &Track> {
        self.items
            .tracks
            .iter()
            .chain(self.items.albums.iter().flat_map(|a| a.tracks.iter()))
            .chain(self.items.playlists.iter().flat_map(|p| p.tracks.iter()))
    }
}

/// The entity types a top result can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopKind {
    /// An album.
    Album,
    /// An artist.
    Artist,
    /// A track.
    Track,
}
impl TopKind {
    /// How much the kind scales popularity when ranking.
    pub fn priority(&self) -> f64 {
        match self {
            TopKind::Album => 1.25,
            TopKind::Artist => 1.2,
            TopKind::Track => 1.15,
        }
    }
}

/// A best guess across entity types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopResult {
    /// The entity type.
    #[serde(rename = "type")]
    pub kind: TopKind,
    /// The entity ID.
    pub id: String,
    /// The entity name.
    pub name: String,
    /// The catalog popularity.
    pub popularity: u32,
}
impl TopResult {
    fn weighted(&self) -> f64 {
        self.popularity as f64 * self.kind.priority()
    }
}

/// Pick the best guess among the leading track, album and artist hits.
///
/// Candidates whose name contains the query (case-insensitively) are preferred
/// over the rest; among the pool, the highest priority-weighted popularity
/// wins, and ties go to the earlier candidate.
pub fn rank_top(query: &str, candidates: Vec<TopResult>) -> Option<TopResult> {
    let query = query.to_lowercase();
    let (matching, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.name.to_lowercase().contains(&query));
    let pool = if matching.is_empty() { rest } else { matching };
    pool.into_iter().fold(None, |best: Option<TopResult>, candidate| match best {
        Some(best) if best.weighted() >= candidate.weighted() => Some(best),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(kind: TopKind, name: &str, popularity: u32) -> TopResult {
        TopResult {
            kind,
            id: name.to_lowercase(),
            name: name.to_string(),
            popularity,
        }
    }

    #[test]
    fn test_matching_names_outrank_popularity() {
        let top = rank_top(
            "discovery",
            vec![
                candidate(TopKind::Track, "One More Time", 90),
                candidate(TopKind::Album, "Discovery", 60),
                candidate(TopKind::Artist, "Daft Punk", 95),
            ],
        )
        .unwrap();
        assert_eq!(top.kind, TopKind::Album);
    }

    #[test]
    fn test_weighted_popularity_breaks_ties_between_matches() {
        // 80 * 1.15 = 92 for the track, 75 * 1.25 = 93.75 for the album.
        let top = rank_top(
            "daft",
            vec![
                candidate(TopKind::Track, "Daft Punk Is Playing", 80),
                candidate(TopKind::Album, "Daft Club", 75),
                candidate(TopKind::Artist, "Justice", 99),
            ],
        )
        .unwrap();
        assert_eq!(top.name, "Daft Club");
    }

    #[test]
    fn test_no_match_ranks_everything() {
        let top = rank_top(
            "zzz",
            vec![
                candidate(TopKind::Track, "A", 50),
                candidate(TopKind::Album, "B", 40),
                candidate(TopKind::Artist, "C", 45),
            ],
        )
        .unwrap();
        // 50 * 1.15 = 57.5, 40 * 1.25 = 50, 45 * 1.2 = 54
        assert_eq!(top.kind, TopKind::Track);
    }

    #[test]
    fn test_equal_scores_keep_first() {
        let top = rank_top(
            "x",
            vec![
                candidate(TopKind::Track, "x1", 0),
                candidate(TopKind::Album, "x2", 0),
            ],
        )
        .unwrap();
        assert_eq!(top.kind, TopKind::Track);
        assert_eq!(rank_top("x", vec![]), None);
    }
}
