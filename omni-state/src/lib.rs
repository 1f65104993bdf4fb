//! The canonical, catalog-agnostic music model omni plays from, and the
//! adapters that turn each catalog's native shapes into it.
#![deny(missing_docs)]

pub use omni_catalog as oc;

mod album;
pub use album::{Album, AlbumId, ArtistRef};

mod artist;
pub use artist::{Artist, ArtistId};

mod playlist;
pub use playlist::Playlist;

mod provider;
pub use provider::{Provider, SearchOptions};

mod repeat_mode;
pub use repeat_mode::RepeatMode;

mod search;
pub use search::{SearchItems, SearchResult, SearchResultKind, TopKind, TopResult, rank_top};

mod track;
pub use track::{AlbumRef, Source, Track, TrackArtist, TrackData, TrackId, TrackKey, TrackMetadata};
