use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::state::{Playlist, RepeatMode, Track, TrackId};

/// Something that can be added to a queue.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Track(Track),
    Playlist(Playlist),
}
impl From<Track> for QueueItem {
    fn from(track: Track) -> Self {
        QueueItem::Track(track)
    }
}
impl From<Playlist> for QueueItem {
    fn from(playlist: Playlist) -> Self {
        QueueItem::Playlist(playlist)
    }
}

/// The ordered tracks of one playback, with its repeat and shuffle policy.
///
/// Map order is play order. Every track carries its current position in
/// `index` and its insertion position in `ogidx`, so shuffling can be undone.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: IndexMap<TrackId, Track>,
    current: Option<TrackId>,
    // Where the cursor track stood before it was removed.
    vacated: Option<usize>,
    repeat: RepeatMode,
    shuffled: bool,
    next_ogidx: usize,
}

/// A serializable view of a queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub tracks: Vec<Track>,
    pub current: Option<Track>,
    pub next: Option<Track>,
    pub previous: Option<Track>,
    pub repeat: RepeatMode,
    pub shuffled: bool,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track or every track of a playlist, stamping each with
    /// `requester`.
    ///
    /// Returns the first track of the item. A track that is already queued is
    /// not added again; the queued copy is returned instead.
    pub fn add(&mut self, item: impl Into<QueueItem>, requester: Option<&str>) -> Option<Track> {
        let tracks = match item.into() {
            QueueItem::Track(track) => vec![track],
            QueueItem::Playlist(playlist) => playlist.tracks,
        };

        let mut first = None;
        for mut track in tracks {
            if let Some(existing) = self.tracks.get(&track.id) {
                first.get_or_insert_with(|| existing.clone());
                continue;
            }
            track.index = Some(self.tracks.len());
            track.ogidx = Some(self.next_ogidx);
            track.requester = requester.map(str::to_string);
            self.next_ogidx += 1;
            first.get_or_insert_with(|| track.clone());
            self.tracks.insert(track.id.clone(), track);
        }
        first
    }

    /// The track at position `index`.
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get_index(index).map(|(_, track)| track)
    }

    pub fn get_by_id(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.get_index_of(id)
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref().and_then(|id| self.tracks.get(id))
    }

    /// Replaces the queued copy of `track`, keeping its position, original
    /// position and requester. Returns false if the track is not queued.
    pub fn update(&mut self, mut track: Track) -> bool {
        let Some(queued) = self.tracks.get_mut(&track.id) else {
            return false;
        };
        track.index = queued.index;
        track.ogidx = queued.ogidx;
        track.requester = queued.requester.take();
        *queued = track;
        true
    }

    /// Moves the cursor to `id`. Returns false if the track is not queued.
    pub fn set_current(&mut self, id: &TrackId) -> bool {
        if !self.tracks.contains_key(id) {
            return false;
        }
        self.current = Some(id.clone());
        self.vacated = None;
        true
    }

    /// The track after the cursor, honoring the repeat mode. Does not move
    /// the cursor.
    pub fn next(&self) -> Option<&Track> {
        let Some(position) = self.cursor_position() else {
            // Whatever moved into a removed cursor's place comes next.
            let position = self.vacated.unwrap_or(0);
            return match self.repeat {
                RepeatMode::Queue if !self.tracks.is_empty() => {
                    self.get(position % self.tracks.len())
                }
                _ => self.get(position),
            };
        };
        match self.repeat {
            RepeatMode::Track => self.get(position),
            RepeatMode::Queue => self.get((position + 1) % self.tracks.len()),
            RepeatMode::Off => self.get(position + 1),
        }
    }

    /// The track before the cursor, honoring the repeat mode. Does not move
    /// the cursor.
    pub fn previous(&self) -> Option<&Track> {
        let Some(position) = self.cursor_position() else {
            return match (self.repeat, self.vacated?) {
                (RepeatMode::Queue, 0) => self.tracks.len().checked_sub(1).and_then(|i| self.get(i)),
                (_, 0) => None,
                (_, vacated) => self.get(vacated - 1),
            };
        };
        match (self.repeat, position) {
            (RepeatMode::Track, _) => self.get(position),
            (RepeatMode::Queue, 0) => self.get(self.tracks.len() - 1),
            (RepeatMode::Off, 0) => None,
            (_, _) => self.get(position - 1),
        }
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Randomizes play order. The current track, if any, is moved to the
    /// front so the rest of the queue still follows it.
    pub fn shuffle(&mut self) {
        let mut entries: Vec<_> = std::mem::take(&mut self.tracks).into_iter().collect();
        entries.shuffle(&mut rand::rng());
        self.tracks = entries.into_iter().collect();
        if let Some(position) = self.cursor_position() {
            self.tracks.move_index(position, 0);
        }
        self.shuffled = true;
        self.vacated = None;
        self.restamp();
    }

    /// Restores insertion order.
    pub fn reorder(&mut self) {
        self.tracks.sort_by(|_, a, _, b| a.ogidx.cmp(&b.ogidx));
        self.shuffled = false;
        self.vacated = None;
        self.restamp();
    }

    /// Removes the track at `index`. Removing the cursor track clears the
    /// cursor but keeps its place, so `next` still moves forward from there.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        let (id, track) = self.tracks.shift_remove_index(index)?;
        if self.current.as_ref() == Some(&id) {
            self.current = None;
            self.vacated = Some(index);
        } else if let Some(vacated) = self.vacated.as_mut().filter(|v| index < **v) {
            *vacated -= 1;
        }
        self.restamp();
        Some(track)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.vacated = None;
        self.shuffled = false;
        self.next_ogidx = 0;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.tracks().cloned().collect(),
            current: self.current().cloned(),
            next: self.next().cloned(),
            previous: self.previous().cloned(),
            repeat: self.repeat,
            shuffled: self.shuffled,
        }
    }

    fn cursor_position(&self) -> Option<usize> {
        self.current.as_ref().and_then(|id| self.tracks.get_index_of(id))
    }

    fn restamp(&mut self) {
        for (index, track) in self.tracks.values_mut().enumerate() {
            track.index = Some(index);
        }
    }
}
