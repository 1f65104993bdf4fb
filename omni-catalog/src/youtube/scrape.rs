//! Reads videos and playlists out of the JSON blobs embedded in YouTube pages.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{Channel, Playlist, Video};
use crate::{ClientError, ClientResult};

static INITIAL_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:var ytInitialData|window\[.ytInitialData.\])\s*=\s*(\{.+?\});\s*</script>")
        .expect("valid initial data pattern")
});
static INITIAL_PLAYER_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\});\s*(?:var |</script>)")
        .expect("valid player response pattern")
});

fn embedded(pattern: &Regex, html: &str, name: &str) -> ClientResult<Value> {
    let json = pattern
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ClientError::ExtractionError(format!("{name} not found in page")))?;
    Ok(serde_json::from_str(json.as_str())?)
}

pub(super) fn initial_data(html: &str) -> ClientResult<Value> {
    embedded(&INITIAL_DATA, html, "ytInitialData")
}

pub(super) fn initial_player_response(html: &str) -> ClientResult<Value> {
    embedded(&INITIAL_PLAYER_RESPONSE, html, "ytInitialPlayerResponse")
}

/// Text fields come either as `simpleText` or as a list of `runs`.
fn text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("simpleText").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let runs = value.get("runs")?.as_array()?;
    Some(
        runs.iter()
            .filter_map(|r| r.get("text").and_then(Value::as_str))
            .collect(),
    )
}

/// Thumbnails are sorted smallest first.
fn last_thumbnail(value: &Value) -> Option<String> {
    let url = value
        .pointer("/thumbnails")?
        .as_array()?
        .last()?
        .get("url")?
        .as_str()?;
    // Channel avatars are protocol-relative.
    Some(match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    })
}

/// Parses `h:mm:ss`, `mm:ss` or `ss` into milliseconds.
pub(super) fn parse_timestamp(timestamp: &str) -> Option<u64> {
    timestamp
        .trim()
        .split(':')
        .try_fold(0u64, |acc, part| Some(acc * 60 + part.parse::<u64>().ok()?))
        .map(|secs| secs * 1000)
}

fn runs_channel(byline: &Value) -> Channel {
    let run = byline.pointer("/runs/0");
    let id = run
        .and_then(|r| r.pointer("/navigationEndpoint/browseEndpoint/browseId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Channel {
        name: run
            .and_then(|r| r.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown Channel")
            .to_string(),
        url: (!id.is_empty()).then(|| format!("https://www.youtube.com/channel/{id}")),
        id,
        icon: None,
    }
}

fn search_video(renderer: &Value) -> Option<Video> {
    let id = renderer.get("videoId")?.as_str()?.to_string();
    let mut channel = runs_channel(renderer.get("ownerText").unwrap_or(&Value::Null));
    channel.icon = renderer
        .pointer("/channelThumbnailSupportedRenderers/channelThumbnailWithLinkRenderer/thumbnail")
        .and_then(last_thumbnail);
    Some(Video {
        title: renderer
            .get("title")
            .and_then(text)
            .unwrap_or_else(|| "Unknown".to_string()),
        duration_ms: renderer
            .get("lengthText")
            .and_then(text)
            .and_then(|t| parse_timestamp(&t))
            .unwrap_or(0),
        thumbnail: renderer.get("thumbnail").and_then(last_thumbnail),
        nsfw: false,
        channel,
        id,
    })
}

pub(super) fn search_videos(data: &Value) -> Vec<Video> {
    let Some(sections) = data
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(Value::as_array)
    else {
        return vec![];
    };
    sections
        .iter()
        .filter_map(|s| s.pointer("/itemSectionRenderer/contents").and_then(Value::as_array))
        .flatten()
        .filter_map(|item| item.get("videoRenderer"))
        .filter_map(search_video)
        .collect()
}

pub(super) fn player_video(response: &Value) -> Option<Video> {
    let details = response.get("videoDetails")?;
    let id = details.get("videoId")?.as_str()?.to_string();
    let channel_id = details
        .get("channelId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Video {
        title: details
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        duration_ms: details
            .get("lengthSeconds")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(0, |secs| secs * 1000),
        thumbnail: details.get("thumbnail").and_then(last_thumbnail),
        nsfw: response
            .pointer("/microformat/playerMicroformatRenderer/isFamilySafe")
            .and_then(Value::as_bool)
            .is_some_and(|safe| !safe),
        channel: Channel {
            name: details
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Channel")
                .to_string(),
            url: (!channel_id.is_empty())
                .then(|| format!("https://www.youtube.com/channel/{channel_id}")),
            id: channel_id,
            icon: None,
        },
        id,
    })
}

pub(super) fn playlist(id: &str, data: &Value) -> Option<Playlist> {
    let metadata = data.pointer("/metadata/playlistMetadataRenderer")?;
    let videos = data
        .pointer("/contents/twoColumnBrowseResultsRenderer/tabs/0/tabRenderer/content/sectionListRenderer/contents/0/itemSectionRenderer/contents/0/playlistVideoListRenderer/contents")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("playlistVideoRenderer"))
                .filter_map(|renderer| {
                    Some(Video {
                        id: renderer.get("videoId")?.as_str()?.to_string(),
                        title: renderer
                            .get("title")
                            .and_then(text)
                            .unwrap_or_else(|| "Unknown".to_string()),
                        duration_ms: renderer
                            .get("lengthSeconds")
                            .and_then(Value::as_str)
                            .and_then(|s| s.parse::<u64>().ok())
                            .map_or(0, |secs| secs * 1000),
                        channel: runs_channel(
                            renderer.get("shortBylineText").unwrap_or(&Value::Null),
                        ),
                        thumbnail: renderer.get("thumbnail").and_then(last_thumbnail),
                        nsfw: false,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Playlist {
        id: id.to_string(),
        title: metadata
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Playlist")
            .to_string(),
        description: metadata
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        videos,
    })
}
