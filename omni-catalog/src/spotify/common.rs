use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
/// An image attached to an album, artist or playlist.
pub struct Image {
    /// The source URL.
    pub url: String,
    /// Height in pixels, if known.
    pub height: Option<u32>,
    /// Width in pixels, if known.
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
/// Links to the entity outside the API.
pub struct ExternalUrls {
    /// The open.spotify.com link.
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// One page of a paginated listing.
pub struct Paging<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// The total number of items across every page.
    pub total: u32,
    /// The URL of the next page, if there is one.
    pub next: Option<String>,
    /// The offset this page starts at.
    #[serde(default)]
    pub offset: u32,
}

/// Picks the largest image, which is the first one Spotify returns.
pub fn largest_image(images: &[Image]) -> Option<&str> {
    images.first().map(|i| i.url.as_str())
}
