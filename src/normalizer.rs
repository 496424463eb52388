//! Maps the upstream's loosely-typed JSON documents onto [`MediaItem`]s.
//!
//! The upstream has served the same logical media object under several
//! wrappings and field names over time. Nothing here deserializes into a
//! fixed schema: every field is probed through an ordered list of candidate
//! paths and the first present one wins, so additive or renamed fields only
//! ever degrade to "fewer items", never to a hard failure.

use crate::strategy::StrategyKind;
use crate::{MediaItem, MediaKind};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Wrappings used by the page-JSON endpoint (legacy and current).
const PAGE_JSON_MEDIA_PATHS: [&str; 2] = ["/graphql/shortcode_media", "/items/0"];

/// Wrappings used by the GraphQL endpoint (current and legacy).
const GRAPHQL_MEDIA_PATHS: [&str; 2] = ["/data/xdt_shortcode_media", "/data/shortcode_media"];

/// v1 API `media_type` value for videos.
const V1_MEDIA_TYPE_VIDEO: u64 = 2;

/// Stateless; normalization only depends on its input and the clock used
/// for filenames.
#[derive(Clone, Debug, Default)]
pub struct MediaNormalizer;

impl MediaNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Returns an empty list for any shape it does not recognize.
    pub fn normalize(&self, raw: &Value, source: StrategyKind) -> Vec<MediaItem> {
        self.normalize_at(raw, source, Utc::now())
    }

    /// Same as [`normalize`](Self::normalize) with an explicit timestamp for
    /// the generated filenames.
    pub fn normalize_at(
        &self,
        raw: &Value,
        source: StrategyKind,
        generated_at: DateTime<Utc>,
    ) -> Vec<MediaItem> {
        let Some(media) = locate_media_object(raw, source) else {
            debug!(source = %source, "No known media object path present");
            return Vec::new();
        };

        let entries: Vec<&Value> = match carousel_entries(media) {
            Some(children) => children,
            None => vec![media],
        };

        let items: Vec<MediaItem> = entries
            .into_iter()
            .filter_map(extract_entry)
            .enumerate()
            .map(|(index, entry)| MediaItem {
                filename: media_filename(entry.kind, generated_at, index + 1),
                kind: entry.kind,
                url: entry.url,
                width: entry.width,
                height: entry.height,
            })
            .collect();

        debug!(source = %source, count = items.len(), "Normalized upstream response");
        items
    }
}

/// Builds a download filename such as `instagram-video-20261019T103000123Z-01.mp4`.
///
/// The ordinal is always present so items generated within the same clock
/// tick never collide.
pub fn media_filename(kind: MediaKind, generated_at: DateTime<Utc>, ordinal: usize) -> String {
    let prefix = match kind {
        MediaKind::Video => "instagram-video",
        MediaKind::Image => "instagram-image",
    };
    format!(
        "{}-{}-{:02}.{}",
        prefix,
        generated_at.format("%Y%m%dT%H%M%S%3fZ"),
        ordinal,
        kind.extension()
    )
}

struct Entry {
    kind: MediaKind,
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

fn locate_media_object(raw: &Value, source: StrategyKind) -> Option<&Value> {
    let (native, foreign) = match source {
        StrategyKind::PageJson => (PAGE_JSON_MEDIA_PATHS, GRAPHQL_MEDIA_PATHS),
        StrategyKind::GraphQl => (GRAPHQL_MEDIA_PATHS, PAGE_JSON_MEDIA_PATHS),
    };

    native
        .iter()
        .chain(foreign.iter())
        .filter_map(|path| raw.pointer(path))
        .find(|candidate| candidate.is_object())
}

fn carousel_entries(media: &Value) -> Option<Vec<&Value>> {
    if let Some(edges) = media
        .pointer("/edge_sidecar_to_children/edges")
        .and_then(Value::as_array)
        .filter(|edges| !edges.is_empty())
    {
        return Some(edges.iter().filter_map(|edge| edge.get("node")).collect());
    }

    media
        .get("carousel_media")
        .and_then(Value::as_array)
        .filter(|children| !children.is_empty())
        .map(|children| children.iter().collect())
}

fn extract_entry(node: &Value) -> Option<Entry> {
    let video_url = video_url(node);
    let image_url = image_url(node);

    let kind = match explicit_video_flag(node) {
        Some(true) => MediaKind::Video,
        Some(false) => MediaKind::Image,
        None if video_url.is_some() => MediaKind::Video,
        None => MediaKind::Image,
    };

    let url = match kind {
        MediaKind::Video => video_url,
        MediaKind::Image => image_url,
    }?;

    let (width, height) = dimensions(node);
    Some(Entry {
        kind,
        url,
        width,
        height,
    })
}

fn explicit_video_flag(node: &Value) -> Option<bool> {
    node.get("is_video").and_then(Value::as_bool).or_else(|| {
        node.get("media_type")
            .and_then(Value::as_u64)
            .map(|media_type| media_type == V1_MEDIA_TYPE_VIDEO)
    })
}

fn video_url(node: &Value) -> Option<String> {
    non_empty_str(node.get("video_url"))
        .or_else(|| non_empty_str(node.pointer("/video_versions/0/url")))
}

fn image_url(node: &Value) -> Option<String> {
    non_empty_str(node.get("display_url"))
        .or_else(|| {
            // ascending resolution, last is the largest
            node.get("display_resources")
                .and_then(Value::as_array)
                .and_then(|resources| resources.last())
                .and_then(|resource| non_empty_str(resource.get("src")))
        })
        .or_else(|| non_empty_str(node.pointer("/image_versions2/candidates/0/url")))
}

fn dimensions(node: &Value) -> (Option<u32>, Option<u32>) {
    let structured = node.get("dimensions").map(|d| {
        (
            as_dimension(d.get("width")),
            as_dimension(d.get("height")),
        )
    });

    match structured {
        Some((Some(width), Some(height))) => (Some(width), Some(height)),
        _ => (
            as_dimension(node.get("original_width")),
            as_dimension(node.get("original_height")),
        ),
    }
}

fn as_dimension(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
