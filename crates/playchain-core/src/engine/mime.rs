use crate::types::{DASH_EXTENSION, HLS_EXTENSION, WEBRTC_EXTENSION};

/// MIME type hint handed to an engine for a resource extension
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "mp4" | "mov" | "avi" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mp3" => Some("audio/mpeg"),
        HLS_EXTENSION => Some("application/x-mpegURL"),
        DASH_EXTENSION => Some("application/dash+xml"),
        WEBRTC_EXTENSION => Some("video/webrtc"),
        _ => None,
    }
}
