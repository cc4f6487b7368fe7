//! The durable record of uploaded media and the draft submitted as a post.

use serde::{Deserialize, Serialize};

use crate::models::media::MediaKind;

/// One successfully uploaded file, as the backend post record expects it.
///
/// Produced only after the corresponding session completed; collected in
/// file-selection order.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadManifestEntry {
    /// Public URL of the stored object.
    pub url: String,

    /// Object key within the bucket.
    pub key: String,

    /// Declared MIME type of the source file.
    pub mime: String,

    /// Coarse classification (image/video).
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Pixel width.
    pub width: u32,

    /// Pixel height.
    pub height: u32,
}

/// A taggable entity as returned by the tag-search endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaggedEntity {
    pub name: String,

    #[serde(rename = "type")]
    pub entity_type: String,

    pub entity_id: String,

    /// Avatar or cover image URL.
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Everything the backend needs to create the post.
///
/// Immutable once submission starts.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PostDraft {
    /// Authenticated user on whose behalf the post is created.
    pub user_id: String,

    /// Caption text; empty when the user wrote none.
    #[serde(default)]
    pub caption: String,

    /// Free-text location.
    pub location: Option<String>,

    /// Entities the user tagged.
    pub tagged_entities: Vec<TaggedEntity>,

    /// Uploaded media, in selection order.
    pub media: Vec<UploadManifestEntry>,
}
