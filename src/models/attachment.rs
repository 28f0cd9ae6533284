use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{AttachmentId, NoteId};

/// Metadata for a file attached to a note.
///
/// File bytes live in external storage; only the pointer is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub note_id: NoteId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for recording an attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAttachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: String,
}
