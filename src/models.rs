mod attachment;
mod group;
mod ids;
mod link_type;
mod note;
mod note_link;
mod note_tag;
mod tag;

pub use attachment::{Attachment, NewAttachment};
pub use group::{
    DEFAULT_GROUP_COLOR, DEFAULT_GROUP_ICON, DEFAULT_GROUP_NAME, DEFAULT_GROUP_OWN_ICON, Group,
    GroupUpdate, NewGroup,
};
pub use ids::{AttachmentId, GroupId, LinkId, NoteId, TagId, UserId};
pub use link_type::{LinkType, ParseLinkTypeError};
pub use note::{NewNote, Note, NoteBuilder};
pub use note_link::{MAX_WEIGHT, MIN_WEIGHT, NoteLink, clamp_weight};
pub use note_tag::NoteTag;
pub use tag::{NewTag, Tag, TagUpdate};
