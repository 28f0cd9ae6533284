pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod graph_query;
pub mod groups;
pub mod links;
pub mod models;
pub mod service;
pub mod tags;
pub mod utils;

pub use config::GraphConfig;
pub use db::Database;
pub use error::{NoteGraphError, Result};
pub use graph::LinkGraph;
pub use graph_query::{
    GraphEdge, GraphNode, GraphQuery, GraphStats, GraphView, HubNode, LinkSummary, NodeView,
    NoteFilter,
};
pub use groups::{GroupForest, GroupHierarchy};
pub use links::NoteLinkGraph;
pub use models::{
    Attachment, AttachmentId, Group, GroupId, GroupUpdate, LinkId, LinkType, NewAttachment,
    NewGroup, NewNote, NewTag, Note, NoteBuilder, NoteId, NoteLink, NoteTag, Tag, TagId,
    TagUpdate, UserId,
};
pub use service::{ListNotesOptions, NoteService, SortOrder, TagMatch};
pub use tags::TagScopeResolver;
