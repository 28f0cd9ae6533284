use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notegraph::utils::{get_database_path, open_database, parse_tags};
use notegraph::{
    Database, GraphConfig, GroupId, LinkId, LinkType, ListNotesOptions, NewGroup, NewNote, NewTag,
    NoteFilter, NoteGraphError, NoteId, NoteService, SortOrder, TagId, TagMatch, UserId,
};
use tracing_subscriber::EnvFilter;

/// notegraph - hierarchical notes with a typed link graph
#[derive(Parser)]
#[command(name = "notegraph")]
#[command(about = "Organize notes in groups, tag them, and explore the links between them")]
#[command(version)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true, env = "NOTEGRAPH_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, env = "NOTEGRAPH_USER", default_value_t = 1)]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list and organize notes
    #[command(subcommand)]
    Note(NoteCommand),
    /// Manage the group hierarchy
    #[command(subcommand)]
    Group(GroupCommand),
    /// Manage global and group-scoped tags
    #[command(subcommand)]
    Tag(TagCommand),
    /// Create and remove links between notes
    #[command(subcommand)]
    Link(LinkCommand),
    /// Traverse and summarize the link graph
    #[command(subcommand)]
    Graph(GraphCommand),
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Add a new note
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        content: String,
        /// Group id; defaults to the "Default" group
        #[arg(short, long)]
        group: Option<i64>,
        /// Comma-separated tags to apply to the note
        #[arg(short, long, value_name = "TAGS")]
        tags: Option<String>,
    },
    /// List notes, newest first
    List {
        #[arg(short, long)]
        group: Option<i64>,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Oldest first
        #[arg(long)]
        oldest: bool,
    },
    /// Show a note with its tags
    Show { id: i64 },
    /// Delete a note with its links and tag associations
    Delete { id: i64 },
    /// Move a note to another group
    Move { id: i64, group: i64 },
    /// Tag a note, creating tags in the note's group as needed
    Tag {
        id: i64,
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Create a group
    Create {
        name: String,
        #[arg(short, long)]
        parent: Option<i64>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Move a group under a new parent, or to the root when omitted
    Move {
        id: i64,
        #[arg(short, long)]
        parent: Option<i64>,
    },
    /// Delete an empty group
    Delete { id: i64 },
    /// Print the group tree with note counts
    Tree,
}

#[derive(Subcommand)]
enum TagCommand {
    /// Create a tag, globally or in a group
    Create {
        name: String,
        #[arg(short, long)]
        group: Option<i64>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        key: bool,
    },
    /// Move a tag into a group, or make it global when omitted
    Move {
        id: i64,
        #[arg(short, long)]
        group: Option<i64>,
    },
    /// Make a tag global
    Global { id: i64 },
    /// List tags visible from a group, or all tags
    List {
        #[arg(short, long)]
        group: Option<i64>,
    },
    /// Most used tags visible from a group
    Popular {
        #[arg(short, long)]
        group: Option<i64>,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Visible tags no note uses
    Unused {
        #[arg(short, long)]
        group: Option<i64>,
    },
}

#[derive(Args)]
struct LinkSpec {
    source: i64,
    target: i64,
    #[arg(short = 't', long = "type", default_value = "RELATES_TO")]
    link_type: LinkType,
    #[arg(short, long, default_value_t = 1)]
    weight: i32,
}

#[derive(Subcommand)]
enum LinkCommand {
    /// Link SOURCE to TARGET
    Add(LinkSpec),
    /// Link two notes in both directions
    Bidi(LinkSpec),
    /// Remove a link by id
    Remove { id: i64 },
    /// List links touching a note
    List { note: i64 },
}

#[derive(Subcommand)]
enum GraphCommand {
    /// Notes reachable from a note
    Connected {
        note: i64,
        #[arg(short, long, default_value_t = 2)]
        depth: usize,
    },
    /// Shortest path between two notes
    Path { from: i64, to: i64 },
    /// Most connected notes
    Hubs {
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Notes without links
    Orphans,
    /// Link type histogram and totals
    Stats,
    /// One note with its links, as JSON
    Node { id: i64 },
    /// Nodes and edges of a filtered subgraph, as JSON
    Export {
        #[arg(short, long)]
        group: Option<i64>,
        /// Include notes of all subgroups
        #[arg(long)]
        sub_groups: bool,
        /// Comma-separated tag filter
        #[arg(short, long, value_name = "TAGS")]
        tags: Option<String>,
        /// Require every tag instead of any
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("NOTEGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// User errors are domain validation failures; everything else is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<NoteGraphError>())
        .is_some_and(NoteGraphError::is_user_error)
}

fn run(cli: &Cli) -> Result<()> {
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => get_database_path()?,
    };
    let db = open_database(&db_path)?;
    execute(db, UserId::new(cli.user), &cli.command)
}

/// Executes a command against a provided database.
///
/// Separated from `run` to allow testing with in-memory databases.
fn execute(db: Database, user: UserId, command: &Commands) -> Result<()> {
    let service = NoteService::with_config(db, GraphConfig::from_env());
    match command {
        Commands::Note(cmd) => note_command(&service, user, cmd),
        Commands::Group(cmd) => group_command(&service, user, cmd),
        Commands::Tag(cmd) => tag_command(&service, user, cmd),
        Commands::Link(cmd) => link_command(&service, user, cmd),
        Commands::Graph(cmd) => graph_command(&service, user, cmd),
    }
}

fn note_command(service: &NoteService, user: UserId, cmd: &NoteCommand) -> Result<()> {
    match cmd {
        NoteCommand::Add {
            title,
            content,
            group,
            tags,
        } => {
            let mut spec = NewNote::new(title.as_str(), content.as_str())
                .with_tags(tags.as_deref().map(parse_tags).unwrap_or_default());
            spec.group_id = group.map(GroupId::new);
            let note = service
                .create_note(user, spec)
                .context("Failed to create note")?;
            println!("Note created (id: {}, group: {})", note.id(), note.group_id());
        }
        NoteCommand::List {
            group,
            limit,
            oldest,
        } => {
            let options = ListNotesOptions {
                limit: *limit,
                group: group.map(GroupId::new),
                order: if *oldest {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                },
            };
            for note in service.list_notes(user, options)? {
                println!("{:>5}  {}  (group {})", note.id(), note.title(), note.group_id());
            }
        }
        NoteCommand::Show { id } => {
            let id = NoteId::new(*id);
            let note = service
                .get_note(user, id)?
                .ok_or_else(|| NoteGraphError::NotFound { entity: "Note", id: id.get() })?;
            let tags: Vec<String> = service
                .tags_of_note(user, id)?
                .iter()
                .map(|t| t.name().to_string())
                .collect();
            let path = service.groups().full_name(user, note.group_id())?;
            println!("# {}", note.title());
            println!("group: {path}");
            if !tags.is_empty() {
                println!("tags: {}", tags.join(", "));
            }
            if !note.content().is_empty() {
                println!();
                println!("{}", note.content());
            }
        }
        NoteCommand::Delete { id } => {
            service.delete_note(user, NoteId::new(*id))?;
            println!("Note {id} deleted");
        }
        NoteCommand::Move { id, group } => {
            let note = service.assign_note_to_group(user, NoteId::new(*id), GroupId::new(*group))?;
            println!("Note {} moved to group {}", note.id(), note.group_id());
        }
        NoteCommand::Tag { id, names } => {
            for name in names {
                let tag = service.tag_note(user, NoteId::new(*id), name)?;
                println!("Tagged note {id} with '{}' (tag {})", tag.name(), tag.id());
            }
        }
    }
    Ok(())
}

fn group_command(service: &NoteService, user: UserId, cmd: &GroupCommand) -> Result<()> {
    let groups = service.groups();
    match cmd {
        GroupCommand::Create {
            name,
            parent,
            description,
            color,
            icon,
        } => {
            let mut spec = NewGroup::new(name.as_str());
            spec.parent_id = parent.map(GroupId::new);
            spec.description = description.clone();
            if color.is_some() {
                spec.color = color.clone();
            }
            spec.icon = icon.clone();
            let group = groups.create_group(user, spec)?;
            println!("Group created (id: {})", group.id);
        }
        GroupCommand::Move { id, parent } => {
            let group = groups.move_group(user, GroupId::new(*id), parent.map(GroupId::new))?;
            println!("Group moved: {}", groups.full_name(user, group.id)?);
        }
        GroupCommand::Delete { id } => {
            groups.delete_group(user, GroupId::new(*id))?;
            println!("Group {id} deleted");
        }
        GroupCommand::Tree => {
            let counts: std::collections::HashMap<GroupId, i64> = groups
                .groups_with_note_counts(user)?
                .into_iter()
                .map(|(g, n)| (g.id, n))
                .collect();
            for root in groups.root_groups(user)? {
                print_group(service, user, &root, 0, &counts)?;
            }
        }
    }
    Ok(())
}

fn print_group(
    service: &NoteService,
    user: UserId,
    group: &notegraph::Group,
    depth: usize,
    counts: &std::collections::HashMap<GroupId, i64>,
) -> Result<()> {
    let notes = counts.get(&group.id).copied().unwrap_or(0);
    println!("{}{} [{}] ({notes} notes)", "  ".repeat(depth), group.name, group.id);
    for child in service.groups().sub_groups_of(user, group.id)? {
        print_group(service, user, &child, depth + 1, counts)?;
    }
    Ok(())
}

fn tag_command(service: &NoteService, user: UserId, cmd: &TagCommand) -> Result<()> {
    let tags = service.tags();
    let print_tag = |tag: &notegraph::Tag| {
        let scope = tag
            .group_id()
            .map(|g| format!("group {g}"))
            .unwrap_or_else(|| "global".to_string());
        println!("{:>5}  {}  ({scope})", tag.id(), tag.name());
    };

    match cmd {
        TagCommand::Create {
            name,
            group,
            color,
            key,
        } => {
            let mut spec = NewTag::new(name.as_str());
            spec.color = color.clone();
            spec.is_key = *key;
            let tag = tags.create_in_scope(user, spec, group.map(GroupId::new))?;
            print_tag(&tag);
        }
        TagCommand::Move { id, group } => {
            let tag = tags.move_to_group(user, TagId::new(*id), group.map(GroupId::new))?;
            print_tag(&tag);
        }
        TagCommand::Global { id } => {
            let tag = tags.make_tag_global(user, TagId::new(*id))?;
            print_tag(&tag);
        }
        TagCommand::List { group } => {
            for tag in tags.tags_visible_in(user, group.map(GroupId::new))? {
                print_tag(&tag);
            }
        }
        TagCommand::Popular { group, limit } => {
            for (tag, uses) in tags
                .popular_in(user, group.map(GroupId::new))?
                .into_iter()
                .take(*limit)
            {
                println!("{uses:>5}  {}", tag.name());
            }
        }
        TagCommand::Unused { group } => {
            for tag in tags.unused_in(user, group.map(GroupId::new))? {
                print_tag(&tag);
            }
        }
    }
    Ok(())
}

fn link_command(service: &NoteService, user: UserId, cmd: &LinkCommand) -> Result<()> {
    let links = service.links();
    match cmd {
        LinkCommand::Add(spec) => {
            let link = links.create_link(
                user,
                NoteId::new(spec.source),
                NoteId::new(spec.target),
                spec.link_type,
                spec.weight,
            )?;
            println!("Link created (id: {})", link.id);
        }
        LinkCommand::Bidi(spec) => {
            for link in links.create_bidirectional_link(
                user,
                NoteId::new(spec.source),
                NoteId::new(spec.target),
                spec.link_type,
                spec.weight,
            )? {
                println!(
                    "Link created (id: {}): {} -[{}]-> {}",
                    link.id, link.source, link.link_type, link.target
                );
            }
        }
        LinkCommand::Remove { id } => {
            links.delete_link(user, LinkId::new(*id))?;
            println!("Link {id} removed");
        }
        LinkCommand::List { note } => {
            for link in links.links_for_note(user, NoteId::new(*note))? {
                let arrow = if link.is_bidirectional { "<->" } else { "->" };
                println!(
                    "{:>5}  {} {arrow} {}  {} (weight {})",
                    link.id, link.source, link.target, link.link_type, link.weight
                );
            }
        }
    }
    Ok(())
}

fn graph_command(service: &NoteService, user: UserId, cmd: &GraphCommand) -> Result<()> {
    let links = service.links();
    let query = service.graph_query();
    match cmd {
        GraphCommand::Connected { note, depth } => {
            for id in links.connected_notes(user, NoteId::new(*note), *depth)? {
                println!("{id}");
            }
        }
        GraphCommand::Path { from, to } => {
            match links.shortest_path(user, NoteId::new(*from), NoteId::new(*to))? {
                Some(path) => {
                    let hops: Vec<String> = path.iter().map(ToString::to_string).collect();
                    println!("{}", hops.join(" -> "));
                }
                None => println!("No path found"),
            }
        }
        GraphCommand::Hubs { limit } => {
            for (id, degree) in links.most_connected(user, *limit)? {
                println!("{id:>5}  {degree} links");
            }
        }
        GraphCommand::Orphans => {
            for id in links.orphaned_notes(user)? {
                println!("{id}");
            }
        }
        GraphCommand::Stats => {
            let stats = query.graph_stats(user)?;
            println!("notes: {}", stats.total_notes);
            println!("links: {}", stats.total_links);
            println!("orphans: {}", stats.orphan_count);
            for (link_type, count) in &stats.link_type_distribution {
                println!("  {link_type}: {count}");
            }
            for hub in &stats.hubs {
                println!("hub {}  {} ({} links)", hub.id, hub.title, hub.degree);
            }
        }
        GraphCommand::Node { id } => {
            let view = query.node_view(user, NoteId::new(*id))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        GraphCommand::Export {
            group,
            sub_groups,
            tags,
            all,
        } => {
            let mut filter = NoteFilter {
                group: group.map(GroupId::new),
                include_sub_groups: *sub_groups,
                ..Default::default()
            };
            if let Some(tags) = tags {
                let mode = if *all { TagMatch::All } else { TagMatch::Any };
                filter = filter.with_tags(parse_tags(tags), mode);
            }
            let view = query.graph_view(user, &filter)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}
