//! Marie CLI: concept graph and tag store for laboratory workspaces.
//!
//! Usage:
//!   marie lab <subcommand> [--db path]
//!   marie relate <source> <target> --type causal
//!   marie component <concept> --depth 2 --json

use clap::{Parser, Subcommand};
use marie::{
    Actor, ComponentQuery, ConceptGraph, ConceptId, EdgeFilter, GraphConfig, IdentifierRegistry,
    Laboratory, LaboratoryId, NewTag, OpenStore, RelationshipDraft, RelationshipId,
    RelationshipType, SqliteStore, TagId,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "marie", version, about = "Concept relationship graph for laboratory workspaces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage laboratories
    Lab {
        #[command(subcommand)]
        action: LabAction,
    },
    /// Manage concept records
    Concept {
        #[command(subcommand)]
        action: ConceptAction,
    },
    /// Assert a relationship between two concepts
    Relate {
        source: String,
        target: String,
        /// semantic, causal, hierarchical, temporal, contradictory or complementary
        #[arg(long = "type", default_value = "semantic")]
        relationship_type: RelationshipType,
        #[arg(long)]
        strength: Option<f32>,
        #[arg(long)]
        confidence: Option<f32>,
        /// user, ai or system
        #[arg(long, default_value = "user")]
        by: Actor,
        /// Only navigable from source to target
        #[arg(long)]
        directed: bool,
        #[arg(long)]
        description: Option<String>,
    },
    /// Deactivate a relationship
    Deactivate { id: i64 },
    /// Mark a relationship as human-validated
    Validate { id: i64 },
    /// List relationships navigable from a concept
    Outgoing {
        concept: String,
        /// Include deactivated relationships
        #[arg(long)]
        all: bool,
    },
    /// Concepts one hop away
    Neighbors {
        concept: String,
        /// Restrict to these relationship types (repeatable)
        #[arg(long = "type")]
        types: Vec<RelationshipType>,
        #[arg(long, default_value_t = 0.0)]
        min_strength: f32,
    },
    /// Concepts reachable within a depth bound
    Component {
        concept: String,
        #[arg(long, allow_hyphen_values = true)]
        depth: Option<i64>,
    },
    /// Shortest path between two concepts
    Path {
        from: String,
        to: String,
        #[arg(long, allow_hyphen_values = true)]
        depth: Option<i64>,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Detach a concept from the graph
    Purge { concept: String },
}

#[derive(Subcommand)]
enum LabAction {
    /// Create a new laboratory
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all laboratories
    List,
    /// Delete a laboratory and everything it owns
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConceptAction {
    /// Register a concept in a laboratory
    Add {
        laboratory: String,
        /// Identifier to use; a fresh one is assigned when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Create a tag
    Create {
        name: String,
        /// Scope the tag to one laboratory
        #[arg(long)]
        laboratory: Option<String>,
        #[arg(long)]
        parent: Option<i64>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Move a tag under a parent, or to the root when no parent is given
    Parent { tag: i64, parent: Option<i64> },
    /// Tag a concept
    Assign {
        concept: String,
        tag: i64,
        #[arg(long)]
        confidence: Option<f32>,
        #[arg(long, default_value = "user")]
        by: Actor,
    },
    /// Untag a concept
    Remove { concept: String, tag: i64 },
    /// Print a tag's full hierarchical name
    Name { tag: i64 },
    /// Retire a tag: hidden from listings and no longer assignable
    Retire { tag: i64 },
    /// Bring back a retired tag
    Restore { tag: i64 },
    /// List tags, optionally those visible to one laboratory
    List {
        #[arg(long)]
        laboratory: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<GraphConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => GraphConfig::load(path)?,
        None => GraphConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

fn init_tracing(config: &GraphConfig, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print as JSON, or with the fallback formatter
fn emit<T: Serialize>(json: bool, value: &T, plain: impl FnOnce(&T)) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        plain(value);
    }
    Ok(())
}

fn cmd_lab(store: &SqliteStore, graph: &ConceptGraph, action: LabAction, json: bool) -> CliResult {
    match action {
        LabAction::Create { name, description } => {
            let mut lab = Laboratory::new(name);
            if let Some(description) = description {
                lab = lab.with_description(description);
            }
            store.save_laboratory(&lab)?;
            emit(json, &lab, |lab| println!("Created laboratory '{}' ({})", lab.name, lab.id))
        }
        LabAction::List => {
            let labs = store.list_laboratories()?;
            emit(json, &labs, |labs| {
                if labs.is_empty() {
                    println!("No laboratories defined.");
                    return;
                }
                println!("{:<36}  {:<24}  {:>8}", "ID", "NAME", "CONCEPTS");
                println!("{}", "-".repeat(72));
                for lab in labs {
                    let count = graph.identifiers().concepts_in(&lab.id).map(|c| c.len()).unwrap_or(0);
                    println!("{:<36}  {:<24}  {:>8}", lab.id, lab.name, count);
                }
            })
        }
        LabAction::Delete { id } => {
            let id = LaboratoryId::from(id);
            if store.load_laboratory(&id)?.is_none() {
                return Err(format!("laboratory '{}' not found", id).into());
            }
            let report = graph.purge_laboratory(&id)?;
            emit(json, &report, |r| {
                println!(
                    "Deleted laboratory {}: {} relationships, {} tag links, {} tags removed",
                    id, r.relationships, r.tag_associations, r.tags
                )
            })
        }
    }
}

fn cmd_concept(store: &SqliteStore, graph: &ConceptGraph, action: ConceptAction, json: bool) -> CliResult {
    match action {
        ConceptAction::Add { laboratory, id, title } => {
            let id = match id {
                Some(id) => {
                    let id = ConceptId::from(id);
                    IdentifierRegistry::check_syntax(&id)?;
                    id
                }
                None => graph.identifiers().assign()?,
            };
            store.register_concept(&id, &LaboratoryId::from(laboratory), title.as_deref())?;
            emit(json, &id, |id| println!("{}", id))
        }
    }
}

fn cmd_tag(graph: &ConceptGraph, action: TagAction, json: bool) -> CliResult {
    match action {
        TagAction::Create { name, laboratory, parent, color, description } => {
            let mut tag = NewTag::new(name);
            if let Some(lab) = laboratory {
                tag = tag.in_laboratory(LaboratoryId::from(lab));
            }
            if let Some(parent) = parent {
                tag = tag.with_parent(TagId::from_raw(parent));
            }
            if let Some(color) = color {
                tag = tag.with_color(color);
            }
            if let Some(description) = description {
                tag = tag.with_description(description);
            }
            let tag = graph.create_tag(tag)?;
            emit(json, &tag, |t| println!("Created tag '{}' ({})", t.name, t.id))
        }
        TagAction::Parent { tag, parent } => {
            graph.set_tag_parent(TagId::from_raw(tag), parent.map(TagId::from_raw))?;
            let name = graph.resolve_full_name(TagId::from_raw(tag))?;
            emit(json, &name, |n| println!("{}", n))
        }
        TagAction::Assign { concept, tag, confidence, by } => {
            let created = graph.assign_tag(&ConceptId::from(concept), TagId::from_raw(tag), confidence, by)?;
            emit(json, &created, |c| println!("{}", if *c { "Assigned" } else { "Updated" }))
        }
        TagAction::Remove { concept, tag } => {
            let removed = graph.remove_tag(&ConceptId::from(concept), TagId::from_raw(tag))?;
            emit(json, &removed, |r| println!("{}", if *r { "Removed" } else { "Not tagged" }))
        }
        TagAction::Name { tag } => {
            let name = graph.resolve_full_name(TagId::from_raw(tag))?;
            emit(json, &name, |n| println!("{}", n))
        }
        TagAction::Retire { tag } => {
            let changed = graph.set_tag_active(TagId::from_raw(tag), false)?;
            emit(json, &changed, |c| println!("{}", if *c { "Retired" } else { "Already retired" }))
        }
        TagAction::Restore { tag } => {
            let changed = graph.set_tag_active(TagId::from_raw(tag), true)?;
            emit(json, &changed, |c| println!("{}", if *c { "Restored" } else { "Already active" }))
        }
        TagAction::List { laboratory } => {
            let lab = laboratory.map(LaboratoryId::from);
            let tags = graph.list_tags(lab.as_ref())?;
            emit(json, &tags, |tags| {
                println!("{:>6}  {:<32}  {:<8}  {:>6}", "ID", "NAME", "COLOR", "USAGE");
                println!("{}", "-".repeat(60));
                for tag in tags {
                    let name = graph.resolve_full_name(tag.id).unwrap_or_else(|_| tag.name.clone());
                    println!("{:>6}  {:<32}  {:<8}  {:>6}", tag.id, name, tag.color, tag.usage_count);
                }
            })
        }
    }
}

fn run(cli: Cli) -> CliResult {
    let config = load_config(&cli)?;
    init_tracing(&config, cli.verbose);

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    let default_depth = config.default_max_depth as i64;
    let graph = ConceptGraph::new(store.clone(), store.clone()).with_config(config);
    let json = cli.json;

    match cli.command {
        Commands::Lab { action } => cmd_lab(&store, &graph, action, json),
        Commands::Concept { action } => cmd_concept(&store, &graph, action, json),
        Commands::Relate {
            source,
            target,
            relationship_type,
            strength,
            confidence,
            by,
            directed,
            description,
        } => {
            let mut draft = RelationshipDraft::new(source.into(), target.into(), relationship_type)
                .created_by(by)
                .bidirectional(!directed);
            draft.strength = strength;
            draft.confidence = confidence;
            draft.description = description;
            let id = graph.assert_relationship(draft)?;
            emit(json, &id, |id| println!("{}", id))
        }
        Commands::Deactivate { id } => {
            let changed = graph.deactivate(RelationshipId::from_raw(id))?;
            emit(json, &changed, |c| println!("{}", if *c { "Deactivated" } else { "Already inactive" }))
        }
        Commands::Validate { id } => {
            graph.validate_relationship(RelationshipId::from_raw(id))?;
            emit(json, &graph.get_relationship(RelationshipId::from_raw(id))?, |_| println!("Validated"))
        }
        Commands::Outgoing { concept, all } => {
            let views = graph.list_outgoing(&ConceptId::from(concept), all)?;
            emit(json, &views, |views| {
                for v in views {
                    let arrow = if v.relationship.is_bidirectional { "<->" } else { "->" };
                    println!(
                        "{:>6}  {} {} {}  {:<8} s={:.2} c={:.2}{}",
                        v.relationship.id,
                        v.from,
                        arrow,
                        v.to,
                        v.relationship.relationship_type.label(),
                        v.relationship.strength,
                        v.relationship.confidence,
                        if v.relationship.is_active { "" } else { "  (inactive)" }
                    );
                }
            })
        }
        Commands::Neighbors { concept, types, min_strength } => {
            let filter = EdgeFilter::any().with_types(types).min_strength(min_strength);
            let neighbors = graph.neighbors(&ConceptId::from(concept), &filter)?;
            emit(json, &neighbors, |set| set.iter().for_each(|c| println!("{}", c)))
        }
        Commands::Component { concept, depth } => {
            let depth = depth.unwrap_or(default_depth);
            if json {
                let members = graph.connected_component(&ConceptId::from(concept), depth)?;
                return emit(json, &members, |_| {});
            }
            let depth = usize::try_from(depth).map_err(|_| format!("depth must not be negative: {}", depth))?;
            let result = graph.traverse(&ComponentQuery::from(ConceptId::from(concept)).depth(depth))?;
            for (level, concepts) in result.levels.iter().enumerate() {
                for c in concepts {
                    println!("{:>3}  {}", level, c);
                }
            }
            Ok(())
        }
        Commands::Path { from, to, depth } => {
            let result = graph.shortest_path(
                &ConceptId::from(from),
                &ConceptId::from(to),
                depth.unwrap_or(default_depth),
            )?;
            emit(json, &result, |r| {
                if r.found {
                    let names: Vec<&str> = r.path.iter().map(|c| c.as_str()).collect();
                    println!("{}", names.join(" -> "));
                } else {
                    println!("No path found.");
                }
            })
        }
        Commands::Tag { action } => cmd_tag(&graph, action, json),
        Commands::Purge { concept } => {
            let report = graph.purge_concept(&ConceptId::from(concept))?;
            emit(json, &report, |r| {
                println!(
                    "Deactivated {} relationships, removed {} tag links",
                    r.relationships, r.tag_associations
                )
            })
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
