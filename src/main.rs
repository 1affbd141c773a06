use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use fincent_lib::{
    model_family::{VALIDATION_ENTITY_MISSING, VALIDATION_MEMBER_MISSING},
    storage::StorageBackend,
    summary::{self, PanStatusRow},
    AppConfig, AppError, Applied, EntityInput, EntityType, FamilyService, MemberInput,
};

const VALIDATION_CONFIRM_REQUIRED: &str = "VALIDATION/CONFIRM_REQUIRED";
const VALIDATION_MANUAL_MEMBERS: &str = "VALIDATION/MANUAL_MEMBERS_REFUSED";
const EXIT_VALIDATION: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "fincent", about = "Manage entities and family members", version)]
struct Cli {
    /// Directory holding the stored collections.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Storage backend: memory, file or sqlite.
    #[arg(long, global = true)]
    backend: Option<StorageBackend>,
    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Family member records.
    #[command(subcommand)]
    Member(MemberCommand),
    /// Entities and the members mapped to them.
    #[command(subcommand)]
    Entity(EntityCommand),
    /// PAN submission status for every entity and member.
    PanStatus,
    /// Counts by entity type and member flags.
    Summary,
}

#[derive(Debug, Subcommand)]
enum MemberCommand {
    Add(MemberFields),
    Edit {
        id: String,
        #[command(flatten)]
        fields: MemberFields,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    List,
}

#[derive(Debug, Args)]
struct MemberFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    relationship: Option<String>,
    /// Date of birth as dd/mm/yyyy.
    #[arg(long)]
    dob: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    /// Pass an empty value to clear.
    #[arg(long)]
    pan: Option<String>,
    #[arg(long)]
    aadhaar: Option<String>,
    #[arg(long)]
    huf: Option<bool>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    active: Option<bool>,
}

impl MemberFields {
    fn apply(self, mut input: MemberInput) -> MemberInput {
        if let Some(v) = self.name {
            input.name = v;
        }
        if let Some(v) = self.relationship {
            input.relationship = v;
        }
        if let Some(v) = self.dob {
            input.dob = v;
        }
        if let Some(v) = self.gender {
            input.gender = v;
        }
        if let Some(v) = self.pan {
            input.pan = v;
        }
        if let Some(v) = self.aadhaar {
            input.aadhaar = v;
        }
        if let Some(v) = self.huf {
            input.is_huf = v;
        }
        if let Some(v) = self.notes {
            input.notes = v;
        }
        if let Some(v) = self.active {
            input.active = v;
        }
        input
    }
}

#[derive(Debug, Subcommand)]
enum EntityCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        entity_type: String,
        #[arg(long, default_value = "")]
        pan: String,
        /// Member id to map; repeat for several.
        #[arg(long = "member")]
        members: Vec<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        entity_type: Option<String>,
        #[arg(long)]
        pan: Option<String>,
        /// Replaces the current members; repeat for several.
        #[arg(long = "member")]
        members: Vec<String>,
        /// Unmap every member.
        #[arg(long, conflicts_with = "members")]
        clear_members: bool,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    List,
    /// Members mapped to an entity.
    Members { id: String },
}

fn main() {
    fincent_lib::init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(exit_code(&err));
        }
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    let validation = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<AppError>())
        .any(AppError::is_validation);
    if validation {
        EXIT_VALIDATION
    } else {
        1
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load().context("load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    let mut service = FamilyService::open(&config).context("open data store")?;
    let json = cli.json;

    match cli.command {
        Commands::Member(command) => handle_member(&mut service, command, json),
        Commands::Entity(command) => handle_entity(&mut service, command, json),
        Commands::PanStatus => {
            let rows = summary::pan_status(service.store());
            if json {
                print_json(&rows)
            } else {
                print_pan_table(&rows);
                Ok(())
            }
        }
        Commands::Summary => {
            let entities = summary::entity_summary(service.list_entities());
            let family = summary::family_summary(service.list_members());
            if json {
                print_json(&json!({ "entities": entities, "family": family }))
            } else {
                println!("Entities     : {}", entities.total);
                for entity_type in EntityType::iter() {
                    println!(
                        "  {:<10} : {}",
                        entity_type.label(),
                        entities.count(entity_type)
                    );
                }
                println!("Members      : {}", family.total);
                println!("  With PAN   : {}", family.with_pan);
                println!("  HUF        : {}", family.huf);
                println!("  Active     : {}", family.active);
                Ok(())
            }
        }
    }
}

fn handle_member(service: &mut FamilyService, command: MemberCommand, json: bool) -> Result<()> {
    match command {
        MemberCommand::Add(fields) => {
            let input = fields.apply(MemberInput::default());
            let applied = service.create_or_update_member(None, &input)?;
            report(applied, json, |change| {
                (change.member.id.clone(), json!(change))
            })
        }
        MemberCommand::Edit { id, fields } => {
            let current = service
                .store()
                .member(&id)
                .map(|member| member.to_input())
                .ok_or_else(|| {
                    AppError::new(VALIDATION_MEMBER_MISSING, "Member not found.")
                        .with_context("id", id.clone())
                })?;
            let input = fields.apply(current);
            let applied = service.create_or_update_member(Some(&id), &input)?;
            report(applied, json, |change| {
                (change.member.id.clone(), json!(change))
            })
        }
        MemberCommand::Delete { id, yes } => {
            confirm(yes, &id)?;
            let applied = service.delete_member(&id)?;
            report(applied, json, |removal| {
                (removal.member.id.clone(), json!(removal))
            })
        }
        MemberCommand::List => {
            let rows = summary::member_rows(service.store());
            if json {
                return print_json(&rows);
            }
            println!(
                "{:<36} {:<20} {:<12} {:>4}  {:<10}  Status",
                "ID", "Name", "Relationship", "Age", "PAN"
            );
            for row in rows {
                println!(
                    "{:<36} {:<20} {:<12} {:>4}  {:<10}  {}",
                    row.id,
                    row.name,
                    row.relationship,
                    row.age.map(|age| age.to_string()).unwrap_or_else(|| "-".into()),
                    row.pan.as_deref().unwrap_or("-"),
                    if row.active { "Active" } else { "Inactive" }
                );
            }
            Ok(())
        }
    }
}

fn handle_entity(service: &mut FamilyService, command: EntityCommand, json: bool) -> Result<()> {
    match command {
        EntityCommand::Add {
            name,
            entity_type,
            pan,
            members,
        } => {
            let input = EntityInput {
                name,
                entity_type,
                pan,
            };
            refuse_manual_members(&input, &members)?;
            let applied = service.create_or_update_entity(None, &input, &members)?;
            report(applied, json, |change| {
                (change.entity.id.clone(), json!(change))
            })
        }
        EntityCommand::Edit {
            id,
            name,
            entity_type,
            pan,
            members,
            clear_members,
        } => {
            let entity = service.store().entity(&id).ok_or_else(|| {
                AppError::new(VALIDATION_ENTITY_MISSING, "Entity not found.")
                    .with_context("id", id.clone())
            })?;
            let mut input = entity.to_input();
            if let Some(v) = name {
                input.name = v;
            }
            if let Some(v) = entity_type {
                input.entity_type = v;
            }
            if let Some(v) = pan {
                input.pan = v;
            }
            refuse_manual_members(&input, &members)?;

            let selection = if clear_members {
                Vec::new()
            } else if members.is_empty() {
                // Keep the stored selection minus ids whose member is gone.
                let store = service.store();
                store
                    .mapping_for_entity(&id)
                    .map(|mapping| {
                        mapping
                            .member_ids
                            .iter()
                            .filter(|member_id| store.member(member_id).is_some())
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            } else {
                members
            };
            let applied = service.create_or_update_entity(Some(&id), &input, &selection)?;
            report(applied, json, |change| {
                (change.entity.id.clone(), json!(change))
            })
        }
        EntityCommand::Delete { id, yes } => {
            confirm(yes, &id)?;
            let applied = service.delete_entity(&id)?;
            report(applied, json, |removal| {
                (removal.entity.id.clone(), json!(removal))
            })
        }
        EntityCommand::List => {
            let rows = summary::entity_rows(service.store());
            if json {
                return print_json(&rows);
            }
            println!(
                "{:<36} {:<2} {:<24} {:<11} {:>7}  PAN",
                "ID", "", "Name", "Type", "Members"
            );
            for row in rows {
                println!(
                    "{:<36} {:<2} {:<24} {:<11} {:>7}  {}",
                    row.id,
                    row.icon,
                    row.name,
                    row.type_label,
                    row.member_count,
                    row.pan.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        EntityCommand::Members { id } => {
            if service.store().entity(&id).is_none() {
                return Err(AppError::new(VALIDATION_ENTITY_MISSING, "Entity not found.")
                    .with_context("id", id)
                    .into());
            }
            let members = service.members_of(&id);
            if json {
                return print_json(&members);
            }
            if members.is_empty() {
                println!("No members mapped.");
            }
            for member in members {
                println!("{:<36} {:<20} {}", member.id, member.name, member.relationship);
            }
            Ok(())
        }
    }
}

fn confirm(yes: bool, id: &str) -> Result<(), AppError> {
    if yes {
        Ok(())
    } else {
        Err(
            AppError::new(VALIDATION_CONFIRM_REQUIRED, "Pass --yes to confirm the delete.")
                .with_context("id", id.to_string()),
        )
    }
}

/// Individual entities are linked through the member's PAN, never by hand.
fn refuse_manual_members(input: &EntityInput, members: &[String]) -> Result<(), AppError> {
    if members.is_empty() {
        return Ok(());
    }
    match input.entity_type.parse::<EntityType>() {
        Ok(entity_type) if !entity_type.accepts_manual_members() => Err(AppError::new(
            VALIDATION_MANUAL_MEMBERS,
            "Members of individual entities are linked through their PAN.",
        )
        .with_context("type", entity_type.as_str())),
        _ => Ok(()),
    }
}

fn report<T, F>(applied: Applied<T>, json: bool, describe: F) -> Result<()>
where
    F: FnOnce(&T) -> (String, serde_json::Value),
{
    let (id, payload) = describe(&applied.value);
    if !applied.persisted {
        eprintln!("Warning: change applied but not saved; it will be saved with the next change.");
    }
    if json {
        print_json(&json!({ "result": payload, "persisted": applied.persisted }))
    } else {
        println!("{id}");
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{serialized}");
    Ok(())
}

fn print_pan_table(rows: &[PanStatusRow]) {
    println!(
        "{:<7} {:<24} {:<14} {:<12}  Status",
        "Kind", "Name", "Details", "PAN"
    );
    for row in rows {
        println!(
            "{:<7} {:<24} {:<14} {:<12}  {:?}",
            format!("{:?}", row.kind),
            row.name,
            row.details,
            row.pan,
            row.status
        );
    }
}
