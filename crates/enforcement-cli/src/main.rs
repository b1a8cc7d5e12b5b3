use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use enforcement_ai::{AiConfig, AiEnrichmentClient};
use enforcement_api::{
    local_today, EnforcementApi, RecommendRequest, SearchRequest, WeeklyReportRequest,
};
use enforcement_core::{
    parse_iso_date, Attachment, Attribution, Confirmation, ProcessTaken, RecordDraft, RecordId,
    RecordStatus, StatusFilter,
};
use enforcement_reports::write_export;
use enforcement_store_sqlite::SqliteStore;
use serde_json::Value;
use time::Date;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "ncenf")]
#[command(about = "Nairobi City County enforcement records CLI")]
struct Cli {
    #[arg(long, default_value = "./enforcement_records.sqlite3")]
    db: PathBuf,

    /// Name written into audit entries.
    #[arg(long, env = "NCENF_ACTOR", default_value = "Current Officer")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
    Record {
        #[command(subcommand)]
        command: Box<RecordCommand>,
    },
    Bulk {
        #[command(subcommand)]
        command: Box<BulkCommand>,
    },
    Ai {
        #[command(subcommand)]
        command: Box<AiCommand>,
    },
    Export {
        #[command(subcommand)]
        command: Box<ExportCommand>,
    },
    Report {
        #[command(subcommand)]
        command: Box<ReportCommand>,
    },
    Directory {
        #[command(subcommand)]
        command: Box<DirectoryCommand>,
    },
    Stats,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
    Export(DbExportArgs),
    Import(DbImportArgs),
    Backup(DbBackupArgs),
    Restore(DbRestoreArgs),
    IntegrityCheck,
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct DbExportArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
    #[arg(long, default_value_t = false)]
    skip_existing: bool,
}

#[derive(Debug, Args)]
struct DbBackupArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbRestoreArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum RecordCommand {
    Create(CreateArgs),
    Update(UpdateArgs),
    Show(IdArgs),
    List(SearchArgs),
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    plot: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    sub_county: String,
    #[arg(long)]
    ward: String,
    /// Defaults to today.
    #[arg(long, value_parser = parse_date_arg)]
    date_issued: Option<Date>,
    #[arg(long)]
    issue: String,
    #[arg(long, value_parser = parse_process_arg, default_value = "notice_issued")]
    process: ProcessTaken,
    #[arg(long)]
    recommendations: String,
    /// Defaults to the sub-county planning officer.
    #[arg(long)]
    officer: Option<String>,
    #[arg(long, value_parser = parse_status_arg, default_value = "open")]
    status: RecordStatus,
    /// `name:mime/type:data:...` triple; repeatable.
    #[arg(long = "attachment", value_parser = parse_attachment_arg)]
    attachments: Vec<Attachment>,
    #[arg(long)]
    ai_summary: Option<String>,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[arg(long, value_parser = parse_record_id_arg)]
    id: RecordId,
    #[arg(long)]
    plot: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    sub_county: Option<String>,
    #[arg(long)]
    ward: Option<String>,
    #[arg(long, value_parser = parse_date_arg)]
    date_issued: Option<Date>,
    #[arg(long)]
    issue: Option<String>,
    #[arg(long, value_parser = parse_process_arg)]
    process: Option<ProcessTaken>,
    #[arg(long)]
    recommendations: Option<String>,
    #[arg(long)]
    officer: Option<String>,
    #[arg(long, value_parser = parse_status_arg)]
    status: Option<RecordStatus>,
    #[arg(long = "attachment", value_parser = parse_attachment_arg)]
    attachments: Vec<Attachment>,
    #[arg(long)]
    ai_summary: Option<String>,
}

#[derive(Debug, Args)]
struct IdArgs {
    #[arg(long, value_parser = parse_record_id_arg)]
    id: RecordId,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long, default_value = "")]
    query: String,
    #[arg(long, value_parser = parse_status_filter_arg, default_value = "All")]
    status: StatusFilter,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum BulkCommand {
    Close(BulkCloseArgs),
    Assign(BulkAssignArgs),
}

#[derive(Debug, Args)]
struct BulkCloseArgs {
    #[arg(long = "id", value_parser = parse_record_id_arg)]
    ids: Vec<RecordId>,
    /// Skip the confirmation prompt.
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[derive(Debug, Args)]
struct BulkAssignArgs {
    #[arg(long = "id", value_parser = parse_record_id_arg)]
    ids: Vec<RecordId>,
    /// Prompted for when absent.
    #[arg(long)]
    officer: Option<String>,
}

#[derive(Debug, Subcommand)]
enum AiCommand {
    Recommend(RecommendArgs),
    Summarize(IdArgs),
}

#[derive(Debug, Args)]
struct RecommendArgs {
    #[arg(long)]
    issue: String,
    #[arg(long)]
    sub_county: String,
    #[arg(long)]
    plot: String,
}

#[derive(Debug, Subcommand)]
enum ExportCommand {
    Csv(CsvArgs),
}

#[derive(Debug, Args)]
struct CsvArgs {
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long, default_value = "")]
    query: String,
    #[arg(long, value_parser = parse_status_filter_arg, default_value = "All")]
    status: StatusFilter,
}

#[derive(Debug, Subcommand)]
enum ReportCommand {
    Weekly(WeeklyArgs),
}

#[derive(Debug, Args)]
struct WeeklyArgs {
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long, value_parser = parse_date_arg)]
    start: Option<Date>,
    #[arg(long, value_parser = parse_date_arg)]
    end: Option<Date>,
    /// Whole county when absent.
    #[arg(long)]
    sub_county: Option<String>,
    #[arg(long = "preparer")]
    preparers: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum DirectoryCommand {
    List,
    Show(DirectoryShowArgs),
}

#[derive(Debug, Args)]
struct DirectoryShowArgs {
    #[arg(long)]
    sub_county: String,
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_iso_date(raw).map_err(|err| err.to_string())
}

fn parse_process_arg(raw: &str) -> Result<ProcessTaken, String> {
    ProcessTaken::parse(raw).ok_or_else(|| {
        let known = ProcessTaken::ALL.iter().map(|process| process.as_str()).collect::<Vec<_>>();
        format!("unknown process `{raw}`; expected one of {}", known.join(", "))
    })
}

fn parse_status_arg(raw: &str) -> Result<RecordStatus, String> {
    RecordStatus::parse(raw).ok_or_else(|| {
        let known = RecordStatus::ALL.iter().map(|status| status.as_str()).collect::<Vec<_>>();
        format!("unknown status `{raw}`; expected one of {}", known.join(", "))
    })
}

fn parse_status_filter_arg(raw: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse(raw).map_err(|err| err.to_string())
}

fn parse_record_id_arg(raw: &str) -> Result<RecordId, String> {
    RecordId::parse(raw).map_err(|err| err.to_string())
}

fn parse_attachment_arg(raw: &str) -> Result<Attachment, String> {
    let mut parts = raw.splitn(3, ':');
    let (Some(name), Some(mime_type), Some(data)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("attachment `{raw}` must look like name:mime/type:data:..."));
    };
    let attachment = Attachment {
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    };
    attachment.validate().map_err(|err| err.to_string())?;
    Ok(attachment)
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn emit<T: serde::Serialize>(value: &T) -> Result<()> {
    emit_json(serde_json::to_value(value).context("failed to serialize command output")?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let attribution = Attribution::now(cli.actor.clone());
    tracing::debug!(db = %cli.db.display(), actor = %cli.actor, "ncenf starting");
    match cli.command {
        Command::Db { command } => {
            let mut store = SqliteStore::open(&cli.db)?;
            run_db(*command, &mut store)
        }
        Command::Record { command } => run_record(*command, &api(&cli.db), &attribution),
        Command::Bulk { command } => run_bulk(*command, &api(&cli.db), &attribution),
        Command::Ai { command } => run_ai(*command, &api(&cli.db), &attribution),
        Command::Export { command } => run_export(*command, &api(&cli.db)),
        Command::Report { command } => run_report(*command, &api(&cli.db)),
        Command::Directory { command } => run_directory(*command, &api(&cli.db)),
        Command::Stats => emit(&api(&cli.db).stats()?),
    }
}

fn api(db: &std::path::Path) -> EnforcementApi {
    let ai = AiEnrichmentClient::from_config(&AiConfig::from_env());
    EnforcementApi::new(db.to_path_buf(), ai)
}

fn run_db(command: DbCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => run_db_schema_version(store),
        DbCommand::Migrate(args) => run_db_migrate(&args, store),
        DbCommand::Export(args) => run_db_export(&args, store),
        DbCommand::Import(args) => run_db_import(&args, store),
        DbCommand::Backup(args) => run_db_backup(&args, store),
        DbCommand::Restore(args) => run_db_restore(&args, store),
        DbCommand::IntegrityCheck => run_db_integrity_check(store),
    }
}

fn run_db_schema_version(store: &SqliteStore) -> Result<()> {
    let status = store.schema_status()?;
    emit_json(serde_json::json!({
        "current_version": status.current_version,
        "target_version": status.target_version,
        "pending_versions": status.pending_versions,
        "up_to_date": status.pending_versions.is_empty(),
        "inferred_from_legacy": status.inferred_from_legacy
    }))
}

fn run_db_migrate(args: &DbMigrateArgs, store: &mut SqliteStore) -> Result<()> {
    let before = store.schema_status()?;
    if args.dry_run {
        emit_json(serde_json::json!({
            "dry_run": true,
            "current_version": before.current_version,
            "target_version": before.target_version,
            "would_apply_versions": before.pending_versions,
            "inferred_from_legacy": before.inferred_from_legacy
        }))?;
        return Ok(());
    }

    store.migrate()?;
    let after = store.schema_status()?;
    emit_json(serde_json::json!({
        "dry_run": false,
        "before_version": before.current_version,
        "applied_versions": before.pending_versions,
        "after_version": after.current_version,
        "target_version": after.target_version,
        "up_to_date": after.pending_versions.is_empty()
    }))
}

fn run_db_export(args: &DbExportArgs, store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    let manifest = store.export_snapshot(&args.out)?;
    emit_json(serde_json::json!({
        "out_dir": args.out,
        "manifest": manifest
    }))
}

fn run_db_import(args: &DbImportArgs, store: &mut SqliteStore) -> Result<()> {
    let summary = store.import_snapshot(&args.input, args.skip_existing)?;
    emit_json(serde_json::json!({
        "in_dir": args.input,
        "skip_existing": args.skip_existing,
        "summary": summary
    }))
}

fn run_db_backup(args: &DbBackupArgs, store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    store.backup_database(&args.out)?;
    emit_json(serde_json::json!({
        "backup_path": args.out,
        "status": "ok"
    }))
}

fn run_db_restore(args: &DbRestoreArgs, store: &mut SqliteStore) -> Result<()> {
    store.restore_database(&args.input)?;
    let status = store.schema_status()?;
    emit_json(serde_json::json!({
        "restored_from": args.input,
        "current_version": status.current_version,
        "target_version": status.target_version,
        "pending_versions": status.pending_versions
    }))
}

fn run_db_integrity_check(store: &SqliteStore) -> Result<()> {
    let report = store.integrity_check()?;
    emit(&report)
}

fn run_record(
    command: RecordCommand,
    api: &EnforcementApi,
    attribution: &Attribution,
) -> Result<()> {
    match command {
        RecordCommand::Create(args) => {
            let draft = RecordDraft {
                id: None,
                plot_number: args.plot,
                location: args.location,
                sub_county: args.sub_county,
                ward: args.ward,
                date_issued: args.date_issued.unwrap_or_else(local_today),
                issue_of_concern: args.issue,
                process_taken: args.process,
                recommendations: args.recommendations,
                officer_in_charge: args.officer,
                status: args.status,
                attachments: args.attachments,
                ai_summary: args.ai_summary,
            };
            emit(&api.create_record(draft, attribution)?)
        }
        RecordCommand::Update(args) => {
            let existing = api.show_record(&args.id)?;
            let draft = apply_update(RecordDraft::from_record(&existing), args);
            let id = existing.id;
            emit(&api.update_record(&id, draft, attribution)?)
        }
        RecordCommand::Show(args) => emit(&api.show_record(&args.id)?),
        RecordCommand::List(args) => emit(&api.search(&SearchRequest {
            query: args.query,
            status: args.status,
            page: Some(args.page),
            page_size: args.page_size,
        })?),
    }
}

/// Overlay the given flags on a stored record. New attachments are appended.
fn apply_update(mut draft: RecordDraft, args: UpdateArgs) -> RecordDraft {
    if let Some(sub_county) = args.sub_county {
        if sub_county != draft.sub_county && args.officer.is_none() {
            draft.officer_in_charge = None;
        }
        draft.sub_county = sub_county;
    }
    if let Some(plot) = args.plot {
        draft.plot_number = plot;
    }
    if let Some(location) = args.location {
        draft.location = location;
    }
    if let Some(ward) = args.ward {
        draft.ward = ward;
    }
    if let Some(date_issued) = args.date_issued {
        draft.date_issued = date_issued;
    }
    if let Some(issue) = args.issue {
        draft.issue_of_concern = issue;
    }
    if let Some(process) = args.process {
        draft.process_taken = process;
    }
    if let Some(recommendations) = args.recommendations {
        draft.recommendations = recommendations;
    }
    if let Some(officer) = args.officer {
        draft.officer_in_charge = Some(officer);
    }
    if let Some(status) = args.status {
        draft.status = status;
    }
    if let Some(summary) = args.ai_summary {
        draft.ai_summary = Some(summary);
    }

    for attachment in args.attachments {
        draft.add_attachment(attachment);
    }
    draft
}

fn run_bulk(command: BulkCommand, api: &EnforcementApi, attribution: &Attribution) -> Result<()> {
    match command {
        BulkCommand::Close(args) => {
            let confirmation = if args.yes || args.ids.is_empty() {
                Confirmation::Affirmed
            } else {
                confirm(&format!("Close {} selected record(s)? [y/N] ", args.ids.len()))?
            };
            let outcome = api.bulk_close(args.ids, confirmation, attribution)?;
            emit(&outcome)
        }
        BulkCommand::Assign(args) => {
            let officer = match args.officer {
                Some(officer) => Some(officer),
                None if args.ids.is_empty() => None,
                None => prompt_line("Assign selected records to officer: ")?,
            };
            let outcome = api.bulk_assign(args.ids, officer.as_deref(), attribution)?;
            emit(&outcome)
        }
    }
}

fn prompt_line(message: &str) -> Result<Option<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{message}").context("failed to write prompt")?;
    stderr.flush().context("failed to flush prompt")?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read answer from stdin")?;
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

fn confirm(message: &str) -> Result<Confirmation> {
    let answer = prompt_line(message)?.unwrap_or_default();
    Ok(if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
        Confirmation::Affirmed
    } else {
        Confirmation::Declined
    })
}

fn run_ai(command: AiCommand, api: &EnforcementApi, attribution: &Attribution) -> Result<()> {
    match command {
        AiCommand::Recommend(args) => emit(&api.recommend(&RecommendRequest {
            issue_of_concern: args.issue,
            sub_county: args.sub_county,
            plot_number: args.plot,
        })?),
        AiCommand::Summarize(args) => emit(&api.summarize_record(&args.id, attribution)?),
    }
}

fn run_export(command: ExportCommand, api: &EnforcementApi) -> Result<()> {
    match command {
        ExportCommand::Csv(args) => {
            let request = SearchRequest {
                query: args.query,
                status: args.status,
                ..SearchRequest::default()
            };
            let export = api.export_csv(&request, local_today())?;
            let path = write_export(&args.out, &export.file_name, export.content.as_bytes())?;
            tracing::info!(path = %path.display(), rows = export.rows, "csv export written");
            emit_json(serde_json::json!({
                "path": path,
                "file_name": export.file_name,
                "rows": export.rows
            }))
        }
    }
}

fn run_report(command: ReportCommand, api: &EnforcementApi) -> Result<()> {
    match command {
        ReportCommand::Weekly(args) => {
            let request = WeeklyReportRequest {
                start: args.start,
                end: args.end,
                sub_county: args.sub_county,
                preparers: args.preparers,
            };
            let report = api.weekly_report(&request, local_today())?;
            let path = write_export(&args.out, &report.file_name, &report.pdf)?;
            tracing::info!(path = %path.display(), pages = report.pages, "weekly report written");
            let mut value = serde_json::to_value(&report).context("failed to serialize report")?;
            if let Value::Object(object) = &mut value {
                object.insert("path".to_string(), serde_json::json!(path));
            }
            emit_json(value)
        }
    }
}

fn run_directory(command: DirectoryCommand, api: &EnforcementApi) -> Result<()> {
    let directory = api.directory();
    match command {
        DirectoryCommand::List => emit_json(serde_json::json!({
            "units": directory.units(),
            "sub_counties": directory.sorted_sub_county_names()
        })),
        DirectoryCommand::Show(args) => {
            let sub_county = api.sub_county(&args.sub_county)?;
            let borough = directory.borough_of(sub_county.name).map(|unit| unit.borough);
            emit_json(serde_json::json!({
                "borough": borough,
                "sub_county": sub_county
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record_draft() -> RecordDraft {
        RecordDraft {
            id: Some(RecordId::new()),
            plot_number: "KS/12".to_string(),
            location: "Kasarani Mwiki Road".to_string(),
            sub_county: "Kasarani".to_string(),
            ward: "Mwiki".to_string(),
            date_issued: date!(2025 - 05 - 02),
            issue_of_concern: "Encroachment on riparian land.".to_string(),
            process_taken: ProcessTaken::Warning,
            recommendations: "Restore the riparian reserve.".to_string(),
            officer_in_charge: Some("Kennedy Mutua".to_string()),
            status: RecordStatus::Open,
            attachments: vec![
                Attachment {
                    name: "a.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                    data: "data:image/jpeg;base64,AA".to_string(),
                },
                Attachment {
                    name: "b.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                    data: "data:application/pdf;base64,AA".to_string(),
                },
            ],
            ai_summary: None,
        }
    }

    fn update_args(id: RecordId) -> UpdateArgs {
        UpdateArgs {
            id,
            plot: None,
            location: None,
            sub_county: None,
            ward: None,
            date_issued: None,
            issue: None,
            process: None,
            recommendations: None,
            officer: None,
            status: None,
            attachments: Vec::new(),
            ai_summary: None,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn attachment_argument_keeps_colons_in_the_data_url() {
        let attachment = parse_attachment_arg("site.png:image/png:data:image/png;base64,iVBO")
            .unwrap_or_else(|err| panic!("attachment should parse: {err}"));
        assert_eq!(attachment.name, "site.png");
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data, "data:image/png;base64,iVBO");

        assert!(parse_attachment_arg("site.png").is_err());
        assert!(parse_attachment_arg("site.png:image/png:not-a-data-url").is_err());
    }

    #[test]
    fn changing_sub_county_without_officer_reverts_to_planning_officer() {
        let draft = record_draft();
        let mut args = update_args(RecordId::new());
        args.sub_county = Some("Westlands".to_string());
        args.ward = Some("Kangemi".to_string());
        let updated = apply_update(draft, args);
        assert_eq!(updated.officer_in_charge, None);
        assert_eq!(updated.sub_county, "Westlands");
    }

    #[test]
    fn update_appends_attachments_after_stored_ones() {
        let mut args = update_args(RecordId::new());
        args.attachments = vec![Attachment {
            name: "c.png".to_string(),
            mime_type: "image/png".to_string(),
            data: "data:image/png;base64,AA".to_string(),
        }];
        let updated = apply_update(record_draft(), args);
        let names = updated.attachments.iter().map(|file| file.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a.jpg", "b.pdf", "c.png"]);
    }

    #[test]
    fn attachment_removal_flag_is_gone() {
        let parsed = Cli::try_parse_from([
            "ncenf",
            "record",
            "update",
            "--id",
            "REC-1",
            "--remove-attachment",
            "0",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn non_object_payloads_are_wrapped_with_contract_version() {
        let wrapped = with_contract_version(serde_json::json!([1, 2]));
        assert_eq!(wrapped["contract_version"], CLI_CONTRACT_VERSION);
        assert_eq!(wrapped["payload"], serde_json::json!([1, 2]));
    }
}
