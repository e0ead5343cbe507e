use crate::demo::{run_demo, DemoArgs};
use crate::infra::{build_service, parse_timestamp};
use crate::server;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use course_commission::commission::{CategoryId, CourseId, SeedImporter, SystemClock};
use course_commission::config::CommissionConfig;
use course_commission::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Course Commission Engine",
    about = "Configure, resolve, and serve course-purchase commission rules",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Resolve the commission split for one course against a seed file
    Resolve(ResolveArgs),
    /// Validate a seed file and print what it would configure
    Import(ImportArgs),
    /// Walk through the reference scenarios with a pinned clock
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed CSV loaded before the server starts accepting requests
    #[arg(long)]
    pub(crate) seed_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ResolveArgs {
    /// Seed CSV describing headers and details
    #[arg(long)]
    pub(crate) seed_csv: PathBuf,
    /// Purchased course id
    #[arg(long)]
    pub(crate) course: u64,
    /// Category the course belongs to
    #[arg(long)]
    pub(crate) category: u64,
    /// Resolution instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Seed CSV describing headers and details
    #[arg(long)]
    pub(crate) seed_csv: PathBuf,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Resolve(args) => run_resolve(args),
        Command::Import(args) => run_import(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_resolve(args: ResolveArgs) -> Result<(), AppError> {
    let service = build_service(&CommissionConfig::default(), Arc::new(SystemClock));
    SeedImporter::from_path(&args.seed_csv, &service)?;

    let at = args.at.unwrap_or_else(|| service.now());
    let resolution = service.resolve(CourseId(args.course), CategoryId(args.category), at)?;

    println!(
        "Course {} in category {} at {}",
        args.course,
        args.category,
        at.to_rfc3339()
    );
    println!(
        "- split {}% platform / {}% instructor",
        resolution.rate.platform_rate(),
        resolution.rate.instructor_rate()
    );
    println!(
        "- detail {} under header {} ({:?} scope, priority {})",
        resolution.detail_id,
        resolution.header_id,
        resolution.scope.kind(),
        resolution.priority
    );
    Ok(())
}

fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let service = build_service(&CommissionConfig::default(), Arc::new(SystemClock));
    let summary = SeedImporter::from_path(&args.seed_csv, &service)?;
    let stats = service.stats()?;

    println!("Seed {} is valid", args.seed_csv.display());
    println!(
        "- {} rows | {} headers | {} details",
        summary.rows,
        summary.headers_created(),
        summary.details_created
    );
    println!(
        "- headers: {} active | {} inactive | {} scheduled | {} expired",
        stats.active_headers, stats.inactive_headers, stats.scheduled_headers, stats.expired_headers
    );
    println!(
        "- details: {} course | {} category | {} general | {} switched off",
        stats.course_details, stats.category_details, stats.general_details, stats.inactive_details
    );
    Ok(())
}
