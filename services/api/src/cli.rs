use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use hireloop::error::AppError;
use hireloop::hiring::{write_csv, Application};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Hireloop",
    about = "Run the Hireloop applicant tracking API or its offline tools",
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
    /// Run an offline walkthrough of intake, scoring, rejection and the dashboard
    Demo(DemoArgs),
    /// Convert a JSON array of applications into the CSV export format
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// JSON file holding an array of applications
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Destination CSV file (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Export(args) => run_export(args),
    }
}

fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let reader = BufReader::new(File::open(&args.input)?);
    let applications: Vec<Application> = serde_json::from_reader(reader)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    match args.output {
        Some(path) => write_csv(&applications, BufWriter::new(File::create(path)?))?,
        None => write_csv(&applications, std::io::stdout().lock())?,
    }
    Ok(())
}
