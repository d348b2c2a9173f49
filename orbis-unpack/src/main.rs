use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use orbis_fs::{PathType, UserPaths, find_game_by_id, path_to_utf8_string, validate_path};
use orbis_pkg::{Package, PkgHandle};

const APP_NAME: &str = "orbis-unpack";

#[derive(Parser)]
#[command(
    name = "orbis-unpack",
    about = "Extract encrypted CNT game packages",
    version
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every file of a package into <dest>/<title id>
    Extract {
        /// Package to extract
        pkg: PathBuf,
        /// Output directory (defaults to the user game data directory)
        dest: Option<PathBuf>,
    },

    /// Print the header, metadata and entry table of a package
    Info {
        pkg: PathBuf,
    },

    /// Find an extracted game by title id
    Locate {
        /// Directory to search
        dir: PathBuf,
        /// Title id, e.g. CUSA00001
        id: String,
        /// How many directory levels to descend
        #[arg(short, long, default_value_t = 3)]
        depth: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Extract { pkg, dest } => extract(pkg, dest),
        Commands::Info { pkg } => info(pkg),
        Commands::Locate { dir, id, depth } => locate(dir, &id, depth),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn extract(pkg: PathBuf, dest: Option<PathBuf>) -> Result<bool, Box<dyn std::error::Error>> {
    let dest = match dest {
        Some(dest) => dest,
        None => UserPaths::discover(APP_NAME)?
            .get(PathType::GameDataDir)
            .to_path_buf(),
    };

    let mut handle = PkgHandle::new();
    handle.open(&pkg)?;

    let title_id = handle.title_id()?;
    let root = dest.join(&title_id);
    if !validate_path(&root) {
        return Err(format!("invalid output path {}", path_to_utf8_string(&root)).into());
    }

    println!("Title ID: {title_id}");
    println!("Number of files: {}", handle.number_of_files()?);

    let report = handle.extract_with_progress(&root, |done, total| {
        println!("Extracted file {done}/{total}");
    })?;

    for c in report.collisions() {
        let kept = match c.kept {
            Some(index) => format!("kept #{index}"),
            None => "none written".to_string(),
        };
        println!(
            "Warning: entries #{} and #{} both map to {}, {kept}",
            c.first,
            c.second,
            c.path.display(),
        );
    }
    if !report.is_success() {
        println!("{}", report.reason());
    }
    Ok(report.is_success())
}

fn info(pkg: PathBuf) -> Result<bool, Box<dyn std::error::Error>> {
    let package = Package::open(&pkg)?;
    let header = package.header();

    println!("Content ID: {}", header.content_id_str());
    println!("Title ID: {}", package.resolved_title_id());
    println!("Content type: {:#x}", header.content_type);
    println!("Scheme: {}", header.scheme_version());
    println!("File size: {}", header.file_size);

    match package.metadata() {
        Some(metadata) => {
            println!("Metadata:");
            for (key, value) in metadata.iter() {
                println!("  {key} = {value}");
            }
        }
        None => println!("Metadata: unavailable"),
    }

    println!("Entries ({}):", package.number_of_files());
    for entry in package.entries() {
        println!("  {entry}");
    }
    Ok(true)
}

fn locate(dir: PathBuf, id: &str, depth: usize) -> Result<bool, Box<dyn std::error::Error>> {
    let mut found = false;
    for eboot in find_game_by_id(&dir, id, depth) {
        println!("{}", eboot.display());
        found = true;
    }
    if !found {
        eprintln!("no game {id} below {}", dir.display());
    }
    Ok(found)
}
