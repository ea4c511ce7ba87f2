use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use packsmith_lib::core::hashing::{hash_file, HashAlgorithm};
use packsmith_lib::core::manifest::PackVersion;
use packsmith_lib::{init_logging, EngineConfig, EngineResult, InstallRequest, PackInstaller, Side};

#[derive(Parser, Debug)]
#[command(author, version, about, name = "packsmith", bin_name = "packsmith")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a pack version into an instance directory.
    Install {
        /// Pack version manifest (JSON).
        #[arg(long)]
        manifest: PathBuf,
        /// Instance root to install into.
        #[arg(long)]
        root: PathBuf,
        /// Install the server side instead of the client.
        #[arg(long)]
        server: bool,
        /// Optional mods to install, comma separated. Omit for pack defaults.
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<String>>,
        /// Engine settings file; defaults to the one in the data directory.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        concurrency: Option<usize>,
        /// Directory holding files for server-provided downloads.
        #[arg(long)]
        staged: Option<PathBuf>,
    },
    /// Print the SHA-1 (or MD5) of a file.
    Hash {
        file: PathBuf,
        #[arg(long)]
        md5: bool,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = CliArgs::parse();

    let result = match args.command {
        Command::Install {
            manifest,
            root,
            server,
            select,
            config,
            concurrency,
            staged,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::load_or_default(&path),
                None => EngineConfig::load_from_data_dir(),
            };
            if let Some(n) = concurrency {
                config.download_concurrency = n;
            }
            let side = if server { Side::Server } else { Side::Client };
            install(config, manifest, root, side, select, staged).await
        }
        Command::Hash { file, md5 } => {
            let algorithm = if md5 { HashAlgorithm::Md5 } else { HashAlgorithm::Sha1 };
            hash_file(algorithm, &file).map(|hex| println!("{hex}  {}", file.display()))
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn install(
    config: EngineConfig,
    manifest: PathBuf,
    root: PathBuf,
    side: Side,
    selection: Option<Vec<String>>,
    staged_files_dir: Option<PathBuf>,
) -> EngineResult<()> {
    let manifest = PackVersion::load(&manifest).await?;
    let request = InstallRequest {
        manifest,
        side,
        root,
        selection,
        staged_files_dir,
    };

    let installer = PackInstaller::new(config)?;
    let session = installer.session_for(&request);

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling install");
            cancel.cancel();
        }
    });

    let report = installer.install(&request, &session).await?;
    info!(
        "{} libraries, {} mods, {} archives built, {} bytes downloaded",
        report.libraries,
        report.mods_installed,
        report.actions.archives_built,
        report.downloaded_bytes
    );
    Ok(())
}
