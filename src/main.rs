//! Main entry point for the bundlearch CLI app

use bundlearch::cli::{self, Commands};
use bundlearch::config::ResolverConfig;
use bundlearch::index::{index_seekable, ArchiveFormat};
use bundlearch::locator::parse_locator;
use bundlearch::resolve::BundleTarget;
use bundlearch::storage::{CancelToken, DirObjectStore, GuardedReader};
use bundlearch::BundleResolver;
use std::fs::File;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    init_tracing();
    if let Err(e) = run_app() {
        if e.downcast_ref::<clap::Error>().is_none() {
            eprintln!("Error: {}", e);
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

/// Diagnostics go to stderr so stdout stays machine-readable. `RUST_LOG` picks the level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let command = cli::run()?;

    match command {
        Commands::Info { locator, path, bundle_id, depth, object_root, timeout, pretty } => {
            let config = ResolverConfig::from_env()?.with_timeout_secs(timeout);
            let object_root = match object_root {
                Some(root) => root,
                None => std::env::current_dir()?,
            };
            let resolver = BundleResolver::with_remote(DirObjectStore::new(object_root), config);

            let bundle_id = match bundle_id {
                Some(id) => id,
                None => {
                    let descriptor = resolver.parse(&locator)?;
                    descriptor.bundle_id.clone().unwrap_or_else(|| descriptor.object_name().to_string())
                }
            };
            let target = BundleTarget::new(bundle_id, path.as_deref())?;
            let info = resolver.target_info(&locator, &target, depth)?;

            let json = if pretty { serde_json::to_string_pretty(&info)? } else { serde_json::to_string(&info)? };
            println!("{}", json);
        }
        Commands::Parse { locator } => {
            let descriptor = parse_locator(&locator, &ResolverConfig::from_env()?)?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Commands::List { archive } => {
            let file = File::open(&archive)?;
            let hint = ArchiveFormat::from_name(&archive.to_string_lossy());
            let index = index_seekable(GuardedReader::new(file, CancelToken::new()), hint)?;

            for entry in index.entries() {
                let marker = if entry.synthesized { " (implied)" } else { "" };
                println!("{:<9} {:04o} {:>12} {}{}", entry.kind.as_str(), entry.mode, entry.size, entry.path, marker);
            }
            println!(
                "{} entries, {} implied directories, depth {}",
                index.len(),
                index.synthesized_count(),
                index.max_depth()
            );
        }
    }

    Ok(())
}
