mod manifest;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stripe_webhook_common::env_or;

use crate::manifest::{ManifestError, StackManifest};

#[derive(Parser)]
#[command(name = "stack-cli")]
#[command(about = "Stripe webhook deployment manifest tool")]
struct Cli {
    /// Manifest file (defaults to $STACK_MANIFEST or deploy/stack.toml)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check references, duplicates, policies and the GraphQL schema
    Validate,
    /// List the stack outputs
    Outputs,
    /// Print the normalized manifest as JSON with computed values
    Render,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let path = cli
        .manifest
        .unwrap_or_else(|| PathBuf::from(env_or("STACK_MANIFEST", "deploy/stack.toml")));

    tracing::debug!("Loading manifest from {}", path.display());
    let manifest = StackManifest::load(&path)?;

    match cli.command {
        Commands::Validate => {
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            let mut issues = manifest.validate();
            issues.extend(manifest.check_schema(base_dir));

            if !issues.is_empty() {
                for issue in &issues {
                    println!("❌ {}", issue);
                }
                return Err(ManifestError::Invalid(issues).into());
            }

            println!(
                "✅ {} is valid: {} role(s), {} function(s), {} resolver(s)",
                manifest.app_name,
                manifest.roles.len(),
                manifest.functions.len(),
                manifest.resolvers.len()
            );
        }
        Commands::Outputs => {
            for output in &manifest.outputs {
                let source = serde_json::to_value(output.value)?;
                println!(
                    "{}\t{}\t{}",
                    output.name,
                    source.as_str().unwrap_or_default(),
                    output.description
                );
            }
        }
        Commands::Render => {
            println!("{}", manifest.render(chrono::Utc::now())?);
        }
    }

    Ok(())
}
