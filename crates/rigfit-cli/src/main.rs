use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rigfit_core::{CategorySlug, ComponentId};
use rigfit_heuristics::explain_conflicts;
use rigfit_service::CompatibilityService;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rigfit", version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Catalog root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create .rigfit/ with a default config and an empty catalog
    Init,

    /// Load templates, components and rules from a YAML or JSON file
    Import {
        #[arg(long)]
        file: PathBuf,
    },

    /// Check two components against the declarative rules
    Check {
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
    },

    /// Validate every pair of a build
    Validate { ids: Vec<String> },

    /// List products in a category that fit the selected components
    Candidates {
        #[arg(long)]
        category: String,
        #[arg(long, num_args = 0..)]
        selected: Vec<String>,
        /// Single derived constraint instead of every rule
        #[arg(long)]
        quick: bool,
    },

    /// Heuristic verdict for one candidate against the selected build
    Fit {
        #[arg(long)]
        candidate: String,
        #[arg(long, num_args = 0..)]
        selected: Vec<String>,
    },

    /// Show catalog counts
    Status,
}

fn ids(raw: Vec<String>) -> Vec<ComponentId> {
    raw.into_iter().map(ComponentId::from_str).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.cmd {
        Command::Init => {
            CompatibilityService::init(&root)?;
            println!("Initialized rigfit in {}", root.display());
        }
        Command::Import { file } => {
            let svc = CompatibilityService::open(root)?;
            let summary = svc.import(&file).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Imported {} templates, {} components, {} rules",
                    summary.templates, summary.components, summary.rules
                );
            }
        }
        Command::Check { a, b } => {
            let svc = CompatibilityService::open(root)?;
            let result = svc.check(&ComponentId::from_str(a), &ComponentId::from_str(b)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_compatible {
                println!("compatible");
            } else {
                println!("incompatible: {}", result.reason.unwrap_or_default());
            }
        }
        Command::Validate { ids: raw } => {
            let svc = CompatibilityService::open(root)?;
            let validation = svc.validate(&ids(raw)).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&validation)?);
            } else {
                println!("{}", if validation.is_compatible { "compatible" } else { "incompatible" });
                for pair in &validation.incompatible_components {
                    println!("- {} / {}: {}", pair.component1_id, pair.component2_id, pair.reason);
                }
                if let Some(fp) = &validation.ruleset_fingerprint {
                    println!("ruleset: {fp}");
                }
            }
        }
        Command::Candidates { category, selected, quick } => {
            let svc = CompatibilityService::open(root)?;
            let found = svc.candidates(&CategorySlug::new(&category), &ids(selected), quick).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                println!("{} compatible {category} product(s)", found.len());
                for id in found {
                    println!("- {id}");
                }
            }
        }
        Command::Fit { candidate, selected } => {
            let svc = CompatibilityService::open(root)?;
            let verdict = svc.fit(&ComponentId::from_str(candidate), &ids(selected)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!("{}", if verdict.ok { "ok" } else { "blocked" });
                for (reason, message) in verdict.reasons.iter().zip(explain_conflicts(&verdict.reasons)) {
                    println!("- [{:?}] {}: {message}", reason.severity, reason.code);
                }
            }
        }
        Command::Status => {
            let svc = CompatibilityService::open(root)?;
            let stats = svc.status().await?;
            if cli.json {
                let v = serde_json::json!({
                    "templates": stats.templates,
                    "components": stats.components,
                    "rules": stats.rules,
                });
                println!("{}", serde_json::to_string_pretty(&v)?);
            } else {
                println!("Catalog: {}", svc.cfg.db_path(&svc.root).display());
                println!("Templates: {}", stats.templates);
                println!("Components: {}", stats.components);
                println!("Rules: {}", stats.rules);
            }
        }
    }

    Ok(())
}
