// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use galley::kitchen::{Kitchen, KitchenConfig};
use galley::recipe::pkgbuild;
use galley::{Arch, HttpClient};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "galley")]
#[command(author, version, about = "Package and install prebuilt binary releases from recipes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, verify, and install a recipe into a staging root
    Install {
        /// Path to the recipe file
        recipe: PathBuf,
        /// Target architecture (default: host architecture)
        #[arg(short, long)]
        arch: Option<String>,
        /// Staging root to install into (default: /)
        #[arg(short, long, default_value = "/")]
        root: PathBuf,
        /// Directory for downloaded archives
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Keep the extraction workdir for inspection
        #[arg(long)]
        keep_workdir: bool,
        /// Suppress download progress bars
        #[arg(short, long)]
        quiet: bool,
    },
    /// Download and verify release archives without installing
    Fetch {
        /// Path to the recipe file
        recipe: PathBuf,
        /// Only fetch one architecture (default: all in the recipe)
        #[arg(short, long)]
        arch: Option<String>,
        /// Directory for downloaded archives
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Validate a recipe and print warnings
    Lint {
        /// Path to the recipe file
        recipe: PathBuf,
    },
    /// Print recipe metadata and resolved archive URLs
    Show {
        /// Path to the recipe file
        recipe: PathBuf,
    },
    /// Convert a PKGBUILD for a prebuilt package to recipe format
    Convert {
        /// Path to the PKGBUILD
        pkgbuild: PathBuf,
        /// Write the recipe here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Update a recipe or PKGBUILD to the latest upstream release
    Update {
        /// Path to the recipe or PKGBUILD
        path: PathBuf,
        /// GitHub repository slug (owner/name); default: from the
        /// recipe's homepage
        #[arg(long)]
        repo: Option<String>,
        /// Print the updated file instead of writing it back
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_arch(arg: Option<&str>) -> Result<Arch> {
    match arg {
        Some(s) => Ok(s.parse()?),
        None => Ok(Arch::host()?),
    }
}

fn kitchen_config(root: &Path, cache_dir: Option<PathBuf>, keep_workdir: bool, quiet: bool) -> KitchenConfig {
    let mut config = KitchenConfig::staged(root);
    if let Some(dir) = cache_dir {
        config.source_cache = dir;
    }
    config.keep_workdir = keep_workdir;
    config.quiet = quiet;
    config
}

fn is_pkgbuild(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == "PKGBUILD" || n.ends_with(".PKGBUILD"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Install {
            recipe,
            arch,
            root,
            cache_dir,
            keep_workdir,
            quiet,
        } => {
            let recipe = galley::parse_recipe_file(&recipe)?;
            let warnings = galley::validate_recipe(&recipe)?;
            for warning in &warnings {
                eprintln!("warning: {}", warning);
            }

            let arch = parse_arch(arch.as_deref())?;
            let kitchen = Kitchen::new(kitchen_config(&root, cache_dir, keep_workdir, quiet));
            let report = kitchen.install(&recipe, arch)?;

            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            println!(
                "Installed {} ({}) into {}: {} paths",
                report.package,
                report.arch,
                root.display(),
                report.installed_paths.len()
            );
            Ok(())
        }

        Commands::Fetch {
            recipe,
            arch,
            cache_dir,
        } => {
            let recipe = galley::parse_recipe_file(&recipe)?;
            let kitchen = Kitchen::new(kitchen_config(Path::new("/"), cache_dir, false, false));

            let fetched = match arch {
                Some(a) => {
                    let (path, from_cache) = kitchen.fetch(&recipe, a.parse()?)?;
                    if from_cache {
                        info!("Already cached");
                    }
                    vec![path]
                }
                None => kitchen.fetch_all(&recipe)?,
            };

            for path in fetched {
                println!("{}", path.display());
            }
            Ok(())
        }

        Commands::Lint { recipe } => {
            let parsed = galley::parse_recipe_file(&recipe)?;
            let warnings = galley::validate_recipe(&parsed)?;

            if warnings.is_empty() {
                println!("{}: ok", recipe.display());
            } else {
                for warning in &warnings {
                    println!("{}: warning: {}", recipe.display(), warning);
                }
            }
            Ok(())
        }

        Commands::Show { recipe } => {
            let recipe = galley::parse_recipe_file(&recipe)?;

            println!("{} {} (release {})", recipe.package.name, recipe.package.version, recipe.package.release);
            if let Some(description) = &recipe.package.description {
                println!("  {}", description);
            }
            if let Some(homepage) = &recipe.package.homepage {
                println!("  homepage: {}", homepage);
            }
            for arch in recipe.architectures() {
                println!("  {}: {}", arch, recipe.archive_url(arch)?);
                println!("    sha256: {}", recipe.source_for(arch)?.sha256);
            }
            println!(
                "  plan: {} trees, {} files, {} symlinks",
                recipe.install.trees.len(),
                recipe.install.files.len(),
                recipe.install.symlinks.len()
            );
            Ok(())
        }

        Commands::Convert { pkgbuild, output } => {
            let content = std::fs::read_to_string(&pkgbuild)
                .with_context(|| format!("Failed to read {}", pkgbuild.display()))?;
            let result = galley::recipe::convert_pkgbuild(&content)?;

            for warning in &result.warnings {
                eprintln!("warning: {}", warning);
            }

            let toml_text = toml::to_string_pretty(&result.recipe)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, toml_text)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", toml_text),
            }
            Ok(())
        }

        Commands::Update { path, repo, dry_run } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let client = HttpClient::new()?;

            if is_pkgbuild(&path) {
                let slug = match repo {
                    Some(r) => r,
                    None => {
                        let url = pkgbuild::pkgbuild_variable(&content, "url")
                            .context("PKGBUILD has no url= line; pass --repo")?;
                        galley::release::repo_slug(&url)?
                    }
                };
                let release = galley::latest_release(&client, &slug)?;
                let (updated, summary) = galley::release::update_pkgbuild(&content, &release)?;

                report_update(&summary);
                if dry_run {
                    print!("{}", updated);
                } else if summary.changed {
                    std::fs::write(&path, updated)?;
                    println!("Updated {}", path.display());
                }
            } else {
                let mut recipe = galley::parse_recipe(&content)?;
                let slug = match repo {
                    Some(r) => r,
                    None => {
                        let homepage = recipe
                            .package
                            .homepage
                            .as_deref()
                            .context("Recipe has no homepage; pass --repo")?;
                        galley::release::repo_slug(homepage)?
                    }
                };
                let release = galley::latest_release(&client, &slug)?;
                let summary = galley::release::update_recipe(&mut recipe, &release)?;

                report_update(&summary);
                if dry_run {
                    print!("{}", toml::to_string_pretty(&recipe)?);
                } else if summary.changed {
                    std::fs::write(&path, toml::to_string_pretty(&recipe)?)?;
                    println!("Updated {}", path.display());
                }
            }
            Ok(())
        }
    }
}

fn report_update(summary: &galley::UpdateSummary) {
    if !summary.changed {
        println!("Already up to date ({})", summary.new_version);
        return;
    }
    if summary.old_version != summary.new_version {
        println!("{} -> {}", summary.old_version, summary.new_version);
    }
    for arch in &summary.updated_arches {
        println!("  new checksum for {}", arch);
    }
}
