// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: recipe file path
fn recipe_arg() -> Arg {
    Arg::new("recipe").required(true).help("Path to the recipe file")
}

/// Common argument: target architecture
fn arch_arg() -> Arg {
    Arg::new("arch")
        .short('a')
        .long("arch")
        .value_name("ARCH")
        .help("Target architecture (x86_64 or aarch64)")
}

/// Common argument: archive cache directory
fn cache_dir_arg() -> Arg {
    Arg::new("cache_dir")
        .long("cache-dir")
        .value_name("DIR")
        .help("Directory for downloaded archives")
}

fn build_cli() -> Command {
    Command::new("galley")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Galley Contributors")
        .about("Package and install prebuilt binary releases from recipes")
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Fetch, verify, and install a recipe into a staging root")
                .arg(recipe_arg())
                .arg(arch_arg())
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .default_value("/")
                        .help("Staging root to install into"),
                )
                .arg(cache_dir_arg())
                .arg(
                    Arg::new("keep_workdir")
                        .long("keep-workdir")
                        .action(clap::ArgAction::SetTrue)
                        .help("Keep the extraction workdir for inspection"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(clap::ArgAction::SetTrue)
                        .help("Suppress download progress bars"),
                ),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify release archives without installing")
                .arg(recipe_arg())
                .arg(arch_arg())
                .arg(cache_dir_arg()),
        )
        .subcommand(
            Command::new("lint")
                .about("Validate a recipe and print warnings")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Print recipe metadata and resolved archive URLs")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a PKGBUILD for a prebuilt package to recipe format")
                .arg(Arg::new("pkgbuild").required(true).help("Path to the PKGBUILD"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write the recipe here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update a recipe or PKGBUILD to the latest upstream release")
                .arg(Arg::new("path").required(true).help("Path to the recipe or PKGBUILD"))
                .arg(
                    Arg::new("repo")
                        .long("repo")
                        .value_name("OWNER/NAME")
                        .help("GitHub repository slug (default: from the recipe's homepage)"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print the updated file instead of writing it back"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("galley.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }
}
