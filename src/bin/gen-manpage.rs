//! Man page generator for synadiag
//!
//! Writes `synadiag.1` plus one `synadiag-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    let path = dir.join(format!("{}.1", name));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    for sub in cmd.get_subcommands() {
        let name = format!("synadiag-{}", sub.get_name());
        let page = sub.clone().name(name.clone());
        render(page, &output_dir, &name)?;
    }
    let main_page = render(cmd, &output_dir, "synadiag")?;

    println!("Man pages generated in: {}", output_dir.display());
    println!("\nTo view the man page:");
    println!("  man -l {}", main_page.display());
    println!("\nTo install system-wide (requires sudo):");
    println!(
        "  sudo cp {}/*.1 /usr/local/share/man/man1/",
        output_dir.display()
    );
    println!("  sudo mandb");

    Ok(())
}
