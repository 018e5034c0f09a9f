use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// Compiles Go-like source files into a single Bash script on stdout.
#[derive(Parser, Debug)]
#[command(name = "gotosh", version, about)]
pub struct Cli {
    /// Source files, compiled in order into one script.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        let script = crate::compile_files(&self.files)?;
        print!("{script}");
        Ok(())
    }
}
