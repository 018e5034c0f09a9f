//! gotosh compiles a statically-typed, Go-like imperative subset into a
//! single self-contained Bash script.
//!
//! You probably want to start with the [compile] or [compile_files] wrapper
//! functions. The pipeline, for more granular access via [Compiler]:
//!
//! ```ascii
//!   source files
//!        │
//!        ▼  Scanner (token stream, one-slot pushback)
//!   token stream
//!        │
//!        ▼  expression translator / statement emitter
//!   ShellExpr value- and exec-forms
//!        │
//!        ▼  indent-aware output buffer
//!   #!/bin/bash script
//! ```
//!
//! The emitted script reproduces the observable behavior of the source
//! program as closely as a shell permits: same stdout, same exit status,
//! same side effects on files and the environment. Translation is
//! best-effort by design — constructs the translator does not understand
//! become `# Unknown token` comments instead of aborting the compile.

mod cli;
mod scanner;
mod shell;
#[cfg(test)]
mod test;
mod types;
mod utils;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub use cli::Cli;
pub use shell::Compiler;

/// Compile a single SRC source string into a Bash script.
pub fn compile(source: &str) -> Result<String> {
    let mut compiler = Compiler::new();
    compiler.compile(source, "<input>")?;
    Ok(compiler.finish())
}

/// Compile source files, in order, into one script sharing a single state.
/// A `main "${@}"` call is appended when any file defined `func main`.
pub fn compile_files<P: AsRef<Path>>(sources: &[P]) -> Result<String> {
    let mut compiler = Compiler::new();
    for path in sources {
        let path = path.as_ref();
        let src = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        compiler.compile(&src, &path.to_string_lossy())?;
    }
    Ok(compiler.finish())
}
