//! Shell completion generation using clap_complete.

use anyhow::{Context, Result};
use clap::{Command, CommandFactory};
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::{fs, io};

use crate::cli::{Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "ctxr";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd: Command = Cli::command();
    let shell: CompletionShell = args.shell.into();

    if args.stdout {
        // Generate to stdout
        generate(shell, &mut cmd, BIN_NAME, &mut io::stdout());
        return Ok(());
    }

    let dir = args
        .out_dir
        .ok_or_else(|| anyhow::anyhow!("--out-dir is required unless --stdout is set"))?;

    fs::create_dir_all(&dir).context("create --out-dir")?;
    let path = generate_to(shell, &mut cmd, BIN_NAME, &dir)
        .context("generate completion file")?;

    eprintln!("Wrote completion to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_a_completion_file() -> Result<()> {
        let tmp = TempDir::new()?;
        run(CompletionsArgs {
            shell: Shell::Bash,
            out_dir: Some(tmp.path().to_path_buf()),
            stdout: false,
        })?;
        assert!(tmp.path().join("ctxr.bash").exists());
        Ok(())
    }

    #[test]
    fn missing_out_dir_is_an_error() {
        let err = run(CompletionsArgs {
            shell: Shell::Zsh,
            out_dir: None,
            stdout: false,
        });
        assert!(err.is_err());
    }
}
