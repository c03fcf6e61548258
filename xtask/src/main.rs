use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};

/// Where `solanaroll-deploy` looks for the program binary by default.
const PROGRAM_OUT_DIR: &str = "target/deploy";

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Solanaroll helper tasks (build the on-chain program, clippy, tests)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the on-chain program with cargo build-sbf
    BuildProgram(ProgramArgs),
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy,
    /// Run the workspace tests, optionally rebuilding the program first
    Test {
        /// Rebuild the on-chain program before testing
        #[arg(long)]
        with_program: bool,
        /// Cargo.toml of the on-chain program crate
        #[arg(long = "manifest-path", env = "SOLANAROLL_PROGRAM_MANIFEST")]
        manifest: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ProgramArgs {
    /// Cargo.toml of the on-chain program crate
    #[arg(long = "manifest-path", env = "SOLANAROLL_PROGRAM_MANIFEST")]
    manifest: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root()?;

    match cli.command {
        Commands::BuildProgram(program) => build_program(&root, &program.manifest)?,
        Commands::Clippy => run_clippy(&root)?,
        Commands::Test {
            with_program,
            manifest,
        } => {
            if with_program {
                let manifest = manifest.context(
                    "--with-program needs --manifest-path or SOLANAROLL_PROGRAM_MANIFEST",
                )?;
                build_program(&root, &manifest)?;
            }
            run_tests(&root)?;
        }
    }

    Ok(())
}

fn repo_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn build_program(root: &Path, manifest: &Path) -> Result<()> {
    let manifest = root.join(manifest);
    ensure!(
        manifest.is_file(),
        "missing program manifest at {}",
        manifest.display()
    );
    let mut cmd = Command::new("cargo");
    cmd.arg("build-sbf")
        .arg("--manifest-path")
        .arg(&manifest)
        .arg("--sbf-out-dir")
        .arg(root.join(PROGRAM_OUT_DIR))
        .current_dir(root);
    run_command(cmd, "cargo build-sbf")
}

fn run_clippy(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy")
        .arg("--workspace")
        .arg("--all-targets")
        .arg("--all-features")
        .arg("--")
        .arg("-D")
        .arg("warnings")
        .current_dir(root);
    run_command(cmd, "cargo clippy")
}

fn run_tests(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test").arg("--workspace").current_dir(root);
    run_command(cmd, "cargo test --workspace")
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn build_program__takes_the_manifest_from_the_command_line() {
        // when
        let cli = Cli::try_parse_from([
            "xtask",
            "build-program",
            "--manifest-path",
            "../solanaroll-program/Cargo.toml",
        ])
        .unwrap();

        // then
        let Commands::BuildProgram(program) = cli.command else {
            panic!("expected build-program");
        };
        assert_eq!(
            program.manifest,
            PathBuf::from("../solanaroll-program/Cargo.toml")
        );
    }

    #[test]
    fn build_program__reports_a_missing_manifest() {
        // given
        let root = repo_root().unwrap();

        // when
        let err = build_program(&root, Path::new("no-such-program/Cargo.toml")).unwrap_err();

        // then
        assert!(err.to_string().contains("missing program manifest"));
    }
}
