use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for orbfield")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests, the client runtime checks and doc in order
    Check,
    /// Check formatting
    Fmt,
    /// Lint all targets, warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Run the client runtime checks under node
    Js,
    /// Run the scheduler benchmark
    Bench,
    /// Run the module server against a directory
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(short, long, default_value = ".")]
        root: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            for step in [Step::Fmt, Step::Clippy, Step::Test, Step::Js, Step::Doc] {
                step.run()?;
            }
        }
        Commands::Fmt => Step::Fmt.run()?,
        Commands::Clippy => Step::Clippy.run()?,
        Commands::Test => Step::Test.run()?,
        Commands::Doc => Step::Doc.run()?,
        Commands::Js => Step::Js.run()?,
        Commands::Bench => Step::Bench.run()?,
        Commands::Serve { port, root } => {
            let port = port.to_string();
            cargo(
                "serve",
                &[
                    "run", "-p", "orbfield-server", "--", "--port", &port, "--root", &root,
                ],
            )?;
        }
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum Step {
    Fmt,
    Clippy,
    Test,
    Doc,
    Js,
    Bench,
}

impl Step {
    fn run(self) -> Result<()> {
        match self {
            Step::Fmt => cargo("fmt", &["fmt", "--all", "--", "--check"]),
            Step::Clippy => cargo(
                "clippy",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            ),
            Step::Test => cargo("test", &["test", "--workspace"]),
            Step::Doc => cargo("doc", &["doc", "--workspace", "--no-deps"]),
            Step::Js => node("crates/bundle/tests/runtime_harness.js"),
            Step::Bench => cargo(
                "bench",
                &["bench", "-p", "orbfield-kernel", "--bench", "bench_scheduler"],
            ),
        }
    }
}

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("failed to spawn cargo for {step}"))?;
    if !status.success() {
        anyhow::bail!("{step} failed");
    }
    Ok(())
}

fn node(script: &str) -> Result<()> {
    println!("==> node {script}");
    let status = Command::new("node")
        .arg(script)
        .status()
        .context("failed to spawn node")?;
    if !status.success() {
        anyhow::bail!("client runtime checks failed");
    }
    Ok(())
}
