// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vexil CLI entrypoint.
//!
//! Operates on a file-backed flag store: each invocation loads the store
//! from `--dir`, applies one operation, and autosaves.
//!
//! # Usage
//! ```text
//! vexil --dir .vexil set dark_mode true
//! vexil --dir .vexil check 'dark_mode AND visits > 3'
//! ```
//!
//! Values for `set` are parsed as `true`/`false`, then as a number, then
//! fall back to a string. `get` exits non-zero when the key is Absent so
//! scripts can branch on presence.

#![deny(rust_2018_idioms)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]
// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use vexil_core::{FlagStore, FlagValue, PersistOptions};
use vexil_expr::Check as _;
use vexil_store_fs::FsBackend;

#[derive(Parser)]
#[command(name = "vexil", version, about = "Inspect and mutate a vexil flag store")]
struct Cli {
    /// Directory holding the store file.
    #[arg(long, default_value = ".vexil")]
    dir: PathBuf,

    /// Blob key (the store file is `<key>.json`).
    #[arg(long, default_value = "flags")]
    key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a flag's value; exits 1 when the key is Absent.
    Get {
        /// Flag key.
        key: String,
    },
    /// Set a flag (value parsed as bool, number, or string).
    Set {
        /// Flag key.
        key: String,
        /// New value.
        value: String,
    },
    /// Delete a flag.
    Del {
        /// Flag key.
        key: String,
    },
    /// Flip a boolean flag and print the new value.
    Toggle {
        /// Flag key.
        key: String,
    },
    /// Add to a numeric flag and print the new value.
    Incr {
        /// Flag key.
        key: String,
        /// Amount to add.
        #[arg(long, default_value_t = 1.0)]
        by: f64,
    },
    /// Subtract from a numeric flag and print the new value.
    Decr {
        /// Flag key.
        key: String,
        /// Amount to subtract.
        #[arg(long, default_value_t = 1.0)]
        by: f64,
    },
    /// List all keys.
    Keys,
    /// Print every flag as JSON.
    All,
    /// Evaluate a condition expression; prints `true` or `false`.
    Check {
        /// Condition expression, e.g. `dark_mode AND visits > 3`.
        expr: String,
    },
    /// Remove every plain flag.
    Clear,
}

fn parse_value(raw: &str) -> FlagValue {
    match raw {
        "true" => FlagValue::Bool(true),
        "false" => FlagValue::Bool(false),
        _ => raw
            .parse::<f64>()
            .map_or_else(|_| FlagValue::Str(raw.to_owned()), FlagValue::Num),
    }
}

fn open_store(dir: &PathBuf, key: &str) -> anyhow::Result<FlagStore> {
    let backend = FsBackend::at(dir).with_context(|| format!("opening store dir {}", dir.display()))?;
    let store = FlagStore::builder()
        .persist(PersistOptions::new(backend).blob_key(key))
        .build()
        .context("loading store")?;
    Ok(store)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = open_store(&cli.dir, &cli.key)?;
    match cli.command {
        Command::Get { key } => match store.get(&key) {
            Some(value) => println!("{value}"),
            None => return Ok(ExitCode::FAILURE),
        },
        Command::Set { key, value } => {
            store.set(&key, parse_value(&value))?;
        }
        Command::Del { key } => {
            store.delete(&key)?;
        }
        Command::Toggle { key } => {
            let new = store.toggle(&key)?;
            println!("{new}");
        }
        Command::Incr { key, by } => {
            let new = store.increment_by(&key, by)?;
            println!("{new}");
        }
        Command::Decr { key, by } => {
            let new = store.decrement_by(&key, by)?;
            println!("{new}");
        }
        Command::Keys => {
            for key in store.keys() {
                println!("{key}");
            }
        }
        Command::All => {
            let all = store.all();
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        Command::Check { expr } => {
            let verdict = store.check(&expr)?;
            println!("{verdict}");
        }
        Command::Clear => store.clear(),
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("vexil: {err:#}");
            ExitCode::FAILURE
        }
    }
}
