// lcp-core - Readium LCP license and decryption service
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use lcp_core::crypto::ContentKey;
use lcp_core::{container, decrypt, service, License, ServiceConfig, ServiceHandle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lcp-cli")]
#[command(about = "LCP CLI - Desktop testing tool for licenses and protected EPUBs", long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Service configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// User passphrase, added to the configured keys. May be repeated.
    #[arg(short, long, global = true)]
    passphrase: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a license (.lcpl or EPUB) and print its summary
    Inspect {
        /// License document or EPUB container
        path: PathBuf,
    },
    /// Print the print and copy allowances of a license
    Rights {
        /// License document or EPUB container
        path: PathBuf,
    },
    /// Write a license into an EPUB container
    Inject {
        /// EPUB container
        epub: PathBuf,
        /// License document
        license: PathBuf,
    },
    /// Print the license embedded in an EPUB container
    Extract {
        /// EPUB container
        epub: PathBuf,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt a resource
    Decrypt {
        /// License document or EPUB container holding it
        #[arg(short, long)]
        license: PathBuf,
        /// Encrypted resource
        input: PathBuf,
        /// Where to write the plaintext
        output: PathBuf,
    },
    /// Encrypt a resource with a raw content key
    Encrypt {
        /// Content key as 64 hex characters
        #[arg(short, long)]
        key: String,
        /// Plaintext resource
        input: PathBuf,
        /// Where to write the ciphertext
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Inspect { ref path } => {
            let handle = open_service(&cli)?;
            let result = load_license(handle, path);
            service::release_service(handle)?;
            let license = result?;
            println!("{}", serde_json::to_string_pretty(&license.summary())?);
        }
        Commands::Rights { ref path } => {
            let handle = open_service(&cli)?;
            let result = license_content(path)
                .and_then(|content| Ok(service::rights(handle, &content)?));
            service::release_service(handle)?;
            println!("{}", serde_json::to_string_pretty(&result?)?);
        }
        Commands::Inject { epub, license } => {
            let content = std::fs::read_to_string(&license)
                .with_context(|| format!("reading {}", license.display()))?;
            container::inject_license(&epub, &content)?;
            println!("Injected {} into {}", license.display(), epub.display());
        }
        Commands::Extract { epub, output } => {
            let content = container::read_license(&epub)?;
            match output {
                Some(path) => std::fs::write(&path, content)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", content),
            }
        }
        Commands::Decrypt {
            ref license,
            ref input,
            ref output,
        } => {
            let handle = open_service(&cli)?;
            let result = license_content(license)
                .and_then(|content| Ok(service::decrypt_file(handle, &content, input, output)?));
            service::release_service(handle)?;
            let written = result?;
            println!(
                "Decrypted {} -> {} ({} bytes)",
                input.display(),
                output.display(),
                written
            );
        }
        Commands::Encrypt { key, input, output } => {
            let bytes = hex::decode(key.trim()).context("content key is not hex")?;
            let key = ContentKey::from_slice(&bytes)?;
            let written = decrypt::encrypt_file(&key, &input, &output)?;
            println!("Encrypted {} -> {} ({} bytes)", input.display(), output.display(), written);
        }
    }
    Ok(())
}

fn open_service(cli: &Cli) -> anyhow::Result<ServiceHandle> {
    let path = cli
        .config
        .as_ref()
        .ok_or_else(|| anyhow!("--config is required for this command"))?;
    let mut config = ServiceConfig::from_file(path)?;
    config.user_passphrases.extend(cli.passphrase.iter().cloned());
    Ok(service::create_service(&config)?)
}

fn load_license(handle: ServiceHandle, path: &Path) -> anyhow::Result<License> {
    let content = license_content(path)?;
    Ok(service::open_license(handle, &content)?)
}

/// Read license content from a .lcpl file or from inside an EPUB
fn license_content(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    if container::has_license(path).unwrap_or(false) {
        return Ok(container::read_license(path)?);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
