//! autotls - command line entry point
//!
//! Reads a JSON document holding global options and server block pairings,
//! and compiles it into the TLS app configuration.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use serde_json::Map;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use autotls_common::{init_tracing, ModuleId};
use autotls_config::{
    BuildOutput, GlobalOptions, ServerBlockPairing, StaticModuleRegistry, TlsAppBuilder,
};

/// autotls - compile server blocks into TLS certificate automation policies
#[derive(Parser, Debug)]
#[command(name = "autotls")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile the input and print the TLS app as JSON
    Compile {
        #[command(flatten)]
        input: InputArgs,

        /// Pretty-print the JSON output
        #[arg(long = "pretty")]
        pretty: bool,
    },
    /// Compile the input and print a summary
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input document path
    #[arg(short = 'i', long = "input", env = "AUTOTLS_INPUT")]
    path: PathBuf,

    /// Additional DNS provider module to consider registered (repeatable)
    #[arg(long = "dns-provider", value_name = "NAME")]
    dns_providers: Vec<String>,
}

/// Document read from the input file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InputDocument {
    options: GlobalOptions,
    pairings: Vec<ServerBlockPairing>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Compile { input, pretty } => compile_command(&input, pretty),
        Commands::Check { input } => check_command(&input),
    }
}

/// Print the compiled TLS app
fn compile_command(input: &InputArgs, pretty: bool) -> Result<()> {
    let output = compile_input(input)?;

    let json = if pretty {
        serde_json::to_string_pretty(&output.tls)
    } else {
        serde_json::to_string(&output.tls)
    }
    .context("Failed to serialize TLS app")?;

    println!("{}", json);
    Ok(())
}

/// Compile the input and report what it produced
fn check_command(input: &InputArgs) -> Result<()> {
    let output = compile_input(input)?;
    let tls = &output.tls;

    info!("TLS policy check successful:");
    info!("  - {} automation policy(ies)", tls.policies().len());
    info!("  - {} certificate loader kind(s)", tls.certificates.len());
    info!("  - {} warning(s)", output.warnings.len());

    let loaders: Vec<&str> = tls.certificates.keys().map(String::as_str).collect();
    println!(
        "autotls: {} compiles to {} policies, loaders [{}], {} warnings",
        input.path.display(),
        tls.policies().len(),
        loaders.join(", "),
        output.warnings.len()
    );

    Ok(())
}

fn compile_input(input: &InputArgs) -> Result<BuildOutput> {
    let document = load_document(&input.path)?;
    let registry = build_registry(&input.dns_providers);

    info!(
        path = %input.path.display(),
        pairings = document.pairings.len(),
        "Compiling TLS policies"
    );

    TlsAppBuilder::new(&document.options, &registry)
        .build(&document.pairings)
        .with_context(|| format!("Failed to compile {}", input.path.display()))
}

fn load_document(path: &Path) -> Result<InputDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input file {}", path.display()))
}

fn build_registry(dns_providers: &[String]) -> StaticModuleRegistry {
    let mut registry = StaticModuleRegistry::with_builtin_dns_providers();
    for name in dns_providers {
        debug!(provider = %name, "Registering DNS provider from command line");
        registry.register(ModuleId::dns_provider(name), Map::new());
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn input_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(file: &NamedTempFile, dns_providers: &[&str]) -> InputArgs {
        InputArgs {
            path: file.path().to_path_buf(),
            dns_providers: dns_providers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_arguments() {
        let cli = Cli::try_parse_from([
            "autotls",
            "compile",
            "-i",
            "input.json",
            "--pretty",
            "--dns-provider",
            "route53",
            "--dns-provider",
            "gandi",
        ])
        .unwrap();

        match cli.command {
            Commands::Compile { input, pretty } => {
                assert!(pretty);
                assert_eq!(input.path, PathBuf::from("input.json"));
                assert_eq!(input.dns_providers, vec!["route53", "gandi"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_empty_document() {
        let file = input_file("{}");
        let output = compile_input(&args(&file, &[])).unwrap();
        assert!(output.tls.automation.is_none());
        assert!(output.tls.certificates.is_empty());
    }

    #[test]
    fn test_compile_document() {
        let file = input_file(
            r#"{
                "options": {"local_certs": true},
                "pairings": [
                    {"server_blocks": [{"keys": [{"host": "a.example"}]}]}
                ]
            }"#,
        );

        let output = compile_input(&args(&file, &[])).unwrap();

        let policies = output.tls.policies();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].subjects, vec!["a.example"]);
    }

    #[test]
    fn test_dns_provider_flag_registers_module() {
        let file = input_file(
            r#"{
                "options": {"acme_dns": "route53"},
                "pairings": [
                    {"server_blocks": [{"keys": [{"host": "a.example"}]}]}
                ]
            }"#,
        );

        let err = compile_input(&args(&file, &[])).unwrap_err();
        assert!(format!("{:#}", err).contains("dns.providers.route53"));

        let output = compile_input(&args(&file, &["route53"])).unwrap();
        assert_eq!(output.tls.policies().len(), 1);
    }

    #[test]
    fn test_malformed_document() {
        let file = input_file("{not json");
        let err = compile_input(&args(&file, &[])).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse input file"));
    }

    #[test]
    fn test_missing_file() {
        let input = InputArgs {
            path: PathBuf::from("/nonexistent/autotls-input.json"),
            dns_providers: Vec::new(),
        };
        let err = compile_input(&input).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read input file"));
    }
}
