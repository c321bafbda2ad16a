#![forbid(unsafe_code)]

//! Sigill CLI: inspect certificate stores, run key resolution and evaluate
//! the MAC output-length policy.

use base64::Engine;
use clap::{Parser, Subcommand};
use sigill_core::{ns, Error};
use sigill_crypto::{validate_output_length, MacFamily, MacPolicy};
use sigill_keys::{
    DirectorySource, KeyInfo, KeyResolverChain, KeysManager, ResolverKind, StorageResolver,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "sigill",
    about = "Sigill — XML Digital Signature key resolution and algorithm policy",
    version
)]
struct Cli {
    /// Enable diagnostic output (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the certificates loaded from one or more directories
    Certs {
        /// Directories holding `.crt` files (DER or PEM)
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },

    /// Resolve the key named by a document's <KeyInfo>
    Resolve {
        /// Input XML file
        file: PathBuf,

        /// Certificate directory for the storage resolver (repeatable)
        #[arg(long = "cert-dir")]
        cert_dir: Vec<PathBuf>,

        /// Resolver to run, in order (repeatable; default chain if omitted)
        #[arg(long = "resolver")]
        resolver: Vec<ResolverKind>,

        /// Load key with a name (NAME:FILE)
        #[arg(short = 'K', long = "key-name")]
        key_name: Vec<String>,
    },

    /// Check an HMAC output length against the truncation policy
    Policy {
        /// HMAC SignatureMethod URI
        algorithm: String,

        /// Requested output length in bits
        bits: usize,

        /// Accept lengths below the family minimum
        #[arg(long = "allow-truncation")]
        allow_truncation: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Certs { dirs } => cmd_certs(&dirs),
        Commands::Resolve {
            file,
            cert_dir,
            resolver,
            key_name,
        } => cmd_resolve(&file, &cert_dir, &resolver, &key_name),
        Commands::Policy {
            algorithm,
            bits,
            allow_truncation,
        } => cmd_policy(&algorithm, bits, allow_truncation),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_certs(dirs: &[PathBuf]) -> Result<(), Error> {
    let storage = open_storage(dirs)?;
    let engine = base64::engine::general_purpose::STANDARD;
    for cert in storage.iter() {
        println!("SKI:     {}", engine.encode(cert.subject_key_identifier()));
        println!("Serial:  {}", cert.serial_decimal());
        println!("Subject: {}", cert.subject());
        println!("Issuer:  {}", cert.issuer());
        println!();
    }
    eprintln!(
        "{} certificate(s) from {} source(s)",
        storage.len(),
        storage.source_count()
    );
    Ok(())
}

fn cmd_resolve(
    file: &Path,
    cert_dirs: &[PathBuf],
    kinds: &[ResolverKind],
    key_names: &[String],
) -> Result<(), Error> {
    let xml = std::fs::read_to_string(file)?;
    let arena = sigill_xml::parse_events(&xml)?;
    let key_info = match arena.find_element(ns::DSIG, ns::node::KEY_INFO) {
        Some(node) => KeyInfo::from_events(&arena, node)?,
        None => KeyInfo::new(),
    };

    let manager = build_keys_manager(key_names)?;
    let kinds: Vec<ResolverKind> = if !kinds.is_empty() {
        kinds.to_vec()
    } else if manager.is_empty() {
        ResolverKind::DEFAULT_ORDER.to_vec()
    } else {
        std::iter::once(ResolverKind::KeyName)
            .chain(ResolverKind::DEFAULT_ORDER.iter().copied())
            .collect()
    };
    let chain = KeyResolverChain::from_kinds(&kinds, Some(Arc::new(manager)));
    tracing::debug!(chain = ?chain.names(), "resolver chain");

    let storage = if cert_dirs.is_empty() {
        None
    } else {
        Some(open_storage(cert_dirs)?)
    };

    let key = chain.resolve(&key_info, storage.as_ref())?;
    println!("Key:     {}", key.data.algorithm_name());
    if let Some(name) = &key.name {
        println!("Name:    {name}");
    }
    if let Some(cert) = &key.certificate {
        println!("Subject: {}", cert.subject());
        println!("Issuer:  {}", cert.issuer());
        println!("Serial:  {}", cert.serial_decimal());
    }
    Ok(())
}

fn cmd_policy(algorithm: &str, bits: usize, allow_truncation: bool) -> Result<(), Error> {
    let family = MacFamily::from_uri(algorithm)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("not an HMAC algorithm: {algorithm}")))?;
    let policy = MacPolicy {
        allow_truncation_below_minimum: allow_truncation,
    };
    validate_output_length(family, bits, policy)?;
    println!(
        "OK: {} with {bits} bits (minimum {}, digest {})",
        family.name(),
        family.minimum_output_bits(),
        family.digest_bits()
    );
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn open_storage(dirs: &[PathBuf]) -> Result<StorageResolver, Error> {
    let mut storage = StorageResolver::new();
    for dir in dirs {
        storage.add(DirectorySource::open(dir)?);
    }
    Ok(storage)
}

fn build_keys_manager(key_names: &[String]) -> Result<KeysManager, Error> {
    let mut mgr = KeysManager::new();

    // Load named keys (NAME:FILE format)
    for spec in key_names {
        let Some((name, file_str)) = spec.split_once(':') else {
            return Err(Error::Key(format!(
                "invalid key-name format: {spec} (expected NAME:FILE)"
            )));
        };
        let key = sigill_keys::loader::load_key_file(Path::new(file_str))?;
        mgr.add_key(key.with_name(name));
    }

    Ok(mgr)
}
