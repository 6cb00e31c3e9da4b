//! sealstream: chunked authenticated file encryption CLI
//!
//! Commands:
//!   encrypt <input> <output>  - encrypt a file; generates and prints a key
//!                               unless one is supplied
//!   decrypt <input> <output>  - decrypt a file; requires the key
//!   keygen [--out <path>]     - generate a key and print or store it
//!
//! Keys are 64 hex characters (256-bit) and travel out-of-band: the
//! ciphertext never contains or references the key.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use sealstream_core::{codec, StreamKey};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealstream",
    version,
    about = "Chunked authenticated file encryption",
    long_about = "sealstream: encrypt and decrypt files of any size in 64 KiB \
                  authenticated chunks, with tamper detection on every chunk"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SEALSTREAM_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file
    ///
    /// Without --key or --key-file a fresh key is generated and printed to
    /// stdout. Capture it: the output cannot be decrypted without it.
    Encrypt {
        /// Plaintext input path
        input: PathBuf,
        /// Ciphertext output path
        output: PathBuf,
        /// Key as 64 hex characters
        #[arg(long, env = "SEALSTREAM_KEY")]
        key: Option<String>,
        /// File containing the key in hex (e.g. output of `sealstream keygen`)
        #[arg(long, conflicts_with = "key")]
        key_file: Option<PathBuf>,
    },

    /// Decrypt a file
    Decrypt {
        /// Ciphertext input path
        input: PathBuf,
        /// Plaintext output path
        output: PathBuf,
        /// Key as 64 hex characters
        #[arg(long, env = "SEALSTREAM_KEY")]
        key: Option<String>,
        /// File containing the key in hex
        #[arg(long, conflicts_with = "key")]
        key_file: Option<PathBuf>,
    },

    /// Generate a key
    Keygen {
        /// Write the key to this file (created with mode 0600 on unix)
        /// instead of printing it
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            key,
            key_file,
        } => cmd_encrypt(&input, &output, key.as_deref(), key_file.as_deref()),
        Commands::Decrypt {
            input,
            output,
            key,
            key_file,
        } => cmd_decrypt(&input, &output, key.as_deref(), key_file.as_deref()),
        Commands::Keygen { out } => cmd_keygen(out.as_deref()),
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Key loading ───────────────────────────────────────────────────────────────

/// Resolve a key from --key hex or --key-file, if either was given.
fn load_key(key_hex: Option<&str>, key_file: Option<&Path>) -> Result<Option<StreamKey>> {
    if let Some(hex) = key_hex {
        let key = StreamKey::from_hex(hex).context("parsing --key")?;
        return Ok(Some(key));
    }
    if let Some(path) = key_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?;
        let key = StreamKey::from_hex(&content)
            .with_context(|| format!("parsing key file: {}", path.display()))?;
        return Ok(Some(key));
    }
    Ok(None)
}

// ── `sealstream encrypt` ──────────────────────────────────────────────────────

fn cmd_encrypt(
    input: &Path,
    output: &Path,
    key_hex: Option<&str>,
    key_file: Option<&Path>,
) -> Result<()> {
    let (key, generated) = match load_key(key_hex, key_file)? {
        Some(key) => (key, false),
        None => (StreamKey::generate(), true),
    };

    if generated {
        println!("key: {}", key.to_hex());
        println!("(save this key — the output cannot be decrypted without it)");
    }

    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("opening input: {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating output: {}", output.display()))?,
    );

    let summary = codec::encrypt_stream(&mut reader, &mut writer, &key)
        .with_context(|| format!("encrypting {}", input.display()))?;

    info!(
        records = summary.records,
        bytes = summary.plaintext_bytes,
        "encryption complete"
    );
    println!("encrypted {} → {}", input.display(), output.display());
    println!("  records:  {}", summary.records);
    println!("  input:    {}", fmt_bytes(summary.plaintext_bytes));
    println!("  output:   {}", fmt_bytes(summary.ciphertext_bytes));
    println!(
        "  overhead: {} bytes",
        summary.ciphertext_bytes - summary.plaintext_bytes
    );

    Ok(())
}

// ── `sealstream decrypt` ──────────────────────────────────────────────────────

fn cmd_decrypt(
    input: &Path,
    output: &Path,
    key_hex: Option<&str>,
    key_file: Option<&Path>,
) -> Result<()> {
    let key = load_key(key_hex, key_file)?
        .context("decryption requires a key: pass --key, --key-file, or set SEALSTREAM_KEY")?;

    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("opening input: {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating output: {}", output.display()))?,
    );

    let summary = codec::decrypt_stream(&mut reader, &mut writer, &key)
        .with_context(|| format!("decrypting {}", input.display()))?;

    info!(
        records = summary.records,
        bytes = summary.plaintext_bytes,
        "decryption complete"
    );
    println!("decrypted {} → {}", input.display(), output.display());
    println!("  records: {}", summary.records);
    println!("  output:  {}", fmt_bytes(summary.plaintext_bytes));

    Ok(())
}

// ── `sealstream keygen` ───────────────────────────────────────────────────────

fn cmd_keygen(out: Option<&Path>) -> Result<()> {
    let key = StreamKey::generate();

    match out {
        Some(path) => {
            write_key_file(path, &key)
                .with_context(|| format!("writing key file: {}", path.display()))?;
            println!("key written to {}", path.display());
        }
        None => {
            println!("{}", key.to_hex());
        }
    }

    Ok(())
}

/// Write the key hex to `path`, owner-readable only on unix.
fn write_key_file(path: &Path, key: &StreamKey) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    writeln!(file, "{}", key.to_hex())?;
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
