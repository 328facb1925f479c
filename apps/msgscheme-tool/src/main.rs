//! CLI tool for scheme inspection and message handling.
//!
//! Provides commands for:
//! - Printing compiled layouts and fingerprints
//! - Packing JSON records into hex buffers and unpacking them back
//! - Converting buffers between two versions of a scheme

mod cli;
mod json;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use msgscheme_core::codec::{pack, unpack};
use msgscheme_core::config::SchemeConfig;
use msgscheme_core::convert::{Converted, Converter};
use msgscheme_core::scheme::{compile_with_config, Message, Scheme, SchemeSource};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = SchemeConfig {
        default_ptr_version: cli.ptr_version,
        fail_on: cli.fail_on,
    };

    match cli.command {
        Commands::Layout { scheme, message } => {
            let scheme = load_scheme(&scheme, &config)?;
            let text = match message {
                Some(name) => serde_json::to_string_pretty(find_message(&scheme, &name)?)?,
                None => serde_json::to_string_pretty(scheme.as_ref())?,
            };
            println!("{}", text);
        }
        Commands::Fingerprint { scheme } => {
            let scheme = load_scheme(&scheme, &config)?;
            for message in &scheme.messages {
                let msgid = message.msgid.map_or_else(|| "-".to_string(), |id| id.to_string());
                println!("{:08x}  {:>6}  {}", message.fingerprint, msgid, message.name);
            }
            println!("{:08x}  scheme", scheme.fingerprint());
        }
        Commands::Pack {
            scheme,
            message,
            input,
        } => {
            let scheme = load_scheme(&scheme, &config)?;
            let message = find_message(&scheme, &message)?;
            let text = match input {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("reading record from stdin")?;
                    text
                }
            };
            let value: serde_json::Value = serde_json::from_str(&text).context("parsing JSON record")?;
            let record = json::record_from_json(&scheme, message, &value)?;
            let data = pack(&scheme, message, &record)
                .with_context(|| format!("packing message '{}'", message.name))?;
            debug!(message = %message.name, bytes = data.len(), "message packed");
            println!("{}", hex::encode(data));
        }
        Commands::Unpack {
            scheme,
            message,
            data,
        } => {
            let scheme = load_scheme(&scheme, &config)?;
            let message = find_message(&scheme, &message)?;
            let bytes = decode_hex(&data)?;
            let record = unpack(&scheme, message, &bytes)
                .with_context(|| format!("unpacking message '{}'", message.name))?;
            let value = json::record_to_json(&scheme, message, &record);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Convert {
            from,
            to,
            message,
            data,
        } => {
            let from = load_scheme(&from, &config)?;
            let to = load_scheme(&to, &config)?;
            let converter = Converter::from_config(from, to, &config).context("building conversion plan")?;
            info!(policy = %converter.policy(), "conversion plan ready");

            let buffers = data.iter().map(|d| decode_hex(d)).collect::<Result<Vec<_>>>()?;
            let mut failed = 0usize;
            for (i, result) in convert_all(&converter, &message, &buffers).into_iter().enumerate() {
                match result {
                    Ok(converted) => println!(
                        "{}",
                        serde_json::json!({
                            "name": converted.name,
                            "msgid": converted.msgid,
                            "data": hex::encode(&converted.data),
                        })
                    ),
                    Err(e) => {
                        warn!(index = i, error = %e, "conversion failed");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(anyhow!("{} of {} buffers failed to convert", failed, buffers.len()));
            }
        }
    }

    Ok(())
}

/// Loads a JSON scheme source with its imports and compiles it.
fn load_scheme(path: &Path, config: &SchemeConfig) -> Result<Arc<Scheme>> {
    let source = SchemeSource::load(path).with_context(|| format!("loading scheme {}", path.display()))?;
    let scheme = compile_with_config(&source, config)
        .with_context(|| format!("compiling scheme {}", path.display()))?;
    debug!(
        path = %path.display(),
        messages = scheme.messages.len(),
        fingerprint = scheme.fingerprint(),
        "scheme loaded"
    );
    Ok(Arc::new(scheme))
}

fn find_message<'s>(scheme: &'s Scheme, name: &str) -> Result<&'s Message> {
    scheme
        .message(name)
        .ok_or_else(|| anyhow!("message '{}' is not declared", name))
}

/// Decodes a hex buffer, accepting a `0x` prefix and embedded whitespace.
fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(&digits).with_context(|| format!("invalid hex buffer '{}'", text))
}

#[cfg(feature = "parallel")]
fn convert_all(
    converter: &Converter,
    message: &str,
    buffers: &[Vec<u8>],
) -> Vec<Result<Converted, msgscheme_core::ConversionError>> {
    let items: Vec<(&str, &[u8])> = buffers.iter().map(|b| (message, b.as_slice())).collect();
    converter.convert_batch(&items)
}

#[cfg(not(feature = "parallel"))]
fn convert_all(
    converter: &Converter,
    message: &str,
    buffers: &[Vec<u8>],
) -> Vec<Result<Converted, msgscheme_core::ConversionError>> {
    buffers.iter().map(|b| converter.convert(message, b)).collect()
}
