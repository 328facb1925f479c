use std::path::PathBuf;

use clap::{Parser, Subcommand};
use msgscheme_core::config::FailOn;
use msgscheme_core::scheme::PtrVersion;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Offset pointer encoding for lists without an explicit `offset-ptr-type`
    #[arg(long, global = true, default_value = "default")]
    pub ptr_version: PtrVersion,

    /// When incompatible fields fail a conversion (init or data)
    #[arg(long, global = true, default_value = "init")]
    pub fail_on: FailOn,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the compiled layout of a scheme as JSON
    Layout {
        /// JSON scheme source
        scheme: PathBuf,

        /// Only print this message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the layout fingerprint of every message
    Fingerprint {
        /// JSON scheme source
        scheme: PathBuf,
    },

    /// Pack a JSON record into a hex encoded buffer
    Pack {
        /// JSON scheme source
        scheme: PathBuf,

        /// Message name
        message: String,

        /// JSON record file, stdin when absent
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Unpack a hex encoded buffer into a JSON record
    Unpack {
        /// JSON scheme source
        scheme: PathBuf,

        /// Message name
        message: String,

        /// Hex encoded message buffer
        data: String,
    },

    /// Convert hex encoded buffers from one scheme to another
    Convert {
        /// Source scheme
        #[arg(long)]
        from: PathBuf,

        /// Destination scheme
        #[arg(long)]
        to: PathBuf,

        /// Source message name
        message: String,

        /// Hex encoded message buffers
        #[arg(required = true)]
        data: Vec<String>,
    },
}
