use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use s3_storage_plugin::AccessLevel;

#[derive(Parser, Debug)]
#[command(name = "s3-storage")]
#[command(version, about = "Move objects through the storage plugin", long_about = None)]
pub(crate) struct Args {
    /// JSON plugin config; flags below override its fields
    #[arg(short, long, env = "STORAGE_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Storage backend type
    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = Backend::S3)]
    pub(crate) backend: Backend,

    /// Bucket name
    #[arg(short, long, env = "STORAGE_BUCKET")]
    pub(crate) bucket: Option<String>,

    /// Bucket region
    #[arg(short, long, env = "AWS_REGION")]
    pub(crate) region: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[arg(long, env = "STORAGE_ENDPOINT")]
    pub(crate) endpoint: Option<String>,

    /// Use path-style addressing (needed by most S3-compatible stores)
    #[arg(long, env = "STORAGE_FORCE_PATH_STYLE")]
    pub(crate) force_path_style: bool,

    /// Root directory for the local backend
    #[arg(long, env = "STORAGE_LOCAL_ROOT")]
    pub(crate) root: Option<PathBuf>,

    /// Access level for keys (guest, protected, private)
    #[arg(long, env = "STORAGE_ACCESS_LEVEL")]
    pub(crate) access_level: Option<AccessLevel>,

    /// Identity id used by the protected and private levels
    #[arg(long, env = "STORAGE_IDENTITY_ID")]
    pub(crate) identity_id: Option<String>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Backend {
    S3,
    Local,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    #[command(about = "Upload a local file using ./s3-storage upload <key> <file>")]
    Upload {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    #[command(about = "Download an object using ./s3-storage download <key> <file>")]
    Download {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    #[command(about = "List objects under a path using ./s3-storage list [path]")]
    List {
        #[arg(value_name = "PATH", default_value = "")]
        path: String,
    },
    #[command(about = "Remove an object using ./s3-storage remove <key>")]
    Remove {
        #[arg(value_name = "KEY")]
        key: String,
    },
    #[command(about = "Print a download URL using ./s3-storage url <key>")]
    Url {
        #[arg(value_name = "KEY")]
        key: String,
        /// URL lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        expires_secs: u64,
    },
}
