use crate::etcd_encoding::StorageEncoding;
use clap::{Parser, Subcommand};
use clio::ClioPath;
use log::LevelFilter;

/// Checks and maintains OAuth access tokens, authorization codes and clients
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// etcd endpoint of the cluster whose OAuth objects to work on. Without one, an in-memory
    /// store seeded from --seed-file is used.
    #[clap(long, conflicts_with = "seed_file")]
    pub(crate) etcd_endpoint: Option<String>,

    /// A YAML or JSON resource document to load into the in-memory store. Can specify multiple
    /// times
    #[clap(long, value_parser = clap::value_parser!(ClioPath).exists().is_file())]
    pub(crate) seed_file: Vec<ClioPath>,

    /// How new objects are written, protobuf or json. Both are always readable.
    #[clap(long, default_value_t = StorageEncoding::Protobuf)]
    pub(crate) storage_encoding: StorageEncoding,

    /// Lifetime of new access tokens, 0 for no expiry. Clients may override it.
    #[clap(long, default_value_t = 86400)]
    pub(crate) access_token_max_age_seconds: i64,

    /// Inactivity timeout of new access tokens, 0 or at least 300. Clients may override it.
    #[clap(long)]
    pub(crate) access_token_inactivity_timeout_seconds: Option<i32>,

    /// Lifetime of authorization codes
    #[clap(long, default_value_t = 300)]
    pub(crate) authorize_token_max_age_seconds: i64,

    /// An audience OAuth access tokens are valid for. Can specify multiple times. Defaults to
    /// https://kubernetes.default.svc
    #[clap(long)]
    pub(crate) token_audience: Vec<String>,

    /// How many times a read-modify-write of an object is attempted before giving up on conflicts
    #[clap(long, default_value_t = 5)]
    pub(crate) conflict_retries: u32,

    /// Number of tokio worker threads
    #[clap(long)]
    pub(crate) threads: Option<usize>,

    #[clap(long, default_value_t = LevelFilter::Info)]
    pub(crate) log_level: LevelFilter,

    #[command(subcommand)]
    pub(crate) command: Command,
}

/// The command line when the settings come from the config file
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct CommandOnly {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub(crate) enum Command {
    /// Decode resource documents and report configuration errors
    Validate {
        #[clap(required = true, value_parser = clap::value_parser!(ClioPath).exists().is_file())]
        files: Vec<ClioPath>,
    },

    /// Check requested scopes against the scope restrictions of a client
    Scopes {
        /// The OAuthClient document
        #[clap(long, value_parser = clap::value_parser!(ClioPath).exists().is_file())]
        client: ClioPath,

        #[clap(required = true)]
        scopes: Vec<String>,
    },

    /// Print a YAML or JSON document in the storage encoding
    Encode {
        #[clap(value_parser = clap::value_parser!(ClioPath).exists().is_file())]
        file: ClioPath,
    },

    /// Print a stored value, in either storage encoding, as YAML
    Decode {
        #[clap(value_parser = clap::value_parser!(ClioPath).exists().is_file())]
        file: ClioPath,
    },

    /// Ask for an authorization code on behalf of an already authenticated user
    Authorize {
        #[clap(long)]
        client: String,

        #[clap(long)]
        user: String,

        /// Optional when the client has a single permitted redirect URI
        #[clap(long, default_value = "")]
        redirect_uri: String,

        #[clap(long = "scope", required = true)]
        scopes: Vec<String>,

        #[clap(long, default_value = "")]
        state: String,

        #[clap(long, default_value = "")]
        code_challenge: String,

        #[clap(long, default_value = "")]
        code_challenge_method: String,

        /// Consent on the user's behalf when the client prompts for it
        #[clap(long)]
        approve: bool,
    },

    /// Trade an authorization code for an access token
    Exchange {
        #[clap(long)]
        client: String,

        #[clap(long, default_value = "")]
        client_secret: String,

        #[clap(long)]
        code: String,

        #[clap(long, default_value = "")]
        redirect_uri: String,

        #[clap(long)]
        code_verifier: Option<String>,
    },

    /// Check a bearer token as if it were used, refreshing its last-use time, and print its record
    Check {
        #[clap(long)]
        token: String,
    },

    /// Authenticate a bearer token and print the resulting OAuthTokenReview
    Review {
        #[clap(long)]
        token: String,

        /// An audience the caller identifies as. Can specify multiple times
        #[clap(long = "audience")]
        audiences: Vec<String>,
    },

    /// List the access tokens issued to a user
    Tokens {
        #[clap(long)]
        user: String,
    },

    /// Delete expired access tokens and authorization codes
    Prune {
        /// Only report what would be deleted
        #[clap(long)]
        dry_run: bool,
    },
}
