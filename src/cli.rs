// Command line: credentials source, optional compartment scope, settings file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_SETTINGS_FILE;
use crate::oci_repo::credentials::DEFAULT_PROFILE;

/// Literal first argument selecting instance principal authentication.
pub const PRINCIPAL_TOKEN: &str = "principal";

#[derive(Debug, Parser)]
#[command(
    name = "instance-report",
    version,
    about = "Compute instance inventory and performance report (CSV, PDF, zip)"
)]
pub struct Cli {
    /// Credentials file, or `principal` to authenticate as the instance this runs on
    pub config: String,

    /// Scan only this compartment subtree instead of the whole tenancy
    pub compartment_id: Option<String>,

    /// Report settings (TOML)
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Profile of the credentials file
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    InstancePrincipal,
    ConfigFile(PathBuf),
}

impl Cli {
    pub fn auth_mode(&self) -> AuthMode {
        if self.config.trim().eq_ignore_ascii_case(PRINCIPAL_TOKEN) {
            AuthMode::InstancePrincipal
        } else {
            AuthMode::ConfigFile(PathBuf::from(&self.config))
        }
    }
}
