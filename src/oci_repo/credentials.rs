// Credentials file (INI) profiles and the two ways of signing requests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::principal::InstancePrincipal;
use super::signer::RequestSigner;

pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// One profile of the credentials file. Keys missing from a named profile fall back to DEFAULT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciProfile {
    pub user: String,
    pub fingerprint: String,
    pub key_file: PathBuf,
    pub tenancy: String,
    pub region: String,
    pub pass_phrase: Option<String>,
}

impl OciProfile {
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }
}

pub fn load_profile(path: &Path, profile: &str) -> anyhow::Result<OciProfile> {
    anyhow::ensure!(
        path.is_file(),
        "config file does not exist: {}",
        path.display()
    );
    let s = std::fs::read_to_string(path)?;
    parse_profile(&s, profile)
}

pub fn parse_profile(s: &str, profile: &str) -> anyhow::Result<OciProfile> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;
    for (n, raw) in s.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            anyhow::bail!("config line {}: expected key=value", n + 1);
        };
        let Some(section) = current.as_ref() else {
            anyhow::bail!("config line {}: key outside of a [profile] section", n + 1);
        };
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_string(), value.trim().to_string());
    }

    let Some(selected) = sections.get(profile) else {
        anyhow::bail!("profile [{}] not found in config file", profile);
    };
    let defaults = sections.get(DEFAULT_PROFILE);
    let get = |key: &str| -> Option<String> {
        selected
            .get(key)
            .or_else(|| defaults.and_then(|d| d.get(key)))
            .filter(|v| !v.is_empty())
            .cloned()
    };
    let require = |key: &str| -> anyhow::Result<String> {
        get(key).ok_or_else(|| anyhow::anyhow!("profile [{}] is missing `{}`", profile, key))
    };

    Ok(OciProfile {
        user: require("user")?,
        fingerprint: require("fingerprint")?,
        key_file: expand_home(&require("key_file")?)?,
        tenancy: require("tenancy")?,
        region: require("region")?,
        pass_phrase: get("pass_phrase"),
    })
}

fn expand_home(path: &str) -> anyhow::Result<PathBuf> {
    let rest = match path.strip_prefix("~/") {
        Some(rest) => rest,
        None if path == "~" => "",
        None => return Ok(PathBuf::from(path)),
    };
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("cannot expand `{}`: home directory unknown", path))?;
    Ok(home.join(rest))
}

/// How requests are signed: a user API key, or an instance principal session token.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey(Arc<RequestSigner>),
    InstancePrincipal(Arc<InstancePrincipal>),
}

impl Credentials {
    pub fn from_profile(profile: &OciProfile) -> anyhow::Result<Self> {
        anyhow::ensure!(
            profile.pass_phrase.is_none(),
            "pass_phrase protected keys are not supported"
        );
        let pem = std::fs::read_to_string(&profile.key_file).map_err(|e| {
            anyhow::anyhow!("key_file {}: {}", profile.key_file.display(), e)
        })?;
        let signer = RequestSigner::from_pem(profile.key_id(), &pem)?;
        Ok(Credentials::ApiKey(Arc::new(signer)))
    }

    pub async fn signer(&self) -> anyhow::Result<Arc<RequestSigner>> {
        match self {
            Credentials::ApiKey(signer) => Ok(signer.clone()),
            Credentials::InstancePrincipal(principal) => principal.signer().await,
        }
    }
}
