// Instance principal: the compute instance's own certificate, exchanged for a short-lived
// session token at the auth service. The token is refreshed shortly before it expires.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePublicKey;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use x509_parser::pem::parse_x509_pem;

use super::signer::{RequestSigner, SignableRequest};
use crate::regions::normalize_region;

const METADATA_BASE: &str = "http://169.254.169.254/opc/v2";
const TENANT_OU_PREFIX: &str = "opc-tenant:";
const SESSION_KEY_BITS: usize = 2048;
/// Refresh when the token has less than this many minutes left.
const REFRESH_MARGIN_MINUTES: i64 = 5;
/// Assumed lifetime (minutes) when the token's `exp` claim cannot be read.
const FALLBACK_LIFETIME_MINUTES: i64 = 10;

struct Session {
    signer: Arc<RequestSigner>,
    expires_at: DateTime<Utc>,
}

pub struct InstancePrincipal {
    http: reqwest::Client,
    region: String,
    tenancy_id: String,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for InstancePrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancePrincipal")
            .field("region", &self.region)
            .field("tenancy_id", &self.tenancy_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

struct Certificate {
    der: Vec<u8>,
    tenancy_id: Option<String>,
}

impl InstancePrincipal {
    /// Reads region and tenancy from the instance metadata service.
    #[instrument(skip(http), fields(operation = "instance_principal_discover"))]
    pub async fn discover(http: reqwest::Client) -> anyhow::Result<Self> {
        let region = normalize_region(metadata(&http, "instance/region").await?.trim());
        let cert = parse_certificate(&metadata(&http, "identity/cert.pem").await?)?;
        let Some(tenancy_id) = cert.tenancy_id else {
            anyhow::bail!("instance certificate carries no {} subject", TENANT_OU_PREFIX);
        };
        debug!(region = %region, tenancy = %tenancy_id, "instance principal discovered");
        Ok(Self {
            http,
            region,
            tenancy_id,
            session: Mutex::new(None),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn tenancy_id(&self) -> &str {
        &self.tenancy_id
    }

    /// Current session signer, federating a new token when needed.
    pub async fn signer(&self) -> anyhow::Result<Arc<RequestSigner>> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref()
            && session.expires_at - Duration::minutes(REFRESH_MARGIN_MINUTES) > Utc::now()
        {
            return Ok(session.signer.clone());
        }
        let session = self.federate().await?;
        let signer = session.signer.clone();
        *guard = Some(session);
        Ok(signer)
    }

    #[instrument(skip(self), fields(operation = "instance_principal_federate"))]
    async fn federate(&self) -> anyhow::Result<Session> {
        let leaf = parse_certificate(&metadata(&self.http, "identity/cert.pem").await?)?;
        let leaf_key = metadata(&self.http, "identity/key.pem").await?;
        let intermediate =
            parse_certificate(&metadata(&self.http, "identity/intermediate.pem").await?)?;

        let tenancy_id = leaf.tenancy_id.as_deref().unwrap_or(&self.tenancy_id);
        let key_id = format!(
            "{}/fed-x509-sha256/{}",
            tenancy_id,
            fingerprint_sha256(&leaf.der)
        );
        let leaf_signer = RequestSigner::from_pem(key_id, &leaf_key)?;

        let mut rng = rand_core::OsRng;
        let session_key = RsaPrivateKey::new(&mut rng, SESSION_KEY_BITS)?;
        let public_der = session_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| anyhow::anyhow!("encode session public key: {}", e))?;

        let body = serde_json::to_vec(&serde_json::json!({
            "certificate": STANDARD.encode(&leaf.der),
            "publicKey": STANDARD.encode(public_der.as_bytes()),
            "intermediateCertificates": [STANDARD.encode(&intermediate.der)],
            "purpose": "DEFAULT",
            "fingerprintAlgorithm": "SHA256",
        }))?;

        let host = format!("auth.{}.oraclecloud.com", self.region);
        let path = "/v1/x509";
        let date = super::http_date(Utc::now());
        let headers = leaf_signer.sign(&SignableRequest {
            method: "POST",
            host: &host,
            path_and_query: path,
            date: &date,
            body: Some(&body),
        });

        let mut request = self.http.post(format!("https://{}{}", host, path));
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.body(body).send().await?;
        let status = response.status();
        anyhow::ensure!(
            status.is_success(),
            "instance principal federation failed with {}: {}",
            status,
            response.text().await.unwrap_or_default()
        );
        let TokenResponse { token } = response.json().await?;
        let expires_at = token_expiry(&token).unwrap_or_else(|| Utc::now() + Duration::minutes(FALLBACK_LIFETIME_MINUTES));
        debug!(%expires_at, "federated session token");

        Ok(Session {
            signer: Arc::new(RequestSigner::new(format!("ST${}", token), session_key)),
            expires_at,
        })
    }
}

async fn metadata(http: &reqwest::Client, path: &str) -> anyhow::Result<String> {
    let url = format!("{}/{}", METADATA_BASE, path);
    let response = http
        .get(&url)
        .header("Authorization", "Bearer Oracle")
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("instance metadata {} unreachable: {}", path, e))?;
    anyhow::ensure!(
        response.status().is_success(),
        "instance metadata {} returned {}",
        path,
        response.status()
    );
    Ok(response.text().await?)
}

fn parse_certificate(pem: &str) -> anyhow::Result<Certificate> {
    let (_, pem) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid certificate PEM: {}", e))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| anyhow::anyhow!("invalid certificate: {}", e))?;
    let tenancy_id = cert
        .subject()
        .iter_organizational_unit()
        .filter_map(|ou| ou.as_str().ok())
        .find_map(|ou| ou.strip_prefix(TENANT_OU_PREFIX))
        .map(str::to_string);
    Ok(Certificate {
        der: pem.contents.clone(),
        tenancy_id,
    })
}

/// Upper-case, colon separated SHA-256 of the DER certificate.
pub fn fingerprint_sha256(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// `exp` claim of a JWT, without verifying it.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expiry_reads_exp_claim() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"x","exp":1700000000}"#);
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{}.sig", payload);
        let exp = token_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn token_expiry_is_none_for_garbage() {
        assert!(token_expiry("not-a-jwt").is_none());
        assert!(token_expiry("a.!!!.c").is_none());
    }

    #[test]
    fn fingerprint_is_colon_separated_upper_hex() {
        let fp = fingerprint_sha256(b"abc");
        assert_eq!(fp.split(':').count(), 32);
        assert!(fp.starts_with("BA:78:16:BF"));
    }
}
