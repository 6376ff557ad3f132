//! OCI request signing with API-key credentials
//!
//! Implements the OCI HTTP Signature scheme (`rsa-sha256`) over the
//! `date (request-target) host content-length content-type x-content-sha256`
//! headers, using the key referenced by an OCI config file profile.

use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, DATE, HOST};
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::OciAuthConfig;
use crate::error::{Error, Result};

fn x_content_sha256() -> HeaderName {
    HeaderName::from_static("x-content-sha256")
}

/// Adds authentication headers to an outgoing request
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut reqwest::Request) -> Result<()>;
}

/// Sends requests unsigned, for gateways that authenticate upstream
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl RequestSigner for NoAuth {
    fn sign(&self, _request: &mut reqwest::Request) -> Result<()> {
        Ok(())
    }
}

/// API-key credentials of one OCI config profile
#[derive(Debug, Clone, PartialEq)]
pub struct OciProfile {
    pub user: String,
    pub tenancy: String,
    pub fingerprint: String,
    pub key_file: PathBuf,
    pub region: Option<String>,
}

impl OciProfile {
    /// Read a profile from an OCI config file
    pub fn load(config: &OciAuthConfig) -> Result<Self> {
        let contents = std::fs::read_to_string(&config.config_file).map_err(|e| {
            Error::Auth(format!(
                "Failed to read OCI config {}: {}",
                config.config_file.display(),
                e
            ))
        })?;
        Self::parse(&contents, &config.profile)
    }

    /// Parse a profile from config file text
    ///
    /// Keys missing from the named profile fall back to `[DEFAULT]`.
    pub fn parse(contents: &str, profile: &str) -> Result<Self> {
        let sections = parse_sections(contents);
        let mut values = sections.get("DEFAULT").cloned().unwrap_or_default();
        match sections.get(profile) {
            Some(section) => values.extend(section.clone()),
            None if profile == "DEFAULT" && !values.is_empty() => {}
            None => {
                return Err(Error::Auth(format!(
                    "Profile [{}] not found in OCI config",
                    profile
                )))
            }
        }

        if values.contains_key("pass_phrase") {
            return Err(Error::Auth(
                "Encrypted API keys (pass_phrase) are not supported".to_string(),
            ));
        }

        let take = |key: &str| {
            values.get(key).cloned().ok_or_else(|| {
                Error::Auth(format!("Profile [{}] is missing '{}'", profile, key))
            })
        };

        Ok(Self {
            user: take("user")?,
            tenancy: take("tenancy")?,
            fingerprint: take("fingerprint")?,
            key_file: expand_home(&take("key_file")?),
            region: values.get("region").cloned(),
        })
    }

    /// `keyId` value of the Authorization header
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }
}

fn parse_sections(contents: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
        } else if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Signs requests with an OCI API key
pub struct ApiKeySigner {
    key_id: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl std::fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ApiKeySigner {
    /// Load the profile and its private key
    pub fn from_config(config: &OciAuthConfig) -> Result<Self> {
        let profile = OciProfile::load(config)?;
        tracing::info!(
            "Signing OCI requests with profile [{}] ({})",
            config.profile,
            profile.fingerprint
        );
        Self::from_profile(&profile)
    }

    /// Build from a parsed profile
    pub fn from_profile(profile: &OciProfile) -> Result<Self> {
        let pem_text = read_key_file(&profile.key_file)?;
        Self::from_pem(profile.key_id(), &pem_text)
    }

    /// Build from a PEM-encoded RSA key (PKCS#8 or PKCS#1)
    pub fn from_pem(key_id: String, pem_text: &str) -> Result<Self> {
        let parsed = pem::parse(pem_text)
            .map_err(|e| Error::Auth(format!("Failed to parse private key PEM: {}", e)))?;

        let key_pair = match parsed.tag() {
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(parsed.contents()),
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(parsed.contents()),
            other => {
                return Err(Error::Auth(format!("Unsupported key type: {}", other)));
            }
        }
        .map_err(|e| Error::Auth(format!("Failed to load private key: {}", e)))?;

        Ok(Self {
            key_id,
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    fn sign_bytes(&self, message: &[u8]) -> Result<String> {
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
            .map_err(|e| Error::Auth(format!("Failed to sign request: {:?}", e)))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(&signature))
    }
}

fn read_key_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Auth(format!("Failed to read API key {}: {}", path.display(), e))
    })
}

impl RequestSigner for ApiKeySigner {
    fn sign(&self, request: &mut reqwest::Request) -> Result<()> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();

        let url = request.url();
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(Error::Auth(format!("URL has no host: {}", url))),
        };
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let method = request.method().as_str().to_lowercase();

        let mut signed: Vec<(&str, String)> = vec![
            ("date", date.clone()),
            ("(request-target)", format!("{} {}", method, target)),
            ("host", host.clone()),
        ];

        let mut body_headers = None;
        if matches!(method.as_str(), "post" | "put" | "patch") {
            let body = request
                .body()
                .map(|b| {
                    b.as_bytes().ok_or_else(|| {
                        Error::Auth("Streaming request bodies cannot be signed".to_string())
                    })
                })
                .transpose()?
                .unwrap_or_default();
            let digest = content_sha256(body);
            let content_type = request
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/json")
                .to_string();

            signed.push(("content-length", body.len().to_string()));
            signed.push(("content-type", content_type.clone()));
            signed.push(("x-content-sha256", digest.clone()));
            body_headers = Some((content_type, digest));
        }

        let signature = self.sign_bytes(signing_string(&signed).as_bytes())?;
        let authorization = format!(
            r#"Signature version="1",keyId="{}",algorithm="rsa-sha256",headers="{}",signature="{}""#,
            self.key_id,
            signed.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(" "),
            signature
        );

        let headers = request.headers_mut();
        headers.insert(DATE, header_value(&date)?);
        headers.insert(HOST, header_value(&host)?);
        if let Some((content_type, digest)) = body_headers {
            headers.insert(CONTENT_TYPE, header_value(&content_type)?);
            headers.insert(x_content_sha256(), header_value(&digest)?);
        }
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Auth(format!("Invalid header value {:?}: {}", value, e)))
}

/// Base64 SHA-256 of a request body
pub(crate) fn content_sha256(body: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(body))
}

/// `name: value` lines joined by newlines, in signing order
pub(crate) fn signing_string(headers: &[(&str, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "
# OCI CLI config
[DEFAULT]
user=ocid1.user.oc1..aaaa
fingerprint=12:34:56
tenancy=ocid1.tenancy.oc1..bbbb
region=us-chicago-1
key_file=/keys/default.pem

[CHICAGO]
user = ocid1.user.oc1..cccc
key_file = ~/.oci/chicago.pem
";

    #[test]
    fn test_parse_default_profile() {
        let profile = OciProfile::parse(CONFIG, "DEFAULT").unwrap();
        assert_eq!(profile.user, "ocid1.user.oc1..aaaa");
        assert_eq!(profile.region.as_deref(), Some("us-chicago-1"));
        assert_eq!(profile.key_file, PathBuf::from("/keys/default.pem"));
        assert_eq!(
            profile.key_id(),
            "ocid1.tenancy.oc1..bbbb/ocid1.user.oc1..aaaa/12:34:56"
        );
    }

    #[test]
    fn test_named_profile_inherits_default() {
        let profile = OciProfile::parse(CONFIG, "CHICAGO").unwrap();
        assert_eq!(profile.user, "ocid1.user.oc1..cccc");
        assert_eq!(profile.tenancy, "ocid1.tenancy.oc1..bbbb");
        assert_eq!(profile.fingerprint, "12:34:56");
        assert!(profile.key_file.ends_with(".oci/chicago.pem"));
    }

    #[test]
    fn test_missing_profile_and_keys() {
        assert!(OciProfile::parse(CONFIG, "NOPE").is_err());
        let err = OciProfile::parse("[DEFAULT]\nuser=u\n", "DEFAULT").unwrap_err();
        assert!(err.to_string().contains("tenancy"));
    }

    #[test]
    fn test_pass_phrase_rejected() {
        let config = format!("{}pass_phrase=hunter2\n", CONFIG);
        assert!(OciProfile::parse(&config, "CHICAGO").is_err());
    }

    #[test]
    fn test_signing_string_format() {
        let signed = vec![
            ("date", "Thu, 05 Jan 2014 21:31:40 GMT".to_string()),
            ("(request-target)", "post /20231130/actions/chat".to_string()),
            ("host", "inference.example.com".to_string()),
        ];
        assert_eq!(
            signing_string(&signed),
            "date: Thu, 05 Jan 2014 21:31:40 GMT\n(request-target): post /20231130/actions/chat\nhost: inference.example.com"
        );
    }

    #[test]
    fn test_content_sha256() {
        // sha256("") in base64
        assert_eq!(content_sha256(b""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }

    #[test]
    fn test_invalid_pem_rejected() {
        assert!(ApiKeySigner::from_pem("id".to_string(), "not a key").is_err());
        let cert = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        assert!(ApiKeySigner::from_pem("id".to_string(), cert).is_err());
    }
}
