//! # SigV4 Signing
//!
//! Minimal AWS Signature Version 4 for single-shot POST requests with a
//! JSON body. Only what Bedrock `InvokeModel` needs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Long-lived or session AWS credentials
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Headers to attach to the signed request
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

pub struct SigningRequest<'a> {
    pub host: &'a str,
    /// Path exactly as sent on the wire (already percent-encoded once)
    pub path: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub content_type: &'a str,
    pub body: &'a [u8],
}

pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(&str, String)> = vec![
        ("content-type", request.content_type.to_string()),
        ("host", request.host.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }

    let signed_header_names = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();

    let canonical_request = format!(
        "POST\n{}\n\n{}\n{}\n{}",
        canonical_uri(request.path),
        canonical_headers,
        signed_header_names,
        hex_sha256(request.body)
    );

    let scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, request.region, request.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let key = signing_key(
        &credentials.secret_access_key,
        &date_stamp,
        request.region,
        request.service,
    );
    let signature = hex(&hmac(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            credentials.access_key_id, scope, signed_header_names, signature
        ),
        amz_date,
        security_token: credentials.session_token.clone(),
    }
}

/// Non-S3 services double-encode each path segment
fn canonical_uri(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac key length is unrestricted"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_sha256(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
