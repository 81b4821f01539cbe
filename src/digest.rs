// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP [`Digest`](https://datatracker.ietf.org/doc/html/rfc2617) access
//! authentication: `auth` quality-of-protection, `MD5`/`MD5-sess`, and
//! 2069-style backward compatibility for `Authentication-Info`.

use crate::error::AuthError;
use crate::handler::CredentialsCallback;
use crate::parser::{parse_pairs, ChallengeRef};
use digest::Digest as _;
use md5::Md5;
use rand::RngCore;
use zeroize::Zeroize;

/// The two algorithms this engine understands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

impl Algorithm {
    fn from_param(s: &str) -> Option<Algorithm> {
        if s.eq_ignore_ascii_case("md5") {
            Some(Algorithm::Md5)
        } else if s.eq_ignore_ascii_case("md5-sess") {
            Some(Algorithm::Md5Sess)
        } else {
            None
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        }
    }
}

/// Whether the peer advertised `qop=auth`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum QopMode {
    None,
    Auth,
}

/// Hex-encodes an MD5 digest into a fresh lowercase `String`.
fn md5_hex(input: &[u8]) -> String {
    hex::encode(Md5::digest(input))
}

/// Generates a 32-hex-char client nonce.
///
/// The spec's fallback path (mixing uninitialized stack bytes, the wall
/// clock, and a thread id) isn't meaningful in safe Rust; a CSPRNG is always
/// available via the `rand` crate, so that's the only path implemented
/// here, per the design note that a CSPRNG should always be preferred.
fn generate_cnonce() -> String {
    let mut buf = [0u8; 256];
    rand::thread_rng().fill_bytes(&mut buf);
    md5_hex(&buf)
}

/// Accepted `Digest` challenge state, carried across a session's retries.
pub struct DigestClient {
    username: String,
    realm: String,
    nonce: String,
    opaque: Option<String>,
    algorithm: Algorithm,
    qop: QopMode,
    cnonce: String,
    nonce_count: u32,
    /// `H(A1)`, 32 lowercase hex chars.
    ha1: String,
    /// Snapshot of the request-digest hash context taken right after
    /// `nc:cnonce:` was fed, kept until the next `Authentication-Info` is
    /// verified (or a new response discards it).
    partial_rdig: Option<Md5>,
}

impl DigestClient {
    /// Accepts a `Digest` challenge per §4.4.
    ///
    /// `stale` challenges reuse the existing `H(A1)` and do not invoke the
    /// credentials callback; all other challenges do, and failure of the
    /// callback rejects the challenge.
    pub fn accept(
        challenge: &ChallengeRef<'_>,
        creds: &mut dyn CredentialsCallback,
        attempt: u32,
        prior: Option<&DigestClient>,
    ) -> Result<Self, AuthError> {
        let algorithm = match challenge.param("algorithm") {
            Some(v) => {
                let s = v.to_unescaped();
                Algorithm::from_param(&s).ok_or(AuthError::UnknownAlgorithm(s))?
            }
            None => Algorithm::Md5,
        };

        let got_qop = challenge.param("qop").is_some();
        let qop_auth = challenge.param_token_list_contains("qop", "auth");
        if algorithm == Algorithm::Md5Sess && !qop_auth {
            return Err(AuthError::IncompatibleAlgorithm);
        }

        let realm = challenge
            .param("realm")
            .ok_or(AuthError::MissingRealm)?
            .to_unescaped();
        let nonce = challenge
            .param("nonce")
            .ok_or(AuthError::MissingNonce)?
            .to_unescaped();
        let opaque = challenge.param("opaque").map(|v| v.to_unescaped());
        let stale = challenge
            .param("stale")
            .map(|v| v.eq_ignore_ascii_case_unescaped("true"))
            .unwrap_or(false);

        let qop = if got_qop { QopMode::Auth } else { QopMode::None };
        let cnonce = generate_cnonce();

        if stale {
            let prior = prior.ok_or(AuthError::NoPendingDigestResponse)?;
            return Ok(DigestClient {
                username: prior.username.clone(),
                realm,
                nonce,
                opaque,
                algorithm,
                qop,
                cnonce,
                nonce_count: 0,
                ha1: prior.ha1.clone(),
                partial_rdig: None,
            });
        }

        let (username, mut password) = creds
            .creds(&realm, attempt)
            .ok_or(AuthError::CredentialsRejected)?;

        let ha1 = match algorithm {
            Algorithm::Md5 => md5_hex(format!("{}:{}:{}", username, realm, password).as_bytes()),
            Algorithm::Md5Sess => {
                let inner = md5_hex(format!("{}:{}:{}", username, realm, password).as_bytes());
                md5_hex(format!("{}:{}:{}", inner, nonce, cnonce).as_bytes())
            }
        };
        password.zeroize();

        Ok(DigestClient {
            username,
            realm,
            nonce,
            opaque,
            algorithm,
            qop,
            cnonce,
            nonce_count: 0,
            ha1,
            partial_rdig: None,
        })
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Builds the value for an `Authorization`/`Proxy-Authorization` header,
    /// per §4.4's "Respond" algorithm.
    pub fn respond(&mut self, method: &str, uri: &str) -> String {
        let nc_value = if self.qop == QopMode::Auth {
            self.nonce_count += 1;
            Some(format!("{:08x}", self.nonce_count))
        } else {
            None
        };

        let ha2 = md5_hex(format!("{}:{}", method, uri).as_bytes());

        let mut hasher = Md5::new();
        hasher.update(self.ha1.as_bytes());
        hasher.update(b":");
        hasher.update(self.nonce.as_bytes());
        hasher.update(b":");

        self.partial_rdig = None;
        if let Some(nc_value) = nc_value.as_deref() {
            hasher.update(nc_value.as_bytes());
            hasher.update(b":");
            hasher.update(self.cnonce.as_bytes());
            hasher.update(b":");
            // Snapshot here: everything fed so far, to be finished with a
            // modified H(A2) when verifying the server's rspauth.
            self.partial_rdig = Some(hasher.clone());
            hasher.update(b"auth:");
        }
        hasher.update(ha2.as_bytes());
        let rdig = hex::encode(hasher.finalize());

        let mut out = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}", algorithm="{}""#,
            self.username,
            self.realm,
            self.nonce,
            uri,
            rdig,
            self.algorithm.as_str()
        );
        if let Some(opaque) = &self.opaque {
            out.push_str(&format!(r#", opaque="{}""#, opaque));
        }
        if let Some(nc_value) = nc_value {
            out.push_str(&format!(
                r#", cnonce="{}", nc={}, qop="auth""#,
                self.cnonce, nc_value
            ));
        }
        out
    }

    /// Verifies an `Authentication-Info`/`Proxy-Authentication-Info` header
    /// value against the request-digest computed by the last [`Self::respond`]
    /// call, per §4.4's "Verify".
    pub fn verify_info(&mut self, header_value: &str, request_uri: &str) -> Result<(), AuthError> {
        let pairs = parse_pairs(header_value)?;
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.to_unescaped())
        };

        let qop = get("qop");
        let nextnonce = get("nextnonce");
        let result = if qop.is_none() {
            // 2069-style: rspauth is not offered and is not verified.
            Ok(())
        } else {
            let rspauth = get("rspauth").ok_or(AuthError::MissingMutualAuthParameters)?;
            let cnonce = get("cnonce").ok_or(AuthError::MissingMutualAuthParameters)?;
            let nc = get("nc").ok_or(AuthError::MissingMutualAuthParameters)?;

            if cnonce != self.cnonce {
                Err(AuthError::ClientNonceMismatch)
            } else if u32::from_str_radix(&nc, 16).ok() != Some(self.nonce_count) {
                Err(AuthError::NonceCountMismatch)
            } else {
                let snapshot = self
                    .partial_rdig
                    .take()
                    .ok_or(AuthError::NoPendingDigestResponse)?;
                let ha2_prime = md5_hex(format!(":{}", request_uri).as_bytes());
                let mut hasher = snapshot;
                hasher.update(b"auth:");
                hasher.update(ha2_prime.as_bytes());
                let computed = hex::encode(hasher.finalize());
                if computed.eq_ignore_ascii_case(&rspauth) {
                    Ok(())
                } else {
                    Err(AuthError::RequestDigestMismatch)
                }
            }
        };

        // The snapshot is one-shot regardless of outcome.
        self.partial_rdig = None;

        if let Some(nextnonce) = nextnonce {
            self.nonce = nextnonce;
            // See design note: a fresh nonce begins a new counting context.
            self.nonce_count = 0;
        }

        result
    }
}

impl std::fmt::Debug for DigestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestClient")
            .field("realm", &self.realm)
            .field("algorithm", &self.algorithm)
            .field("qop", &self.qop)
            .field("nonce_count", &self.nonce_count)
            .finish_non_exhaustive()
    }
}
