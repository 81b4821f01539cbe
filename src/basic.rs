// Copyright (C) 2021 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP [`Basic`](https://datatracker.ietf.org/doc/html/rfc7617) authentication.

use crate::error::AuthError;
use crate::handler::CredentialsCallback;
use crate::parser::ChallengeRef;
use base64::Engine as _;
use zeroize::Zeroize;

/// Accepted `Basic` challenge state.
///
/// The `username:password` pair is base64-encoded once, at accept time, and
/// the password is zeroized immediately afterward; `respond` is then a pure
/// accessor with no further access to the credential. This mirrors how
/// [`crate::digest::DigestClient`] bakes the password into `H(A1)` once
/// rather than re-deriving it per request.
#[derive(Clone, Eq, PartialEq)]
pub struct BasicClient {
    realm: String,
    encoded: String,
}

impl BasicClient {
    /// Accepts a `Basic` challenge, per §4.3:
    ///
    /// requires `realm`, invokes the credentials callback, and stores the
    /// base64-encoded credential. Rejects if `realm` is absent or the
    /// callback declines.
    pub fn accept(
        challenge: &ChallengeRef<'_>,
        creds: &mut dyn CredentialsCallback,
        attempt: u32,
    ) -> Result<Self, AuthError> {
        let realm = challenge
            .param("realm")
            .ok_or(AuthError::BasicMissingRealm)?
            .to_unescaped();
        let (username, mut password) = creds
            .creds(&realm, attempt)
            .ok_or(AuthError::CredentialsRejected)?;
        let mut cleartext = format!("{}:{}", username, password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(cleartext.as_bytes());
        cleartext.zeroize();
        password.zeroize();
        Ok(BasicClient { realm, encoded })
    }

    /// The realm from the accepted challenge.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Builds the value for an `Authorization`/`Proxy-Authorization` header:
    /// `Basic <base64(username:password)>`.
    pub fn respond(&self) -> String {
        format!("Basic {}", self.encoded)
    }
}

impl std::fmt::Debug for BasicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicClient")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ChallengeParser;

    fn creds_of(username: &'static str, password: &'static str) -> impl CredentialsCallback {
        move |_realm: &str, _attempt: u32| Some((username.to_string(), password.to_string()))
    }

    #[test]
    fn aladdin_open_sesame() {
        let challenges: Vec<_> = ChallengeParser::new(r#"Basic realm="test""#)
            .collect::<Result<_, _>>()
            .unwrap();
        let mut creds = creds_of("aladdin", "open sesame");
        let client = BasicClient::accept(&challenges[0], &mut creds, 0).unwrap();
        assert_eq!(client.realm(), "test");
        assert_eq!(client.respond(), "Basic YWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn missing_realm_rejected() {
        let challenges: Vec<_> = ChallengeParser::new("Basic")
            .collect::<Result<_, _>>()
            .unwrap();
        let mut creds = creds_of("u", "p");
        assert_eq!(
            BasicClient::accept(&challenges[0], &mut creds, 0).unwrap_err(),
            AuthError::BasicMissingRealm
        );
    }

    #[test]
    fn declined_credentials_reject_the_challenge() {
        let challenges: Vec<_> = ChallengeParser::new(r#"Basic realm="test""#)
            .collect::<Result<_, _>>()
            .unwrap();
        let mut creds = |_realm: &str, _attempt: u32| None;
        assert_eq!(
            BasicClient::accept(&challenges[0], &mut creds, 0).unwrap_err(),
            AuthError::CredentialsRejected
        );
    }

    #[test]
    fn zeroize_clears_the_password_buffer() {
        let mut password = String::from("open sesame");
        password.zeroize();
        assert!(password.is_empty());
    }
}
