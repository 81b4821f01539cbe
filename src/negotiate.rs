// SPDX-License-Identifier: MIT OR Apache-2.0

//! `Negotiate` (SPNEGO via GSS-API/SSPI) and `NTLM` authentication.
//!
//! This crate links no platform security library. An embedding application
//! supplies a [`SecurityProvider`] backed by its own GSS-API or SSPI
//! bindings; this module only drives the base64/token68 plumbing and the
//! per-request token lifecycle described for the Negotiate scheme.

use crate::error::AuthError;
use base64::Engine as _;

/// One step of a GSS-API/SSPI `init_sec_context` exchange, as reported by a
/// [`SecurityProvider`].
pub enum SecurityStep {
    /// More tokens are expected; `token` (if any) must be sent to the peer.
    Continue(Option<Vec<u8>>),
    /// The exchange is complete; `token` (if any) must still be sent.
    Complete(Option<Vec<u8>>),
}

/// An application-supplied GSS-API or SSPI-shaped security context.
///
/// Implementations own the underlying native context handle and release it
/// on `Drop`; this crate never manipulates it directly.
pub trait SecurityProvider: Send {
    /// Advances the exchange with the peer's `input_token` (empty for the
    /// first call), targeting `target_name` (the origin or proxy host).
    /// Returns the next step, or a provider-formatted error message (which
    /// should include the major/minor status chain) on fatal failure.
    fn init_sec_context(
        &mut self,
        target_name: &str,
        input_token: &[u8],
    ) -> Result<SecurityStep, String>;
}

/// Accepted `Negotiate`/`NTLM` challenge state.
pub struct NegotiateClient {
    scheme_name: &'static str,
    target_name: String,
    provider: Box<dyn SecurityProvider>,
    /// Token staged for the next outgoing request; single-use, per §4.5
    /// "Per-request reset".
    staged_token: Option<Vec<u8>>,
    complete: bool,
}

impl NegotiateClient {
    /// Accepts the initial challenge (attempt 0, no token) or a continuation
    /// (any attempt, with a base64 token in `token68`). An empty challenge
    /// on a non-initial attempt is ignored (not accepted).
    pub fn accept(
        scheme_name: &'static str,
        token68: Option<&str>,
        attempt: u32,
        target_name: &str,
        mut provider: Box<dyn SecurityProvider>,
    ) -> Result<Self, AuthError> {
        if token68.is_none() && attempt != 0 {
            return Err(AuthError::NoAcceptableChallenge);
        }

        let input = match token68 {
            Some(t) => base64::engine::general_purpose::STANDARD
                .decode(t)
                .map_err(|e| AuthError::SecurityProviderFailure(e.to_string()))?,
            None => Vec::new(),
        };

        let mut client = NegotiateClient {
            scheme_name,
            target_name: target_name.to_string(),
            provider,
            staged_token: None,
            complete: false,
        };
        client.advance(&input)?;
        Ok(client)
    }

    /// Returns `true` if this client's live context handle belongs to the
    /// named scheme, so a caller can tell whether a later challenge is a
    /// continuation of this exchange or a switch to a different scheme.
    pub(crate) fn matches_scheme(&self, scheme_name: &str) -> bool {
        self.scheme_name == scheme_name
    }

    /// Continues the exchange by decoding and feeding `token68` (from a
    /// continuation challenge on a later attempt).
    pub fn continue_with(&mut self, token68: &str) -> Result<(), AuthError> {
        let input = base64::engine::general_purpose::STANDARD
            .decode(token68)
            .map_err(|e| AuthError::SecurityProviderFailure(e.to_string()))?;
        self.advance(&input)
    }

    fn advance(&mut self, input: &[u8]) -> Result<(), AuthError> {
        match self
            .provider
            .init_sec_context(&self.target_name, input)
            .map_err(AuthError::SecurityProviderFailure)?
        {
            SecurityStep::Continue(token) => {
                self.staged_token = token;
                self.complete = false;
            }
            SecurityStep::Complete(token) => {
                self.staged_token = token;
                self.complete = true;
            }
        }
        Ok(())
    }

    /// Builds `<scheme-name> <base64-token>`, or `None` if no token is
    /// staged (emission should be suppressed in that case).
    pub fn respond(&self) -> Option<String> {
        self.staged_token.as_ref().map(|token| {
            format!(
                "{} {}",
                self.scheme_name,
                base64::engine::general_purpose::STANDARD.encode(token)
            )
        })
    }

    /// Verifies a mutual-auth response header carried on a 2xx/3xx response:
    /// a single leading scheme token followed by an optional base64 blob.
    /// Feeds that blob as a continuation and expects the exchange to
    /// complete successfully.
    pub fn verify(&mut self, header_value: &str) -> Result<(), AuthError> {
        let rest = header_value
            .strip_prefix(self.scheme_name)
            .ok_or(AuthError::MutualAuthFailed)?;
        let blob = rest.trim_start();
        if !blob.is_empty() {
            self.continue_with(blob)?;
        }
        if self.complete {
            Ok(())
        } else {
            Err(AuthError::MutualAuthFailed)
        }
    }

    /// Clears the single-use staged token. Called unconditionally in
    /// post-send, per §4.5 "Per-request reset".
    pub fn reset_per_request(&mut self) {
        self.staged_token = None;
    }
}

impl std::fmt::Debug for NegotiateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiateClient")
            .field("scheme_name", &self.scheme_name)
            .field("target_name", &self.target_name)
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider {
        steps: Vec<SecurityStep>,
    }

    impl SecurityProvider for FakeProvider {
        fn init_sec_context(
            &mut self,
            _target_name: &str,
            _input_token: &[u8],
        ) -> Result<SecurityStep, String> {
            if self.steps.is_empty() {
                return Err("exhausted".to_string());
            }
            Ok(self.steps.remove(0))
        }
    }

    #[test]
    fn single_round_trip_stages_a_token() {
        let provider = Box::new(FakeProvider {
            steps: vec![SecurityStep::Complete(Some(b"abc".to_vec()))],
        });
        let client =
            NegotiateClient::accept("Negotiate", None, 0, "host.example", provider).unwrap();
        assert_eq!(client.respond().unwrap(), "Negotiate YWJj");
    }

    #[test]
    fn continuation_requires_a_prior_initial_attempt() {
        let provider = Box::new(FakeProvider { steps: vec![] });
        let err = NegotiateClient::accept("Negotiate", None, 1, "host.example", provider)
            .unwrap_err();
        assert_eq!(err, AuthError::NoAcceptableChallenge);
    }

    #[test]
    fn verify_requires_completion() {
        let provider = Box::new(FakeProvider {
            steps: vec![
                SecurityStep::Continue(Some(b"first".to_vec())),
                SecurityStep::Complete(None),
            ],
        });
        let mut client =
            NegotiateClient::accept("Negotiate", None, 0, "host.example", provider).unwrap();
        assert!(!client.complete);
        client.verify("Negotiate").unwrap();
        assert!(client.complete);
    }

    #[test]
    fn reset_clears_staged_token() {
        let provider = Box::new(FakeProvider {
            steps: vec![SecurityStep::Continue(Some(b"x".to_vec()))],
        });
        let mut client =
            NegotiateClient::accept("Negotiate", None, 0, "host.example", provider).unwrap();
        assert!(client.respond().is_some());
        client.reset_per_request();
        assert!(client.respond().is_none());
    }
}
