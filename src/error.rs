// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types returned by this crate.

use thiserror::Error;

/// Errors surfaced by challenge acceptance, response generation, and mutual
/// authentication verification.
///
/// These correspond to the error kinds a caller needs to distinguish per
/// the crate's error handling design: malformed challenges, incompatible
/// algorithms, and the four distinct ways `Authentication-Info` mutual
/// auth can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    /// A `Digest` challenge was missing the mandatory `realm` parameter.
    #[error("Digest challenge missing realm")]
    MissingRealm,

    /// A `Digest` challenge was missing the mandatory `nonce` parameter.
    #[error("Digest challenge missing nonce")]
    MissingNonce,

    /// A `Digest` challenge named an algorithm other than `MD5` or `MD5-sess`.
    #[error("unknown Digest algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// A `Digest` challenge asked for `MD5-sess` without offering `qop=auth`.
    #[error("MD5-sess requires qop=auth, which this challenge did not offer")]
    IncompatibleAlgorithm,

    /// A `Basic` challenge was missing the mandatory `realm` parameter.
    #[error("Basic challenge missing realm")]
    BasicMissingRealm,

    /// The credentials callback declined to supply a username/password.
    #[error("credentials callback declined to supply credentials")]
    CredentialsRejected,

    /// `Authentication-Info`/`Proxy-Authentication-Info` omitted one of
    /// `rspauth`, `cnonce`, or `nc` while advertising `qop`.
    #[error("Authentication-Info missing rspauth, cnonce, or nc")]
    MissingMutualAuthParameters,

    /// The `cnonce` echoed in `Authentication-Info` did not match the one
    /// the client sent.
    #[error("Authentication-Info client nonce mismatch")]
    ClientNonceMismatch,

    /// The `nc` echoed in `Authentication-Info` did not match the one the
    /// client sent.
    #[error("Authentication-Info nonce count mismatch")]
    NonceCountMismatch,

    /// No prior Digest response exists to verify `Authentication-Info` against.
    #[error("no pending Digest response to verify Authentication-Info against")]
    NoPendingDigestResponse,

    /// The server's `rspauth` did not match the client's own computation.
    #[error("Authentication-Info request-digest mismatch")]
    RequestDigestMismatch,

    /// No registered scheme engine accepted any challenge in the response.
    #[error("no acceptable challenge in response")]
    NoAcceptableChallenge,

    /// A challenge named a scheme this session has no handler for.
    #[error("unsupported challenge scheme {0:?}")]
    UnsupportedScheme(String),

    /// A Negotiate/NTLM provider reported a fatal GSS-API/SSPI failure.
    #[error("security provider failure: {0}")]
    SecurityProviderFailure(String),

    /// Mutual authentication (Negotiate) failed to validate the server's
    /// final token.
    #[error("mutual authentication failed")]
    MutualAuthFailed,

    /// The tokenizer could not make sense of a header value.
    #[error(transparent)]
    Parse(#[from] crate::parser::Error),
}
