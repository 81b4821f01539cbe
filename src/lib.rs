// Copyright (C) 2021 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client authentication core: parses `WWW-Authenticate`/
//! `Proxy-Authenticate` challenge lists and drives a request's retry
//! lifecycle against `Basic`, `Digest`, and (optionally) `Negotiate`/`NTLM`
//! challenges.
//!
//! As described in the following documents and specifications:
//!
//! *   [RFC 7235](https://datatracker.ietf.org/doc/html/rfc7235):
//!     Hypertext Transfer Protocol (HTTP/1.1): Authentication.
//! *   [RFC 7617](https://datatracker.ietf.org/doc/html/rfc7617):
//!     The 'Basic' HTTP Authentication Scheme.
//! *   [RFC 2617](https://datatracker.ietf.org/doc/html/rfc2617) /
//!     [RFC 7616](https://datatracker.ietf.org/doc/html/rfc7616):
//!     HTTP Digest Access Authentication.
//!
//! This crate owns challenge parsing, per-scheme response construction, and
//! the session/hook bookkeeping that decides which scheme to use and when
//! to retry. It does not perform I/O, store headers, speak TLS, or talk to
//! a platform GSS-API/SSPI library; those are supplied by the embedding
//! HTTP engine through the types in [`session`] and [`hook`].
//!
//! Quick example, parsing a challenge list and picking the strongest
//! mutually acceptable scheme:
//!
//! ```rust
//! use http_auth_core::handler::Handler;
//! use http_auth_core::schemes::SchemeSet;
//! use http_auth_core::session::{AuthSession, Role};
//!
//! let mut session = AuthSession::new(Role::Server, "example.com", false);
//! session.register(Handler::new(
//!     SchemeSet::BASIC | SchemeSet::DIGEST,
//!     Box::new(|_realm: &str, _attempt: u32| {
//!         Some(("Aladdin".to_string(), "open sesame".to_string()))
//!     }),
//! ));
//! session
//!     .select_challenge(r#"Basic realm="a", Digest realm="a", nonce="n", qop="auth""#, 0)
//!     .unwrap();
//! let authorization = session.respond("GET", "/").unwrap();
//! assert!(authorization.starts_with("Digest "));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod table;

pub mod error;
pub mod param;
pub mod parser;
pub mod schemes;

pub mod handler;
pub mod hook;
pub mod session;

#[cfg(feature = "basic-scheme")]
#[cfg_attr(docsrs, doc(cfg(feature = "basic-scheme")))]
pub mod basic;

#[cfg(feature = "digest-scheme")]
#[cfg_attr(docsrs, doc(cfg(feature = "digest-scheme")))]
pub mod digest;

#[cfg(feature = "negotiate-scheme")]
#[cfg_attr(docsrs, doc(cfg(feature = "negotiate-scheme")))]
pub mod negotiate;

pub use crate::error::AuthError;
pub use crate::parser::{ChallengeParser, ChallengeRef};

#[cfg(feature = "basic-scheme")]
#[cfg_attr(docsrs, doc(cfg(feature = "basic-scheme")))]
pub use crate::basic::BasicClient;

#[cfg(feature = "digest-scheme")]
#[cfg_attr(docsrs, doc(cfg(feature = "digest-scheme")))]
pub use crate::digest::DigestClient;

/// Parses a list of challenges into a `Vec`.
///
/// Shorthand for `parser::ChallengeParser::new(input).collect()`.
#[inline]
pub fn parse_challenges(input: &str) -> Result<Vec<ChallengeRef<'_>>, parser::Error> {
    parser::ChallengeParser::new(input).collect()
}
