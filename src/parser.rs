// Copyright (C) 2021 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenizer and challenge-list parser for `WWW-Authenticate` /
//! `Proxy-Authenticate` (and, in pair mode, `Authentication-Info` /
//! `Proxy-Authentication-Info`) header values.
//!
//! This is a single flat state machine rather than two nested grammars. The
//! RFC 7235 `1#challenge` / `#auth-param` grammars are ambiguous once placed
//! next to each other: a comma can separate two challenges, or two
//! `auth-param`s of the *same* challenge. This parser resolves it the way
//! real clients do: any `token` not immediately (modulo `BWS`) followed by
//! `=` is a new scheme leader, ending whatever challenge was being collected,
//! exactly as described for the "challenge mode" scanner.
//!
//! With the `trace` Cargo feature enabled, each scan attempt emits a
//! `log::trace!` record; this is off by default (and compiles to nothing
//! when off) since it is per-byte and bloats the scanner.
//!
//! ```rust
//! use http_auth_core::parser::ChallengeParser;
//! let mut p = ChallengeParser::new(r#"Basic realm="a", Digest realm="a", nonce="n", qop="auth""#);
//! let basic = p.next().unwrap().unwrap();
//! assert_eq!(basic.scheme, "Basic");
//! let digest = p.next().unwrap().unwrap();
//! assert_eq!(digest.scheme, "Digest");
//! assert_eq!(digest.params.len(), 3);
//! assert!(p.next().is_none());
//! ```

use crate::param::ParamValue;
use crate::schemes::{self, SchemeFlags, SchemeId};
use crate::table::{char_classes, C_OWS, C_QDTEXT, C_TCHAR, C_TOKEN68};

// Per-byte scanner tracing, gated behind the `trace` feature (see
// Cargo.toml): expands to a real `log::trace!` call when enabled, to
// nothing otherwise, so call sites below never need their own `#[cfg]`.
#[cfg(feature = "trace")]
macro_rules! trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}
#[cfg(not(feature = "trace"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// A single key-value parameter, as yielded by the scanner.
pub type ChallengeParamRef<'i> = (&'i str, ParamValue<'i>);

/// One parsed challenge: a scheme name plus either a bag of parameters or an
/// opaque `token68` continuation blob.
///
/// Only one of `token68` and a non-empty `params` is populated for any given
/// scheme in practice, but nothing in this type enforces that; scheme
/// engines read whichever field their grammar uses.
#[derive(Clone, Eq, PartialEq)]
pub struct ChallengeRef<'i> {
    /// The scheme name, exactly as it appeared in the header (compare
    /// case-insensitively).
    pub scheme: &'i str,

    /// The well-known scheme this name matched in the internal scheme table,
    /// if any. `None` for schemes this crate doesn't implement.
    scheme_id: Option<SchemeId>,

    /// The opaque `token68` blob following a single-space scheme leader for
    /// schemes that carry `AUTH_FLAG_OPAQUE_PARAM` (Negotiate, NTLM).
    pub token68: Option<&'i str>,

    /// Zero or more `key=value` parameters.
    ///
    /// Represented as a `Vec` rather than a `HashMap`: each challenge only
    /// has a handful of parameters, each consulted once while building a
    /// scheme client, so a linear scan is both simpler and cheaper than
    /// allocating a hash table just to throw it away.
    pub params: Vec<ChallengeParamRef<'i>>,
}

impl<'i> ChallengeRef<'i> {
    pub fn new(scheme: &'i str) -> Self {
        ChallengeRef {
            scheme,
            scheme_id: schemes::lookup(scheme).map(|s| s.id),
            token68: None,
            params: Vec::new(),
        }
    }

    /// Returns the well-known scheme this challenge matched, if any.
    pub fn scheme_id(&self) -> Option<SchemeId> {
        self.scheme_id
    }

    /// Returns the first parameter matching `key`, case-insensitively.
    pub fn param(&self, key: &str) -> Option<&ParamValue<'i>> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if a parameter named `key` is present with value `auth`
    /// or a comma-separated list of tokens containing `auth` (used for the
    /// `qop` parameter).
    pub fn param_token_list_contains(&self, key: &str, needle: &str) -> bool {
        match self.param(key) {
            Some(v) => {
                let unescaped = v.to_unescaped();
                unescaped
                    .split(',')
                    .any(|tok| tok.trim().eq_ignore_ascii_case(needle))
            }
            None => false,
        }
    }
}

impl<'i> std::fmt::Debug for ChallengeRef<'i> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeRef")
            .field("scheme", &self.scheme)
            .field("token68", &self.token68)
            .field("params", &ParamsPrinter(&self.params))
            .finish()
    }
}

struct ParamsPrinter<'i>(&'i [ChallengeParamRef<'i>]);

impl<'i> std::fmt::Debug for ParamsPrinter<'i> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|&(ref k, ref v)| (k, v)))
            .finish()
    }
}

/// Tokenizer/parser errors.
///
/// Per the scanner's design, most malformed input is tolerated (unknown
/// bytes are skipped and the scan continues); these are the cases where
/// robustness does not apply.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A `=` appeared with no preceding key token.
    #[error("missing key before '=' at byte offset {0}")]
    MissingKey(usize),

    /// A `=` appeared with no following value.
    #[error("missing value after '=' at byte offset {0}")]
    MissingValue(usize),

    /// A quoted-string was never closed, or contained a dangling backslash.
    #[error("unterminated quoted-string starting at byte offset {0}")]
    UnterminatedQuotedString(usize),
}

/// Parses a `WWW-Authenticate`/`Proxy-Authenticate`-style challenge list.
///
/// Use [`crate::parse_challenges`] for a one-shot `Vec`-returning wrapper.
pub struct ChallengeParser<'i> {
    input: &'i str,
    pos: usize,
    pending: Option<ChallengeRef<'i>>,
    done: bool,
}

impl<'i> ChallengeParser<'i> {
    pub fn new(input: &'i str) -> Self {
        ChallengeParser {
            input,
            pos: 0,
            pending: None,
            done: false,
        }
    }

    #[inline]
    fn bytes(&self) -> &'i [u8] {
        self.input.as_bytes()
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    /// Skips `*( OWS / "," )`: list separators between challenges/pairs.
    fn skip_list_seps(&mut self) {
        let b = self.bytes();
        while self.pos < b.len() && (b[self.pos] == b',' || char_classes(b[self.pos]) & C_OWS != 0)
        {
            self.pos += 1;
        }
    }

    /// Skips optional whitespace (`OWS`/`BWS`, which this scanner treats
    /// identically). Returns the number of bytes skipped.
    fn skip_ows(&mut self) -> usize {
        let b = self.bytes();
        let start = self.pos;
        while self.pos < b.len() && char_classes(b[self.pos]) & C_OWS != 0 {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Scans a `token` (possibly empty, if the current byte isn't a `tchar`).
    fn scan_token(&mut self) -> &'i str {
        trace!("token attempt at byte {} of {:?}", self.pos, self.input);
        let b = self.bytes();
        let start = self.pos;
        let mut i = start;
        while i < b.len() && char_classes(b[i]) & C_TCHAR != 0 {
            i += 1;
        }
        self.pos = i;
        &self.input[start..i]
    }

    /// Scans a `token68` (possibly empty).
    fn scan_token68(&mut self) -> &'i str {
        trace!("token68 attempt at byte {} of {:?}", self.pos, self.input);
        let b = self.bytes();
        let start = self.pos;
        let mut i = start;
        while i < b.len() && char_classes(b[i]) & C_TOKEN68 != 0 {
            i += 1;
        }
        self.pos = i;
        &self.input[start..i]
    }

    /// Scans a `quoted-string`, assuming the current byte is `"`.
    fn scan_quoted_string(&mut self) -> Result<ParamValue<'i>, Error> {
        trace!("quoted_string attempt at byte {} of {:?}", self.pos, self.input);
        let b = self.bytes();
        let start = self.pos;
        debug_assert_eq!(b[start], b'"');
        let mut i = start + 1;
        let mut escapes = 0usize;
        loop {
            if i >= b.len() {
                return Err(Error::UnterminatedQuotedString(start));
            }
            match b[i] {
                b'"' => {
                    i += 1;
                    break;
                }
                b'\\' => {
                    if i + 1 >= b.len() || char_classes(b[i + 1]) & crate::table::C_ESCAPABLE == 0
                    {
                        return Err(Error::UnterminatedQuotedString(start));
                    }
                    escapes += 1;
                    i += 2;
                }
                c if char_classes(c) & C_QDTEXT != 0 => i += 1,
                _ => return Err(Error::UnterminatedQuotedString(start)),
            }
        }
        self.pos = i;
        let raw = &self.input[start + 1..i - 1];
        Ok(ParamValue::new(escapes, raw))
    }

    /// Scans an `auth-param` value: a `token` or a `quoted-string`.
    fn scan_value(&mut self) -> Result<ParamValue<'i>, Error> {
        trace!("auth_param value attempt at byte {} of {:?}", self.pos, self.input);
        if self.peek() == Some(b'"') {
            self.scan_quoted_string()
        } else {
            let start = self.pos;
            let tok = self.scan_token();
            if tok.is_empty() {
                return Err(Error::MissingValue(start));
            }
            Ok(ParamValue::new(0, tok))
        }
    }
}

impl<'i> Iterator for ChallengeParser<'i> {
    type Item = Result<ChallengeRef<'i>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        trace!("challenge attempt at byte {} of {:?}", self.pos, self.input);
        loop {
            self.skip_list_seps();
            if self.at_end() {
                self.done = true;
                return self.pending.take().map(Ok);
            }

            let key_start = self.pos;
            let key = self.scan_token();

            if key.is_empty() {
                if self.peek() == Some(b'=') {
                    self.done = true;
                    return Some(Err(Error::MissingKey(key_start)));
                }
                // Unparseable byte outside any recognized production: skip
                // it and keep going, per the scanner's robustness policy.
                self.pos += 1;
                continue;
            }

            let had_space = self.skip_ows() > 0;

            if self.peek() == Some(b'=') {
                self.pos += 1;
                self.skip_ows();
                let value = match self.scan_value() {
                    Ok(v) => v,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                };
                if let Some(chal) = self.pending.as_mut() {
                    chal.params.push((key, value));
                }
                // A pair with no challenge in progress is dropped: robustness
                // prevails over a hard error for stray leading garbage.
                continue;
            }

            // No `=` follows: `key` is a scheme leader, per §4.1. Finalize
            // whatever challenge was pending and start a new one.
            let finished = self.pending.take();
            let mut chal = ChallengeRef::new(key);
            let info = schemes::lookup(key);

            if had_space {
                let opaque = info
                    .map(|i| i.flags.contains(SchemeFlags::OPAQUE_PARAM))
                    .unwrap_or(false);
                if opaque {
                    let blob = self.scan_token68();
                    if !blob.is_empty() {
                        chal.token68 = Some(blob);
                    }
                }
                // Non-opaque schemes: the following tokens are auth-params,
                // picked up as `Pair`s on subsequent loop iterations.
            }

            self.pending = Some(chal);
            if let Some(prev) = finished {
                return Some(Ok(prev));
            }
        }
    }
}

/// Parses a flat `#auth-param` list: the grammar of `Authentication-Info` and
/// `Proxy-Authentication-Info`, which (unlike `WWW-Authenticate`) has no
/// scheme leader to disambiguate, just `key=value` pairs separated by `,`.
///
/// Every bare token here is a key awaiting `=value`; there is no "no `=`
/// follows, so this must be a new scheme" branch as in [`ChallengeParser`].
pub fn parse_pairs(input: &str) -> Result<Vec<ChallengeParamRef<'_>>, Error> {
    let mut p = ChallengeParser::new(input);
    let mut pairs = Vec::new();
    loop {
        p.skip_list_seps();
        if p.at_end() {
            return Ok(pairs);
        }
        let key_start = p.pos;
        let key = p.scan_token();
        if key.is_empty() {
            return Err(Error::MissingKey(key_start));
        }
        p.skip_ows();
        if p.peek() != Some(b'=') {
            return Err(Error::MissingValue(p.pos));
        }
        p.pos += 1;
        p.skip_ows();
        let value = p.scan_value()?;
        pairs.push((key, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Vec<ChallengeRef<'_>>, Error> {
        ChallengeParser::new(s).collect()
    }

    #[test]
    fn single_basic() {
        let c = parse(r#"Basic realm="WallyWorld""#).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].scheme, "Basic");
        assert_eq!(c[0].param("realm").unwrap().to_unescaped(), "WallyWorld");
    }

    #[test]
    fn multi_challenge_digest_wins_selection_input() {
        let c = parse(r#"Basic realm="a", Digest realm="a", nonce="n", qop="auth""#).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].scheme, "Basic");
        assert_eq!(c[0].params.len(), 1);
        assert_eq!(c[1].scheme, "Digest");
        assert_eq!(c[1].params.len(), 3);
        assert!(c[1].param_token_list_contains("qop", "auth"));
    }

    #[test]
    fn quoted_value_with_comma_and_equals_round_trips() {
        let c = parse(r#"Digest realm="a, b = c", nonce="n""#).unwrap();
        assert_eq!(c[0].param("realm").unwrap().to_unescaped(), "a, b = c");
        assert_eq!(c[0].param("nonce").unwrap().to_unescaped(), "n");
    }

    #[test]
    fn escaped_quote_in_quoted_string() {
        let c = parse(r#"Digest realm="a\"b""#).unwrap();
        assert_eq!(c[0].param("realm").unwrap().to_unescaped(), "a\"b");
    }

    #[test]
    fn negotiate_opaque_token68() {
        let c = parse("Negotiate YIIB3g==").unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].scheme, "Negotiate");
        assert_eq!(c[0].token68, Some("YIIB3g=="));
        assert!(c[0].params.is_empty());
    }

    #[test]
    fn bare_scheme_leaders_no_params() {
        let c = parse("NTLM, Negotiate").unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].scheme, "NTLM");
        assert_eq!(c[0].token68, None);
        assert_eq!(c[1].scheme, "Negotiate");
        assert_eq!(c[1].token68, None);
    }

    #[test]
    fn unsupported_scheme_is_still_yielded_untagged() {
        let c = parse(r#"UnsupportedSchemeA, Basic realm="foo", UnsupportedSchemeB"#).unwrap();
        assert_eq!(c.len(), 3);
        assert!(c[0].scheme_id().is_none());
        assert_eq!(c[1].scheme, "Basic");
        assert!(c[2].scheme_id().is_none());
    }

    #[test]
    fn missing_key_before_equals_is_an_error() {
        let err = parse(r#"Digest realm="a", =bad"#).unwrap_err();
        assert!(matches!(err, Error::MissingKey(_)));
    }

    #[test]
    fn unterminated_quoted_string_is_an_error() {
        let err = parse(r#"Digest realm="unterminated"#).unwrap_err();
        assert!(matches!(err, Error::UnterminatedQuotedString(_)));
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(parse("").unwrap(), Vec::new());
        assert_eq!(parse("   ").unwrap(), Vec::new());
        assert_eq!(parse(" , , ").unwrap(), Vec::new());
    }

    #[test]
    fn pairs_parses_authentication_info() {
        let pairs = parse_pairs(r#"qop=auth, rspauth="abc123", cnonce="c1", nc=00000001"#).unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0].0, "qop");
        assert_eq!(pairs[0].1.to_unescaped(), "auth");
        assert_eq!(pairs[1].0, "rspauth");
        assert_eq!(pairs[1].1.to_unescaped(), "abc123");
    }

    #[test]
    fn pairs_empty_input_yields_nothing() {
        assert_eq!(parse_pairs("").unwrap(), Vec::new());
        assert_eq!(parse_pairs("   ").unwrap(), Vec::new());
    }

    #[test]
    fn pairs_bare_token_with_no_equals_is_an_error() {
        let err = parse_pairs("nextnonce").unwrap_err();
        assert!(matches!(err, Error::MissingValue(_)));
    }
}
