// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-lifecycle hook driver: wires `AuthSession` into an HTTP engine's
//! create/pre-send/post-send/destroy hook surface, per §4.6.
//!
//! Retry and failure decisions are logged at `debug` level unconditionally
//! (no feature flag, unlike the scanner's `trace` logging) since these are
//! ordinary request-lifecycle events a caller expects a client library to
//! log without needing to opt in.

use crate::error::AuthError;
use crate::session::{AuthSession, Role};

/// Per-HTTP-request auth state, allocated in `create_request` and freed in
/// `destroy_request`.
#[derive(Debug, Default)]
pub struct RequestCtx {
    attempt: u32,
}

impl RequestCtx {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// What the hook driver tells the surrounding HTTP engine to do next.
#[derive(Debug, Eq, PartialEq)]
pub enum AuthOutcome {
    /// No auth-relevant action; the response passes through unchanged.
    PassThrough,
    /// A challenge was accepted; re-dispatch the same request.
    Retry,
    /// The candidate list was exhausted against a challenge response; the
    /// caller should surface this code to its own caller.
    Fail(u16),
}

/// Creates a `RequestCtx` if `session`'s context gate permits this request,
/// per "create-request".
pub fn create_request(session: &AuthSession, is_connect: bool) -> Option<RequestCtx> {
    if session.context_gate().permits(is_connect) {
        Some(RequestCtx::default())
    } else {
        None
    }
}

/// Builds the request header to append to the outgoing request, if any, per
/// "pre-send". Returns `(header_name, header_value)`.
pub fn pre_send(
    session: &mut AuthSession,
    _ctx: &RequestCtx,
    method: &str,
    uri: &str,
) -> Option<(&'static str, String)> {
    let value = session.respond(method, uri)?;
    Some((session.role().request_header(), value))
}

/// Headers a post-send caller hands in: whatever the response actually
/// carried, already looked up by the surrounding HTTP engine.
pub struct ResponseView<'a> {
    pub status: u16,
    /// This role's challenge header (`WWW-Authenticate`/`Proxy-Authenticate`),
    /// if present.
    pub challenge_header: Option<&'a str>,
    /// This role's mutual-auth header (`Authentication-Info`/
    /// `Proxy-Authentication-Info`), if present.
    pub info_header: Option<&'a str>,
    /// The *server's* `WWW-Authenticate`, consulted only for the
    /// proxy-in-CONNECT 401 accommodation below.
    pub server_challenge_header: Option<&'a str>,
}

#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
impl<'a> ResponseView<'a> {
    /// Builds a view directly from an `http::HeaderMap`, looking up `role`'s
    /// headers (and, for the proxy-in-CONNECT accommodation, the server's
    /// own `WWW-Authenticate`) so callers already on the `http` crate don't
    /// need to repeat the header-name bookkeeping `Role` already knows.
    pub fn from_headers(status: u16, role: Role, headers: &'a http::HeaderMap) -> Self {
        let lookup = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        ResponseView {
            status,
            challenge_header: lookup(role.challenge_header()),
            info_header: lookup(role.info_header()),
            server_challenge_header: lookup(Role::Server.challenge_header()),
        }
    }
}

/// Dispatches a response per "post-send". `request_uri` is the request-URI
/// of the request this response answers, needed to verify Digest
/// `Authentication-Info` and Negotiate mutual auth.
pub fn post_send(
    session: &mut AuthSession,
    ctx: &mut RequestCtx,
    method: &str,
    request_uri: &str,
    response: &ResponseView<'_>,
) -> Result<AuthOutcome, AuthError> {
    let is_2xx_or_3xx = (200..400).contains(&response.status);

    // Guard correctly tests the named bit, not the flags word's truthiness
    // (the source's `flags && AUTH_FLAG_VERIFY_NON40x` read as a boolean
    // test of the whole word; see design notes).
    let verify_non_40x = session.verifies_on_non_40x();

    if let Some(info) = response.info_header {
        if !verify_non_40x {
            session.verify_info(info, request_uri)?;
            return Ok(AuthOutcome::PassThrough);
        }
    }

    if verify_non_40x && is_2xx_or_3xx {
        if let Some(chal) = response.challenge_header {
            session.verify_info(chal, request_uri)?;
            #[cfg(feature = "negotiate-scheme")]
            session.reset_per_request();
            return Ok(AuthOutcome::PassThrough);
        }
    }

    let is_challenge_code = response.status == session.role().challenge_code();
    // Proxy-in-CONNECT 401 quirk: some proxies answer a CONNECT's 401 using
    // `WWW-Authenticate` (the server-auth header) rather than
    // `Proxy-Authenticate`.
    let is_buggy_proxy_connect =
        session.role() == Role::Proxy && response.status == 401 && method.eq_ignore_ascii_case("CONNECT");

    if is_challenge_code || is_buggy_proxy_connect {
        let header = response
            .challenge_header
            .or(if is_buggy_proxy_connect {
                response.server_challenge_header
            } else {
                None
            });
        if let Some(header) = header {
            match session.select_challenge(header, ctx.attempt) {
                Ok(()) => {
                    ctx.attempt += 1;
                    log::debug!(
                        "{:?}: accepted challenge on {} {}, retrying (attempt={})",
                        session.role(),
                        method,
                        request_uri,
                        ctx.attempt
                    );
                    #[cfg(feature = "negotiate-scheme")]
                    session.reset_per_request();
                    return Ok(AuthOutcome::Retry);
                }
                Err(e) => {
                    log::debug!(
                        "{:?}: no acceptable challenge on {} {} ({}), failing",
                        session.role(),
                        method,
                        request_uri,
                        e
                    );
                    session.forget();
                    #[cfg(feature = "negotiate-scheme")]
                    session.reset_per_request();
                    return Ok(AuthOutcome::Fail(session.role().challenge_code()));
                }
            }
        }
    }

    #[cfg(feature = "negotiate-scheme")]
    session.reset_per_request();

    Ok(AuthOutcome::PassThrough)
}

/// Frees `ctx`. A no-op beyond ordinary `Drop`; present for symmetry with
/// "destroy-request" in the hook surface this module mirrors.
pub fn destroy_request(_ctx: RequestCtx) {}

/// Frees `session`'s handler list and state. A no-op beyond ordinary `Drop`;
/// present for symmetry with "destroy-session".
pub fn destroy_session(_session: AuthSession) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::schemes::SchemeSet;

    fn basic_session() -> AuthSession {
        let mut session = AuthSession::new(Role::Server, "example.com", false);
        session.register(Handler::new(
            SchemeSet::BASIC,
            Box::new(|_: &str, _: u32| Some(("user".to_string(), "pass".to_string()))),
        ));
        session
    }

    #[test]
    fn create_request_respects_context_gate() {
        let mut session = AuthSession::new(Role::Proxy, "example.com", true);
        session.register(Handler::new(
            SchemeSet::BASIC,
            Box::new(|_: &str, _: u32| Some(("user".to_string(), "pass".to_string()))),
        ));
        assert!(create_request(&session, true).is_some());
        assert!(create_request(&session, false).is_none());
    }

    #[test]
    fn accepted_challenge_retries_and_increments_attempt() {
        let mut session = basic_session();
        let mut ctx = RequestCtx::default();
        let response = ResponseView {
            status: 401,
            challenge_header: Some(r#"Basic realm="test""#),
            info_header: None,
            server_challenge_header: None,
        };
        let outcome = post_send(&mut session, &mut ctx, "GET", "/", &response).unwrap();
        assert_eq!(outcome, AuthOutcome::Retry);
        assert_eq!(ctx.attempt(), 1);
    }

    #[test]
    fn exhausted_candidates_fail_with_role_code() {
        let mut session = AuthSession::new(Role::Server, "example.com", false);
        let mut ctx = RequestCtx::default();
        let response = ResponseView {
            status: 401,
            challenge_header: Some(r#"Digest realm="test", nonce="n""#),
            info_header: None,
            server_challenge_header: None,
        };
        let outcome = post_send(&mut session, &mut ctx, "GET", "/", &response).unwrap();
        assert_eq!(outcome, AuthOutcome::Fail(401));
    }

    #[test]
    fn proxy_in_connect_401_quirk_reads_server_header() {
        let mut session = AuthSession::new(Role::Proxy, "example.com", true);
        session.register(Handler::new(
            SchemeSet::BASIC,
            Box::new(|_: &str, _: u32| Some(("user".to_string(), "pass".to_string()))),
        ));
        let mut ctx = RequestCtx::default();
        let response = ResponseView {
            status: 401,
            challenge_header: None,
            info_header: None,
            server_challenge_header: Some(r#"Basic realm="r""#),
        };
        let outcome = post_send(&mut session, &mut ctx, "CONNECT", "/", &response).unwrap();
        assert_eq!(outcome, AuthOutcome::Retry);
    }

    #[test]
    #[cfg(feature = "http")]
    fn response_view_from_headers_reads_roles_own_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            "WWW-Authenticate",
            http::HeaderValue::from_static(r#"Basic realm="r""#),
        );
        let view = ResponseView::from_headers(401, Role::Server, &headers);
        assert_eq!(view.challenge_header, Some(r#"Basic realm="r""#));
        assert_eq!(view.info_header, None);
    }

    #[test]
    fn pass_through_when_no_auth_relevant_header_present() {
        let mut session = basic_session();
        let mut ctx = RequestCtx::default();
        let response = ResponseView {
            status: 200,
            challenge_header: None,
            info_header: None,
            server_challenge_header: None,
        };
        let outcome = post_send(&mut session, &mut ctx, "GET", "/", &response).unwrap();
        assert_eq!(outcome, AuthOutcome::PassThrough);
    }
}
