// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-target authentication session: registered handlers, the currently
//! active scheme, and the context gate that decides which requests this
//! session's hook participates in.
//!
//! State transitions (a challenge accepted, the active scheme cleared) are
//! logged at `debug` level unconditionally, the way a client library logs
//! its own request-lifecycle events without the caller needing to opt into
//! a verbose feature.

use crate::error::AuthError;
use crate::handler::Handler;
use crate::parser::ChallengeParser;
use crate::schemes::{SchemeFlags, SchemeId, SchemeSet};

#[cfg(feature = "basic-scheme")]
use crate::basic::BasicClient;
#[cfg(feature = "digest-scheme")]
use crate::digest::DigestClient;
#[cfg(feature = "negotiate-scheme")]
use crate::negotiate::{NegotiateClient, SecurityProvider};

/// Which side of an HTTP conversation a session authenticates to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    /// The origin server: `WWW-Authenticate` / `Authorization`, 401.
    Server,
    /// A forward proxy: `Proxy-Authenticate` / `Proxy-Authorization`, 407.
    Proxy,
}

impl Role {
    pub(crate) fn challenge_header(self) -> &'static str {
        match self {
            Role::Server => "WWW-Authenticate",
            Role::Proxy => "Proxy-Authenticate",
        }
    }

    pub(crate) fn request_header(self) -> &'static str {
        match self {
            Role::Server => "Authorization",
            Role::Proxy => "Proxy-Authorization",
        }
    }

    pub(crate) fn info_header(self) -> &'static str {
        match self {
            Role::Server => "Authentication-Info",
            Role::Proxy => "Proxy-Authentication-Info",
        }
    }

    pub(crate) fn challenge_code(self) -> u16 {
        match self {
            Role::Server => 401,
            Role::Proxy => 407,
        }
    }

    /// The role identifier keying this session's `RequestCtx` in the
    /// request's private-data slot, distinct for server and proxy so two
    /// independent sessions can coexist on one HTTP session.
    pub(crate) fn id(self) -> &'static str {
        match self {
            Role::Server => "http-auth-core.server",
            Role::Proxy => "http-auth-core.proxy",
        }
    }
}

/// Which requests this session's hook participates in, given whether the
/// origin is reached over TLS.
///
/// On TLS-origin sessions, server auth only applies once the tunnel is
/// established (`NotConnect`) and proxy auth only applies to the `CONNECT`
/// that establishes it (`Connect`). On plain-origin sessions both apply to
/// every request (`Any`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ContextGate {
    Any,
    NotConnect,
    Connect,
}

impl ContextGate {
    fn for_role(role: Role, is_tls_origin: bool) -> ContextGate {
        if !is_tls_origin {
            return ContextGate::Any;
        }
        match role {
            Role::Server => ContextGate::NotConnect,
            Role::Proxy => ContextGate::Connect,
        }
    }

    /// Returns `true` if a request with the given `is_connect` method
    /// passes this gate.
    pub fn permits(self, is_connect: bool) -> bool {
        match self {
            ContextGate::Any => true,
            ContextGate::NotConnect => !is_connect,
            ContextGate::Connect => is_connect,
        }
    }
}

/// The currently accepted scheme's live state, if any.
enum ActiveScheme {
    #[cfg(feature = "basic-scheme")]
    Basic(BasicClient),
    #[cfg(feature = "digest-scheme")]
    Digest(DigestClient),
    #[cfg(feature = "negotiate-scheme")]
    Negotiate(NegotiateClient),
}

impl ActiveScheme {
    fn flags(&self) -> SchemeFlags {
        match self {
            #[cfg(feature = "basic-scheme")]
            ActiveScheme::Basic(_) => SchemeFlags::empty(),
            #[cfg(feature = "digest-scheme")]
            ActiveScheme::Digest(_) => SchemeFlags::empty(),
            #[cfg(feature = "negotiate-scheme")]
            ActiveScheme::Negotiate(_) => {
                SchemeFlags::OPAQUE_PARAM.union(SchemeFlags::VERIFY_NON40X)
            }
        }
    }
}

/// One parsed, handler-matched candidate awaiting an accept attempt, held in
/// descending-strength order.
struct Candidate<'i> {
    strength: u8,
    scheme_id: SchemeId,
    challenge: crate::parser::ChallengeRef<'i>,
}

#[cfg(feature = "negotiate-scheme")]
type ProviderFactory = Box<dyn Fn() -> Box<dyn SecurityProvider> + Send>;

/// One authentication context bound to one HTTP session and one role
/// (server or proxy).
pub struct AuthSession {
    role: Role,
    context_gate: ContextGate,
    handlers: Vec<Handler>,
    active: Option<ActiveScheme>,
    /// `host[:port]`, used as the GSS-API/SSPI target name.
    target_name: String,
    #[cfg(feature = "negotiate-scheme")]
    negotiate_provider: Option<ProviderFactory>,
}

impl AuthSession {
    pub fn new(role: Role, target_name: impl Into<String>, is_tls_origin: bool) -> Self {
        AuthSession {
            role,
            context_gate: ContextGate::for_role(role, is_tls_origin),
            handlers: Vec::new(),
            active: None,
            target_name: target_name.into(),
            #[cfg(feature = "negotiate-scheme")]
            negotiate_provider: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn context_gate(&self) -> ContextGate {
        self.context_gate
    }

    /// Registers a handler able to supply credentials for `protomask`'s
    /// schemes. Handlers are tried in registration order.
    pub fn register(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    /// Supplies the factory used to construct a fresh [`SecurityProvider`]
    /// when a Negotiate/NTLM challenge is first accepted.
    #[cfg(feature = "negotiate-scheme")]
    pub fn set_negotiate_provider(&mut self, factory: ProviderFactory) {
        self.negotiate_provider = Some(factory);
    }

    /// Clears credentials and the active scheme, per `forget_auth`.
    pub fn forget(&mut self) {
        log::debug!("{:?}: forgetting handlers and active scheme", self.role);
        self.handlers.clear();
        self.active = None;
    }

    fn protomask(&self) -> SchemeSet {
        self.handlers
            .iter()
            .fold(SchemeSet::empty(), |acc, h| acc | h.protomask)
    }

    fn handler_for(&mut self, id: SchemeId) -> Option<&mut Handler> {
        self.handlers.iter_mut().find(|h| h.protomask.permits(id))
    }

    /// Parses `header_value` (`WWW-Authenticate`/`Proxy-Authenticate`),
    /// builds the sorted candidate list per §4.2, and attempts acceptance in
    /// descending-strength order. The first candidate whose scheme engine
    /// accepts becomes the active scheme.
    pub fn select_challenge(
        &mut self,
        header_value: &str,
        attempt: u32,
    ) -> Result<(), AuthError> {
        let allowed = self.protomask();
        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for challenge in ChallengeParser::new(header_value) {
            let challenge = challenge?;
            let Some(id) = challenge.scheme_id() else {
                continue;
            };
            if !allowed.permits(id) {
                continue;
            }
            let strength = crate::schemes::lookup(challenge.scheme)
                .map(|s| s.strength)
                .unwrap_or(0);
            let pos = candidates
                .iter()
                .position(|c| c.strength < strength)
                .unwrap_or(candidates.len());
            candidates.insert(
                pos,
                Candidate {
                    strength,
                    scheme_id: id,
                    challenge,
                },
            );
        }

        let candidate_count = candidates.len();
        for candidate in candidates {
            if self.try_accept(candidate.scheme_id, &candidate.challenge, attempt) {
                log::debug!(
                    "{:?}: accepted {:?} challenge (attempt={})",
                    self.role,
                    candidate.scheme_id,
                    attempt
                );
                return Ok(());
            }
        }

        log::debug!(
            "{:?}: none of {} candidate(s) accepted (attempt={})",
            self.role,
            candidate_count,
            attempt
        );
        self.active = None;
        Err(AuthError::NoAcceptableChallenge)
    }

    fn try_accept(
        &mut self,
        id: SchemeId,
        challenge: &crate::parser::ChallengeRef<'_>,
        attempt: u32,
    ) -> bool {
        match id {
            #[cfg(feature = "basic-scheme")]
            SchemeId::Basic => {
                let Some(handler) = self.handler_for(id) else {
                    return false;
                };
                match BasicClient::accept(challenge, handler.creds.as_mut(), attempt) {
                    Ok(client) => {
                        self.active = Some(ActiveScheme::Basic(client));
                        true
                    }
                    Err(_) => false,
                }
            }
            #[cfg(feature = "digest-scheme")]
            SchemeId::Digest => {
                let prior_active = self.active.take();
                let prior_digest = match &prior_active {
                    Some(ActiveScheme::Digest(d)) => Some(d),
                    _ => None,
                };
                let Some(handler) = self.handler_for(id) else {
                    self.active = prior_active;
                    return false;
                };
                let accepted =
                    DigestClient::accept(challenge, handler.creds.as_mut(), attempt, prior_digest);
                match accepted {
                    Ok(client) => {
                        self.active = Some(ActiveScheme::Digest(client));
                        true
                    }
                    Err(_) => {
                        self.active = prior_active;
                        false
                    }
                }
            }
            #[cfg(feature = "negotiate-scheme")]
            SchemeId::Negotiate | SchemeId::Ntlm => {
                let scheme_name = if id == SchemeId::Negotiate {
                    "Negotiate"
                } else {
                    "NTLM"
                };

                // A multi-leg exchange (NTLM type1/2/3, multi-round SPNEGO)
                // must keep feeding the same provider context handle across
                // 401s; rebuilding from the factory on every leg would start
                // a fresh handshake instead of continuing this one. Only
                // reach for the factory when there's no live context for
                // this scheme yet.
                let prior_active = self.active.take();
                if let Some(ActiveScheme::Negotiate(mut client)) = prior_active {
                    if client.matches_scheme(scheme_name) {
                        let ok = match challenge.token68 {
                            Some(token) => {
                                log::debug!(
                                    "{:?}: continuing {} exchange (attempt={})",
                                    self.role,
                                    scheme_name,
                                    attempt
                                );
                                client.continue_with(token).is_ok()
                            }
                            None => false,
                        };
                        self.active = Some(ActiveScheme::Negotiate(client));
                        return ok;
                    }
                    self.active = Some(ActiveScheme::Negotiate(client));
                } else {
                    self.active = prior_active;
                }

                let Some(factory) = self.negotiate_provider.as_ref() else {
                    return false;
                };
                let provider = factory();
                match NegotiateClient::accept(
                    scheme_name,
                    challenge.token68,
                    attempt,
                    &self.target_name,
                    provider,
                ) {
                    Ok(client) => {
                        log::debug!(
                            "{:?}: starting {} exchange (attempt={})",
                            self.role,
                            scheme_name,
                            attempt
                        );
                        self.active = Some(ActiveScheme::Negotiate(client));
                        true
                    }
                    Err(_) => false,
                }
            }
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    /// Returns `true` if this scheme's mutual-auth verification runs on
    /// 2xx/3xx responses rather than (or in addition to) an
    /// `Authentication-Info`-style header.
    pub fn verifies_on_non_40x(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| a.flags().contains(SchemeFlags::VERIFY_NON40X))
            .unwrap_or(false)
    }

    pub fn has_active_scheme(&self) -> bool {
        self.active.is_some()
    }

    /// Builds the value for this role's request header
    /// (`Authorization`/`Proxy-Authorization`), or `None` if there is no
    /// active scheme or it has nothing to say for this request.
    pub fn respond(&mut self, method: &str, uri: &str) -> Option<String> {
        match self.active.as_mut()? {
            #[cfg(feature = "basic-scheme")]
            ActiveScheme::Basic(c) => Some(c.respond()),
            #[cfg(feature = "digest-scheme")]
            ActiveScheme::Digest(c) => Some(c.respond(method, uri)),
            #[cfg(feature = "negotiate-scheme")]
            ActiveScheme::Negotiate(c) => c.respond(),
        }
    }

    /// Verifies an `Authentication-Info`-style header (Digest) or a 2xx/3xx
    /// mutual-auth response (Negotiate), dispatching on the active scheme.
    pub fn verify_info(&mut self, header_value: &str, request_uri: &str) -> Result<(), AuthError> {
        match self.active.as_mut() {
            #[cfg(feature = "digest-scheme")]
            Some(ActiveScheme::Digest(c)) => c.verify_info(header_value, request_uri),
            #[cfg(feature = "negotiate-scheme")]
            Some(ActiveScheme::Negotiate(c)) => c.verify(header_value),
            _ => Ok(()),
        }
    }

    /// Clears per-request Negotiate state unconditionally, per §4.5
    /// "Per-request reset".
    #[cfg(feature = "negotiate-scheme")]
    pub fn reset_per_request(&mut self) {
        if let Some(ActiveScheme::Negotiate(c)) = self.active.as_mut() {
            c.reset_per_request();
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("role", &self.role)
            .field("context_gate", &self.context_gate)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;

    fn basic_handler() -> Handler {
        Handler::new(
            SchemeSet::BASIC,
            Box::new(|_realm: &str, _attempt: u32| Some(("user".to_string(), "pass".to_string()))),
        )
    }

    #[test]
    fn context_gate_on_tls_origin_splits_by_role() {
        assert_eq!(
            ContextGate::for_role(Role::Server, true),
            ContextGate::NotConnect
        );
        assert_eq!(
            ContextGate::for_role(Role::Proxy, true),
            ContextGate::Connect
        );
        assert_eq!(ContextGate::for_role(Role::Server, false), ContextGate::Any);
    }

    #[test]
    fn selects_digest_over_basic_by_strength() {
        let mut session = AuthSession::new(Role::Server, "example.com", false);
        session.register(Handler::new(
            SchemeSet::BASIC | SchemeSet::DIGEST,
            Box::new(|_: &str, _: u32| Some(("user".to_string(), "pass".to_string()))),
        ));
        session
            .select_challenge(
                r#"Basic realm="a", Digest realm="a", nonce="n", qop="auth""#,
                0,
            )
            .unwrap();
        assert!(session.has_active_scheme());
        let out = session.respond("GET", "/").unwrap();
        assert!(out.starts_with("Digest "));
    }

    #[test]
    fn unregistered_scheme_is_not_a_candidate() {
        let mut session = AuthSession::new(Role::Server, "example.com", false);
        session.register(basic_handler());
        let err = session
            .select_challenge(r#"Digest realm="a", nonce="n""#, 0)
            .unwrap_err();
        assert_eq!(err, AuthError::NoAcceptableChallenge);
    }

    #[test]
    fn forget_clears_handlers_and_active_scheme() {
        let mut session = AuthSession::new(Role::Server, "example.com", false);
        session.register(basic_handler());
        session
            .select_challenge(r#"Basic realm="a""#, 0)
            .unwrap();
        assert!(session.has_active_scheme());
        session.forget();
        assert!(!session.has_active_scheme());
        assert_eq!(session.protomask(), SchemeSet::empty());
    }

    #[cfg(feature = "negotiate-scheme")]
    mod negotiate_continuation {
        use super::*;
        use crate::negotiate::{SecurityStep, SecurityProvider};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct ScriptedProvider {
            steps: Vec<SecurityStep>,
        }

        impl SecurityProvider for ScriptedProvider {
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

        // A multi-leg NTLM-style handshake (type1/2/3) drives three 401s.
        // If each 401 rebuilt the provider from the factory, every leg would
        // see an empty `steps` queue after the first and fail; continuing
        // the *same* client instead lets it work through all three legs.
        #[test]
        fn multi_round_401_continues_the_same_provider_context() {
            let factory_calls = Arc::new(AtomicUsize::new(0));
            let factory_calls_for_closure = factory_calls.clone();

            let mut session = AuthSession::new(Role::Server, "example.com", false);
            session.register(Handler::new(
                SchemeSet::NEGOTIATE,
                Box::new(|_: &str, _: u32| None),
            ));
            session.set_negotiate_provider(Box::new(move || {
                factory_calls_for_closure.fetch_add(1, Ordering::SeqCst);
                Box::new(ScriptedProvider {
                    steps: vec![
                        SecurityStep::Continue(Some(b"leg2".to_vec())),
                        SecurityStep::Continue(Some(b"leg3".to_vec())),
                        SecurityStep::Complete(None),
                    ],
                }) as Box<dyn SecurityProvider>
            }));

            session
                .select_challenge("Negotiate", 0)
                .unwrap();
            assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
            let leg2 = session.respond("GET", "/").unwrap();
            assert_eq!(leg2, "Negotiate bGVnMg==");

            session
                .select_challenge("Negotiate bGVnMg==", 1)
                .unwrap();
            assert_eq!(
                factory_calls.load(Ordering::SeqCst),
                1,
                "continuing an in-progress exchange must not rebuild the provider"
            );
            let leg3 = session.respond("GET", "/").unwrap();
            assert_eq!(leg3, "Negotiate bGVnMw==");

            session
                .select_challenge("Negotiate bGVnMw==", 2)
                .unwrap();
            assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        }
    }
}
