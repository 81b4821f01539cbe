// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application-supplied credential callbacks and their registration.

use crate::schemes::SchemeSet;

/// An application's credential source for one or more schemes.
///
/// `attempt` starts at 0 for the first try on a given request and increases
/// by one for each retry the [`crate::hook`] driver issues for that same
/// request, so a caller that wants to give up after N tries can count on it.
/// Returning `None` means "give up"; the current challenge is then rejected
/// and the next candidate (if any) is tried.
pub trait CredentialsCallback: Send {
    /// Returns `(username, password)` for `realm`, or `None` to decline.
    fn creds(&mut self, realm: &str, attempt: u32) -> Option<(String, String)>;
}

impl<F> CredentialsCallback for F
where
    F: FnMut(&str, u32) -> Option<(String, String)> + Send,
{
    fn creds(&mut self, realm: &str, attempt: u32) -> Option<(String, String)> {
        self(realm, attempt)
    }
}

/// One registered application handler: "I can supply credentials for these schemes."
///
/// Handlers are tried in registration order wherever more than one could
/// answer a given challenge's scheme; in practice sessions typically
/// register exactly one handler per role, as `set_server_auth`/
/// `set_proxy_auth`-style convenience constructors do upstream.
pub struct Handler {
    pub(crate) protomask: SchemeSet,
    pub(crate) creds: Box<dyn CredentialsCallback>,
}

impl Handler {
    pub fn new(protomask: SchemeSet, creds: Box<dyn CredentialsCallback>) -> Self {
        Handler { protomask, creds }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("protomask", &self.protomask)
            .finish_non_exhaustive()
    }
}
