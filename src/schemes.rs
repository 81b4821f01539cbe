// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed table of schemes this crate knows how to speak, along with the
//! bitsets used to register handlers and gate per-response behavior.

use bitflags::bitflags;

/// Identifies one of the scheme engines this crate implements.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum SchemeId {
    Basic,
    Digest,
    Negotiate,
    Ntlm,
}

bitflags! {
    /// A bitset of schemes an application [`Handler`](crate::handler::Handler)
    /// is willing to answer for, or that a session permits.
    ///
    /// `set_server_auth`/`set_proxy_auth`-style convenience registration maps
    /// to `SchemeSet::BASIC | SchemeSet::DIGEST` (plus `NEGOTIATE` on
    /// https origins); `add_server_auth`/`add_proxy_auth` take an explicit
    /// `SchemeSet`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeSet: u8 {
        const BASIC     = 0b0001;
        const DIGEST    = 0b0010;
        const NEGOTIATE = 0b0100;
        const NTLM      = 0b1000;

        const ALL = Self::BASIC.bits() | Self::DIGEST.bits() | Self::NEGOTIATE.bits() | Self::NTLM.bits();
    }
}

impl SchemeSet {
    /// Returns the single-scheme bit corresponding to `id`.
    pub(crate) fn of(id: SchemeId) -> SchemeSet {
        match id {
            SchemeId::Basic => SchemeSet::BASIC,
            SchemeId::Digest => SchemeSet::DIGEST,
            SchemeId::Negotiate => SchemeSet::NEGOTIATE,
            SchemeId::Ntlm => SchemeSet::NTLM,
        }
    }

    /// Returns `true` if this set permits the given scheme.
    pub(crate) fn permits(self, id: SchemeId) -> bool {
        self.contains(SchemeSet::of(id))
    }
}

bitflags! {
    /// Per-scheme behavioral flags, set once in [`SCHEME_TABLE`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct SchemeFlags: u8 {
        /// A scheme leader followed by a single space introduces an opaque
        /// `token68` continuation blob rather than a `#auth-param` list (see
        /// [`crate::parser`]).
        const OPAQUE_PARAM = 0b01;

        /// This scheme's mutual-auth verification step runs on 2xx/3xx
        /// responses that carry the challenge-response header, rather than
        /// (or in addition to) an `Authentication-Info`-style header.
        const VERIFY_NON40X = 0b10;
    }
}

/// One entry in the closed, ordered scheme table.
pub(crate) struct SchemeInfo {
    pub(crate) name: &'static str,
    pub(crate) id: SchemeId,
    /// Selection strength: higher wins when multiple challenges are offered.
    pub(crate) strength: u8,
    pub(crate) flags: SchemeFlags,
}

/// The ordered internal scheme table consulted by the challenge parser and
/// by candidate selection.
///
/// Order here is not selection order (selection sorts by `strength`); it's
/// simply table layout. `Negotiate` and `NTLM` carry `OPAQUE_PARAM` because
/// both exchange an opaque `token68` SPNEGO/NTLMSSP blob rather than
/// RFC 2617-style `key=value` parameters.
pub(crate) const SCHEME_TABLE: &[SchemeInfo] = &[
    SchemeInfo {
        name: "Basic",
        id: SchemeId::Basic,
        strength: 10,
        flags: SchemeFlags::empty(),
    },
    SchemeInfo {
        name: "Digest",
        id: SchemeId::Digest,
        strength: 20,
        flags: SchemeFlags::empty(),
    },
    SchemeInfo {
        name: "Negotiate",
        id: SchemeId::Negotiate,
        strength: 30,
        flags: SchemeFlags::OPAQUE_PARAM.union(SchemeFlags::VERIFY_NON40X),
    },
    SchemeInfo {
        name: "NTLM",
        id: SchemeId::Ntlm,
        strength: 30,
        flags: SchemeFlags::OPAQUE_PARAM.union(SchemeFlags::VERIFY_NON40X),
    },
];

/// Looks up a scheme by case-insensitive name.
pub(crate) fn lookup(name: &str) -> Option<&'static SchemeInfo> {
    SCHEME_TABLE.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}
