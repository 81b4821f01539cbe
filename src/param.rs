// Copyright (C) 2021 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsed parameter values, shared by the tokenizer and every scheme engine.

use memchr::memchr;

/// Parsed parameter value, either a bare token or the contents of a
/// quoted-string with its backslash escapes still in place.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ParamValue<'i> {
    /// The number of backslash escapes in a quoted-text parameter; 0 for a plain token.
    escapes: usize,

    /// The raw string, which must be pure ASCII (no bytes >= 128) and be consistent with `escapes`.
    raw: &'i str,
}

impl<'i> ParamValue<'i> {
    /// Creates a new param, panicking if invariants are not satisfied.
    /// This is not part of the stable API; it's just for the tokenizer and
    /// the fuzz tester to use.
    #[doc(hidden)]
    pub fn new(escapes: usize, raw: &'i str) -> Self {
        let mut pos = 0;
        for escape in 0..escapes {
            match memchr(b'\\', &raw.as_bytes()[pos..]) {
                Some(rel_pos) => pos += rel_pos + 2,
                None => panic!(
                    "expected {} backslashes in {:?}, ran out after {}",
                    escapes, raw, escape
                ),
            };
        }
        if memchr(b'\\', &raw.as_bytes()[pos..]).is_some() {
            panic!("expected {} backslashes in {:?}, are more", escapes, raw);
        }
        ParamValue { escapes, raw }
    }

    /// Appends the unescaped form of this parameter to the supplied string.
    fn append_unescaped(&self, to: &mut String) {
        to.reserve(self.raw.len() - self.escapes);
        let mut first_unwritten = 0;
        for _ in 0..self.escapes {
            let i = match memchr(b'\\', &self.raw.as_bytes()[first_unwritten..]) {
                Some(rel_i) => first_unwritten + rel_i,
                None => panic!("bad ParamValue; not as many backslash escapes as promised"),
            };
            to.push_str(&self.raw[first_unwritten..i]);
            to.push_str(&self.raw[i + 1..i + 2]);
            first_unwritten = i + 2;
        }
        to.push_str(&self.raw[first_unwritten..]);
    }

    /// Returns the unescaped length of this parameter; cheap.
    #[inline]
    pub fn unescaped_len(&self) -> usize {
        self.raw.len() - self.escapes
    }

    /// Returns the unescaped form of this parameter as a fresh `String`.
    pub fn to_unescaped(&self) -> String {
        let mut to = String::new();
        self.append_unescaped(&mut to);
        to
    }

    /// Returns `true` if the unescaped value equals `other`, without allocating
    /// when there are no escapes to resolve.
    pub fn eq_unescaped(&self, other: &str) -> bool {
        if self.escapes == 0 {
            self.raw == other
        } else {
            self.to_unescaped() == other
        }
    }

    /// Returns `true` if the unescaped value case-insensitively equals `other`.
    pub fn eq_ignore_ascii_case_unescaped(&self, other: &str) -> bool {
        if self.escapes == 0 {
            self.raw.eq_ignore_ascii_case(other)
        } else {
            self.to_unescaped().eq_ignore_ascii_case(other)
        }
    }
}

impl<'i> std::fmt::Debug for ParamValue<'i> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::ParamValue;

    #[test]
    fn unescape() {
        assert_eq!(
            &ParamValue {
                escapes: 0,
                raw: ""
            }
            .to_unescaped(),
            ""
        );
        assert_eq!(
            &ParamValue {
                escapes: 0,
                raw: "foo"
            }
            .to_unescaped(),
            "foo"
        );
        assert_eq!(
            &ParamValue {
                escapes: 1,
                raw: "\\foo"
            }
            .to_unescaped(),
            "foo"
        );
        assert_eq!(
            &ParamValue {
                escapes: 1,
                raw: "fo\\o"
            }
            .to_unescaped(),
            "foo"
        );
        assert_eq!(
            &ParamValue {
                escapes: 1,
                raw: "foo\\bar"
            }
            .to_unescaped(),
            "foobar"
        );
        assert_eq!(
            &ParamValue {
                escapes: 3,
                raw: "\\foo\\ba\\r"
            }
            .to_unescaped(),
            "foobar"
        );
    }

    #[test]
    fn eq_unescaped() {
        let v = ParamValue::new(1, "fo\\o");
        assert!(v.eq_unescaped("foo"));
        assert!(!v.eq_unescaped("bar"));
        assert!(v.eq_ignore_ascii_case_unescaped("FOO"));
    }
}
