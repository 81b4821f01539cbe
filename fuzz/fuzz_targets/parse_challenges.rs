// Copyright (C) 2021 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

// Runs the challenge-list tokenizer over arbitrary input, checking only for
// panics: the scanner's contract is that malformed input is either rejected
// with a `parser::Error` or tolerated, never a panic. Run via:
//
// ```console
// $ cd .../http-auth-core/fuzz
// $ RUST_LOG=http_auth_core=trace cargo +nightly fuzz run parse_challenges
// ```

#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = env_logger::builder().try_init();
    let _ = http_auth_core::parse_challenges(data);
});
