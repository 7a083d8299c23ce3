//! Fuzz target for single-finding remediation.
//!
//! Arbitrary documents and offsets must never panic, and a successful patch
//! must keep every original line (remediation only replaces or inserts).

#![no_main]

use libfuzzer_sys::fuzz_target;

use workflow_injection_fixer::{Finding, RemediationErrorKind, RemediationOptions, patch_document};

const EXPRESSIONS: &[&str] = &[
    "github.event.issue.title",
    "github.head_ref",
    "github.event.commits[0].message",
    "github.event.pages[3].page_name",
    "github.sha",
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(content) = std::str::from_utf8(rest) else {
        return;
    };
    // Skip extremely large inputs to avoid timeout (not a real bug)
    if content.len() > 20_000 {
        return;
    }

    let line_count = content.lines().count().max(1);
    let offset = usize::from(selector >> 3) % (line_count + 2);
    let expression = EXPRESSIONS[usize::from(selector & 0x07) % EXPRESSIONS.len()];
    let finding = Finding::new("fuzz.yml", offset, expression);

    match patch_document(&finding, content, &RemediationOptions::default()) {
        Ok(patched) => {
            assert!(patched.content.lines().count() >= content.lines().count());
        }
        Err(err) => {
            if let RemediationErrorKind::InvalidOffset { offset: reported, .. } = err.kind() {
                assert_eq!(*reported, offset);
            }
        }
    }
});
