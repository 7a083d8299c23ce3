//! Fuzz target for the bundled workflow parser.
//!
//! Diagnostics must be produced for any input without panicking, and always
//! point at a 1-based position.

#![no_main]

use libfuzzer_sys::fuzz_target;

use workflow_injection_fixer::{WorkflowParser, YamlWorkflowParser};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if content.len() > 20_000 {
            return;
        }
        for diagnostic in YamlWorkflowParser::new().parse(content) {
            assert!(diagnostic.line >= 1);
            assert!(diagnostic.column >= 1);
        }
    }
});
