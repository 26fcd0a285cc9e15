// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use libfuzzer_sys::fuzz_target;
use scrapport_core::{parse, BlockConverter, MarkdownExporter};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let lines = parse(text, Some("fuzz"));
    let originals: Vec<&str> = lines.iter().map(|l| l.original.as_str()).collect();
    assert_eq!(originals.join("\n"), text);

    let _ = BlockConverter::default().convert_lines(&lines);
    let _ = MarkdownExporter::default().export_lines(&lines);
});
