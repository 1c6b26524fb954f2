//! Parse a JSON file into a flat binary tree, print the build stats,
//! then regenerate the text form on stdout.
//!
//! cargo run --package flatjson --example resave -- input.json

use flatjson::{JsonWriter, build, export};
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1);
    let input = match &path {
        Some(path) => std::fs::read(path)?,
        None => br#"{"name": "demo", "values": [1, 2.5, null], "nested": {"ok": true}}"#.to_vec(),
    };

    let tree = build(&input)?;
    let stats = tree.stats();
    eprintln!(
        "{} bytes in -> {} items + {} string bytes ({} unique of {} strings), {} bytes total",
        stats.bytes_read,
        stats.item_count,
        stats.text_bytes,
        stats.unique_strings,
        stats.string_occurrences,
        stats.total_bytes,
    );

    let stdout = std::io::stdout();
    let mut writer = JsonWriter::new(stdout.lock());
    if !export::write_tree(&tree, &mut writer) || !writer.finish() {
        let err = writer.take_error().expect("failed writer latches an error");
        return Err(err.into());
    }
    writer.into_inner().flush()?;
    Ok(())
}
