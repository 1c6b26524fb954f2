//! Table-driven build vectors: each case checks the item count and the
//! full structural value of the parsed tree.

use flatjson::{build, export};
use serde::Deserialize;

#[derive(Deserialize)]
struct Vectors {
    cases: Vec<Case>,
}

#[derive(Deserialize)]
struct Case {
    name: String,
    input: String,
    item_count: u32,
    unique_strings: u32,
    expected: serde_json::Value,
}

const VECTORS: &str = r##"
{
  "cases": [
    {
      "name": "empty object",
      "input": "{}",
      "item_count": 1,
      "unique_strings": 0,
      "expected": {}
    },
    {
      "name": "flat scalars",
      "input": "{\"i\": 3, \"f\": 0.5, \"b\": false, \"s\": \"txt\", \"n\": null}",
      "item_count": 6,
      "unique_strings": 6,
      "expected": {"i": 3, "f": 0.5, "b": false, "s": "txt", "n": null}
    },
    {
      "name": "nested containers",
      "input": "{\"a\": {\"b\": {\"c\": []}}}",
      "item_count": 4,
      "unique_strings": 3,
      "expected": {"a": {"b": {"c": []}}}
    },
    {
      "name": "root array",
      "input": "[1, 2, 3]",
      "item_count": 4,
      "unique_strings": 0,
      "expected": [1, 2, 3]
    },
    {
      "name": "array of objects",
      "input": "[{\"x\": 1}, {\"x\": 2}]",
      "item_count": 5,
      "unique_strings": 1,
      "expected": [{"x": 1}, {"x": 2}]
    },
    {
      "name": "mixed array",
      "input": "{\"v\": [true, null, 2.5, \"s\", [], {}]}",
      "item_count": 8,
      "unique_strings": 2,
      "expected": {"v": [true, null, 2.5, "s", [], {}]}
    },
    {
      "name": "shared strings",
      "input": "{\"dup\": \"dup\", \"other\": \"dup\"}",
      "item_count": 3,
      "unique_strings": 2,
      "expected": {"dup": "dup", "other": "dup"}
    },
    {
      "name": "escapes",
      "input": "{\"s\": \"tab\\t quote\\\" slash\\/ u\\u0041\"}",
      "item_count": 2,
      "unique_strings": 2,
      "expected": {"s": "tab\t quote\" slash/ uA"}
    },
    {
      "name": "comments as whitespace",
      "input": "// head\n{ \"x\" /* k */: 1 /* v */ }",
      "item_count": 2,
      "unique_strings": 1,
      "expected": {"x": 1}
    },
    {
      "name": "negative and exponent numbers",
      "input": "[-5, 1e3, -2.5e2]",
      "item_count": 4,
      "unique_strings": 0,
      "expected": [-5, 1000.0, -250.0]
    }
  ]
}
"##;

#[test]
fn test_build_vectors() {
    let vectors: Vectors = serde_json::from_str(VECTORS).unwrap();
    for case in &vectors.cases {
        let tree = build(case.input.as_bytes())
            .unwrap_or_else(|e| panic!("case '{}' failed to build: {e}", case.name));
        assert_eq!(
            tree.item_count(),
            case.item_count,
            "item count for case '{}'",
            case.name
        );
        assert_eq!(
            tree.stats().unique_strings,
            case.unique_strings,
            "unique strings for case '{}'",
            case.name
        );
        assert_eq!(
            export::to_serde_value(&tree),
            case.expected,
            "structure for case '{}'",
            case.name
        );
    }
}

#[test]
fn test_vectors_survive_reload() {
    let vectors: Vectors = serde_json::from_str(VECTORS).unwrap();
    for case in &vectors.cases {
        let tree = build(case.input.as_bytes()).unwrap();
        let reloaded = flatjson::Tree::from_bytes(tree.as_bytes().to_vec())
            .unwrap_or_else(|e| panic!("case '{}' failed to reload: {e}", case.name));
        assert_eq!(
            export::to_serde_value(&reloaded),
            case.expected,
            "reloaded structure for case '{}'",
            case.name
        );
    }
}
