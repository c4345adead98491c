//! Reading syntax trees, scripts and invocation parameters.

use owo_colors::OwoColorize;
use quill_compiler::ast::Program;
use quill_compiler::{CompileOptions, StackItem};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Loads a module's syntax tree from a JSON file.
pub fn load_program(path: &Path) -> Result<Program, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let program: Program = serde_json::from_str(&text)
        .map_err(|e| format!("invalid syntax tree in '{}': {}", path.display(), e))?;
    tracing::debug!("loaded {} statements from {}", program.body.len(), path.display());
    Ok(program)
}

/// Loads compile options from a JSON file; missing fields keep their defaults.
pub fn load_options(path: &Path) -> Result<CompileOptions, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid options in '{}': {}", path.display(), e))
}

/// Reads a script file holding either hex text or raw bytes.
pub fn read_script(path: &Path) -> Result<Vec<u8>, String> {
    let bytes = fs::read(path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let script = decode_script(bytes);
    tracing::debug!("read {} byte script from {}", script.len(), path.display());
    Ok(script)
}

fn decode_script(bytes: Vec<u8>) -> Vec<u8> {
    let decoded = std::str::from_utf8(&bytes).ok().and_then(|text| {
        let text = text.trim();
        let text = text.strip_prefix("0x").unwrap_or(text);
        if text.is_empty() {
            None
        } else {
            hex::decode(text).ok()
        }
    });
    decoded.unwrap_or(bytes)
}

/// Parses one invocation parameter.
///
/// JSON numbers become integers, strings become bytes (hex when prefixed
/// with `0x`), arrays and objects become arrays and maps. Anything that is
/// not JSON is taken as a string.
pub fn parse_param(text: &str) -> Result<StackItem, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => json_to_item(&value),
        Err(_) => Ok(StackItem::from(text)),
    }
}

fn json_to_item(value: &Value) -> Result<StackItem, String> {
    Ok(match value {
        Value::Null => StackItem::ByteArray(Vec::new()),
        Value::Bool(b) => StackItem::from(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => StackItem::from(i),
            (None, Some(u)) => StackItem::Integer(u.into()),
            _ => return Err(format!("only integers can be passed, found {}", n)),
        },
        Value::String(s) => match s.strip_prefix("0x") {
            Some(digits) => StackItem::from(
                hex::decode(digits).map_err(|e| format!("invalid hex '{}': {}", s, e))?,
            ),
            None => StackItem::from(s.as_str()),
        },
        Value::Array(items) => StackItem::array(
            items
                .iter()
                .map(json_to_item)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(fields) => {
            let map = StackItem::map();
            if let StackItem::Map(entries) = &map {
                for (key, value) in fields {
                    entries
                        .borrow_mut()
                        .push((StackItem::from(key.as_str()), json_to_item(value)?));
                }
            }
            map
        }
    })
}

/// Splits a parameter line on whitespace outside quotes and brackets.
pub fn split_params(line: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in line.chars() {
        if escape_next {
            escape_next = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' if in_string => {
                escape_next = true;
                current.push(c);
            }
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            '[' | '{' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ']' | '}' if !in_string => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && !in_string && depth == 0 => {
                if !current.is_empty() {
                    params.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        params.push(current);
    }
    params
}

/// Renders a result item with colors.
pub fn format_item(item: &StackItem) -> String {
    match item {
        StackItem::Integer(value) => value.to_string().yellow().to_string(),
        StackItem::Boolean(value) => value.to_string().yellow().to_string(),
        StackItem::ByteArray(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => {
                format!("{:?}", text).green().to_string()
            }
            _ => format!("0x{}", hex::encode(bytes)).cyan().to_string(),
        },
        other => other.to_string().cyan().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert!(parse_param("42").unwrap().equals(&StackItem::from(42)));
        assert!(parse_param("\"alice\"").unwrap().equals(&StackItem::from("alice")));
        assert!(parse_param("alice").unwrap().equals(&StackItem::from("alice")));
        assert!(parse_param("\"0x0102\"").unwrap().equals(&StackItem::from(vec![1, 2])));
        assert!(matches!(parse_param("true").unwrap(), StackItem::Boolean(true)));
        assert!(parse_param("1.5").is_err());
        let StackItem::Array(items) = parse_param("[1, \"a\"]").unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(items.borrow().len(), 2);
    }

    #[test]
    fn test_split_params() {
        assert_eq!(split_params("1 \"a b\" [1, 2]"), vec!["1", "\"a b\"", "[1, 2]"]);
        assert_eq!(split_params("  "), Vec::<String>::new());
        assert_eq!(split_params("{\"k\": [1, 2]} x"), vec!["{\"k\": [1, 2]}", "x"]);
    }

    #[test]
    fn test_decode_script() {
        assert_eq!(decode_script(b"0x51 \n".to_vec()), vec![0x51]);
        assert_eq!(decode_script(vec![0x51, 0x66]), vec![0x51, 0x66]);
        assert_eq!(decode_script(b"zz".to_vec()), b"zz".to_vec());
    }
}
