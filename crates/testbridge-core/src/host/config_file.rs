//! Config file discovery and static parsing.
//!
//! Reads `testbridge.config.*`, `vitest.config.*` or `vite.config.*` and
//! extracts the object literal after `export default`, optionally wrapped in
//! `defineConfig(...)`:
//!
//! ```js
//! import { defineConfig } from 'vite';
//!
//! export default defineConfig({
//!   mode: 'test',
//!   define: { __APP_VERSION__: '"1.0.0"' },
//!   test: { environment: 'jsdom', watch: false },
//! });
//! ```
//!
//! Only literal values are understood; computed expressions fail to parse.

use crate::config::ConfigTree;
use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};

/// Config file names in priority order.
pub const CONFIG_FILES: &[&str] = &[
    "testbridge.config.ts",
    "testbridge.config.js",
    "vitest.config.ts",
    "vitest.config.js",
    "vite.config.ts",
    "vite.config.js",
];

/// Find a config file in `root`.
#[must_use]
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Load the host config tree from `root`.
///
/// With `config_path` set, that file must exist. Otherwise the first file in
/// [`CONFIG_FILES`] is used, and `Ok(None)` means none was found.
pub fn load_config(root: &Path, config_path: Option<&Path>) -> Result<Option<(PathBuf, ConfigTree)>> {
    let path = match config_path {
        Some(p) => {
            let abs = if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            };
            if !abs.is_file() {
                return Err(Error::ConfigNotFound { path: abs });
            }
            abs
        }
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;

    let tree = parse_config_source(&source).map_err(|message| Error::ConfigParse {
        path: path.clone(),
        message,
    })?;
    Ok(Some((path, tree)))
}

/// Parse the default-exported object of a config module.
pub fn parse_config_source(source: &str) -> std::result::Result<ConfigTree, String> {
    let stripped = strip_comments(source);
    let object = default_export_object(&stripped)
        .ok_or_else(|| "no `export default { ... }` found in config file".to_string())?;

    match LiteralParser::new(object).parse_value()? {
        Value::Object(tree) => Ok(tree),
        _ => Err("default export is not an object".to_string()),
    }
}

/// Locate `export default {...}` or `export default defineConfig({...})` and
/// return the object literal including its braces.
fn default_export_object(source: &str) -> Option<&str> {
    let marker = "export default";
    let idx = source.find(marker)?;
    let mut rest = source[idx + marker.len()..].trim_start();

    if let Some(call) = rest.strip_prefix("defineConfig") {
        rest = call.trim_start().strip_prefix('(')?.trim_start();
    }
    if !rest.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove `//` and `/* */` comments outside string literals, keeping newlines.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match (ch, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    prev = c;
                }
            }
            _ => {
                if matches!(ch, '"' | '\'' | '`') {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

/// Parser for JS object literals: unquoted keys, single/double/backtick
/// strings, trailing commas, nested objects and arrays.
struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> std::result::Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"' | '\'' | '`') => self.parse_string().map(Value::String),
            Some(ch) if ch == '-' || ch.is_ascii_digit() => self.parse_number(),
            Some(ch) if is_ident_start(ch) => self.parse_keyword(),
            Some(ch) => Err(format!("unexpected character '{ch}' at offset {}", self.pos)),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn parse_object(&mut self) -> std::result::Result<Value, String> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                None => return Err("unterminated object".to_string()),
                _ => {}
            }

            let key = self.parse_key()?;
            self.skip_ws();
            if self.bump() != Some(':') {
                return Err(format!("expected ':' after key `{key}`"));
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.expect_separator('}')?;
        }
    }

    fn parse_array(&mut self) -> std::result::Result<Value, String> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                None => return Err("unterminated array".to_string()),
                _ => {}
            }
            items.push(self.parse_value()?);
            self.expect_separator(']')?;
        }
    }

    fn expect_separator(&mut self, close: char) -> std::result::Result<(), String> {
        self.skip_ws();
        match self.peek() {
            Some(',') => {
                self.bump();
                Ok(())
            }
            Some(c) if c == close => Ok(()),
            Some(c) => Err(format!("expected ',' or '{close}', got '{c}'")),
            None => Err(format!("expected ',' or '{close}', got end of input")),
        }
    }

    fn parse_key(&mut self) -> std::result::Result<String, String> {
        match self.peek() {
            Some('"' | '\'' | '`') => self.parse_string(),
            Some(ch) if is_ident_start(ch) || ch.is_ascii_digit() => Ok(self.take_ident()),
            other => Err(format!("expected object key, got {other:?}")),
        }
    }

    fn take_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '$' | '.') {
                ident.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        ident
    }

    fn parse_string(&mut self) -> std::result::Result<String, String> {
        let quote = self.bump().ok_or("expected string")?;
        let mut s = String::new();
        loop {
            match self.bump() {
                Some(ch) if ch == quote => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(ch @ ('\\' | '"' | '\'' | '`')) => s.push(ch),
                    Some(ch) => {
                        s.push('\\');
                        s.push(ch);
                    }
                    None => return Err("unterminated string escape".to_string()),
                },
                Some(ch) => s.push(ch),
                None => return Err("unterminated string".to_string()),
            }
        }
    }

    fn parse_number(&mut self) -> std::result::Result<Value, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(
                    self.pos.checked_sub(1).and_then(|i| self.chars.get(i)),
                    Some(&('e' | 'E'))
                );
            if !(c.is_ascii_digit() || matches!(c, '.' | '_' | 'e' | 'E') || exponent_sign) {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number '{text}'"))
    }

    fn parse_keyword(&mut self) -> std::result::Result<Value, String> {
        let start = self.pos;
        let word = self.take_ident();
        match word.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" => Ok(Value::Null),
            other => Err(format!(
                "`{other}` at offset {start} is not a literal; only static config values are supported"
            )),
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}
