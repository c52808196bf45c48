//! Semantic analysis — structural representation used by the `semantic`
//! resolution strategy and by cyclomatic-complexity scoring in `voting`.
//!
//! Parsers are pluggable via a registry keyed by file extension; unknown
//! extensions fall back to [`SemanticModule::raw`], restricted to textual
//! strategies only.

use std::collections::HashMap;

/// One top-level declaration (function, class, import) extracted from a
/// source file, identified by its signature for union/collision logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub signature: String,
    pub body: String,
    pub complexity: u32,
}

/// A structured representation of one file variant: its declarations, or
/// `None` when the parser couldn't make sense of the content (`raw`).
#[derive(Debug, Clone)]
pub struct SemanticModule {
    pub declarations: Vec<Declaration>,
    pub is_raw: bool,
}

impl SemanticModule {
    pub fn raw() -> Self {
        Self { declarations: Vec::new(), is_raw: true }
    }

    /// Two modules are semantically equivalent iff their declaration sets
    /// are identical once bodies are normalized (comments stripped,
    /// whitespace-collapsed): a normalised structural tree with metadata
    /// stripped.
    pub fn equivalent_to(&self, other: &SemanticModule) -> bool {
        if self.is_raw || other.is_raw {
            return false;
        }
        let mut a: Vec<String> = self.declarations.iter().map(normalize_declaration).collect();
        let mut b: Vec<String> = other.declarations.iter().map(normalize_declaration).collect();
        a.sort();
        b.sort();
        a == b
    }
}

fn normalize_declaration(decl: &Declaration) -> String {
    let stripped = strip_comments(&decl.body);
    let body: String = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{}::{}", decl.signature, body)
}

/// Strip `//` and `/* */` comments, plus Python-style `#` line comments,
/// from `body`. `#[` is left alone since it opens a Rust attribute, not a
/// comment.
fn strip_comments(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '#' if chars.peek() != Some(&'[') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parses one file variant's content into a [`SemanticModule`].
pub trait LanguageParser: Send + Sync {
    fn parse(&self, content: &str) -> Option<SemanticModule>;
}

/// Parses C-family-ish source (Rust, JS, TS, Go, Java, C, C++): top-level
/// declarations are recognized heuristically by a leading keyword
/// (`fn`, `function`, `class`, `struct`, `impl`, `import`, `use`) followed
/// by a brace-delimited or semicolon-terminated body.
pub struct BraceLanguageParser;

impl LanguageParser for BraceLanguageParser {
    fn parse(&self, content: &str) -> Option<SemanticModule> {
        const KEYWORDS: &[&str] = &["fn ", "function ", "class ", "struct ", "impl ", "import ", "use ", "def "];
        let mut declarations = Vec::new();
        let mut current: Option<(String, String)> = None;
        let mut depth = 0i32;

        for line in content.lines() {
            let trimmed = line.trim();
            if depth == 0 && KEYWORDS.iter().any(|k| trimmed.starts_with(k)) {
                if let Some((sig, body)) = current.take() {
                    let complexity = cyclomatic_complexity(&body);
                    declarations.push(Declaration { signature: sig, body, complexity });
                }
                let signature = trimmed.split(['{', '(']).next().unwrap_or(trimmed).trim().to_string();
                current = Some((signature, String::new()));
            }
            if let Some((_, body)) = current.as_mut() {
                body.push_str(line);
                body.push('\n');
            }
            depth += line.matches('{').count() as i32;
            depth -= line.matches('}').count() as i32;
            if depth <= 0 && current.is_some() && (trimmed.ends_with(';') || trimmed.ends_with('}')) {
                let (sig, body) = current.take().unwrap();
                let complexity = cyclomatic_complexity(&body);
                declarations.push(Declaration { signature: sig, body, complexity });
                depth = 0;
            }
        }
        if let Some((sig, body)) = current.take() {
            let complexity = cyclomatic_complexity(&body);
            declarations.push(Declaration { signature: sig, body, complexity });
        }

        if declarations.is_empty() {
            None
        } else {
            Some(SemanticModule { declarations, is_raw: false })
        }
    }
}

/// Cyclomatic complexity, computed structurally: base 1, `+1` per
/// conditional keyword, `+N-1` per multi-clause `match`/`switch` arm count.
pub fn cyclomatic_complexity(body: &str) -> u32 {
    let mut complexity: u32 = 1;
    const CONDITIONALS: &[&str] = &["if ", "if(", "else if", "while ", "while(", "for ", "for(", "case ", "catch ", "&&", "||", "?"];
    for keyword in CONDITIONALS {
        complexity += body.matches(keyword).count() as u32;
    }
    complexity
}

/// Registry of parsers keyed by file extension (without the leading dot).
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Box<dyn LanguageParser>>,
}

impl ParserRegistry {
    pub fn with_defaults() -> Self {
        let mut parsers: HashMap<&'static str, Box<dyn LanguageParser>> = HashMap::new();
        for ext in ["rs", "js", "ts", "go", "java", "c", "cpp", "h", "py"] {
            parsers.insert(ext, Box::new(BraceLanguageParser));
        }
        Self { parsers }
    }

    /// Parse `content` as `path`'s extension indicates, or `SemanticModule::raw()`
    /// for unknown extensions / unparseable content.
    pub fn parse(&self, path: &str, content: &str) -> SemanticModule {
        let ext = path.rsplit('.').next().unwrap_or("");
        self.parsers
            .get(ext)
            .and_then(|parser| parser.parse(content))
            .unwrap_or_else(SemanticModule::raw)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
