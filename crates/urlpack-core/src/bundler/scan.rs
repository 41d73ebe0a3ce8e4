//! Specifier scanner.
//!
//! Finds import specifiers in JavaScript/TypeScript source without parsing it:
//! static `import`/`export … from`, dynamic `import()` and `require()` calls.
//! Comments, string and template literals, and regular expression literals
//! are skipped.

use crate::resolve::ReferenceKind;
use rustc_hash::FxHashSet as HashSet;

/// A specifier found in module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedImport {
    /// Specifier exactly as written.
    pub specifier: String,
    /// How it was referenced.
    pub kind: ReferenceKind,
    /// 1-indexed line of the specifier.
    pub line: u32,
}

/// Scan source for import specifiers.
///
/// Results are in first-appearance order, deduplicated by (specifier, kind).
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ScannedImport> {
    let mut scanner = Scanner::new(source);
    let mut seen = HashSet::default();
    let mut results = Vec::new();

    while let Some(found) = scanner.next_import() {
        if found.specifier.is_empty() {
            continue;
        }
        if seen.insert((found.specifier.clone(), found.kind)) {
            results.push(found);
        }
    }

    results
}

const QUOTES: [char; 3] = ['"', '\'', '`'];

/// Characters after which a `/` starts a regular expression literal.
/// `<` and `>` are left out so JSX closing tags read as plain text.
const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%~^";

/// Upper bound on how far a statement is searched for its `from` clause.
const STATEMENT_WINDOW: usize = 1000;

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if self.peek() == Some('\n') {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Skip a comment at the cursor. Returns whether one was skipped.
    fn skip_comment(&mut self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Some('/'), Some('/')) => {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
                true
            }
            (Some('/'), Some('*')) => {
                self.pos += 2;
                while self.peek().is_some() && !self.at_block_end() {
                    self.bump();
                }
                self.pos = (self.pos + 2).min(self.chars.len());
                true
            }
            _ => false,
        }
    }

    fn at_block_end(&self) -> bool {
        self.peek() == Some('*') && self.peek_at(1) == Some('/')
    }

    /// Whether a `/` at the cursor opens a regular expression literal.
    fn regex_allowed(&self) -> bool {
        self.chars[..self.pos]
            .iter()
            .rev()
            .find(|c| !c.is_whitespace())
            .map_or(true, |c| REGEX_PRECEDERS.contains(*c))
    }

    /// Skip a regular expression literal, stopping at its closing `/` or the
    /// end of the line.
    fn skip_regex(&mut self) {
        self.bump();
        let mut in_class = false;
        while let Some(c) = self.peek() {
            match c {
                '\n' => return,
                '\\' => self.bump(),
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip a template literal, including `${...}` substitutions.
    fn skip_template(&mut self) {
        self.bump();
        while let Some(c) = self.peek() {
            match c {
                '`' => {
                    self.bump();
                    return;
                }
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '$' if self.peek_at(1) == Some('{') => {
                    self.pos += 2;
                    self.skip_substitution();
                }
                _ => self.bump(),
            }
        }
    }

    /// Skip the expression of a `${...}` substitution up to its closing brace.
    fn skip_substitution(&mut self) {
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            if self.skip_comment() {
                continue;
            }
            match c {
                '"' | '\'' => {
                    if self.read_string().is_none() {
                        self.bump();
                    }
                }
                '`' => self.skip_template(),
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.bump(),
            }
        }
    }

    /// Read a quoted string at the cursor, leaving the cursor after the closing quote.
    fn read_string(&mut self) -> Option<String> {
        let quote = self.peek().filter(|c| QUOTES.contains(c))?;
        self.bump();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' && quote != '`' {
                return None;
            }
            if c == quote {
                let value: String = self.chars[start..self.pos].iter().collect();
                self.bump();
                return Some(value);
            }
            if c == '\\' {
                self.bump();
            }
            self.bump();
        }
        None
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        let len = keyword.chars().count();
        if self.pos + len > self.chars.len() {
            return false;
        }
        if self.pos > 0 {
            let prev = self.chars[self.pos - 1];
            // `obj.import(...)` and `foo.require(...)` are member calls
            if is_ident_char(prev) || prev == '.' {
                return false;
            }
        }
        if !keyword
            .chars()
            .zip(&self.chars[self.pos..])
            .all(|(a, &b)| a == b)
        {
            return false;
        }
        !self.peek_at(len).is_some_and(is_ident_char)
    }

    fn next_import(&mut self) -> Option<ScannedImport> {
        while let Some(c) = self.peek() {
            if self.skip_comment() {
                continue;
            }
            if c == '"' || c == '\'' {
                // String contents never hold imports
                let _ = self.read_string();
                continue;
            }
            if c == '`' {
                self.skip_template();
                continue;
            }
            if c == '/' && self.regex_allowed() {
                self.skip_regex();
                continue;
            }

            let (start, start_line) = (self.pos, self.line);
            let found = if self.at_keyword("import") {
                self.pos += "import".len();
                self.import_clause()
            } else if self.at_keyword("export") {
                self.pos += "export".len();
                self.from_clause()
                    .map(|s| (s, ReferenceKind::ImportStatement))
            } else if self.at_keyword("require") {
                self.pos += "require".len();
                self.call_argument().map(|s| (s, ReferenceKind::RequireCall))
            } else {
                self.bump();
                continue;
            };

            match found {
                Some((specifier, kind)) => {
                    return Some(ScannedImport {
                        specifier,
                        kind,
                        line: self.line,
                    })
                }
                None => {
                    self.pos = start;
                    self.line = start_line;
                    self.bump();
                }
            }
        }
        None
    }

    /// After `import`: a dynamic call, a side-effect import or a `from` clause.
    fn import_clause(&mut self) -> Option<(String, ReferenceKind)> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => self
                .call_argument()
                .map(|s| (s, ReferenceKind::DynamicImport)),
            Some(c) if QUOTES.contains(&c) => self
                .read_string()
                .map(|s| (s, ReferenceKind::ImportStatement)),
            _ => self
                .from_clause()
                .map(|s| (s, ReferenceKind::ImportStatement)),
        }
    }

    /// Search forward for `from "<specifier>"` within the current statement.
    fn from_clause(&mut self) -> Option<String> {
        let limit = self.pos + STATEMENT_WINDOW;
        while let Some(c) = self.peek() {
            if self.pos > limit || c == ';' {
                return None;
            }
            if self.at_keyword("from") {
                self.pos += "from".len();
                self.skip_whitespace();
                return self.read_string();
            }
            self.bump();
        }
        None
    }

    /// `( "<specifier>" )` with a string literal argument.
    fn call_argument(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.peek() != Some('(') {
            return None;
        }
        self.bump();
        self.skip_whitespace();
        let specifier = self.read_string()?;
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.bump();
        }
        Some(specifier)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
