//! Positioned reader for the YAML subset RAML documents are written in.
//!
//! Supports block mappings and sequences, flow collections, plain, quoted and
//! block scalars, comments and the `!include` tag. Every node records the
//! line, column and byte offset of its first character and of the position
//! just past its last one.

use super::SyntaxError;
use crate::nodes::{NodeId, NodeKind, Position, Tree};

#[derive(Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    col: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

pub(crate) struct Reader<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    col: usize,
    tree: Tree,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 0,
            col: 0,
            tree: Tree::new(),
        }
    }

    /// Reads one document and returns its tree.
    pub(crate) fn read(mut self) -> Result<Tree, SyntaxError> {
        if self.src.starts_with('\u{feff}') {
            self.bump();
        }
        self.skip_blank();
        if self.starts_with_marker("---") {
            self.pos += 3;
            self.col += 3;
            self.skip_blank();
        }
        let root = if self.peek().is_none() {
            let here = self.position();
            self.tree.add(NodeKind::Null, here, here)
        } else {
            self.parse_block(-1)?
        };
        self.skip_blank();
        if self.starts_with_marker("...") || self.starts_with_marker("---") {
            self.pos = self.src.len();
        }
        if self.peek().is_some() {
            return Err(self.error("unexpected content after the document"));
        }
        self.tree.set_root(root);
        Ok(self.tree)
    }

    // ========================================================================
    // CURSOR HELPERS
    // ========================================================================

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.col, self.pos)
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.col = mark.col;
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            position: self.position(),
        }
    }

    fn at_eol(&self) -> bool {
        matches!(self.peek(), None | Some('\n') | Some('\r'))
    }

    fn starts_with_marker(&self, marker: &str) -> bool {
        self.col == 0
            && self.src[self.pos..].starts_with(marker)
            && matches!(
                self.src[self.pos + marker.len()..].chars().next(),
                None | Some(' ') | Some('\n') | Some('\r')
            )
    }

    fn skip_inline_spaces(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        while !self.at_eol() {
            self.bump();
        }
    }

    fn skip_newline(&mut self) {
        if self.peek() == Some('\r') {
            self.bump();
        }
        if self.peek() == Some('\n') {
            self.bump();
        }
    }

    /// Skips spaces, comments and line breaks.
    fn skip_blank(&mut self) {
        loop {
            self.skip_inline_spaces();
            match self.peek() {
                Some('#') => self.skip_comment(),
                Some('\n') | Some('\r') => self.skip_newline(),
                _ => break,
            }
        }
    }

    fn is_sequence_entry(&self) -> bool {
        self.peek() == Some('-')
            && matches!(
                self.peek_second(),
                None | Some(' ') | Some('\t') | Some('\n') | Some('\r')
            )
    }

    fn rest_of_line(&self) -> &'a str {
        let rest = &self.src[self.pos..];
        let end = rest.find('\n').unwrap_or(rest.len());
        rest[..end].trim_end_matches('\r')
    }

    /// True when the current line holds `key:` followed by a space or line end.
    fn line_is_mapping_entry(&self) -> bool {
        let line = self.rest_of_line();
        let mut chars = line.char_indices().peekable();
        match line.chars().next() {
            None | Some('[') | Some('{') | Some('#') | Some('!') | Some('|') | Some('>') => {
                return false
            }
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                let mut closed = None;
                while let Some((i, c)) = chars.next() {
                    if c == '\\' && quote == '"' {
                        chars.next();
                    } else if c == quote {
                        if quote == '\'' && chars.peek().map(|(_, n)| *n) == Some('\'') {
                            chars.next();
                        } else {
                            closed = Some(i + 1);
                            break;
                        }
                    }
                }
                return match closed {
                    Some(end) => {
                        let after = line[end..].trim_start();
                        after.starts_with(':')
                            && matches!(after[1..].chars().next(), None | Some(' ') | Some('\t'))
                    }
                    None => false,
                };
            }
            _ => {}
        }
        let mut previous = ' ';
        while let Some((i, c)) = chars.next() {
            if c == '#' && (previous == ' ' || previous == '\t') {
                return false;
            }
            if c == ':' && matches!(line[i + 1..].chars().next(), None | Some(' ') | Some('\t')) {
                return true;
            }
            previous = c;
        }
        false
    }

    // ========================================================================
    // BLOCK STRUCTURE
    // ========================================================================

    fn parse_block(&mut self, parent_indent: isize) -> Result<NodeId, SyntaxError> {
        self.skip_blank();
        let here = self.position();
        if self.peek().is_none() || (self.col as isize) <= parent_indent {
            return Ok(self.tree.add(NodeKind::Null, here, here));
        }
        if self.is_sequence_entry() {
            return self.parse_block_sequence(self.col);
        }
        if self.line_is_mapping_entry() {
            return self.parse_block_mapping(self.col);
        }
        self.parse_inline_value(parent_indent)
    }

    fn parse_block_mapping(&mut self, indent: usize) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let map = self.tree.add(NodeKind::Object, start, start);
        let mut end;
        loop {
            let key = self.parse_key()?;
            self.skip_inline_spaces();
            if self.peek() != Some(':') {
                return Err(self.error("expected ':' after a mapping key"));
            }
            self.bump();
            let after_colon = self.position();
            let value = self.parse_mapping_value(indent, after_colon)?;
            let pair = self.tree.add_pair(key, value);
            end = self.tree.end(pair);
            self.tree.push_child(map, pair);

            self.skip_blank();
            if self.peek().is_none() || self.col < indent {
                break;
            }
            if self.col > indent {
                return Err(self.error("bad indentation of a mapping entry"));
            }
            if self.starts_with_marker("---") || self.starts_with_marker("...") {
                break;
            }
            if !self.line_is_mapping_entry() {
                return Err(self.error("could not find expected ':'"));
            }
        }
        self.tree.node_mut(map).end = end;
        Ok(map)
    }

    fn parse_key(&mut self) -> Result<NodeId, SyntaxError> {
        match self.peek() {
            Some('"') | Some('\'') => self.parse_quoted(),
            _ => {
                let start = self.position();
                let line = self.rest_of_line();
                let mut length = line.len();
                for (i, c) in line.char_indices() {
                    if c == ':' && matches!(line[i + 1..].chars().next(), None | Some(' ') | Some('\t')) {
                        length = i;
                        break;
                    }
                }
                let text = line[..length].trim_end();
                for _ in text.chars() {
                    self.bump();
                }
                let end = self.position();
                Ok(self.tree.add(plain_kind(text), start, end))
            }
        }
    }

    fn parse_mapping_value(
        &mut self,
        indent: usize,
        after_colon: Position,
    ) -> Result<NodeId, SyntaxError> {
        self.skip_inline_spaces();
        if self.at_eol() || self.peek() == Some('#') {
            let mark = self.mark();
            self.skip_blank();
            if self.peek().is_some() && !self.starts_with_marker("---") {
                if self.col > indent {
                    return self.parse_block(indent as isize);
                }
                if self.col == indent && self.is_sequence_entry() {
                    return self.parse_block_sequence(indent);
                }
            }
            self.reset(mark);
            return Ok(self.tree.add(NodeKind::Null, after_colon, after_colon));
        }
        self.parse_inline_value(indent as isize)
    }

    fn parse_block_sequence(&mut self, indent: usize) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let sequence = self.tree.add(NodeKind::Array, start, start);
        let mut end;
        loop {
            self.bump();
            let after_dash = self.position();
            self.skip_inline_spaces();
            let item = if self.at_eol() || self.peek() == Some('#') {
                let mark = self.mark();
                self.skip_blank();
                if self.peek().is_some() && self.col > indent {
                    self.parse_block(indent as isize)?
                } else {
                    self.reset(mark);
                    self.tree.add(NodeKind::Null, after_dash, after_dash)
                }
            } else if self.is_sequence_entry() {
                self.parse_block_sequence(self.col)?
            } else if self.line_is_mapping_entry() {
                self.parse_block_mapping(self.col)?
            } else {
                self.parse_inline_value(indent as isize)?
            };
            end = self.tree.end(item);
            self.tree.push_child(sequence, item);

            self.skip_blank();
            if self.peek().is_none() || self.col < indent {
                break;
            }
            if self.col > indent {
                return Err(self.error("bad indentation of a sequence entry"));
            }
            if !self.is_sequence_entry() {
                break;
            }
        }
        self.tree.node_mut(sequence).end = end;
        Ok(sequence)
    }

    // ========================================================================
    // SCALARS
    // ========================================================================

    fn parse_inline_value(&mut self, parent_indent: isize) -> Result<NodeId, SyntaxError> {
        let node = match self.peek() {
            Some('!') => return self.parse_tagged(parent_indent, false),
            Some('|') | Some('>') => return self.parse_block_scalar(parent_indent),
            Some('[') => self.parse_flow_sequence()?,
            Some('{') => self.parse_flow_mapping()?,
            Some('"') | Some('\'') => self.parse_quoted()?,
            _ => return self.parse_plain_block(parent_indent),
        };
        self.skip_inline_spaces();
        if self.peek() == Some('#') {
            self.skip_comment();
        }
        if !self.at_eol() {
            return Err(self.error("unexpected characters after a value"));
        }
        Ok(node)
    }

    fn parse_tagged(&mut self, parent_indent: isize, flow: bool) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\n' || c == '\r' || (flow && ",]}".contains(c)) {
                break;
            }
            tag.push(c);
            self.bump();
        }
        self.skip_inline_spaces();
        if tag == "!include" {
            let target = if flow {
                self.parse_plain_flow()?
            } else {
                match self.peek() {
                    Some('"') | Some('\'') => self.parse_quoted()?,
                    _ => self.parse_plain_line()?,
                }
            };
            let location = self.tree.literal(target).unwrap_or_default();
            let end = self.tree.end(target);
            return Ok(self.tree.add(NodeKind::Include(location), start, end));
        }
        if self.at_eol() {
            let here = self.position();
            return Ok(self.tree.add(NodeKind::Null, here, here));
        }
        if flow {
            self.parse_flow_node()
        } else {
            self.parse_inline_value(parent_indent)
        }
    }

    /// A plain scalar limited to the current line, without continuation.
    fn parse_plain_line(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let text = self.read_plain_text();
        let end = self.position();
        Ok(self.tree.add(plain_kind(&text), start, end))
    }

    fn read_plain_text(&mut self) -> String {
        let line = self.rest_of_line();
        let mut length = line.len();
        let mut previous = ' ';
        for (i, c) in line.char_indices() {
            if c == '#' && (previous == ' ' || previous == '\t') {
                length = i;
                break;
            }
            previous = c;
        }
        let text = line[..length].trim_end();
        for _ in text.chars() {
            self.bump();
        }
        text.to_string()
    }

    fn parse_plain_block(&mut self, parent_indent: isize) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let mut text = self.read_plain_text();
        let mut end = self.position();
        let mut multiline = false;
        loop {
            let mark = self.mark();
            self.skip_inline_spaces();
            if self.peek() == Some('#') || self.peek().is_none() {
                self.reset(mark);
                break;
            }
            let mut breaks = 0;
            while matches!(self.peek(), Some('\n') | Some('\r')) {
                self.skip_newline();
                breaks += 1;
                self.skip_inline_spaces();
            }
            let continues = self.peek().is_some()
                && (self.col as isize) > parent_indent
                && self.peek() != Some('#')
                && !self.is_sequence_entry()
                && !self.line_is_mapping_entry()
                && !self.starts_with_marker("---")
                && !self.starts_with_marker("...");
            if !continues {
                self.reset(mark);
                break;
            }
            if breaks > 1 {
                text.push_str(&"\n".repeat(breaks - 1));
            } else {
                text.push(' ');
            }
            text.push_str(&self.read_plain_text());
            end = self.position();
            multiline = true;
        }
        let kind = if multiline {
            NodeKind::String(text)
        } else {
            plain_kind(&text)
        };
        Ok(self.tree.add(kind, start, end))
    }

    fn parse_quoted(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated quoted scalar")),
                Some(c) if c == quote => {
                    if quote == '\'' && self.peek() == Some('\'') {
                        self.bump();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some('\\') if quote == '"' => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("unterminated escape sequence"))?;
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        '"' | '\\' | '/' | ' ' => value.push(escaped),
                        '\n' => self.skip_inline_spaces(),
                        'u' => {
                            let mut code = String::new();
                            for _ in 0..4 {
                                if let Some(c) = self.bump() {
                                    code.push(c);
                                }
                            }
                            let c = u32::from_str_radix(&code, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| self.error("invalid unicode escape"))?;
                            value.push(c);
                        }
                        other => {
                            return Err(self.error(format!("unknown escape sequence '\\{}'", other)))
                        }
                    }
                }
                Some('\r') => {}
                Some('\n') => {
                    while value.ends_with(' ') || value.ends_with('\t') {
                        value.pop();
                    }
                    value.push(' ');
                    self.skip_inline_spaces();
                }
                Some(c) => value.push(c),
            }
        }
        let end = self.position();
        Ok(self.tree.add(NodeKind::String(value), start, end))
    }

    fn parse_block_scalar(&mut self, parent_indent: isize) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let folded = self.bump() == Some('>');
        let mut chomp = Chomp::Clip;
        let mut explicit_indent = None;
        while let Some(c) = self.peek() {
            match c {
                '-' => chomp = Chomp::Strip,
                '+' => chomp = Chomp::Keep,
                '1'..='9' => explicit_indent = c.to_digit(10).map(|d| d as usize),
                _ => break,
            }
            self.bump();
        }
        self.skip_inline_spaces();
        if self.peek() == Some('#') {
            self.skip_comment();
        }
        if !self.at_eol() {
            return Err(self.error("invalid block scalar header"));
        }

        let base = parent_indent.max(0) as usize;
        let mut content_indent = explicit_indent.map(|d| base + d);
        let mut lines: Vec<String> = Vec::new();
        let mut end = self.position();
        loop {
            let mark = self.mark();
            if self.peek().is_none() {
                break;
            }
            self.skip_newline();
            while self.peek() == Some(' ') && content_indent.map_or(true, |ci| self.col < ci) {
                self.bump();
            }
            if self.at_eol() {
                if self.peek().is_none() {
                    break;
                }
                lines.push(String::new());
                continue;
            }
            let indent = self.col;
            let indent_ok = match content_indent {
                Some(ci) => indent >= ci,
                None => (indent as isize) > parent_indent && self.peek() != Some('\t'),
            };
            if !indent_ok {
                self.reset(mark);
                break;
            }
            content_indent.get_or_insert(indent);
            let text = self.rest_of_line();
            for _ in text.chars() {
                self.bump();
            }
            lines.push(text.to_string());
            end = self.position();
        }

        let trailing = lines.iter().rev().take_while(|l| l.is_empty()).count();
        let content = &lines[..lines.len() - trailing];
        let mut value = if folded {
            fold_lines(content)
        } else {
            content.join("\n")
        };
        if !content.is_empty() {
            match chomp {
                Chomp::Strip => {}
                Chomp::Clip => value.push('\n'),
                Chomp::Keep => value.push_str(&"\n".repeat(trailing + 1)),
            }
        }
        Ok(self.tree.add(NodeKind::String(value), start, end))
    }

    // ========================================================================
    // FLOW COLLECTIONS
    // ========================================================================

    fn skip_flow_blank(&mut self) {
        self.skip_blank();
    }

    fn parse_flow_node(&mut self) -> Result<NodeId, SyntaxError> {
        self.skip_flow_blank();
        match self.peek() {
            Some('[') => self.parse_flow_sequence(),
            Some('{') => self.parse_flow_mapping(),
            Some('"') | Some('\'') => self.parse_quoted(),
            Some('!') => self.parse_tagged(-1, true),
            None => Err(self.error("unterminated flow collection")),
            _ => self.parse_plain_flow(),
        }
    }

    fn parse_plain_flow(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        let mut text = String::new();
        let mut previous = ' ';
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '[' | ']' | '{' | '}' | '\n' | '\r') {
                break;
            }
            if c == ':'
                && matches!(
                    self.peek_second(),
                    None | Some(' ') | Some(',') | Some(']') | Some('}') | Some('\n') | Some('\r')
                )
            {
                break;
            }
            if c == '#' && (previous == ' ' || previous == '\t') {
                break;
            }
            text.push(c);
            previous = c;
            self.bump();
        }
        let trimmed = text.trim_end();
        let end = Position::new(
            start.line,
            start.column + trimmed.chars().count(),
            start.index + trimmed.len(),
        );
        Ok(self.tree.add(plain_kind(trimmed), start, end))
    }

    fn parse_flow_sequence(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        self.bump();
        let sequence = self.tree.add(NodeKind::Array, start, start);
        loop {
            self.skip_flow_blank();
            match self.peek() {
                None => return Err(self.error("unterminated flow sequence")),
                Some(']') => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            let mut item = self.parse_flow_node()?;
            self.skip_flow_blank();
            if self.peek() == Some(':') {
                self.bump();
                self.skip_flow_blank();
                let value = match self.peek() {
                    Some(',') | Some(']') => {
                        let here = self.position();
                        self.tree.add(NodeKind::Null, here, here)
                    }
                    _ => self.parse_flow_node()?,
                };
                let pair = self.tree.add_pair(item, value);
                let (pair_start, pair_end) = (self.tree.start(pair), self.tree.end(pair));
                let object = self.tree.add(NodeKind::Object, pair_start, pair_end);
                self.tree.push_child(object, pair);
                item = object;
                self.skip_flow_blank();
            }
            self.tree.push_child(sequence, item);
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.error("expected ',' or ']' in flow sequence")),
            }
        }
        self.tree.node_mut(sequence).end = self.position();
        Ok(sequence)
    }

    fn parse_flow_mapping(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.position();
        self.bump();
        let map = self.tree.add(NodeKind::Object, start, start);
        loop {
            self.skip_flow_blank();
            match self.peek() {
                None => return Err(self.error("unterminated flow mapping")),
                Some('}') => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            let key = self.parse_flow_node()?;
            self.skip_flow_blank();
            let value = if self.peek() == Some(':') {
                self.bump();
                self.skip_flow_blank();
                match self.peek() {
                    Some(',') | Some('}') => {
                        let here = self.position();
                        self.tree.add(NodeKind::Null, here, here)
                    }
                    _ => self.parse_flow_node()?,
                }
            } else {
                let here = self.tree.end(key);
                self.tree.add(NodeKind::Null, here, here)
            };
            let pair = self.tree.add_pair(key, value);
            self.tree.push_child(map, pair);
            self.skip_flow_blank();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.error("expected ',' or '}' in flow mapping")),
            }
        }
        self.tree.node_mut(map).end = self.position();
        Ok(map)
    }
}

/// Resolves the type of an unquoted scalar.
pub(crate) fn plain_kind(text: &str) -> NodeKind {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return NodeKind::Null,
        "true" | "True" | "TRUE" => return NodeKind::Boolean(true),
        "false" | "False" | "FALSE" => return NodeKind::Boolean(false),
        _ => {}
    }
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return match text.parse::<i64>() {
            Ok(value) => NodeKind::Integer(value),
            Err(_) => text
                .parse::<f64>()
                .map(NodeKind::Float)
                .unwrap_or_else(|_| NodeKind::String(text.to_string())),
        };
    }
    let numeric_chars = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'-' | b'+'));
    if numeric_chars && unsigned.bytes().next().map_or(false, |b| b.is_ascii_digit() || b == b'.') {
        if let Ok(value) = text.parse::<f64>() {
            return NodeKind::Float(value);
        }
    }
    NodeKind::String(text.to_string())
}

fn fold_lines(lines: &[String]) -> String {
    let mut result = String::new();
    let mut previous_blank = true;
    for line in lines {
        if line.is_empty() {
            result.push('\n');
            previous_blank = true;
        } else if line.starts_with(' ') {
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
            result.push_str(line);
            result.push('\n');
            previous_blank = true;
        } else {
            if !previous_blank {
                result.push(' ');
            }
            result.push_str(line);
            previous_blank = false;
        }
    }
    if result.ends_with('\n') && lines.last().map_or(false, |l| l.starts_with(' ')) {
        result.pop();
    }
    result
}
