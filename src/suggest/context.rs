//! Lexical context of the cursor: what kind of thing is being typed and the
//! part of it typed so far.

/// What the text just before the cursor is completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// After `key:`.
    Value,
    /// After one of `,[{-`.
    Item,
    /// After `lib.`.
    LibraryCall,
    /// Inside `<<`.
    StringTemplate,
    /// Inside `<<name |`.
    FunctionCall,
    /// A line of its own; completed by indentation.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionContext {
    pub kind: ContextKind,
    /// The in-progress text suggestions must start with.
    pub prefix: String,
    /// Byte offset of the character that decided the context.
    pub location: usize,
}

/// Scans backwards from `cursor` (a byte offset between characters) to the
/// first significant character.
pub fn scan(document: &str, cursor: usize) -> CompletionContext {
    let cursor = floor_boundary(document, cursor);
    let bytes = document.as_bytes();
    let typed = |from: usize| document[from..cursor].trim().to_string();

    let mut index = cursor;
    while index > 0 {
        index -= 1;
        let (kind, location) = match bytes[index] {
            b':' => (ContextKind::Value, index + 1),
            b',' | b'[' | b'{' | b'-' => (ContextKind::Item, index),
            b'\n' => (ContextKind::Any, index),
            b'.' => {
                let word = word_start(bytes, index);
                return CompletionContext {
                    kind: ContextKind::LibraryCall,
                    prefix: typed(word),
                    location: index,
                };
            }
            b'<' if index > 0 && bytes[index - 1] == b'<' => {
                let content = &document[index + 1..cursor];
                let (kind, prefix) = match content.rsplit_once('|') {
                    Some((_, function)) => (ContextKind::FunctionCall, function.trim()),
                    None => (ContextKind::StringTemplate, content.trim()),
                };
                return CompletionContext {
                    kind,
                    prefix: prefix.to_string(),
                    location: index - 1,
                };
            }
            _ => continue,
        };
        return CompletionContext {
            kind,
            prefix: typed(index + 1),
            location,
        };
    }
    CompletionContext {
        kind: ContextKind::Any,
        prefix: typed(0),
        location: 0,
    }
}

/// Number of whitespace characters opening the line the cursor is on.
pub fn indentation(document: &str, cursor: usize) -> usize {
    let cursor = floor_boundary(document, cursor);
    let line_start = document[..cursor].rfind('\n').map_or(0, |i| i + 1);
    document[line_start..cursor]
        .chars()
        .take_while(|c| c.is_whitespace())
        .count()
}

/// The document cut right after the context character, with the rest of
/// the cursor's line dropped and any flow collection left open closed.
pub fn truncated(document: &str, context: &CompletionContext, cursor: usize) -> String {
    let cursor = floor_boundary(document, cursor);
    let header_end = floor_boundary(document, (context.location + 1).min(cursor));
    let header = &document[..header_end];
    let footer = document[cursor..]
        .find(['\n', '}', ']', ','])
        .map_or("", |i| &document[cursor + i..]);
    format!("{}{}{}", header, closers(header, footer), footer)
}

/// Brackets needed to close the flow collections `header` leaves open and
/// `footer` does not close.
fn closers(header: &str, footer: &str) -> String {
    let mut open = Vec::new();
    let mut quote = None;
    for c in header.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => open.push(']'),
            (None, '{') => open.push('}'),
            (None, ']') | (None, '}') => {
                open.pop();
            }
            _ => {}
        }
    }
    let closed_later = footer.chars().filter(|c| matches!(c, ']' | '}')).count();
    let missing = open.len().saturating_sub(closed_later);
    open.iter().rev().take(missing).collect()
}

fn word_start(bytes: &[u8], dot: usize) -> usize {
    let mut start = dot;
    while start > 0 && !matches!(bytes[start - 1], b' ' | b'\t' | b'\n' | b':' | b'[' | b'{' | b',') {
        start -= 1;
    }
    start
}

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_end(text: &str) -> CompletionContext {
        scan(text, text.len())
    }

    #[test]
    fn significant_characters_pick_the_context() {
        assert_eq!(at_end("title: My").kind, ContextKind::Value);
        assert_eq!(at_end("title: My").prefix, "My");
        assert_eq!(at_end("protocols: [HT").kind, ContextKind::Item);
        assert_eq!(at_end("protocols: [HT").prefix, "HT");
        assert_eq!(at_end("a: 1\n  desc").kind, ContextKind::Any);
        assert_eq!(at_end("a: 1\n  desc").prefix, "desc");
        assert_eq!(at_end("dis").kind, ContextKind::Any);
        assert_eq!(at_end("dis").location, 0);
    }

    #[test]
    fn library_calls_keep_their_qualifier() {
        let context = at_end("  type: lib.Us");
        assert_eq!(context.kind, ContextKind::LibraryCall);
        assert_eq!(context.prefix, "lib.Us");
    }

    #[test]
    fn templates_and_functions() {
        let template = at_end("description: <<resource");
        assert_eq!(template.kind, ContextKind::StringTemplate);
        assert_eq!(template.prefix, "resource");
        assert_eq!(template.location, 13);

        let function = at_end("description: <<resourcePathName | !up");
        assert_eq!(function.kind, ContextKind::FunctionCall);
        assert_eq!(function.prefix, "!up");
        assert_eq!(at_end("x: <<name |").prefix, "");
    }

    #[test]
    fn truncation_closes_open_flows() {
        let text = "title: T\nprotocols: [HT";
        let context = at_end(text);
        assert_eq!(truncated(text, &context, text.len()), "title: T\nprotocols: []");

        let text = "a:\n  de\nb: 1\n";
        let context = scan(text, 7);
        assert_eq!(truncated(text, &context, 7), "a:\n\nb: 1\n");
    }

    #[test]
    fn indentation_counts_leading_whitespace() {
        assert_eq!(indentation("a:\n    d", 8), 4);
        assert_eq!(indentation("abc", 3), 0);
    }
}
