//! Line tokenizer: turns `.fpn` text into keyword records with line numbers.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Upper-cased leading keyword
    pub keyword: String,
    /// Remaining comma-separated fields, trimmed, continuation lines appended
    pub fields: Vec<String>,
    /// 1-based line of the keyword
    pub line: usize,
}

impl Record {
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

/// Streams records out of a source string while tracking consumed bytes.
pub struct RecordReader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    consumed: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            lines: raw.split_inclusive('\n').collect(),
            pos: 0,
            consumed: 0,
        }
    }

    /// Bytes of input consumed so far, including comments and continuations.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn next_record(&mut self) -> Result<Option<Record>, ParseError> {
        while self.pos < self.lines.len() {
            let raw = self.take_line();
            let trimmed = raw.trim();

            if trimmed.is_empty() || is_comment(trimmed) {
                continue;
            }

            let line = self.pos;
            if trimmed.starts_with(',') {
                return Err(ParseError::new(
                    line,
                    "continuation line without a preceding record",
                ));
            }

            let mut fields = split_fields(trimmed);
            let keyword = fields.remove(0).to_ascii_uppercase();
            if !is_keyword(&keyword) {
                return Err(ParseError::new(
                    line,
                    format!("malformed record keyword '{keyword}'"),
                ));
            }

            // Continuation lines start with a leading comma.
            while let Some(next) = self.lines.get(self.pos).copied() {
                let Some(rest) = next.trim().strip_prefix(',') else {
                    break;
                };
                fields.extend(split_fields(rest));
                self.take_line();
            }

            return Ok(Some(Record {
                keyword,
                fields,
                line,
            }));
        }
        Ok(None)
    }

    fn take_line(&mut self) -> &'a str {
        let raw = self.lines[self.pos];
        self.pos += 1;
        self.consumed += raw.len();
        raw
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('$')
}

fn is_keyword(keyword: &str) -> bool {
    !keyword.is_empty()
        && keyword
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && keyword.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Split on commas, trim every field and drop trailing empty fields.
fn split_fields(text: &str) -> Vec<String> {
    let mut fields: Vec<String> = text.split(',').map(|f| f.trim().to_string()).collect();
    while fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}
