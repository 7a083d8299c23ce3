//! Line-oriented workflow document.
//!
//! A [`Document`] is an exclusively-owned copy of a workflow's content split on
//! `\n`. Every remediation attempt works on its own copy; on failure the copy
//! is simply dropped, so partial edits never reach the caller.
//!
//! Lines can be replaced or inserted but never removed: one remediation pass
//! only grows a document.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl Document {
    /// Split `content` into lines, remembering whether it ended with `\n`.
    ///
    /// Carriage returns are kept as part of the line they end.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let trailing_newline = content.ends_with('\n');
        let body = if trailing_newline {
            &content[..content.len() - 1]
        } else {
            content
        };
        Self {
            lines: body.split('\n').map(str::to_string).collect(),
            trailing_newline,
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }

    #[must_use]
    pub const fn has_trailing_newline(&self) -> bool {
        self.trailing_newline
    }

    /// Replace the line at `index`. Out-of-range indices are ignored.
    pub(crate) fn replace_line(&mut self, index: usize, line: String) {
        if let Some(slot) = self.lines.get_mut(index) {
            *slot = line;
        }
    }

    /// Insert `new_lines` before the line at `index` (or append when `index`
    /// equals the line count). Returns how many lines were inserted.
    pub(crate) fn insert_lines<I>(&mut self, index: usize, new_lines: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let index = index.min(self.lines.len());
        let before = self.lines.len();
        self.lines.splice(index..index, new_lines);
        self.lines.len() - before
    }

    /// Join the lines back into content, restoring the trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
