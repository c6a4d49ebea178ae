//! Line-by-line comparison of engine outputs
//!
//! Two outputs agree when they contain the same lines in the same order.
//! Lines are split on `\n`; a trailing `\r` is dropped and a final line
//! without a newline still counts. When one output runs out of lines before
//! the other, the outputs disagree: truncated output is itself a finding.

use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::Result;

/// Outcome of comparing two outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// Both outputs held exactly `lines` identical lines
    Equal { lines: usize },
    Mismatch(Mismatch),
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, Comparison::Equal { .. })
    }
}

/// The first line pair that differs. `None` marks the side that ended early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 1-based line number
    pub line: usize,
    pub left: Option<Vec<u8>>,
    pub right: Option<Vec<u8>>,
}

impl Mismatch {
    pub fn left_text(&self) -> String {
        render_line(self.left.as_deref())
    }

    pub fn right_text(&self) -> String {
        render_line(self.right.as_deref())
    }

    /// True when one of the outputs ended before the other
    pub fn is_truncation(&self) -> bool {
        self.left.is_none() || self.right.is_none()
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} != {}",
            self.line,
            self.left_text(),
            self.right_text()
        )
    }
}

fn render_line(line: Option<&[u8]>) -> String {
    match line {
        Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        None => "<eof>".to_string(),
    }
}

/// Compare two outputs in lockstep and stop at the first differing line.
pub async fn compare_outputs<L, R>(mut left: L, mut right: R) -> Result<Comparison>
where
    L: AsyncBufRead + Unpin,
    R: AsyncBufRead + Unpin,
{
    let mut left_line = Vec::new();
    let mut right_line = Vec::new();
    let mut line = 0;

    loop {
        let has_left = next_line(&mut left, &mut left_line).await?;
        let has_right = next_line(&mut right, &mut right_line).await?;

        if !has_left && !has_right {
            return Ok(Comparison::Equal { lines: line });
        }
        line += 1;

        if has_left != has_right || left_line != right_line {
            return Ok(Comparison::Mismatch(Mismatch {
                line,
                left: has_left.then(|| std::mem::take(&mut left_line)),
                right: has_right.then(|| std::mem::take(&mut right_line)),
            }));
        }
    }
}

/// Read the next line into `buf` without its terminator. Returns false at EOF.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(true)
}
