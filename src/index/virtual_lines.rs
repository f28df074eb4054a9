//! Merge short consecutive lines into phrase-length virtual lines.

use crate::constants::{VIRTUAL_LINE_MAX_CHARS, VIRTUAL_LINE_MIN_CHARS};
use crate::types::{LineRecord, VirtualLine};

struct Run {
    first: usize,
    last: usize,
    char_len: usize,
}

fn flush(run: &mut Option<Run>, tokens: &[String], lines: &[LineRecord], out: &mut Vec<VirtualLine>) {
    let Some(run) = run.take() else {
        return;
    };
    let start = lines[run.first].start;
    let end = lines[run.last].end;
    out.push(VirtualLine {
        start,
        end,
        lines: run.first..run.last + 1,
        key: tokens[start..end].join(" "),
        char_len: run.char_len,
        is_non_spoken: false,
    });
}

/// Lines without tokens are skipped; non-spoken lines stand alone.
#[must_use]
pub fn build_virtual_lines(tokens: &[String], lines: &[LineRecord]) -> Vec<VirtualLine> {
    let mut out = Vec::new();
    let mut run: Option<Run> = None;

    for (idx, line) in lines.iter().enumerate() {
        if line.token_count() == 0 {
            continue;
        }
        if line.is_non_spoken {
            flush(&mut run, tokens, lines, &mut out);
            out.push(VirtualLine {
                start: line.start,
                end: line.end,
                lines: idx..idx + 1,
                key: line.key.clone(),
                char_len: line.char_len,
                is_non_spoken: true,
            });
            continue;
        }
        if let Some(current) = run.as_ref() {
            if current.char_len + 1 + line.char_len > VIRTUAL_LINE_MAX_CHARS {
                flush(&mut run, tokens, lines, &mut out);
            }
        }
        match run.as_mut() {
            Some(current) => {
                current.last = idx;
                current.char_len += 1 + line.char_len;
            }
            None => {
                run = Some(Run {
                    first: idx,
                    last: idx,
                    char_len: line.char_len,
                });
            }
        }
        if run
            .as_ref()
            .is_some_and(|current| current.char_len >= VIRTUAL_LINE_MIN_CHARS)
        {
            flush(&mut run, tokens, lines, &mut out);
        }
    }
    flush(&mut run, tokens, lines, &mut out);
    out
}
