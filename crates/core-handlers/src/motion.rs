//! Motion target computation.
//!
//! Pure functions from (text, offset) or (engine, point) to a new offset.
//! The cursor handler maps these over every selection; nothing here touches
//! cursors or produces results. All offsets in and out are rune boundaries.

use core_text::rune::{
    is_big_word_rune, is_word_rune, next_rune_end, prev_rune_start, rune_at, rune_before,
};
use core_text::{ByteOffset, Engine};

/// One rune left, never below 0. Count-repeated.
pub fn left(text: &str, mut offset: ByteOffset, count: u32) -> ByteOffset {
    for _ in 0..count {
        if offset == 0 {
            break;
        }
        offset = prev_rune_start(text, offset);
    }
    offset
}

/// One rune right, clamped to the buffer length. Count-repeated.
pub fn right(text: &str, mut offset: ByteOffset, count: u32) -> ByteOffset {
    for _ in 0..count {
        if offset >= text.len() {
            break;
        }
        offset = next_rune_end(text, offset);
    }
    offset
}

/// Vertical move preserving the column, clamped to the target line's length.
pub fn vertical(engine: &(dyn Engine + Send + Sync), offset: ByteOffset, delta: i64) -> ByteOffset {
    let point = engine.offset_to_point(offset);
    let last = engine.line_count().saturating_sub(1);
    let target = if delta < 0 {
        point.line.saturating_sub((-delta) as u32)
    } else {
        point.line.saturating_add(delta as u32).min(last)
    };
    let column = (point.column as usize).min(engine.line_len(target)) as u32;
    engine.point_to_offset(core_text::Point::new(target, column))
}

/// Word class of a rune under the small/big word rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuneClass {
    Word,
    Punct,
    Blank,
}

fn classify(c: char, big: bool) -> RuneClass {
    if c.is_whitespace() {
        RuneClass::Blank
    } else if big || is_word_rune(c) {
        // Big-word motions treat every non-blank rune as one class.
        RuneClass::Word
    } else {
        RuneClass::Punct
    }
}

/// Start of the next word (`w` / `W`). Skips the current token, then any
/// whitespace; terminates at buffer end.
pub fn word_forward(text: &str, mut offset: ByteOffset, big: bool, count: u32) -> ByteOffset {
    for _ in 0..count {
        if offset >= text.len() {
            break;
        }
        if let Some(c) = rune_at(text, offset) {
            let class = classify(c, big);
            if class != RuneClass::Blank {
                while let Some(c) = rune_at(text, offset)
                    && classify(c, big) == class
                {
                    offset = next_rune_end(text, offset);
                }
            }
        }
        while let Some(c) = rune_at(text, offset)
            && c.is_whitespace()
        {
            offset = next_rune_end(text, offset);
        }
    }
    offset
}

/// Start of the previous word (`b` / `B`).
pub fn word_backward(text: &str, mut offset: ByteOffset, big: bool, count: u32) -> ByteOffset {
    let word_class = |c: char| {
        if big {
            is_big_word_rune(c)
        } else {
            is_word_rune(c)
        }
    };
    for _ in 0..count {
        if offset == 0 {
            break;
        }
        offset = prev_rune_start(text, offset);
        while offset > 0
            && let Some(c) = rune_at(text, offset)
            && c.is_whitespace()
        {
            offset = prev_rune_start(text, offset);
        }
        while let Some(c) = rune_before(text, offset)
            && word_class(c)
        {
            offset = prev_rune_start(text, offset);
        }
    }
    offset
}

/// End of the next word (`e` / `E`): the offset of its last word rune.
pub fn word_end_forward(text: &str, mut offset: ByteOffset, big: bool, count: u32) -> ByteOffset {
    let word_class = |c: char| {
        if big {
            is_big_word_rune(c)
        } else {
            is_word_rune(c)
        }
    };
    for _ in 0..count {
        if offset >= text.len() {
            break;
        }
        offset = next_rune_end(text, offset);
        while let Some(c) = rune_at(text, offset)
            && c.is_whitespace()
        {
            offset = next_rune_end(text, offset);
        }
        let mut last = offset;
        while let Some(c) = rune_at(text, offset)
            && word_class(c)
        {
            last = offset;
            offset = next_rune_end(text, offset);
        }
        offset = last;
    }
    offset
}

/// First non-whitespace rune of the current line (line start when blank).
pub fn first_non_blank(engine: &(dyn Engine + Send + Sync), offset: ByteOffset) -> ByteOffset {
    let line = engine.offset_to_point(offset).line;
    let start = engine.line_start_offset(line);
    let content = engine.line_text(line);
    let mut o = 0;
    while let Some(c) = rune_at(&content, o) {
        if !c.is_whitespace() {
            break;
        }
        o = next_rune_end(&content, o);
    }
    start + o.min(content.len())
}

const BRACKETS: [(char, char); 4] = [('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')];

fn bracket_partner(c: char) -> Option<(char, bool)> {
    for (open, close) in BRACKETS {
        if c == open {
            return Some((close, true));
        }
        if c == close {
            return Some((open, false));
        }
    }
    None
}

/// Vim `%`: find the first bracket from `offset` to the end of its line,
/// then scan for its partner with a depth counter.
pub fn matching_bracket(
    engine: &(dyn Engine + Send + Sync),
    text: &str,
    offset: ByteOffset,
) -> Option<ByteOffset> {
    let line = engine.offset_to_point(offset).line;
    let line_end = engine.line_end_offset(line);

    // Locate the bracket to pair from.
    let mut at = offset;
    let (bracket, partner, forward) = loop {
        if at >= line_end {
            return None;
        }
        let c = rune_at(text, at)?;
        if let Some((partner, forward)) = bracket_partner(c) {
            break (c, partner, forward);
        }
        at = next_rune_end(text, at);
    };

    let mut depth = 0i32;
    if forward {
        let mut o = at;
        while o < text.len() {
            let c = rune_at(text, o)?;
            if c == bracket {
                depth += 1;
            } else if c == partner {
                depth -= 1;
                if depth == 0 {
                    return Some(o);
                }
            }
            o = next_rune_end(text, o);
        }
    } else {
        let mut o = at;
        loop {
            let c = rune_at(text, o)?;
            if c == bracket {
                depth += 1;
            } else if c == partner {
                depth -= 1;
                if depth == 0 {
                    return Some(o);
                }
            }
            if o == 0 {
                break;
            }
            o = prev_rune_start(text, o);
        }
    }
    None
}

/// A line is empty iff it contains only whitespace.
fn line_blank(engine: &(dyn Engine + Send + Sync), line: u32) -> bool {
    engine.line_text(line).trim().is_empty()
}

/// Start line of the next paragraph: advance while non-empty, then while
/// empty. Stops at the last line.
pub fn paragraph_forward(engine: &(dyn Engine + Send + Sync), start_line: u32, count: u32) -> u32 {
    let last = engine.line_count().saturating_sub(1);
    let mut line = start_line.min(last);
    for _ in 0..count {
        while line < last && !line_blank(engine, line) {
            line += 1;
        }
        while line < last && line_blank(engine, line) {
            line += 1;
        }
    }
    line
}

/// Dual of [`paragraph_forward`], walking toward line 0.
pub fn paragraph_backward(engine: &(dyn Engine + Send + Sync), start_line: u32, count: u32) -> u32 {
    let last = engine.line_count().saturating_sub(1);
    let mut line = start_line.min(last);
    for _ in 0..count {
        while line > 0 && !line_blank(engine, line) {
            line -= 1;
        }
        while line > 0 && line_blank(engine, line) {
            line -= 1;
        }
    }
    line
}

/// Offsets where sentences begin: the first non-blank rune, every position
/// after a terminator run (`.`, `!`, `?`) plus whitespace, and the first
/// content after a blank line.
fn sentence_starts(text: &str) -> Vec<ByteOffset> {
    let mut starts = Vec::new();
    let mut i = 0;
    while let Some(c) = rune_at(text, i) {
        if !c.is_whitespace() {
            break;
        }
        i = next_rune_end(text, i);
    }
    if i >= text.len() {
        return starts;
    }
    starts.push(i);

    while i < text.len() {
        let Some(c) = rune_at(text, i) else { break };
        if matches!(c, '.' | '!' | '?') {
            let mut j = next_rune_end(text, i);
            while matches!(rune_at(text, j), Some('.' | '!' | '?')) {
                j = next_rune_end(text, j);
            }
            let mut k = j;
            while let Some(w) = rune_at(text, k)
                && w.is_whitespace()
            {
                k = next_rune_end(text, k);
            }
            // Terminator counts only when whitespace follows it (so "3.14"
            // stays one sentence).
            if k > j && k < text.len() {
                starts.push(k);
            }
            i = k.max(j);
            continue;
        }
        if c == '\n' {
            let mut j = next_rune_end(text, i);
            let mut newlines = 1u32;
            while let Some(w) = rune_at(text, j)
                && w.is_whitespace()
            {
                if w == '\n' {
                    newlines += 1;
                }
                j = next_rune_end(text, j);
            }
            if newlines >= 2 && j < text.len() {
                starts.push(j);
            }
            i = j;
            continue;
        }
        i = next_rune_end(text, i);
    }
    starts.dedup();
    starts
}

/// Start of the `count`-th next sentence, or the buffer end.
pub fn sentence_forward(text: &str, offset: ByteOffset, count: u32) -> ByteOffset {
    let starts = sentence_starts(text);
    let mut current = offset;
    for _ in 0..count {
        match starts.iter().find(|&&s| s > current) {
            Some(&s) => current = s,
            None => return text.len(),
        }
    }
    current
}

/// Start of the `count`-th previous sentence, floored at the first.
pub fn sentence_backward(text: &str, offset: ByteOffset, count: u32) -> ByteOffset {
    let starts = sentence_starts(text);
    let mut current = offset;
    for _ in 0..count {
        match starts.iter().rev().find(|&&s| s < current) {
            Some(&s) => current = s,
            None => return starts.first().copied().unwrap_or(0),
        }
    }
    current
}
