//! Recursive depth-first backtracking walker over a compiled node program,
//! grounded on `regexp.c`'s `match()`. That original is a single `goto`-
//! threaded function recursing only at genuine choice points (`forkMatch`);
//! this keeps the same structure as a `loop` that advances `pc`/`pos` in
//! place and calls [`run`] recursively only where the source does.

use super::{ClassItem, Op, RegexMatch};

/// Per-search scratch, reset once per [`search`] call (not per starting
/// position — matching `matchWithState`'s split/reference "already visited
/// here" markers, which persist across the whole scan for infinite-loop
/// detection, while captures reset each starting position).
struct Scratch {
    depths: Vec<u8>,
    split_marks: Vec<Option<usize>>,
    ref_marks: Vec<Option<usize>>,
}

struct Attempt {
    start: usize,
    end: usize,
    captures: Vec<Option<usize>>,
    tombstones: Vec<usize>,
    infinite_loop: bool,
    ignore_case: bool,
    multiline: bool,
}

pub(super) fn search(
    nodes: &[Op],
    capture_count: u16,
    chars: &[char],
    start_index: usize,
    ignore_case: bool,
    multiline: bool,
) -> Option<RegexMatch> {
    let len = chars.len();
    let mut scratch = Scratch {
        depths: vec![0; nodes.len()],
        split_marks: vec![None; nodes.len()],
        ref_marks: vec![None; nodes.len()],
    };

    let origin = start_index.min(len);
    let mut pos = origin;
    loop {
        let slots = 2 * (capture_count as usize + 1);
        let mut attempt = Attempt {
            start: origin,
            end: len,
            captures: vec![None; slots],
            tombstones: vec![0; slots],
            infinite_loop: false,
            ignore_case,
            multiline,
        };
        attempt.captures[0] = Some(pos);

        if run(nodes, 0, chars, pos, &mut attempt, &mut scratch) {
            let end = attempt.captures[1].unwrap_or(pos);
            let groups = (1..=capture_count as usize)
                .map(|i| match (attempt.captures[i * 2], attempt.captures[i * 2 + 1]) {
                    (Some(s), Some(e)) => Some((s, e)),
                    _ => None,
                })
                .collect();
            return Some(RegexMatch { start: pos, end, groups });
        }

        if pos >= len {
            return None;
        }
        pos += 1;
    }
}

fn char_eq(a: char, b: char, ignore_case: bool) -> bool {
    if ignore_case { a.to_lowercase().eq(b.to_lowercase()) } else { a == b }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn class_matches(item: &ClassItem, c: char, ignore_case: bool) -> bool {
    match *item {
        ClassItem::Char(ch) => char_eq(ch, c, ignore_case),
        ClassItem::Range(lo, hi) => {
            if ignore_case {
                let c_lower = c.to_ascii_lowercase();
                let c_upper = c.to_ascii_uppercase();
                (lo..=hi).contains(&c_lower) || (lo..=hi).contains(&c_upper) || (lo..=hi).contains(&c)
            } else {
                (lo..=hi).contains(&c)
            }
        }
        ClassItem::Digit(want) => c.is_ascii_digit() == want,
        ClassItem::Space(want) => c.is_whitespace() == want,
        ClassItem::Word(want) => is_word_char(c) == want,
    }
}

fn clear_captures(attempt: &mut Attempt, pos: usize, clears: &[u16]) {
    for &slot in clears {
        if slot % 2 == 1 {
            attempt.tombstones[slot as usize] = 0;
        } else {
            attempt.tombstones[slot as usize] = pos;
        }
    }
}

/// Runs the program starting at `pc`/`pos`, advancing in place and
/// recursing only at a real backtracking choice point. Returns whether a
/// `Match` op was reached along some path.
fn run(nodes: &[Op], mut pc: usize, chars: &[char], mut pos: usize, attempt: &mut Attempt, scratch: &mut Scratch) -> bool {
    loop {
        match &nodes[pc] {
            Op::Start => {
                let at_start = pos == attempt.start || (attempt.multiline && pos > 0 && chars[pos - 1] == '\n');
                if !at_start {
                    return false;
                }
                pc += 1;
            }
            Op::End => {
                let at_end = pos == attempt.end || (attempt.multiline && pos < chars.len() && chars[pos] == '\n');
                if !at_end {
                    return false;
                }
                pc += 1;
            }
            Op::Boundary(expect) => {
                let before = pos > 0 && is_word_char(chars[pos - 1]);
                let after = pos < chars.len() && is_word_char(chars[pos]);
                if (before != after) != *expect {
                    return false;
                }
                pc += 1;
            }
            Op::Any => {
                if pos >= chars.len() || chars[pos] == '\n' {
                    return false;
                }
                pos += 1;
                pc += 1;
            }
            Op::Digit(want) => {
                if pos >= chars.len() || chars[pos].is_ascii_digit() != *want {
                    return false;
                }
                pos += 1;
                pc += 1;
            }
            Op::Space(want) => {
                if pos >= chars.len() || chars[pos].is_whitespace() != *want {
                    return false;
                }
                pos += 1;
                pc += 1;
            }
            Op::Word(want) => {
                if pos >= chars.len() || is_word_char(chars[pos]) != *want {
                    return false;
                }
                pos += 1;
                pc += 1;
            }
            Op::Bytes(literal) => {
                let run: Vec<char> = literal.chars().collect();
                if pos + run.len() > chars.len() {
                    return false;
                }
                if !run.iter().enumerate().all(|(i, &lc)| char_eq(lc, chars[pos + i], attempt.ignore_case)) {
                    return false;
                }
                pos += run.len();
                pc += 1;
            }
            Op::OneOf(items) => {
                if pos >= chars.len() || !items.iter().any(|it| class_matches(it, chars[pos], attempt.ignore_case)) {
                    return false;
                }
                pos += 1;
                pc += 1;
            }
            Op::NeitherOf(items) => {
                if pos >= chars.len() || items.iter().any(|it| class_matches(it, chars[pos], attempt.ignore_case)) {
                    return false;
                }
                pos += 1;
                pc += 1;
            }
            Op::Reference(group) => {
                if scratch.ref_marks[pc] == Some(pos) {
                    attempt.infinite_loop = true;
                    return false;
                }
                scratch.ref_marks[pc] = Some(pos);

                let slot = *group as usize * 2;
                let span = match (attempt.captures.get(slot).copied().flatten(), attempt.captures.get(slot + 1).copied().flatten()) {
                    (Some(s), Some(e)) if e > s => Some((s, e)),
                    _ => None,
                };
                if let Some((s, e)) = span {
                    let len = e - s;
                    if pos + len > chars.len() {
                        return false;
                    }
                    if !(0..len).all(|i| char_eq(chars[s + i], chars[pos + i], attempt.ignore_case)) {
                        return false;
                    }
                    pos += len;
                }
                pc += 1;
            }
            Op::Save(idx) => {
                let slot = *idx as usize;
                let prev = attempt.captures[slot];
                attempt.captures[slot] = Some(pos);
                if run(nodes, pc + 1, chars, pos, attempt, scratch) {
                    if let Some(cur) = attempt.captures[slot] {
                        if cur < pos && pos > attempt.tombstones[slot] {
                            attempt.captures[slot] = Some(pos);
                        }
                    }
                    return true;
                }
                attempt.captures[slot] = prev;
                return false;
            }
            Op::Split(offset) => {
                if scratch.split_marks[pc] == Some(pos) {
                    attempt.infinite_loop = true;
                    return false;
                }
                scratch.split_marks[pc] = Some(pos);
                if run(nodes, pc + 1, chars, pos, attempt, scratch) {
                    return true;
                }
                pc = (pc as i32 + offset) as usize;
            }
            Op::Jump(offset) => {
                pc = (pc as i32 + offset) as usize;
            }
            Op::Lookahead(offset) => {
                if scratch.depths[pc] == 0xff {
                    return false;
                }
                scratch.depths[pc] += 1;
                let matched = run(nodes, pc + 1, chars, pos, attempt, scratch);
                scratch.depths[pc] -= 1;
                if !matched {
                    return false;
                }
                pc = (pc as i32 + offset) as usize;
            }
            Op::NLookahead(offset) => {
                if scratch.depths[pc] == 0xff {
                    return false;
                }
                scratch.depths[pc] += 1;
                let matched = run(nodes, pc + 1, chars, pos, attempt, scratch);
                scratch.depths[pc] -= 1;
                if matched {
                    return false;
                }
                pc = (pc as i32 + offset) as usize;
            }
            Op::Redo { min, max, offset, clears } => {
                if *max != 0 && scratch.depths[pc] as u32 >= *max {
                    return false;
                }
                attempt.infinite_loop = false;
                scratch.depths[pc] += 1;
                let target = (pc as i32 + offset) as usize;
                let matched = run(nodes, target, chars, pos, attempt, scratch);
                scratch.depths[pc] -= 1;
                if matched {
                    clear_captures(attempt, pos, clears);
                    return true;
                }
                if (scratch.depths[pc] as u32 + 1) < *min {
                    return false;
                }
                if attempt.infinite_loop {
                    clear_captures(attempt, pos, clears);
                }
                pc += 1;
            }
            Op::Match => {
                attempt.captures[1] = Some(pos);
                return true;
            }
        }
    }
}
