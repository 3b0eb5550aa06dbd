//! Walk codec: compact traversal strings that attach node references to a
//! rendered skeleton without per-node ids.
//!
//! A walk string is a sequence of single-character codes interpreted
//! against a cursor into the skeleton tree:
//!
//! * `' '` (0x20) `Get` — record the cursor node as the next reference.
//! * `'%'` `Replace` — record the cursor node as a dynamic marker.
//! * `'/'` `BeginChild` / `'&'` `EndChild` — bracket a nested child
//!   template mount at the cursor.
//! * `'D'..='Z'` `Next(n)` — advance `n` sibling positions (`n` = char −
//!   `'C'`, so 1..=23). Consecutive codes are additive.
//! * `'b'..='j'` `Over(n)` — descend into the cursor element and land on
//!   its `n`-th child (`n` = char − `'a'`, so 1..=9).
//! * `'l'..='z'` `Out(n)` — ascend `n` levels (`n` = char − `'k'`, so
//!   1..=15) and step past the element just exited.
//!
//! Codes below 0x20 and the remaining printable ranges are reserved. The
//! encoder only emits forward movement; references are always attached in
//! document order.

pub const WALK_GET: char = ' ';
pub const WALK_REPLACE: char = '%';
pub const WALK_BEGIN_CHILD: char = '/';
pub const WALK_END_CHILD: char = '&';

const NEXT_BASE: u32 = 'C' as u32;
const NEXT_MAX: u32 = 23;
const OVER_BASE: u32 = 'a' as u32;
const OVER_MAX: u32 = 9;
const OUT_BASE: u32 = 'k' as u32;
const OUT_MAX: u32 = 15;

/// One decoded step, ready for replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkStep {
    Get,
    Replace,
    BeginChild,
    EndChild,
    Next(u32),
    Over(u32),
    Out(u32),
}

/// What kind of reference a visit attaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitKind {
    /// Live element or text node.
    Get,
    /// Placeholder comment replaced by dynamic content.
    Replace,
    /// Nested child template mount point.
    Child,
}

/// A node the walk must stop at: its path from the section root (child
/// indices, outermost first) and how it is referenced.
#[derive(Clone, Debug)]
pub struct Visit {
    pub path: Vec<u32>,
    pub kind: VisitKind,
}

/// Encode visits (already in document order) into a walk string.
pub fn encode(visits: &[Visit]) -> String {
    let mut out = String::new();
    // Cursor starts on the first root child.
    let mut cursor: Vec<u32> = vec![0];
    for visit in visits {
        debug_assert!(!visit.path.is_empty());
        navigate(&mut out, &mut cursor, &visit.path);
        match visit.kind {
            VisitKind::Get => out.push(WALK_GET),
            VisitKind::Replace => out.push(WALK_REPLACE),
            VisitKind::Child => {
                out.push(WALK_BEGIN_CHILD);
                out.push(WALK_END_CHILD);
            }
        }
    }
    out
}

fn navigate(out: &mut String, cursor: &mut Vec<u32>, target: &[u32]) {
    let common = cursor
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    if common == cursor.len() && common == target.len() {
        return;
    }

    if common < cursor.len() {
        // Diverged: ascend to the diverging level, then advance siblings.
        let pops = (cursor.len() - common - 1) as u32;
        if pops > 0 {
            push_out(out, pops);
            cursor.truncate(common + 1);
            *last_mut(cursor) += 1;
        }
        let at = *cursor.last().unwrap_or(&0);
        let want = target[common];
        debug_assert!(want >= at, "walks only move forward");
        push_next(out, want - at);
        *last_mut(cursor) = want;
    }

    // Descend the remaining levels, landing directly on each child index.
    for &index in &target[cursor.len()..] {
        if index + 1 <= OVER_MAX {
            out.push(code(OVER_BASE, index + 1));
        } else {
            out.push(code(OVER_BASE, 1));
            push_next(out, index);
        }
        cursor.push(index);
    }
}

fn push_next(out: &mut String, mut n: u32) {
    while n > NEXT_MAX {
        out.push(code(NEXT_BASE, NEXT_MAX));
        n -= NEXT_MAX;
    }
    if n > 0 {
        out.push(code(NEXT_BASE, n));
    }
}

// Splitting an ascent is safe: the step-past increment an intermediate Out
// applies lands on a level the next Out truncates away.
fn push_out(out: &mut String, mut n: u32) {
    while n > OUT_MAX {
        out.push(code(OUT_BASE, OUT_MAX));
        n -= OUT_MAX;
    }
    if n > 0 {
        out.push(code(OUT_BASE, n));
    }
}

fn last_mut(cursor: &mut [u32]) -> &mut u32 {
    let end = cursor.len() - 1;
    &mut cursor[end]
}

fn code(base: u32, n: u32) -> char {
    char::from_u32(base + n).unwrap_or('?')
}

/// Decode a walk string; unknown characters are skipped.
pub fn decode(walks: &str) -> Vec<WalkStep> {
    let mut steps = Vec::new();
    for ch in walks.chars() {
        let u = ch as u32;
        let step = match ch {
            WALK_GET => WalkStep::Get,
            WALK_REPLACE => WalkStep::Replace,
            WALK_BEGIN_CHILD => WalkStep::BeginChild,
            WALK_END_CHILD => WalkStep::EndChild,
            'D'..='Z' => WalkStep::Next(u - NEXT_BASE),
            'b'..='j' => WalkStep::Over(u - OVER_BASE),
            'l'..='z' => WalkStep::Out(u - OUT_BASE),
            _ => continue,
        };
        steps.push(step);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(path: &[u32], kind: VisitKind) -> Visit {
        Visit {
            path: path.to_vec(),
            kind,
        }
    }

    #[test]
    fn sibling_advance_and_get() {
        // <a/><b/><c ref/>
        let walks = encode(&[visit(&[2], VisitKind::Get)]);
        assert_eq!(walks, "E ");
        assert_eq!(decode(&walks), vec![WalkStep::Next(2), WalkStep::Get]);
    }

    #[test]
    fn descend_then_ascend() {
        // <div><input ref/><span>{marker}</span></div><p ref/>
        let walks = encode(&[
            visit(&[0, 0], VisitKind::Get),
            visit(&[0, 1, 0], VisitKind::Replace),
            visit(&[1], VisitKind::Get),
        ]);
        assert_eq!(
            decode(&walks),
            vec![
                WalkStep::Over(1),
                WalkStep::Get,
                WalkStep::Next(1),
                WalkStep::Over(1),
                WalkStep::Replace,
                WalkStep::Out(2),
                WalkStep::Get,
            ]
        );
    }

    #[test]
    fn child_mount_emits_bracket_pair() {
        let walks = encode(&[visit(&[1], VisitKind::Child)]);
        assert_eq!(walks, "D/&");
    }

    #[test]
    fn wide_sibling_runs_split_greedily() {
        let walks = encode(&[visit(&[30], VisitKind::Get)]);
        let steps = decode(&walks);
        let total: u32 = steps
            .iter()
            .filter_map(|s| match s {
                WalkStep::Next(n) => Some(*n),
                _ => None,
            })
            .sum();
        assert_eq!(total, 30);
        assert_eq!(steps.last(), Some(&WalkStep::Get));
    }

    #[test]
    fn deep_ascents_split_into_multiple_outs() {
        // A reference 18 levels down, then a following top-level sibling.
        let deep: Vec<u32> = vec![0; 18];
        let walks = encode(&[visit(&deep, VisitKind::Get), visit(&[1], VisitKind::Get)]);
        let steps = decode(&walks);

        // Every emitted char decodes; nothing fell outside a code range.
        assert_eq!(steps.len(), walks.chars().count());
        let outs: Vec<u32> = steps
            .iter()
            .filter_map(|s| match s {
                WalkStep::Out(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(outs.iter().sum::<u32>(), 17);
        assert!(outs.iter().all(|&n| n <= 15));
        assert_eq!(steps.last(), Some(&WalkStep::Get));

        // Replaying lands the second reference on the top-level sibling.
        let mut path: Vec<u32> = vec![0];
        let mut gets = Vec::new();
        for step in &steps {
            match step {
                WalkStep::Get => gets.push(path.clone()),
                WalkStep::Next(n) => *path.last_mut().unwrap() += n,
                WalkStep::Over(n) => path.push(n - 1),
                WalkStep::Out(n) => {
                    path.truncate(path.len() - *n as usize);
                    *path.last_mut().unwrap() += 1;
                }
                _ => {}
            }
        }
        assert_eq!(gets, vec![deep.clone(), vec![1]]);
    }

    #[test]
    fn decode_skips_unknown_codes() {
        assert_eq!(decode("?!"), vec![]);
    }
}
