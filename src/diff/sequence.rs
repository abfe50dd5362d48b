//! Shortest edit script between two ordered sequences
//!
//! Myers' greedy forward algorithm: O((N+M)·D) time, where D is the number
//! of non-KEEP operations in the result. The furthest-reaching frontier of
//! each round is recorded (only the `2d+3` diagonals that round can touch)
//! and walked backwards to recover the script.

/// One step of an edit script, by index into the input sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// `old[old]` and `new[new]` are equal under the predicate
    Keep { old: usize, new: usize },
    /// `new[new]` has no counterpart
    Add { new: usize },
    /// `old[old]` has no counterpart
    Delete { old: usize },
}

impl Edit {
    pub fn is_keep(&self) -> bool {
        matches!(self, Edit::Keep { .. })
    }
}

/// Compute a minimal edit script turning `old` into `new`
///
/// `eq` decides whether two elements may be kept as a pair. The script
/// visits both sequences in order; among equally short scripts the one
/// keeping the earliest possible pair is chosen.
pub fn diff_sequences<A, B, F>(old: &[A], new: &[B], mut eq: F) -> Vec<Edit>
where
    F: FnMut(&A, &B) -> bool,
{
    let n = old.len() as isize;
    let m = new.len() as isize;
    let max = n + m;

    if max == 0 {
        return Vec::new();
    }

    // Diagonal k lives at index k + offset; room for k = -max-1 ..= max+1
    let offset = max + 1;
    let mut v = vec![0isize; (2 * max + 3) as usize];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    let mut end: Option<isize> = None;
    for d in 0..=max {
        let lo = (offset - d - 1) as usize;
        let hi = (offset + d + 1) as usize;
        trace.push(v[lo..=hi].to_vec());

        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;

            while x < n && y < m && eq(&old[x as usize], &new[y as usize]) {
                x += 1;
                y += 1;
            }

            v[idx] = x;

            if x >= n && y >= m {
                end = Some(d);
                break;
            }
            k += 2;
        }

        if end.is_some() {
            break;
        }
    }

    backtrack(&trace, n, m)
}

fn backtrack(trace: &[Vec<isize>], n: isize, m: isize) -> Vec<Edit> {
    let mut edits = Vec::with_capacity((n + m) as usize);
    let mut x = n;
    let mut y = m;

    for d in (0..trace.len() as isize).rev() {
        let frontier = &trace[d as usize];
        // Snapshot for round d covers k = -d-1 ..= d+1
        let at = |k: isize| frontier[(k + d + 1) as usize];

        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Keep {
                old: (x - 1) as usize,
                new: (y - 1) as usize,
            });
            x -= 1;
            y -= 1;
        }

        if d == 0 {
            break;
        }

        while x > prev_x {
            edits.push(Edit::Delete { old: (x - 1) as usize });
            x -= 1;
        }

        while y > prev_y {
            edits.push(Edit::Add { new: (y - 1) as usize });
            y -= 1;
        }
    }

    edits.reverse();
    edits
}

/// Number of non-KEEP operations in a script
pub fn edit_distance(edits: &[Edit]) -> usize {
    edits.iter().filter(|e| !e.is_keep()).count()
}
