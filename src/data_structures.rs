/// One open `OP_IF`/`OP_NOTIF` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    /// Whether the body currently being walked is executed.
    pub taken: bool,
    /// Whether the block's `OP_ELSE` was already passed.
    pub seen_else: bool,
}

/// A data type to abstract out the condition stack during script execution.
///
/// Conceptually it acts like a vector of branches, one for each level of
/// nested IF/ELSE/ENDIF, indicating whether we're in the active or inactive
/// body of each. Unlike the consensus interpreter, a block accepts at most one
/// `OP_ELSE`.
///
/// Next to the entries, it tracks the position of the first not-taken entry so
/// that asking whether everything is executing does not walk the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStack {
    entries: Vec<Branch>,
    /// The position of the first not-taken entry, or NO_FALSE if all taken.
    first_false_pos: usize,
}

impl BranchStack {
    /// A constant for first_false_pos to indicate there are no falses.
    const NO_FALSE: usize = usize::MAX;

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            first_false_pos: Self::NO_FALSE,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_true(&self) -> bool {
        self.first_false_pos == Self::NO_FALSE
    }

    pub fn push(&mut self, taken: bool) {
        if self.first_false_pos == Self::NO_FALSE && !taken {
            self.first_false_pos = self.entries.len();
        }
        self.entries.push(Branch {
            taken,
            seen_else: false,
        });
    }

    /// Returns [false] if it was empty, [true] otherwise.
    pub fn pop(&mut self) -> bool {
        if self.entries.pop().is_none() {
            return false;
        }
        if self.first_false_pos == self.entries.len() {
            // When popping off the first false value, everything becomes true.
            self.first_false_pos = Self::NO_FALSE;
        }
        true
    }

    /// Flips the top entry for its `OP_ELSE`.
    ///
    /// Returns [false] if there is no open block or its else was already seen.
    pub fn toggle_top(&mut self) -> bool {
        let top_pos = match self.entries.len().checked_sub(1) {
            Some(p) => p,
            None => return false,
        };
        let top = &mut self.entries[top_pos];
        if top.seen_else {
            return false;
        }
        top.seen_else = true;
        top.taken = !top.taken;

        if self.first_false_pos == Self::NO_FALSE {
            // All taken before, the top is now the first false.
            self.first_false_pos = top_pos;
        } else if self.first_false_pos == top_pos {
            self.first_false_pos = Self::NO_FALSE;
        }
        // Otherwise a lower entry is false and toggling the top is unobservable.
        true
    }
}

impl Default for BranchStack {
    fn default() -> Self {
        Self::new()
    }
}
