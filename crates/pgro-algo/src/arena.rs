//! Arena scratch space for per-iteration allocations.
//!
//! A cascade run rebalances the grid once per iteration. The per-component totals it
//! needs are short-lived, so they come from a bumpalo arena that is reset in O(1) at the
//! start of every rebalance.

use bumpalo::Bump;

/// Scratch arena owned by one cascade run (one per scenario worker).
///
/// ```
/// use pgro_algo::arena::ArenaContext;
///
/// let mut ctx = ArenaContext::new();
/// {
///     let mut totals = ctx.alloc_vec::<(f64, f64)>();
///     totals.push((15.0, 20.0));
/// }
/// ctx.reset();
/// ```
pub struct ArenaContext {
    bump: Bump,
}

impl ArenaContext {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Free everything allocated since the last reset.
    ///
    /// Arena values are plain data; no destructors run.
    pub fn reset(&mut self) {
        self.bump.reset();
    }

    pub fn alloc_vec<T>(&self) -> bumpalo::collections::Vec<'_, T> {
        bumpalo::collections::Vec::new_in(&self.bump)
    }

    /// Bytes currently held by the arena.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for ArenaContext {
    fn default() -> Self {
        Self::new()
    }
}
