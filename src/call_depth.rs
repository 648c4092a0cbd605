//! Thread-local re-entry counting.
//!
//! A layer that may be stacked more than once around the same service only
//! wants its outermost copy to do any work. Each copy enters a [`CallDepth`]
//! with the same key before delegating; only the guard that saw depth 0
//! acts.
//!
//! The counter is per thread, so a guard must never be held across an
//! `.await`. [`CallDepth`] is `!Send` to keep it that way inside `Send`
//! futures.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

thread_local! {
    static DEPTHS: RefCell<HashMap<TypeId, usize>> = RefCell::new(HashMap::new());
}

/// Guard for one nested entry under `key`. Dropping it leaves the entry.
#[derive(Debug)]
#[must_use = "the depth is released as soon as the guard is dropped"]
pub struct CallDepth {
    key: TypeId,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl CallDepth {
    pub fn enter(key: TypeId) -> Self {
        let depth = DEPTHS.with(|depths| {
            let mut depths = depths.borrow_mut();
            let count = depths.entry(key).or_insert(0);
            *count += 1;
            *count - 1
        });
        Self { key, depth, _not_send: PhantomData }
    }

    /// Number of guards for the same key this thread already held on entry.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_outermost(&self) -> bool {
        self.depth == 0
    }

    /// Live guards for `key` on this thread.
    pub fn current(key: TypeId) -> usize {
        DEPTHS.with(|depths| depths.borrow().get(&key).copied().unwrap_or(0))
    }
}

impl Drop for CallDepth {
    fn drop(&mut self) {
        DEPTHS.with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(count) = depths.get_mut(&self.key) {
                *count -= 1;
                if *count == 0 {
                    depths.remove(&self.key);
                }
            }
        });
    }
}
