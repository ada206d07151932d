use std::cell::Cell;

use crate::foundation::core::{Affine, invert_affine};

/// One cached transformation matrix and its inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CachedMatrix {
    /// Frame the matrix was built for, or `None` when it does not vary with time.
    frame: Option<i64>,
    pub(crate) matrix: Affine,
    /// `None` when `matrix` is singular.
    pub(crate) inverse: Option<Affine>,
    /// Bumped on every rebuild; dependants key their own caches on it.
    pub(crate) version: u64,
}

/// Lazily rebuilt matrix: invalidation only clears the slot, the next read recomputes.
#[derive(Clone, Debug, Default)]
pub(crate) struct MatrixCache {
    slot: Cell<Option<CachedMatrix>>,
    builds: Cell<u64>,
}

impl MatrixCache {
    /// The matrix at `frame`, rebuilt with `build` when missing or cached for another frame.
    ///
    /// `build` returns the matrix and whether any contributing parameter is automated.
    pub(crate) fn get_or_build(&self, frame: i64, build: impl FnOnce() -> (Affine, bool)) -> CachedMatrix {
        if let Some(m) = self.slot.get()
            && m.frame.is_none_or(|f| f == frame)
        {
            return m;
        }
        let (matrix, varies) = build();
        let version = self.builds.get() + 1;
        self.builds.set(version);
        let m = CachedMatrix {
            frame: varies.then_some(frame),
            matrix,
            inverse: invert_affine(matrix),
            version,
        };
        self.slot.set(Some(m));
        m
    }

    /// Drop the cached value. Returns whether one was present.
    pub(crate) fn invalidate(&self) -> bool {
        self.slot.take().is_some()
    }

    pub(crate) fn is_valid_at(&self, frame: i64) -> bool {
        self.slot
            .get()
            .is_some_and(|m| m.frame.is_none_or(|f| f == frame))
    }

    #[cfg(test)]
    pub(crate) fn builds(&self) -> u64 {
        self.builds.get()
    }
}
