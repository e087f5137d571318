//! The two halves of a shared object

use std::fmt;

/// One native reference and one script reference sharing a handle.
///
/// Pairs are immutable once registered. A different native or script
/// reference means a new pair under a new handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPair<N, S> {
    native: N,
    script: S,
}

impl<N, S> ObjectPair<N, S> {
    pub fn new(native: N, script: S) -> Self {
        Self { native, script }
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn script(&self) -> &S {
        &self.script
    }

    pub fn into_parts(self) -> (N, S) {
        (self.native, self.script)
    }
}

/// Which domain is reporting destruction of its half.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    Native,
    Script,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Native => f.write_str("native"),
            Side::Script => f.write_str("script"),
        }
    }
}
