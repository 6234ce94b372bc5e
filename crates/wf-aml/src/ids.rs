//! Declaration handles.
//!
//! Handles identify a declaration for the lifetime of the model. They are
//! not positions in the variable or residual vectors; those are assigned by
//! `finalize_structure`.

use core::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(slot: usize) -> Self {
                Self(slot as u32)
            }

            pub fn slot(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_handle!(
    /// Handle of a declared variable.
    VarId,
    "x"
);
define_handle!(
    /// Handle of a declared parameter.
    ParamId,
    "p"
);
define_handle!(
    /// Handle of a declared constraint.
    ConId,
    "r"
);
