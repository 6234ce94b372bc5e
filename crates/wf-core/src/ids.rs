use core::fmt;
use core::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create an id from a 0-based index (stored as index+1).
            pub fn from_index(index: u32) -> Self {
                match NonZeroU32::new(index.wrapping_add(1)) {
                    Some(v) => Self(v),
                    None => Self(NonZeroU32::MAX),
                }
            }

            /// Recover the 0-based index.
            pub fn index(self) -> u32 {
                self.0.get() - 1
            }

            /// Index as `usize`, for slicing element tables.
            pub fn slot(self) -> usize {
                self.index() as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.index())
            }
        }
    };
}

define_id!(
    /// Identifier of a junction, tank or reservoir.
    NodeId,
    "n"
);
define_id!(
    /// Identifier of a pipe, pump or valve.
    LinkId,
    "l"
);
define_id!(
    /// Identifier of a multiplier pattern.
    PatternId,
    "p"
);
define_id!(
    /// Identifier of an (x, y) curve.
    CurveId,
    "c"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            assert_eq!(NodeId::from_index(i).index(), i);
            assert_eq!(LinkId::from_index(i).slot(), i as usize);
        }
    }

    #[test]
    fn option_id_is_niche_optimized() {
        assert_eq!(
            core::mem::size_of::<LinkId>(),
            core::mem::size_of::<Option<LinkId>>()
        );
    }

    #[test]
    fn display_uses_kind_prefix() {
        assert_eq!(NodeId::from_index(3).to_string(), "n3");
        assert_eq!(LinkId::from_index(0).to_string(), "l0");
    }
}
