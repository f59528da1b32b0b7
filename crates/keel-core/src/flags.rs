// Copyright 2026 keel contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A macro to define bitflag set types in a structured way.
//!
//! Used for module run-state flags and lifecycle status bits, where the
//! raw bits are also stored in atomics and must round-trip losslessly
//! through [`bits`](macro@crate::keel_bitflags) / `from_bits`.

/// Defines a transparent bitflag set over an unsigned integer type.
///
/// Unknown bits are kept, not truncated; `Debug` renders them as
/// `UNKNOWN(..)` so corrupted state is visible in logs.
#[macro_export]
macro_rules! keel_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// An empty set of flags.
            pub const EMPTY: Self = Self { bits: 0 };

            /// Creates a flag set from raw bits. Undefined bits are kept.
            pub const fn from_bits(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw bits of the set.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if all flags in `other` are contained in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if any flag in `other` is contained in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns `true` if no flags are set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Inserts the flags in `other` into `self`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Removes the flags in `other` from `self`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Returns a copy of `self` with `other` inserted.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns a copy of `self` with `other` removed.
            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self { bits: !self.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, other: Self) {
                self.bits &= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut bits = self.bits;
                let mut first = true;

                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    if ($flag_value != 0) && (bits & $flag_value) == $flag_value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        bits &= !$flag_value;
                        first = false;
                    }
                )*
                if bits != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "UNKNOWN({bits:#x})")?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::keel_bitflags;

    keel_bitflags! {
        /// Paired run/pause flags, mirroring the module flag layout.
        pub struct RunFlags: u32 {
            const RUN_A = 1 << 0;
            const PAUSE_A = 1 << 1;
            const RUN_B = 1 << 2;
            const PAUSE_B = 1 << 3;
        }
    }

    #[test]
    fn empty_and_default() {
        assert_eq!(RunFlags::EMPTY.bits(), 0);
        assert!(RunFlags::EMPTY.is_empty());
        assert_eq!(RunFlags::default(), RunFlags::EMPTY);
        assert_eq!(format!("{:?}", RunFlags::EMPTY), "RunFlags { EMPTY }");
    }

    #[test]
    fn contains_and_intersects() {
        let flags = RunFlags::RUN_A | RunFlags::RUN_B;
        assert!(flags.contains(RunFlags::RUN_A));
        assert!(!flags.contains(RunFlags::PAUSE_A));
        assert!(flags.intersects(RunFlags::RUN_B | RunFlags::PAUSE_B));
        assert!(!flags.intersects(RunFlags::PAUSE_A | RunFlags::PAUSE_B));
    }

    #[test]
    fn pair_swap_with_without() {
        // The module manager flips a run/pause pair with `without().with()`.
        let flags = RunFlags::RUN_A;
        let paused = flags.without(RunFlags::RUN_A).with(RunFlags::PAUSE_A);
        assert_eq!(paused, RunFlags::PAUSE_A);
        assert_eq!(flags, RunFlags::RUN_A, "original is unchanged");
    }

    #[test]
    fn insert_remove_roundtrip() {
        let mut flags = RunFlags::EMPTY;
        flags.insert(RunFlags::RUN_A | RunFlags::RUN_B);
        assert_eq!(flags, RunFlags::RUN_A | RunFlags::RUN_B);
        flags.remove(RunFlags::RUN_A);
        assert_eq!(flags, RunFlags::RUN_B);
        flags.remove(RunFlags::PAUSE_B); // not present, no effect
        assert_eq!(flags, RunFlags::RUN_B);
    }

    #[test]
    fn bits_survive_atomic_roundtrip() {
        let flags = RunFlags::RUN_A | RunFlags::PAUSE_B;
        let raw = flags.bits();
        assert_eq!(RunFlags::from_bits(raw), flags);
    }

    #[test]
    fn debug_renders_flag_names() {
        let flags = RunFlags::RUN_A | RunFlags::PAUSE_B;
        assert_eq!(format!("{flags:?}"), "RunFlags { RUN_A | PAUSE_B }");
        let unknown = RunFlags::from_bits(1 << 8);
        assert_eq!(format!("{unknown:?}"), "RunFlags { UNKNOWN(0x100) }");
    }
}
