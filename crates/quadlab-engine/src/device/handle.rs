use std::fmt;
use std::num::NonZeroU32;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw device identifier. Zero is never a valid handle.
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl From<NonZeroU32> for $name {
            fn from(raw: NonZeroU32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

device_handle!(
    /// Device-assigned identifier of a buffer object.
    BufferId,
    "buffer"
);

device_handle!(
    /// Device-assigned identifier of a single compiled shader stage.
    ShaderId,
    "shader"
);

device_handle!(
    /// Device-assigned identifier of a linked shader program.
    ProgramId,
    "program"
);

/// Opaque uniform slot inside the program it was looked up from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Monotonic identifier source shared by every handle kind of one device.
///
/// Identifiers are never reused, so a stale handle can't alias a live object.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    last: u32,
}

impl IdAllocator {
    pub(crate) fn next(&mut self) -> NonZeroU32 {
        self.last = self.last.wrapping_add(1).max(1);
        NonZeroU32::new(self.last).unwrap_or(NonZeroU32::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert!(BufferId::from_raw(0).is_none());
        assert_eq!(ProgramId::from_raw(7).map(ProgramId::get), Some(7));
    }

    #[test]
    fn allocator_starts_at_one_and_counts_up() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.next().get(), 1);
        assert_eq!(ids.next().get(), 2);
        assert_eq!(ids.next().get(), 3);
    }

    #[test]
    fn debug_names_the_kind() {
        let id = ShaderId::from_raw(4).unwrap();
        assert_eq!(format!("{id:?}"), "shader#4");
    }
}
