//! Bounded numeric wrappers for validated settings.

use std::fmt;

/// Out-of-range error for bounded numeric wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsError<T> {
    /// Raw value provided.
    pub value: T,
    /// Inclusive minimum.
    pub min: T,
    /// Inclusive maximum.
    pub max: T,
}

impl<T: fmt::Display> fmt::Display for BoundsError<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "value {} is outside [{}, {}]",
            self.value, self.min, self.max
        )
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for BoundsError<T> {}

macro_rules! bounded_unsigned {
    ($(#[$doc:meta])* $name:ident, $inner:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name<const MIN: $inner, const MAX: $inner>($inner);

        impl<const MIN: $inner, const MAX: $inner> $name<MIN, MAX> {
            /// Inclusive lower bound.
            pub const MIN: $inner = MIN;
            /// Inclusive upper bound.
            pub const MAX: $inner = MAX;

            /// Create a bounded value when within the inclusive range.
            pub const fn new(value: $inner) -> Option<Self> {
                if value < MIN || value > MAX {
                    None
                } else {
                    Some(Self(value))
                }
            }

            /// Create a bounded value or return a bounds error.
            pub const fn try_new(value: $inner) -> Result<Self, BoundsError<$inner>> {
                match Self::new(value) {
                    Some(value) => Ok(value),
                    None => Err(BoundsError {
                        value,
                        min: MIN,
                        max: MAX,
                    }),
                }
            }

            /// Return the wrapped value.
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl<const MIN: $inner, const MAX: $inner> fmt::Display for $name<MIN, MAX> {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

bounded_unsigned!(
    /// Bounded `u32` with const generic limits.
    BoundedU32,
    u32
);

bounded_unsigned!(
    /// Bounded `u64` with const generic limits.
    BoundedU64,
    u64
);

#[cfg(test)]
mod tests {
    use super::*;

    type Attempts = BoundedU32<1, 1000>;
    type DelayMs = BoundedU64<1, 600_000>;

    #[test]
    fn accepts_inclusive_bounds() {
        assert_eq!(Attempts::new(1).map(Attempts::get), Some(1));
        assert_eq!(Attempts::new(1000).map(Attempts::get), Some(1000));
        assert_eq!(DelayMs::new(600_000).map(DelayMs::get), Some(600_000));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(
            Attempts::try_new(0),
            Err(BoundsError {
                value: 0,
                min: 1,
                max: 1000
            })
        );
        assert!(DelayMs::try_new(600_001).is_err());
    }

    #[test]
    fn bounds_error_display_names_range() {
        let error = BoundsError {
            value: 0_u32,
            min: 1,
            max: 1000,
        };
        assert_eq!(error.to_string(), "value 0 is outside [1, 1000]");
    }
}
