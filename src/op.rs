//! The closed set of blend modes. Extending the engine means adding a
//! member here plus kernels for it; nothing is dispatched by name.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeOperation {
    Multiply,
    Screen,
    Difference,
    Addition,
    Subtract,
    Darken,
    Lighten,
    Dodge,
    Burn,
    Divide,
    GrainExtract,
    GrainMerge,
    /// Pass-through of B. The historical operation exchanged the two source
    /// buffers in place; with a destination-only mutation contract the
    /// exchange is realized by two calls with the operands swapped.
    Swap,
    /// Multiplies every channel of A (alpha included) by the context's
    /// scale factor. B is unused.
    Scale,
}

impl CompositeOperation {
    pub const ALL: [CompositeOperation; 14] = [
        CompositeOperation::Multiply,
        CompositeOperation::Screen,
        CompositeOperation::Difference,
        CompositeOperation::Addition,
        CompositeOperation::Subtract,
        CompositeOperation::Darken,
        CompositeOperation::Lighten,
        CompositeOperation::Dodge,
        CompositeOperation::Burn,
        CompositeOperation::Divide,
        CompositeOperation::GrainExtract,
        CompositeOperation::GrainMerge,
        CompositeOperation::Swap,
        CompositeOperation::Scale,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn name(self) -> &'static str {
        match self {
            CompositeOperation::Multiply => "multiply",
            CompositeOperation::Screen => "screen",
            CompositeOperation::Difference => "difference",
            CompositeOperation::Addition => "addition",
            CompositeOperation::Subtract => "subtract",
            CompositeOperation::Darken => "darken",
            CompositeOperation::Lighten => "lighten",
            CompositeOperation::Dodge => "dodge",
            CompositeOperation::Burn => "burn",
            CompositeOperation::Divide => "divide",
            CompositeOperation::GrainExtract => "grain-extract",
            CompositeOperation::GrainMerge => "grain-merge",
            CompositeOperation::Swap => "swap",
            CompositeOperation::Scale => "scale",
        }
    }
}

impl fmt::Display for CompositeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_operation_once() {
        assert_eq!(CompositeOperation::ALL.len(), CompositeOperation::COUNT);
        for (i, op) in CompositeOperation::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
    }

    #[test]
    fn names_are_unique() {
        for a in CompositeOperation::ALL {
            for b in CompositeOperation::ALL {
                if a != b {
                    assert_ne!(a.name(), b.name());
                }
            }
        }
    }
}
