use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A reference to a BDD node, possibly complemented.
///
/// The least significant bit is the complement flag, the remaining bits hold
/// the node index. Index 0 is the single terminal, so `Ref::ONE` is the
/// terminal itself and `Ref::ZERO` is its complement.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    pub const ONE: Self = Self(0);
    pub const ZERO: Self = Self(1);

    pub const fn new(index: u32, negated: bool) -> Self {
        assert!(index < (1 << 31), "Node index overflow");
        Self((index << 1) | (negated as u32))
    }

    pub const fn positive(index: u32) -> Self {
        Self::new(index, false)
    }

    /// Index of the node this reference points to.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 >> 1
    }

    #[inline]
    pub const fn is_negated(self) -> bool {
        (self.0 & 1) != 0
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        self.index() == 0
    }

    /// The same node without the complement flag.
    #[inline]
    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Ref::ONE => write!(f, "@1"),
            Ref::ZERO => write!(f, "@0"),
            _ => write!(
                f,
                "{}@{}",
                if self.is_negated() { "~" } else { "" },
                self.index()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminals() {
        assert!(Ref::ONE.is_terminal());
        assert!(Ref::ZERO.is_terminal());
        assert_eq!(-Ref::ONE, Ref::ZERO);
        assert_eq!(-Ref::ZERO, Ref::ONE);
        assert!(!Ref::ONE.is_negated());
        assert!(Ref::ZERO.is_negated());
    }

    #[test]
    fn test_negation_keeps_index() {
        let r = Ref::positive(42);
        assert_eq!(r.index(), 42);
        assert_eq!((-r).index(), 42);
        assert!((-r).is_negated());
        assert_eq!((-r).regular(), r);
        assert_eq!(-(-r), r);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ref::ONE.to_string(), "@1");
        assert_eq!(Ref::ZERO.to_string(), "@0");
        assert_eq!(Ref::positive(7).to_string(), "@7");
        assert_eq!((-Ref::positive(7)).to_string(), "~@7");
    }
}
