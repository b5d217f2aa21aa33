//! Class labels attached to bounding boxes, and the vocabulary of class names.

mod vocabulary;
pub use vocabulary::*;

use bbox::{Rect, Transform, TLBR};
use num_traits::Num;
use std::ops::Mul;

/// A rectangle annotated with a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

impl<R, C> Label<R, C>
where
    R: Rect,
{
    /// Replace the rectangle while keeping the class.
    pub fn map_rect<S, F>(self, f: F) -> Label<S, C>
    where
        S: Rect,
        F: FnOnce(R) -> S,
    {
        Label {
            rect: f(self.rect),
            class: self.class,
        }
    }
}

impl<'a, T, C> Mul<&'a Label<TLBR<T>, C>> for &'a Transform<T>
where
    T: Copy + Num + PartialOrd,
    C: Copy,
{
    type Output = Label<TLBR<T>, C>;

    fn mul(self, rhs: &'a Label<TLBR<T>, C>) -> Self::Output {
        Label {
            rect: self * &rhs.rect,
            class: rhs.class,
        }
    }
}
