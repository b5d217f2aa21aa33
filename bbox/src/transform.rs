use super::TLBR;
use crate::{common::*, HW};

/// Per-axis scaling followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transform<T> {
    pub sy: T,
    pub sx: T,
    pub ty: T,
    pub tx: T,
}

impl<T> Transform<T>
where
    T: Copy + Num + PartialOrd,
{
    /// Stretch `src_size` onto `tgt_size`, ignoring the aspect ratio.
    pub fn from_sizes_exact(src_size: &HW<T>, tgt_size: &HW<T>) -> Self {
        Self {
            sy: tgt_size.h() / src_size.h(),
            sx: tgt_size.w() / src_size.w(),
            ty: T::zero(),
            tx: T::zero(),
        }
    }

    /// Shift by `(ty, tx)` after this transform.
    pub fn then_translate(&self, ty: T, tx: T) -> Self {
        Self {
            ty: self.ty + ty,
            tx: self.tx + tx,
            ..*self
        }
    }
}

impl<T> Mul<&TLBR<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = TLBR<T>;

    fn mul(self, rhs: &TLBR<T>) -> Self::Output {
        rhs.transform(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;

    #[test]
    fn rect_resize_exact() {
        let transform =
            Transform::from_sizes_exact(&HW::from_hw([80.0, 80.0]), &HW::from_hw([20.0, 40.0]));
        let expect = Transform {
            sx: 0.5,
            sy: 0.25,
            tx: 0.0,
            ty: 0.0,
        };
        assert_eq!(transform, expect);

        let rect = TLBR::from_tlbr([40.0, 0.0, 80.0, 80.0]);
        assert_eq!((&transform * &rect).tlbr(), [10.0, 0.0, 20.0, 40.0]);
    }

    #[test]
    fn rect_translate() {
        let transform =
            Transform::from_sizes_exact(&HW::from_hw([1.0, 1.0]), &HW::from_hw([2.0, 2.0]))
                .then_translate(-2.0, 3.0);
        let rect = TLBR::from_tlbr([2.0, 0.0, 4.0, 1.0]);
        assert_eq!((&transform * &rect).tlbr(), [2.0, 3.0, 6.0, 5.0]);
    }
}
