use super::{Rect, TLBR};
use crate::common::*;

/// Bounding box in CyCxHW format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CyCxHW<T> {
    pub(crate) cy: T,
    pub(crate) cx: T,
    pub(crate) h: T,
    pub(crate) w: T,
}

impl<T> Rect for CyCxHW<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy - self.h / two
    }

    fn l(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx - self.w / two
    }

    fn b(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy + self.h / two
    }

    fn r(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx + self.w / two
    }

    fn cy(&self) -> Self::Type {
        self.cy
    }

    fn cx(&self) -> Self::Type {
        self.cx
    }

    fn h(&self) -> Self::Type {
        self.h
    }

    fn w(&self) -> Self::Type {
        self.w
    }

    fn try_from_tlbr(tlbr: [T; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        let two = T::one() + T::one();
        let h = b - t;
        let w = r - l;
        ensure!(
            h >= T::zero() && w >= T::zero(),
            "box height and width must be non-negative"
        );

        Ok(Self {
            cy: t + h / two,
            cx: l + w / two,
            h,
            w,
        })
    }
}

impl<T> From<&TLBR<T>> for CyCxHW<T>
where
    T: Copy + Num,
{
    fn from(from: &TLBR<T>) -> Self {
        let two = T::one() + T::one();
        let TLBR { t, l, b, r } = *from;
        let h = b - t;
        let w = r - l;
        Self {
            cy: t + h / two,
            cx: l + w / two,
            h,
            w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;

    #[test]
    fn cycxhw_tlbr_agree() {
        let tlbr = TLBR::from_tlbr([10.0, 20.0, 30.0, 60.0]);
        let cycxhw = CyCxHW::from(&tlbr);
        assert_eq!(
            [cycxhw.cy(), cycxhw.cx(), cycxhw.h(), cycxhw.w()],
            [20.0, 40.0, 20.0, 40.0]
        );
        assert_eq!(TLBR::from(cycxhw), tlbr);
    }
}
