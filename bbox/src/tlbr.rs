use super::{CyCxHW, Rect};
use crate::{common::*, Transform};

/// Bounding box in TLBR format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T>
where
    T: Copy + Num,
{
    pub fn transform(&self, transform: &Transform<T>) -> Self {
        TLBR {
            t: self.t * transform.sy + transform.ty,
            l: self.l * transform.sx + transform.tx,
            b: self.b * transform.sy + transform.ty,
            r: self.r * transform.sx + transform.tx,
        }
    }

    /// Mirror the box along the vertical axis of a region of the given width.
    pub fn flip_lr(&self, width: T) -> Self {
        TLBR {
            t: self.t,
            l: width - self.r,
            b: self.b,
            r: width - self.l,
        }
    }
}

impl<T> TLBR<T>
where
    T: Float,
{
    /// Clamp the box into `[0, h] x [0, w]`.
    ///
    /// Returns `None` if nothing with positive area is left.
    pub fn clip_to(&self, h: T, w: T) -> Option<Self> {
        let zero = T::zero();
        let t = self.t.max(zero).min(h);
        let l = self.l.max(zero).min(w);
        let b = self.b.max(zero).min(h);
        let r = self.r.max(zero).min(w);
        (b > t && r > l).then(|| TLBR { t, l, b, r })
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn b(&self) -> Self::Type {
        self.b
    }

    fn r(&self) -> Self::Type {
        self.r
    }

    fn cy(&self) -> Self::Type {
        let one = T::one();
        let two = one + one;
        self.t + self.h() / two
    }

    fn cx(&self) -> Self::Type {
        let one = T::one();
        let two = one + one;
        self.l + self.w() / two
    }

    fn h(&self) -> Self::Type {
        self.b - self.t
    }

    fn w(&self) -> Self::Type {
        self.r - self.l
    }

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        ensure!(b >= t && r >= l, "b >= t and r >= l must hold");

        Ok(Self { t, l, b, r })
    }
}

impl<T> From<CyCxHW<T>> for TLBR<T>
where
    T: Copy + Num,
{
    fn from(from: CyCxHW<T>) -> Self {
        Self::from(&from)
    }
}

impl<T> From<&CyCxHW<T>> for TLBR<T>
where
    T: Copy + Num,
{
    fn from(from: &CyCxHW<T>) -> Self {
        let two = T::one() + T::one();
        let CyCxHW { cy, cx, h, w, .. } = *from;
        let t = cy - h / two;
        let l = cx - w / two;
        let b = cy + h / two;
        let r = cx + w / two;
        Self { t, l, b, r }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tlbr_flip_lr() {
        let rect = TLBR::from_tlbr([0.1, 0.2, 0.5, 0.3]);
        let flipped = rect.flip_lr(1.0);
        let restored = flipped.flip_lr(1.0);

        let pairs = flipped
            .tlbr()
            .into_iter()
            .zip([0.1, 0.7, 0.5, 0.8])
            .chain(restored.tlbr().into_iter().zip(rect.tlbr()));
        for (lhs, rhs) in pairs {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
        }
    }

    #[test]
    fn tlbr_clip() {
        let rect = TLBR::from_tlbr([-5.0, 10.0, 30.0, 50.0]);
        let clipped = rect.clip_to(20.0, 40.0).unwrap();
        assert_eq!(clipped.tlbr(), [0.0, 10.0, 20.0, 40.0]);

        let outside = TLBR::from_tlbr([25.0, 10.0, 30.0, 20.0]);
        assert!(outside.clip_to(20.0, 40.0).is_none());
    }

    #[test]
    fn tlbr_rejects_inverted() {
        assert!(TLBR::try_from_tlbr([0.5, 0.0, 0.1, 1.0]).is_err());
    }
}
