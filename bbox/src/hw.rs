use crate::common::*;

/// Height and width of an image or a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HW<T> {
    h: T,
    w: T,
}

impl<T> HW<T> {
    pub fn try_cast<U>(self) -> Option<HW<U>>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        Some(HW {
            h: U::from(self.h)?,
            w: U::from(self.w)?,
        })
    }

    pub fn cast<U>(self) -> HW<U>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> HW<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_from_hw(hw: [T; 2]) -> Result<Self> {
        let [h, w] = hw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "height and width parameters must be non-negative"
        );
        Ok(Self { h, w })
    }

    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn hw(&self) -> [T; 2] {
        [self.h, self.w]
    }

    /// The largest uniform scaling factor that keeps this size within `target`.
    pub fn fit_scale(&self, target: &HW<T>) -> T {
        let sy = target.h / self.h;
        let sx = target.w / self.w;
        if sy <= sx {
            sy
        } else {
            sx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn size_fit_scale() {
        let src = HW::from_hw([100.0, 400.0]);
        let tgt = HW::from_hw([200.0, 200.0]);
        assert_abs_diff_eq!(src.fit_scale(&tgt), 0.5);
        assert_abs_diff_eq!(tgt.fit_scale(&src), 0.5);
    }

    #[test]
    fn size_negative_rejected() {
        assert!(HW::try_from_hw([-1.0, 2.0]).is_err());
    }
}
