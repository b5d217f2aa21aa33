//! Coordinate conventions of bounding boxes.
//!
//! The format names follow the keras-cv vocabulary, so a format string stored
//! next to a model stays meaningful to consumers of the exported artifact.

use crate::{common::*, CyCxHW, Rect, RectNum, HW, TLBR};

/// The layout of the four numbers describing a bounding box.
///
/// `rel_*` formats are normalized by the image size. The others are in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFormat {
    /// `[left, top, right, bottom]` in pixels.
    Xyxy,
    /// `[left, top, right, bottom]` in ratio.
    RelXyxy,
    /// `[top, left, bottom, right]` in pixels.
    Yxyx,
    /// `[top, left, bottom, right]` in ratio.
    RelYxyx,
    /// `[left, top, width, height]` in pixels.
    Xywh,
    /// `[left, top, width, height]` in ratio.
    RelXywh,
    /// `[center_x, center_y, width, height]` in pixels.
    CenterXywh,
    /// `[center_y, center_x, height, width]` in pixels.
    CenterYxhw,
}

impl BoxFormat {
    pub const ALL: [BoxFormat; 8] = [
        Self::Xyxy,
        Self::RelXyxy,
        Self::Yxyx,
        Self::RelYxyx,
        Self::Xywh,
        Self::RelXywh,
        Self::CenterXywh,
        Self::CenterYxhw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xyxy => "xyxy",
            Self::RelXyxy => "rel_xyxy",
            Self::Yxyx => "yxyx",
            Self::RelYxyx => "rel_yxyx",
            Self::Xywh => "xywh",
            Self::RelXywh => "rel_xywh",
            Self::CenterXywh => "center_xywh",
            Self::CenterYxhw => "center_yxhw",
        }
    }

    /// Interpret `coords` in this format as a box in ratio units.
    ///
    /// The image size is only consulted by pixel formats. Coordinates are
    /// not validated, so an inverted box stays inverted.
    pub fn to_ratio_tlbr<T>(&self, coords: [T; 4], image_size: &HW<T>) -> Result<TLBR<T>>
    where
        T: Float,
    {
        let [a, b, c, d] = coords;
        let pixel_tlbr = match self {
            Self::Xyxy => [b, a, d, c],
            Self::Yxyx => [a, b, c, d],
            Self::Xywh => [b, a, b + d, a + c],
            Self::CenterXywh => TLBR::from(CyCxHW {
                cy: b,
                cx: a,
                h: d,
                w: c,
            })
            .tlbr(),
            Self::CenterYxhw => TLBR::from(CyCxHW {
                cy: a,
                cx: b,
                h: c,
                w: d,
            })
            .tlbr(),
            Self::RelXyxy => return Ok(raw_tlbr([b, a, d, c])),
            Self::RelYxyx => return Ok(raw_tlbr([a, b, c, d])),
            Self::RelXywh => return Ok(raw_tlbr([b, a, b + d, a + c])),
        };
        let [h, w] = checked_size(image_size)?;
        let [t, l, b, r] = pixel_tlbr;
        Ok(raw_tlbr([t / h, l / w, b / h, r / w]))
    }

    /// Express a box in ratio units in this format.
    pub fn from_ratio_tlbr<T>(&self, tlbr: &TLBR<T>, image_size: &HW<T>) -> Result<[T; 4]>
    where
        T: Float,
    {
        let [t, l, b, r] = tlbr.tlbr();
        let rel_h = b - t;
        let rel_w = r - l;

        let coords = match self {
            Self::RelXyxy => [l, t, r, b],
            Self::RelYxyx => [t, l, b, r],
            Self::RelXywh => [l, t, rel_w, rel_h],
            _ => {
                let [h, w] = checked_size(image_size)?;
                let pixel = raw_tlbr([t * h, l * w, b * h, r * w]);
                let [t, l, b, r] = pixel.tlbr();
                let center = CyCxHW::from(&pixel);
                match self {
                    Self::Xyxy => [l, t, r, b],
                    Self::Yxyx => [t, l, b, r],
                    Self::Xywh => [l, t, pixel.w(), pixel.h()],
                    Self::CenterXywh => [center.cx, center.cy, center.w, center.h],
                    Self::CenterYxhw => [center.cy, center.cx, center.h, center.w],
                    Self::RelXyxy | Self::RelYxyx | Self::RelXywh => unreachable!(),
                }
            }
        };
        Ok(coords)
    }

    /// Convert `coords` from this format into `target`.
    pub fn convert<T>(&self, coords: [T; 4], target: BoxFormat, image_size: &HW<T>) -> Result<[T; 4]>
    where
        T: Float,
    {
        if *self == target {
            return Ok(coords);
        }
        let tlbr = self.to_ratio_tlbr(coords, image_size)?;
        target.from_ratio_tlbr(&tlbr, image_size)
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoxFormat {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|format| format.as_str() == text)
            .copied()
            .ok_or_else(|| format_err!("unknown bounding box format '{}'", text))
    }
}

fn raw_tlbr<T>([t, l, b, r]: [T; 4]) -> TLBR<T> {
    TLBR { t, l, b, r }
}

fn checked_size<T>(size: &HW<T>) -> Result<[T; 2]>
where
    T: Float,
{
    let [h, w] = size.hw();
    ensure!(
        h > T::zero() && w > T::zero(),
        "pixel box formats require a positive image size"
    );
    Ok([h, w])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn format_identity_is_untouched() {
        let coords = [0.1, 0.2, 0.3, 0.4];
        let size = HW::from_hw([0.0, 0.0]);
        let out = BoxFormat::RelYxyx
            .convert(coords, BoxFormat::RelYxyx, &size)
            .unwrap();
        assert_eq!(out, coords);
    }

    #[test]
    fn format_rel_yxyx_to_pixel_formats() {
        let size = HW::from_hw([100.0, 200.0]);
        let coords = [0.1, 0.2, 0.5, 0.6];

        let xyxy = BoxFormat::RelYxyx
            .convert(coords, BoxFormat::Xyxy, &size)
            .unwrap();
        let expect = [40.0, 10.0, 120.0, 50.0];
        xyxy.iter()
            .zip(expect.iter())
            .for_each(|(lhs, rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));

        let center = BoxFormat::RelYxyx
            .convert(coords, BoxFormat::CenterXywh, &size)
            .unwrap();
        let expect = [80.0, 30.0, 80.0, 40.0];
        center
            .iter()
            .zip(expect.iter())
            .for_each(|(lhs, rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));
    }

    #[test]
    fn format_convert_back_and_forth() {
        let size = HW::from_hw([64.0, 48.0]);
        let coords = [0.25, 0.125, 0.75, 0.5];

        for format in BoxFormat::ALL {
            let there = BoxFormat::RelYxyx.convert(coords, format, &size).unwrap();
            let back = format.convert(there, BoxFormat::RelYxyx, &size).unwrap();
            back.iter()
                .zip(coords.iter())
                .for_each(|(lhs, rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));
        }
    }

    #[test]
    fn format_keeps_inverted_boxes() {
        let size = HW::from_hw([10.0, 20.0]);
        let coords = [0.6, 0.1, 0.2, 0.4];

        let xyxy = BoxFormat::RelYxyx
            .convert(coords, BoxFormat::Xyxy, &size)
            .unwrap();
        let expect = [2.0, 6.0, 8.0, 2.0];
        xyxy.iter()
            .zip(expect.iter())
            .for_each(|(lhs, rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9));

        let rect = BoxFormat::RelYxyx.to_ratio_tlbr(coords, &size).unwrap();
        assert!(rect.h() < 0.0);
        assert_abs_diff_eq!(rect.w(), 0.3, epsilon = 1e-9);
    }

    #[test]
    fn format_pixel_needs_size() {
        let size = HW::from_hw([0.0, 0.0]);
        assert!(BoxFormat::RelYxyx
            .convert([0.1, 0.1, 0.2, 0.2], BoxFormat::Xyxy, &size)
            .is_err());
    }

    #[test]
    fn format_names() {
        for format in BoxFormat::ALL {
            assert_eq!(format.as_str().parse::<BoxFormat>().unwrap(), format);
        }
        assert!("rel_zzzz".parse::<BoxFormat>().is_err());
    }
}
