use std::fmt;

///
/// A four character pixel format code, as used by video capture APIs.
///
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// 16-bit unsigned single-channel samples.
    pub const Y16: FourCC = FourCC(*b"Y16 ");
    pub const YUYV: FourCC = FourCC(*b"YUYV");
    pub const MJPG: FourCC = FourCC(*b"MJPG");
    pub const GREY: FourCC = FourCC(*b"GREY");
    pub const NV12: FourCC = FourCC(*b"NV12");
    pub const RGB3: FourCC = FourCC(*b"RGB3");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self
            .0
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect();
        write!(f, "{}", s.trim_end())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_trims_padding() {
        assert_eq!(FourCC::Y16.to_string(), "Y16");
        assert_eq!(FourCC::YUYV.to_string(), "YUYV");
    }
}
