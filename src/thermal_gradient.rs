use image::Rgb;

use once_cell::sync::Lazy;

pub static THERMAL_GRADIENTS: Lazy<Vec<ThermalGradient>> = Lazy::new(|| {
    vec![
        ThermalGradient::new(
            "Jet".to_string(),
            vec![
                ThermalGradientPoint::from_rgbv(0, 0, 128, 0.0),
                ThermalGradientPoint::from_rgbv(0, 0, 255, 0.125),
                ThermalGradientPoint::from_rgbv(0, 255, 255, 0.375),
                ThermalGradientPoint::from_rgbv(255, 255, 0, 0.625),
                ThermalGradientPoint::from_rgbv(255, 0, 0, 0.875),
                ThermalGradientPoint::from_rgbv(128, 0, 0, 1.0),
            ],
        ),
        ThermalGradient::new(
            "Cold-warm".to_string(),
            vec![
                ThermalGradientPoint::from_rgbv(0, 0, 0, 0.0),
                ThermalGradientPoint::from_rgbv(0, 0, 255, 0.21),
                ThermalGradientPoint::from_rgbv(0, 255, 255, 0.24),
                ThermalGradientPoint::from_rgbv(0, 255, 0, 0.26),
                ThermalGradientPoint::from_rgbv(255, 255, 0, 0.29),
                ThermalGradientPoint::from_rgbv(255, 128, 0, 0.32),
                ThermalGradientPoint::from_rgbv(255, 0, 0, 0.35),
                ThermalGradientPoint::from_rgbv(255, 0, 255, 0.71),
                ThermalGradientPoint::from_rgbv(255, 255, 255, 1.0),
            ],
        ),
        ThermalGradient::new(
            "Black to white".to_string(),
            vec![
                ThermalGradientPoint::from_rgbv(0, 0, 0, 0.0),
                ThermalGradientPoint::from_rgbv(255, 255, 255, 1.0),
            ],
        ),
    ]
});

#[derive(Clone, Debug)]
pub struct ThermalGradientPoint {
    color: Rgb<u8>,
    pos: f64,
}

impl ThermalGradientPoint {
    pub fn new(color: Rgb<u8>, pos: f64) -> Self {
        Self { color, pos }
    }

    pub fn from_rgbv(r: u8, g: u8, b: u8, pos: f64) -> Self {
        Self::new(Rgb([r, g, b]), pos)
    }
}

#[derive(Clone, Debug)]
pub struct ThermalGradient {
    pub name: String,
    pub points: Vec<ThermalGradientPoint>,
}

impl ThermalGradient {
    pub fn new(name: String, points: Vec<ThermalGradientPoint>) -> Self {
        let mut me = Self { name, points };
        me.points.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        me
    }

    pub fn by_name(name: &str) -> Option<&'static ThermalGradient> {
        THERMAL_GRADIENTS.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    //
    // Sample the function at a given position.
    // The position is normalized to the range [0, 1].
    //
    pub fn get_color(&self, pos: f64) -> Rgb<u8> {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Rgb([0, 0, 0]);
        };
        if pos.is_nan() || pos <= first.pos {
            return first.color;
        }
        if pos >= last.pos {
            return last.color;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if pos >= a.pos && pos <= b.pos {
                let t = if b.pos > a.pos {
                    (pos - a.pos) / (b.pos - a.pos)
                } else {
                    0.0
                };
                let mix = |ca: u8, cb: u8| (ca as f64 * (1.0 - t) + cb as f64 * t).round() as u8;
                return Rgb([
                    mix(a.color[0], b.color[0]),
                    mix(a.color[1], b.color[1]),
                    mix(a.color[2], b.color[2]),
                ]);
            }
        }
        last.color
    }
}
