use rand::Rng;

/// Axis-aligned bounding box of the transport domain.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub lower_left: [f64; 3],
    pub upper_right: [f64; 3],
    pub center: [f64; 3],
    pub width: [f64; 3],
}

impl BoundingBox {
    pub fn new(lower_left: [f64; 3], upper_right: [f64; 3]) -> Self {
        let center = [
            0.5 * (lower_left[0] + upper_right[0]),
            0.5 * (lower_left[1] + upper_right[1]),
            0.5 * (lower_left[2] + upper_right[2]),
        ];
        let width = [
            upper_right[0] - lower_left[0],
            upper_right[1] - lower_left[1],
            upper_right[2] - lower_left[2],
        ];
        BoundingBox {
            lower_left,
            upper_right,
            center,
            width,
        }
    }

    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|a| point[a] >= self.lower_left[a] && point[a] <= self.upper_right[a])
    }

    /// Uniformly sample a point in the box interior.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        [
            self.lower_left[0] + rng.gen::<f64>() * self.width[0],
            self.lower_left[1] + rng.gen::<f64>() * self.width[1],
            self.lower_left[2] + rng.gen::<f64>() * self.width[2],
        ]
    }
}
