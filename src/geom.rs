use euclid::TypedPoint3D;
use euclid::TypedVector3D;

/// Coordinates after the axis remap applied at load time: x unchanged, y is up, z is south.
pub struct LevelSpace;
pub type Coord = f32;
pub type Point = TypedPoint3D<Coord, LevelSpace>;
pub type Vector = TypedVector3D<Coord, LevelSpace>;

/// Axis-aligned box grown one point at a time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn from_point(point: Point) -> Bounds {
        Bounds{ min: point, max: point }
    }

    pub fn extend(&mut self, point: Point) {
        self.min = Point::new(self.min.x.min(point.x), self.min.y.min(point.y), self.min.z.min(point.z));
        self.max = Point::new(self.max.x.max(point.x), self.max.y.max(point.y), self.max.z.max(point.z));
    }

    pub fn size(&self) -> Vector {
        self.max - self.min
    }
}
