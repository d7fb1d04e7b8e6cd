use nalgebra::{Matrix3, Point2, Point3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Project a camera-frame point to pixel coordinates.
    pub fn project(&self, point: &Point3<f64>) -> Point2<f64> {
        let x = point.x / point.z;
        let y = point.y / point.z;
        Point2::new(x * self.fx + self.cx, y * self.fy + self.cy)
    }

    /// Lift a pixel with known depth (along the optical axis) into the camera frame.
    pub fn unproject(&self, pixel: Point2<f64>, depth: f64) -> Point3<f64> {
        let x = (pixel.x - self.cx) / self.fx;
        let y = (pixel.y - self.cy) / self.fy;
        Point3::new(x * depth, y * depth, depth)
    }
}

/// World-to-camera rigid transform: `x_cam = R * x_world + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraExtrinsics {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl CameraExtrinsics {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    pub fn inverse(&self) -> Self {
        let r_inv = self.rotation.transpose();
        let t_inv = -r_inv * self.translation;
        Self {
            rotation: r_inv,
            translation: t_inv,
        }
    }

    /// Optical center in world coordinates.
    pub fn center(&self) -> Point3<f64> {
        Point3::from(-self.rotation.transpose() * self.translation)
    }
}

impl Default for CameraExtrinsics {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

/// A calibrated view of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// View identifier, as found in the depth-map file names.
    pub id: u32,
    pub intrinsics: CameraIntrinsics,
    pub extrinsics: CameraExtrinsics,
}

impl Camera {
    pub fn new(id: u32, intrinsics: CameraIntrinsics, extrinsics: CameraExtrinsics) -> Self {
        Self {
            id,
            intrinsics,
            extrinsics,
        }
    }

    /// Back-project pixel `(u, v)` at `depth` into world coordinates.
    pub fn back_project(&self, u: f64, v: f64, depth: f64) -> Point3<f64> {
        let in_camera = self.intrinsics.unproject(Point2::new(u, v), depth);
        self.extrinsics.inverse().transform_point(&in_camera)
    }

    /// Project a world point into this view's pixel grid.
    pub fn project(&self, world: &Point3<f64>) -> Point2<f64> {
        self.intrinsics
            .project(&self.extrinsics.transform_point(world))
    }

    pub fn center(&self) -> Point3<f64> {
        self.extrinsics.center()
    }
}
