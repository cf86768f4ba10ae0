use glam::{Quat, Vec3};

/// Above this dot product two rotations are treated as parallel.
pub const SLERP_DOT_THRESHOLD: f32 = 0.9995;

/// Spherical interpolation along the shorter arc. Nearly parallel inputs
/// fall back to a normalized linear blend.
pub fn slerp(from: Quat, to: Quat, t: f32) -> Quat {
    let mut to = to;
    let mut dot = from.dot(to);

    if dot < 0.0 {
        to = -to;
        dot = -dot;
    }

    if dot > SLERP_DOT_THRESHOLD {
        return (from + (to - from) * t).normalize();
    }

    let theta_0 = dot.acos();
    let theta = theta_0 * t;
    let sin_theta = theta.sin();
    let sin_theta_0 = theta_0.sin();

    let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
    let s1 = sin_theta / sin_theta_0;

    from * s0 + to * s1
}

/// Cubic Hermite blend of two endpoints and their velocities.
/// `dt_secs` scales the velocities into tangents over the segment.
pub fn hermite(p0: Vec3, p1: Vec3, v0: Vec3, v1: Vec3, dt_secs: f32, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;

    let h1 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h2 = -2.0 * t3 + 3.0 * t2;
    let h3 = t3 - 2.0 * t2 + t;
    let h4 = t3 - t2;

    p0 * h1 + p1 * h2 + v0 * (h3 * dt_secs) + v1 * (h4 * dt_secs)
}

/// Uniform Catmull-Rom between `p1` and `p2`, shaped by neighbours `p0` and `p3`.
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;

    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    p0 * c0 + p1 * c1 + p2 * c2 + p3 * c3
}

pub fn lerp_option(from: Option<Vec3>, to: Option<Vec3>, t: f32) -> Option<Vec3> {
    match (from, to) {
        (Some(a), Some(b)) => Some(a.lerp(b, t)),
        (a, b) => b.or(a),
    }
}

pub fn slerp_option(from: Option<Quat>, to: Option<Quat>, t: f32) -> Option<Quat> {
    match (from, to) {
        (Some(a), Some(b)) => Some(slerp(a, b, t)),
        (a, b) => b.or(a),
    }
}
