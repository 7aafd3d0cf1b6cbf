//! FBX transform composition.
//!
//! The local matrix of a model is
//!
//! ```text
//! T * Roff * Rp * Rpre * R * Rpost^-1 * Rp^-1 * Soff * Sp * S * Sp^-1
//! ```
//!
//! with the parent's global rotation and scale folded in according to the
//! model's inherit type.

use glam::{Mat4, Quat, Vec3};
use log::warn;

use crate::scene::{EulerOrder, InheritType, TransformData};

/// Map an FBX `RotationOrder` value.
///
/// Spherical XYZ (6) and anything unknown fall back to the default order.
pub(crate) fn euler_order_from_code(code: i64) -> EulerOrder {
    match code {
        0 => EulerOrder::Zyx,
        1 => EulerOrder::Yzx,
        2 => EulerOrder::Xzy,
        3 => EulerOrder::Zxy,
        4 => EulerOrder::Yxz,
        5 => EulerOrder::Xyz,
        6 => {
            warn!("Unsupported Euler order: spherical XYZ. Animations and rotations may be incorrect");
            EulerOrder::default()
        }
        other => {
            warn!("Unknown Euler order {}, using the default order", other);
            EulerOrder::default()
        }
    }
}

impl EulerOrder {
    /// Rotation from angles in radians about X, Y and Z.
    pub fn to_quat(self, angles: Vec3) -> Quat {
        let x = Quat::from_rotation_x(angles.x);
        let y = Quat::from_rotation_y(angles.y);
        let z = Quat::from_rotation_z(angles.z);
        match self {
            EulerOrder::Xyz => x * y * z,
            EulerOrder::Xzy => x * z * y,
            EulerOrder::Yxz => y * x * z,
            EulerOrder::Yzx => y * z * x,
            EulerOrder::Zxy => z * x * y,
            EulerOrder::Zyx => z * y * x,
        }
    }

    /// Rotation from angles in degrees.
    pub fn to_quat_degrees(self, degrees: Vec3) -> Quat {
        self.to_quat(Vec3::new(
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        ))
    }
}

fn rotation_matrix(degrees: Option<Vec3>, order: EulerOrder) -> Mat4 {
    degrees.map_or(Mat4::IDENTITY, |d| Mat4::from_quat(order.to_quat_degrees(d)))
}

fn translation_matrix(v: Option<Vec3>) -> Mat4 {
    v.map_or(Mat4::IDENTITY, Mat4::from_translation)
}

/// Rotation part of a matrix with scale removed.
fn extract_rotation(m: &Mat4) -> Mat4 {
    let column = |c: glam::Vec4| {
        let len = c.truncate().length();
        if len > 0.0 {
            c / len
        } else {
            c
        }
    };
    Mat4::from_cols(
        column(m.x_axis).truncate().extend(0.0),
        column(m.y_axis).truncate().extend(0.0),
        column(m.z_axis).truncate().extend(0.0),
        glam::Vec4::W,
    )
}

fn position_only(m: &Mat4) -> Mat4 {
    Mat4::from_translation(m.w_axis.truncate())
}

fn matrix_scale(m: &Mat4) -> Vec3 {
    Vec3::new(
        m.x_axis.truncate().length(),
        m.y_axis.truncate().length(),
        m.z_axis.truncate().length(),
    )
}

/// Compose the local matrix of a model.
///
/// `parent_matrix` and `parent_matrix_world` are read when both are set;
/// otherwise the parent is the identity.
pub(crate) fn generate_transform(data: &TransformData) -> Mat4 {
    let order = data.euler_order;

    let translation = translation_matrix(data.translation);
    let pre_rotation = rotation_matrix(data.pre_rotation, order);
    let rotation = rotation_matrix(data.rotation, order);
    let post_rotation = rotation_matrix(data.post_rotation, order).inverse();
    let scaling = data.scale.map_or(Mat4::IDENTITY, Mat4::from_scale);

    let scaling_offset = translation_matrix(data.scaling_offset);
    let scaling_pivot = translation_matrix(data.scaling_pivot);
    let rotation_offset = translation_matrix(data.rotation_offset);
    let rotation_pivot = translation_matrix(data.rotation_pivot);

    let (parent_local, parent_global) = match (data.parent_matrix, data.parent_matrix_world) {
        (Some(local), Some(world)) => (local, world),
        _ => (Mat4::IDENTITY, Mat4::IDENTITY),
    };

    let local_rotation = pre_rotation * rotation * post_rotation;

    let parent_global_rotation = extract_rotation(&parent_global);
    let parent_translation = position_only(&parent_global);
    let parent_global_rs = parent_translation.inverse() * parent_global;
    let parent_global_scale = parent_global_rotation.inverse() * parent_global_rs;

    let global_rs = match data.inherit_type {
        InheritType::RrSs => {
            parent_global_rotation * local_rotation * parent_global_scale * scaling
        }
        InheritType::RSrs => {
            parent_global_rotation * parent_global_scale * local_rotation * scaling
        }
        InheritType::Rrs => {
            let parent_local_scale = Mat4::from_scale(matrix_scale(&parent_local));
            let without_local = parent_global_scale * parent_local_scale.inverse();
            parent_global_rotation * local_rotation * without_local * scaling
        }
    };

    let transform = translation
        * rotation_offset
        * rotation_pivot
        * pre_rotation
        * rotation
        * post_rotation
        * rotation_pivot.inverse()
        * scaling_offset
        * scaling_pivot
        * scaling
        * scaling_pivot.inverse();

    let local_translation = position_only(&transform);
    let global_translation = position_only(&(parent_global * local_translation));

    parent_global.inverse() * (global_translation * global_rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, 1e-4), "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_euler_codes() {
        assert_eq!(euler_order_from_code(0), EulerOrder::Zyx);
        assert_eq!(euler_order_from_code(5), EulerOrder::Xyz);
        assert_eq!(euler_order_from_code(6), EulerOrder::Zyx);
        assert_eq!(euler_order_from_code(42), EulerOrder::Zyx);
    }

    #[test]
    fn test_euler_order_composition() {
        let angles = Vec3::new(FRAC_PI_2, FRAC_PI_2, 0.0);
        let xyz = EulerOrder::Xyz.to_quat(angles);
        let expected = Quat::from_rotation_x(FRAC_PI_2) * Quat::from_rotation_y(FRAC_PI_2);
        assert!(xyz.abs_diff_eq(expected, 1e-6));

        let zyx = EulerOrder::Zyx.to_quat(angles);
        let expected = Quat::from_rotation_y(FRAC_PI_2) * Quat::from_rotation_x(FRAC_PI_2);
        assert!(zyx.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_translation_rotation_scale() {
        let data = TransformData {
            translation: Some(Vec3::new(1.0, 2.0, 3.0)),
            rotation: Some(Vec3::new(0.0, 90.0, 0.0)),
            scale: Some(Vec3::splat(2.0)),
            ..Default::default()
        };
        let expected = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(FRAC_PI_2),
            Vec3::new(1.0, 2.0, 3.0),
        );
        assert_mat_eq(generate_transform(&data), expected);
    }

    #[test]
    fn test_rotation_pivot() {
        // 180 degrees about Z around the pivot (1, 0, 0).
        let data = TransformData {
            rotation: Some(Vec3::new(0.0, 0.0, 180.0)),
            rotation_pivot: Some(Vec3::new(1.0, 0.0, 0.0)),
            ..Default::default()
        };
        let m = generate_transform(&data);
        let p = m.transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_pre_and_post_rotation() {
        let data = TransformData {
            pre_rotation: Some(Vec3::new(90.0, 0.0, 0.0)),
            post_rotation: Some(Vec3::new(90.0, 0.0, 0.0)),
            ..Default::default()
        };
        assert_mat_eq(generate_transform(&data), Mat4::IDENTITY);
    }

    #[test]
    fn test_pre_rotation_follows_rotation_order() {
        let angles = Vec3::new(90.0, 90.0, 0.0);
        let data = TransformData {
            pre_rotation: Some(angles),
            euler_order: EulerOrder::Xyz,
            ..Default::default()
        };
        let expected = Mat4::from_quat(EulerOrder::Xyz.to_quat_degrees(angles));
        assert_mat_eq(generate_transform(&data), expected);
        assert!(!generate_transform(&data)
            .abs_diff_eq(Mat4::from_quat(EulerOrder::Zyx.to_quat_degrees(angles)), 1e-3));
    }

    #[test]
    fn test_child_of_translated_parent_is_local() {
        let parent = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let data = TransformData {
            translation: Some(Vec3::new(0.0, 1.0, 0.0)),
            parent_matrix: Some(parent),
            parent_matrix_world: Some(parent),
            ..Default::default()
        };
        assert_mat_eq(
            generate_transform(&data),
            Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        );
    }

    #[test]
    fn test_inherit_types_under_non_uniform_parent() {
        let parent = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let base = TransformData {
            rotation: Some(Vec3::new(0.0, 0.0, 90.0)),
            parent_matrix: Some(parent),
            parent_matrix_world: Some(parent),
            ..Default::default()
        };

        // RrSs: world = R(parent) * R(local) * S(parent) * S(local)
        let rrss = generate_transform(&base);
        let world = parent * rrss;
        let expected = Mat4::from_quat(Quat::from_rotation_z(FRAC_PI_2)) * parent;
        assert_mat_eq(world, expected);

        // RSrs keeps the usual parent * local product.
        let rsrs = generate_transform(&TransformData {
            inherit_type: InheritType::RSrs,
            ..base.clone()
        });
        assert_mat_eq(rsrs, Mat4::from_quat(Quat::from_rotation_z(FRAC_PI_2)));

        // Rrs drops the parent's own scale.
        let rrs = generate_transform(&TransformData {
            inherit_type: InheritType::Rrs,
            ..base
        });
        let world = parent * rrs;
        assert_mat_eq(world, Mat4::from_quat(Quat::from_rotation_z(FRAC_PI_2)));
    }
}
