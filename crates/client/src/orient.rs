use glam::{Mat3, Quat, Vec3};

/// Rotation that turns an entity's +Z axis from `from` toward `target`,
/// keeping +Y as up where possible. `None` when the two points coincide.
pub fn look_rotation(from: Vec3, target: Vec3) -> Option<Quat> {
    let forward = (target - from).try_normalize()?;
    let right = Vec3::Y
        .cross(forward)
        .try_normalize()
        .or_else(|| Vec3::Z.cross(forward).try_normalize())?;
    let up = forward.cross(right);

    Some(Quat::from_mat3(&Mat3::from_cols(right, up, forward)))
}
