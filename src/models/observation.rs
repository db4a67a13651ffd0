use crate::models::common::Vector3;

/// 観測ベクトルの要素数
pub const OBSERVATION_SIZE: usize = 12;

/// 予約領域の固定値
const RESERVED: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

/// エージェントの姿勢（ローカル座標系の基準）
///
/// ローカル座標系は前方が +z、右手方向が +x です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentFrame {
    pub position: Vector3,
    pub facing: Vector3,
}

impl AgentFrame {
    pub fn new(position: Vector3, facing: Vector3) -> Self {
        let facing = facing.flat().normalized();
        let facing = if facing.is_near_zero() { Vector3::FORWARD } else { facing };
        Self { position, facing }
    }

    pub fn right(&self) -> Vector3 {
        Vector3::planar(self.facing.z, -self.facing.x)
    }

    /// ワールド座標の点をローカル座標へ
    pub fn inverse_transform_point(&self, point: Vector3) -> Vector3 {
        self.inverse_transform_direction(point - self.position)
    }

    /// ワールド座標の方向をローカル座標へ
    pub fn inverse_transform_direction(&self, direction: Vector3) -> Vector3 {
        Vector3::new(
            direction.dot(&self.right()),
            direction.y,
            direction.dot(&self.facing),
        )
    }

    /// ローカル座標の方向をワールド座標へ
    pub fn transform_direction(&self, local: Vector3) -> Vector3 {
        self.right() * local.x + Vector3::new(0.0, local.y, 0.0) + self.facing * local.z
    }
}

/// 1ティック分の観測
///
/// 並びは固定: 相対ボール位置(x,z), 相対ゴール位置(x,z), 自己速度(x,z),
/// ボール速度(x,z), 予約4要素。参照が欠けている項目はゼロになります。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub values: [f64; OBSERVATION_SIZE],
    pub frame: AgentFrame,
}

impl Observation {
    pub fn build(
        frame: AgentFrame,
        ball_position: Option<Vector3>,
        goal_position: Option<Vector3>,
        agent_velocity: Vector3,
        ball_velocity: Option<Vector3>,
    ) -> Self {
        let rel_ball = ball_position
            .map(|p| frame.inverse_transform_point(p))
            .unwrap_or(Vector3::ZERO);
        let rel_goal = goal_position
            .map(|p| frame.inverse_transform_point(p))
            .unwrap_or(Vector3::ZERO);
        let vel_self = frame.inverse_transform_direction(agent_velocity);
        let vel_ball = ball_velocity
            .map(|v| frame.inverse_transform_direction(v))
            .unwrap_or(Vector3::ZERO);

        let values = [
            rel_ball.x,
            rel_ball.z,
            rel_goal.x,
            rel_goal.z,
            vel_self.x,
            vel_self.z,
            vel_ball.x,
            vel_ball.z,
            RESERVED[0],
            RESERVED[1],
            RESERVED[2],
            RESERVED[3],
        ];

        Self { values, frame }
    }

    /// エージェントから見たボールの相対位置（ローカル水平面）
    pub fn relative_ball(&self) -> Vector3 {
        Vector3::planar(self.values[0], self.values[1])
    }

    /// エージェントから見たゴールの相対位置（ローカル水平面）
    pub fn relative_goal(&self) -> Vector3 {
        Vector3::planar(self.values[2], self.values[3])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
