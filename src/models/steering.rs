use crate::models::arbiter::{AnimState, ArbiterDecision};
use crate::models::common::{math_utils, Vector3, EPSILON};
use crate::models::gesture::GestureCode;
use crate::scenario::{AssistConfig, KickConfig, MotionConfig};

/// 移動方向を無視できるとみなす二乗長さ
pub const NEGLIGIBLE_SQR_MAGNITUDE: f64 = 1e-3;

/// エージェントとボールの水平面での位置関係
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallRelation {
    /// ボール方向の水平単位ベクトル（距離がほぼ0ならゼロ）
    pub to_ball: Vector3,
    /// 水平距離（m）
    pub distance: f64,
    /// 前方ベクトルとボール方向の内積（距離がほぼ0なら None）
    pub facing_dot: Option<f64>,
}

impl BallRelation {
    pub fn measure(agent_position: Vector3, facing: Vector3, ball_position: Vector3) -> Self {
        let offset = (ball_position - agent_position).flat();
        let distance = offset.magnitude();
        if distance <= EPSILON {
            return Self {
                to_ball: Vector3::ZERO,
                distance,
                facing_dot: None,
            };
        }

        let to_ball = offset * (1.0 / distance);
        let forward = facing.flat().normalized();
        let facing_dot = if forward.is_near_zero() {
            None
        } else {
            Some(forward.dot(&to_ball))
        };

        Self {
            to_ball,
            distance,
            facing_dot,
        }
    }

    /// キック可能な姿勢かどうか（距離と向き）
    pub fn in_kick_pose(&self, kick_distance: f64, kick_facing_dot: f64) -> bool {
        self.distance <= kick_distance && self.facing_dot.is_some_and(|d| d >= kick_facing_dot)
    }
}

/// 1ティック分の操舵結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringOutput {
    pub anim: AnimState,
    /// 最終移動方向（正規化前）
    pub direction: Vector3,
    pub speed: f64,
    pub position_delta: Vector3,
    pub facing: Vector3,
    pub moved: bool,
    /// 適用したアシスト重み
    pub assist_weight: f64,
    /// キック接近オーバーライドが働いたか
    pub kick_approach: bool,
}

/// 方策方向とボール追従方向のブレンダー
///
/// アシスト重みは距離に対して連続に変化し、`start_dist_m` で0、`full_dist_m` で `max_weight` に達します。
#[derive(Debug, Clone)]
pub struct SteeringBlender {
    assist_start_dist: f64,
    assist_full_dist: f64,
    assist_max_weight: f64,
    kick_distance: f64,
    kick_facing_dot: f64,
    run_speed: f64,
}

impl SteeringBlender {
    pub fn new(assist: &AssistConfig, kick: &KickConfig, motion: &MotionConfig) -> Self {
        Self {
            assist_start_dist: assist.start_dist_m,
            assist_full_dist: assist.full_dist_m,
            assist_max_weight: assist.max_weight,
            kick_distance: kick.distance_m,
            kick_facing_dot: kick.facing_dot,
            run_speed: motion.run_speed_mps,
        }
    }

    /// 距離に応じたアシスト重み（[0, max_weight]）
    pub fn blend_weight(&self, distance: f64) -> f64 {
        let t = math_utils::inverse_lerp(self.assist_start_dist, self.assist_full_dist, distance);
        math_utils::clamp01(t) * self.assist_max_weight
    }

    /// 調停結果・現在の向き・ボールとの関係から最終的な移動を決める
    pub fn steer(
        &self,
        decision: &ArbiterDecision,
        facing: Vector3,
        relation: Option<&BallRelation>,
        dt: f64,
    ) -> SteeringOutput {
        let mut direction = decision.rl_direction;
        let mut speed = decision.target_speed;
        let mut forced_facing = None;
        let mut assist_weight = 0.0;
        let mut kick_approach = false;

        if let Some(rel) = relation.filter(|r| !r.to_ball.is_near_zero()) {
            if matches!(decision.anim, AnimState::Walk | AnimState::Run) {
                assist_weight = self.blend_weight(rel.distance);
                direction = if direction.sqr_magnitude() <= NEGLIGIBLE_SQR_MAGNITUDE {
                    rel.to_ball
                } else {
                    math_utils::slerp_planar(direction, rel.to_ball, assist_weight)
                };
            }

            // キック保持中で姿勢が整っていなければ、ブレンドせずボールへ詰める
            if decision.gesture == GestureCode::Kick
                && !rel.in_kick_pose(self.kick_distance, self.kick_facing_dot)
            {
                direction = rel.to_ball;
                speed = speed.max(self.run_speed);
                forced_facing = Some(rel.to_ball);
                kick_approach = true;
            }
        }

        if direction.sqr_magnitude() <= NEGLIGIBLE_SQR_MAGNITUDE || speed <= 0.0 {
            return SteeringOutput {
                anim: decision.anim,
                direction,
                speed,
                position_delta: Vector3::ZERO,
                facing: forced_facing.unwrap_or(facing),
                moved: false,
                assist_weight,
                kick_approach,
            };
        }

        let heading = direction.normalized();
        SteeringOutput {
            anim: decision.anim,
            direction,
            speed,
            position_delta: heading * (speed * dt),
            facing: forced_facing.unwrap_or(heading),
            moved: true,
            assist_weight,
            kick_approach,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blender() -> SteeringBlender {
        SteeringBlender::new(&AssistConfig::default(), &KickConfig::default(), &MotionConfig::default())
    }

    fn decision(gesture: GestureCode, anim: AnimState, speed: f64, dir: Vector3) -> ArbiterDecision {
        ArbiterDecision {
            gesture,
            target_speed: speed,
            anim,
            rl_direction: dir,
        }
    }

    #[test]
    fn test_blend_weight_is_monotonic_and_clamped() {
        let b = blender();
        let cfg = AssistConfig::default();

        assert_eq!(b.blend_weight(cfg.start_dist_m - 0.5), 0.0);
        assert_eq!(b.blend_weight(0.0), 0.0);
        assert!((b.blend_weight(cfg.full_dist_m + 10.0) - cfg.max_weight).abs() < 1e-12);

        let mut prev = b.blend_weight(cfg.start_dist_m);
        let steps = 50;
        for i in 1..=steps {
            let d = cfg.start_dist_m + (cfg.full_dist_m - cfg.start_dist_m) * i as f64 / steps as f64;
            let w = b.blend_weight(d);
            assert!(w >= prev, "weight decreased at distance {d}");
            assert!((0.0..=cfg.max_weight).contains(&w));
            prev = w;
        }
    }

    #[test]
    fn test_ball_relation_guards_zero_distance() {
        let rel = BallRelation::measure(Vector3::planar(1.0, 1.0), Vector3::FORWARD, Vector3::new(1.0, 0.3, 1.0));
        assert_eq!(rel.to_ball, Vector3::ZERO);
        assert_eq!(rel.facing_dot, None);
        assert!(!rel.in_kick_pose(2.0, 0.7));
    }

    #[test]
    fn test_walk_blends_toward_ball() {
        let b = blender();
        let rel = BallRelation::measure(Vector3::ZERO, Vector3::FORWARD, Vector3::planar(10.0, 0.0));
        let d = decision(GestureCode::Walk, AnimState::Walk, 2.0, Vector3::planar(0.0, 1.0));
        let out = b.steer(&d, Vector3::FORWARD, Some(&rel), 0.1);

        assert!(out.moved);
        assert!((out.assist_weight - AssistConfig::default().max_weight).abs() < 1e-12);
        // 方策方向(+z)とボール方向(+x)の間
        assert!(out.position_delta.x > 0.0 && out.position_delta.z > 0.0);
        assert!((out.position_delta.magnitude() - 0.2).abs() < 1e-9);
        assert!((out.facing.magnitude() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_policy_direction_uses_ball_direction() {
        let b = blender();
        let rel = BallRelation::measure(Vector3::ZERO, Vector3::FORWARD, Vector3::planar(-3.0, 0.0));
        let d = decision(GestureCode::Run, AnimState::Run, 4.0, Vector3::ZERO);
        let out = b.steer(&d, Vector3::FORWARD, Some(&rel), 0.5);

        assert!((out.position_delta - Vector3::planar(-2.0, 0.0)).magnitude() < 1e-9);
    }

    #[test]
    fn test_idle_does_not_move_but_reports_anim() {
        let b = blender();
        let rel = BallRelation::measure(Vector3::ZERO, Vector3::FORWARD, Vector3::planar(0.0, 5.0));
        let d = decision(GestureCode::Idle, AnimState::Idle, 0.0, Vector3::planar(1.0, 0.0));
        let out = b.steer(&d, Vector3::FORWARD, Some(&rel), 0.1);

        assert!(!out.moved);
        assert_eq!(out.anim, AnimState::Idle);
        assert_eq!(out.position_delta, Vector3::ZERO);
        assert_eq!(out.facing, Vector3::FORWARD);
        assert_eq!(out.assist_weight, 0.0);
    }

    #[test]
    fn test_kick_override_closes_gap_at_run_speed() {
        let b = blender();
        // ボールは真後ろ5m：距離も向きも条件外
        let rel = BallRelation::measure(Vector3::ZERO, Vector3::FORWARD, Vector3::planar(0.0, -5.0));
        let d = decision(GestureCode::Kick, AnimState::Walk, 2.0, Vector3::planar(1.0, 0.0));
        let out = b.steer(&d, Vector3::FORWARD, Some(&rel), 0.1);

        assert!(out.kick_approach);
        assert_eq!(out.speed, MotionConfig::default().run_speed_mps);
        assert!((out.position_delta - Vector3::planar(0.0, -0.4)).magnitude() < 1e-9);
        assert_eq!(out.facing, Vector3::planar(0.0, -1.0));
    }

    #[test]
    fn test_kick_in_pose_keeps_blended_motion() {
        let b = blender();
        let rel = BallRelation::measure(Vector3::ZERO, Vector3::FORWARD, Vector3::planar(0.0, 0.5));
        let d = decision(GestureCode::Kick, AnimState::Walk, 2.0, Vector3::ZERO);
        let out = b.steer(&d, Vector3::FORWARD, Some(&rel), 0.1);

        assert!(!out.kick_approach);
        assert_eq!(out.speed, 2.0);
    }

    #[test]
    fn test_missing_ball_uses_policy_direction_only() {
        let b = blender();
        let d = decision(GestureCode::Walk, AnimState::Walk, 2.0, Vector3::planar(0.0, -1.0));
        let out = b.steer(&d, Vector3::FORWARD, None, 1.0);

        assert_eq!(out.position_delta, Vector3::planar(0.0, -2.0));
        assert_eq!(out.facing, Vector3::planar(0.0, -1.0));
    }
}
