use tracing::{debug, warn};

use crate::models::common::Vector3;
use crate::models::traits::{IRigidBody, ISceneResolver, SceneMarker};

/// コントローラーが操作するシーン参照一式
///
/// エージェント剛体以外はすべて欠けていてもよく、欠けた参照に依存する処理は
/// スキップされます。未設定の参照はリセット時にリゾルバーから再解決されます。
pub struct Scene {
    pub agent: Box<dyn IRigidBody>,
    pub ball: Option<Box<dyn IRigidBody>>,
    pub goal: Option<Vector3>,
    pub agent_start: Option<Vector3>,
    pub ball_start: Option<Vector3>,
    resolver: Option<Box<dyn ISceneResolver>>,
}

impl Scene {
    pub fn new(agent: Box<dyn IRigidBody>) -> Self {
        Self {
            agent,
            ball: None,
            goal: None,
            agent_start: None,
            ball_start: None,
            resolver: None,
        }
    }

    pub fn with_ball(mut self, ball: Box<dyn IRigidBody>) -> Self {
        self.ball = Some(ball);
        self
    }

    pub fn with_goal(mut self, goal: Vector3) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_starts(mut self, agent_start: Vector3, ball_start: Vector3) -> Self {
        self.agent_start = Some(agent_start);
        self.ball_start = Some(ball_start);
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ISceneResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 未設定の参照をリゾルバーから補完
    pub fn resolve_missing(&mut self) {
        let Some(resolver) = self.resolver.as_mut() else {
            return;
        };

        if self.ball.is_none() {
            self.ball = resolver.find_ball();
            debug!(found = self.ball.is_some(), "SCENE_RESOLVE: ボール参照を再解決しました");
        }
        for (slot, marker) in [
            (&mut self.goal, SceneMarker::Goal),
            (&mut self.agent_start, SceneMarker::AgentStart),
            (&mut self.ball_start, SceneMarker::BallStart),
        ] {
            if slot.is_none() {
                *slot = resolver.find_marker(marker);
                if slot.is_none() {
                    warn!(marker = ?marker, "SCENE_RESOLVE: シーン参照が見つかりません");
                }
            }
        }
    }

    pub fn ball_position(&self) -> Option<Vector3> {
        self.ball.as_ref().map(|b| b.position())
    }

    pub fn ball_velocity(&self) -> Option<Vector3> {
        self.ball.as_ref().map(|b| b.velocity())
    }

    pub fn ball_mut(&mut self) -> Option<&mut (dyn IRigidBody + 'static)> {
        self.ball.as_deref_mut()
    }

    /// ボールとゴール間の距離（どちらかが欠けていれば None）
    pub fn ball_to_goal_distance(&self) -> Option<f64> {
        Some(self.ball_position()?.distance(&self.goal?))
    }

    /// キック撃力（ボール→ゴール方向の水平単位ベクトル×力）
    ///
    /// ボールかゴールが欠けている、またはボールがゴール直上にある場合は None。
    pub fn kick_impulse(&self, force: f64) -> Option<Vector3> {
        let ball = self.ball_position()?;
        let goal = self.goal?;
        let flat_goal = Vector3::new(goal.x, ball.y, goal.z);
        let dir = (flat_goal - ball).normalized();
        if dir.is_near_zero() {
            return None;
        }
        Some(dir * force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::body::SimRigidBody;

    struct FixedResolver;

    impl ISceneResolver for FixedResolver {
        fn find_marker(&self, marker: SceneMarker) -> Option<Vector3> {
            match marker {
                SceneMarker::Goal => Some(Vector3::planar(0.0, 20.0)),
                SceneMarker::AgentStart => Some(Vector3::planar(0.0, -2.0)),
                SceneMarker::BallStart => None,
            }
        }

        fn find_ball(&mut self) -> Option<Box<dyn IRigidBody>> {
            Some(Box::new(SimRigidBody::new(Vector3::planar(0.0, 1.0))))
        }
    }

    #[test]
    fn test_resolve_missing_fills_only_unset_references() {
        let mut scene = Scene::new(Box::new(SimRigidBody::new(Vector3::ZERO)))
            .with_goal(Vector3::planar(5.0, 5.0))
            .with_resolver(Box::new(FixedResolver));
        scene.resolve_missing();

        assert_eq!(scene.goal, Some(Vector3::planar(5.0, 5.0)));
        assert_eq!(scene.agent_start, Some(Vector3::planar(0.0, -2.0)));
        assert_eq!(scene.ball_start, None);
        assert_eq!(scene.ball_position(), Some(Vector3::planar(0.0, 1.0)));
    }

    #[test]
    fn test_kick_impulse_is_planar_toward_goal() {
        let scene = Scene::new(Box::new(SimRigidBody::new(Vector3::ZERO)))
            .with_ball(Box::new(SimRigidBody::new(Vector3::new(3.0, 0.5, 0.0))))
            .with_goal(Vector3::new(3.0, 2.0, 10.0));
        let impulse = scene.kick_impulse(10.0).unwrap();

        assert!(impulse.x.abs() < 1e-12);
        assert!(impulse.y.abs() < 1e-12);
        assert!((impulse.z - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_kick_impulse_requires_ball_and_goal() {
        let scene = Scene::new(Box::new(SimRigidBody::new(Vector3::ZERO)))
            .with_goal(Vector3::planar(0.0, 10.0));
        assert!(scene.kick_impulse(10.0).is_none());
        assert!(scene.ball_to_goal_distance().is_none());
    }
}
