//! # Controller モジュール
//!
//! ジェスチャーと方策の2系統の入力からエージェントを動かすハイブリッド制御器です。
//!
//! 1ティック内の実行順は常に固定です:
//!
//! 1. 保留中の終了イベントを消費（終了ならリセットして終了ティックを返す）
//! 2. ジェスチャーを1回だけ読み出す
//! 3. 調停（Arbiter）→ 操舵（SteeringBlender）→ キック（KickStateMachine）→ 報酬（RewardShaper）
//! 4. ステップ上限の確認
//!
//! ホスト（エンジン、テスト、ヘッドレスシミュレーション）は `tick` と `reset` を
//! 明示的に呼び出します。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::arbiter::{AnimState, Arbiter};
use crate::models::common::Vector3;
use crate::models::episode::{EndCause, EpisodeEvent, EpisodeManager, EpisodeOutcome, EpisodePhase};
use crate::models::gesture::GestureCode;
use crate::models::kick::{KickDecision, KickStateMachine, KickTimerState};
use crate::models::observation::{AgentFrame, Observation};
use crate::models::policy::PolicyAction;
use crate::models::reward::RewardShaper;
use crate::models::scene::Scene;
use crate::models::steering::{BallRelation, SteeringBlender};
use crate::models::traits::{BodyConstraints, IGestureSource};
use crate::scenario::ScenarioConfig;

/// 訓練ハーネスへ渡すエピソード信号
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeSignal {
    Running,
    Ended { cause: EndCause, terminal_reward: f64 },
}

impl EpisodeSignal {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EpisodeSignal::Ended { .. })
    }
}

/// 1ティック分の出力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    /// アニメーターへ渡す整数コード
    pub anim_code: i32,
    pub anim: AnimState,
    pub agent_position: Vector3,
    pub facing: Vector3,
    pub position_delta: Vector3,
    /// 整形報酬、または終了ティックでは終端報酬
    pub reward: f64,
    pub signal: EpisodeSignal,
    pub kicked: bool,
    /// このティックで採用したジェスチャーコード
    pub gesture: i32,
}

/// ハイブリッド制御器
pub struct HybridController {
    gesture_source: Arc<dyn IGestureSource>,
    arbiter: Arbiter,
    steering: SteeringBlender,
    kick: KickStateMachine,
    reward: RewardShaper,
    episode: EpisodeManager,
    kick_force: f64,
    facing: Vector3,
    clock: f64,
    initialized: bool,
}

impl HybridController {
    /// 新しい制御器を作成
    ///
    /// # 引数
    ///
    /// * `config` - シナリオ設定（motion/assist/kick/reward/episode/sim を参照）
    /// * `gesture_source` - ジェスチャーの読み出し側ハンドル
    pub fn new(config: &ScenarioConfig, gesture_source: Arc<dyn IGestureSource>) -> Self {
        Self {
            gesture_source,
            arbiter: Arbiter::new(&config.motion),
            steering: SteeringBlender::new(&config.assist, &config.kick, &config.motion),
            kick: KickStateMachine::new(&config.kick),
            reward: RewardShaper::new(&config.reward),
            episode: EpisodeManager::new(&config.episode, &config.reward, config.sim.max_episode_steps),
            kick_force: config.kick.force,
            facing: Vector3::FORWARD,
            clock: 0.0,
            initialized: false,
        }
    }

    /// エピソード開始時のリセット
    ///
    /// 参照の再解決、エージェントとボールの再配置、速度ゼロ化、拘束解除、
    /// 基準距離の再計算、キックタイマーと凍結状態の初期化を行います。
    pub fn reset(&mut self, scene: &mut Scene) {
        scene.resolve_missing();

        if let Some(start) = scene.agent_start {
            scene.agent.set_position(start);
        }
        scene.agent.set_velocity(Vector3::ZERO);
        scene.agent.set_angular_velocity(Vector3::ZERO);
        self.facing = Vector3::FORWARD;

        let ball_start = scene.ball_start;
        match scene.ball_mut() {
            Some(ball) => {
                if let Some(start) = ball_start {
                    ball.set_position(start);
                }
                ball.set_constraints(BodyConstraints::Free);
                ball.set_velocity(Vector3::ZERO);
                ball.set_angular_velocity(Vector3::ZERO);
            }
            None => warn!("EPISODE_RESET: ボール参照がありません"),
        }

        self.reward.rebase(scene.ball_to_goal_distance());
        self.kick.reset();
        self.arbiter.reset();
        self.episode.complete_reset();
        self.initialized = true;

        info!(
            episode = self.episode.episode_index(),
            agent = ?scene.agent.position(),
            ball = ?scene.ball_position(),
            baseline = ?self.reward.baseline(),
            "EPISODE_RESET: エピソードを開始しました"
        );
    }

    /// 当たり判定からの終了イベントを受け付ける（次のティックで消費）
    pub fn raise(&mut self, event: EpisodeEvent) {
        self.episode.raise(event);
    }

    /// 1ティック分の制御
    pub fn tick(&mut self, dt: f64, action: &PolicyAction, scene: &mut Scene) -> TickOutput {
        if !self.initialized {
            self.reset(scene);
            return self.still_output(scene, 0.0, EpisodeSignal::Running, GestureCode::Unknown.code());
        }

        if let Some(outcome) = self.episode.take_outcome() {
            match outcome {
                EpisodeOutcome::Terminate { cause, terminal_reward } => {
                    self.end_episode(cause, terminal_reward, scene);
                    return self.still_output(
                        scene,
                        terminal_reward,
                        EpisodeSignal::Ended { cause, terminal_reward },
                        GestureCode::Unknown.code(),
                    );
                }
                EpisodeOutcome::RespawnBall => self.respawn_ball(scene),
                EpisodeOutcome::Ignore => debug!("GOAL_IGNORED: フリープレイのためゴールを無視しました"),
            }
        }

        // このティックで観測するジェスチャーは1回の読み出しに固定
        let gesture = self.gesture_source.current_gesture();
        self.clock += dt;
        let now = self.clock;

        let decision = self.arbiter.decide(gesture, action, scene.ball_mut());

        let agent_before = scene.agent.position();
        let relation_before = scene
            .ball_position()
            .map(|ball| BallRelation::measure(agent_before, self.facing, ball));
        let steer = self.steering.steer(&decision, self.facing, relation_before.as_ref(), dt);

        if steer.moved {
            scene.agent.set_position(agent_before + steer.position_delta);
            scene.agent.set_velocity(steer.direction.normalized() * steer.speed);
        } else {
            scene.agent.set_velocity(Vector3::ZERO);
        }
        if !steer.facing.is_near_zero() {
            self.facing = steer.facing.flat().normalized();
        }

        let agent_after = scene.agent.position();
        let relation_after = scene
            .ball_position()
            .map(|ball| BallRelation::measure(agent_after, self.facing, ball));
        let impulse = scene.kick_impulse(self.kick_force);
        let kick_active = decision.gesture == GestureCode::Kick;
        let kicked = match self.kick.update(kick_active, relation_after.as_ref(), now, impulse.is_some()) {
            KickDecision::Fire => self.fire_kick(scene, impulse, relation_after.as_ref(), now),
            KickDecision::Hold => false,
        };

        let agent_to_ball = scene.ball_position().map(|ball| ball.distance(&agent_after));
        let breakdown = self.reward.shape(scene.ball_to_goal_distance(), agent_to_ball);

        let mut output = TickOutput {
            anim_code: steer.anim.code(),
            anim: steer.anim,
            agent_position: agent_after,
            facing: self.facing,
            position_delta: steer.position_delta,
            reward: breakdown.total(),
            signal: EpisodeSignal::Running,
            kicked,
            gesture,
        };

        if let Some(EpisodeOutcome::Terminate { cause, terminal_reward }) = self.episode.record_step() {
            self.end_episode(cause, terminal_reward, scene);
            output.signal = EpisodeSignal::Ended { cause, terminal_reward };
        }

        output
    }

    /// 現在のシーンからエージェント座標系の観測を作る
    pub fn observe(&self, scene: &Scene) -> Observation {
        let frame = AgentFrame::new(scene.agent.position(), self.facing);
        Observation::build(
            frame,
            scene.ball_position(),
            scene.goal,
            scene.agent.velocity(),
            scene.ball_velocity(),
        )
    }

    pub fn facing(&self) -> Vector3 {
        self.facing
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn episode_index(&self) -> u64 {
        self.episode.episode_index()
    }

    pub fn episode_steps(&self) -> u64 {
        self.episode.steps()
    }

    pub fn episode_phase(&self) -> EpisodePhase {
        self.episode.phase()
    }

    pub fn reward_baseline(&self) -> Option<f64> {
        self.reward.baseline()
    }

    pub fn kick_timer(&self) -> KickTimerState {
        self.kick.timer_state()
    }

    pub fn is_ball_frozen(&self) -> bool {
        self.arbiter.is_ball_frozen()
    }

    fn fire_kick(
        &mut self,
        scene: &mut Scene,
        impulse: Option<Vector3>,
        relation: Option<&BallRelation>,
        now: f64,
    ) -> bool {
        let Some(impulse) = impulse else {
            return false;
        };
        self.arbiter.release_ball(scene.ball_mut());
        let Some(ball) = scene.ball_mut() else {
            return false;
        };
        ball.add_impulse(impulse);

        info!(
            now,
            impulse = ?impulse,
            distance = relation.map(|r| r.distance),
            facing_dot = relation.and_then(|r| r.facing_dot),
            "KICK_FIRED: ボールをゴール方向へ蹴りました"
        );
        true
    }

    fn end_episode(&mut self, cause: EndCause, terminal_reward: f64, scene: &mut Scene) {
        info!(
            episode = self.episode.episode_index(),
            steps = self.episode.steps(),
            cause = ?cause,
            terminal_reward,
            "EPISODE_END: エピソードを終了しました"
        );
        self.episode.begin_termination(cause);
        self.reset(scene);
    }

    fn respawn_ball(&mut self, scene: &mut Scene) {
        let ball_start = scene.ball_start;
        if let (Some(ball), Some(start)) = (scene.ball_mut(), ball_start) {
            ball.set_constraints(BodyConstraints::Free);
            ball.set_position(start);
            ball.set_velocity(Vector3::ZERO);
            ball.set_angular_velocity(Vector3::ZERO);
        }
        self.arbiter.reset();
        self.reward.rebase(scene.ball_to_goal_distance());
        info!(ball = ?scene.ball_position(), "BALL_RESPAWNED: ボールを初期位置へ戻しました");
    }

    fn still_output(&self, scene: &Scene, reward: f64, signal: EpisodeSignal, gesture: i32) -> TickOutput {
        TickOutput {
            anim_code: AnimState::Idle.code(),
            anim: AnimState::Idle,
            agent_position: scene.agent.position(),
            facing: self.facing,
            position_delta: Vector3::ZERO,
            reward,
            signal,
            kicked: false,
            gesture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::body::SimRigidBody;
    use crate::models::gesture::GestureCell;

    fn scene() -> Scene {
        Scene::new(Box::new(SimRigidBody::new(Vector3::planar(0.0, -3.0))))
            .with_ball(Box::new(SimRigidBody::new(Vector3::ZERO)))
            .with_goal(Vector3::planar(0.0, 10.0))
            .with_starts(Vector3::planar(0.0, -3.0), Vector3::ZERO)
    }

    fn controller(cell: &Arc<GestureCell>) -> HybridController {
        let source: Arc<dyn IGestureSource> = cell.clone();
        HybridController::new(&ScenarioConfig::default(), source)
    }

    #[test]
    fn test_first_tick_resets_without_motion() {
        let cell = Arc::new(GestureCell::new());
        let mut c = controller(&cell);
        let mut s = scene();
        cell.publish(2);

        let out = c.tick(0.02, &PolicyAction::new(1.0, 0.0, 0.0), &mut s);
        assert_eq!(out.reward, 0.0);
        assert_eq!(out.position_delta, Vector3::ZERO);
        assert_eq!(out.signal, EpisodeSignal::Running);
        assert_eq!(c.reward_baseline(), Some(10.0));
    }

    #[test]
    fn test_gesture_sets_speed_and_policy_sets_direction() {
        let cell = Arc::new(GestureCell::new());
        let mut c = controller(&cell);
        let mut s = scene();
        c.reset(&mut s);

        cell.publish(GestureCode::Run.code());
        let out = c.tick(0.1, &PolicyAction::new(0.0, 1.0, 0.0), &mut s);
        assert_eq!(out.anim, AnimState::Run);
        assert_eq!(out.anim_code, 2);
        assert_eq!(out.gesture, 2);
        // ボールは真正面なのでブレンド後も +z
        assert!((out.position_delta - Vector3::planar(0.0, 0.4)).magnitude() < 1e-9);
        assert!((out.agent_position - Vector3::planar(0.0, -2.6)).magnitude() < 1e-9);
    }

    #[test]
    fn test_idle_gesture_freezes_ball_and_holds_agent() {
        let cell = Arc::new(GestureCell::new());
        let mut c = controller(&cell);
        let mut s = scene();
        c.reset(&mut s);

        cell.publish(GestureCode::Idle.code());
        let out = c.tick(0.1, &PolicyAction::new(1.0, 0.0, 0.0), &mut s);
        assert_eq!(out.anim, AnimState::Idle);
        assert_eq!(out.position_delta, Vector3::ZERO);
        assert!(c.is_ball_frozen());

        cell.publish(GestureCode::Walk.code());
        c.tick(0.1, &PolicyAction::new(1.0, 0.0, 0.0), &mut s);
        assert!(!c.is_ball_frozen());
    }

    #[test]
    fn test_kick_gesture_approaches_then_fires_once() {
        let cell = Arc::new(GestureCell::new());
        let mut c = controller(&cell);
        let mut s = scene();
        c.reset(&mut s);

        cell.publish(GestureCode::Kick.code());
        let mut fired = 0;
        for _ in 0..100 {
            let out = c.tick(0.05, &PolicyAction::default(), &mut s);
            if out.kicked {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(s.ball_velocity().unwrap().z > 0.0);
    }

    #[test]
    fn test_kick_never_fires_without_goal() {
        let cell = Arc::new(GestureCell::new());
        let mut c = controller(&cell);
        let mut s = Scene::new(Box::new(SimRigidBody::new(Vector3::planar(0.0, -0.5))))
            .with_ball(Box::new(SimRigidBody::new(Vector3::ZERO)));
        c.reset(&mut s);

        cell.publish(GestureCode::Kick.code());
        for _ in 0..20 {
            assert!(!c.tick(0.05, &PolicyAction::default(), &mut s).kicked);
        }
        assert!(c.kick_timer().pending_kick);
    }

    #[test]
    fn test_observation_is_agent_local() {
        let cell = Arc::new(GestureCell::new());
        let mut c = controller(&cell);
        let mut s = scene();
        c.reset(&mut s);

        let obs = c.observe(&s);
        assert!((obs.relative_ball() - Vector3::planar(0.0, 3.0)).magnitude() < 1e-9);
        assert!((obs.relative_goal() - Vector3::planar(0.0, 13.0)).magnitude() < 1e-9);
        assert_eq!(&obs.values[8..], &[0.0, 0.0, 0.0, 1.0]);
    }
}
