//! # Simulation モジュール
//!
//! ハイブリッド制御器をヘッドレスで動かすシミュレーションエンジンを提供します。
//!
//! 描画エンジンや学習ハーネスの代わりに、固定時間刻み（Δt）のループで
//! 観測→方策→制御→ボール物理→当たり判定を回します。
//!
//! ## シミュレーション処理順序
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **ジェスチャー供給**: スクリプトの到来分を公開（UDPは受信スレッドが随時公開）
//! 2. **観測・方策**: エージェント座標系の観測から移動方向を決定
//! 3. **制御ティック**: 調停、操舵、キック、報酬、エピソード管理
//! 4. **ボール物理**: 減衰付きの積分（拘束を考慮）
//! 5. **当たり判定**: ゴール領域・境界の接触を終了イベントとして通知
//! 6. **統計**: エピソード数、ゴール数、キック数、累積報酬を集計
//!
//! ## 使用例
//!
//! ```no_run
//! use kittysim::scenario::ScenarioConfig;
//! use kittysim::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/kitty_arena.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! engine.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::controller::{EpisodeSignal, HybridController, TickOutput};
use crate::gesture_channel::{GestureChannel, GestureError};
use crate::models::*;
use crate::scenario::*;

/// シミュレーション実行エラー
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("シミュレーションエンジンが初期化されていません")]
    NotInitialized,

    #[error(transparent)]
    Gesture(#[from] GestureError),
}

/// シナリオのアリーナ設定からシーン参照を解決
pub struct ArenaResolver {
    arena: ArenaConfig,
}

impl ArenaResolver {
    pub fn new(arena: ArenaConfig) -> Self {
        Self { arena }
    }
}

impl ISceneResolver for ArenaResolver {
    fn find_marker(&self, marker: SceneMarker) -> Option<Vector3> {
        let position = match marker {
            SceneMarker::Goal => &self.arena.goal,
            SceneMarker::AgentStart => &self.arena.agent_start,
            SceneMarker::BallStart => &self.arena.ball_start,
        };
        Some(position.to_vector())
    }

    fn find_ball(&mut self) -> Option<Box<dyn IRigidBody>> {
        let ball = SimRigidBody::new(self.arena.ball_start.to_vector())
            .with_mass(self.arena.ball_mass_kg)
            .with_damping(self.arena.ball_linear_damping);
        Some(Box::new(ball))
    }
}

/// ゴール領域と境界の当たり判定
///
/// 接触は「外→内」の変化時にだけ通知します。同じ接触が続いても再通知しません。
#[derive(Debug, Clone)]
pub struct ContactDetector {
    goal: Vector3,
    goal_radius: f64,
    bounds: ArenaBounds,
    was_in_goal: bool,
    was_out_of_bounds: bool,
}

impl ContactDetector {
    pub fn new(arena: &ArenaConfig) -> Self {
        Self {
            goal: arena.goal.to_vector(),
            goal_radius: arena.goal_radius_m,
            bounds: arena.bounds,
            was_in_goal: false,
            was_out_of_bounds: false,
        }
    }

    pub fn detect(&mut self, ball: Vector3) -> Vec<EpisodeEvent> {
        let in_goal = ball.distance_xz(&self.goal) <= self.goal_radius;
        let out_of_bounds = !self.bounds.contains(&ball);

        let mut events = Vec::new();
        if in_goal && !self.was_in_goal {
            events.push(EpisodeEvent::Goal);
        }
        if out_of_bounds && !self.was_out_of_bounds {
            events.push(EpisodeEvent::OutOfBounds);
        }

        self.was_in_goal = in_goal;
        self.was_out_of_bounds = out_of_bounds;
        events
    }
}

/// 実行統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeStats {
    /// 終了したエピソード数
    pub episodes: u64,
    pub goals: u64,
    pub out_of_bounds: u64,
    pub truncations: u64,
    /// ゴール領域への進入回数（フリープレイで終了しないものも含む）
    pub goal_contacts: u64,
    pub kicks: u64,
    pub cumulative_reward: f64,
}

impl EpisodeStats {
    pub fn record(&mut self, output: &TickOutput) {
        self.cumulative_reward += output.reward;
        if output.kicked {
            self.kicks += 1;
        }
        if let EpisodeSignal::Ended { cause, .. } = output.signal {
            self.episodes += 1;
            match cause {
                EndCause::Goal => self.goals += 1,
                EndCause::OutOfBounds => self.out_of_bounds += 1,
                EndCause::Truncated => self.truncations += 1,
            }
        }
    }
}

/// ジェスチャーの供給元
enum GestureFeed {
    Udp(GestureChannel),
    Script { cell: Arc<GestureCell>, script: GestureScript },
    Disabled(Arc<GestureCell>),
}

impl GestureFeed {
    fn build(config: &GestureConfig) -> Result<Self, GestureError> {
        let feed = match config.source {
            GestureSourceKind::Udp => GestureFeed::Udp(GestureChannel::bind(&config.bind_addr, config.port)?),
            GestureSourceKind::Script => GestureFeed::Script {
                cell: Arc::new(GestureCell::new()),
                script: GestureScript::new(config.script.iter().map(|e| (e.at_s, e.code)).collect()),
            },
            GestureSourceKind::None => GestureFeed::Disabled(Arc::new(GestureCell::new())),
        };
        Ok(feed)
    }

    fn source(&self) -> Arc<dyn IGestureSource> {
        match self {
            GestureFeed::Udp(channel) => channel.source(),
            GestureFeed::Script { cell, .. } => cell.clone(),
            GestureFeed::Disabled(cell) => cell.clone(),
        }
    }

    fn advance(&mut self, now: f64) {
        if let GestureFeed::Script { cell, script } = self {
            if let Some(code) = script.advance(now, cell) {
                debug!(now, code, "GESTURE_SCRIPTED: スクリプトのジェスチャーを公開しました");
            }
        }
    }

    fn stop(&mut self) {
        if let GestureFeed::Udp(channel) = self {
            channel.stop();
        }
    }
}

fn build_policy(kind: PolicyKind) -> Box<dyn IPolicy> {
    match kind {
        PolicyKind::Chase => Box::new(ChasePolicy::default()),
        PolicyKind::Idle => Box::new(IdlePolicy),
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,
    pub realtime: bool,

    pub scene: Scene,
    pub stats: EpisodeStats,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,

    controller: Option<HybridController>,
    feed: Option<GestureFeed>,
    policy: Box<dyn IPolicy>,
    contacts: ContactDetector,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let agent = SimRigidBody::new(scenario.arena.agent_start.to_vector());
        let scene = Scene::new(Box::new(agent))
            .with_resolver(Box::new(ArenaResolver::new(scenario.arena.clone())));

        Self {
            current_time: 0.0,
            dt: scenario.sim.dt_s,
            max_time: scenario.sim.t_max_s,
            step_count: 0,
            realtime: scenario.sim.realtime,
            scene,
            stats: EpisodeStats::default(),
            policy: build_policy(scenario.policy.kind),
            contacts: ContactDetector::new(&scenario.arena),
            controller: None,
            feed: None,
            scenario_config: scenario,
            verbose_level,
        }
    }

    /// ジェスチャー供給の起動、制御器の作成、最初のエピソードのリセット
    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        let feed = GestureFeed::build(&self.scenario_config.gesture)?;
        let mut controller = HybridController::new(&self.scenario_config, feed.source());
        controller.reset(&mut self.scene);

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  ジェスチャー供給: {:?}", self.scenario_config.gesture.source);
            info!("  方策: {:?}", self.scenario_config.policy.kind);
            info!("  ボール: {:?}", self.scene.ball_position());
            info!("  ゴール: {:?}", self.scene.goal);
        }

        self.feed = Some(feed);
        self.controller = Some(controller);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.controller.is_some()
    }

    pub fn controller(&self) -> Option<&HybridController> {
        self.controller.as_ref()
    }

    /// `t_max_s` まで実行し、統計を返す
    ///
    /// 正常終了・エラーのどちらでもジェスチャー受信は停止します。
    pub fn run(&mut self) -> Result<EpisodeStats, SimulationError> {
        if !self.is_initialized() {
            self.initialize()?;
        }

        info!("=== シミュレーション実行開始 ===");
        let result = self.run_loop();
        self.shutdown();
        result?;

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);
        info!(
            episodes = self.stats.episodes,
            goals = self.stats.goals,
            out_of_bounds = self.stats.out_of_bounds,
            truncations = self.stats.truncations,
            kicks = self.stats.kicks,
            cumulative_reward = self.stats.cumulative_reward,
            "SIMULATION_SUMMARY: 実行統計"
        );

        Ok(self.stats.clone())
    }

    fn run_loop(&mut self) -> Result<(), SimulationError> {
        while self.current_time < self.max_time {
            let started = Instant::now();
            self.step()?;

            if self.verbose_level > 2 {
                trace!("時刻: {:.2}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 500 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!("進行状況: {:.1}% ({:.1}/{:.1}秒)", progress, self.current_time, self.max_time);
            }

            if self.realtime {
                let budget = Duration::from_secs_f64(self.dt);
                if let Some(remaining) = budget.checked_sub(started.elapsed()) {
                    thread::sleep(remaining);
                }
            }
        }
        Ok(())
    }

    /// 1ステップ分の処理
    pub fn step(&mut self) -> Result<TickOutput, SimulationError> {
        let (Some(controller), Some(feed)) = (self.controller.as_mut(), self.feed.as_mut()) else {
            return Err(SimulationError::NotInitialized);
        };

        feed.advance(self.current_time);

        let observation = controller.observe(&self.scene);
        let action = self.policy.act(&observation);
        let output = controller.tick(self.dt, &action, &mut self.scene);

        if let Some(ball) = self.scene.ball.as_mut() {
            ball.integrate(self.dt);
        }

        if let Some(ball) = self.scene.ball_position() {
            for event in self.contacts.detect(ball) {
                if event == EpisodeEvent::Goal {
                    self.stats.goal_contacts += 1;
                }
                debug!(event = ?event, ball = ?ball, "CONTACT_DETECTED: 接触イベントを通知します");
                controller.raise(event);
            }
        }

        self.stats.record(&output);
        if self.verbose_level > 1 && output.signal.is_terminal() {
            debug!("エピソード終了: {:?} (時刻 {:.2}秒)", output.signal, self.current_time);
        }

        self.current_time += self.dt;
        self.step_count += 1;
        Ok(output)
    }

    /// ジェスチャー受信の停止（複数回呼んでもよい）
    pub fn shutdown(&mut self) {
        if let Some(feed) = self.feed.as_mut() {
            feed.stop();
        }
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(script: Vec<GestureScriptEntry>) -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.gesture.source = GestureSourceKind::Script;
        config.gesture.script = script;
        config.sim.t_max_s = 5.0;
        config
    }

    #[test]
    fn test_step_requires_initialize() {
        let mut engine = SimulationEngine::new(scripted(Vec::new()), 0);
        assert!(matches!(engine.step(), Err(SimulationError::NotInitialized)));
    }

    #[test]
    fn test_initialize_resolves_scene_from_arena() {
        let config = scripted(Vec::new());
        let arena = config.arena.clone();
        let mut engine = SimulationEngine::new(config, 0);
        engine.initialize().unwrap();

        assert_eq!(engine.scene.goal, Some(arena.goal.to_vector()));
        assert_eq!(engine.scene.ball_position(), Some(arena.ball_start.to_vector()));
        assert_eq!(engine.scene.agent.position(), arena.agent_start.to_vector());
    }

    #[test]
    fn test_contact_detector_reports_entry_once() {
        let mut detector = ContactDetector::new(&ArenaConfig::default());
        let goal = ArenaConfig::default().goal.to_vector();

        assert_eq!(detector.detect(goal), vec![EpisodeEvent::Goal]);
        assert!(detector.detect(goal).is_empty());
        assert!(detector.detect(Vector3::ZERO).is_empty());
        assert_eq!(detector.detect(Vector3::planar(100.0, 0.0)), vec![EpisodeEvent::OutOfBounds]);
    }

    #[test]
    fn test_stats_record_terminal_signals() {
        let mut stats = EpisodeStats::default();
        let mut output = TickOutput {
            anim_code: 0,
            anim: AnimState::Idle,
            agent_position: Vector3::ZERO,
            facing: Vector3::FORWARD,
            position_delta: Vector3::ZERO,
            reward: 1.0,
            signal: EpisodeSignal::Ended {
                cause: EndCause::Goal,
                terminal_reward: 1.0,
            },
            kicked: false,
            gesture: -1,
        };
        stats.record(&output);
        output.signal = EpisodeSignal::Running;
        output.reward = -0.25;
        output.kicked = true;
        stats.record(&output);

        assert_eq!(stats.episodes, 1);
        assert_eq!(stats.goals, 1);
        assert_eq!(stats.kicks, 1);
        assert!((stats.cumulative_reward - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_scripted_run_walks_and_kicks() {
        let config = scripted(vec![
            GestureScriptEntry { at_s: 0.0, code: 1 },
            GestureScriptEntry { at_s: 1.0, code: 3 },
        ]);
        let mut engine = SimulationEngine::new(config, 0);
        let stats = engine.run().unwrap();

        assert!(stats.kicks >= 1);
        assert!((250..=251).contains(&engine.step_count));
    }
}
