use tracing::debug;

use crate::scenario::{EpisodeConfig, RewardConfig};

/// 外部の当たり判定から通知される終了イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeEvent {
    /// ボールがゴール判定領域に入った
    Goal,
    /// ボールが境界面に接触した
    OutOfBounds,
}

/// エピソード終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndCause {
    Goal,
    OutOfBounds,
    /// 最大ステップ数に到達
    Truncated,
}

/// エピソードの状態
///
/// `Terminating` はリセット処理中だけ保持される1ティックのパルスで、
/// ティックの外から観測されることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    Running,
    Terminating(EndCause),
}

/// 保留イベントの処理結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeOutcome {
    /// エピソードを終了してリセット
    Terminate { cause: EndCause, terminal_reward: f64 },
    /// ボールのみ初期位置へ戻してエピソード継続（フリープレイ）
    RespawnBall,
    /// 何もしない
    Ignore,
}

/// エピソードライフサイクル管理
///
/// 同一ティック内に複数の接触イベントが届いても終了は1回にまとめます。
/// ゴールと領域外が同時に届いた場合はゴールを優先します。
#[derive(Debug, Clone)]
pub struct EpisodeManager {
    phase: EpisodePhase,
    pending: Option<EpisodeEvent>,
    episode_index: u64,
    steps: u64,
    max_steps: u64,
    end_on_goal: bool,
    respawn_on_goal: bool,
    goal_reward: f64,
    out_of_bounds_penalty: f64,
}

impl EpisodeManager {
    pub fn new(episode: &EpisodeConfig, reward: &RewardConfig, max_steps: u64) -> Self {
        Self {
            phase: EpisodePhase::Running,
            pending: None,
            episode_index: 0,
            steps: 0,
            max_steps,
            end_on_goal: episode.end_episode_on_goal,
            respawn_on_goal: episode.respawn_ball_on_goal,
            goal_reward: reward.goal_reward,
            out_of_bounds_penalty: reward.out_of_bounds_penalty,
        }
    }

    /// 接触イベントを受け付ける（次のティック開始時に1回だけ消費）
    pub fn raise(&mut self, event: EpisodeEvent) {
        let merged = match (self.pending, event) {
            (Some(EpisodeEvent::Goal), _) | (_, EpisodeEvent::Goal) => EpisodeEvent::Goal,
            _ => EpisodeEvent::OutOfBounds,
        };
        if self.pending.is_some() {
            debug!(pending = ?self.pending, incoming = ?event, merged = ?merged, "EPISODE_EVENT_MERGED: 同一ティックの終了イベントをまとめました");
        }
        self.pending = Some(merged);
    }

    /// 保留イベントを取り出して処理結果に変換
    pub fn take_outcome(&mut self) -> Option<EpisodeOutcome> {
        let outcome = match self.pending.take()? {
            EpisodeEvent::Goal if self.end_on_goal => EpisodeOutcome::Terminate {
                cause: EndCause::Goal,
                terminal_reward: self.goal_reward,
            },
            EpisodeEvent::Goal if self.respawn_on_goal => EpisodeOutcome::RespawnBall,
            EpisodeEvent::Goal => EpisodeOutcome::Ignore,
            EpisodeEvent::OutOfBounds => EpisodeOutcome::Terminate {
                cause: EndCause::OutOfBounds,
                terminal_reward: -self.out_of_bounds_penalty,
            },
        };
        Some(outcome)
    }

    /// ステップを数え、上限到達なら打ち切りを返す
    pub fn record_step(&mut self) -> Option<EpisodeOutcome> {
        self.steps += 1;
        if self.max_steps > 0 && self.steps >= self.max_steps {
            return Some(EpisodeOutcome::Terminate {
                cause: EndCause::Truncated,
                terminal_reward: 0.0,
            });
        }
        None
    }

    pub fn begin_termination(&mut self, cause: EndCause) {
        self.phase = EpisodePhase::Terminating(cause);
    }

    /// リセット完了（新しいエピソードを Running で開始）
    pub fn complete_reset(&mut self) {
        if matches!(self.phase, EpisodePhase::Terminating(_)) {
            self.episode_index += 1;
        }
        self.phase = EpisodePhase::Running;
        self.pending = None;
        self.steps = 0;
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn episode_index(&self) -> u64 {
        self.episode_index
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
