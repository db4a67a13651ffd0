use tracing::debug;

use crate::models::steering::BallRelation;
use crate::scenario::KickConfig;

/// キック状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KickState {
    /// ジェスチャー非アクティブ
    #[default]
    Idle,
    /// ジェスチャーが新たにアクティブになり、まだ発動していない
    ArmedPending,
    /// 今回のアクティブ区間で発動済み
    Cooldown,
}

/// キックタイマーの状態スナップショット
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickTimerState {
    pub last_kick_time: f64,
    pub pending_kick: bool,
    pub kick_gesture_was_active_last_tick: bool,
}

/// 1ティック分の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickDecision {
    /// 何もしない
    Hold,
    /// 撃力を与える
    Fire,
}

/// キック状態機械
///
/// 遷移表:
///
/// | 入力 | 遷移 |
/// |---|---|
/// | ジェスチャー 非アクティブ→アクティブ | → ArmedPending |
/// | ジェスチャー 非アクティブ | → Idle（保留解除） |
/// | ArmedPending かつ発動可能 | 発動 → Cooldown |
/// | ArmedPending かつ発動不可 | 保留のまま |
/// | Cooldown かつアクティブ継続 | Cooldown のまま（再発動なし） |
///
/// 発動可能条件は「距離 ≤ kick_distance」「内積 ≥ kick_facing_dot」「前回発動から cooldown 経過」
/// 「ボール・ゴール参照あり」のすべてです。アクティブ区間1つにつき撃力は最大1回です。
#[derive(Debug, Clone)]
pub struct KickStateMachine {
    state: KickState,
    last_kick_time: f64,
    was_active: bool,
    kick_distance: f64,
    kick_facing_dot: f64,
    cooldown: f64,
}

impl KickStateMachine {
    pub fn new(config: &KickConfig) -> Self {
        Self {
            state: KickState::Idle,
            last_kick_time: f64::NEG_INFINITY,
            was_active: false,
            kick_distance: config.distance_m,
            kick_facing_dot: config.facing_dot,
            cooldown: config.cooldown_s,
        }
    }

    pub fn state(&self) -> KickState {
        self.state
    }

    pub fn timer_state(&self) -> KickTimerState {
        KickTimerState {
            last_kick_time: self.last_kick_time,
            pending_kick: self.state == KickState::ArmedPending,
            kick_gesture_was_active_last_tick: self.was_active,
        }
    }

    /// 発動条件を満たしているか
    pub fn is_eligible(&self, relation: Option<&BallRelation>, now: f64, references_ready: bool) -> bool {
        references_ready
            && relation.is_some_and(|r| r.in_kick_pose(self.kick_distance, self.kick_facing_dot))
            && now - self.last_kick_time >= self.cooldown
    }

    /// 1ティック分の更新
    ///
    /// `references_ready` はボール剛体とゴールが揃っている場合のみ true を渡します。
    pub fn update(
        &mut self,
        kick_active: bool,
        relation: Option<&BallRelation>,
        now: f64,
        references_ready: bool,
    ) -> KickDecision {
        let rising_edge = kick_active && !self.was_active;
        self.was_active = kick_active;

        if !kick_active {
            self.state = KickState::Idle;
            return KickDecision::Hold;
        }
        if rising_edge {
            self.state = KickState::ArmedPending;
            debug!(now, "KICK_ARMED: キックジェスチャーを検出しました");
        }

        if self.state == KickState::ArmedPending && self.is_eligible(relation, now, references_ready) {
            self.last_kick_time = now;
            self.state = KickState::Cooldown;
            return KickDecision::Fire;
        }
        KickDecision::Hold
    }

    /// エピソード開始時の初期化
    pub fn reset(&mut self) {
        self.state = KickState::Idle;
        self.last_kick_time = f64::NEG_INFINITY;
        self.was_active = false;
    }
}
