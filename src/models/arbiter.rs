use tracing::{debug, info};

use crate::models::common::Vector3;
use crate::models::gesture::GestureCode;
use crate::models::policy::PolicyAction;
use crate::models::traits::{BodyConstraints, IRigidBody};
use crate::scenario::MotionConfig;

/// アニメーション状態（描画側へ毎ティック整数コードで渡す）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimState {
    Idle,
    Walk,
    Run,
    Lose,
}

impl AnimState {
    /// アニメーターへ渡す整数コード（ジェスチャーコードと揃えている）
    pub fn code(&self) -> i32 {
        match self {
            AnimState::Idle => 0,
            AnimState::Walk => 1,
            AnimState::Run => 2,
            AnimState::Lose => 4,
        }
    }

    /// ボールを凍結する状態かどうか
    pub fn holds_ball(&self) -> bool {
        matches!(self, AnimState::Idle | AnimState::Lose)
    }
}

/// ボールの凍結状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeState {
    #[default]
    Free,
    Frozen,
}

/// ボール凍結の2状態機械
///
/// | 現在 \ 要求 | Free | Frozen |
/// |---|---|---|
/// | Free | 何もしない | 速度ゼロ化 + 水平・回転拘束 |
/// | Frozen | 拘束解除 | 何もしない |
///
/// 同じ状態への再遷移では物理書き込みを行いません。
#[derive(Debug, Default)]
pub struct BallFreeze {
    state: FreezeState,
}

impl BallFreeze {
    pub fn is_frozen(&self) -> bool {
        self.state == FreezeState::Frozen
    }

    /// 凍結状態を要求する
    ///
    /// 遷移が発生した場合は true を返します。ボールが無い場合も状態だけは遷移します。
    pub fn request<B: IRigidBody + ?Sized>(&mut self, frozen: bool, ball: Option<&mut B>) -> bool {
        let target = if frozen { FreezeState::Frozen } else { FreezeState::Free };
        if self.state == target {
            return false;
        }
        self.state = target;

        if let Some(ball) = ball {
            match target {
                FreezeState::Frozen => {
                    ball.set_velocity(Vector3::ZERO);
                    ball.set_angular_velocity(Vector3::ZERO);
                    ball.set_constraints(BodyConstraints::LockedHorizontalAndRotation);
                    debug!(position = ?ball.position(), "BALL_FROZEN: ボールを凍結しました");
                }
                FreezeState::Free => {
                    ball.set_constraints(BodyConstraints::Free);
                    debug!(position = ?ball.position(), "BALL_RELEASED: ボールの凍結を解除しました");
                }
            }
        }
        true
    }

    /// エピソード開始時の初期化（物理書き込みはリセット処理側で行う）
    pub fn reset(&mut self) {
        self.state = FreezeState::Free;
    }
}

/// 調停結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterDecision {
    /// このティックで採用したジェスチャー
    pub gesture: GestureCode,
    /// 目標速度（m/s）
    pub target_speed: f64,
    /// 目標アニメーション状態
    pub anim: AnimState,
    /// 方策が指示した移動方向（制限・正規化済み）
    pub rl_direction: Vector3,
}

/// ジェスチャー／方策の調停器
///
/// 方向（どこへ）は常に方策が、速度と移動可否（どれだけ速く）はジェスチャーが決めます。
#[derive(Debug)]
pub struct Arbiter {
    idle_speed: f64,
    walk_speed: f64,
    run_speed: f64,
    freeze: BallFreeze,
}

impl Arbiter {
    pub fn new(motion: &MotionConfig) -> Self {
        Self {
            idle_speed: motion.idle_speed_mps,
            walk_speed: motion.walk_speed_mps,
            run_speed: motion.run_speed_mps,
            freeze: BallFreeze::default(),
        }
    }

    /// ジェスチャーコード→(目標速度, アニメーション状態)
    ///
    /// Kick・Unknown・定義外のコードは安全側の Walk に倒します。
    pub fn map_gesture(&self, code: i32) -> (f64, AnimState) {
        match GestureCode::from_code(code) {
            GestureCode::Idle => (self.idle_speed, AnimState::Idle),
            GestureCode::Walk => (self.walk_speed, AnimState::Walk),
            GestureCode::Run => (self.run_speed, AnimState::Run),
            GestureCode::Lose => (0.0, AnimState::Lose),
            GestureCode::Kick | GestureCode::Unknown => (self.walk_speed, AnimState::Walk),
        }
    }

    /// 1ティック分の調停
    ///
    /// 副作用として、Idle/Lose への遷移でボールを凍結し、そこから抜けると解除します。
    pub fn decide<B: IRigidBody + ?Sized>(
        &mut self,
        code: i32,
        action: &PolicyAction,
        ball: Option<&mut B>,
    ) -> ArbiterDecision {
        let (target_speed, anim) = self.map_gesture(code);
        let gesture = GestureCode::from_code(code);

        if self.freeze.request(anim.holds_ball(), ball) {
            info!(
                gesture = ?gesture,
                anim = ?anim,
                frozen = self.freeze.is_frozen(),
                "BALL_HOLD_CHANGED: ジェスチャーによりボールの凍結状態が切り替わりました"
            );
        }

        ArbiterDecision {
            gesture,
            target_speed,
            anim,
            rl_direction: action.direction(),
        }
    }

    /// キック時などにボールの凍結を解除
    pub fn release_ball<B: IRigidBody + ?Sized>(&mut self, ball: Option<&mut B>) -> bool {
        self.freeze.request(false, ball)
    }

    pub fn is_ball_frozen(&self) -> bool {
        self.freeze.is_frozen()
    }

    pub fn reset(&mut self) {
        self.freeze.reset();
    }
}
