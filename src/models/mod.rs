// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 物理・ジェスチャー・方策との境界インターフェース（trait）定義
pub mod traits;

// シーン参照と簡易剛体
pub mod body;
pub mod scene;

// 入出力
pub mod gesture;
pub mod observation;
pub mod policy;

// 制御コンポーネント（1ティック内の実行順）
pub mod arbiter;
pub mod steering;
pub mod kick;
pub mod reward;
pub mod episode;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use body::SimRigidBody;
pub use scene::Scene;
pub use gesture::{GestureCell, GestureCode, GestureScript};
pub use observation::{AgentFrame, Observation, OBSERVATION_SIZE};
pub use policy::{ChasePolicy, IdlePolicy, PolicyAction};
pub use arbiter::{AnimState, Arbiter, ArbiterDecision, BallFreeze, FreezeState};
pub use steering::{BallRelation, SteeringBlender, SteeringOutput};
pub use kick::{KickDecision, KickState, KickStateMachine, KickTimerState};
pub use reward::{RewardBreakdown, RewardShaper};
pub use episode::{EndCause, EpisodeEvent, EpisodeManager, EpisodeOutcome, EpisodePhase};
