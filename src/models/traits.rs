use crate::models::common::Vector3;
use crate::models::observation::Observation;
use crate::models::policy::PolicyAction;

/// 剛体の拘束モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyConstraints {
    /// 拘束なし
    #[default]
    Free,
    /// 水平移動と回転を固定
    LockedHorizontalAndRotation,
}

/// 物理エンジン側の剛体インターフェース
///
/// コントローラーはこのインターフェースを通じてのみ物理状態を読み書きします。
pub trait IRigidBody: Send {
    /// 現在位置の取得
    fn position(&self) -> Vector3;

    /// 位置の設定（テレポート）
    fn set_position(&mut self, position: Vector3);

    /// 現在速度の取得
    fn velocity(&self) -> Vector3;

    /// 速度の設定
    fn set_velocity(&mut self, velocity: Vector3);

    /// 角速度の設定
    fn set_angular_velocity(&mut self, angular_velocity: Vector3);

    /// 拘束モードの取得
    fn constraints(&self) -> BodyConstraints;

    /// 拘束モードの設定
    fn set_constraints(&mut self, constraints: BodyConstraints);

    /// 撃力の印加（方向×大きさ）
    fn add_impulse(&mut self, impulse: Vector3);

    /// 1ティック分の積分
    ///
    /// 外部の物理エンジンが積分する剛体では何もしません。
    fn integrate(&mut self, _dt: f64) {}
}

/// ジェスチャー信号の読み出し側インターフェース
///
/// 実装はブロックせずに最新のジェスチャーコードを返す必要があります。
pub trait IGestureSource: Send + Sync {
    /// 最新のジェスチャーコード（未受信時は -1）
    fn current_gesture(&self) -> i32;
}

/// シーン参照の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMarker {
    Goal,
    AgentStart,
    BallStart,
}

/// 未設定のシーン参照を解決するインターフェース
pub trait ISceneResolver: Send {
    /// マーカー位置の検索
    fn find_marker(&self, marker: SceneMarker) -> Option<Vector3>;

    /// ボール剛体の検索
    fn find_ball(&mut self) -> Option<Box<dyn IRigidBody>>;
}

/// 方策（行動の供給元）インターフェース
pub trait IPolicy {
    /// 観測から1ティック分の行動を決定
    fn act(&mut self, observation: &Observation) -> PolicyAction;
}
