use crate::models::common::Vector3;
use crate::models::observation::Observation;
use crate::models::traits::IPolicy;

/// 方策から受け取る連続値の行動
///
/// `kick` チャンネルは受け取るが、ハイブリッド制御ではキックをジェスチャーのみで
/// 判断するため参照しません。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolicyAction {
    pub move_x: f64,
    pub move_z: f64,
    pub kick: f64,
}

impl PolicyAction {
    pub fn new(move_x: f64, move_z: f64, kick: f64) -> Self {
        Self { move_x, move_z, kick }
    }

    /// 連続値ベクトル（先頭3要素）から作成
    pub fn from_continuous(values: &[f64]) -> Self {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Self::new(at(0), at(1), at(2))
    }

    /// 移動方向（各成分を [-1, 1] に制限し、長さ1を超えれば正規化）
    ///
    /// 有限値でない成分は0として扱います。
    pub fn direction(&self) -> Vector3 {
        let sanitize = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        let dir = Vector3::planar(sanitize(self.move_x), sanitize(self.move_z));
        if dir.magnitude() > 1.0 {
            dir.normalized()
        } else {
            dir
        }
    }
}

/// 常に静止する方策
#[derive(Debug, Default)]
pub struct IdlePolicy;

impl IPolicy for IdlePolicy {
    fn act(&mut self, _observation: &Observation) -> PolicyAction {
        PolicyAction::default()
    }
}

/// ボールへ向かう簡易方策
///
/// 学習済み方策の代わりにヘッドレス実行で使います。
/// 観測のローカル座標をワールド方向へ戻して移動方向とします。
#[derive(Debug)]
pub struct ChasePolicy {
    /// この距離以内では移動しない（m）
    pub stop_distance: f64,
}

impl Default for ChasePolicy {
    fn default() -> Self {
        Self { stop_distance: 0.3 }
    }
}

impl IPolicy for ChasePolicy {
    fn act(&mut self, observation: &Observation) -> PolicyAction {
        let local = observation.relative_ball();
        if local.magnitude() <= self.stop_distance {
            return PolicyAction::default();
        }
        let world = observation.frame.transform_direction(local).normalized();
        PolicyAction::new(world.x, world.z, 0.0)
    }
}
