use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::common::Vector3;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default_arena".to_string(),
            description: "組み込みの標準アリーナ".to_string(),
        }
    }
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    /// 1エピソードの最大ステップ数（0 で無制限）
    #[serde(default)]
    pub max_episode_steps: u64,
    /// 実時間に合わせてステップを待つか
    #[serde(default)]
    pub realtime: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_s: 0.02,
            t_max_s: 60.0,
            max_episode_steps: 0,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Position3D {
    pub x_m: f64,
    #[serde(default)]
    pub y_m: f64,
    pub z_m: f64,
}

impl Position3D {
    pub fn new(x_m: f64, y_m: f64, z_m: f64) -> Self {
        Self { x_m, y_m, z_m }
    }

    pub fn to_vector(&self) -> Vector3 {
        Vector3::new(self.x_m, self.y_m, self.z_m)
    }
}

/// アリーナの水平境界（この外に出たボールは領域外）
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct ArenaBounds {
    pub xmin_m: f64,
    pub xmax_m: f64,
    pub zmin_m: f64,
    pub zmax_m: f64,
}

impl ArenaBounds {
    pub fn contains(&self, point: &Vector3) -> bool {
        point.x >= self.xmin_m && point.x <= self.xmax_m && point.z >= self.zmin_m && point.z <= self.zmax_m
    }
}

fn default_goal_radius() -> f64 {
    1.5
}
fn default_ball_mass() -> f64 {
    1.0
}
fn default_ball_damping() -> f64 {
    0.6
}

/// アリーナ設定（シーンマーカーとボール物性）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArenaConfig {
    pub agent_start: Position3D,
    pub ball_start: Position3D,
    pub goal: Position3D,
    /// ゴール判定領域の水平半径
    #[serde(default = "default_goal_radius")]
    pub goal_radius_m: f64,
    pub bounds: ArenaBounds,
    #[serde(default = "default_ball_mass")]
    pub ball_mass_kg: f64,
    #[serde(default = "default_ball_damping")]
    pub ball_linear_damping: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            agent_start: Position3D::new(0.0, 0.0, -3.0),
            ball_start: Position3D::new(0.0, 0.0, 0.0),
            goal: Position3D::new(0.0, 0.0, 12.0),
            goal_radius_m: default_goal_radius(),
            bounds: ArenaBounds {
                xmin_m: -8.0,
                xmax_m: 8.0,
                zmin_m: -8.0,
                zmax_m: 14.0,
            },
            ball_mass_kg: default_ball_mass(),
            ball_linear_damping: default_ball_damping(),
        }
    }
}

/// 移動速度設定
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    pub idle_speed_mps: f64,
    pub walk_speed_mps: f64,
    pub run_speed_mps: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            idle_speed_mps: 0.0,
            walk_speed_mps: 2.0,
            run_speed_mps: 4.0,
        }
    }
}

/// ボール追従アシスト設定
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AssistConfig {
    /// この距離以下ではアシストなし
    pub start_dist_m: f64,
    /// この距離以上で最大重み
    pub full_dist_m: f64,
    pub max_weight: f64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            start_dist_m: 1.0,
            full_dist_m: 6.0,
            max_weight: 0.6,
        }
    }
}

/// キック設定
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct KickConfig {
    pub distance_m: f64,
    pub facing_dot: f64,
    pub cooldown_s: f64,
    /// 撃力の大きさ（N·s）
    pub force: f64,
}

impl Default for KickConfig {
    fn default() -> Self {
        Self {
            distance_m: 2.0,
            facing_dot: 0.7,
            cooldown_s: 0.5,
            force: 10.0,
        }
    }
}

/// 報酬設定
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RewardConfig {
    pub progress_weight: f64,
    pub proximity_weight: f64,
    pub time_penalty: f64,
    pub goal_reward: f64,
    pub out_of_bounds_penalty: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            progress_weight: 0.5,
            proximity_weight: 0.01,
            time_penalty: 0.001,
            goal_reward: 1.0,
            out_of_bounds_penalty: 1.0,
        }
    }
}

/// エピソード設定
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EpisodeConfig {
    /// ゴールでエピソードを終了する（学習用）
    pub end_episode_on_goal: bool,
    /// ゴールでボールのみ再配置する（フリープレイ用）
    pub respawn_ball_on_goal: bool,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            end_episode_on_goal: true,
            respawn_ball_on_goal: false,
        }
    }
}

/// ジェスチャーの供給元
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GestureSourceKind {
    /// UDPで分類器から受信
    #[default]
    Udp,
    /// シナリオ内のスケジュールを再生
    Script,
    /// 供給なし（常に Unknown）
    None,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct GestureScriptEntry {
    pub at_s: f64,
    pub code: i32,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_gesture_port() -> u16 {
    5066
}

/// ジェスチャー設定
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GestureConfig {
    #[serde(default)]
    pub source: GestureSourceKind,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_gesture_port")]
    pub port: u16,
    #[serde(default)]
    pub script: Vec<GestureScriptEntry>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            source: GestureSourceKind::default(),
            bind_addr: default_bind_addr(),
            port: default_gesture_port(),
            script: Vec::new(),
        }
    }
}

/// ヘッドレス実行で使う方策
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Chase,
    Idle,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct PolicyConfig {
    pub kind: PolicyKind,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub arena: ArenaConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub assist: AssistConfig,
    #[serde(default)]
    pub kick: KickConfig,
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub episode: EpisodeConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|e| ScenarioError::Parse(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列から読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig =
            serde_yaml::from_str(contents).map_err(|e| ScenarioError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let fail = |msg: String| Err(ScenarioError::Validation(msg));

        if !self.sim.dt_s.is_finite() || self.sim.dt_s <= 0.0 {
            return fail("dt_s must be a positive finite value".to_string());
        }
        if !self.sim.t_max_s.is_finite() || self.sim.t_max_s <= 0.0 {
            return fail("t_max_s must be a positive finite value".to_string());
        }

        let bounds = &self.arena.bounds;
        if bounds.xmin_m >= bounds.xmax_m || bounds.zmin_m >= bounds.zmax_m {
            return fail("Invalid arena bounds".to_string());
        }
        for (name, marker) in [
            ("agent_start", &self.arena.agent_start),
            ("ball_start", &self.arena.ball_start),
        ] {
            if !bounds.contains(&marker.to_vector()) {
                return fail(format!("{} outside arena bounds", name));
            }
        }
        if self.arena.goal_radius_m <= 0.0 {
            return fail("goal_radius_m must be positive".to_string());
        }
        if self.arena.ball_mass_kg <= 0.0 || self.arena.ball_linear_damping < 0.0 {
            return fail("Invalid ball physical properties".to_string());
        }

        let motion = &self.motion;
        if motion.idle_speed_mps < 0.0 || motion.walk_speed_mps < 0.0 || motion.run_speed_mps < 0.0 {
            return fail("Speeds must be non-negative".to_string());
        }

        if self.assist.start_dist_m >= self.assist.full_dist_m {
            return fail(format!(
                "assist.start_dist_m {} must be below assist.full_dist_m {}",
                self.assist.start_dist_m, self.assist.full_dist_m
            ));
        }
        if !(0.0..=1.0).contains(&self.assist.max_weight) {
            return fail("assist.max_weight must be within [0, 1]".to_string());
        }

        let kick = &self.kick;
        if !(-1.0..=1.0).contains(&kick.facing_dot) {
            return fail("kick.facing_dot must be within [-1, 1]".to_string());
        }
        if kick.distance_m < 0.0 || kick.cooldown_s < 0.0 || kick.force < 0.0 {
            return fail("kick distance, cooldown and force must be non-negative".to_string());
        }

        if self.gesture.source == GestureSourceKind::Script {
            for entry in &self.gesture.script {
                if entry.at_s < 0.0 {
                    return fail(format!("gesture script entry at {} s is negative", entry.at_s));
                }
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        if self.sim.max_episode_steps > 0 {
            println!("エピソード最大ステップ: {}", self.sim.max_episode_steps);
        } else {
            println!("エピソード最大ステップ: 無制限");
        }
        println!("実時間同期: {}", if self.sim.realtime { "有効" } else { "無効" });
        println!();

        println!("=== アリーナ ===");
        let a = &self.arena;
        println!("エージェント初期位置: ({:.2}, {:.2})", a.agent_start.x_m, a.agent_start.z_m);
        println!("ボール初期位置: ({:.2}, {:.2})", a.ball_start.x_m, a.ball_start.z_m);
        println!("ゴール: ({:.2}, {:.2}) 半径 {:.2}m", a.goal.x_m, a.goal.z_m, a.goal_radius_m);
        println!(
            "境界: x [{:.1}, {:.1}] z [{:.1}, {:.1}]",
            a.bounds.xmin_m, a.bounds.xmax_m, a.bounds.zmin_m, a.bounds.zmax_m
        );
        println!();

        println!("=== 制御パラメータ ===");
        println!(
            "速度: idle {:.1} / walk {:.1} / run {:.1} m/s",
            self.motion.idle_speed_mps, self.motion.walk_speed_mps, self.motion.run_speed_mps
        );
        println!(
            "アシスト: {:.1}m→{:.1}m で最大重み {:.2}",
            self.assist.start_dist_m, self.assist.full_dist_m, self.assist.max_weight
        );
        println!(
            "キック: 距離 {:.1}m / 内積 {:.2} / クールダウン {:.2}秒 / 力 {:.1}",
            self.kick.distance_m, self.kick.facing_dot, self.kick.cooldown_s, self.kick.force
        );
        println!();

        println!("=== ジェスチャー ===");
        match self.gesture.source {
            GestureSourceKind::Udp => println!("UDP受信: {}:{}", self.gesture.bind_addr, self.gesture.port),
            GestureSourceKind::Script => println!("スクリプト再生: {}件", self.gesture.script.len()),
            GestureSourceKind::None => println!("供給なし"),
        }
        println!("方策: {:?}", self.policy.kind);
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
meta:
  version: "1.0"
  name: minimal
  description: test
sim:
  dt_s: 0.02
  t_max_s: 10.0
arena:
  agent_start: { x_m: 0.0, z_m: -3.0 }
  ball_start: { x_m: 0.0, z_m: 0.0 }
  goal: { x_m: 0.0, z_m: 12.0 }
  bounds: { xmin_m: -8.0, xmax_m: 8.0, zmin_m: -8.0, zmax_m: 14.0 }
"#;

    #[test]
    fn test_minimal_scenario_uses_defaults() {
        let config = ScenarioConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.motion, MotionConfig::default());
        assert_eq!(config.kick, KickConfig::default());
        assert_eq!(config.gesture.port, 5066);
        assert_eq!(config.gesture.source, GestureSourceKind::Udp);
        assert_eq!(config.sim.max_episode_steps, 0);
        assert_eq!(config.arena.goal_radius_m, 1.5);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ScenarioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_assist_range() {
        let mut config = ScenarioConfig::default();
        config.assist.start_dist_m = 6.0;
        config.assist.full_dist_m = 1.0;
        assert!(matches!(config.validate(), Err(ScenarioError::Validation(_))));
    }

    #[test]
    fn test_rejects_start_outside_bounds() {
        let mut config = ScenarioConfig::default();
        config.arena.ball_start = Position3D::new(50.0, 0.0, 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_time_step() {
        for dt in [f64::NAN, f64::INFINITY, 0.0, -0.01] {
            let mut config = ScenarioConfig::default();
            config.sim.dt_s = dt;
            assert!(
                matches!(config.validate(), Err(ScenarioError::Validation(_))),
                "dt_s {} accepted",
                dt
            );
        }
        let mut config = ScenarioConfig::default();
        config.sim.t_max_s = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_io_and_parse_errors_name_the_file() {
        let err = ScenarioConfig::from_yaml_str("meta: [").unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_, _)));
        let message = err.to_string();
        assert!(message.starts_with("YAML解析エラー <inline>: "), "{}", message);

        let io = ScenarioError::Io(
            PathBuf::from("a.yaml"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(io.to_string(), "ファイル読み込みエラー a.yaml: denied");
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = ScenarioConfig::from_file("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_from_file_parses_gesture_script() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}gesture:\n  source: script\n  script:\n    - {{ at_s: 0.0, code: 1 }}\n    - {{ at_s: 2.5, code: 3 }}\n",
            MINIMAL
        )
        .unwrap();

        let config = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gesture.source, GestureSourceKind::Script);
        assert_eq!(config.gesture.script.len(), 2);
        assert_eq!(config.gesture.script[1], GestureScriptEntry { at_s: 2.5, code: 3 });
    }
}
