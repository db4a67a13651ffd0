//! # kittysim
//!
//! ジェスチャー分類器と強化学習方策の2系統で仮想ペットを操作し、
//! ボールをゴールへ蹴り込ませるハイブリッド制御層です。
//!
//! - [`controller`]: 1ティック単位の制御器（調停・操舵・キック・報酬・エピソード管理）
//! - [`gesture_channel`]: UDPでジェスチャーコードを受信するバックグラウンドチャネル
//! - [`simulation`]: 制御器をヘッドレスで回すシミュレーションエンジン
//! - [`scenario`]: YAMLシナリオ設定
//! - [`models`]: 制御コンポーネントと境界インターフェース

pub mod controller;
pub mod gesture_channel;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;

pub use controller::{EpisodeSignal, HybridController, TickOutput};
pub use gesture_channel::{GestureChannel, GestureError};
pub use scenario::{ScenarioConfig, ScenarioError};
pub use simulation::{EpisodeStats, SimulationEngine, SimulationError};
