use crate::scenario::RewardConfig;

/// 1ティック分の報酬内訳
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardBreakdown {
    /// ゴールへの前進項（prev_dist - dist に係数を掛けたもの）
    pub progress: f64,
    /// ボールへの近接項（負）
    pub proximity: f64,
    /// 時間ペナルティ（負）
    pub time: f64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        self.progress + self.proximity + self.time
    }
}

/// 密な報酬整形
///
/// `reward = w_p * (prev_dist - dist) - w_b * dist_to_ball - c` を毎ティック計算し、
/// 直後に `prev_dist = dist` へ更新します。ボールかゴールが欠けている場合は
/// 距離に依存する項を省略します。
#[derive(Debug, Clone)]
pub struct RewardShaper {
    progress_weight: f64,
    proximity_weight: f64,
    time_penalty: f64,
    prev_ball_to_goal: Option<f64>,
}

impl RewardShaper {
    pub fn new(config: &RewardConfig) -> Self {
        Self {
            progress_weight: config.progress_weight,
            proximity_weight: config.proximity_weight,
            time_penalty: config.time_penalty,
            prev_ball_to_goal: None,
        }
    }

    /// エピソード開始時の基準距離を設定
    pub fn rebase(&mut self, ball_to_goal: Option<f64>) {
        self.prev_ball_to_goal = ball_to_goal;
    }

    pub fn baseline(&self) -> Option<f64> {
        self.prev_ball_to_goal
    }

    /// 1ティック分の報酬を計算し、基準距離を更新
    pub fn shape(&mut self, ball_to_goal: Option<f64>, agent_to_ball: Option<f64>) -> RewardBreakdown {
        let progress = match (self.prev_ball_to_goal, ball_to_goal) {
            (Some(prev), Some(dist)) => self.progress_weight * (prev - dist),
            _ => 0.0,
        };
        let proximity = agent_to_ball.map_or(0.0, |d| -self.proximity_weight * d);

        if ball_to_goal.is_some() {
            self.prev_ball_to_goal = ball_to_goal;
        }

        RewardBreakdown {
            progress,
            proximity,
            time: -self.time_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shaping_formula() {
        let mut shaper = RewardShaper::new(&RewardConfig::default());
        shaper.rebase(Some(10.0));

        let r = shaper.shape(Some(8.0), Some(3.0));
        assert!((r.progress - 1.0).abs() < 1e-12);
        assert!((r.proximity + 0.03).abs() < 1e-12);
        assert!((r.time + 0.001).abs() < 1e-12);
        assert!((r.total() - 0.969).abs() < 1e-12);
        assert_eq!(shaper.baseline(), Some(8.0));
    }

    #[test]
    fn test_progress_is_zero_right_after_rebase() {
        let mut shaper = RewardShaper::new(&RewardConfig::default());
        shaper.rebase(Some(7.25));
        let r = shaper.shape(Some(7.25), Some(1.0));
        assert_eq!(r.progress, 0.0);
    }

    #[test]
    fn test_missing_references_skip_distance_terms() {
        let mut shaper = RewardShaper::new(&RewardConfig::default());
        shaper.rebase(None);
        let r = shaper.shape(None, None);
        assert_eq!(r.progress, 0.0);
        assert_eq!(r.proximity, 0.0);
        assert!((r.total() + 0.001).abs() < 1e-12);
    }
}
