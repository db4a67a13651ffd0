use std::sync::atomic::{AtomicI32, Ordering};

use crate::models::traits::IGestureSource;

/// ジェスチャー分類器から届くコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureCode {
    /// 握りこぶし
    Idle,
    /// 開いた手のひら
    Walk,
    /// 指2本
    Run,
    Kick,
    Lose,
    /// 手が検出されていない、または定義外のコード
    Unknown,
}

impl GestureCode {
    /// 整数コードから変換（定義外の値は Unknown）
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => GestureCode::Idle,
            1 => GestureCode::Walk,
            2 => GestureCode::Run,
            3 => GestureCode::Kick,
            4 => GestureCode::Lose,
            _ => GestureCode::Unknown,
        }
    }

    /// UDPペイロードの先頭バイトから変換
    pub fn from_wire(byte: u8) -> Self {
        Self::from_code(i32::from(byte))
    }

    pub fn code(&self) -> i32 {
        match self {
            GestureCode::Idle => 0,
            GestureCode::Walk => 1,
            GestureCode::Run => 2,
            GestureCode::Kick => 3,
            GestureCode::Lose => 4,
            GestureCode::Unknown => -1,
        }
    }
}

/// 最新ジェスチャーを保持する単一スロットのセル
///
/// 書き込みは受信ループ1本のみ、読み出しはティックループから行います。
/// 値は `AtomicI32` 1語に収まるため、読み手が新旧の混ざった値を観測することはありません。
/// Release で書き込み Acquire で読み出すので、読み手は確定済みの値のどれかを必ず観測し、
/// ロックもブロッキングも発生しません。古い値はキューせず上書きします。
#[derive(Debug)]
pub struct GestureCell {
    code: AtomicI32,
}

impl GestureCell {
    pub fn new() -> Self {
        Self {
            code: AtomicI32::new(GestureCode::Unknown.code()),
        }
    }

    /// 最新値を公開（後勝ち）
    pub fn publish(&self, code: i32) {
        self.code.store(code, Ordering::Release);
    }

    pub fn load(&self) -> i32 {
        self.code.load(Ordering::Acquire)
    }
}

impl Default for GestureCell {
    fn default() -> Self {
        Self::new()
    }
}

impl IGestureSource for GestureCell {
    fn current_gesture(&self) -> i32 {
        self.load()
    }
}

/// 時刻指定でジェスチャーを公開するスクリプト
///
/// 分類器なしのヘッドレス実行で使います。エントリは時刻順に並べ替えて保持します。
#[derive(Debug, Clone)]
pub struct GestureScript {
    entries: Vec<(f64, i32)>,
    next: usize,
}

impl GestureScript {
    pub fn new(mut entries: Vec<(f64, i32)>) -> Self {
        entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { entries, next: 0 }
    }

    /// `now` までに到来したエントリをセルへ公開し、公開した最後のコードを返す
    pub fn advance(&mut self, now: f64, cell: &GestureCell) -> Option<i32> {
        let mut published = None;
        while let Some(&(at, code)) = self.entries.get(self.next) {
            if at > now {
                break;
            }
            cell.publish(code);
            published = Some(code);
            self.next += 1;
        }
        published
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_outside_enumeration_are_unknown() {
        for code in [-7, -1, 5, 42, i32::MAX] {
            assert_eq!(GestureCode::from_code(code), GestureCode::Unknown);
        }
        assert_eq!(GestureCode::from_wire(255), GestureCode::Unknown);
        assert_eq!(GestureCode::from_wire(3), GestureCode::Kick);
    }

    #[test]
    fn test_cell_defaults_to_unknown() {
        let cell = GestureCell::new();
        assert_eq!(cell.current_gesture(), -1);
    }

    #[test]
    fn test_publish_then_read_returns_value() {
        let cell = GestureCell::new();
        for g in [0, 1, 2, 3, 4, -1] {
            cell.publish(g);
            assert_eq!(cell.current_gesture(), g);
        }
    }

    #[test]
    fn test_concurrent_reader_only_sees_published_values() {
        use std::sync::Arc;
        use std::thread;

        let cell = Arc::new(GestureCell::new());
        let writer_cell = Arc::clone(&cell);
        let writer = thread::spawn(move || {
            for i in 0..10_000 {
                writer_cell.publish(i % 5);
            }
        });

        for _ in 0..10_000 {
            let g = cell.current_gesture();
            assert!((-1..=4).contains(&g));
        }
        writer.join().unwrap();
        assert_eq!(cell.current_gesture(), 9_999 % 5);
    }

    #[test]
    fn test_script_publishes_due_entries_in_order() {
        let cell = GestureCell::new();
        let mut script = GestureScript::new(vec![(2.0, 3), (0.0, 1), (1.0, 2)]);

        assert_eq!(script.advance(0.5, &cell), Some(1));
        assert_eq!(cell.load(), 1);
        assert_eq!(script.advance(0.9, &cell), None);
        assert_eq!(script.advance(2.5, &cell), Some(3));
        assert_eq!(cell.load(), 3);
        assert!(script.is_finished());
    }
}
