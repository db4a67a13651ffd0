//! # Gesture Channel モジュール
//!
//! ジェスチャー分類器からのUDPデータグラムを受信し、最新のジェスチャーコードを
//! [`GestureCell`] へ公開するバックグラウンド受信機能を提供します。
//!
//! 受信ループは専用の tokio ランタイム上で動作し、ティックループとは
//! 単一スロットのセルだけを共有します。ティックループ側がブロックすることはありません。
//!
//! ## ワイヤ形式
//!
//! - ペイロード先頭1バイトをジェスチャーコードとして解釈
//! - 定義外のコードは `Unknown(-1)` として公開
//! - 長さ0のデータグラムは破棄

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::gesture::{GestureCell, GestureCode};
use crate::models::traits::IGestureSource;

/// 受信バッファ長（先頭1バイトのみ使用）
const RECV_BUFFER_SIZE: usize = 64;

/// 受信エラー後に再試行するまでの待ち時間
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// 停止時にワーカースレッドの終了を待つ上限
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// ジェスチャーチャネルのエラー
#[derive(Debug, Error)]
pub enum GestureError {
    #[error("無効な受信アドレス: {0}")]
    InvalidAddress(String),

    #[error("受信ランタイムの起動に失敗しました: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("UDPソケットのバインドに失敗しました {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// UDPジェスチャー受信チャネル
///
/// `start` でソケットをバインドして受信ループを起動し、`stop`（または Drop）で
/// 停止シグナルを送って専用ランタイムを停止します。ソケットは受信ループが所有し、
/// ループ終了時にちょうど1回だけ閉じられます。
pub struct GestureChannel {
    cell: Arc<GestureCell>,
    local_addr: SocketAddr,
    shutdown: Option<watch::Sender<bool>>,
    runtime: Option<Runtime>,
}

impl GestureChannel {
    /// 全インターフェースの指定ポートで受信を開始
    pub fn start(port: u16) -> Result<Self, GestureError> {
        Self::start_on(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// アドレス文字列とポートから受信を開始
    pub fn bind(bind_addr: &str, port: u16) -> Result<Self, GestureError> {
        let ip: IpAddr = bind_addr
            .parse()
            .map_err(|_| GestureError::InvalidAddress(bind_addr.to_string()))?;
        Self::start_on(SocketAddr::new(ip, port))
    }

    /// 指定アドレスで受信を開始（ポート0ならエフェメラルポート）
    ///
    /// ホスト側が tokio ランタイム上で動作していても呼び出せます。
    pub fn start_on(addr: SocketAddr) -> Result<Self, GestureError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("gesture-rx")
            .enable_io()
            .enable_time()
            .build()
            .map_err(GestureError::Runtime)?;

        let std_socket = std::net::UdpSocket::bind(addr).map_err(|source| GestureError::Bind { addr, source })?;
        std_socket
            .set_nonblocking(true)
            .map_err(|source| GestureError::Bind { addr, source })?;
        let local_addr = std_socket
            .local_addr()
            .map_err(|source| GestureError::Bind { addr, source })?;

        let cell = Arc::new(GestureCell::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        {
            let _guard = runtime.enter();
            let socket = UdpSocket::from_std(std_socket).map_err(|source| GestureError::Bind { addr, source })?;
            runtime.spawn(receive_loop(socket, Arc::clone(&cell), shutdown_rx));
        }

        info!(addr = %local_addr, "GESTURE_CHANNEL_STARTED: ジェスチャー受信を開始しました");

        Ok(Self {
            cell,
            local_addr,
            shutdown: Some(shutdown_tx),
            runtime: Some(runtime),
        })
    }

    /// 最新のジェスチャーコード（ノンブロッキング）
    pub fn current_gesture(&self) -> i32 {
        self.cell.load()
    }

    /// コントローラーへ注入する読み出し側ハンドル
    pub fn source(&self) -> Arc<dyn IGestureSource> {
        self.cell.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// 受信ループを停止してソケットを解放（複数回呼んでもよい）
    ///
    /// 非同期コンテキスト外ではワーカーの終了（ソケットの解放）まで待ちます。
    /// 非同期コンテキスト内ではブロックできないため、終了を待たずに戻ります。
    pub fn stop(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        let _ = shutdown.send(true);

        if let Some(runtime) = self.runtime.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
            }
        }

        self.cell.publish(GestureCode::Unknown.code());
        info!(addr = %self.local_addr, "GESTURE_CHANNEL_STOPPED: ジェスチャー受信を停止しました");
    }
}

impl Drop for GestureChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 受信ループ
///
/// 受信のたびに停止シグナルと競合させるため、受信待ちの途中でも停止できます。
/// 1パケットの異常や一時的なソケットエラーではループを終了しません。
async fn receive_loop(socket: UdpSocket, cell: Arc<GestureCell>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((0, from)) => {
                    debug!(%from, "GESTURE_PACKET_DISCARDED: 空のデータグラムを破棄しました");
                }
                Ok((len, from)) => {
                    let gesture = GestureCode::from_wire(buf[0]);
                    let previous = cell.load();
                    cell.publish(gesture.code());
                    if previous != gesture.code() {
                        debug!(%from, len, raw = buf[0], gesture = ?gesture, "GESTURE_RECEIVED: ジェスチャーが変化しました");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "GESTURE_RECV_ERROR: 受信エラー、待ち受けを継続します");
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
            }
        }
    }

    debug!("GESTURE_LISTENER_EXITED: 受信ループを終了しました");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_before_any_packet() {
        let channel = GestureChannel::start_on("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_eq!(channel.current_gesture(), -1);
        assert_ne!(channel.local_addr().port(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut channel = GestureChannel::start_on("127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(channel.is_running());
        channel.stop();
        channel.stop();
        assert!(!channel.is_running());
        assert_eq!(channel.current_gesture(), -1);
    }

    #[tokio::test]
    async fn test_start_and_stop_within_runtime() {
        let mut channel = GestureChannel::start_on("127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(channel.is_running());
        channel.stop();
        assert_eq!(channel.current_gesture(), -1);
    }

    #[test]
    fn test_invalid_bind_address() {
        assert!(matches!(
            GestureChannel::bind("not-an-ip", 0),
            Err(GestureError::InvalidAddress(_))
        ));
    }
}
