use std::path::Path;

use clap::{Arg, ArgAction, Command};
use kittysim::logging::{init_logging, level_for_verbosity, parse_log_level, LogConfig, LogOutput};
use kittysim::scenario::{GestureSourceKind, ScenarioConfig};
use kittysim::simulation::SimulationEngine;

const SCENARIO_DIR: &str = "scenarios";

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("kittysim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("ジェスチャー＋強化学習 ハイブリッド制御シミュレーター")
        .long_about("仮想ペットがボールをゴールへ運ぶ制御層をヘッドレスで実行します。\n\
                     ジェスチャーはUDP受信・スクリプト再生・なしから選択できます。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .help("ジェスチャー受信ポート（指定するとUDP受信に切り替え）"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("ログレベル (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ"),
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let base_level = matches
        .get_one::<String>("log-level")
        .map(|s| parse_log_level(s))
        .unwrap_or(tracing::Level::INFO);
    let log_config = LogConfig {
        level: level_for_verbosity(base_level, verbose_level),
        output: matches
            .get_one::<LogOutput>("log-output")
            .copied()
            .unwrap_or(LogOutput::Console),
        log_dir: matches
            .get_one::<String>("log-dir")
            .cloned()
            .unwrap_or_else(|| "logs".to_string()),
        ..LogConfig::default()
    };

    let _log_guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    println!("ハイブリッド制御シミュレーター - kittysim v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    let Some(scenario_path) = matches.get_one::<String>("scenario") else {
        show_default_help();
        return;
    };

    let port = matches.get_one::<u16>("port").copied();
    if let Err(e) = run_scenario(scenario_path, matches.get_flag("info"), port, verbose_level) {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
    if verbose_level > 0 {
        println!("シナリオ実行が正常に完了しました。");
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    port: Option<u16>,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut scenario = ScenarioConfig::from_file(scenario_path)?;

    if let Some(port) = port {
        scenario.gesture.source = GestureSourceKind::Udp;
        scenario.gesture.port = port;
    }

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    scenario.print_summary();
    println!();

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;
    let stats = simulation.run()?;

    println!();
    println!("=== 実行結果 ===");
    println!("終了エピソード数: {}", stats.episodes);
    println!("  ゴール: {}", stats.goals);
    println!("  領域外: {}", stats.out_of_bounds);
    println!("  打ち切り: {}", stats.truncations);
    println!("ゴール進入回数: {}", stats.goal_contacts);
    println!("キック回数: {}", stats.kicks);
    println!("累積報酬: {:.3}", stats.cumulative_reward);

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  kittysim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>    シナリオファイルを指定して実行");
    println!("  -i, --info               シナリオ情報のみ表示");
    println!("  -v, --verbose            詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --port <PORT>        ジェスチャーをUDPで受信するポート");
    println!("      --log-level <LEVEL>  ログレベル");
    println!("      --log-output <OUT>   ログ出力先 (console, file, both)");
    println!("      --log-dir <DIR>      ログディレクトリ");
    println!("  -h, --help               このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    let listed = list_scenarios(Path::new(SCENARIO_DIR));
    if listed.is_empty() {
        println!("  ({}/ にシナリオがありません)", SCENARIO_DIR);
    }
    for path in &listed {
        println!("  {}", path);
    }
    println!();
    println!("例:");
    println!("  kittysim -s scenarios/kitty_arena.yaml");
    println!("  kittysim -s scenarios/free_play.yaml --port 5066 -v");
    println!("  kittysim -s scenarios/kitty_arena.yaml -i");
}

fn list_scenarios(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
        .map(|path| path.display().to_string())
        .collect();
    paths.sort();
    paths
}
