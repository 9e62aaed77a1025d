use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use jacobi_heat::bench::{run_sweep, SWEEP_RUNS, SWEEP_SIZES};
use jacobi_heat::config::{RunConfig, ERROR_THRESHOLD, POLL_INTERVAL};
use jacobi_heat::grid::DEFAULT_SIZE;
use jacobi_heat::{Controller, Mode, Result};

/// Jacobi法 2D熱方程式: シングル / フリーラン / バリア同期の比較
#[derive(Parser)]
#[command(name = "jacobi-heat", version, about)]
#[command(after_help = "MODE:\n  (省略)   バリアなしのマルチスレッド\n  single   シングルスレッド\n  barrier  バリア同期のマルチスレッド\n  test     グリッドサイズごとの性能比較")]
struct Cli {
    /// 実行モード（single | barrier | test）
    mode: Option<String>,

    /// グリッドの1辺のセル数
    #[arg(short, long, default_value_t = DEFAULT_SIZE)]
    size: usize,

    /// 収束判定値（誤差の総和）
    #[arg(short, long, default_value_t = ERROR_THRESHOLD)]
    threshold: f64,

    /// test モードの測定回数
    #[arg(short, long, default_value_t = SWEEP_RUNS)]
    runs: usize,

    /// 監視ループの最大待ち時間（ミリ秒）
    #[arg(long, default_value_t = POLL_INTERVAL.as_millis() as u64)]
    poll_ms: u64,

    /// シングルスレッド版の反復上限
    #[arg(long)]
    max_iterations: Option<u64>,

    /// マルチスレッド版の打ち切り時間（秒）
    #[arg(long)]
    timeout: Option<u64>,

    /// 詳細ログ
    #[arg(short, long)]
    verbose: bool,

    /// エラー以外のログを出さない
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_mode(config: RunConfig, mode: Mode) -> Result<()> {
    let report = Controller::new(config)?.run(mode)?;
    println!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut config = RunConfig::default()
        .with_size(cli.size)
        .with_threshold(cli.threshold)
        .with_poll_interval(Duration::from_millis(cli.poll_ms));
    if let Some(limit) = cli.max_iterations {
        config = config.with_max_iterations(limit);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_max_duration(Duration::from_secs(secs));
    }

    let mode = cli.mode.as_deref().map(str::to_ascii_lowercase);
    let result = match mode.as_deref() {
        None => run_mode(config, Mode::FreeRunning),
        Some("single") => run_mode(config, Mode::Single),
        Some("barrier") => run_mode(config, Mode::Barrier),
        Some("test") => run_sweep(&config, &SWEEP_SIZES, cli.runs).map(|_| ()),
        Some(other) => {
            println!("Unknown mode: {}", other);
            let _ = Cli::command().print_help();
            return ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("エラー: {}", e);
            ExitCode::FAILURE
        }
    }
}
