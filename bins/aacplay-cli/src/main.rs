//! aacplay - AAC 命令行工具
//!
//! - `probe`: 读取元数据, 不启动解码
//! - `sniff`: 只输出码流分类
//! - `decode`: 运行完整解码引擎, 输出原始 PCM 或直接丢弃

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use log::debug;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use aacplay_codec::{CodecFactory, SymphoniaAacFactory};
use aacplay_core::{AacError, AacResult};
use aacplay_format::sniff_path;
use aacplay_playback::{
    EngineConfig, EngineReport, LogHost, NullSink, PcmWriterSink, Player, SharedSink,
    TimingPolicy, TrackMetadata, probe_path, sink,
};

#[derive(Parser, Debug)]
#[command(name = "aacplay", version, about = "纯 Rust AAC 探测与解码工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 引擎配置文件 (JSON, 缺省字段取默认值)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 时长与定位公式
    #[arg(long, global = true, value_enum)]
    timing: Option<TimingArg>,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 显示文件元数据
    Probe {
        /// 输入文件
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 判断码流类型 (adts / mp4 / unknown)
    Sniff {
        /// 输入文件
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// 解码整个文件
    Decode {
        /// 输入文件
        input: PathBuf,

        /// 原始 PCM 输出文件 (交错 S16, 本机字节序); 省略时丢弃解码结果
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 开始后立即定位到指定时间 (毫秒)
        #[arg(long)]
        seek: Option<u64>,

        /// 覆盖输出文件
        #[arg(short = 'y', long)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimingArg {
    /// 每帧按 frame_size - 1 个采样计算
    Legacy,
    /// 每帧按 frame_size 个采样计算
    Exact,
}

impl From<TimingArg> for TimingPolicy {
    fn from(arg: TimingArg) -> Self {
        match arg {
            TimingArg::Legacy => TimingPolicy::Legacy,
            TimingArg::Exact => TimingPolicy::Exact,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init("aacplay", cli.verbose);

    let result = load_config(&cli).and_then(|config| match cli.command {
        Command::Probe { inputs, json } => cmd_probe(&inputs, json, &config),
        Command::Sniff { inputs } => cmd_sniff(&inputs, &config),
        Command::Decode {
            input,
            output,
            seek,
            overwrite,
        } => cmd_decode(&input, output.as_deref(), seek, overwrite, config),
    });

    if let Err(e) = result {
        eprintln!("错误: {e}");
        process::exit(1);
    }
}

/// 读取配置文件并应用命令行覆盖
fn load_config(cli: &Cli) -> AacResult<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(timing) = cli.timing {
        config.timing = timing.into();
    }
    config.validate()?;
    debug!("引擎配置: {config:?}");
    Ok(config)
}

fn parse_config(text: &str) -> AacResult<EngineConfig> {
    serde_json::from_str(text).map_err(|e| AacError::InvalidArgument(format!("配置文件无效: {e}")))
}

// ============================================================
// probe
// ============================================================

/// JSON 输出中的一项
#[derive(Serialize)]
struct ProbeEntry<'a> {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a TrackMetadata>,
}

fn cmd_probe(inputs: &[PathBuf], json: bool, config: &EngineConfig) -> AacResult<()> {
    let results: Vec<(String, Option<TrackMetadata>)> = inputs
        .iter()
        .map(|p| (p.display().to_string(), probe_path(p, config)))
        .collect();

    if json {
        let entries: Vec<ProbeEntry<'_>> = results
            .iter()
            .map(|(path, meta)| ProbeEntry {
                path: path.clone(),
                metadata: meta.as_ref(),
            })
            .collect();
        let text = serde_json::to_string_pretty(&entries)
            .map_err(|e| AacError::Internal(format!("JSON 序列化失败: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    for (path, meta) in &results {
        println!("{path}");
        match meta {
            Some(meta) => print_metadata(meta),
            None => println!("  (无可用元数据)"),
        }
    }
    Ok(())
}

fn print_metadata(meta: &TrackMetadata) {
    println!("  格式:   {}", meta.format);
    println!("  标题:   {}", meta.display_title());
    for (label, value) in [
        ("艺术家", &meta.artist),
        ("专辑", &meta.album),
        ("流派", &meta.genre),
    ] {
        if let Some(v) = value {
            println!("  {label}: {v}");
        }
    }
    if let Some(year) = meta.year {
        println!("  年份:   {year}");
    }
    println!("  采样率: {} Hz, {} 声道", meta.sample_rate, meta.channels);
    match meta.duration_ms {
        Some(ms) => println!("  时长:   {}", format_ms(ms)),
        None => println!("  时长:   未知"),
    }
    if let Some(bitrate) = meta.bitrate {
        println!("  码率:   {} kbps", bitrate / 1000);
    }
}

/// 毫秒格式化为 `m:ss.mmm`
fn format_ms(ms: u64) -> String {
    format!("{}:{:02}.{:03}", ms / 60_000, (ms / 1000) % 60, ms % 1000)
}

// ============================================================
// sniff
// ============================================================

fn cmd_sniff(inputs: &[PathBuf], config: &EngineConfig) -> AacResult<()> {
    let sniff_config = config.sniff_config();
    for path in inputs {
        match sniff_path(path, &sniff_config) {
            Ok(class) => println!("{class}\t{}", path.display()),
            Err(e) => println!("error\t{} ({e})", path.display()),
        }
    }
    Ok(())
}

// ============================================================
// decode
// ============================================================

fn cmd_decode(
    input: &Path,
    output: Option<&Path>,
    seek: Option<u64>,
    overwrite: bool,
    config: EngineConfig,
) -> AacResult<()> {
    let factory: Arc<dyn CodecFactory> = Arc::new(SymphoniaAacFactory);

    let mut pcm_sink = None;
    let shared: SharedSink = match output {
        Some(path) => {
            if !overwrite && path.exists() {
                return Err(AacError::InvalidArgument(format!(
                    "输出文件已存在 '{}', 使用 -y 覆盖",
                    path.display()
                )));
            }
            let writer = sink::shared(PcmWriterSink::new(BufWriter::new(File::create(path)?)));
            pcm_sink = Some(writer.clone());
            writer
        }
        None => sink::shared(NullSink::new()),
    };

    let mut player = Player::new(shared, factory, config).with_host(Arc::new(LogHost));
    let info = player.play_path(input)?;
    eprintln!(
        "{}: {} Hz, {} 声道, 时长 {}",
        info.title,
        info.sample_rate,
        info.channels,
        info.duration_ms.map_or_else(|| "未知".into(), format_ms),
    );

    if let Some(ms) = seek {
        if let Err(e) = player.seek(ms) {
            eprintln!("警告: 定位失败: {e}");
        }
    }

    let report = player
        .wait()
        .ok_or_else(|| AacError::Internal("解码线程未启动".into()))??;
    print_report(&report);
    if let (Some(writer), Some(path)) = (pcm_sink, output) {
        let bytes = writer
            .lock()
            .map(|w| w.bytes_written())
            .unwrap_or_default();
        eprintln!("已写入 {bytes} 字节到 {}", path.display());
    }
    Ok(())
}

fn print_report(report: &EngineReport) {
    eprintln!(
        "结束 ({:?}): {} 块, {} 帧, {} 次定位",
        report.end, report.blocks, report.frames, report.seeks
    );
}
