#![deny(warnings)]

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use voice_diary_core::acoustic::CueTable;
use voice_diary_core::asr::{AudioContainer, HfSpeechToText};
use voice_diary_core::chat::HfChatClient;
use voice_diary_core::config::{
    non_empty_language, require_api_key, resolve_string_with_default, AnalysisConfig, AppConfig,
    ServiceConfig, StdEnv, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL,
    DEFAULT_CHAT_TIMEOUT_SECS, DEFAULT_FEEDBACK_LANGUAGE, DEFAULT_STT_BASE_URL,
    DEFAULT_STT_MODEL, DEFAULT_TRANSCRIPTION_TIMEOUT_SECS, ENV_CHAT_BASE_URL, ENV_HF_API_TOKEN,
    ENV_STT_BASE_URL,
};
use voice_diary_core::pipeline::{Pipeline, StageTimings};

#[cfg(feature = "ffmpeg-sidecar")]
use voice_diary_core::decode::FfmpegAudioDecoder as Decoder;
#[cfg(not(feature = "ffmpeg-sidecar"))]
use voice_diary_core::decode::UnavailableDecoder as Decoder;

#[derive(Parser, Debug)]
#[command(name = "voice-diary")]
#[command(about = "Transcribe a voice diary entry and assess its emotional tone")]
struct Args {
    /// Recording to analyse (.m4a, .mp3, .wav or .aac)
    audio: PathBuf,

    #[arg(long)]
    hf_api_token: Option<String>,

    #[arg(long, env = ENV_STT_BASE_URL)]
    stt_base_url: Option<String>,

    #[arg(long, default_value = DEFAULT_STT_MODEL)]
    stt_model: String,

    #[arg(long, env = ENV_CHAT_BASE_URL)]
    chat_base_url: Option<String>,

    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    #[arg(long, default_value_t = DEFAULT_TRANSCRIPTION_TIMEOUT_SECS)]
    transcription_timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_CHAT_TIMEOUT_SECS)]
    chat_timeout_secs: u64,

    #[arg(long, default_value = DEFAULT_FEEDBACK_LANGUAGE)]
    feedback_language: String,

    /// JSON file overriding the acoustic cue thresholds
    #[arg(long)]
    cue_table: Option<PathBuf>,

    /// Include per-stage timings in the output
    #[arg(long, default_value_t = false)]
    timings: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let container = AudioContainer::from_path(&args.audio).with_context(|| {
        format!(
            "unsupported audio file {}; expected .m4a, .mp3, .wav or .aac",
            args.audio.display()
        )
    })?;
    let audio = std::fs::read(&args.audio)
        .with_context(|| format!("failed to read {}", args.audio.display()))?;
    let show_timings = args.timings;

    let env = StdEnv;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        stt_model = %cfg.services.stt_model,
        chat_model = %cfg.services.chat_model,
        bytes = audio.len(),
        "config loaded"
    );

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;
    let stt = HfSpeechToText::new(http.clone(), &cfg.services);
    let chat = HfChatClient::new(http, &cfg.services);
    let pipeline = Pipeline::new(stt, chat, Decoder::default(), &cfg.analysis);

    let (result, timings) = pipeline
        .run_timed(Bytes::from(audio), container)
        .await
        .context("analysis failed")?;

    let output = if show_timings {
        serde_json::json!({ "result": result, "timings_ms": timings_json(&timings) })
    } else {
        serde_json::to_value(&result)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn timings_json(t: &StageTimings) -> serde_json::Value {
    serde_json::json!({
        "transcription": t.transcription.as_millis() as u64,
        "acoustics": t.acoustics.as_millis() as u64,
        "sentiment": t.sentiment.as_millis() as u64,
        "feedback": t.feedback.as_millis() as u64,
        "total": t.total.as_millis() as u64,
    })
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(
    args: Args,
    env: &impl voice_diary_core::config::Env,
) -> anyhow::Result<AppConfig> {
    let api_key = require_api_key(args.hf_api_token, ENV_HF_API_TOKEN, env)?;

    let mut services = ServiceConfig::new(api_key)
        .with_timeouts(args.transcription_timeout_secs, args.chat_timeout_secs)?;
    services.stt_base_url =
        resolve_string_with_default(args.stt_base_url, ENV_STT_BASE_URL, env, DEFAULT_STT_BASE_URL);
    services.chat_base_url = resolve_string_with_default(
        args.chat_base_url,
        ENV_CHAT_BASE_URL,
        env,
        DEFAULT_CHAT_BASE_URL,
    );
    services.stt_model = args.stt_model;
    services.chat_model = args.chat_model;

    let cues = match args.cue_table {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read cue table {}", path.display()))?;
            CueTable::from_json_str(&raw)?
        }
        None => CueTable::default(),
    };

    let analysis = AnalysisConfig {
        cues,
        feedback_language: non_empty_language(args.feedback_language)?,
        ..AnalysisConfig::default()
    };
    analysis.validate()?;

    Ok(AppConfig { services, analysis })
}
