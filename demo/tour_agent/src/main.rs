mod config;

use std::fs;
use std::process::ExitCode;

use config::TourAgentConfig;
use tour_core::{Interest, TourPipeline, TourRequest, VoiceStyle};
use tracing::{error, info, warn};

struct CliArgs {
    location: String,
    interests: Vec<Interest>,
    duration_minutes: u32,
    voice_style: VoiceStyle,
}

const USAGE: &str = "Usage: tour_agent <location> [interests] [minutes] [style]\n\
    interests: comma-separated from history,architecture,culture,culinary \
    (default: history,architecture)\n\
    minutes:   tour length (default: 5)\n\
    style:     friendly|professional|enthusiastic|calm (default: friendly)";

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let location = args.next().ok_or_else(|| USAGE.to_string())?;

        let interests = match args.next() {
            Some(list) => list
                .split(',')
                .map(|s| Interest::parse(s).ok_or_else(|| format!("unknown interest '{s}'\n{USAGE}")))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![Interest::History, Interest::Architecture],
        };

        let duration_minutes = match args.next() {
            Some(m) => m
                .parse::<u32>()
                .map_err(|_| format!("invalid minutes '{m}'\n{USAGE}"))?,
            None => 5,
        };

        let voice_style = match args.next() {
            Some(s) => VoiceStyle::parse(&s).ok_or_else(|| format!("unknown style '{s}'\n{USAGE}"))?,
            None => VoiceStyle::Friendly,
        };

        Ok(Self {
            location,
            interests,
            duration_minutes,
            voice_style,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,tour_core=info,tour_agent=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = TourAgentConfig::load();

    info!(
        target = "tour_agent",
        location = %args.location,
        minutes = args.duration_minutes,
        style = args.voice_style.label(),
        "Starting tour generation: Plan → Research → Assemble → Synthesize"
    );

    let pipeline = match TourPipeline::new(cfg.pipeline) {
        Ok(p) => p,
        Err(e) => {
            error!(target = "tour_agent", error = %e, "Failed to build pipeline");
            return ExitCode::FAILURE;
        }
    };
    info!(
        target = "tour_agent",
        base_url = %pipeline.config().service.base_url,
        chat_model = %pipeline.config().service.chat_model,
        tts_model = %pipeline.config().service.tts_model,
        "Pipeline ready"
    );

    let request = TourRequest::new(
        args.location,
        args.interests,
        args.duration_minutes,
        args.voice_style,
    );

    let output = match pipeline
        .run(request, |event| {
            info!(
                target = "tour_agent",
                stage = %event.stage,
                fraction = event.fraction_complete,
                "{}",
                event.message
            );
        })
        .await
    {
        Ok(output) => output,
        Err(e) => {
            error!(target = "tour_agent", error = %e, "Tour generation failed");
            return ExitCode::FAILURE;
        }
    };

    if output.is_degraded() {
        let topics: Vec<&str> = output
            .degraded_interests
            .iter()
            .map(|i| i.as_str())
            .collect();
        warn!(
            target = "tour_agent",
            topics = ?topics,
            "Tour is partial: some topics could not be researched"
        );
    }

    if let Err(e) = fs::write(&cfg.audio_out, &output.audio.bytes) {
        error!(target = "tour_agent", path = ?cfg.audio_out, error = %e, "Failed to write audio");
        return ExitCode::FAILURE;
    }
    if let Err(e) = fs::write(&cfg.transcript_out, &output.script.full_text) {
        error!(target = "tour_agent", path = ?cfg.transcript_out, error = %e, "Failed to write transcript");
        return ExitCode::FAILURE;
    }

    info!(
        target = "tour_agent",
        audio = ?cfg.audio_out,
        transcript = ?cfg.transcript_out,
        estimated_minutes = output.script.estimated_speaking_minutes,
        audio_bytes = output.audio.bytes.len(),
        "Tour ready"
    );
    ExitCode::SUCCESS
}
