// Aria CLI - synthesize text to a WAV file.
//
// Usage: aria [--voice af_heart] [--lang a] [--speed 1.0] [--out out.wav] [text...]
// Reads text from the arguments, or from stdin when none is given.

use std::env;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use aria_tts::assets::{self, FetchProgress};
use aria_tts::{wav, LangCode, Pipeline, PipelineConfig};

const DATA_DIR_ENV: &str = "ARIA_DATA_DIR";

struct StderrProgress;

impl FetchProgress for StderrProgress {
    fn on_fetch_start(&self, asset: &str, size_mb: u64) {
        eprintln!("[aria] downloading {asset} ({size_mb}MB)...");
    }
    fn on_fetch_complete(&self, asset: &str) {
        eprintln!("[aria] downloaded {asset}");
    }
}

struct Args {
    voice: String,
    lang: LangCode,
    speed: f32,
    out: PathBuf,
    text: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut voice = "af_heart".to_string();
    let mut lang = None;
    let mut speed = 1.0f32;
    let mut out = PathBuf::from("out.wav");
    let mut text_parts: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--voice" => {
                voice = args.next().ok_or("--voice requires a value")?;
            }
            "--lang" => {
                let value = args.next().ok_or("--lang requires a value")?;
                let code = value.chars().next().ok_or("--lang requires a value")?;
                lang = Some(
                    LangCode::from_code(code)
                        .ok_or_else(|| format!("unknown language code '{value}'"))?,
                );
            }
            "--speed" => {
                let value = args.next().ok_or("--speed requires a value")?;
                speed = value
                    .parse()
                    .map_err(|_| format!("bad speed value '{value}'"))?;
            }
            "--out" => {
                out = PathBuf::from(args.next().ok_or("--out requires a value")?);
            }
            "--help" | "-h" => {
                return Err(
                    "usage: aria [--voice VOICE] [--lang CODE] [--speed N] [--out FILE] [text...]"
                        .to_string(),
                );
            }
            other => text_parts.push(other.to_string()),
        }
    }

    // Default the language to the voice's prefix.
    let lang = match lang {
        Some(lang) => lang,
        None => voice
            .chars()
            .next()
            .and_then(LangCode::from_code)
            .unwrap_or(LangCode::AmericanEnglish),
    };

    Ok(Args {
        voice,
        lang,
        speed,
        out,
        text: if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join(" "))
        },
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    if let Ok(dir) = env::var(DATA_DIR_ENV) {
        assets::set_data_dir(PathBuf::from(dir));
    }

    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if text.trim().is_empty() {
        return Err("no input text".into());
    }

    let progress = StderrProgress;
    let runtime = tokio::runtime::Runtime::new()?;
    let paths = runtime.block_on(assets::ensure_assets(&progress))?;
    runtime.block_on(assets::ensure_voice(&args.voice, &progress))?;

    let config = PipelineConfig {
        lang: args.lang,
        speed: args.speed,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::from_assets(config, &paths)?;

    let started = Instant::now();
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = aria_tts::SAMPLE_RATE;
    let mut chunk_count = 0usize;
    let mut skipped = 0usize;

    for item in pipeline.synthesize(&text, &args.voice)? {
        match item {
            Ok(chunk) => {
                eprintln!(
                    "[aria] chunk {}: '{}' ({} samples)",
                    chunk_count + 1,
                    preview(&chunk.graphemes),
                    chunk.audio.samples.len()
                );
                sample_rate = chunk.audio.sample_rate;
                samples.extend_from_slice(&chunk.audio.samples);
                chunk_count += 1;
            }
            Err(err) => {
                eprintln!("[aria] chunk skipped: {err}");
                skipped += 1;
            }
        }
    }

    if samples.is_empty() {
        return Err("no audio produced".into());
    }

    wav::write_wav_file(&args.out, sample_rate, &samples)?;
    eprintln!(
        "[aria] wrote {} ({} chunks, {} skipped, {}ms audio, {}ms wall)",
        args.out.display(),
        chunk_count,
        skipped,
        wav::duration_ms(sample_rate, samples.len()),
        started.elapsed().as_millis()
    );

    Ok(())
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(40).collect();
    if short.len() < text.len() {
        format!("{short}…")
    } else {
        short
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("[aria] fatal error: {err}");
        std::process::exit(1);
    }
}
