//!
//! CLI для просмотра и проверки акустических моделей RustAcoustic.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use acoustic_core::{Architecture, DEFAULT_INPUT_DIM, ModelConfig, PaddingMode, length};
use acoustic_models::AcousticModel;
use tracing::info;

#[derive(Parser)]
#[command(name = "rustacoustic")]
#[command(author, version, about = "RustAcoustic: acoustic sequence models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn parse_architecture(s: &str) -> Result<Architecture, String> {
    Architecture::from_str_loose(s).ok_or_else(|| {
        let known: Vec<&str> = Architecture::all().iter().map(|a| a.as_str()).collect();
        format!("неизвестная архитектура '{s}', доступны: {}", known.join(", "))
    })
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in architectures
    List,

    /// Print a layer-by-layer summary of a model
    Summary {
        /// Built-in architecture (ignored when --config is given)
        #[arg(long, value_parser = parse_architecture, default_value = "cnn-rnn")]
        arch: Architecture,

        /// JSON model config instead of a built-in architecture
        #[arg(long)]
        config: Option<PathBuf>,

        /// Features per input frame for built-in architectures
        #[arg(long, default_value_t = DEFAULT_INPUT_DIM)]
        input_dim: usize,

        /// Печатать сводку в JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Map input frame counts to output frame counts for a model
    Length {
        #[arg(long, value_parser = parse_architecture, default_value = "cnn-rnn")]
        arch: Architecture,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_INPUT_DIM)]
        input_dim: usize,

        /// Input frame counts (можно указать несколько)
        #[arg(long, required = true, num_args = 1..)]
        frames: Vec<usize>,
    },

    /// Project a sequence length through a single convolution stage
    Project {
        /// Input frame count; omit for an unknown length
        #[arg(long)]
        frames: Option<i64>,

        /// Kernel width
        #[arg(long)]
        kernel: usize,

        /// Border mode: same | valid
        #[arg(long, default_value = "same")]
        padding: String,

        #[arg(long, default_value_t = 1)]
        stride: usize,

        #[arg(long, default_value_t = 1)]
        dilation: usize,
    },

    /// Run a forward pass with random weights and random input
    Forward {
        #[arg(long, value_parser = parse_architecture, default_value = "cnn-rnn")]
        arch: Architecture,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Директория с config.json и model.safetensors (вместо случайных весов)
        #[arg(long)]
        model: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_INPUT_DIM)]
        input_dim: usize,

        /// Number of input frames
        #[arg(long, default_value_t = 200)]
        frames: usize,

        #[arg(long, default_value_t = 1)]
        batch: usize,

        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,

        /// Прогон в режиме обучения (dropout, статистики батча)
        #[arg(long, default_value_t = false)]
        train: bool,
    },

    /// Print a built-in architecture as a JSON config
    DumpConfig {
        #[arg(long, value_parser = parse_architecture)]
        arch: Architecture,

        #[arg(long, default_value_t = DEFAULT_INPUT_DIM)]
        input_dim: usize,

        /// Сохранить в файл вместо вывода в stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for arch in Architecture::all() {
                let config = arch.default_config(DEFAULT_INPUT_DIM);
                let mapping = config.output_length();
                println!(
                    "{:<24} {:<40} conv stages: {}, stride: {}",
                    arch.as_str(),
                    arch.display_name(),
                    mapping.stages().len(),
                    mapping.total_stride()
                );
            }
            Ok(())
        }

        Commands::Summary {
            arch,
            config,
            input_dim,
            json,
        } => {
            let config = resolve_config(arch, config.as_deref(), input_dim)?;
            let summary = acoustic_models::ModelSummary::from_config(&config);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(())
        }

        Commands::Length {
            arch,
            config,
            input_dim,
            frames,
        } => {
            let config = resolve_config(arch, config.as_deref(), input_dim)?;
            let mapping = config.output_length();
            println!("Model: {}", config.name);
            for n in frames {
                match mapping.apply_checked(n) {
                    Ok(out) => println!("{n:>8} -> {out}"),
                    Err(e) => println!("{n:>8} -> ошибка: {e}"),
                }
            }
            Ok(())
        }

        Commands::Project {
            frames,
            kernel,
            padding,
            stride,
            dilation,
        } => {
            let mode: PaddingMode = padding.parse()?;
            let out = length::project(frames, kernel, mode, stride, dilation)?;
            match out {
                Some(n) => println!("{n}"),
                None => println!("unknown"),
            }
            Ok(())
        }

        Commands::Forward {
            arch,
            config,
            model,
            input_dim,
            frames,
            batch,
            device,
            train,
        } => run_forward(arch, config, model, input_dim, frames, batch, &device, train),

        Commands::DumpConfig {
            arch,
            input_dim,
            out,
        } => {
            let config = arch.default_config(input_dim);
            match out {
                Some(path) => {
                    config
                        .save(&path)
                        .with_context(|| format!("не удалось записать {}", path.display()))?;
                    println!("Saved {} to {}", arch.as_str(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
            Ok(())
        }
    }
}

/// Конфигурация из файла или встроенного пресета.
fn resolve_config(arch: Architecture, config: Option<&Path>, input_dim: usize) -> Result<ModelConfig> {
    let config = match config {
        Some(path) => ModelConfig::from_file(path)
            .with_context(|| format!("не удалось загрузить конфигурацию {}", path.display()))?,
        None => arch.default_config(input_dim),
    };
    config.validate()?;
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
fn run_forward(
    arch: Architecture,
    config: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    input_dim: usize,
    frames: usize,
    batch: usize,
    device: &str,
    train: bool,
) -> Result<()> {
    if batch == 0 {
        bail!("--batch должен быть >= 1");
    }
    let device = create_device(device)?;

    let start = Instant::now();
    let model = match model_dir {
        Some(dir) => AcousticModel::load(&dir, &device)?,
        None => {
            let config = resolve_config(arch, config.as_deref(), input_dim)?;
            AcousticModel::random(config, &device)?.0
        }
    };
    info!("{}: модель готова за {:.2}с", model.name(), start.elapsed().as_secs_f64());

    let input_dim = model.config().input_dim;
    let x = candle_core::Tensor::randn(0f32, 1f32, (batch, frames, input_dim), &device)?;

    let start = Instant::now();
    let probs = model.forward_t(&x, train)?;
    let elapsed = start.elapsed();

    let expected = model.output_length().apply_checked(frames)?;
    println!("Model: {}", model.name());
    println!("Input shape:  {:?}", x.dims());
    println!("Output shape: {:?}", probs.dims());
    println!("Output length mapping: {frames} -> {expected}");
    println!("Forward pass: {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn create_device(device: &str) -> Result<candle_core::Device> {
    match device {
        "metal" => {
            // Metal может быть недоступен, а candle внутри может panic.
            let res = std::panic::catch_unwind(|| candle_core::Device::new_metal(0));
            match res {
                Ok(Ok(device)) => Ok(device),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => bail!("Metal недоступен на этой машине"),
            }
        }
        "cuda" => Ok(candle_core::Device::new_cuda(0)?),
        "cpu" => Ok(candle_core::Device::Cpu),
        other => bail!("неизвестное устройство '{other}' (cpu, metal, cuda)"),
    }
}
