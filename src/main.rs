use anyhow::{Context, Result};
use attrswap::config::DeviceType;
use attrswap::logging::{init_logging, success};
use attrswap::training::{CheckpointManager, RetentionPolicy, TrainingPhase};
use attrswap::{Config, Loaders, ModelComponent, Trainer};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "attrswap")]
#[command(about = "Train an encoder/decoder/classifier that swaps facial attributes between image pairs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the training loop
    Train(TrainArgs),

    /// Validate configuration file
    Config {
        /// Configuration file to validate
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the header of a checkpoint file
    Inspect {
        /// Checkpoint to read
        checkpoint: PathBuf,
    },

    /// Show system information
    Info,
}

/// Command line overrides, applied on top of the configuration file
#[derive(Args)]
struct TrainArgs {
    /// JSON or YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Weight decay
    #[arg(long)]
    weight_decay: Option<f64>,

    /// Reconstruction loss weight
    #[arg(long)]
    alpha: Option<f64>,

    /// Classification loss weight
    #[arg(long)]
    beta: Option<f64>,

    /// Checkpoint every N epochs
    #[arg(long)]
    save_every: Option<usize>,

    /// Number of attributes
    #[arg(long)]
    att_num: Option<usize>,

    /// Data loader worker threads
    #[arg(long)]
    nthreads: Option<usize>,

    /// Output directory for logs and checkpoints
    #[arg(long)]
    save: Option<PathBuf>,

    /// Checkpoint to resume from
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Components restored on resume
    #[arg(long, value_delimiter = ',')]
    restore: Option<Vec<ModelComponent>>,

    /// JSON pair file
    #[arg(long)]
    pair_file: Option<PathBuf>,

    /// Attribute annotation file
    #[arg(long)]
    ann_file: Option<PathBuf>,

    /// Image directory
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Remove previous logs and checkpoints first
    #[arg(long)]
    clean: bool,

    /// Training phase: joint, encoder-decoder or classifier
    #[arg(long)]
    phase: Option<TrainingPhase>,

    /// Keep only the newest N checkpoints
    #[arg(long)]
    keep_last: Option<usize>,

    /// Compute device: auto, cpu, cuda, cuda:N or metal
    #[arg(long, env = "ATTRSWAP_DEVICE")]
    device: Option<DeviceType>,

    /// Seed for the pair split and shuffling
    #[arg(long)]
    seed: Option<u64>,
}

impl TrainArgs {
    fn apply(self, config: &mut Config) {
        let TrainArgs {
            config: _,
            epochs,
            batch_size,
            lr,
            weight_decay,
            alpha,
            beta,
            save_every,
            att_num,
            nthreads,
            save,
            resume,
            restore,
            pair_file,
            ann_file,
            image_dir,
            clean,
            phase,
            keep_last,
            device,
            seed,
        } = self;

        if let Some(v) = epochs {
            config.training.epochs = v;
        }
        if let Some(v) = batch_size {
            config.training.batch_size = v;
        }
        if let Some(v) = lr {
            config.optimizer.learning_rate = v;
        }
        if let Some(v) = weight_decay {
            config.optimizer.weight_decay = v;
        }
        if let Some(v) = alpha {
            config.training.alpha = v;
        }
        if let Some(v) = beta {
            config.training.beta = v;
        }
        if let Some(v) = save_every {
            config.checkpointing.save_every = v;
        }
        if let Some(v) = att_num {
            config.data.attribute_count = v;
        }
        if let Some(v) = nthreads {
            config.data.num_workers = v;
        }
        if let Some(v) = save {
            config.checkpointing.save_dir = v;
        }
        if resume.is_some() {
            config.checkpointing.resume_from = resume;
        }
        if let Some(v) = restore {
            config.checkpointing.restore = v;
        }
        if let Some(v) = pair_file {
            config.data.pair_file = v;
        }
        if let Some(v) = ann_file {
            config.data.annotation_file = v;
        }
        if let Some(v) = image_dir {
            config.data.image_dir = v;
        }
        if clean {
            config.checkpointing.clean = true;
        }
        if let Some(v) = phase {
            config.training.phase = v;
        }
        if let Some(n) = keep_last {
            config.checkpointing.retention = RetentionPolicy::KeepLast(n);
        }
        if let Some(v) = device {
            config.runtime.device = v;
        }
        if let Some(v) = seed {
            config.training.seed = v;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.json)?;

    match cli.command {
        Commands::Train(args) => {
            train(args)?;
        }

        Commands::Config { file } => {
            validate_config(file)?;
        }

        Commands::Inspect { checkpoint } => {
            inspect_checkpoint(checkpoint)?;
        }

        Commands::Info => {
            show_system_info();
        }
    }

    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid training configuration")?;

    let device = config
        .runtime
        .device
        .to_device()
        .context("Failed to open compute device")?;

    let loaders = Loaders::from_config(&config).context("Failed to load training data")?;
    let batch_size = config.training.batch_size;
    println!(
        "| Data Loaded: # training data: {}, # val data: {}",
        loaders.train.num_batches() * batch_size,
        loaders.val.num_batches() * batch_size
    );

    let mut trainer = Trainer::new(config, device).context("Failed to initialize trainer")?;
    let result = trainer
        .train(&loaders.train, &loaders.val)
        .context("Training failed")?;

    info!(
        "Ran {} epochs in {:?}, wrote {} checkpoints",
        result.epochs_run,
        result.duration,
        result.checkpoints.len()
    );
    success("Training complete");
    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    info!("Validating configuration file: {}", config_path.display());

    let config = attrswap::load_config(&config_path).context("Configuration is invalid")?;

    success("Configuration is valid");
    println!("Configuration summary:");
    println!(
        "  - Data: {} pairs file, {} attributes, {}px images",
        config.data.pair_file.display(),
        config.data.attribute_count,
        config.data.image_size
    );
    println!(
        "  - Training: {} epochs, batch {}, phase {}",
        config.training.epochs, config.training.batch_size, config.training.phase
    );
    println!(
        "  - Loss weights: alpha {}, beta {}",
        config.training.alpha, config.training.beta
    );
    println!(
        "  - Checkpoints: every {} epochs into {} ({:?})",
        config.checkpointing.save_every,
        config.checkpointing.save_dir.display(),
        config.checkpointing.retention
    );

    Ok(())
}

fn inspect_checkpoint(path: PathBuf) -> Result<()> {
    let info = CheckpointManager::inspect(&path)
        .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;

    println!("Checkpoint: {}", info.path.display());
    println!("  epoch:           {}", info.epoch);
    if let Some(phase) = info.phase {
        println!("  phase:           {}", phase);
    }
    if let Some(count) = info.attribute_count {
        println!("  attributes:      {}", count);
    }
    if let Some(created) = &info.created_at {
        println!("  created:         {}", created);
    }
    for component in ModelComponent::ALL {
        println!(
            "  {:<16} {} parameters",
            format!("{component}:"),
            info.parameter_count(component)
        );
    }
    println!("  tensors:         {}", info.tensors.len());
    Ok(())
}

fn show_system_info() {
    println!("attrswap - attribute-swap autoencoder training");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Hardware support:");

    #[cfg(feature = "cuda")]
    println!("  ✅ NVIDIA CUDA GPU acceleration");
    #[cfg(not(feature = "cuda"))]
    println!("  ❌ CUDA support (not compiled)");

    #[cfg(feature = "metal")]
    println!("  ✅ Apple Metal GPU acceleration");
    #[cfg(not(feature = "metal"))]
    println!("  ❌ Metal support (not compiled)");

    #[cfg(feature = "accelerate")]
    println!("  ✅ Apple Accelerate framework");
    #[cfg(not(feature = "accelerate"))]
    println!("  ❌ Accelerate support (not compiled)");

    println!("  ✅ CPU training");
    println!();
    println!("Usage:");
    println!("  attrswap train --pair-file pairs.json --ann-file list_attr_celeba.txt --image-dir img/");
    println!("  attrswap train -c train.yaml --resume save/checkpoint_5.safetensors");
    println!("  attrswap config -f train.yaml   # Validate configuration");
    println!("  attrswap inspect save/checkpoint_5.safetensors");
    println!("  attrswap info                   # Show this information");
}
