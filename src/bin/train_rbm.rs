//! Train an RBM on synthetic binary patterns
//!
//! Usage:
//!   cargo run --bin train_rbm -- --method contrastive-divergence --epochs 30

use clap::Parser;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_rbm::{RbmConfig, RbmModel, TrainMethod, TrainSession};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train a Bernoulli RBM on synthetic stripe patterns")]
struct Args {
    /// Number of visible units
    #[arg(long, default_value = "36")]
    visible: usize,

    /// Number of hidden units
    #[arg(long, default_value = "12")]
    hidden: usize,

    /// Training method: "contrastive-divergence", "simulated-annealing" or "equilibrium"
    #[arg(short, long, default_value = "contrastive-divergence")]
    method: String,

    /// Number of training epochs
    #[arg(short, long, default_value = "30")]
    epochs: usize,

    /// Number of synthetic samples to generate
    #[arg(short, long, default_value = "200")]
    samples: usize,

    /// Learning rate
    #[arg(long, default_value = "0.1")]
    learning_rate: f64,

    /// Batch size
    #[arg(long, default_value = "10")]
    batch_size: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Write the trained parameter snapshot to this JSON file
    #[arg(short, long)]
    output: Option<String>,
}

/// Noisy horizontal/vertical stripe patterns over a square pixel grid: the
/// stand-in for the sample provider the engine normally gets from outside.
fn stripe_patterns(count: usize, visible: usize, rng: &mut StdRng) -> Array2<f64> {
    let side = (visible as f64).sqrt() as usize;
    let mut samples = Array2::zeros((count, visible));

    for mut row in samples.rows_mut() {
        let horizontal = rng.gen_bool(0.5);
        let stripe = rng.gen_range(0..side.max(1));
        for i in 0..visible {
            let on = if horizontal {
                i / side.max(1) == stripe
            } else {
                i % side.max(1) == stripe
            };
            let noise = rng.gen_bool(0.05);
            row[i] = if on != noise { 1.0 } else { 0.0 };
        }
    }
    samples
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let method = TrainMethod::parse(&args.method)?;

    let mut model = RbmModel::new(
        RbmConfig::new(args.visible, args.hidden)
            .method(method)
            .learning_rate(args.learning_rate)
            .batch_size(args.batch_size)
            .seed(args.seed),
    )?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let samples = stripe_patterns(args.samples, args.visible, &mut rng);
    info!(
        "training {} x {} RBM with {} on {} samples",
        args.visible,
        args.hidden,
        method,
        samples.nrows()
    );

    let mut session = TrainSession::new()
        .with_seed(args.seed)
        .with_progress(|epoch, total| info!("epoch {}/{}", epoch, total));
    let report = model.fit(samples.view(), args.epochs, &mut session)?;

    info!(
        "done: {}/{} epochs{}",
        report.epochs_completed,
        report.total_epochs,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    if let Some(stats) = report.annealing {
        info!(
            "annealing: {} proposals, acceptance {:.3}, {} energy decreases, {} skipped",
            stats.iterations,
            stats.acceptance_rate(),
            stats.energy_decreases,
            stats.nonfinite_skipped
        );
    }

    // Reconstruction check on the first sample.
    let probe = samples.row(0).to_owned();
    let recon = model.reconstruct(&probe)?;
    let error: f64 = (&probe - &recon.visible).mapv(|x| x * x).sum();
    println!("\n=== Reconstruction ===");
    println!("squared error on probe sample: {:.4}", error);

    println!("\n=== Filters ===");
    for unit in 0..model.hidden_size().min(4) {
        let row = model.filter(unit)?;
        let norm: f64 = row.iter().map(|w| w * w).sum::<f64>().sqrt();
        println!("hidden unit {:>2}: |w| = {:.4}", unit, norm);
    }

    if let Some(path) = args.output {
        let json = model.snapshot().to_json()?;
        std::fs::write(&path, json)?;
        info!("snapshot written to {}", path);
    }

    Ok(())
}
