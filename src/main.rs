use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tradegene::config::ConfigManager;
use tradegene::engines::evaluation::SignalBacktester;
use tradegene::engines::generation::{ConsoleProgressCallback, FormulaParser, GeneExpression, GepEngine};
use tradegene::protocol::{self, GeneMeta, ValidationInfo, ValidationStatus};
use tradegene::types::Bar;

const SYNTHETIC_BARS: usize = 500;

/// Hand-written starting points mixed into generation 0
const SEED_FORMULAS: [&str; 3] = ["SMA(10) > SMA(30)", "RSI(14) < 30", "close > EMA(50)"];

/// Geometric random walk with a slight upward drift
fn synthetic_bars(seed: u64, count: usize) -> Result<Vec<Bar>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let returns = Normal::new(0.0003_f64, 0.01).context("invalid return distribution")?;
    let wicks = Normal::new(0.0_f64, 0.004).context("invalid wick distribution")?;

    let mut close = 100.0_f64;
    let mut bars = Vec::with_capacity(count);
    for _ in 0..count {
        let open = close;
        close = open * (1.0 + returns.sample(&mut rng));
        let high = open.max(close) * (1.0 + wicks.sample(&mut rng).abs());
        let low = open.min(close) * (1.0 - wicks.sample(&mut rng).abs());
        let volume = 1000.0 * (1.0 + wicks.sample(&mut rng).abs() * 100.0);
        bars.push(Bar::new(open, high, low, close, volume));
    }
    Ok(bars)
}

fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args().nth(1);
    let manager = ConfigManager::new();
    manager
        .load_layered(config_path.as_deref())
        .with_context(|| format!("loading configuration from {:?}", config_path))?;
    let config = manager.get()?;

    let data_seed = config.evolution.seed.unwrap_or(42);
    let bars = synthetic_bars(data_seed, SYNTHETIC_BARS)?;
    log::info!("Generated {} synthetic bars (seed {})", bars.len(), data_seed);

    let backtester = SignalBacktester::new(bars, config.backtesting.clone())?;
    let mut engine = GepEngine::new(config.evolution.clone())?;

    let parser = FormulaParser::from_config(&config.parser);
    let mut id_rng = StdRng::seed_from_u64(data_seed);
    let mut initial = Vec::with_capacity(config.evolution.population_size);
    for formula in SEED_FORMULAS.iter().take(config.evolution.population_size) {
        let root = parser
            .parse(formula)
            .with_context(|| format!("parsing seed formula {:?}", formula))?;
        initial.push(GeneExpression::with_random_id(root, &mut id_rng));
    }
    let missing = config.evolution.population_size - initial.len();
    initial.extend(engine.initialize_population().into_iter().take(missing));

    let outcome = engine.evolve(Some(initial), &backtester, &mut ConsoleProgressCallback);

    let best = outcome
        .best()
        .context("evolution produced an empty population")?;
    println!(
        "Best after {} generations ({:?}): {}",
        outcome.generations_run(),
        outcome.termination,
        best.gene.formula()
    );
    println!("Fitness: {:.4}", best.fitness);

    let mut validation = ValidationInfo::with_status(ValidationStatus::Passed);
    for (name, value) in &best.metadata {
        if let Some(v) = value.as_f64() {
            validation = validation.with_metric(name.as_str(), v);
        }
    }
    let meta = GeneMeta::from_config(&config.protocol).with_tag("synthetic");
    let payload = protocol::serialize(&best.gene, Some(validation), Some(meta));
    let json = protocol::to_json(&payload)?;

    let (restored, _, _) = protocol::decode_with_config(serde_json::from_str(&json)?, &config.protocol)
        .context("exported payload does not decode")?;
    log::debug!("Exported payload decodes to {}", restored.formula());
    println!("{}", json);

    Ok(())
}
