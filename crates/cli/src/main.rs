use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mpprob_core::data::{read_genotypes, read_ibd, read_map, MpCross};
use mpprob_core::genetics::{classify, MapFunction, Pedigree};
use mpprob_core::prob::{call_block, FounderProbBuilder, FounderProbs, Strategy};

#[derive(Parser)]
#[command(name = "mpprob")]
#[command(version)]
#[command(about = "Founder-origin probabilities for multi-parent recombinant inbred lines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute founder probabilities and founder calls
    Probs {
        /// Founder genotypes CSV (id, marker columns...)
        #[arg(long)]
        founders: PathBuf,

        /// Final individual genotypes CSV (id, marker columns...)
        #[arg(long)]
        finals: PathBuf,

        /// Genetic map CSV (marker, chromosome, position)
        #[arg(long)]
        map: PathBuf,

        /// Pedigree CSV (id, mother, father[, observed, design])
        #[arg(long)]
        pedigree: PathBuf,

        /// IBD truth CSV; used instead of a strategy with --use-ibd
        #[arg(long)]
        ibd: Option<PathBuf>,

        #[arg(long, requires = "ibd")]
        use_ibd: bool,

        /// Step size in cM: 0 = markers only, negative = interval midpoints
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        step: f64,

        /// Drop marker positions from a stepped grid
        #[arg(long)]
        no_markers: bool,

        /// "haldane" (default) or "kosambi"
        #[arg(long, default_value = "haldane")]
        map_function: String,

        /// "multipoint" (default), "internal" or "haplotype"
        #[arg(long, default_value = "multipoint")]
        strategy: String,

        /// Probability a founder must exceed to be called
        #[arg(long, default_value = "0.7")]
        threshold: f64,

        /// Genotyping error probability
        #[arg(long, default_value = "1e-4")]
        error_prob: f64,

        /// Override the generation count derived from the design
        #[arg(long)]
        generations: Option<u32>,

        /// Restrict to these chromosomes (repeatable, output follows this order)
        #[arg(long = "chromosome")]
        chromosomes: Vec<String>,

        /// Give up after this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Keep the flat design files of the haplotype strategy here
        #[arg(long)]
        design_dir: Option<PathBuf>,

        /// Write probs_<chr>.csv and calls_<chr>.csv into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format on stdout: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Classify the breeding design of every observed individual
    Design {
        /// Pedigree CSV (id, mother, father[, observed, design])
        #[arg(short, long)]
        pedigree: PathBuf,

        /// Founder genotypes CSV; its row order fixes the founder indices
        #[arg(long)]
        founders: Option<PathBuf>,
    },

    /// Re-call founders from a probability CSV at a new threshold
    Call {
        /// A probs_<chr>.csv file written by `probs`
        #[arg(short, long)]
        probs: PathBuf,

        /// Number of founders (block size)
        #[arg(short = 'n', long)]
        n_founders: usize,

        #[arg(long, default_value = "0.7")]
        threshold: f64,

        /// Output CSV (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Probs {
            founders,
            finals,
            map,
            pedigree,
            ibd,
            use_ibd,
            step,
            no_markers,
            map_function,
            strategy,
            threshold,
            error_prob,
            generations,
            chromosomes,
            deadline,
            design_dir,
            out,
            format,
        } => {
            let cross = load_cross(&founders, &finals, &map, &pedigree, ibd.as_deref())?;

            let map_function: MapFunction = map_function.parse().context("Invalid --map-function")?;
            let strategy: Strategy = strategy.parse().context("Invalid --strategy")?;
            let mut builder = FounderProbBuilder::new(&cross)
                .step(step)
                .include_markers(!no_markers)
                .map_function(map_function)
                .strategy(strategy)
                .threshold(threshold)
                .error_prob(error_prob)
                .use_ibd(use_ibd);
            if let Some(g) = generations {
                builder = builder.generations(g);
            }
            if !chromosomes.is_empty() {
                builder = builder.chromosomes(chromosomes);
            }
            if let Some(secs) = deadline {
                builder = builder.deadline(Duration::from_secs(secs));
            }
            if let Some(dir) = design_dir {
                builder = builder.design_dir(dir);
            }

            let job = builder.build().context("Invalid probability settings")?;
            if let Some(cls) = job.classification() {
                let design = cls
                    .uniform_design()
                    .map_or_else(|e| e.to_string(), |d| d.to_string());
                eprintln!("Design: {}", design);
            }
            let result = job.run().context("Founder probability computation failed")?;

            if let Some(dir) = out {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create '{}'", dir.display()))?;
                let files = result
                    .write_csv(&dir)
                    .with_context(|| format!("Failed to write results to '{}'", dir.display()))?;
                eprintln!("Wrote {} files to '{}'", files.len(), dir.display());
            }

            match format.to_lowercase().as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&result)?),
                _ => print_summary(&result),
            }
            Ok(())
        }
        Commands::Design { pedigree, founders } => cmd_design(&pedigree, founders.as_deref()),
        Commands::Call {
            probs,
            n_founders,
            threshold,
            out,
        } => cmd_call(&probs, n_founders, threshold, out.as_deref()),
    }
}

fn load_cross(
    founders: &Path,
    finals: &Path,
    map: &Path,
    pedigree: &Path,
    ibd: Option<&Path>,
) -> Result<MpCross> {
    let founders = read_genotypes(founders)
        .with_context(|| format!("Failed to load founders from '{}'", founders.display()))?;
    let finals = read_genotypes(finals)
        .with_context(|| format!("Failed to load finals from '{}'", finals.display()))?;
    let map = read_map(map)
        .with_context(|| format!("Failed to load map from '{}'", map.display()))?;
    let pedigree = Pedigree::from_csv(pedigree)
        .with_context(|| format!("Failed to load pedigree from '{}'", pedigree.display()))?;

    eprintln!(
        "Loaded {} founders, {} final individuals, {} markers on {} chromosomes",
        founders.n_rows(),
        finals.n_rows(),
        map.n_markers(),
        map.n_chromosomes()
    );

    let mut cross = MpCross::new(founders, finals, pedigree, map).context("Inconsistent inputs")?;
    if let Some(path) = ibd {
        let ibd = read_ibd(path)
            .with_context(|| format!("Failed to load IBD matrix from '{}'", path.display()))?;
        cross = cross.with_ibd(ibd).context("IBD matrix does not match the cross")?;
    }
    Ok(cross)
}

fn print_summary(result: &FounderProbs) {
    let meta = &result.metadata;
    println!(
        "strategy: {}  step: {}  map: {}  threshold: {}",
        meta.strategy.map_or_else(|| "ibd".to_string(), |s| s.to_string()),
        meta.step,
        meta.map_function,
        meta.threshold
    );
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>12}",
        "chromosome", "positions", "undefined", "no call", "mean recomb"
    );
    for (name, probs) in &result.probabilities {
        let Some(calls) = result.calls.get(name) else {
            continue;
        };
        let recomb = calls.recombination_counts();
        let mean = if recomb.is_empty() {
            0.0
        } else {
            recomb.iter().sum::<usize>() as f64 / recomb.len() as f64
        };
        println!(
            "{:<12} {:>10} {:>9.1}% {:>9.1}% {:>12.2}",
            name,
            probs.n_positions(),
            100.0 * probs.undefined_fraction(),
            100.0 * calls.missing_fraction(),
            mean
        );
    }
}

fn cmd_design(pedigree_path: &Path, founders_path: Option<&Path>) -> Result<()> {
    let pedigree = Pedigree::from_csv(pedigree_path)
        .with_context(|| format!("Failed to load pedigree from '{}'", pedigree_path.display()))?;

    let founder_ids: Vec<String> = match founders_path {
        Some(path) => read_genotypes(path)
            .with_context(|| format!("Failed to load founders from '{}'", path.display()))?
            .ids()
            .to_vec(),
        None => pedigree
            .founders()
            .into_iter()
            .map(|i| pedigree.id(i).to_string())
            .collect(),
    };

    let cls = classify(&pedigree, &founder_ids).context("Design classification failed")?;
    println!(
        "{} observed individuals ({})",
        cls.designs.len(),
        if cls.annotated { "annotated" } else { "classified" }
    );
    for (id, design) in &cls.designs {
        println!("  {:<16} {}", id, design);
    }
    match cls.uniform_design() {
        Ok(design) => {
            println!("Uniform design: {}", design);
            match design.cross_spec() {
                Ok(spec) => println!(
                    "Cross type: {} ({} generations of inbreeding)",
                    spec.cross_type.label(),
                    spec.generations
                ),
                Err(e) => println!("No cross type: {}", e),
            }
        }
        Err(e) => println!("{}", e),
    }
    Ok(())
}

fn cmd_call(
    probs_path: &Path,
    n_founders: usize,
    threshold: f64,
    out: Option<&Path>,
) -> Result<()> {
    if n_founders == 0 {
        anyhow::bail!("--n-founders must be positive");
    }
    if !(threshold > 0.0 && threshold <= 1.0) {
        anyhow::bail!("--threshold must be in (0, 1], got {}", threshold);
    }

    let mut reader = csv::Reader::from_path(probs_path)
        .with_context(|| format!("Failed to open '{}'", probs_path.display()))?;
    let headers = reader.headers()?.clone();
    let labels: Vec<&str> = headers.iter().skip(1).collect();
    if labels.len() % n_founders != 0 {
        anyhow::bail!(
            "'{}' has {} probability columns, not a multiple of {} founders",
            probs_path.display(),
            labels.len(),
            n_founders
        );
    }
    let positions: Vec<String> = labels
        .chunks(n_founders)
        .map(|block| {
            block[0]
                .rsplit_once(", Founder ")
                .map_or(block[0], |(name, _)| name)
                .to_string()
        })
        .collect();

    let writer: Box<dyn std::io::Write> = match out {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["id".to_string()];
    header.extend(positions.iter().cloned());
    wtr.write_record(&header)?;

    let mut n_rows = 0usize;
    for record in reader.records() {
        let record = record?;
        let id = record.get(0).unwrap_or_default().to_string();
        let values: Vec<f64> = record
            .iter()
            .skip(1)
            .map(|v| if v == "NA" { Ok(f64::NAN) } else { v.parse::<f64>() })
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Bad probability in row '{}'", id))?;
        let mut row = vec![id];
        row.extend(values.chunks(n_founders).map(|block| {
            call_block(block, threshold).map_or_else(|| "NA".to_string(), |f| f.to_string())
        }));
        wtr.write_record(&row)?;
        n_rows += 1;
    }
    wtr.flush()?;
    eprintln!(
        "Called {} individuals at {} positions (threshold {})",
        n_rows,
        positions.len(),
        threshold
    );
    Ok(())
}
