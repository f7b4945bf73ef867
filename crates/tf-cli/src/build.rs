//! `tffit build`: assemble the fit model document from templates.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use tracing::info;

use tf_model::{build_model, BuildOptions};
use tf_store::TemplateStore;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["data", "mc"])))]
pub struct BuildArgs {
    /// Template store (flat JSON)
    #[arg(short, long, default_value = "templates.json")]
    input_file: PathBuf,

    /// Output directory for the model document
    #[arg(short, long, default_value = "model")]
    output_dir: PathBuf,

    /// Poisson-fluctuate pseudo-data observations
    #[arg(long)]
    throw_poisson: bool,

    /// Fit a Bernstein surface to the MC QCD pass/fail ratio first
    #[arg(long)]
    mctf: bool,

    /// Derive tagged-region QCD from the light region via transfer factors
    #[arg(long)]
    fit_tf: bool,

    /// Float the vector-sample region efficiencies
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    param_vectors: bool,

    /// Use matched V/H templates
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    matched: bool,

    /// Pseudo-data RNG seed
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Observations come from recorded data templates
    #[arg(long)]
    data: bool,

    /// Observations come from summed MC
    #[arg(long)]
    mc: bool,
}

pub fn run(args: &BuildArgs) -> Result<()> {
    let store = TemplateStore::open(&args.input_file)
        .with_context(|| format!("opening template store {}", args.input_file.display()))?;

    let opts = BuildOptions {
        pseudo: args.mc,
        throw_poisson: args.throw_poisson,
        mctf: args.mctf,
        fit_tf: args.fit_tf,
        param_vectors: args.param_vectors,
        matched: args.matched,
        seed: args.seed,
    };
    let out = build_model(&store, &opts)?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating output directory {}", args.output_dir.display()))?;
    let model_path = args.output_dir.join("model.json");
    std::fs::write(&model_path, serde_json::to_string_pretty(&out.model)?)
        .with_context(|| format!("writing {}", model_path.display()))?;
    info!(channels = out.model.channels.len(), "wrote {}", model_path.display());

    if let Some(deco) = &out.deco {
        let deco_path = args.output_dir.join("deco_transform.json");
        std::fs::write(&deco_path, serde_json::to_string_pretty(deco)?)
            .with_context(|| format!("writing {}", deco_path.display()))?;
        info!("wrote {}", deco_path.display());
    }

    Ok(())
}
