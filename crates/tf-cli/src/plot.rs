//! `tffit plot`: stacked diagnostic plots for every fit type, region,
//! and pt bin found in a shapes file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use tracing::info;

use tf_core::binning::N_PT;
use tf_store::ShapeStore;
use tf_viz::{stack_artifact, StackOptions};
use tf_viz_render::config::RenderConfig;
use tf_viz_render::render_to_file;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["data", "mc", "toys"])))]
pub struct PlotArgs {
    /// Working directory holding the shapes file
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Shapes file, relative to --dir
    #[arg(short, long, default_value = "shapes.json")]
    input_file: PathBuf,

    /// Fit type to plot; both when omitted
    #[arg(long, value_parser = ["prefit", "postfit"])]
    fit: Option<String>,

    /// Categories use the pqq/pcc/pbb scheme instead of pass/fail
    #[arg(long)]
    three_regions: bool,

    /// Do not blind the Higgs mass window on real data
    #[arg(long)]
    unmask: bool,

    /// Output folder, joined under --dir when relative
    #[arg(short, long, default_value = "plots")]
    output_folder: PathBuf,

    #[arg(long, default_value = "2017")]
    year: String,

    /// Overlay the Higgs samples scaled by 500 instead of stacking them
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    scale_higgs: bool,

    /// Observations are recorded data
    #[arg(long)]
    data: bool,

    /// Observations are summed MC
    #[arg(long)]
    mc: bool,

    /// Observations are post-fit toys
    #[arg(long)]
    toys: bool,
}

pub fn run(args: &PlotArgs) -> Result<()> {
    let out_dir = if args.output_folder.is_absolute() {
        args.output_folder.clone()
    } else {
        args.dir.join(&args.output_folder)
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output folder {}", out_dir.display()))?;

    let shapes_path = args.dir.join(&args.input_file);
    let store = ShapeStore::open(&shapes_path)
        .with_context(|| format!("opening shapes file {}", shapes_path.display()))?;

    let regions: &[&str] =
        if args.three_regions { &["pqq", "pcc", "pbb"] } else { &["pass", "fail"] };
    let fittypes: Vec<String> = match &args.fit {
        Some(f) => vec![f.clone()],
        None => vec!["prefit".to_string(), "postfit".to_string()],
    };

    let config = RenderConfig::default();
    for fittype in &fittypes {
        let opts = StackOptions {
            pseudo: args.mc,
            toys: args.toys,
            mask: !args.unmask,
            scale_higgs: args.scale_higgs,
            sqrt_n_err: false,
            fittype: fittype.clone(),
            year: args.year.clone(),
        };
        plot_fittype(&store, regions, &opts, &out_dir, &config)?;
    }

    // input shapes are an optional side file; their plots use raw sqrt(N)
    // errors since the store carries no fit result
    let inputs_path = args.dir.join("inputs.json");
    if inputs_path.exists() {
        let inputs = ShapeStore::open(&inputs_path)
            .with_context(|| format!("opening input shapes {}", inputs_path.display()))?;
        let opts = StackOptions {
            pseudo: args.mc,
            toys: args.toys,
            mask: !args.unmask,
            scale_higgs: args.scale_higgs,
            sqrt_n_err: true,
            fittype: "inputs".to_string(),
            year: args.year.clone(),
        };
        plot_fittype(&inputs, regions, &opts, &out_dir, &config)?;
    } else {
        info!(path = %inputs_path.display(), "no input-shapes file, skipping inputs plots");
    }

    Ok(())
}

fn plot_fittype(
    store: &ShapeStore,
    regions: &[&str],
    opts: &StackOptions,
    out_dir: &Path,
    config: &RenderConfig,
) -> Result<()> {
    for region in regions {
        let keys: Vec<String> =
            (0..N_PT).map(|i| format!("ptbin{i}{region}_{}", opts.fittype)).collect();

        // all pt bins summed, then each bin on its own
        plot_categories(store, &keys, opts, out_dir, config)?;
        for key in &keys {
            plot_categories(store, std::slice::from_ref(key), opts, out_dir, config)?;
        }

        let muon_key = format!("muonCR{region}_{}", opts.fittype);
        if store.category_names().iter().any(|c| *c == muon_key) {
            plot_categories(store, std::slice::from_ref(&muon_key), opts, out_dir, config)?;
        } else {
            info!(category = %muon_key, "muon control region not present, skipping");
        }
    }
    Ok(())
}

fn plot_categories(
    store: &ShapeStore,
    keys: &[String],
    opts: &StackOptions,
    out_dir: &Path,
    config: &RenderConfig,
) -> Result<()> {
    let mut cats = Vec::with_capacity(keys.len());
    for key in keys {
        cats.push((key.clone(), store.category(key)?));
    }
    let artifact = stack_artifact(&cats, opts)?;
    let path = out_dir.join(format!("{}.png", artifact.name));
    render_to_file(&artifact, &path, config)
        .with_context(|| format!("rendering {}", path.display()))?;
    info!(plot = %artifact.name, "wrote {}", path.display());
    Ok(())
}
