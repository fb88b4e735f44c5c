use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use segway_pipeline_utils::app::{App, DatasetSource, InputJsonRequest};
use segway_pipeline_utils::bed::{self, default_label_colors, parse_label_colors};
use segway_pipeline_utils::config::{Keypair, PORTAL_URL, PipelineParams};
use segway_pipeline_utils::domain::{Assay, Assembly};
use segway_pipeline_utils::error::SegwayError;
use segway_pipeline_utils::fs_util::{create_output, open_input};
use segway_pipeline_utils::genomedata::{self, GenomedataLoader, SystemGenomedataLoader};
use segway_pipeline_utils::input_json::write_input_json;
use segway_pipeline_utils::labels::write_num_labels;
use segway_pipeline_utils::portal::PortalHttpClient;
use segway_pipeline_utils::select::SelectionStrategy;
use segway_pipeline_utils::trackname::{make_trackname_assay, write_trackname_assay};

#[derive(Parser)]
#[command(name = "segway-utils")]
#[command(about = "Input preparation and post-processing for the Segway genome annotation pipeline")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build a Segway workflow input JSON from portal datasets")]
    InputJson(InputJsonArgs),
    #[command(about = "Compute the number of Segway labels for a track count")]
    NumLabels(NumLabelsArgs),
    #[command(about = "Load signal files into a genomedata archive")]
    Genomedata(GenomedataArgs),
    #[command(about = "Recolor an annotation BED from its labels")]
    Recolor(RecolorArgs),
    #[command(about = "Replace integer labels in an annotation BED with mnemonics")]
    Relabel(RelabelArgs),
    #[command(about = "Write the trackname/assay table")]
    TracknameAssay(TracknameAssayArgs),
}

#[derive(Args)]
struct InputJsonArgs {
    #[command(subcommand)]
    source: SourceCommand,

    #[command(flatten)]
    options: InputJsonOptions,
}

#[derive(Subcommand)]
enum SourceCommand {
    #[command(about = "Experiments on one donor's biosamples with a given term name")]
    Donor {
        donor: String,
        biosample_term_name: String,
    },
    #[command(about = "Datasets related to a reference epigenome")]
    ReferenceEpigenome { accession: String },
}

#[derive(Args)]
struct InputJsonOptions {
    #[arg(long, global = true, value_enum)]
    assembly: Option<Assembly>,

    #[arg(long, global = true, num_args = 1..)]
    skip_assays: Vec<Assay>,

    #[arg(long, global = true, num_args = 1.., conflicts_with = "core_marks")]
    chip_targets: Option<Vec<String>>,

    #[arg(long, global = true)]
    core_marks: bool,

    #[arg(long, global = true, value_enum, default_value_t = SelectionStrategy::PreferredDefault)]
    strategy: SelectionStrategy,

    #[arg(short, long, global = true, help = "Portal keypair JSON, only needed for in progress data")]
    keypair: Option<PathBuf>,

    #[arg(long, global = true, default_value = PORTAL_URL)]
    portal_url: String,

    #[arg(long, global = true, help = "Portal id of the chrom sizes file")]
    chrom_sizes: Option<String>,

    #[arg(long, global = true, help = "Portal id of the annotation GTF")]
    annotation_gtf: Option<String>,

    #[arg(long, global = true)]
    num_segway_cpus: Option<u32>,

    #[arg(long, global = true)]
    resolution: Option<u32>,

    #[arg(long, global = true)]
    minibatch_fraction: Option<f64>,

    #[arg(long, global = true)]
    max_train_rounds: Option<u32>,

    #[arg(long, global = true)]
    num_instances: Option<u32>,

    #[arg(long, global = true)]
    prior_strength: Option<f64>,

    #[arg(long, global = true)]
    segtransition_weight_scale: Option<f64>,

    #[arg(long, global = true, help = "Also write the found ChIP targets as segway.tracks")]
    tracks: bool,

    #[arg(short, long, global = true)]
    outfile: Option<PathBuf>,
}

#[derive(Args)]
struct NumLabelsArgs {
    #[arg(long)]
    num_tracks: u32,

    #[arg(short, long)]
    outfile: PathBuf,
}

#[derive(Args)]
struct GenomedataArgs {
    #[arg(long, num_args = 1.., required = true)]
    files: Vec<String>,

    #[arg(long)]
    sizes: String,

    #[arg(long, num_args = 1..)]
    tracks: Vec<String>,

    #[arg(short, long)]
    outfile: String,
}

#[derive(Args)]
struct RecolorArgs {
    bed: PathBuf,

    #[arg(long, help = "Tab-separated label to `r,g,b` table replacing the built-in palette")]
    colors: Option<PathBuf>,

    #[arg(short, long)]
    outfile: PathBuf,
}

#[derive(Args)]
struct RelabelArgs {
    bed: PathBuf,

    mnemonics: PathBuf,

    #[arg(short, long)]
    outfile: PathBuf,
}

#[derive(Args)]
struct TracknameAssayArgs {
    #[arg(long, num_args = 1.., required = true)]
    tracknames: Vec<String>,

    #[arg(long, num_args = 1.., required = true)]
    assays: Vec<String>,

    #[arg(long)]
    output_filename: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(segway) = report.downcast_ref::<SegwayError>() {
            return ExitCode::from(map_exit_code(segway));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SegwayError) -> u8 {
    match error {
        SegwayError::MissingBiosamples { .. }
        | SegwayError::MissingExperiments
        | SegwayError::MissingTargets(_)
        | SegwayError::MissingCoreTargets(_)
        | SegwayError::NoFiles => 2,
        SegwayError::PortalHttp(_)
        | SegwayError::PortalStatus { .. }
        | SegwayError::NonObjectResponse(_)
        | SegwayError::MissingTool(_)
        | SegwayError::ToolFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::InputJson(args) => run_input_json(args),
        Commands::NumLabels(args) => {
            let labels = write_num_labels(&args.outfile, args.num_tracks)?;
            println!("{labels}");
            Ok(())
        }
        Commands::Genomedata(args) => {
            let command =
                genomedata::make_command(&args.files, &args.sizes, &args.tracks, &args.outfile)?;
            SystemGenomedataLoader::new().run(&command)?;
            Ok(())
        }
        Commands::Recolor(args) => run_recolor(args),
        Commands::Relabel(args) => {
            let bed = open_input(&args.bed)?;
            let mnemonics = open_input(&args.mnemonics)?;
            let output = create_output(&args.outfile)?;
            bed::relabel_bed(bed, mnemonics, output)?;
            Ok(())
        }
        Commands::TracknameAssay(args) => {
            let rows = make_trackname_assay(&args.tracknames, &args.assays)?;
            let mut output = create_output(&args.output_filename)?;
            write_trackname_assay(&mut output, &rows)?;
            output.flush().into_diagnostic()?;
            Ok(())
        }
    }
}

fn run_input_json(args: InputJsonArgs) -> miette::Result<()> {
    let InputJsonArgs { source, options } = args;
    let source = match source {
        SourceCommand::Donor {
            donor,
            biosample_term_name,
        } => DatasetSource::Donor {
            donor: donor.parse()?,
            biosample_term_name,
        },
        SourceCommand::ReferenceEpigenome { accession } => {
            DatasetSource::ReferenceEpigenome(accession.parse()?)
        }
    };

    let keypair = options.keypair.as_deref().map(Keypair::load).transpose()?;
    let portal = PortalHttpClient::with_base_url(&options.portal_url, keypair)?;
    let app = App::new(portal);

    let outfile = options
        .outfile
        .clone()
        .unwrap_or_else(|| source.default_outfile());
    let request = InputJsonRequest {
        source,
        assembly: options.assembly,
        strategy: options.strategy,
        skip_assays: options.skip_assays,
        chip_targets: options.chip_targets,
        core_marks: options.core_marks,
        chrom_sizes: options.chrom_sizes,
        annotation_gtf: options.annotation_gtf,
        params: PipelineParams {
            num_segway_cpus: options.num_segway_cpus,
            resolution: options.resolution,
            minibatch_fraction: options.minibatch_fraction,
            max_train_rounds: options.max_train_rounds,
            num_instances: options.num_instances,
            prior_strength: options.prior_strength,
            segtransition_weight_scale: options.segtransition_weight_scale,
        },
        include_tracks: options.tracks,
    };
    let result = app.build_input_json(&request)?;
    write_input_json(&outfile, &result.input)?;
    println!(
        "Wrote {} signal files ({}) to {}",
        result.selection.files.len(),
        result.assembly,
        outfile.display()
    );
    Ok(())
}

fn run_recolor(args: RecolorArgs) -> miette::Result<()> {
    let colors = match &args.colors {
        Some(path) => parse_label_colors(open_input(path)?)?,
        None => default_label_colors(),
    };
    let input = open_input(&args.bed)?;
    let output = create_output(&args.outfile)?;
    bed::recolor_bed(input, output, &colors)?;
    Ok(())
}
