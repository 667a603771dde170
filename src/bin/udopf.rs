use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use udopf::{load_case, run_dc_opf, run_ud_opf, DenseLu, SolverOpts};

/// DC optimal power flow and unit decommitment.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// DC Optimal Power Flow
    #[clap(name = "opf")]
    Opf(OpfArgs),

    /// Unit Decommitment OPF
    #[clap(name = "ud")]
    UnitDecommitment(OpfArgs),
}

#[derive(Args)]
struct OpfArgs {
    /// The input case file (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Enforce branch flow limits.
    #[arg(long, default_value_t = false)]
    pub flow_limits: bool,

    /// Maximum number of interior point iterations.
    #[arg(long)]
    pub max_it: Option<usize>,

    /// Log per-iteration convergence data.
    #[arg(long, default_value_t = false)]
    pub progress: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let args = match &cli.command {
        Commands::Opf(args) => args,
        Commands::UnitDecommitment(args) => args,
    };

    let mut net = load_case(&args.input)?;

    let mut opts = SolverOpts {
        flow_limits: args.flow_limits,
        show_progress: args.progress,
        ..Default::default()
    };
    if let Some(max_it) = args.max_it {
        opts.max_iterations = max_it;
    }

    let solver = DenseLu::from_opts(&opts);

    let (success, f) = match &cli.command {
        Commands::Opf(_) => {
            let report = run_dc_opf(&mut net, &opts, &solver)?;
            (report.success, report.f)
        }
        Commands::UnitDecommitment(_) => {
            let report = run_ud_opf(&mut net, &opts, &solver)?;
            (report.success, report.f)
        }
    };
    if !success {
        return Err(anyhow::anyhow!("optimal power flow did not converge"));
    }

    println!("objective: {:.2} $/hr", f);
    for (k, g) in net.gen.iter().enumerate() {
        let status = if g.status { "on " } else { "off" };
        println!("gen {:3} [{}]  bus {:3}  {:9.2} MW", k, status, g.bus, g.pg);
    }
    for (j, br) in net.branch.iter().enumerate() {
        println!(
            "branch {:3}  {:3} -> {:3}  {:9.2} MW",
            j, br.from_bus, br.to_bus, br.pf
        );
    }

    Ok(())
}
