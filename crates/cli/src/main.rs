use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use subtile::net::{ServeOpts, Server};
use subtile::{persist, solve_local, NetCfg, Problem, ProblemParams, SchedulerCfg, SolveReport};
use tracing_subscriber::fmt::SubscriberBuilder;

#[derive(Parser)]
#[command(name = "tilefarm")]
#[command(about = "Substitution rule search for n-fold triangle tilings")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Run the search in this process and write a results file
    Solve {
        #[command(flatten)]
        task: TaskArgs,
        #[command(flatten)]
        pool: PoolArgs,
        /// Results file
        #[arg(long, default_value = "results.json")]
        out: PathBuf,
        /// Witness catalogue to restore before and rewrite after the run
        #[arg(long)]
        catalogue: Option<PathBuf>,
    },
    /// Coordinate a distributed run over TCP
    Serve {
        #[command(flatten)]
        task: TaskArgs,
        #[command(flatten)]
        pool: PoolArgs,
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:9461")]
        listen: String,
        /// Results file
        #[arg(long, default_value = "results.json")]
        out: PathBuf,
        /// Witness catalogue to restore before and rewrite after the run
        #[arg(long)]
        catalogue: Option<PathBuf>,
        /// Creating this file asks the run to checkpoint and exit
        #[arg(long)]
        stop_file: Option<PathBuf>,
        /// Shared secret workers must present
        #[arg(long)]
        token: Option<String>,
        /// Seconds between interim checkpoints; 0 disables them
        #[arg(long)]
        checkpoint_secs: Option<u64>,
    },
    /// Lend this machine's cores to a serve process
    Work {
        #[command(flatten)]
        task: TaskArgs,
        #[command(flatten)]
        pool: PoolArgs,
        /// Coordinator address
        #[arg(long)]
        connect: String,
        /// Shared secret the coordinator expects
        #[arg(long)]
        token: Option<String>,
        /// Witness catalogue; must match the coordinator's when the task
        /// restricts breakdowns
        #[arg(long)]
        catalogue: Option<PathBuf>,
    },
    /// Summarize the edge-breakdown catalogue for a task
    Catalogue {
        #[command(flatten)]
        task: TaskArgs,
        /// Witness file to report on instead of the full enumeration
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

/// Task selection. Flags override fields of the params file.
#[derive(Args)]
struct TaskArgs {
    /// Task parameters as JSON; defaults to the sevenfold Danzer task
    #[arg(long)]
    params: Option<PathBuf>,
    /// Symmetry order n
    #[arg(long)]
    symmetry: Option<usize>,
    /// Prototile angle triples, e.g. "1,2,4;1,3,3;2,2,3"
    #[arg(long)]
    prototiles: Option<String>,
    /// Inflation factor as coefficients over the length classes, e.g. "0,0,1"
    #[arg(long)]
    lambda: Option<String>,
    /// Index of the prototile being inflated
    #[arg(long)]
    target: Option<usize>,
    /// Required tile counts per prototile, e.g. "21,14,14"
    #[arg(long)]
    counts: Option<String>,
    /// Side of the inflated triangle the search fills first
    #[arg(long)]
    start_side: Option<usize>,
    /// Only allow edge breakdowns already witnessed in the catalogue
    #[arg(long)]
    restrict: bool,
}

#[derive(Args)]
struct PoolArgs {
    /// Worker threads; defaults to the available parallelism
    #[arg(long)]
    workers: Option<usize>,
    /// Directory for crash postmortem files
    #[arg(long)]
    postmortem_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Solve {
            task,
            pool,
            out,
            catalogue,
        } => solve(task, pool, out, catalogue),
        Action::Serve {
            task,
            pool,
            listen,
            out,
            catalogue,
            stop_file,
            token,
            checkpoint_secs,
        } => serve(
            task,
            pool,
            listen,
            out,
            catalogue,
            stop_file,
            token,
            checkpoint_secs,
        ),
        Action::Work {
            task,
            pool,
            connect,
            token,
            catalogue,
        } => work(task, pool, connect, token, catalogue),
        Action::Catalogue { task, file } => catalogue_report(task, file),
    }
}

fn solve(task: TaskArgs, pool: PoolArgs, out: PathBuf, catalogue: Option<PathBuf>) -> Result<()> {
    let params = load_params(&task)?;
    let mut pb = Problem::build(&params)?;
    restore_catalogue(&catalogue, &params, &mut pb)?;
    let pb = Arc::new(pb);

    let report = solve_local(&pb, &pool_cfg(&pool));

    persist::write_results(&out, &params, &report.stats, &report.patches, report.complete)?;
    if let Some(path) = &catalogue {
        persist::write_catalogue(path, params.n, &params.lambda, &report.tree)?;
    }
    summarize(&report)
}

#[allow(clippy::too_many_arguments)]
fn serve(
    task: TaskArgs,
    pool: PoolArgs,
    listen: String,
    out: PathBuf,
    catalogue: Option<PathBuf>,
    stop_file: Option<PathBuf>,
    token: Option<String>,
    checkpoint_secs: Option<u64>,
) -> Result<()> {
    let params = load_params(&task)?;
    let mut pb = Problem::build(&params)?;
    restore_catalogue(&catalogue, &params, &mut pb)?;

    let mut net = net_cfg(token);
    if let Some(secs) = checkpoint_secs {
        net.checkpoint_every_ms = (secs > 0).then_some(secs * 1_000);
    }
    let opts = ServeOpts {
        addr: listen,
        results_path: out,
        catalogue_path: catalogue,
        stop_file,
    };
    let server = Server::bind(Arc::new(pb), params, pool_cfg(&pool), net, opts)?;
    let report = server.run()?;
    summarize(&report)
}

fn work(
    task: TaskArgs,
    pool: PoolArgs,
    connect: String,
    token: Option<String>,
    catalogue: Option<PathBuf>,
) -> Result<()> {
    let params = load_params(&task)?;
    let mut pb = Problem::build(&params)?;
    restore_catalogue(&catalogue, &params, &mut pb)?;
    subtile::net::work(Arc::new(pb), &pool_cfg(&pool), &net_cfg(token), &connect)?;
    Ok(())
}

fn catalogue_report(task: TaskArgs, file: Option<PathBuf>) -> Result<()> {
    let params = load_params(&task)?;
    let mut pb = Problem::build(&params)?;
    match &file {
        Some(path) => {
            if !persist::load_catalogue_into(path, params.n, &params.lambda, &mut pb.tree)? {
                bail!("{} does not match this task", path.display());
            }
            let witnessed = pb.tree.export_witnessed();
            println!(
                "{} witnessed breakdowns in {}",
                witnessed.len(),
                path.display()
            );
            for p in &witnessed {
                println!("  d{} = {}  ({} uses)", p.class, breakdown(&p.lens), p.uses);
            }
        }
        None => {
            println!(
                "catalogue for n={} lambda={:?}: {} nodes",
                params.n,
                params.lambda,
                pb.tree.len()
            );
            for (i, count) in pb.tree.terminal_counts().iter().enumerate() {
                println!("  d{}: {} complete breakdowns", i + 1, count);
            }
        }
    }
    Ok(())
}

fn breakdown(lens: &[u8]) -> String {
    let parts: Vec<String> = lens.iter().map(|c| format!("d{c}")).collect();
    parts.join(" + ")
}

fn summarize(report: &SolveReport) -> Result<()> {
    if report.invariant_failures > 0 {
        bail!(
            "{} work units crashed; see the postmortem directory",
            report.invariant_failures
        );
    }
    if !report.complete {
        tracing::warn!("stopped before exhausting the tree, results are partial");
    }
    println!(
        "{} complete patches ({} tiles placed, {} dead ends, {} work units)",
        report.patches.len(),
        report.stats.placed,
        report.stats.dead_ends,
        report.units
    );
    Ok(())
}

fn load_params(task: &TaskArgs) -> Result<ProblemParams> {
    let mut params = match &task.params {
        Some(path) => persist::read_json::<ProblemParams>(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            if task.symmetry.is_none() && task.prototiles.is_none() {
                tracing::info!("no task given, running the sevenfold Danzer task");
            }
            ProblemParams::sevenfold()
        }
    };
    if let Some(n) = task.symmetry {
        params.n = n;
    }
    if let Some(s) = &task.prototiles {
        params.prototiles = parse_triples(s)?;
        // counts are only meaningful against the proto list they came with
        params.counts = None;
    }
    if let Some(s) = &task.lambda {
        params.lambda = parse_list(s)?;
    }
    if let Some(t) = task.target {
        params.target = t;
    }
    if let Some(s) = &task.counts {
        params.counts = Some(parse_list(s)?);
    }
    if let Some(side) = task.start_side {
        params.start_side = Some(side);
    }
    if task.restrict {
        params.restrict = true;
    }
    Ok(params)
}

fn parse_triples(s: &str) -> Result<Vec<[u8; 3]>> {
    let mut out = Vec::new();
    for part in s.split(';').filter(|p| !p.trim().is_empty()) {
        let nums: Vec<u8> = parse_list(part)?;
        let &[a, b, c] = nums.as_slice() else {
            bail!("prototile {part:?} needs exactly three angle numerators");
        };
        out.push([a, b, c]);
    }
    if out.is_empty() {
        bail!("no prototiles in {s:?}");
    }
    Ok(out)
}

fn parse_list<T>(s: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.split(',')
        .map(|p| {
            p.trim()
                .parse::<T>()
                .with_context(|| format!("bad number {:?}", p.trim()))
        })
        .collect()
}

fn restore_catalogue(
    path: &Option<PathBuf>,
    params: &ProblemParams,
    pb: &mut Problem,
) -> Result<()> {
    let Some(path) = path else {
        if params.restrict {
            bail!("a restricted task needs --catalogue to say which breakdowns are allowed");
        }
        return Ok(());
    };
    if persist::load_catalogue_into(path, params.n, &params.lambda, &mut pb.tree)? {
        tracing::info!(path = %path.display(), "restored witness catalogue");
    } else if params.restrict {
        bail!(
            "task restricts breakdowns but {} has no usable catalogue",
            path.display()
        );
    }
    Ok(())
}

fn pool_cfg(pool: &PoolArgs) -> SchedulerCfg {
    let mut cfg = SchedulerCfg::default();
    if let Some(w) = pool.workers {
        cfg.workers = w.max(1);
        cfg.low_water = 2 * cfg.workers;
    }
    cfg.postmortem_dir = pool.postmortem_dir.clone();
    cfg
}

fn net_cfg(token: Option<String>) -> NetCfg {
    let mut cfg = NetCfg::default();
    if let Some(token) = token {
        cfg.token = token;
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triples_parse_semicolon_separated() {
        let got = parse_triples("1,2,4;1,3,3;2,2,3").unwrap();
        assert_eq!(got, vec![[1, 2, 4], [1, 3, 3], [2, 2, 3]]);
        assert_eq!(parse_triples("1,1,2").unwrap(), vec![[1, 1, 2]]);
        assert!(parse_triples("1,2").is_err());
        assert!(parse_triples("").is_err());
    }

    #[test]
    fn lists_parse_with_stray_spaces() {
        let got: Vec<i64> = parse_list("0, 0, 1").unwrap();
        assert_eq!(got, vec![0, 0, 1]);
        assert!(parse_list::<u32>("3,x").is_err());
    }

    #[test]
    fn inline_flags_override_the_default_task() {
        let task = TaskArgs {
            params: None,
            symmetry: Some(4),
            prototiles: Some("1,1,2".into()),
            lambda: Some("0,1".into()),
            target: Some(0),
            counts: None,
            start_side: Some(2),
            restrict: false,
        };
        let params = load_params(&task).unwrap();
        assert_eq!(params.n, 4);
        assert_eq!(params.prototiles, vec![[1, 1, 2]]);
        assert_eq!(params.lambda, vec![0, 1]);
        assert_eq!(params.target, 0);
        assert_eq!(params.counts, None);
        assert_eq!(params.start_side, Some(2));
    }

    #[test]
    fn a_params_file_round_trips_through_solve_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        let params = ProblemParams::sevenfold();
        std::fs::write(&path, serde_json::to_vec(&params).unwrap()).unwrap();
        let task = TaskArgs {
            params: Some(path),
            symmetry: None,
            prototiles: None,
            lambda: None,
            target: None,
            counts: None,
            start_side: None,
            restrict: true,
        };
        let got = load_params(&task).unwrap();
        assert_eq!(got.n, params.n);
        assert_eq!(got.prototiles, params.prototiles);
        assert!(got.restrict);
    }
}
