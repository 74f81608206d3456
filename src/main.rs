//! `polar360` command line entry point.
//!
//! ```text
//! polar360 [--config FILE] live [--period S]
//! polar360 [--config FILE] view <name|path>
//! polar360 [--config FILE] list
//! polar360 [--config FILE] delete <name> [--yes]
//! polar360 [--config FILE] render <path> <out.png> [--size W H] [--dpr R]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use polar360::app::{run_live, run_record, RecordSource};
use polar360::{
    save_png, BackendClient, LayoutMode, LogicalSize, MapAdapter, NoMap, Polar360Config,
    PolarView, StaticViewer,
};

const USAGE: &str = "usage: polar360 [--config FILE] <live [--period S] | view <name|path> | list | delete <name> [--yes] | render <path> <out.png> [--size W H] [--dpr R]>";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Live { period: Option<f64> },
    View { target: String },
    List,
    Delete { name: String, yes: bool },
    Render { input: PathBuf, output: PathBuf, size: LogicalSize, dpr: f32 },
}

#[derive(Debug, Clone, PartialEq)]
struct Cli {
    config: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli, String> {
    fn value<T: std::str::FromStr>(flag: &str, v: Option<String>) -> Result<T, String> {
        let v = v.ok_or_else(|| format!("{flag} needs a value"))?;
        v.parse().map_err(|_| format!("invalid value for {flag}: {v}"))
    }

    let mut args = args.into_iter();
    let mut config = None;
    let sub = loop {
        match args.next().as_deref() {
            Some("--config") => config = Some(PathBuf::from(value::<String>("--config", args.next())?)),
            Some(s) => break s.to_owned(),
            None => return Err(USAGE.into()),
        }
    };

    let command = match sub.as_str() {
        "live" => {
            let mut period = None;
            while let Some(a) = args.next() {
                match a.as_str() {
                    "--period" => period = Some(value("--period", args.next())?),
                    other => return Err(format!("unexpected argument {other}")),
                }
            }
            Command::Live { period }
        }
        "view" => Command::View {
            target: args.next().ok_or("view needs a record name or path")?,
        },
        "list" => Command::List,
        "delete" => {
            let mut name = None;
            let mut yes = false;
            for a in args.by_ref() {
                if a == "--yes" || a == "-y" {
                    yes = true;
                } else if name.is_none() {
                    name = Some(a);
                } else {
                    return Err(format!("unexpected argument {a}"));
                }
            }
            Command::Delete {
                name: name.ok_or("delete needs a record name")?,
                yes,
            }
        }
        "render" => {
            let input = PathBuf::from(args.next().ok_or("render needs an input record")?);
            let output = PathBuf::from(args.next().ok_or("render needs an output path")?);
            let mut size = LogicalSize::new(600.0, 600.0);
            let mut dpr = 1.0;
            while let Some(a) = args.next() {
                match a.as_str() {
                    "--size" => {
                        size = LogicalSize::new(
                            value("--size", args.next())?,
                            value("--size", args.next())?,
                        );
                    }
                    "--dpr" => dpr = value("--dpr", args.next())?,
                    other => return Err(format!("unexpected argument {other}")),
                }
            }
            Command::Render { input, output, size, dpr }
        }
        other => return Err(format!("unknown command {other}\n{USAGE}")),
    };
    Ok(Cli { config, command })
}

fn load_config(path: Option<&Path>) -> polar360::Result<Polar360Config> {
    let mut cfg = match path.map(Path::to_path_buf).or_else(Polar360Config::default_path) {
        Some(p) => Polar360Config::load(&p)?,
        None => Polar360Config::default(),
    };
    cfg.apply_env()?;
    Ok(cfg)
}

fn block_on<F: std::future::Future>(fut: F) -> std::io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(fut))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config(cli.config.as_deref())?;
    tracing::debug!(backend = %cfg.backend_url, "configuration loaded");

    match cli.command {
        Command::Live { period } => run_live(cfg, period)?,
        Command::View { target } => {
            let path = PathBuf::from(&target);
            let source = if path.is_file() {
                RecordSource::File(path)
            } else {
                RecordSource::Backend(target)
            };
            run_record(cfg, source)?;
        }
        Command::List => {
            let client = BackendClient::new(&cfg.backend_url, cfg.http_timeout())?;
            let items = block_on(client.list())??;
            if items.is_empty() {
                println!("no saved records");
            }
            for r in items {
                let equipo = if r.equipo.is_empty() { "—" } else { r.equipo.as_str() };
                println!("{}  {:>8} B  {:<12}  {}", r.modified(), r.size, equipo, r.name);
            }
        }
        Command::Delete { name, yes } => {
            let client = BackendClient::new(&cfg.backend_url, cfg.http_timeout())?;
            block_on(client.delete(&name, yes))??;
            println!("deleted {name}");
        }
        Command::Render { input, output, size, dpr } => {
            let text = std::fs::read_to_string(&input)?;
            let name = input.file_name().map(|n| n.to_string_lossy().into_owned());
            let view = PolarView::new(MapAdapter::new(|| NoMap), LayoutMode::Overlay);
            let mut viewer = StaticViewer::from_text(view, name.as_deref(), &text);
            viewer.view_mut().resize(size, dpr);
            let image = block_on(viewer.view_mut().capture())?;
            save_png(&image, &output)?;
            println!(
                "{} samples ({}) -> {}",
                viewer.count(),
                viewer.equipo().unwrap_or("—"),
                output.display()
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    polar360::logging::init();
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("polar360: {e}");
            ExitCode::FAILURE
        }
    }
}
