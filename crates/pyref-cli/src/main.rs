use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pyref_config::{init_tracing, load_discovered, PyrefConfig};
use pyref_index::{MemberKind, QualifiedSymbol, SearchOptions, SymbolCategory, SymbolEntry};
use pyref_remote::RemoteDetailRecord;
use pyref_workspace::{
    CacheStatus, CategoryStatus, Collaborators, RefreshMode, RefreshReport, Workspace,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pyref",
    version,
    about = "PyRef index (built-ins, installed packages, remote index)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Config file to use instead of `PYREF_CONFIG_PATH` / `pyref.toml` / `~/.pyref.toml`
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit JSON suitable for scripts
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Bring every index category up to date
    Refresh(RefreshArgs),
    /// Substring search across built-ins, installed packages, and the remote index
    Search(SearchArgs),
    /// List every symbol of one category
    List(ListArgs),
    /// Describe one symbol, e.g. `installed:json.dumps`
    Show(ShowArgs),
    /// Fetch (or read cached) metadata for a remote package
    Detail(DetailArgs),
    /// Inspect or clear the persistent cache
    Cache(CacheArgs),
}

#[derive(Args)]
struct RefreshArgs {
    /// Ignore TTLs and recompute everything
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct SearchArgs {
    query: String,
    #[arg(long)]
    case_sensitive: bool,
    /// Only use what is already cached; never recompute
    #[arg(long)]
    cached: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Builtin,
    Installed,
    Remote,
}

impl From<CategoryArg> for SymbolCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Builtin => SymbolCategory::Builtin,
            CategoryArg::Installed => SymbolCategory::Installed,
            CategoryArg::Remote => SymbolCategory::Remote,
        }
    }
}

#[derive(Args)]
struct ListArgs {
    #[arg(value_enum)]
    category: CategoryArg,
    #[arg(long)]
    cached: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// `category:name`
    symbol: String,
    #[arg(long)]
    cached: bool,
}

#[derive(Args)]
struct DetailArgs {
    package: String,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    Status,
    Clean,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn load_config(cli: &Cli) -> Result<(PyrefConfig, Option<PathBuf>)> {
    match &cli.config {
        Some(path) => {
            let config = PyrefConfig::load_from_path(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            Ok((config, Some(path.clone())))
        }
        None => {
            let cwd = std::env::current_dir().context("failed to determine working directory")?;
            Ok(load_discovered(&cwd)?)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let (config, config_path) = load_config(&cli)?;
    init_tracing(&config.logging);
    if let Some(path) = &config_path {
        tracing::debug!(target: "pyref.cli", path = %path.display(), "loaded config");
    }

    let mut ws = Workspace::open(&config, Collaborators::from_config(&config))?;
    let json = cli.json;

    match cli.command {
        Command::Refresh(args) => {
            let mode = if args.force {
                RefreshMode::Force
            } else {
                RefreshMode::Startup
            };
            let report = ws.refresh(mode);
            print_refresh_report(&report, json)?;
            Ok(0)
        }
        Command::Search(args) => {
            refresh_unless_cached(&mut ws, args.cached, json);
            let hits = ws.query().search_with(
                &args.query,
                SearchOptions {
                    case_sensitive: args.case_sensitive,
                },
            )?;
            print_symbols(&hits, json)?;
            Ok(0)
        }
        Command::List(args) => {
            refresh_unless_cached(&mut ws, args.cached, json);
            let symbols = ws.query().list(args.category.into());
            print_symbols(&symbols, json)?;
            Ok(0)
        }
        Command::Show(args) => {
            let symbol: QualifiedSymbol = args
                .symbol
                .parse()
                .with_context(|| format!("invalid symbol `{}`", args.symbol))?;
            refresh_unless_cached(&mut ws, args.cached, json);
            let Some(entry) = ws.query().lookup(&symbol) else {
                eprintln!("{symbol}: not found");
                return Ok(1);
            };
            let cached_detail = match entry {
                SymbolEntry::RemotePackage { name } => {
                    ws.cached_detail(name).map(|record| record.payload)
                }
                _ => None,
            };
            let view = SymbolView::new(&symbol, entry, cached_detail);
            print_symbol_view(&view, json)?;
            Ok(0)
        }
        Command::Detail(args) => {
            let (detail, stale) = match ws.fetch_detail(&args.package) {
                Some(detail) => (detail, false),
                None => match ws.cached_detail(&args.package) {
                    Some(record) => (record.payload, true),
                    None => {
                        eprintln!("{}: no metadata available", args.package);
                        return Ok(1);
                    }
                },
            };
            print_detail(&DetailView { detail, stale }, json)?;
            Ok(0)
        }
        Command::Cache(args) => match args.command {
            CacheCommand::Status => {
                print_cache_status(&ws.cache_status(), json)?;
                Ok(0)
            }
            CacheCommand::Clean => {
                let removed = ws.clear_cache()?;
                if json {
                    println!("{}", serde_json::json!({ "removed": removed }));
                } else {
                    println!("removed {removed} cache files");
                }
                Ok(0)
            }
        },
    }
}

fn refresh_unless_cached(ws: &mut Workspace, cached: bool, json: bool) {
    if cached {
        return;
    }
    let report = ws.refresh(RefreshMode::Startup);
    if !json {
        for (label, status) in report_rows(&report) {
            if let Some(error) = &status.error {
                eprintln!("warning: {label}: {error}");
            }
        }
    }
}

fn report_rows(report: &RefreshReport) -> [(&'static str, &CategoryStatus); 3] {
    [
        ("builtins", &report.builtins),
        ("installed", &report.installed),
        ("remote", &report.remote),
    ]
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_refresh_report(report: &RefreshReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    for (label, status) in report_rows(report) {
        let state = serde_json::to_value(status.state)?;
        let state = state.as_str().unwrap_or_default().to_string();
        match status.written_at_millis {
            Some(at) => println!("{label}: {state} (written_at_millis: {at})"),
            None => println!("{label}: {state}"),
        }
        if let Some(error) = &status.error {
            println!("  error: {error}");
        }
    }
    if let Some(sync) = &report.sync {
        println!(
            "installed diff: {} inspected, {} carried over, {} dropped",
            sync.inspected, sync.carried_over, sync.dropped
        );
    }
    Ok(())
}

fn print_symbols(symbols: &[QualifiedSymbol], json: bool) -> Result<()> {
    if json {
        let keys: Vec<String> = symbols.iter().map(ToString::to_string).collect();
        return print_json(&keys);
    }
    for symbol in symbols {
        println!("{symbol}");
    }
    Ok(())
}

#[derive(Serialize)]
struct SymbolView {
    symbol: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    package: Option<PackageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<RemoteDetailRecord>,
}

#[derive(Serialize)]
struct PackageView {
    name: String,
    importable: bool,
    doc: String,
    functions: Vec<String>,
    classes: Vec<String>,
    submodules: Vec<String>,
}

impl SymbolView {
    fn new(
        symbol: &QualifiedSymbol,
        entry: SymbolEntry<'_>,
        remote: Option<RemoteDetailRecord>,
    ) -> Self {
        let (kind, package) = match entry {
            SymbolEntry::Builtin { .. } => ("builtin", None),
            SymbolEntry::RemotePackage { .. } => ("remote_package", None),
            SymbolEntry::Package(entry) => (
                "package",
                Some(PackageView {
                    name: entry.name.clone(),
                    importable: entry.importable,
                    doc: entry.doc.clone(),
                    functions: entry.functions.iter().cloned().collect(),
                    classes: entry.classes.iter().cloned().collect(),
                    submodules: entry.submodules.iter().cloned().collect(),
                }),
            ),
            SymbolEntry::Member { kind, .. } => (member_kind_label(kind), None),
        };
        Self {
            symbol: symbol.to_string(),
            kind,
            package,
            remote,
        }
    }
}

fn member_kind_label(kind: MemberKind) -> &'static str {
    match kind {
        // Members of kind `module` are always nested under an installed package.
        MemberKind::Module => "submodule",
        other => other.as_str(),
    }
}

fn print_symbol_view(view: &SymbolView, json: bool) -> Result<()> {
    if json {
        return print_json(view);
    }
    println!("{} ({})", view.symbol, view.kind);
    if let Some(package) = &view.package {
        if !package.importable {
            println!("  (not importable)");
        }
        println!();
        println!("{}", package.doc);
        for (label, names) in [
            ("functions", &package.functions),
            ("classes", &package.classes),
            ("submodules", &package.submodules),
        ] {
            if !names.is_empty() {
                println!();
                println!("{label}:");
                for name in names {
                    println!("  {name}");
                }
            }
        }
    }
    if let Some(detail) = &view.remote {
        print_detail_lines(detail);
    }
    Ok(())
}

#[derive(Serialize)]
struct DetailView {
    #[serde(flatten)]
    detail: RemoteDetailRecord,
    /// Served from an expired cache entry because the fetch failed.
    stale: bool,
}

fn print_detail(view: &DetailView, json: bool) -> Result<()> {
    if json {
        return print_json(view);
    }
    println!("{}", view.detail.package_name);
    print_detail_lines(&view.detail);
    if view.stale {
        println!("  (cached; the remote index could not be reached)");
    }
    Ok(())
}

fn print_detail_lines(detail: &RemoteDetailRecord) {
    let fields = [
        ("version", &detail.version),
        ("summary", &detail.summary),
        ("homepage", &detail.homepage),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {label}: {value}");
        }
    }
    for (label, url) in &detail.project_urls {
        println!("  {label}: {url}");
    }
    println!("  install: pip install {}", detail.package_name);
}

fn print_cache_status(status: &CacheStatus, json: bool) -> Result<()> {
    if json {
        return print_json(status);
    }
    println!("cache root: {}", status.root.display());
    if status.records.is_empty() {
        println!("  (no records)");
    }
    for record in &status.records {
        println!(
            "  {}: {} bytes, written_at_millis {}",
            record.category, record.size_bytes, record.written_at_millis
        );
    }
    println!("  remote details: {}", status.remote_details);
    Ok(())
}
