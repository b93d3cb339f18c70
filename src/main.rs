use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use cqlbridge::options::{parse_option_pair, split_list, validate_options, OptionContext, Settings};
use cqlbridge::parser::{parse_column_list, parse_restriction};
use cqlbridge::planner::{explain, explain_modify, ClassifyOptions, OpKind, Plan, Planner};
use cqlbridge::{BridgeError, Consistency, RelationDescriptor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "cqlbridge", version = cqlbridge::VERSION)]
#[command(about = "Plan relational scans and modifications as CQL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the generated CQL and EXPLAIN block for one operation
    Plan(PlanArgs),
    /// Validate name=value options for a server, user mapping or table
    Options {
        /// server, user or table
        #[arg(long)]
        context: OptionContext,
        options: Vec<String>,
    },
    /// Normalise a consistency level name
    Consistency { name: String },
    /// Print the connection settings after layering defaults, file and environment
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
struct PlanArgs {
    #[arg(long)]
    keyspace: String,

    #[arg(long)]
    table: String,

    /// Column list, e.g. id:bigint,name:text
    #[arg(long)]
    columns: String,

    /// Comma-separated partition key
    #[arg(long, default_value = "")]
    partition_key: String,

    /// Comma-separated clustering key
    #[arg(long, default_value = "")]
    clustering_key: String,

    /// Columns to fetch (SELECT) or write (INSERT/UPDATE); default all
    #[arg(long)]
    select: Option<String>,

    /// Restriction, e.g. "pk = 5 AND ck > 10"
    #[arg(long = "where")]
    restriction: Option<String>,

    /// select, insert, update or delete
    #[arg(long, default_value = "select")]
    op: OpKind,

    /// Keep != comparisons local
    #[arg(long)]
    no_pushdown_not_equal: bool,

    #[arg(long)]
    verbose: bool,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cqlbridge=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_table(header: [&str; 2], rows: &[(String, String)]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header.iter().map(Cell::new));
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");
}

fn run_plan(args: &PlanArgs) -> Result<(), BridgeError> {
    let columns = parse_column_list(&args.columns).map_err(BridgeError::Parse)?;
    let relation = RelationDescriptor::new(args.keyspace.as_str(), args.table.as_str(), columns)
        .with_partition_key(&split_list(&args.partition_key))
        .with_clustering_key(&split_list(&args.clustering_key));
    relation.validate()?;

    let attrs = match &args.select {
        Some(list) => split_list(list)
            .iter()
            .map(|name| relation.require_column(name))
            .collect::<Result<Vec<_>, _>>()?,
        None if args.op == OpKind::Select => relation.live_columns().collect(),
        None => Vec::new(),
    };
    let restriction = args
        .restriction
        .as_deref()
        .map(parse_restriction)
        .transpose()
        .map_err(BridgeError::Parse)?;

    let options = ClassifyOptions {
        pushdown_not_equal: !args.no_pushdown_not_equal,
    };
    let plan = Planner::new(&relation)
        .with_options(options)
        .plan(&attrs, restriction.as_ref(), args.op)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    let lines = match &plan {
        Plan::Query(query) => explain(query, args.verbose),
        Plan::Modify(modify) => explain_modify(modify, args.verbose),
    };
    let rows: Vec<_> = lines
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect();
    print_table(["Item", "Value"], &rows);
    Ok(())
}

fn run_options(context: OptionContext, options: &[String]) -> Result<(), BridgeError> {
    let pairs = options
        .iter()
        .map(|o| parse_option_pair(o))
        .collect::<Result<Vec<_>, _>>()?;
    validate_options(context, &pairs)?;
    print_table(["Option", "Value"], &pairs);
    println!("{} option(s) valid for {context}", pairs.len());
    Ok(())
}

fn run(cli: Cli) -> Result<(), BridgeError> {
    match cli.command {
        Command::Plan(args) => run_plan(&args),
        Command::Options { context, options } => run_options(context, &options),
        Command::Consistency { name } => {
            let consistency: Consistency = name.parse().map_err(BridgeError::Parse)?;
            println!("{consistency}");
            Ok(())
        }
        Command::Config { config } => {
            let settings = Settings::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&settings.connection_config())?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
