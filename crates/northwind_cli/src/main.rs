//! Command-line front end for the Northwind data layer.
//!
//! # Responsibility
//! - Resolve the named connection, open the context and run one repository
//!   operation per invocation.
//! - Print results as JSON on stdout; diagnostics go to the log backend.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use northwind_data::{
    default_log_level, init_logging, parse_includes, ConnectionRegistry, ConnectionTarget,
    DataContext, Employee, EmployeeField, EmployeeId, LogSettings, Predicate, Repository,
    NORTHWIND_CONNECTION,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliLogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Northwind employee store
#[derive(Parser, Debug)]
#[command(name = "northwind", version, about = "Query and edit the Northwind employee store")]
struct Cli {
    /// Named connection to open
    #[arg(long, global = true, default_value = NORTHWIND_CONNECTION)]
    connection: String,

    /// JSON file with a `connections` map
    #[arg(long, global = true, env = "NORTHWIND_CONFIG")]
    config: Option<PathBuf>,

    /// Connection string for the selected connection (`memory:<name>`, `file:<path>` or a path)
    #[arg(long, global = true, env = "NORTHWIND_DATABASE")]
    database: Option<String>,

    /// Log level; defaults to `warn` on stderr
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Absolute directory for rotating log files instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every employee
    List(IncludeArgs),
    /// Show one employee by id
    Show {
        id: EmployeeId,
        #[command(flatten)]
        includes: IncludeArgs,
    },
    /// Employees with the given last name
    Filter {
        #[arg(long)]
        last_name: String,
        #[command(flatten)]
        includes: IncludeArgs,
    },
    /// Insert a new employee
    Add(AddArgs),
    /// Delete an employee by id
    Remove { id: EmployeeId },
    /// Print the mapping model
    Model,
}

#[derive(Args, Debug)]
struct IncludeArgs {
    /// Navigation member to load (`Manager`, `DirectReports`); repeatable
    #[arg(long = "include", value_name = "NAME")]
    names: Vec<String>,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    id: EmployeeId,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,
    /// Id of this employee's manager
    #[arg(long)]
    reports_to: Option<EmployeeId>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    start_logging(&cli)?;

    let registry = load_registry(&cli)?;
    let context = DataContext::connect(&cli.connection, &registry)
        .with_context(|| format!("failed to open connection `{}`", cli.connection))?;
    info!(
        "event=cli_command module=cli status=start connection={} command={}",
        cli.connection,
        command_name(&cli.command)
    );

    run(&context, cli.command)
}

fn start_logging(cli: &Cli) -> Result<()> {
    let level = match (cli.log_level, &cli.log_dir) {
        (Some(level), _) => level.as_str(),
        (None, Some(_)) => default_log_level(),
        (None, None) => "warn",
    };
    let settings = LogSettings::parse(level, cli.log_dir.as_deref()).map_err(anyhow::Error::msg)?;
    init_logging(&settings).map_err(anyhow::Error::msg)
}

fn load_registry(cli: &Cli) -> Result<ConnectionRegistry> {
    let mut registry = match &cli.config {
        Some(path) => ConnectionRegistry::from_json_file(path)
            .with_context(|| format!("failed to load `{}`", path.display()))?
            .with_env_fallback(true),
        None => ConnectionRegistry::from_env(),
    };
    if let Some(database) = &cli.database {
        let Some(target) = ConnectionTarget::parse(database) else {
            bail!("invalid connection string `{database}`");
        };
        registry.insert(cli.connection.clone(), target);
    }
    Ok(registry)
}

fn run(context: &DataContext, command: Command) -> Result<()> {
    let repo = context.repository::<Employee>()?;

    match command {
        Command::List(includes) => {
            let employees = repo.get_all_with(&includes.parse()?)?;
            print_json(&employees)
        }
        Command::Show { id, includes } => {
            let predicate = Predicate::eq(EmployeeField::EmployeeId, id);
            match repo.single_with(&predicate, &includes.parse()?)? {
                Some(employee) => print_json(&employee),
                None => bail!("no employee with id {id}"),
            }
        }
        Command::Filter {
            last_name,
            includes,
        } => {
            let predicate = Predicate::eq(EmployeeField::LastName, last_name);
            let employees = repo.filter_with(&predicate, &includes.parse()?)?;
            print_json(&employees)
        }
        Command::Add(args) => {
            let mut employee = Employee::new(args.id, args.last_name, args.first_name);
            employee.city = args.city;
            employee.country = args.country;
            employee.reports_to = args.reports_to;
            repo.create(&employee)?;
            print_json(&employee)
        }
        Command::Remove { id } => {
            let removed = repo.delete_where(&Predicate::eq(EmployeeField::EmployeeId, id))?;
            if removed == 0 {
                bail!("no employee with id {id}");
            }
            print_json(&json!({ "removed": id }))
        }
        Command::Model => {
            let tables: Vec<_> = context.model().tables().collect();
            print_json(&tables)
        }
    }
}

impl IncludeArgs {
    fn parse(&self) -> Result<Vec<northwind_data::EmployeeRelation>> {
        let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        Ok(parse_includes::<Employee>(&names)?)
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::List(_) => "list",
        Command::Show { .. } => "show",
        Command::Filter { .. } => "filter",
        Command::Add(_) => "add",
        Command::Remove { .. } => "remove",
        Command::Model => "model",
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn show_accepts_repeated_includes() {
        let cli = Cli::try_parse_from([
            "northwind",
            "show",
            "2",
            "--include",
            "Manager",
            "--include",
            "DirectReports",
        ])
        .unwrap();

        assert_eq!(cli.connection, "NorthwindDb");
        match cli.command {
            Command::Show { id, includes } => {
                assert_eq!(id, 2);
                assert_eq!(includes.names, vec!["Manager", "DirectReports"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn add_requires_names() {
        assert!(Cli::try_parse_from(["northwind", "add", "--id", "1"]).is_err());
    }
}
