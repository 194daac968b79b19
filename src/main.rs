mod config;
mod domain;
mod storage;
mod stores;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{config_path, load_config, parse_clock};
use crate::domain::{format_duration, local_clock_on_date, Ledger, ViewMode, MONTH_NAMES};
use crate::storage::{load_store, save_store};
use crate::stores::{recent_stores, remember_store, resolve_store_path};
use crate::ui::{print_sessions, run_dashboard};

#[derive(Debug, Parser)]
#[command(name = "trackapp", about = "Terminal time tracker with per-project session logs")]
struct Cli {
	#[arg(long)]
	store: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Dashboard,
	AddProject {
		#[arg(long)]
		name: String,
	},
	RenameProject {
		#[arg(long)]
		name: String,
	},
	DeleteProject {
		#[arg(long)]
		confirm: bool,
	},
	Select {
		#[arg(long)]
		name: String,
	},
	Start,
	Stop,
	Log {
		#[arg(long)]
		date: Option<String>,
		#[arg(long)]
		start: Option<String>,
		#[arg(long)]
		end: Option<String>,
	},
	Sessions {
		#[arg(long)]
		view: Option<CliViewMode>,
		#[arg(long)]
		date: Option<String>,
	},
	Stats {
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		month: Option<u32>,
		#[arg(long)]
		year: Option<i32>,
	},
	Stores {
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliViewMode {
	Day,
	Week,
	Month,
}

impl From<CliViewMode> for ViewMode {
	fn from(mode: CliViewMode) -> Self {
		match mode {
			CliViewMode::Day => ViewMode::Day,
			CliViewMode::Week => ViewMode::Week,
			CliViewMode::Month => ViewMode::Month,
		}
	}
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	if let Some(Command::Stores { limit }) = &cli.command {
		print_recent_stores(*limit)?;
		return Ok(());
	}

	let store_path = resolve_store_path(cli.store);
	let mut ledger = load_store(&store_path, Local::now())?;
	if let Err(err) = remember_store(&store_path) {
		eprintln!("warning: failed to remember store: {err}");
	}
	let config = load_config(&config_path())?;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Init => {
			save_store(&store_path, &ledger)?;
			println!("initialized store at {}", store_path.display());
		}
		Command::Dashboard => {
			run_dashboard(&mut ledger, &store_path, &config)?;
		}
		Command::AddProject { name } => {
			ledger.create_project(&name, Local::now())?;
			save_store(&store_path, &ledger)?;
			println!("created project {}", name.trim());
		}
		Command::RenameProject { name } => {
			ledger.rename_project(&name)?;
			save_store(&store_path, &ledger)?;
			println!("renamed project to {}", name.trim());
		}
		Command::DeleteProject { confirm } => {
			if !confirm {
				return Err("refusing to delete a project without --confirm".into());
			}
			let name = ledger
				.current_project()
				.map(|project| project.name.clone())
				.unwrap_or_default();
			ledger.delete_project()?;
			save_store(&store_path, &ledger)?;
			println!("deleted project {name}");
		}
		Command::Select { name } => {
			let id = ledger
				.project_by_name(&name)
				.map(|project| project.id)
				.ok_or_else(|| format!("no project named '{name}'"))?;
			ledger.select_project(id)?;
			save_store(&store_path, &ledger)?;
			println!("selected {name}");
		}
		Command::Start => {
			// Tracking is always relative to now, never backdated.
			let now = Local::now();
			ledger.set_selected_date(now.date_naive());
			if ledger.start_tracking(now)? {
				let name = ledger
					.current_project()
					.map(|project| project.name.clone())
					.unwrap_or_default();
				save_store(&store_path, &ledger)?;
				println!("started tracking {name}");
			} else {
				println!("already tracking");
			}
		}
		Command::Stop => match ledger.stop_tracking(Local::now()) {
			Some(duration) => {
				save_store(&store_path, &ledger)?;
				println!("stopped, +{}", format_duration(duration));
			}
			None => println!("not tracking"),
		},
		Command::Log { date, start, end } => {
			let date = parse_day(date.as_deref())?;
			let (start_hour, start_minute) = match &start {
				Some(text) => parse_cli_clock(text)?,
				None => config.manual_clock()?,
			};
			let start_ms = local_clock_on_date(date, start_hour, start_minute)?;
			let end_ms = match &end {
				Some(text) => {
					let (hour, minute) = parse_cli_clock(text)?;
					local_clock_on_date(date, hour, minute)?
				}
				None => start_ms + config.manual_minutes * 60_000,
			};

			ledger.add_manual_session(start_ms, end_ms)?;
			save_store(&store_path, &ledger)?;
			println!(
				"logged session on {} ({} minutes)",
				date.format("%Y-%m-%d"),
				(end_ms - start_ms) / 60_000
			);
		}
		Command::Sessions { view, date } => {
			if let Some(view) = view {
				ledger.set_view_mode(view.into());
			}
			if let Some(date) = date {
				ledger.set_selected_date(parse_day(Some(&date))?);
			}
			print_sessions(&ledger);
		}
		Command::Stats {
			project,
			month,
			year,
		} => {
			print_stats(&mut ledger, project, month, year)?;
		}
		Command::Stores { .. } => {}
	}

	Ok(())
}

fn print_recent_stores(limit: usize) -> Result<(), Box<dyn Error>> {
	let rows = recent_stores(limit)?;
	if rows.is_empty() {
		println!("no recent stores");
		return Ok(());
	}

	for (index, path) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, path.display());
	}

	Ok(())
}

fn print_stats(
	ledger: &mut Ledger,
	project: Option<String>,
	month: Option<u32>,
	year: Option<i32>,
) -> Result<(), Box<dyn Error>> {
	let scope = match &project {
		Some(name) => Some(
			ledger
				.project_by_name(name)
				.map(|project| project.id)
				.ok_or_else(|| format!("no project named '{name}'"))?,
		),
		None => None,
	};

	if let Some(month) = month {
		if !(1..=12).contains(&month) {
			return Err(format!("invalid month {month}, expected 1-12").into());
		}
		ledger.set_selected_month(month - 1, year.unwrap_or(ledger.selected_year));
	} else if let Some(year) = year {
		ledger.set_selected_month(ledger.selected_month, year);
	}

	let stats = ledger.calculate_stats(scope, Local::now());
	let label = project.unwrap_or_else(|| "all projects".to_string());
	println!("statistics for {label}");
	println!("today:    {}", format_duration(stats.today));
	println!("last 7d:  {}", format_duration(stats.week));
	println!(
		"{} {}: {}",
		MONTH_NAMES[ledger.selected_month as usize],
		ledger.selected_year,
		format_duration(stats.month_total)
	);
	println!("all time: {}", format_duration(stats.total));
	Ok(())
}

fn parse_day(input: Option<&str>) -> Result<NaiveDate, Box<dyn Error>> {
	if let Some(raw) = input {
		Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
	} else {
		Ok(Local::now().date_naive())
	}
}

fn parse_cli_clock(input: &str) -> Result<(u32, u32), Box<dyn Error>> {
	parse_clock(input).ok_or_else(|| format!("invalid time '{input}', expected HH:MM").into())
}
