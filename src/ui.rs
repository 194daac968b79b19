use std::error::Error;
use std::io;
use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{Duration, Local};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::config::Config;
use crate::domain::{
	format_clock, format_date, format_duration, local_clock_on_date, Ledger, SessionField, Stats,
	ViewMode, MONTH_NAMES,
};
use crate::storage::save_store;

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const IDLE_POLL_MILLIS: u64 = 250;

pub fn run_dashboard(
	ledger: &mut Ledger,
	store_path: &Path,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, ledger, store_path, config);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	ledger: &mut Ledger,
	store_path: &Path,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();
	app.month_index = ledger.selected_month as usize;

	loop {
		let now = Local::now();
		let view = build_view(ledger, now);
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_dashboard(frame, &app, ledger, &view))?;

		// The fast tick only exists to refresh the elapsed readout; it is
		// cancelled by falling back to the idle poll period when not
		// tracking, and dies with this loop on quit.
		let poll_period = if ledger.is_tracking {
			StdDuration::from_millis(config.tick_millis.max(50))
		} else {
			StdDuration::from_millis(IDLE_POLL_MILLIS)
		};

		if event::poll(poll_period)? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, ledger, store_path),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, ledger, store_path),
					InputMode::Normal => {
						handle_normal_key(&mut app, key.code, ledger, store_path, config, &view)
					}
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Projects,
	Sessions,
	Months,
}

impl FocusPane {
	fn next(self) -> Self {
		match self {
			FocusPane::Projects => FocusPane::Sessions,
			FocusPane::Sessions => FocusPane::Months,
			FocusPane::Months => FocusPane::Projects,
		}
	}

	fn prev(self) -> Self {
		match self {
			FocusPane::Projects => FocusPane::Months,
			FocusPane::Sessions => FocusPane::Projects,
			FocusPane::Months => FocusPane::Sessions,
		}
	}
}

enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}

	fn with_input(title: impl Into<String>, input: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: input.into(),
			kind,
		}
	}
}

#[derive(Clone)]
enum PromptKind {
	AddProject,
	RenameProject,
}

#[derive(Clone)]
struct SelectOption {
	label: String,
	value: String,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: impl Into<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value: value.into(),
			style,
		}
	}
}

#[derive(Clone)]
struct SelectState {
	title: String,
	kind: SelectKind,
	options: Vec<SelectOption>,
	selected: usize,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			kind,
			options,
			selected: 0,
		}
	}

	fn move_selection(&mut self, delta: isize) {
		if self.options.is_empty() {
			return;
		}
		let last = self.options.len() as isize - 1;
		let next = (self.selected as isize + delta).clamp(0, last);
		self.selected = next as usize;
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Clone)]
enum SelectKind {
	DeleteProjectConfirm,
	DeleteSessionConfirm { index: usize },
}

struct App {
	focus: FocusPane,
	mode: InputMode,
	status: String,
	project_index: usize,
	session_index: usize,
	month_index: usize,
	session_field: SessionField,
	edit_buffer: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			focus: FocusPane::Projects,
			mode: InputMode::Normal,
			status: "Welcome".to_string(),
			project_index: 0,
			session_index: 0,
			month_index: 0,
			session_field: SessionField::Start,
			edit_buffer: String::new(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, view: &ViewModel) {
		if !view.project_rows.is_empty() {
			self.project_index = self.project_index.min(view.project_rows.len() - 1);
		} else {
			self.project_index = 0;
		}
		if !view.session_rows.is_empty() {
			self.session_index = self.session_index.min(view.session_rows.len() - 1);
		} else {
			self.session_index = 0;
		}
		self.month_index = self.month_index.min(MONTH_NAMES.len() - 1);
	}

	fn clear_edit_buffer(&mut self) {
		self.edit_buffer.clear();
	}

	fn edit_hint(&self) -> String {
		let field = match self.session_field {
			SessionField::Start => "start",
			SessionField::End => "end",
		};
		if self.edit_buffer.is_empty() {
			format!("type HHMM to edit {field}")
		} else {
			format!("editing {field}: {}", self.edit_buffer)
		}
	}
}

struct ProjectRow {
	id: i64,
	name: String,
	total_seconds: i64,
	is_current: bool,
	is_tracking: bool,
}

struct SessionRow {
	/// Index into the owning project's full session list.
	index: usize,
	date_text: String,
	start_text: String,
	end_text: String,
	duration_seconds: i64,
	is_open: bool,
}

struct ViewModel {
	project_rows: Vec<ProjectRow>,
	session_rows: Vec<SessionRow>,
	project_stats: Stats,
	all_projects_total: i64,
	elapsed_seconds: Option<i64>,
	tracking_name: Option<String>,
}

fn build_view(ledger: &Ledger, now: chrono::DateTime<Local>) -> ViewModel {
	let project_rows = ledger
		.projects
		.iter()
		.map(|project| ProjectRow {
			id: project.id,
			name: project.name.clone(),
			total_seconds: project.total_seconds,
			is_current: Some(project.id) == ledger.current_project_id,
			is_tracking: Some(project.id) == ledger.active_tracking_id,
		})
		.collect::<Vec<_>>();

	let session_rows = ledger
		.current_project()
		.map(|project| {
			ledger
				.visible_sessions(project)
				.into_iter()
				.map(|(index, session)| SessionRow {
					index,
					date_text: format_date(session.start),
					start_text: format_clock(Some(session.start)),
					end_text: format_clock(session.end),
					duration_seconds: session.duration_seconds(),
					is_open: session.is_open(),
				})
				.collect()
		})
		.unwrap_or_default();

	let tracking_name = ledger
		.active_tracking_id
		.and_then(|id| ledger.project(id))
		.map(|project| project.name.clone());

	ViewModel {
		project_rows,
		session_rows,
		project_stats: ledger.calculate_stats(ledger.current_project_id, now),
		all_projects_total: ledger.calculate_stats(None, now).total,
		elapsed_seconds: ledger.active_elapsed_seconds(now),
		tracking_name,
	}
}

fn draw_dashboard(frame: &mut Frame, app: &App, ledger: &Ledger, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage(28),
			Constraint::Percentage(44),
			Constraint::Percentage(28),
		])
		.split(layout[0]);

	let right = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(10), Constraint::Min(6)])
		.split(body[2]);

	render_projects_panel(frame, body[0], app, view);
	render_sessions_panel(frame, body[1], app, ledger, view);
	render_stats_panel(frame, right[0], ledger, view);
	render_months_panel(frame, right[1], app, ledger);
	render_footer(frame, layout[1], app);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

fn render_projects_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let items = view
		.project_rows
		.iter()
		.map(|row| {
			let marker = if row.is_current { "*" } else { " " };
			let mut spans = vec![
				Span::raw(format!("{marker} ")),
				Span::styled(
					row.name.clone(),
					if row.is_current {
						Style::default().add_modifier(Modifier::BOLD)
					} else {
						Style::default()
					},
				),
				Span::styled(
					format!(" {}", format_duration(row.total_seconds)),
					Style::default().fg(Color::DarkGray),
				),
			];
			if row.is_tracking {
				spans.push(Span::styled(
					" [rec]",
					Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
				));
			}
			ListItem::new(Line::from(spans))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.project_rows.is_empty() {
		state.select(Some(app.project_index.min(view.project_rows.len() - 1)));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title("Projects")
		.border_style(border_style(app.focus == FocusPane::Projects));
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no projects, press 'p')")]
	} else {
		items
	})
	.block(block)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_sessions_panel(frame: &mut Frame, area: Rect, app: &App, ledger: &Ledger, view: &ViewModel) {
	let mut items = Vec::new();
	for (position, row) in view.session_rows.iter().enumerate() {
		items.push(ListItem::new(render_session_line(
			row,
			app.session_field,
			position == app.session_index,
		)));
	}

	if items.is_empty() {
		items.push(ListItem::new("(no sessions in this view)"));
	}

	let mut state = ListState::default();
	if !view.session_rows.is_empty() {
		state.select(Some(app.session_index.min(view.session_rows.len() - 1)));
	}

	let window_total: i64 = view.session_rows.iter().map(|row| row.duration_seconds).sum();
	let title = format!(
		"{} | {} view | shown {}",
		ledger.selected_date.format("%A, %d %B %Y"),
		ledger.view_mode.label(),
		format_duration(window_total)
	);
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(title)
				.border_style(border_style(app.focus == FocusPane::Sessions)),
		)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_session_line(row: &SessionRow, selected_field: SessionField, is_selected: bool) -> Line<'static> {
	let start_style = if is_selected && selected_field == SessionField::Start {
		Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
	} else {
		Style::default()
	};
	let end_style = if is_selected && selected_field == SessionField::End {
		Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
	} else if row.is_open {
		Style::default().fg(Color::DarkGray)
	} else {
		Style::default()
	};

	let end_text = if row.is_open {
		"--:--".to_string()
	} else {
		row.end_text.clone()
	};

	let mut spans = vec![
		Span::styled(format!("{} ", row.date_text), Style::default().fg(Color::DarkGray)),
		Span::styled(row.start_text.clone(), start_style),
		Span::raw(" -> "),
		Span::styled(end_text, end_style),
	];

	if row.is_open {
		spans.push(Span::styled(
			" (running)",
			Style::default().fg(Color::LightRed),
		));
	} else {
		spans.push(Span::raw(format!(
			" {}",
			format_duration(row.duration_seconds)
		)));
	}

	Line::from(spans)
}

fn render_stats_panel(frame: &mut Frame, area: Rect, ledger: &Ledger, view: &ViewModel) {
	let stats = &view.project_stats;
	let month_name = MONTH_NAMES
		.get(ledger.selected_month as usize)
		.copied()
		.unwrap_or("?");

	let mut lines = vec![
		Line::from(format!("Today:        {}", format_duration(stats.today))),
		Line::from(format!("Last 7 days:  {}", format_duration(stats.week))),
		Line::from(format!(
			"{} {}: {}",
			month_name,
			ledger.selected_year,
			format_duration(stats.month_total)
		)),
		Line::from(format!("Project:      {}", format_duration(stats.total))),
		Line::from(format!(
			"All projects: {}",
			format_duration(view.all_projects_total)
		)),
		Line::from(""),
	];

	match (&view.tracking_name, view.elapsed_seconds) {
		(Some(name), Some(elapsed)) => {
			lines.push(Line::from(vec![
				Span::styled(
					"Tracking ",
					Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
				),
				Span::raw(format!("{name} | {}", format_duration(elapsed))),
			]));
		}
		_ => lines.push(Line::from(Span::styled(
			"Idle",
			Style::default().fg(Color::DarkGray),
		))),
	}

	let title = ledger
		.current_project()
		.map(|project| format!("Statistics: {}", project.name))
		.unwrap_or_else(|| "Statistics".to_string());
	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(panel, area);
}

fn render_months_panel(frame: &mut Frame, area: Rect, app: &App, ledger: &Ledger) {
	let items = MONTH_NAMES
		.iter()
		.enumerate()
		.map(|(index, name)| {
			let marker = if index as u32 == ledger.selected_month {
				"*"
			} else {
				" "
			};
			ListItem::new(format!("{marker} {name}"))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	state.select(Some(app.month_index.min(MONTH_NAMES.len() - 1)));

	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!("Month filter | {}", ledger.selected_year))
		.border_style(border_style(app.focus == FocusPane::Months));
	let list = List::new(items)
		.block(block)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from(
				"Tab pane | arrows/hjkl navigate | Enter select | space start/stop | 1/2/3 day/week/month view",
			),
			Line::from(
				"p new project | r rename | D delete project | a add session | d delete session | [ ] shift day | t today | q quit",
			),
			Line::from(format!(
				"{}{}",
				app.status,
				if app.focus == FocusPane::Sessions {
					format!(" | {}", app.edit_hint())
				} else {
					String::new()
				}
			)),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(52, 35, frame.area());
	frame.render_widget(Clear, area);

	let items = select
		.options
		.iter()
		.map(|option| ListItem::new(option.label.clone()).style(option.style))
		.collect::<Vec<_>>();

	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title(select.title.clone()))
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len() - 1)));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key(
	app: &mut App,
	code: KeyCode,
	ledger: &mut Ledger,
	store_path: &Path,
	config: &Config,
	view: &ViewModel,
) -> bool {
	match code {
		KeyCode::Char('q') => true,
		KeyCode::Esc => {
			if !app.edit_buffer.is_empty() {
				app.clear_edit_buffer();
				app.status = "Edit cancelled".to_string();
				return false;
			}
			true
		}
		KeyCode::Tab => {
			app.focus = app.focus.next();
			app.clear_edit_buffer();
			false
		}
		KeyCode::BackTab => {
			app.focus = app.focus.prev();
			app.clear_edit_buffer();
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			match app.focus {
				FocusPane::Projects => app.project_index = app.project_index.saturating_sub(1),
				FocusPane::Sessions => app.session_index = app.session_index.saturating_sub(1),
				FocusPane::Months => app.month_index = app.month_index.saturating_sub(1),
			}
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			match app.focus {
				FocusPane::Projects => app.project_index += 1,
				FocusPane::Sessions => app.session_index += 1,
				FocusPane::Months => app.month_index += 1,
			}
			app.clamp_selection(view);
			false
		}
		KeyCode::Left | KeyCode::Char('h') => {
			match app.focus {
				FocusPane::Sessions => {
					app.session_field = SessionField::Start;
					app.clear_edit_buffer();
				}
				FocusPane::Months => {
					ledger.set_selected_month(ledger.selected_month, ledger.selected_year - 1);
					app.status = persist_status(store_path, ledger, "year filter updated");
				}
				FocusPane::Projects => {}
			}
			false
		}
		KeyCode::Right | KeyCode::Char('l') => {
			match app.focus {
				FocusPane::Sessions => {
					app.session_field = SessionField::End;
					app.clear_edit_buffer();
				}
				FocusPane::Months => {
					ledger.set_selected_month(ledger.selected_month, ledger.selected_year + 1);
					app.status = persist_status(store_path, ledger, "year filter updated");
				}
				FocusPane::Projects => {}
			}
			false
		}
		KeyCode::Char('[') => {
			shift_selected_date(app, ledger, store_path, -1);
			false
		}
		KeyCode::Char(']') => {
			shift_selected_date(app, ledger, store_path, 1);
			false
		}
		KeyCode::Char('t') => {
			ledger.set_selected_date(Local::now().date_naive());
			app.status = persist_status(store_path, ledger, "jumped to today");
			false
		}
		// In the sessions pane digits feed the HHMM edit buffer, so the
		// view-mode shortcuts only apply from the other panes.
		KeyCode::Char(value) if value.is_ascii_digit() && app.focus == FocusPane::Sessions => {
			handle_session_digit_input(app, value, ledger, store_path, view);
			false
		}
		KeyCode::Char('1') => {
			set_view_mode(app, ledger, store_path, ViewMode::Day);
			false
		}
		KeyCode::Char('2') => {
			set_view_mode(app, ledger, store_path, ViewMode::Week);
			false
		}
		KeyCode::Char('3') => {
			set_view_mode(app, ledger, store_path, ViewMode::Month);
			false
		}
		KeyCode::Backspace => {
			if app.focus == FocusPane::Sessions {
				app.edit_buffer.pop();
			}
			false
		}
		KeyCode::Char(' ') => {
			toggle_tracking(app, ledger, store_path);
			false
		}
		KeyCode::Char('p') => {
			app.mode = InputMode::Prompt(PromptState::new("New project name", PromptKind::AddProject));
			false
		}
		KeyCode::Char('r') => {
			match ledger.current_project() {
				Some(project) => {
					app.mode = InputMode::Prompt(PromptState::with_input(
						"Rename project",
						project.name.clone(),
						PromptKind::RenameProject,
					));
				}
				None => app.status = "No project selected".to_string(),
			}
			false
		}
		KeyCode::Char('D') => {
			match ledger.current_project() {
				Some(project) => {
					app.mode = InputMode::Select(build_delete_project_select(&project.name));
				}
				None => app.status = "No project selected".to_string(),
			}
			false
		}
		KeyCode::Char('a') => {
			add_manual_session(app, ledger, store_path, config);
			false
		}
		KeyCode::Char('d') => {
			if app.focus != FocusPane::Sessions {
				app.status = "Focus the sessions panel to delete a session".to_string();
				return false;
			}
			let Some(row) = view.session_rows.get(app.session_index) else {
				app.status = "No session selected".to_string();
				return false;
			};
			if row.is_open {
				app.status = "Stop tracking before deleting this session".to_string();
				return false;
			}
			app.mode = InputMode::Select(build_delete_session_select(row));
			false
		}
		KeyCode::Enter => {
			match app.focus {
				FocusPane::Projects => {
					if let Some(row) = view.project_rows.get(app.project_index) {
						match ledger.select_project(row.id) {
							Ok(()) => {
								app.status =
									persist_status(store_path, ledger, &format!("selected: {}", row.name));
							}
							Err(err) => app.status = format!("error: {err}"),
						}
					}
				}
				FocusPane::Months => {
					ledger.set_selected_month(app.month_index as u32, ledger.selected_year);
					let month = MONTH_NAMES[app.month_index];
					app.status =
						persist_status(store_path, ledger, &format!("month filter: {month}"));
				}
				FocusPane::Sessions => {}
			}
			false
		}
		_ => false,
	}
}

fn shift_selected_date(app: &mut App, ledger: &mut Ledger, store_path: &Path, days: i64) {
	let next = ledger.selected_date + Duration::days(days);
	ledger.set_selected_date(next);
	app.status = persist_status(
		store_path,
		ledger,
		&format!("selected {}", next.format("%Y-%m-%d")),
	);
}

fn set_view_mode(app: &mut App, ledger: &mut Ledger, store_path: &Path, mode: ViewMode) {
	ledger.set_view_mode(mode);
	app.session_index = 0;
	app.status = persist_status(store_path, ledger, &format!("{} view", mode.label()));
}

fn toggle_tracking(app: &mut App, ledger: &mut Ledger, store_path: &Path) {
	let now = Local::now();
	if ledger.is_tracking {
		if ledger.current_project_id != ledger.active_tracking_id {
			app.status = "You can only stop the timer for the project being tracked".to_string();
			return;
		}
		match ledger.stop_tracking(now) {
			Some(duration) => {
				app.status = persist_status(
					store_path,
					ledger,
					&format!("stopped, +{}", format_duration(duration)),
				);
			}
			None => app.status = "Not tracking".to_string(),
		}
		return;
	}

	match ledger.start_tracking(now) {
		Ok(true) => {
			let name = ledger
				.current_project()
				.map(|project| project.name.clone())
				.unwrap_or_default();
			app.status = persist_status(store_path, ledger, &format!("tracking: {name}"));
		}
		Ok(false) => app.status = "Already tracking".to_string(),
		Err(err) => app.status = format!("error: {err}"),
	}
}

fn add_manual_session(app: &mut App, ledger: &mut Ledger, store_path: &Path, config: &Config) {
	let (hour, minute) = match config.manual_clock() {
		Ok(clock) => clock,
		Err(err) => {
			app.status = format!("error: {err}");
			return;
		}
	};
	let start = match local_clock_on_date(ledger.selected_date, hour, minute) {
		Ok(start) => start,
		Err(err) => {
			app.status = format!("error: {err}");
			return;
		}
	};
	let end = start + config.manual_minutes * 60_000;

	match ledger.add_manual_session(start, end) {
		Ok(()) => {
			app.status = persist_status(store_path, ledger, "added manual session");
		}
		Err(err) => app.status = format!("error: {err}"),
	}
}

fn handle_session_digit_input(
	app: &mut App,
	digit: char,
	ledger: &mut Ledger,
	store_path: &Path,
	view: &ViewModel,
) {
	if view.session_rows.is_empty() {
		app.status = "No sessions in this view".to_string();
		return;
	}

	app.edit_buffer.push(digit);
	if app.edit_buffer.len() < 4 {
		return;
	}

	let buffer = app.edit_buffer.clone();
	app.edit_buffer.clear();

	let hour = buffer[0..2].parse::<u32>();
	let minute = buffer[2..4].parse::<u32>();
	let (hour, minute) = match (hour, minute) {
		(Ok(hour), Ok(minute)) if hour < 24 && minute < 60 => (hour, minute),
		_ => {
			app.status = format!("invalid time '{buffer}', expected HHMM");
			return;
		}
	};

	let Some(row) = view.session_rows.get(app.session_index) else {
		app.status = "No session selected".to_string();
		return;
	};

	match ledger.edit_session(row.index, app.session_field, hour, minute) {
		Ok(()) => {
			let field = match app.session_field {
				SessionField::Start => "start",
				SessionField::End => "end",
			};
			app.status = persist_status(
				store_path,
				ledger,
				&format!("updated {field} to {hour:02}:{minute:02}"),
			);
		}
		Err(err) => app.status = format!("error: {err}"),
	}
}

fn handle_prompt_key(app: &mut App, code: KeyCode, ledger: &mut Ledger, store_path: &Path) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(&prompt, ledger, store_path) {
				Ok(message) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key(app: &mut App, code: KeyCode, ledger: &mut Ledger, store_path: &Path) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(&select, ledger, store_path) {
				Ok(message) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(prompt: &PromptState, ledger: &mut Ledger, store_path: &Path) -> Result<String, String> {
	match prompt.kind {
		PromptKind::AddProject => {
			let id = ledger
				.create_project(&prompt.input, Local::now())
				.map_err(|err| err.to_string())?;
			persist(store_path, ledger)?;
			let name = ledger
				.project(id)
				.map(|project| project.name.clone())
				.unwrap_or_default();
			Ok(format!("created project: {name}"))
		}
		PromptKind::RenameProject => {
			ledger
				.rename_project(&prompt.input)
				.map_err(|err| err.to_string())?;
			persist(store_path, ledger)?;
			Ok("project renamed".to_string())
		}
	}
}

fn submit_select(select: &SelectState, ledger: &mut Ledger, store_path: &Path) -> Result<String, String> {
	let value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match &select.kind {
		SelectKind::DeleteProjectConfirm => {
			if value != "delete" {
				return Ok("Delete cancelled".to_string());
			}
			let name = ledger
				.current_project()
				.map(|project| project.name.clone())
				.unwrap_or_default();
			ledger.delete_project().map_err(|err| err.to_string())?;
			persist(store_path, ledger)?;
			Ok(format!("deleted project: {name}"))
		}
		SelectKind::DeleteSessionConfirm { index } => {
			if value != "delete" {
				return Ok("Delete cancelled".to_string());
			}
			ledger.delete_session(*index).map_err(|err| err.to_string())?;
			persist(store_path, ledger)?;
			Ok("session deleted".to_string())
		}
	}
}

fn build_delete_project_select(name: &str) -> SelectState {
	let options = vec![
		SelectOption::new(
			"Delete",
			"delete",
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", "cancel", Style::default()),
	];

	let mut select = SelectState::new(
		format!("Delete project '{name}' and all its sessions?"),
		SelectKind::DeleteProjectConfirm,
		options,
	);
	// Default to cancel to prevent accidental deletions.
	select.selected = 1;
	select
}

fn build_delete_session_select(row: &SessionRow) -> SelectState {
	let options = vec![
		SelectOption::new(
			"Delete",
			"delete",
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", "cancel", Style::default()),
	];

	let mut select = SelectState::new(
		format!(
			"Delete session? {} {}-{}",
			row.date_text, row.start_text, row.end_text
		),
		SelectKind::DeleteSessionConfirm { index: row.index },
		options,
	);
	select.selected = 1;
	select
}

fn persist(store_path: &Path, ledger: &Ledger) -> Result<(), String> {
	save_store(store_path, ledger).map_err(|err| format!("failed to save store: {err}"))
}

fn persist_status(store_path: &Path, ledger: &Ledger, message: &str) -> String {
	match persist(store_path, ledger) {
		Ok(()) => message.to_string(),
		Err(err) => format!("error: {err}"),
	}
}

pub fn print_sessions(ledger: &Ledger) {
	let Some(project) = ledger.current_project() else {
		println!("no project selected");
		return;
	};

	let rows = ledger.visible_sessions(project);
	println!(
		"{} | {} view | {}",
		project.name,
		ledger.view_mode.label(),
		ledger.selected_date.format("%Y-%m-%d")
	);
	if rows.is_empty() {
		println!("no sessions in this view");
		return;
	}

	for (index, session) in rows {
		let end_text = if session.is_open() {
			"--:--".to_string()
		} else {
			format_clock(session.end)
		};
		println!(
			"{:>3}. {} {} -> {} | {}",
			index,
			format_date(session.start),
			format_clock(Some(session.start)),
			end_text,
			if session.is_open() {
				"running".to_string()
			} else {
				format_duration(session.duration_seconds())
			}
		);
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Local, TimeZone};

	use crate::domain::Ledger;

	use super::build_view;

	fn now() -> chrono::DateTime<Local> {
		Local
			.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
			.single()
			.expect("local time should exist")
	}

	#[test]
	fn view_rows_point_back_at_real_session_indexes() {
		let mut ledger = Ledger::new(now());
		ledger
			.create_project("Work", now())
			.expect("project should be created");
		let day = |d: u32, h: u32| {
			Local
				.with_ymd_and_hms(2026, 3, d, h, 0, 0)
				.single()
				.expect("local time should exist")
				.timestamp_millis()
		};
		// One session outside the selected day, one inside.
		ledger
			.add_manual_session(day(1, 9), day(1, 10))
			.expect("manual session should insert");
		ledger
			.add_manual_session(day(2, 9), day(2, 10))
			.expect("manual session should insert");

		let view = build_view(&ledger, now());
		assert_eq!(view.session_rows.len(), 1);
		assert_eq!(view.session_rows[0].index, 1);
		assert_eq!(view.project_rows.len(), 1);
		assert!(view.project_rows[0].is_current);
	}

	#[test]
	fn tracking_readout_appears_in_the_view() {
		let mut ledger = Ledger::new(now());
		ledger
			.create_project("Work", now())
			.expect("project should be created");
		ledger.start_tracking(now()).expect("start should work");

		let view = build_view(&ledger, now() + chrono::Duration::seconds(42));
		assert_eq!(view.elapsed_seconds, Some(42));
		assert_eq!(view.tracking_name.as_deref(), Some("Work"));
	}
}
