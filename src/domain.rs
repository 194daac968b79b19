use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// One contiguous tracked or manually entered interval. `end` is absent while
/// the session is still running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub start: i64,
    pub end: Option<i64>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whole seconds between start and end; open sessions count as zero.
    pub fn duration_seconds(&self) -> i64 {
        match self.end {
            Some(end) => ((end - self.start) / 1000).max(0),
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub total_seconds: i64,
    pub sessions: Vec<Session>,
}

impl Project {
    /// Rebuilds the cached all-time total from the session list. The cache is
    /// derivable at any point and must be refreshed after every session
    /// add/edit/delete.
    pub fn recalculate_total(&mut self) {
        self.total_seconds = self.sessions.iter().map(Session::duration_seconds).sum();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Day,
    Week,
    Month,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Day => "day",
            ViewMode::Week => "week",
            ViewMode::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    Start,
    End,
}

/// The four aggregation windows, all in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub today: i64,
    pub week: i64,
    pub month_total: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    EmptyName,
    DuplicateName(String),
    NoProjectSelected,
    ProjectNotFound(i64),
    SessionNotFound(usize),
    EndBeforeStart,
    Overlap,
    NotCurrentDay,
    SessionRunning,
    InvalidTime,
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::EmptyName => write!(f, "project name cannot be empty"),
            LedgerError::DuplicateName(name) => write!(f, "project name already exists: {name}"),
            LedgerError::NoProjectSelected => write!(f, "no project selected"),
            LedgerError::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            LedgerError::SessionNotFound(index) => write!(f, "session not found: {index}"),
            LedgerError::EndBeforeStart => write!(f, "end must be after start"),
            LedgerError::Overlap => write!(f, "time slot is already taken by another session"),
            LedgerError::NotCurrentDay => write!(f, "tracking can only start on the current day"),
            LedgerError::SessionRunning => write!(f, "session is still running"),
            LedgerError::InvalidTime => write!(f, "clock time does not exist on this date"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// The complete in-process state: all projects plus selection, tracking
/// status, and the display filters. The wall clock is always passed in by the
/// caller, never read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub current_project_id: Option<i64>,
    #[serde(default)]
    pub is_tracking: bool,
    #[serde(default)]
    pub active_tracking_id: Option<i64>,
    #[serde(default)]
    pub selected_date: NaiveDate,
    #[serde(default)]
    pub selected_month: u32,
    #[serde(default)]
    pub selected_year: i32,
    #[serde(default)]
    pub view_mode: ViewMode,
}

impl Ledger {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            projects: Vec::new(),
            current_project_id: None,
            is_tracking: false,
            active_tracking_id: None,
            selected_date: now.date_naive(),
            selected_month: now.month0(),
            selected_year: now.year(),
            view_mode: ViewMode::Day,
        }
    }

    /// Restores invariants after loading a partially shaped or stale blob:
    /// missing selection keys fall back to today, tracking flags without a
    /// matching open session are cleared, and stray open sessions on
    /// non-tracked projects are dropped.
    pub fn repair(&mut self, now: DateTime<Local>) {
        if self.selected_date == NaiveDate::default() {
            self.selected_date = now.date_naive();
        }
        if self.selected_year == 0 {
            self.selected_year = now.year();
            self.selected_month = now.month0();
        }
        if self.selected_month > 11 {
            self.selected_month = now.month0();
        }

        if let Some(id) = self.current_project_id {
            if self.project(id).is_none() {
                self.current_project_id = None;
            }
        }
        if self.current_project_id.is_none() {
            self.current_project_id = self.projects.first().map(|project| project.id);
        }

        let tracked = self
            .active_tracking_id
            .filter(|id| self.project(*id).is_some());
        self.active_tracking_id = tracked;
        if self.active_tracking_id.is_none() {
            self.is_tracking = false;
        }
        let is_tracking = self.is_tracking;

        for project in &mut self.projects {
            if is_tracking && Some(project.id) == tracked {
                // Keep only the newest open session on the tracked project.
                let open_count = project.sessions.iter().filter(|s| s.is_open()).count();
                if open_count > 1 {
                    let mut seen = 0;
                    project.sessions.retain(|session| {
                        if !session.is_open() {
                            return true;
                        }
                        seen += 1;
                        seen == open_count
                    });
                }
            } else {
                project.sessions.retain(|session| !session.is_open());
            }
            project.recalculate_total();
        }

        if self.is_tracking {
            let has_open = tracked
                .and_then(|id| self.project(id))
                .map(|project| project.sessions.iter().any(Session::is_open))
                .unwrap_or(false);
            if !has_open {
                self.is_tracking = false;
                self.active_tracking_id = None;
            }
        }
    }

    pub fn project(&self, id: i64) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn project_mut(&mut self, id: i64) -> Option<&mut Project> {
        self.projects.iter_mut().find(|project| project.id == id)
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project_id.and_then(|id| self.project(id))
    }

    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.name == name)
    }

    /// Creates a project named `name`. The id is the creation instant in
    /// epoch milliseconds, bumped past collisions so it stays unique.
    pub fn create_project(&mut self, name: &str, now: DateTime<Local>) -> Result<i64, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        if self.projects.iter().any(|project| project.name == name) {
            return Err(LedgerError::DuplicateName(name.to_string()));
        }

        let mut id = now.timestamp_millis();
        while self.project(id).is_some() {
            id += 1;
        }

        self.projects.push(Project {
            id,
            name: name.to_string(),
            total_seconds: 0,
            sessions: Vec::new(),
        });
        if self.current_project_id.is_none() {
            self.current_project_id = Some(id);
        }

        Ok(id)
    }

    pub fn rename_project(&mut self, new_name: &str) -> Result<(), LedgerError> {
        let id = self
            .current_project_id
            .ok_or(LedgerError::NoProjectSelected)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        if self
            .projects
            .iter()
            .any(|project| project.id != id && project.name == new_name)
        {
            return Err(LedgerError::DuplicateName(new_name.to_string()));
        }

        let project = self
            .project_mut(id)
            .ok_or(LedgerError::ProjectNotFound(id))?;
        project.name = new_name.to_string();
        Ok(())
    }

    /// Deletes the selected project and its sessions. Tracking on the doomed
    /// project is cleared first so no ghost session survives the cascade.
    pub fn delete_project(&mut self) -> Result<i64, LedgerError> {
        let id = self
            .current_project_id
            .ok_or(LedgerError::NoProjectSelected)?;
        if self.project(id).is_none() {
            return Err(LedgerError::ProjectNotFound(id));
        }

        if self.active_tracking_id == Some(id) {
            self.is_tracking = false;
            self.active_tracking_id = None;
        }

        self.projects.retain(|project| project.id != id);
        self.current_project_id = self.projects.first().map(|project| project.id);
        Ok(id)
    }

    pub fn select_project(&mut self, id: i64) -> Result<(), LedgerError> {
        if self.project(id).is_none() {
            return Err(LedgerError::ProjectNotFound(id));
        }
        self.current_project_id = Some(id);
        Ok(())
    }

    /// Idle -> Tracking transition. Returns Ok(false) when tracking is
    /// already in progress (a second start is a no-op). Starting is only
    /// allowed while the selected day is the real current date.
    pub fn start_tracking(&mut self, now: DateTime<Local>) -> Result<bool, LedgerError> {
        let id = self
            .current_project_id
            .ok_or(LedgerError::NoProjectSelected)?;
        if self.is_tracking {
            return Ok(false);
        }
        if self.selected_date != now.date_naive() {
            return Err(LedgerError::NotCurrentDay);
        }

        let project = self
            .project_mut(id)
            .ok_or(LedgerError::ProjectNotFound(id))?;
        project.sessions.push(Session {
            start: now.timestamp_millis(),
            end: None,
        });
        self.is_tracking = true;
        self.active_tracking_id = Some(id);
        Ok(true)
    }

    /// Tracking -> Idle transition. Closes the open session of the project
    /// actually being tracked, regardless of the current selection. Returns
    /// the closed session's duration in seconds, or None when nothing was
    /// tracking (a stop while idle is a no-op).
    pub fn stop_tracking(&mut self, now: DateTime<Local>) -> Option<i64> {
        if !self.is_tracking {
            return None;
        }
        let id = self.active_tracking_id?;
        let project = self.project_mut(id)?;
        let session = project
            .sessions
            .iter_mut()
            .rfind(|session| session.is_open())?;

        session.end = Some(now.timestamp_millis());
        let duration = session.duration_seconds();
        project.total_seconds += duration;

        self.is_tracking = false;
        self.active_tracking_id = None;
        Some(duration)
    }

    /// Elapsed seconds of the running session, for the live display readout.
    /// Reads only the open session's start and `now`; never mutates.
    pub fn active_elapsed_seconds(&self, now: DateTime<Local>) -> Option<i64> {
        if !self.is_tracking {
            return None;
        }
        let project = self.project(self.active_tracking_id?)?;
        let session = project.sessions.iter().rfind(|session| session.is_open())?;
        Some(((now.timestamp_millis() - session.start) / 1000).max(0))
    }

    /// Inserts a fully specified session into the selected project, subject
    /// to the same ordering and overlap rules as an edit.
    pub fn add_manual_session(&mut self, start: i64, end: i64) -> Result<(), LedgerError> {
        let id = self
            .current_project_id
            .ok_or(LedgerError::NoProjectSelected)?;
        if start >= end {
            return Err(LedgerError::EndBeforeStart);
        }

        let project = self
            .project_mut(id)
            .ok_or(LedgerError::ProjectNotFound(id))?;
        if is_overlapping(start, Some(end), &project.sessions, None) {
            return Err(LedgerError::Overlap);
        }

        project.sessions.push(Session {
            start,
            end: Some(end),
        });
        project.recalculate_total();
        Ok(())
    }

    /// Two-phase edit of one endpoint of a session: the new instant is the
    /// edited field's existing date combined with `hour:minute` (seconds and
    /// milliseconds zeroed), validated in full before anything is written.
    pub fn edit_session(
        &mut self,
        index: usize,
        field: SessionField,
        hour: u32,
        minute: u32,
    ) -> Result<(), LedgerError> {
        let id = self
            .current_project_id
            .ok_or(LedgerError::NoProjectSelected)?;
        let project = self.project(id).ok_or(LedgerError::ProjectNotFound(id))?;
        let session = project
            .sessions
            .get(index)
            .ok_or(LedgerError::SessionNotFound(index))?;

        let base = match field {
            SessionField::Start => session.start,
            SessionField::End => match session.end {
                Some(end) => end,
                None => return Err(LedgerError::SessionRunning),
            },
        };
        let new_time = local_clock_on_date(from_epoch_ms(base).date_naive(), hour, minute)?;

        let (candidate_start, candidate_end) = match field {
            SessionField::Start => (new_time, session.end),
            SessionField::End => (session.start, Some(new_time)),
        };
        if let Some(end) = candidate_end {
            if candidate_start >= end {
                return Err(LedgerError::EndBeforeStart);
            }
        }
        if is_overlapping(candidate_start, candidate_end, &project.sessions, Some(index)) {
            return Err(LedgerError::Overlap);
        }

        let project = self
            .project_mut(id)
            .ok_or(LedgerError::ProjectNotFound(id))?;
        let session = project
            .sessions
            .get_mut(index)
            .ok_or(LedgerError::SessionNotFound(index))?;
        match field {
            SessionField::Start => session.start = new_time,
            SessionField::End => session.end = Some(new_time),
        }
        project.recalculate_total();
        Ok(())
    }

    pub fn delete_session(&mut self, index: usize) -> Result<(), LedgerError> {
        let id = self
            .current_project_id
            .ok_or(LedgerError::NoProjectSelected)?;
        let project = self
            .project_mut(id)
            .ok_or(LedgerError::ProjectNotFound(id))?;
        if index >= project.sessions.len() {
            return Err(LedgerError::SessionNotFound(index));
        }
        if project.sessions[index].is_open() {
            return Err(LedgerError::SessionRunning);
        }

        project.sessions.remove(index);
        project.recalculate_total();
        Ok(())
    }

    /// The four statistics windows over one project or, with `scope` absent,
    /// over all projects. `today` matches the local calendar date of `now`;
    /// `week` is a rolling trailing seven days from `now` (deliberately not
    /// the Monday-anchored week the view filter uses); `month_total` follows
    /// the selected month/year pair. Open sessions contribute nothing.
    pub fn calculate_stats(&self, scope: Option<i64>, now: DateTime<Local>) -> Stats {
        let mut stats = Stats::default();
        let now_ms = now.timestamp_millis();
        let today = now.date_naive();
        let week_ago = now_ms - WEEK_MS;

        let scoped = self
            .projects
            .iter()
            .filter(|project| scope.is_none_or(|id| project.id == id));
        for project in scoped {
            for session in &project.sessions {
                if session.is_open() {
                    continue;
                }
                let duration = session.duration_seconds();
                let start = from_epoch_ms(session.start);

                if start.date_naive() == today {
                    stats.today += duration;
                }
                if session.start > week_ago {
                    stats.week += duration;
                }
                if start.month0() == self.selected_month && start.year() == self.selected_year {
                    stats.month_total += duration;
                }
                stats.total += duration;
            }
        }

        stats
    }

    /// Session indexes of `project` visible under the current view filter:
    /// the selected date itself, its Monday-start calendar week, or its
    /// calendar month.
    pub fn visible_sessions<'a>(&self, project: &'a Project) -> Vec<(usize, &'a Session)> {
        let selected = self.selected_date;
        project
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, session)| {
                let date = from_epoch_ms(session.start).date_naive();
                match self.view_mode {
                    ViewMode::Day => date == selected,
                    ViewMode::Week => {
                        let (first, last) = week_bounds(selected);
                        date >= first && date <= last
                    }
                    ViewMode::Month => {
                        date.month() == selected.month() && date.year() == selected.year()
                    }
                }
            })
            .collect()
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn set_selected_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
    }

    pub fn set_selected_month(&mut self, month0: u32, year: i32) {
        self.selected_month = month0.min(11);
        self.selected_year = year;
    }
}

/// True when the candidate interval conflicts with any other closed session.
/// Half-open semantics, strict on both sides: intervals that merely touch at
/// an endpoint do not conflict. Open sessions are never a conflict source,
/// and an open-ended candidate never conflicts.
pub fn is_overlapping(
    candidate_start: i64,
    candidate_end: Option<i64>,
    sessions: &[Session],
    exclude: Option<usize>,
) -> bool {
    let Some(candidate_end) = candidate_end else {
        return false;
    };

    sessions.iter().enumerate().any(|(index, session)| {
        if Some(index) == exclude {
            return false;
        }
        let Some(end) = session.end else {
            return false;
        };
        candidate_start < end && candidate_end > session.start
    })
}

/// Monday-start calendar week containing `date`, used by the week view
/// filter only.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    (first, first + Duration::days(6))
}

pub fn from_epoch_ms(ms: i64) -> DateTime<Local> {
    DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .with_timezone(&Local)
}

/// Epoch milliseconds of `hour:minute` local time on `date`. On a DST fold
/// the earlier instant wins; inside a DST gap the time does not exist.
pub fn local_clock_on_date(date: NaiveDate, hour: u32, minute: u32) -> Result<i64, LedgerError> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or(LedgerError::InvalidTime)?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(datetime) => Ok(datetime.timestamp_millis()),
        LocalResult::Ambiguous(first, second) => Ok(first.min(second).timestamp_millis()),
        LocalResult::None => Err(LedgerError::InvalidTime),
    }
}

pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// "HH:MM" local clock text for a session endpoint; empty for an absent end.
pub fn format_clock(ms: Option<i64>) -> String {
    match ms {
        Some(ms) => from_epoch_ms(ms).format("%H:%M").to_string(),
        None => String::new(),
    }
}

pub fn format_date(ms: i64) -> String {
    from_epoch_ms(ms).format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, NaiveDate, TimeZone};

    use super::{
        format_duration, is_overlapping, week_bounds, Ledger, LedgerError, Session, SessionField,
        ViewMode,
    };

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> chrono::DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("local time should exist")
    }

    fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
        local(y, mo, d, h, mi).timestamp_millis()
    }

    fn ledger_with_project(now: chrono::DateTime<Local>) -> Ledger {
        let mut ledger = Ledger::new(now);
        ledger
            .create_project("Work", now)
            .expect("project should be created");
        ledger
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let sessions = vec![
            Session {
                start: ms(2026, 3, 2, 10, 0),
                end: Some(ms(2026, 3, 2, 11, 0)),
            },
            Session {
                start: ms(2026, 3, 2, 13, 0),
                end: Some(ms(2026, 3, 2, 14, 0)),
            },
        ];

        assert!(!is_overlapping(
            ms(2026, 3, 2, 11, 0),
            Some(ms(2026, 3, 2, 12, 0)),
            &sessions,
            None,
        ));
        assert!(is_overlapping(
            ms(2026, 3, 2, 10, 30),
            Some(ms(2026, 3, 2, 10, 45)),
            &sessions,
            None,
        ));
    }

    #[test]
    fn open_sessions_are_never_a_conflict_source() {
        let sessions = vec![Session {
            start: ms(2026, 3, 2, 10, 0),
            end: None,
        }];

        assert!(!is_overlapping(
            ms(2026, 3, 2, 10, 15),
            Some(ms(2026, 3, 2, 10, 30)),
            &sessions,
            None,
        ));
    }

    #[test]
    fn excluded_index_never_conflicts_with_itself() {
        let sessions = vec![Session {
            start: ms(2026, 3, 2, 10, 0),
            end: Some(ms(2026, 3, 2, 11, 0)),
        }];

        assert!(!is_overlapping(
            ms(2026, 3, 2, 10, 30),
            Some(ms(2026, 3, 2, 11, 30)),
            &sessions,
            Some(0),
        ));
    }

    #[test]
    fn create_project_rejects_duplicate_and_empty_names() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);

        assert_eq!(ledger.create_project("  ", now), Err(LedgerError::EmptyName));
        assert_eq!(
            ledger.create_project("Work", now),
            Err(LedgerError::DuplicateName("Work".to_string()))
        );
        assert_eq!(ledger.projects.len(), 1);
    }

    #[test]
    fn first_project_becomes_selected() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = Ledger::new(now);
        let id = ledger
            .create_project("Work", now)
            .expect("project should be created");
        assert_eq!(ledger.current_project_id, Some(id));

        let second = ledger
            .create_project("Home", now)
            .expect("project should be created");
        assert_eq!(ledger.current_project_id, Some(id));
        assert_ne!(id, second);
    }

    #[test]
    fn start_twice_is_a_noop() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);

        assert_eq!(ledger.start_tracking(now), Ok(true));
        assert_eq!(ledger.start_tracking(now + Duration::minutes(5)), Ok(false));

        let project = ledger.current_project().expect("project");
        assert_eq!(project.sessions.len(), 1);
        assert_eq!(project.sessions.iter().filter(|s| s.is_open()).count(), 1);
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);

        assert_eq!(ledger.stop_tracking(now), None);
        let project = ledger.current_project().expect("project");
        assert!(project.sessions.is_empty());
        assert_eq!(project.total_seconds, 0);
    }

    #[test]
    fn start_requires_the_selected_day_to_be_today() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger.set_selected_date(NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"));

        assert_eq!(ledger.start_tracking(now), Err(LedgerError::NotCurrentDay));
        assert!(!ledger.is_tracking);
    }

    #[test]
    fn stop_closes_the_tracked_project_not_the_selected_one() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        let work = ledger.current_project_id.expect("selected");
        let home = ledger
            .create_project("Home", now)
            .expect("project should be created");

        ledger.start_tracking(now).expect("start should work");
        ledger.select_project(home).expect("select should work");

        let duration = ledger.stop_tracking(now + Duration::hours(1));
        assert_eq!(duration, Some(3600));

        let work = ledger.project(work).expect("project");
        assert_eq!(work.total_seconds, 3600);
        assert!(work.sessions.iter().all(|s| !s.is_open()));
        assert!(ledger.project(home).expect("project").sessions.is_empty());
        assert!(!ledger.is_tracking);
    }

    #[test]
    fn active_elapsed_tracks_the_open_session() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger.start_tracking(now).expect("start should work");

        let elapsed = ledger.active_elapsed_seconds(now + Duration::seconds(90));
        assert_eq!(elapsed, Some(90));

        ledger.stop_tracking(now + Duration::seconds(120));
        assert_eq!(
            ledger.active_elapsed_seconds(now + Duration::seconds(200)),
            None
        );
    }

    #[test]
    fn edit_to_inverted_interval_is_rejected_without_mutation() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");

        let result = ledger.edit_session(0, SessionField::End, 8, 30);
        assert_eq!(result, Err(LedgerError::EndBeforeStart));

        let project = ledger.current_project().expect("project");
        assert_eq!(project.sessions[0].start, ms(2026, 3, 2, 9, 0));
        assert_eq!(project.sessions[0].end, Some(ms(2026, 3, 2, 10, 0)));
        assert_eq!(project.total_seconds, 3600);
    }

    #[test]
    fn edit_into_another_session_is_rejected() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");
        ledger
            .add_manual_session(ms(2026, 3, 2, 11, 0), ms(2026, 3, 2, 12, 0))
            .expect("manual session should insert");

        let result = ledger.edit_session(1, SessionField::Start, 9, 30);
        assert_eq!(result, Err(LedgerError::Overlap));
        let project = ledger.current_project().expect("project");
        assert_eq!(project.sessions[1].start, ms(2026, 3, 2, 11, 0));
    }

    #[test]
    fn accepted_edit_commits_and_refreshes_the_total() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");

        ledger
            .edit_session(0, SessionField::End, 10, 30)
            .expect("edit should be accepted");

        let project = ledger.current_project().expect("project");
        assert_eq!(project.sessions[0].end, Some(ms(2026, 3, 2, 10, 30)));
        assert_eq!(project.total_seconds, 5400);
    }

    #[test]
    fn edits_touching_an_endpoint_are_accepted() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");
        ledger
            .add_manual_session(ms(2026, 3, 2, 11, 0), ms(2026, 3, 2, 12, 0))
            .expect("manual session should insert");

        ledger
            .edit_session(1, SessionField::Start, 10, 0)
            .expect("touching endpoints do not conflict");
    }

    #[test]
    fn editing_the_end_of_a_running_session_is_rejected() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger.start_tracking(now).expect("start should work");

        assert_eq!(
            ledger.edit_session(0, SessionField::End, 10, 0),
            Err(LedgerError::SessionRunning)
        );
    }

    #[test]
    fn total_never_drifts_across_add_edit_delete() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");
        ledger
            .add_manual_session(ms(2026, 3, 2, 11, 0), ms(2026, 3, 2, 11, 30))
            .expect("manual session should insert");

        let derived = |ledger: &Ledger| {
            ledger
                .current_project()
                .expect("project")
                .sessions
                .iter()
                .map(Session::duration_seconds)
                .sum::<i64>()
        };
        assert_eq!(
            ledger.current_project().expect("project").total_seconds,
            derived(&ledger)
        );

        ledger
            .edit_session(0, SessionField::End, 10, 45)
            .expect("edit should be accepted");
        assert_eq!(
            ledger.current_project().expect("project").total_seconds,
            derived(&ledger)
        );

        ledger.delete_session(1).expect("delete should work");
        assert_eq!(
            ledger.current_project().expect("project").total_seconds,
            derived(&ledger)
        );
    }

    #[test]
    fn manual_session_rejects_overlap() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");

        assert_eq!(
            ledger.add_manual_session(ms(2026, 3, 2, 9, 30), ms(2026, 3, 2, 9, 45)),
            Err(LedgerError::Overlap)
        );
        assert_eq!(ledger.current_project().expect("project").sessions.len(), 1);
    }

    #[test]
    fn stats_buckets_follow_their_windows() {
        let now = local(2026, 3, 4, 12, 0);
        let mut ledger = ledger_with_project(now);
        let two_days_ago = now - Duration::days(2);
        ledger
            .add_manual_session(
                two_days_ago.timestamp_millis(),
                (two_days_ago + Duration::seconds(3600)).timestamp_millis(),
            )
            .expect("manual session should insert");

        let stats = ledger.calculate_stats(ledger.current_project_id, now);
        assert_eq!(stats.today, 0);
        assert_eq!(stats.week, 3600);
        assert_eq!(stats.total, 3600);
    }

    #[test]
    fn month_stat_follows_the_selected_pair() {
        let now = local(2026, 3, 4, 12, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 2, 10, 9, 0), ms(2026, 2, 10, 10, 0))
            .expect("manual session should insert");
        ledger
            .add_manual_session(ms(2026, 3, 3, 9, 0), ms(2026, 3, 3, 10, 0))
            .expect("manual session should insert");

        ledger.set_selected_month(1, 2026); // February, 0-based
        let stats = ledger.calculate_stats(None, now);
        assert_eq!(stats.month_total, 3600);
        assert_eq!(stats.total, 7200);
    }

    #[test]
    fn open_sessions_contribute_zero_to_every_bucket() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger.start_tracking(now).expect("start should work");

        let stats = ledger.calculate_stats(None, now + Duration::hours(2));
        assert_eq!(stats.today, 0);
        assert_eq!(stats.week, 0);
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn stats_scope_narrows_to_one_project() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        let work = ledger.current_project_id.expect("selected");
        let home = ledger
            .create_project("Home", now)
            .expect("project should be created");

        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");
        ledger.select_project(home).expect("select should work");
        ledger
            .add_manual_session(ms(2026, 3, 2, 11, 0), ms(2026, 3, 2, 11, 30))
            .expect("manual session should insert");

        assert_eq!(ledger.calculate_stats(Some(work), now).total, 3600);
        assert_eq!(ledger.calculate_stats(Some(home), now).total, 1800);
        assert_eq!(ledger.calculate_stats(None, now).total, 5400);
    }

    #[test]
    fn week_view_filter_uses_a_monday_anchored_week() {
        // 2026-03-04 is a Wednesday.
        let date = NaiveDate::from_ymd_opt(2026, 3, 4).expect("date");
        let (first, last) = week_bounds(date);
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"));
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 3, 8).expect("date"));
    }

    #[test]
    fn view_filters_select_the_expected_sessions() {
        let now = local(2026, 3, 4, 12, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .add_manual_session(ms(2026, 3, 4, 9, 0), ms(2026, 3, 4, 10, 0))
            .expect("manual session should insert");
        ledger
            .add_manual_session(ms(2026, 3, 2, 9, 0), ms(2026, 3, 2, 10, 0))
            .expect("manual session should insert");
        ledger
            .add_manual_session(ms(2026, 3, 20, 9, 0), ms(2026, 3, 20, 10, 0))
            .expect("manual session should insert");

        ledger.set_selected_date(NaiveDate::from_ymd_opt(2026, 3, 4).expect("date"));
        let project = ledger.current_project().expect("project").clone();

        ledger.set_view_mode(ViewMode::Day);
        assert_eq!(ledger.visible_sessions(&project).len(), 1);
        ledger.set_view_mode(ViewMode::Week);
        assert_eq!(ledger.visible_sessions(&project).len(), 2);
        ledger.set_view_mode(ViewMode::Month);
        assert_eq!(ledger.visible_sessions(&project).len(), 3);
    }

    #[test]
    fn delete_project_clears_tracking_and_falls_back_selection() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        let home = ledger
            .create_project("Home", now)
            .expect("project should be created");
        ledger.start_tracking(now).expect("start should work");

        ledger.delete_project().expect("delete should work");
        assert!(!ledger.is_tracking);
        assert_eq!(ledger.active_tracking_id, None);
        assert_eq!(ledger.current_project_id, Some(home));
        assert_eq!(ledger.projects.len(), 1);
    }

    #[test]
    fn rename_rejects_taken_names_but_allows_own() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger
            .create_project("Home", now)
            .expect("project should be created");

        assert_eq!(
            ledger.rename_project("Home"),
            Err(LedgerError::DuplicateName("Home".to_string()))
        );
        ledger.rename_project("Work").expect("own name is fine");
        ledger
            .rename_project("Deep Work")
            .expect("rename should work");
        assert_eq!(ledger.current_project().expect("project").name, "Deep Work");
    }

    #[test]
    fn repair_clears_tracking_without_an_open_session() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        ledger.is_tracking = true;
        ledger.active_tracking_id = ledger.current_project_id;

        ledger.repair(now);
        assert!(!ledger.is_tracking);
        assert_eq!(ledger.active_tracking_id, None);
    }

    #[test]
    fn repair_drops_stray_open_sessions() {
        let now = local(2026, 3, 2, 9, 0);
        let mut ledger = ledger_with_project(now);
        let id = ledger.current_project_id.expect("selected");
        ledger
            .project_mut(id)
            .expect("project")
            .sessions
            .push(Session {
                start: ms(2026, 3, 1, 9, 0),
                end: None,
            });

        ledger.repair(now);
        let project = ledger.project(id).expect("project");
        assert!(project.sessions.is_empty());
    }

    #[test]
    fn formats_durations_as_clock_text() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3661), "01:01:01");
        assert_eq!(format_duration(-5), "00:00:00");
    }
}
