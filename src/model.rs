use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::fs;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::domain::{
    CMDMode, FTConfig, FTError, HELP_TEXT, Message, Notification, NotificationKind,
};
use crate::inputter::{InputResult, Inputter};
use crate::markup::{self, Element};
use crate::table::{
    ClickTarget, Column, HeaderView, RenderTarget, RowDetail, RowId, RowSource, SelectAllState,
    TableEngine,
};
use crate::ui::{BORDER_HEIGHT, CMDLINE_HEIGHT, TABLE_HEADER_HEIGHT, TABS_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    DETAIL,
    POPUP,
    CMDINPUT,
}

// Position of the selection among the visible rows of a table
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Cursor {
    row: usize,
    offset_row: usize,
    column: usize,
}

impl Cursor {
    fn position(&self) -> usize {
        self.offset_row + self.row
    }
}

/// A table engine together with where its rows come from.
pub struct TableInstance {
    engine: TableEngine,
    source: Box<dyn RowSource>,
    cursor: Cursor,
}

impl TableInstance {
    pub fn new(target: Box<dyn RenderTarget>, source: Box<dyn RowSource>) -> Self {
        Self {
            engine: TableEngine::new(target),
            source,
            cursor: Cursor::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowView {
    pub checked: bool,
    pub cells: Vec<String>,
}

/// The part of a table that fits on screen.
#[derive(Debug, Clone)]
pub struct TableView {
    pub name: &'static str,
    pub headers: Vec<HeaderView>,
    pub select_all: SelectAllState,
    pub rows: Vec<RowView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub visible: usize,
    pub total: usize,
    pub filters: Vec<(Column, String)>,
}

impl TableView {
    fn empty() -> Self {
        TableView {
            name: "",
            headers: Vec::new(),
            select_all: SelectAllState::Unchecked,
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            visible: 0,
            total: 0,
            filters: Vec::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let chrome = CMDLINE_HEIGHT + TABS_HEIGHT + TABLE_HEADER_HEIGHT + BORDER_HEIGHT;
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height: ui_height.saturating_sub(chrome).max(1),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct UIData {
    pub tabs: Vec<&'static str>,
    pub active_table: usize,
    pub table: TableView,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_prompt: String,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub notification: Option<Notification>,
    pub layout: UILayout,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            tabs: Vec::new(),
            active_table: 0,
            table: TableView::empty(),
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_prompt: String::new(),
            active_cmdinput: false,
            status_message: String::new(),
            notification: None,
            layout: UILayout::default(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: FTConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    tables: Vec<TableInstance>,
    active: usize,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    notifications: Vec<Notification>,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &FTConfig,
        tables: Vec<TableInstance>,
        clipboard: Option<Clipboard>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, FTError> {
        if tables.is_empty() {
            return Err(FTError::InvalidInput("no table to show".to_string()));
        }
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            tables,
            active: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            notifications: Vec::new(),
            status_message: String::new(),
        };
        model.set_status_message("Loading ...");
        model.update_uidata();
        Ok(model)
    }

    /// Fetches every table from its source. A failing source leaves its table
    /// as it was and raises an error banner.
    pub fn load_tables(&mut self) {
        let mut failures = Vec::new();
        let mut loaded = 0;
        for instance in self.tables.iter_mut() {
            match instance.engine.load(instance.source.as_ref()) {
                Ok(count) => {
                    loaded += count;
                    instance.cursor = Cursor::default();
                }
                Err(e) => failures.push(format!("Failed to load {}: {e}", instance.engine.name())),
            }
        }
        for failure in failures {
            self.notify(Notification::error(failure));
        }
        self.set_status_message(format!("Loaded {loaded} rows"));
        self.update_uidata();
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableEngine> {
        self.tables.iter().map(|t| &t.engine)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        trace!("Status: {}", self.status_message);
    }

    fn notify(&mut self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => error!("{}", notification.message),
            NotificationKind::Success => info!("{}", notification.message),
        }
        self.notifications.push(notification);
    }

    fn expire_notifications(&mut self) {
        let timeout = Duration::from_secs(self.config.notification_timeout);
        let now = Instant::now();
        let before = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired(timeout, now));
        if self.notifications.len() != before {
            trace!("Expired {} notifications", before - self.notifications.len());
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        let pos = self.cursor().position();
        self.place_cursor(pos);
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), FTError> {
        self.expire_notifications();

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MovePageUp => self.move_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => self.move_selection_down(self.uilayout.table_height),
                    Message::MoveBeginning => self.place_cursor(0),
                    Message::MoveEnd => self.place_cursor(usize::MAX),
                    Message::NextTable => self.next_table(),
                    Message::Sort => self.sort_current_column(),
                    Message::Filter => self.enter_cmd_mode(CMDMode::FilterColumn),
                    Message::ClearFilters => self.clear_filters(),
                    Message::ToggleRow => self.toggle_row(),
                    Message::ToggleSelectAll => self.toggle_select_all(),
                    Message::Delete => self.delete_row(),
                    Message::Reset => self.reset(),
                    Message::Reload => self.load_tables(),
                    Message::CopyRows => self.copy_rows(),
                    Message::WritePage => self.write_page(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_help(),
                    Message::Enter => self.enter(),
                    Message::Exit => self.exit(),
                    Message::RawKey(_) => (),
                },
                Modus::DETAIL => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp | Message::MoveLeft => self.step_detail(-1),
                    Message::MoveDown | Message::MoveRight => self.step_detail(1),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_help(),
                    Message::Enter | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Enter | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if let Some(id) = self.selected_id() {
            let detail = self.active_mut().engine.click(id, ClickTarget::Cell);
            match detail {
                Some(detail) => self.show_detail(&detail),
                None => warn!("No detail for row {:?}", id),
            }
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                // Nothing to close, Esc dismisses the newest banner
                if let Some(n) = self.notifications.pop() {
                    debug!("Dismissed notification \"{}\"", n.message);
                }
            }
            Modus::DETAIL | Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = if self.previous_modus == Modus::DETAIL {
                    Modus::DETAIL
                } else {
                    Modus::TABLE
                };
                self.previous_modus = Modus::TABLE;
                if self.modus == Modus::DETAIL {
                    self.step_detail(0);
                }
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_title = " Help ".to_string();
        self.uidata.popup_message = HELP_TEXT.to_string();
    }

    fn show_detail(&mut self, detail: &RowDetail) {
        let width = detail.fields.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        self.uidata.popup_title = format!(" {} ", detail.identity);
        self.uidata.popup_message = detail
            .fields
            .iter()
            .map(|(label, value)| format!("{label:>width$}  {value}"))
            .collect::<Vec<String>>()
            .join("\n");
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::DETAIL;
    }

    // Moves the detail view to a neighbouring visible row
    fn step_detail(&mut self, step: i32) {
        let pos = self.cursor().position();
        let target = if step < 0 {
            pos.saturating_sub(step.unsigned_abs() as usize)
        } else {
            pos + step as usize
        };
        self.place_cursor(target);
        match self.selected_id().and_then(|id| self.active().engine.detail(id)) {
            Some(detail) => self.show_detail(&detail),
            None => {
                self.modus = Modus::TABLE;
                self.previous_modus = Modus::TABLE;
            }
        }
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?}", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        match mode {
            CMDMode::FilterColumn => {
                let column = self.current_column();
                let current = self.active().engine.filters().get(column).to_string();
                self.input.set(&current);
            }
        }
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(_) if self.last_input.canceled => debug!("Command input canceled"),
            Some(CMDMode::FilterColumn) => self.filter(&cmd_input),
            None => info!("Cmd mode is none!"),
        }
        self.cmd_mode = None;
    }

    fn cmd_prompt(&self) -> String {
        match self.cmd_mode {
            Some(CMDMode::FilterColumn) => format!("Filter {}: ", self.current_column().title()),
            None => String::new(),
        }
    }

    // -------------------- Table operations ---------------------- //

    fn active(&self) -> &TableInstance {
        &self.tables[self.active]
    }

    fn active_mut(&mut self) -> &mut TableInstance {
        &mut self.tables[self.active]
    }

    fn cursor(&self) -> Cursor {
        self.active().cursor
    }

    fn current_column(&self) -> Column {
        Column::ALL[self.cursor().column]
    }

    fn visible_count(&self) -> usize {
        self.active().engine.visible_rows().count()
    }

    fn selected_id(&self) -> Option<RowId> {
        self.active()
            .engine
            .visible_rows()
            .nth(self.cursor().position())
            .map(|r| r.id)
    }

    /// Moves the selection to `pos` (clamped) and scrolls it into view.
    fn place_cursor(&mut self, pos: usize) {
        let count = self.visible_count();
        let height = self.uilayout.table_height.max(1);
        let pos = pos.min(count.saturating_sub(1));
        let cursor = &mut self.active_mut().cursor;
        if pos < cursor.offset_row {
            cursor.offset_row = pos;
        } else if pos >= cursor.offset_row + height {
            cursor.offset_row = pos + 1 - height;
        }
        cursor.row = pos - cursor.offset_row;
    }

    // Keeps the selection on the same row after the view changed
    fn follow(&mut self, id: Option<RowId>) {
        let pos = id.and_then(|id| self.active().engine.visible_rows().position(|r| r.id == id));
        match pos {
            Some(pos) => self.place_cursor(pos),
            None => {
                let pos = self.cursor().position();
                self.place_cursor(pos)
            }
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        let pos = self.cursor().position();
        self.place_cursor(pos.saturating_sub(size));
    }

    fn move_selection_down(&mut self, size: usize) {
        let pos = self.cursor().position();
        self.place_cursor(pos.saturating_add(size));
    }

    fn move_selection_left(&mut self) {
        let cursor = &mut self.active_mut().cursor;
        cursor.column = cursor.column.saturating_sub(1);
    }

    fn move_selection_right(&mut self) {
        let cursor = &mut self.active_mut().cursor;
        cursor.column = (cursor.column + 1).min(Column::ALL.len() - 1);
    }

    fn next_table(&mut self) {
        self.active = (self.active + 1) % self.tables.len();
        let name = self.active().engine.name();
        self.set_status_message(format!("Showing {name}"));
    }

    fn sort_current_column(&mut self) {
        let column = self.current_column();
        let id = self.selected_id();
        let result = self
            .active_mut()
            .engine
            .sort(column.key(), column.value_type());
        if let Err(e) = result {
            self.notify(Notification::error(e.to_string()));
            return;
        }
        self.follow(id);
        let direction = self.active().engine.state().direction;
        self.set_status_message(format!("Sorted by {} {}", column.title(), direction.indicator()));
    }

    fn filter(&mut self, term: &str) {
        let column = self.current_column();
        let id = self.selected_id();
        self.active_mut().engine.set_filter(column, term);
        self.follow(id);
        let msg = format!(
            "Filter {} \"{}\": {} of {} rows shown",
            column.title(),
            term,
            self.visible_count(),
            self.active().engine.rendered().len()
        );
        self.set_status_message(msg);
    }

    fn clear_filters(&mut self) {
        let id = self.selected_id();
        self.active_mut().engine.clear_filters();
        self.follow(id);
        self.set_status_message("Filters cleared");
    }

    fn toggle_row(&mut self) {
        if let Some(id) = self.selected_id() {
            self.active_mut().engine.click(id, ClickTarget::Checkbox);
        }
    }

    fn toggle_select_all(&mut self) {
        let state = self.active_mut().engine.toggle_select_all();
        let selected = self.active().engine.selected_rows().len();
        debug!("Select all is now {:?}", state);
        self.set_status_message(format!("{selected} rows selected"));
    }

    fn delete_row(&mut self) {
        let pos = self.cursor().position();
        let identity = self
            .active()
            .engine
            .visible_rows()
            .nth(pos)
            .map(|r| r.identity.clone());
        let Some(identity) = identity else {
            return;
        };
        if let Err(e) = self.active_mut().engine.delete(&identity) {
            self.notify(Notification::error(e.to_string()));
            return;
        }
        self.place_cursor(pos);
        self.set_status_message(format!("Deleted {identity}"));
    }

    fn reset(&mut self) {
        let id = self.selected_id();
        self.active_mut().engine.reset();
        self.follow(id);
        self.set_status_message("Table reset");
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    /// CSV of the checked rows, or of the current row when none is checked.
    fn rows_as_csv(&self) -> Option<(usize, String)> {
        let engine = &self.active().engine;
        let mut rows = engine.selected_rows();
        if rows.is_empty() {
            let current = engine.visible_rows().nth(self.cursor().position());
            rows.extend(current);
        }
        if rows.is_empty() {
            return None;
        }
        let lines = rows
            .iter()
            .map(|r| {
                Column::ALL
                    .iter()
                    .map(|&c| Model::wrap_cell_content(&r.snapshot.value(c)))
                    .collect::<Vec<String>>()
                    .join(",")
            })
            .collect::<Vec<String>>();
        Some((rows.len(), lines.join("\n")))
    }

    fn copy_rows(&mut self) {
        let Some((count, content)) = self.rows_as_csv() else {
            return;
        };
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(content).map_err(FTError::from),
            None => Err(FTError::Clipboard("no clipboard available".to_string())),
        };
        match result {
            Ok(_) => self.notify(Notification::success(format!("Copied {count} rows"))),
            Err(e) => self.notify(Notification::error(e.to_string())),
        }
    }

    fn write_page(&mut self) {
        let path = self.config.page_file.clone();
        let html = tables_page(self.tables());
        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&path, html));
        match result {
            Ok(_) => self.notify(Notification::success(format!("Wrote {}", path.display()))),
            Err(e) => self.notify(Notification::error(format!(
                "Writing {} failed: {e}",
                path.display()
            ))),
        }
    }

    // -------------------- UI data ---------------------- //

    fn get_visible_name(name: &str, width: usize) -> String {
        if name.chars().count() <= width {
            name.to_string()
        } else {
            let mut out = name.chars().take(width.saturating_sub(1)).collect::<String>();
            out.push('…');
            out
        }
    }

    fn build_table_view(&self) -> TableView {
        let instance = self.active();
        let engine = &instance.engine;
        let cursor = instance.cursor;
        let width = self.config.max_column_width;
        let rows = engine
            .visible_rows()
            .skip(cursor.offset_row)
            .take(self.uilayout.table_height)
            .map(|r| RowView {
                checked: r.checked,
                cells: r
                    .cells
                    .iter()
                    .map(|c| Model::get_visible_name(c, width))
                    .collect(),
            })
            .collect();
        let filters = Column::ALL
            .iter()
            .filter(|&&c| !engine.filters().get(c).is_empty())
            .map(|&c| (c, engine.filters().get(c).to_string()))
            .collect();
        TableView {
            name: engine.name(),
            headers: engine.headers(),
            select_all: engine.select_all_state(),
            rows,
            selected_row: cursor.row,
            selected_column: cursor.column,
            visible: self.visible_count(),
            total: engine.rendered().len(),
            filters,
        }
    }

    fn update_uidata(&mut self) {
        self.uidata.tabs = self.tables.iter().map(|t| t.engine.name()).collect();
        self.uidata.active_table = self.active;
        self.uidata.table = self.build_table_view();
        self.uidata.show_popup = matches!(self.modus, Modus::DETAIL | Modus::POPUP);
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_prompt = self.cmd_prompt();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.status_message = self.status_message.clone();
        self.uidata.notification = self.notifications.last().cloned();
        self.uidata.layout = self.uilayout.clone();
        self.uidata.last_update = Instant::now();
    }
}

/// Page markup with every table, as written by `w` and `ft render`.
pub fn tables_page<'a>(tables: impl IntoIterator<Item = &'a TableEngine>) -> String {
    let sections = tables
        .into_iter()
        .map(|t| {
            Element::new("section")
                .class("table-section")
                .child(Element::new("h2").text(t.name()))
                .child(t.markup())
        })
        .collect();
    markup::page("Company tables", sections)
}
