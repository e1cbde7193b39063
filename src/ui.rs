use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::domain::{FTConfig, NotificationKind};
use crate::model::{Model, TableView, UIData};
use crate::table::render::EMPTY_TEXT;
use crate::table::{SelectAllState, ValueType};

pub const CMDLINE_HEIGHT: usize = 1;
pub const TABS_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const BORDER_HEIGHT: usize = 2;
const CHECKBOX_WIDTH: u16 = 3;

pub struct TableUI {
    max_column_width: usize,
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn select_all_box(state: SelectAllState) -> &'static str {
    match state {
        SelectAllState::Unchecked => "[ ]",
        SelectAllState::Checked => "[x]",
        SelectAllState::Indeterminate => "[-]",
    }
}

fn header_title(view: &TableView, idx: usize) -> String {
    let h = &view.headers[idx];
    if h.indicator.is_empty() {
        h.column.title().to_string()
    } else {
        format!("{} {}", h.column.title(), h.indicator)
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

impl TableUI {
    pub fn new(config: &FTConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [tabs_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(TABS_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(CMDLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_tabs(uidata, frame, tabs_area);
        self.draw_table(&uidata.table, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);
        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_tabs(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let tabs = Tabs::new(uidata.tabs.iter().map(|t| t.to_string()))
            .select(uidata.active_table)
            .highlight_style(Style::new().bold().reversed())
            .divider("|");
        frame.render_widget(tabs, area);
    }

    fn column_widths(&self, view: &TableView) -> Vec<Constraint> {
        let mut widths = vec![Constraint::Length(CHECKBOX_WIDTH)];
        widths.extend((0..view.headers.len()).map(|idx| {
            let content = view
                .rows
                .iter()
                .map(|r| r.cells[idx].chars().count())
                .max()
                .unwrap_or(0);
            let width = content
                .max(header_title(view, idx).chars().count())
                .min(self.max_column_width);
            Constraint::Length(width as u16)
        }));
        widths
    }

    fn draw_table(&self, view: &TableView, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", view.name).bold());
        let counts = Line::from(format!(" {} of {} rows ", view.visible, view.total)).right_aligned();
        let filters = view
            .filters
            .iter()
            .map(|(c, needle)| format!("{}~{}", c.key(), needle))
            .collect::<Vec<String>>();
        let mut block = Block::bordered()
            .title(title)
            .title(counts)
            .border_set(border::THICK);
        if !filters.is_empty() {
            block = block.title_bottom(Line::from(format!(" filter: {} ", filters.join(", "))).yellow());
        }

        if view.rows.is_empty() {
            let empty = Paragraph::new(EMPTY_TEXT).centered().dim().block(block);
            frame.render_widget(empty, area);
            return;
        }

        let header = Row::new(
            std::iter::once(Cell::from(select_all_box(view.select_all))).chain(
                (0..view.headers.len()).map(|idx| {
                    let cell = Cell::from(header_title(view, idx));
                    if idx == view.selected_column {
                        cell.style(Style::new().underlined())
                    } else {
                        cell
                    }
                }),
            ),
        )
        .style(Style::new().bold())
        .height(TABLE_HEADER_HEIGHT as u16);

        let rows = view.rows.iter().enumerate().map(|(row_idx, row)| {
            let cells = row.cells.iter().enumerate().map(|(col_idx, text)| {
                let line = match view.headers[col_idx].column.value_type() {
                    ValueType::Number => Line::from(text.as_str()).right_aligned(),
                    ValueType::Text => Line::from(text.as_str()),
                };
                let cell = Cell::from(line);
                if row_idx == view.selected_row && col_idx == view.selected_column {
                    cell.style(Style::new().reversed())
                } else {
                    cell
                }
            });
            Row::new(std::iter::once(Cell::from(checkbox(row.checked))).chain(cells))
        });

        let table = Table::new(rows, self.column_widths(view))
            .header(header)
            .block(block)
            .column_spacing(2)
            .row_highlight_style(Style::new().bg(Color::DarkGray));
        let mut state = TableState::default().with_selected(Some(view.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let line = Line::from(vec![
                Span::from(uidata.cmd_prompt.as_str()).bold(),
                Span::from(uidata.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (uidata.cmd_prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let line = match &uidata.notification {
            Some(n) => {
                let style = match n.kind {
                    NotificationKind::Success => Style::new().black().on_green(),
                    NotificationKind::Error => Style::new().white().on_red(),
                };
                Line::from(vec![
                    Span::styled(format!(" {} ", n.label()), style.bold()),
                    Span::styled(format!(" {} ", n.message), style),
                    " Esc to dismiss".dim(),
                ])
            }
            None => Line::from(vec![
                Span::from(uidata.status_message.as_str()),
                "  ? help  q quit".dim(),
            ]),
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 60);
        let block = Block::bordered()
            .title(Line::from(uidata.popup_title.as_str()).bold().centered())
            .title_bottom(Line::from(" Esc to close ").centered())
            .border_set(border::THICK);
        let popup = Paragraph::new(uidata.popup_message.as_str())
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }
}
