use crate::format::format_count;
use crate::markup::Element;

use super::{Column, CompanyRow, HeaderView, RenderedRow, RowId, SelectAllState, ValueType};

/// What a table instance renders into.
///
/// Both targets share the engine; they only differ in markup and in how a
/// row is addressed.
pub trait RenderTarget {
    fn title(&self) -> &'static str;

    /// Prefix of row identities, e.g. `tbl` in `tbl-row-3`.
    fn prefix(&self) -> &'static str;

    /// Id of the element the rendered rows are injected into.
    fn container_id(&self) -> &'static str;

    fn identity(&self, id: RowId) -> String {
        format!("{}-row-{}", self.prefix(), id.0)
    }

    /// Selector locating a rendered row by its identity.
    fn row_selector(&self, identity: &str) -> String;

    /// Text a cell shows once rendered. Filters match against this.
    fn cell_text(&self, column: Column, row: &CompanyRow) -> String {
        match column.value_type() {
            ValueType::Number => format_count(row.employee_count as i64),
            ValueType::Text => row.value(column),
        }
    }

    fn render_row(&self, row: &RenderedRow) -> Element;

    fn render_empty(&self) -> Element;

    fn render_header(&self, headers: &[HeaderView], select_all: SelectAllState) -> Element;

    fn render_table(&self, header: Element, body: Element) -> Element;

    fn render_body(&self, rows: &[RenderedRow]) -> Element;
}

fn select_all_box(state: SelectAllState) -> Element {
    let (checked, aria) = match state {
        SelectAllState::Unchecked => (false, "false"),
        SelectAllState::Checked => (true, "true"),
        SelectAllState::Indeterminate => (false, "mixed"),
    };
    Element::new("input")
        .attr("type", "checkbox")
        .class("select-all")
        .attr("aria-label", "Select all rows")
        .attr("aria-checked", aria)
        .flag("checked", checked)
        .flag("data-indeterminate", state == SelectAllState::Indeterminate)
}

fn row_checkbox(row: &RenderedRow) -> Element {
    Element::new("input")
        .attr("type", "checkbox")
        .class("row-select")
        .attr("aria-label", "Select row")
        .flag("checked", row.checked)
}

fn delete_button(row: &RenderedRow) -> Element {
    Element::new("button")
        .attr("type", "button")
        .class("btn btn-sm btn-outline-danger row-delete")
        .attr("data-row-id", row.identity.clone())
        .text("Delete")
}

pub const EMPTY_TEXT: &str = "No companies to show.";

/// The plain `<table>` flavour.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTable;

impl RenderTarget for NativeTable {
    fn title(&self) -> &'static str {
        "Company table"
    }

    fn prefix(&self) -> &'static str {
        "tbl"
    }

    fn container_id(&self) -> &'static str {
        "companyTableBody"
    }

    fn row_selector(&self, identity: &str) -> String {
        format!("#{} tr#{identity}", self.container_id())
    }

    fn render_row(&self, row: &RenderedRow) -> Element {
        let cells = Column::ALL.iter().map(|&c| {
            let td = Element::new("td");
            let td = match c.value_type() {
                ValueType::Number => td.class("text-end"),
                ValueType::Text => td,
            };
            td.text(row.cells[c.index()].clone())
        });
        Element::new("tr")
            .attr("id", row.identity.clone())
            .attr("data-row", row.snapshot_json())
            .flag("hidden", !row.is_visible())
            .child(Element::new("td").child(row_checkbox(row)))
            .children(cells)
            .child(Element::new("td").child(delete_button(row)))
    }

    fn render_empty(&self) -> Element {
        Element::new("tr").class("empty-state").child(
            Element::new("td")
                .attr("colspan", (Column::ALL.len() + 2).to_string())
                .class("text-center text-muted")
                .text(EMPTY_TEXT),
        )
    }

    fn render_header(&self, headers: &[HeaderView], select_all: SelectAllState) -> Element {
        let ths = headers.iter().map(|h| {
            Element::new("th")
                .class("sortable")
                .attr("data-key", h.column.key())
                .attr("data-type", value_type_tag(h.column))
                .attr("aria-sort", h.aria_sort)
                .text(h.column.title())
                .text(" ")
                .child(Element::new("span").class("sort-indicator").text(h.indicator))
        });
        Element::new("thead").child(
            Element::new("tr")
                .child(Element::new("th").child(select_all_box(select_all)))
                .children(ths)
                .child(Element::new("th").attr("aria-label", "Actions")),
        )
    }

    fn render_table(&self, header: Element, body: Element) -> Element {
        Element::new("table")
            .class("table table-hover")
            .attr("id", "companyTable")
            .child(header)
            .child(body)
    }

    fn render_body(&self, rows: &[RenderedRow]) -> Element {
        let body = Element::new("tbody").attr("id", self.container_id());
        if rows.is_empty() {
            body.child(self.render_empty())
        } else {
            body.children(rows.iter().map(|r| self.render_row(r)))
        }
    }
}

/// The `div` grid flavour with ARIA roles.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomGrid;

impl RenderTarget for CustomGrid {
    fn title(&self) -> &'static str {
        "Custom grid"
    }

    fn prefix(&self) -> &'static str {
        "grid"
    }

    fn container_id(&self) -> &'static str {
        "customCompanyTableBody"
    }

    fn row_selector(&self, identity: &str) -> String {
        format!(
            "#{} .custom-table__row[data-row-id=\"{identity}\"]",
            self.container_id()
        )
    }

    fn render_row(&self, row: &RenderedRow) -> Element {
        let cells = Column::ALL.iter().map(|&c| {
            let class = match c.value_type() {
                ValueType::Number => "custom-table__cell custom-table__cell--right",
                ValueType::Text => "custom-table__cell",
            };
            Element::new("div")
                .class(class)
                .attr("role", "cell")
                .text(row.cells[c.index()].clone())
        });
        Element::new("div")
            .class("custom-table__row")
            .attr("role", "row")
            .attr("data-row-id", row.identity.clone())
            .attr("data-row", row.snapshot_json())
            .flag("hidden", !row.is_visible())
            .child(
                Element::new("div")
                    .class("custom-table__cell")
                    .attr("role", "cell")
                    .child(row_checkbox(row)),
            )
            .children(cells)
            .child(
                Element::new("div")
                    .class("custom-table__cell")
                    .attr("role", "cell")
                    .child(delete_button(row)),
            )
    }

    fn render_empty(&self) -> Element {
        Element::new("div")
            .class("custom-table__row custom-table__row--empty")
            .attr("role", "row")
            .child(
                Element::new("div")
                    .class("custom-table__cell")
                    .attr("role", "cell")
                    .text(EMPTY_TEXT),
            )
    }

    fn render_header(&self, headers: &[HeaderView], select_all: SelectAllState) -> Element {
        let cols = headers.iter().map(|h| {
            Element::new("div")
                .class("custom-table__cell custom-table__head sortable-div")
                .attr("role", "columnheader")
                .attr("tabindex", "0")
                .attr("data-key", h.column.key())
                .attr("data-type", value_type_tag(h.column))
                .attr("aria-sort", h.aria_sort)
                .text(h.column.title())
                .text(" ")
                .child(Element::new("span").class("sort-indicator").text(h.indicator))
        });
        Element::new("div")
            .class("custom-table__row custom-table__row--head")
            .attr("role", "row")
            .child(
                Element::new("div")
                    .class("custom-table__cell custom-table__head")
                    .attr("role", "columnheader")
                    .child(select_all_box(select_all)),
            )
            .children(cols)
            .child(
                Element::new("div")
                    .class("custom-table__cell custom-table__head")
                    .attr("role", "columnheader")
                    .attr("aria-label", "Actions"),
            )
    }

    fn render_table(&self, header: Element, body: Element) -> Element {
        Element::new("div")
            .class("custom-table")
            .attr("role", "table")
            .attr("id", "customCompanyTable")
            .child(header)
            .child(body)
    }

    fn render_body(&self, rows: &[RenderedRow]) -> Element {
        let body = Element::new("div")
            .attr("id", self.container_id())
            .attr("role", "rowgroup");
        if rows.is_empty() {
            body.child(self.render_empty())
        } else {
            body.children(rows.iter().map(|r| self.render_row(r)))
        }
    }
}

fn value_type_tag(column: Column) -> &'static str {
    match column.value_type() {
        ValueType::Number => "number",
        ValueType::Text => "text",
    }
}
