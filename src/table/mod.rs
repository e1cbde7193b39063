//! Sortable, filterable table engine.
//!
//! One `TableEngine` owns one row collection and its state (sort, filters,
//! deletions). The engine renders into a `RenderTarget`, which decides what
//! the markup looks like. The rendered rows are kept as the live view the
//! user interacts with: filters are matched against their cell text and
//! checkbox states are read from them.

pub mod render;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::domain::FTError;
use crate::format::format_count;
use crate::markup::Element;
pub use render::{CustomGrid, NativeTable, RenderTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRow {
    pub company: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub employee_count: u64,
}

impl CompanyRow {
    pub fn new(company: &str, city: &str, address: &str, phone: &str, employee_count: u64) -> Self {
        Self {
            company: company.to_string(),
            city: city.to_string(),
            address: address.to_string(),
            phone: phone.to_string(),
            employee_count,
        }
    }

    /// Raw (unformatted) value of a column.
    pub fn value(&self, column: Column) -> String {
        match column {
            Column::Company => self.company.clone(),
            Column::City => self.city.clone(),
            Column::Address => self.address.clone(),
            Column::Phone => self.phone.clone(),
            Column::EmployeeCount => self.employee_count.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Company,
    City,
    Address,
    Phone,
    EmployeeCount,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Company,
        Column::City,
        Column::Address,
        Column::Phone,
        Column::EmployeeCount,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Column::Company => "company",
            Column::City => "city",
            Column::Address => "address",
            Column::Phone => "phone",
            Column::EmployeeCount => "employeeCount",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Column::Company => "Company",
            Column::City => "City",
            Column::Address => "Address",
            Column::Phone => "Phone",
            Column::EmployeeCount => "Employees",
        }
    }

    pub fn from_key(key: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.key() == key)
    }

    /// The comparison type a header announces for its column.
    pub fn value_type(&self) -> ValueType {
        match self {
            Column::EmployeeCount => ValueType::Number,
            _ => ValueType::Text,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueType {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    pub fn aria(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Identity assigned when a row is loaded. It never changes while the row
/// collection lives, so deletions and checkbox states survive re-sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

#[derive(Debug, Clone)]
struct TableRow {
    id: RowId,
    data: CompanyRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    pub sort_key: Option<Column>,
    pub direction: SortDirection,
    pub deleted: HashSet<RowId>,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            sort_key: None,
            direction: SortDirection::Descending,
            deleted: HashSet::new(),
        }
    }
}

/// One free-text needle per column. Empty needles do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    needles: BTreeMap<Column, String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: Column, needle: impl Into<String>) {
        let needle = needle.into();
        if needle.is_empty() {
            self.needles.remove(&column);
        } else {
            self.needles.insert(column, needle.to_lowercase());
        }
    }

    pub fn get(&self, column: Column) -> &str {
        self.needles.get(&column).map(String::as_str).unwrap_or("")
    }

    pub fn clear(&mut self) {
        self.needles.clear();
    }

    /// Matches rendered cell text, indexed by `Column::index`.
    pub fn matches(&self, cells: &[String]) -> bool {
        self.needles.iter().all(|(column, needle)| {
            cells
                .get(column.index())
                .is_some_and(|text| text.to_lowercase().contains(needle.as_str()))
        })
    }
}

/// A row as it currently appears in the rendered container.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    pub id: RowId,
    pub identity: String,
    pub cells: Vec<String>,
    pub snapshot: CompanyRow,
    pub checked: bool,
    pub filtered_out: bool,
    pub deleted: bool,
}

impl RenderedRow {
    pub fn is_visible(&self) -> bool {
        !self.filtered_out && !self.deleted
    }

    /// Data snapshot embedded with the row at render time.
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.snapshot).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderView {
    pub column: Column,
    pub aria_sort: &'static str,
    pub indicator: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectAllState {
    Unchecked,
    Checked,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickTarget {
    Cell,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowDetail {
    pub identity: String,
    pub fields: Vec<(&'static str, String)>,
}

impl RowDetail {
    fn from_snapshot(identity: &str, row: &CompanyRow) -> Self {
        let fields = Column::ALL
            .iter()
            .map(|&c| {
                let value = match c {
                    Column::EmployeeCount => format_count(row.employee_count as i64),
                    _ => row.value(c),
                };
                (c.title(), value)
            })
            .collect();
        Self {
            identity: identity.to_string(),
            fields,
        }
    }
}

/// Where a table instance gets its rows from.
pub trait RowSource {
    fn name(&self) -> String;
    fn fetch_rows(&self) -> Result<Vec<CompanyRow>, FTError>;
}

/// The fixed sample rows used when no backend is available.
pub struct StaticSeed;

impl StaticSeed {
    pub fn rows() -> Vec<CompanyRow> {
        vec![
            CompanyRow::new("Acme Logistics", "Austin", "1200 Congress Ave", "(512) 555-0143", 245),
            CompanyRow::new("Bluebonnet Foods", "Dallas", "300 Main St", "(214) 555-0178", 610),
            CompanyRow::new("Cedar Analytics", "Seattle", "88 Pine St", "(206) 555-0112", 132),
            CompanyRow::new("Delta Fabrication", "Chicago", "4100 W Lake St", "(312) 555-0190", 980),
            CompanyRow::new("Evergreen Health", "Denver", "17 Larimer Sq", "(303) 555-0125", 420),
            CompanyRow::new("Foxglove Studios", "Boston", "9 Tremont St", "(617) 555-0164", 75),
        ]
    }
}

impl RowSource for StaticSeed {
    fn name(&self) -> String {
        "static seed".to_string()
    }

    fn fetch_rows(&self) -> Result<Vec<CompanyRow>, FTError> {
        Ok(StaticSeed::rows())
    }
}

pub fn compare_values(a: &str, b: &str, value_type: ValueType) -> Ordering {
    match value_type {
        ValueType::Number => match (parse_number(a), parse_number(b)) {
            (Some(a_val), Some(b_val)) => a_val.total_cmp(&b_val),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        ValueType::Text => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

// Empty strings count as zero. Unparsable values sort after every number.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse().ok().filter(|v: &f64| !v.is_nan())
}

pub struct TableEngine {
    target: Box<dyn RenderTarget>,
    rows: Vec<TableRow>,
    next_id: u64,
    state: TableState,
    filters: FilterCriteria,
    rendered: Vec<RenderedRow>,
}

impl TableEngine {
    pub fn new(target: Box<dyn RenderTarget>) -> Self {
        Self {
            target,
            rows: Vec::new(),
            next_id: 0,
            state: TableState::default(),
            filters: FilterCriteria::new(),
            rendered: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.target.title()
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn filters(&self) -> &FilterCriteria {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rendered(&self) -> &[RenderedRow] {
        &self.rendered
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &RenderedRow> {
        self.rendered.iter().filter(|r| r.is_visible())
    }

    /// Identity strings of the backing collection, in its current order.
    pub fn order(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| self.target.identity(r.id))
            .collect()
    }

    pub fn data(&self) -> Vec<&CompanyRow> {
        self.rows.iter().map(|r| &r.data).collect()
    }

    /// Replaces the row collection from `source` and renders it sorted by
    /// company. On failure the previous rows and markup stay untouched.
    pub fn load(&mut self, source: &dyn RowSource) -> Result<usize, FTError> {
        let rows = match source.fetch_rows() {
            Ok(rows) => rows,
            Err(e) => {
                error!("Loading {} from {} failed: {e}", self.name(), source.name());
                return Err(e);
            }
        };
        let count = rows.len();
        info!("Loaded {count} rows for {} from {}", self.name(), source.name());
        self.replace_rows(rows);
        Ok(count)
    }

    pub fn replace_rows(&mut self, rows: Vec<CompanyRow>) {
        self.rows = rows
            .into_iter()
            .map(|data| {
                let id = RowId(self.next_id);
                self.next_id += 1;
                TableRow { id, data }
            })
            .collect();
        // Old identities do not exist anymore
        self.state.deleted.clear();
        self.rendered.clear();
        self.sort_default();
    }

    fn sort_default(&mut self) {
        self.state.sort_key = None;
        self.state.direction = SortDirection::Descending;
        self.sort_column(Column::Company, ValueType::Text);
    }

    /// Sorts by the column named `key`. Sorting the active column again flips
    /// the direction, any other column starts ascending.
    pub fn sort(&mut self, key: &str, value_type: ValueType) -> Result<(), FTError> {
        let column = Column::from_key(key).ok_or_else(|| {
            warn!("Sort requested for unknown column {key}");
            FTError::UnknownColumn(key.to_string())
        })?;
        self.sort_column(column, value_type);
        Ok(())
    }

    pub fn sort_column(&mut self, column: Column, value_type: ValueType) {
        let direction = if self.state.sort_key == Some(column) {
            self.state.direction.flip()
        } else {
            SortDirection::Ascending
        };

        self.rows.sort_by(|a, b| {
            let cmp = compare_values(&a.data.value(column), &b.data.value(column), value_type);
            direction.apply(cmp)
        });

        self.state.sort_key = Some(column);
        self.state.direction = direction;
        debug!(
            "Sorted {} by {} {:?} ({} rows)",
            self.name(),
            column.key(),
            direction,
            self.rows.len()
        );
        self.render();
    }

    pub fn headers(&self) -> Vec<HeaderView> {
        Column::ALL
            .iter()
            .map(|&column| match self.state.sort_key {
                Some(active) if active == column => HeaderView {
                    column,
                    aria_sort: self.state.direction.aria(),
                    indicator: self.state.direction.indicator(),
                },
                _ => HeaderView {
                    column,
                    aria_sort: "none",
                    indicator: "",
                },
            })
            .collect()
    }

    /// Rebuilds the rendered rows from the backing collection. Deleted rows
    /// are skipped, filters are re-applied and checkbox states are carried
    /// over by identity.
    pub fn render(&mut self) {
        let checked: HashSet<RowId> = self
            .rendered
            .iter()
            .filter(|r| r.checked)
            .map(|r| r.id)
            .collect();

        self.rendered = self
            .rows
            .iter()
            .filter(|r| !self.state.deleted.contains(&r.id))
            .map(|r| {
                let cells = Column::ALL
                    .iter()
                    .map(|&c| self.target.cell_text(c, &r.data))
                    .collect::<Vec<String>>();
                RenderedRow {
                    id: r.id,
                    identity: self.target.identity(r.id),
                    filtered_out: !self.filters.matches(&cells),
                    cells,
                    snapshot: r.data.clone(),
                    checked: checked.contains(&r.id),
                    deleted: false,
                }
            })
            .collect();
        trace!("Rendered {} rows for {}", self.rendered.len(), self.name());
    }

    pub fn filter(&mut self, criteria: FilterCriteria) {
        self.filters = criteria;
        self.apply_filters();
    }

    pub fn set_filter(&mut self, column: Column, needle: &str) {
        self.filters.set(column, needle);
        self.apply_filters();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.apply_filters();
    }

    fn apply_filters(&mut self) {
        for row in self.rendered.iter_mut() {
            row.filtered_out = !self.filters.matches(&row.cells);
        }
        trace!(
            "Filter {:?} leaves {} visible rows in {}",
            self.filters,
            self.rendered.iter().filter(|r| r.is_visible()).count(),
            self.name()
        );
    }

    pub fn find(&self, identity: &str) -> Option<RowId> {
        self.rows
            .iter()
            .map(|r| r.id)
            .find(|&id| self.target.identity(id) == identity)
    }

    /// Soft delete: hides the row, the backing collection keeps it.
    pub fn delete(&mut self, identity: &str) -> Result<(), FTError> {
        let id = self
            .find(identity)
            .ok_or_else(|| FTError::InvalidInput(format!("no row {identity}")))?;
        self.delete_id(id);
        Ok(())
    }

    pub fn delete_id(&mut self, id: RowId) {
        if !self.state.deleted.insert(id) {
            trace!("Row {:?} already deleted", id);
            return;
        }
        if let Some(row) = self.rendered.iter_mut().find(|r| r.id == id) {
            row.deleted = true;
        }
        debug!(
            "Deleted {} from {}",
            self.target.row_selector(&self.target.identity(id)),
            self.name()
        );
    }

    /// Back to company ascending with every deleted row restored. Filter
    /// criteria are kept and re-applied.
    pub fn reset(&mut self) {
        self.state.deleted.clear();
        self.sort_default();
        info!("Reset {}", self.name());
    }

    pub fn select_all_state(&self) -> SelectAllState {
        let (visible, checked) = self
            .visible_rows()
            .fold((0, 0), |(v, c), r| (v + 1, c + r.checked as usize));
        if checked == 0 {
            SelectAllState::Unchecked
        } else if checked == visible {
            SelectAllState::Checked
        } else {
            SelectAllState::Indeterminate
        }
    }

    /// Clicking "select all": checks every visible row unless all of them
    /// already are, in which case they are all unchecked.
    pub fn toggle_select_all(&mut self) -> SelectAllState {
        let checked = self.select_all_state() != SelectAllState::Checked;
        self.set_select_all(checked);
        self.select_all_state()
    }

    /// Only visible rows are touched; hidden rows keep their checkbox state.
    pub fn set_select_all(&mut self, checked: bool) {
        for row in self.rendered.iter_mut().filter(|r| r.is_visible()) {
            row.checked = checked;
        }
    }

    pub fn set_checked(&mut self, id: RowId, checked: bool) {
        if let Some(row) = self.rendered.iter_mut().find(|r| r.id == id) {
            row.checked = checked;
        }
    }

    pub fn toggle_row(&mut self, id: RowId) {
        if let Some(row) = self.rendered.iter_mut().find(|r| r.id == id) {
            row.checked = !row.checked;
        }
    }

    pub fn selected_rows(&self) -> Vec<&RenderedRow> {
        self.visible_rows().filter(|r| r.checked).collect()
    }

    /// A click on a row. Only clicks outside interactive controls open the
    /// detail view.
    pub fn click(&mut self, id: RowId, target: ClickTarget) -> Option<RowDetail> {
        match target {
            ClickTarget::Checkbox => {
                self.toggle_row(id);
                None
            }
            ClickTarget::Cell => self.detail(id),
        }
    }

    pub fn detail(&self, id: RowId) -> Option<RowDetail> {
        self.rendered
            .iter()
            .find(|r| r.id == id && r.is_visible())
            .map(|r| RowDetail::from_snapshot(&r.identity, &r.snapshot))
    }

    pub fn header_markup(&self) -> Element {
        self.target
            .render_header(&self.headers(), self.select_all_state())
    }

    pub fn body_markup(&self) -> Element {
        self.target.render_body(&self.rendered)
    }

    /// Header and body wrapped in the target's outer element.
    pub fn markup(&self) -> Element {
        self.target
            .render_table(self.header_markup(), self.body_markup())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    impl RowSource for FailingSource {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn fetch_rows(&self) -> Result<Vec<CompanyRow>, FTError> {
            Err(FTError::HttpStatus {
                endpoint: "/api/company-table".to_string(),
                status: 500,
            })
        }
    }

    fn seeded() -> TableEngine {
        let mut engine = TableEngine::new(Box::new(NativeTable));
        engine.load(&StaticSeed).unwrap();
        engine
    }

    fn criteria(needles: &[(Column, &str)]) -> FilterCriteria {
        let mut criteria = FilterCriteria::new();
        for (column, needle) in needles {
            criteria.set(*column, *needle);
        }
        criteria
    }

    fn counts(engine: &TableEngine) -> Vec<u64> {
        engine.data().iter().map(|r| r.employee_count).collect()
    }

    fn visible_companies(engine: &TableEngine) -> Vec<String> {
        engine
            .visible_rows()
            .map(|r| r.snapshot.company.clone())
            .collect()
    }

    #[test]
    fn load_sorts_by_company_ascending() {
        let engine = seeded();
        assert_eq!(engine.state().sort_key, Some(Column::Company));
        assert_eq!(engine.state().direction, SortDirection::Ascending);
        assert_eq!(visible_companies(&engine)[0], "Acme Logistics");
        assert_eq!(visible_companies(&engine)[5], "Foxglove Studios");
    }

    #[test]
    fn failed_load_keeps_previous_rows() {
        let mut engine = seeded();
        let before = engine.order();
        assert!(engine.load(&FailingSource).is_err());
        assert_eq!(engine.order(), before);
        assert_eq!(engine.rendered().len(), 6);
    }

    #[test]
    fn failed_first_load_leaves_table_empty() {
        let mut engine = TableEngine::new(Box::new(CustomGrid));
        assert!(engine.load(&FailingSource).is_err());
        assert!(engine.is_empty());
        assert!(engine.rendered().is_empty());
    }

    #[test]
    fn numeric_sort_orders_employee_counts() {
        let mut engine = seeded();
        engine.sort("employeeCount", ValueType::Number).unwrap();
        assert_eq!(counts(&engine), vec![75, 132, 245, 420, 610, 980]);
        engine.sort("employeeCount", ValueType::Number).unwrap();
        assert_eq!(counts(&engine), vec![980, 610, 420, 245, 132, 75]);
    }

    #[test]
    fn repeated_sort_toggles_direction() {
        let mut engine = seeded();
        for column in Column::ALL {
            engine.sort_column(column, column.value_type());
            let first = engine.order();
            engine.sort_column(column, column.value_type());
            let mut second = engine.order();
            second.reverse();
            assert_eq!(first, second, "column {}", column.key());
            engine.sort_column(column, column.value_type());
            assert_eq!(engine.order(), first, "column {}", column.key());
        }
    }

    #[test]
    fn switching_column_resets_to_ascending() {
        let mut engine = seeded();
        engine.sort_column(Column::City, ValueType::Text);
        engine.sort_column(Column::City, ValueType::Text);
        assert_eq!(engine.state().direction, SortDirection::Descending);
        engine.sort_column(Column::Phone, ValueType::Text);
        assert_eq!(engine.state().direction, SortDirection::Ascending);
        assert_eq!(engine.state().sort_key, Some(Column::Phone));
    }

    #[test]
    fn text_sort_ignores_case() {
        assert_eq!(compare_values("apple", "Banana", ValueType::Text), Ordering::Less);
        assert_eq!(compare_values("ACME", "acme", ValueType::Text), Ordering::Equal);
        assert_eq!(compare_values("10", "9", ValueType::Number), Ordering::Greater);
    }

    #[test]
    fn number_sort_puts_unparsable_values_last() {
        assert_eq!(compare_values("n/a", "5", ValueType::Number), Ordering::Greater);
        assert_eq!(compare_values("", "5", ValueType::Number), Ordering::Less);
        assert_eq!(compare_values("n/a", "NaN", ValueType::Number), Ordering::Equal);

        let mut engine = TableEngine::new(Box::new(NativeTable));
        let cities = (0..200).map(|i| if i % 3 == 0 { format!("Town {i}") } else { (200 - i).to_string() });
        engine.replace_rows(
            cities
                .map(|c| CompanyRow::new("Acme", &c, "1 A St", "555", 1))
                .collect(),
        );
        engine.sort("city", ValueType::Number).unwrap();
        let values: Vec<String> = engine.visible_rows().map(|r| r.snapshot.city.clone()).collect();
        let numbers: Vec<f64> = values.iter().map_while(|c| c.parse().ok()).collect();
        assert_eq!(numbers.len(), 133);
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        assert!(values[numbers.len()..].iter().all(|c| c.starts_with("Town")));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let mut engine = seeded();
        assert!(matches!(
            engine.sort("revenue", ValueType::Number),
            Err(FTError::UnknownColumn(_))
        ));
    }

    #[test]
    fn sorting_empty_table_renders_nothing() {
        let mut engine = TableEngine::new(Box::new(NativeTable));
        engine.sort_column(Column::City, ValueType::Text);
        assert!(engine.rendered().is_empty());
        assert!(engine.body_markup().render().contains("No companies"));
    }

    #[test]
    fn only_active_header_carries_indicator() {
        let mut engine = seeded();
        engine.sort_column(Column::EmployeeCount, ValueType::Number);
        engine.sort_column(Column::EmployeeCount, ValueType::Number);
        let headers = engine.headers();
        let active: Vec<&HeaderView> = headers.iter().filter(|h| !h.indicator.is_empty()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].column, Column::EmployeeCount);
        assert_eq!(active[0].indicator, "▼");
        assert_eq!(active[0].aria_sort, "descending");
        assert!(headers
            .iter()
            .filter(|h| h.column != Column::EmployeeCount)
            .all(|h| h.aria_sort == "none"));
    }

    #[test]
    fn filter_by_city_is_case_insensitive() {
        let mut engine = seeded();
        engine.filter(criteria(&[(Column::City, "dallas")]));
        assert_eq!(visible_companies(&engine), vec!["Bluebonnet Foods"]);
        engine.filter(criteria(&[(Column::City, "DALLAS")]));
        assert_eq!(visible_companies(&engine), vec!["Bluebonnet Foods"]);
    }

    #[test]
    fn empty_criteria_show_every_remaining_row() {
        let mut engine = seeded();
        let identity = engine.rendered()[2].identity.clone();
        engine.delete(&identity).unwrap();
        engine.filter(criteria(&[(Column::City, ""), (Column::Phone, "")]));
        assert_eq!(engine.visible_rows().count(), 5);
        engine.clear_filters();
        assert_eq!(engine.visible_rows().count(), 5);
    }

    #[test]
    fn filter_reads_formatted_cell_text() {
        let mut engine = TableEngine::new(Box::new(NativeTable));
        engine.replace_rows(vec![
            CompanyRow::new("Big", "Austin", "1 A St", "555", 1024),
            CompanyRow::new("Small", "Austin", "2 B St", "555", 10),
        ]);
        engine.set_filter(Column::EmployeeCount, "1,0");
        assert_eq!(visible_companies(&engine), vec!["Big"]);
    }

    #[test]
    fn filters_combine_and_survive_sort() {
        let mut engine = seeded();
        engine.filter(criteria(&[(Column::Company, "e"), (Column::Phone, "(3")]));
        let visible = visible_companies(&engine);
        assert_eq!(visible, vec!["Delta Fabrication", "Evergreen Health"]);
        engine.sort_column(Column::Company, ValueType::Text);
        assert_eq!(
            visible_companies(&engine),
            vec!["Evergreen Health", "Delta Fabrication"]
        );
    }

    #[test]
    fn deleted_row_stays_hidden_after_resort() {
        let mut engine = seeded();
        let identity = engine.rendered()[0].identity.clone();
        let company = engine.rendered()[0].snapshot.company.clone();
        engine.delete(&identity).unwrap();
        assert!(!visible_companies(&engine).contains(&company));
        assert_eq!(engine.len(), 6);

        engine.sort_column(Column::EmployeeCount, ValueType::Number);
        assert_eq!(engine.visible_rows().count(), 5);
        assert!(!visible_companies(&engine).contains(&company));
        assert!(engine.rendered().iter().all(|r| r.identity != identity));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut engine = seeded();
        let identity = engine.rendered()[3].identity.clone();
        engine.delete(&identity).unwrap();
        let once: Vec<String> = visible_companies(&engine);
        engine.delete(&identity).unwrap();
        assert_eq!(visible_companies(&engine), once);
        assert_eq!(engine.state().deleted.len(), 1);
    }

    #[test]
    fn delete_unknown_identity_fails() {
        let mut engine = seeded();
        assert!(engine.delete("tbl-row-999").is_err());
    }

    #[test]
    fn reset_restores_rows_and_default_sort() {
        let mut engine = seeded();
        engine.sort_column(Column::EmployeeCount, ValueType::Number);
        for identity in engine.order().into_iter().take(2) {
            engine.delete(&identity).unwrap();
        }
        engine.reset();
        assert_eq!(engine.visible_rows().count(), 6);
        assert!(engine.state().deleted.is_empty());
        assert_eq!(engine.state().sort_key, Some(Column::Company));
        assert_eq!(engine.state().direction, SortDirection::Ascending);
    }

    #[test]
    fn reset_keeps_filters() {
        let mut engine = seeded();
        engine.set_filter(Column::City, "dallas");
        engine.reset();
        assert_eq!(visible_companies(&engine), vec!["Bluebonnet Foods"]);
    }

    #[test]
    fn select_all_only_touches_visible_rows() {
        let mut engine = seeded();
        engine.set_filter(Column::City, "o");
        let hidden: Vec<RowId> = engine
            .rendered()
            .iter()
            .filter(|r| !r.is_visible())
            .map(|r| r.id)
            .collect();
        assert!(!hidden.is_empty());

        assert_eq!(engine.toggle_select_all(), SelectAllState::Checked);
        assert!(engine.visible_rows().all(|r| r.checked));
        assert!(engine
            .rendered()
            .iter()
            .filter(|r| hidden.contains(&r.id))
            .all(|r| !r.checked));
    }

    #[test]
    fn select_all_becomes_indeterminate() {
        let mut engine = seeded();
        assert_eq!(engine.select_all_state(), SelectAllState::Unchecked);
        engine.set_select_all(true);
        assert_eq!(engine.select_all_state(), SelectAllState::Checked);

        // Hide some checked rows, uncheck one of the visible ones
        engine.set_filter(Column::City, "s");
        let visible: Vec<RowId> = engine.visible_rows().map(|r| r.id).collect();
        assert!(visible.len() > 1 && visible.len() < 6);
        engine.set_checked(visible[0], false);
        assert_eq!(engine.select_all_state(), SelectAllState::Indeterminate);

        engine.toggle_select_all();
        assert_eq!(engine.select_all_state(), SelectAllState::Checked);
        engine.toggle_select_all();
        assert_eq!(engine.select_all_state(), SelectAllState::Unchecked);
    }

    #[test]
    fn checkbox_state_survives_sort() {
        let mut engine = seeded();
        let id = engine.rendered()[1].id;
        engine.toggle_row(id);
        engine.sort_column(Column::EmployeeCount, ValueType::Number);
        let row = engine.rendered().iter().find(|r| r.id == id).unwrap();
        assert!(row.checked);
        assert_eq!(engine.selected_rows().len(), 1);
    }

    #[test]
    fn clicking_controls_never_opens_details() {
        let mut engine = seeded();
        let id = engine.rendered()[0].id;
        assert!(engine.click(id, ClickTarget::Checkbox).is_none());
        assert!(engine.rendered()[0].checked);

        let other = engine.rendered()[1].id;
        let detail = engine.click(other, ClickTarget::Cell).unwrap();
        assert_eq!(detail.fields.len(), 5);
        assert_eq!(detail.fields[0], ("Company", "Bluebonnet Foods".to_string()));
        assert_eq!(detail.fields[4], ("Employees", "610".to_string()));

        engine.delete_id(other);
        assert!(engine.click(other, ClickTarget::Cell).is_none());
    }

    #[test]
    fn reload_assigns_fresh_identities() {
        let mut engine = seeded();
        let first = engine.order();
        engine.delete(&first[0]).unwrap();
        engine.load(&StaticSeed).unwrap();
        let second = engine.order();
        assert!(first.iter().all(|id| !second.contains(id)));
        assert!(engine.state().deleted.is_empty());
        assert_eq!(engine.visible_rows().count(), 6);
    }
}
