//! ### Report
//! Terminal tables for monthly summaries and daily autarky.

use chrono::Datelike;
use comfy_table::{modifiers, presets, Attribute, Cell, CellAlignment, Color, Table};

use crate::{
    compute::{round_half_up, DailyAutarky, MonthlySummary},
    month::MonthKey,
};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table
}

/// Banding used for autarky percentages.
pub fn autarky_color(percent: i64) -> Color {
    if percent > 90 {
        Color::Green
    } else if percent > 60 {
        Color::Yellow
    } else if percent > 30 {
        Color::DarkYellow
    } else {
        Color::Red
    }
}

fn euros(value: f64) -> Cell {
    Cell::new(format!("{value:.2}€")).set_alignment(CellAlignment::Right)
}

fn kwh(value: i64) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

fn autarky_cell(average_autarky: f64) -> Cell {
    let percent = round_half_up(average_autarky * 100.);
    Cell::new(format!("{percent}%"))
        .set_alignment(CellAlignment::Right)
        .fg(autarky_color(percent))
}

pub fn build_monthly_table(summaries: &[MonthlySummary], totals: &MonthlySummary) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Month",
        "Consumption (kWh)",
        "From Grid (kWh)",
        "To Grid (kWh)",
        "Avg. Autarky",
        "Grid Cost per kWh",
        "Cost Grid",
        "Revenue Grid",
        "Difference",
        "Opportunity Cost",
    ]);
    for summary in summaries {
        let month = summary
            .month_key()
            .map(|key| key.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(month),
            kwh(summary.consumption),
            kwh(summary.from_grid),
            kwh(summary.to_grid),
            autarky_cell(summary.average_autarky),
            Cell::new(format!("{:.2}", summary.grid_cost_per_kwh))
                .set_alignment(CellAlignment::Right),
            euros(summary.cost_grid),
            euros(summary.revenue_grid),
            euros(summary.difference).fg(if summary.difference >= 0. {
                Color::Green
            } else {
                Color::Red
            }),
            euros(summary.opportunity_cost),
        ]);
    }
    table.add_row(
        vec![
            Cell::new("Total"),
            kwh(totals.consumption),
            kwh(totals.from_grid),
            kwh(totals.to_grid),
            autarky_cell(totals.average_autarky),
            Cell::new(format!("Ø {:.2}", totals.grid_cost_per_kwh))
                .set_alignment(CellAlignment::Right),
            euros(totals.cost_grid),
            euros(totals.revenue_grid),
            euros(totals.difference),
            euros(totals.opportunity_cost),
        ]
        .into_iter()
        .map(|cell| cell.add_attribute(Attribute::Bold)),
    );
    table
}

/// Sunday-first month grid. Days without a reading stay blank.
pub fn build_calendar_table(month: MonthKey, days: &[DailyAutarky]) -> Table {
    let mut table = new_table();
    table.set_header(WEEKDAYS.to_vec());

    let lead = month
        .first_day()
        .map_or(0, |first| first.weekday().num_days_from_sunday() as usize);
    let last_day = days.iter().map(|day| day.date.day()).max().unwrap_or(0) as usize;
    let slots = (lead + last_day).div_ceil(7) * 7;

    let mut cells: Vec<Cell> = (0..slots).map(|_| Cell::new("")).collect();
    for day in days {
        let idx = lead + day.date.day0() as usize;
        if let Some(cell) = cells.get_mut(idx) {
            *cell = Cell::new(format!("{:>2}: {:>3}%", day.date.day(), day.percent))
                .fg(autarky_color(day.percent));
        }
    }

    let mut cells = cells.into_iter();
    for _ in 0..slots / 7 {
        table.add_row(cells.by_ref().take(7).collect::<Vec<_>>());
    }
    table
}
