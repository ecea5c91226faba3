use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::pipeline::{JobStatus, StageStatus};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cells(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn stage_status_cell(status: StageStatus) -> Cell {
    let cell = Cell::new(status.label());
    match status {
        StageStatus::Success => cell.fg(TableColor::Green),
        StageStatus::Failed => cell.fg(TableColor::Red),
        StageStatus::Running | StageStatus::Pending => cell.fg(TableColor::Yellow),
        StageStatus::NotStarted => cell.fg(TableColor::DarkGrey),
    }
}

pub fn job_status_cell(status: JobStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        JobStatus::Success => cell.fg(TableColor::Green),
        JobStatus::Failed => cell.fg(TableColor::Red),
        JobStatus::Running | JobStatus::Pending | JobStatus::Preparing => {
            cell.fg(TableColor::Yellow)
        }
        _ => cell.fg(TableColor::DarkGrey),
    }
}
