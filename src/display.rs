use colored::Colorize;
use console::Alignment;

use crate::ports;
use crate::state::ClientRecord;

/// Print all client records with their tunnels.
pub fn print_records(records: &[ClientRecord]) {
    if records.is_empty() {
        println!("{}", "No clients recorded.".yellow());
        println!("Use `burrow add <client> <tunnel>...` to get started.");
        return;
    }

    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_record(record);
    }
}

/// Print one client's tunnels with local-port reachability.
pub fn print_record(record: &ClientRecord) {
    let count = record.tunnels.len();
    println!(
        "{} {}",
        record.name.bold(),
        format!("({} tunnel{})", count, if count == 1 { "" } else { "s" }).dimmed()
    );
    if record.tunnels.is_empty() {
        return;
    }

    // Pre-compute all row data
    let rows: Vec<Row> = record
        .tunnels
        .iter()
        .map(|t| {
            let local = t.local.as_ref();
            Row {
                spec: t.to_string(),
                port_str: local.map_or_else(|| "-".to_string(), |l| format!(":{}", l.port)),
                reachable: local.map(|l| ports::check_port(l.port)),
            }
        })
        .collect();

    // Column widths from plain text
    let w_spec = rows.iter().map(|r| r.spec.len()).max().unwrap_or(0);
    let w_port = rows.iter().map(|r| r.port_str.len()).max().unwrap_or(0);
    // Measure actual display width of health icons so the placeholder
    // matches even when ✓/✗ render as double-width in some fonts.
    let w_health = console::measure_text_width("✓").max(1);

    for row in &rows {
        let (bullet, spec_colored) = match row.reachable {
            Some(true) => ("●".green().to_string(), row.spec.green().bold().to_string()),
            Some(false) => ("○".dimmed().to_string(), row.spec.clone()),
            None => ("○".dimmed().to_string(), row.spec.dimmed().to_string()),
        };
        let health = match row.reachable {
            Some(true) => pad(&"✓".green().to_string(), w_health),
            Some(false) => pad(&"✗".red().to_string(), w_health),
            None => " ".repeat(w_health),
        };

        println!(
            "  {} {}  {}  {}",
            bullet,
            pad(&spec_colored, w_spec),
            pad(&row.port_str.dimmed().to_string(), w_port),
            health
        );
    }
}

/// Pad an ANSI-colored string to a visible width using console's awareness of escape codes.
fn pad(s: &str, width: usize) -> String {
    console::pad_str(s, width, Alignment::Left, None).to_string()
}

struct Row {
    spec: String,
    port_str: String,
    reachable: Option<bool>,
}
