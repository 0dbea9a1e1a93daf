//! `mediaq items` – queue listing.

use mediaq_core::scheduler::ItemStatus;

use super::{format_bytes, format_eta};

fn state_label(i: &ItemStatus) -> &'static str {
    if i.downloaded {
        "done"
    } else if i.has_problem {
        "problem"
    } else if i.downloading {
        "loading"
    } else if i.total_bytes == 0 {
        "probing"
    } else {
        "queued"
    }
}

pub fn print_items(items: &[ItemStatus]) {
    if items.is_empty() {
        println!("Queue is empty.");
        return;
    }
    println!(
        "{:<5} {:<5} {:<8} {:>6} {:>20} {:>9}  {}",
        "ID", "PRIO", "STATE", "DONE", "SIZE", "ETA", "TARGET"
    );
    for i in items {
        let pct = if i.total_bytes > 0 {
            format!("{:.0}%", i.loaded_bytes as f64 * 100.0 / i.total_bytes as f64)
        } else {
            "-".to_string()
        };
        let size = if i.total_bytes > 0 {
            format!("{} / {}", format_bytes(i.loaded_bytes), format_bytes(i.total_bytes))
        } else {
            "-".to_string()
        };
        let eta = i.eta_secs.map(format_eta).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<5} {:<5} {:<8} {:>6} {:>20} {:>9}  {}",
            i.id,
            i.priority,
            state_label(i),
            pct,
            size,
            eta,
            i.target.display()
        );
        if let Some(err) = &i.last_error {
            if i.has_problem {
                println!("      error: {}", err);
            }
        }
    }
}
