//! `mediaq status` – engine state, rates and counts.

use mediaq_core::scheduler::StatusSnapshot;

use super::format_bytes;

pub fn print_status(s: &StatusSnapshot) {
    let state = format!("{:?}", s.controller_state).to_lowercase();
    match &s.catalog_error {
        Some(err) => println!("catalog:   {} ({})", state, err),
        None => println!("catalog:   {}", state),
    }
    println!("paused:    {}", if s.paused { "yes" } else { "no" });
    println!(
        "slots:     {} running / {} max",
        s.running.len(),
        s.max_concurrent
    );
    let limit = if s.rate.ceiling == 0 {
        "unlimited".to_string()
    } else {
        format!("{}/s", format_bytes(s.rate.ceiling))
    };
    println!(
        "speed:     {}/s (limit {})",
        format_bytes(s.rate.aggregate_speed as u64),
        limit
    );
    println!(
        "queue:     {} items, {} downloaded; {} recordings",
        s.item_count, s.downloaded_count, s.recording_count
    );
}
