//! `mediaq recordings` – cached catalog.

use mediaq_core::scheduler::RecordingStatus;

pub fn print_recordings(recordings: &[RecordingStatus]) {
    if recordings.is_empty() {
        println!("No recordings known (is the catalog configured?).");
        return;
    }
    for r in recordings {
        let mark = if r.marked_deleted { " [delete]" } else { "" };
        println!("{:<8} {}{}", r.id, r.title, mark);
        for v in &r.variants {
            let mut flags = Vec::new();
            if v.queued > 0 {
                flags.push(format!("queued x{}", v.queued));
            }
            if v.auto_enqueued {
                flags.push("auto".to_string());
            }
            if v.auto_downloaded {
                flags.push("auto-downloaded".to_string());
            }
            println!("         {:<4} {}", v.quality.as_str(), flags.join(", "));
        }
    }
}
