use crate::db::get_connection;
use crate::error::Result;
use crate::pending::sweep_expired;
use crate::settings::db_path;

pub fn run() -> Result<()> {
    let mut conn = get_connection(&db_path())?;
    let feed = super::logging_feed();
    let summary = sweep_expired(&mut conn, chrono::Utc::now(), &feed)?;
    println!(
        "Sweep complete: {} saved, {} blocked, {} duplicates, {} settled elsewhere",
        summary.saved, summary.blocked, summary.duplicates, summary.stale
    );
    Ok(())
}
