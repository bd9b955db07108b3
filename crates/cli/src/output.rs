use jobq::jobs::Job;
use serde::Serialize;

/// Waiting jobs in dispatch order, one row per job.
pub fn print_queued(waiting: &[Job]) {
    println!("QUEUED ({})", waiting.len());
    if waiting.is_empty() {
        println!("  (empty)");
        return;
    }
    let width = command_width(waiting);
    println!("  {:>6}  {:<7}  {:<width$}  QUEUED AT", "ID", "PRIO", "COMMAND");
    for job in waiting {
        println!(
            "  {:>6}  {:<7}  {:<width$}  {}",
            job.id,
            job.priority_name(),
            job.command,
            job.insert_time.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

pub fn print_running(running: &[Job]) {
    println!("RUNNING ({})", running.len());
    if running.is_empty() {
        println!("  (none)");
        return;
    }
    let width = command_width(running);
    println!("  {:>6}  {:>7}  {:<width$}  STARTED AT", "ID", "PID", "COMMAND");
    for job in running {
        let pid = job
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        let started = job
            .start_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:>6}  {:>7}  {:<width$}  {started}",
            job.id, pid, job.command,
        );
    }
}

pub fn print_json(waiting: &[Job], running: &[Job]) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct Listing<'a> {
        waiting: &'a [Job],
        running: &'a [Job],
    }
    let listing = Listing { waiting, running };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn command_width(jobs: &[Job]) -> usize {
    jobs.iter()
        .map(|job| job.command.len())
        .max()
        .unwrap_or(0)
        .max("COMMAND".len())
}
