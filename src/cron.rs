use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::desktop::run_command;

pub const JOB_TAG: &str = "# SpaceOddity";
const SCHEDULE: &str = "*/10 * * * *";

/// Cron runs headless; DISPLAY and the session bus let gsettings reach the
/// logged-in desktop.
pub fn job_line(uid: u32, program: &Path) -> String {
    format!(
        "{SCHEDULE} env DISPLAY=:0 DBUS_SESSION_BUS_ADDRESS=unix:path=/run/user/{uid}/bus {} {JOB_TAG}",
        program.display()
    )
}

fn is_job(line: &str) -> bool {
    line.trim_end().ends_with(JOB_TAG)
}

/// Replaces our tagged entry (or appends one) and leaves the rest of the
/// table untouched.
pub fn upsert_job(table: &str, job: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut replaced = false;
    for line in table.lines() {
        if is_job(line) {
            if !replaced {
                lines.push(job);
                replaced = true;
            }
            continue;
        }
        lines.push(line);
    }
    if !replaced {
        lines.push(job);
    }
    join_table(&lines)
}

pub fn remove_job(table: &str) -> String {
    let lines: Vec<&str> = table.lines().filter(|line| !is_job(line)).collect();
    join_table(&lines)
}

fn join_table(lines: &[&str]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut table = lines.join("\n");
    table.push('\n');
    table
}

pub fn enable() -> Result<()> {
    let program = std::env::current_exe().with_context(|| "failed to locate executable")?;
    let uid = current_uid()?;
    let table = read_table()?;
    write_table(&upsert_job(&table, &job_line(uid, &program)))
}

pub fn disable() -> Result<()> {
    let table = read_table()?;
    write_table(&remove_job(&table))
}

fn current_uid() -> Result<u32> {
    let output = run_command("id", &["-u"])?;
    output
        .trim()
        .parse()
        .with_context(|| format!("unexpected uid from id -u: {}", output.trim()))
}

fn read_table() -> Result<String> {
    let output = Command::new("crontab")
        .arg("-l")
        .output()
        .with_context(|| "failed to run crontab")?;
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("no crontab") {
        debug!("no crontab for current user yet");
        return Ok(String::new());
    }
    Err(anyhow!("crontab -l failed: {}", stderr.trim()))
}

fn write_table(table: &str) -> Result<()> {
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| "failed to run crontab")?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(table.as_bytes())
            .with_context(|| "failed to write crontab")?;
    }
    let output = child
        .wait_with_output()
        .with_context(|| "failed to wait for crontab")?;
    if !output.status.success() {
        return Err(anyhow!(
            "crontab - failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
