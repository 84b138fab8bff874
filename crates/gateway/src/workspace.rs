//! Workspace probe: a bounded snapshot of an agent's working directory's
//! VCS state, plus directory-listing and bounded file-read endpoints the
//! web UI uses to browse it.
//!
//! VCS tooling is invoked as a subprocess (`git`) rather than linked as a
//! library — the same spawn-and-read pattern the process adapter uses,
//! just with a much shorter leash.

use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeSummary {
    pub files_changed: usize,
    pub additions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentCommit {
    pub hash: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceProbe {
    pub branch: String,
    pub changed_files: Vec<ChangedFile>,
    pub summary: ChangeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_commits: Option<Vec<RecentCommit>>,
}

/// Run the probe, bounded to `timeout`. Returns `None` if the directory
/// isn't a VCS repo, `git` isn't available, or the probe overran its
/// deadline — the caller notes this in-chat but still completes the turn.
pub async fn probe(working_directory: &str, timeout: Duration) -> Option<WorkspaceProbe> {
    tokio::time::timeout(timeout, run_probe(working_directory)).await.ok().flatten()
}

async fn run_probe(working_directory: &str) -> Option<WorkspaceProbe> {
    let branch = run_git(working_directory, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    let status = run_git(working_directory, &["status", "--porcelain=v1"]).await?;
    let numstat = run_git(working_directory, &["diff", "HEAD", "--numstat"]).await.unwrap_or_default();
    let log = run_git(working_directory, &["log", "-5", "--pretty=format:%h\t%s"]).await;

    let stat_by_path = parse_numstat(&numstat);
    let changed_files: Vec<ChangedFile> = status
        .lines()
        .filter_map(|line| parse_status_line(line, &stat_by_path))
        .collect();

    let summary = ChangeSummary {
        files_changed: changed_files.len(),
        additions: changed_files.iter().filter_map(|f| f.additions).sum(),
        deletions: changed_files.iter().filter_map(|f| f.deletions).sum(),
    };

    let recent_commits = log.map(|log| {
        log.lines()
            .filter_map(|line| {
                let (hash, message) = line.split_once('\t')?;
                Some(RecentCommit {
                    hash: hash.to_string(),
                    message: message.to_string(),
                })
            })
            .collect()
    });

    Some(WorkspaceProbe {
        branch: branch.trim().to_string(),
        changed_files,
        summary,
        recent_commits,
    })
}

async fn run_git(working_directory: &str, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(working_directory)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

fn parse_numstat(numstat: &str) -> std::collections::HashMap<String, (u32, u32)> {
    numstat
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let additions = parts.next()?.parse::<u32>().ok();
            let deletions = parts.next()?.parse::<u32>().ok();
            let path = parts.next()?.to_string();
            Some((path, (additions.unwrap_or(0), deletions.unwrap_or(0))))
        })
        .collect()
}

fn parse_status_line(
    line: &str,
    stat_by_path: &std::collections::HashMap<String, (u32, u32)>,
) -> Option<ChangedFile> {
    if line.len() < 4 {
        return None;
    }
    let code = &line[0..2];
    let path = line[3..].to_string();
    let status = match code.trim() {
        "A" | "AM" => FileStatus::Added,
        "D" => FileStatus::Deleted,
        "R" => FileStatus::Renamed,
        "??" => FileStatus::Untracked,
        _ => FileStatus::Modified,
    };
    let (additions, deletions) = stat_by_path.get(&path).copied().unzip();
    Some(ChangedFile {
        path,
        status,
        additions,
        deletions,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

/// List up to `max_entries` entries of `dir`, sorted, directories first.
pub fn list_directory(dir: &str, max_entries: usize) -> std::io::Result<Vec<DirEntryInfo>> {
    let mut entries: Vec<DirEntryInfo> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| DirEntryInfo {
            name: e.file_name().to_string_lossy().into_owned(),
            is_dir: e.path().is_dir(),
        })
        .collect();
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(max_entries);
    Ok(entries)
}

/// Read up to `max_bytes` of `path`, lossily decoding as UTF-8. Returns
/// an error if the file can't be opened; truncation is silent (the
/// caller is told the byte cap, not whether it was hit).
pub fn read_file_bounded(path: &str, max_bytes: usize) -> std::io::Result<String> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; max_bytes];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numstat_handles_tabs() {
        let map = parse_numstat("3\t1\tsrc/lib.rs\n0\t0\tREADME.md\n");
        assert_eq!(map.get("src/lib.rs"), Some(&(3, 1)));
    }

    #[test]
    fn parse_status_line_untracked() {
        let file = parse_status_line("?? new_file.txt", &Default::default()).unwrap();
        assert!(matches!(file.status, FileStatus::Untracked));
        assert_eq!(file.path, "new_file.txt");
    }

    #[tokio::test]
    async fn probe_returns_none_outside_a_repo() {
        let dir = std::env::temp_dir().join(format!("agentim-not-a-repo-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let result = probe(dir.to_str().unwrap(), Duration::from_secs(5)).await;
        assert!(result.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_directory_respects_cap() {
        let dir = std::env::temp_dir().join(format!("agentim-listing-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..10 {
            std::fs::write(dir.join(format!("f{i}.txt")), "x").unwrap();
        }
        let entries = list_directory(dir.to_str().unwrap(), 3).unwrap();
        assert_eq!(entries.len(), 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_file_bounded_truncates() {
        let path = std::env::temp_dir().join(format!("agentim-read-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "0123456789").unwrap();
        let content = read_file_bounded(path.to_str().unwrap(), 4).unwrap();
        assert_eq!(content, "0123");
        let _ = std::fs::remove_file(&path);
    }
}
