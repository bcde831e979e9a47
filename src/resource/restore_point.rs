//! Restore point discovery
//!
//! Every `stop` leaves a `{env}_{%Y%m%d_%H%M%S}` directory under the state
//! directory, with a `_<n>` suffix when that name was already taken by an
//! earlier run in the same second. Restores pick one of them: explicitly, the newest, or through
//! a numbered prompt.

use crate::databricks::session::RUN_TIMESTAMP_FORMAT;
use crate::error::{HaltError, Result};
use chrono::NaiveDateTime;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// A run directory left behind by `stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePoint {
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
    /// 1 for the first run of a second, `n` for a `_<n>` suffix
    pub sequence: u32,
}

/// How the restore point is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Use this directory as is
    Explicit(PathBuf),
    /// Newest restore point of the environment
    Latest,
    /// Ask on stdin
    Interactive,
}

/// Restore points for `env`, newest first
pub fn list_restore_points(state_dir: &Path, env: &str) -> Result<Vec<RestorePoint>> {
    if !state_dir.is_dir() {
        return Err(HaltError::NoRestorePoint(format!(
            "state directory {} does not exist",
            state_dir.display()
        )));
    }

    let prefix = format!("{}_", env);
    let mut points = Vec::new();

    for entry in std::fs::read_dir(state_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(stamp) = name.strip_prefix(&prefix) else {
            continue;
        };
        // `dev_x_2024...` must not be picked up as a restore point of `dev`
        let Some((taken_at, sequence)) = parse_run_stamp(stamp) else {
            continue;
        };
        points.push(RestorePoint {
            path: entry.path(),
            taken_at,
            sequence,
        });
    }

    points.sort_by(|a, b| (b.taken_at, b.sequence).cmp(&(a.taken_at, a.sequence)));
    Ok(points)
}

/// Split `%Y%m%d_%H%M%S[_<n>]` into its timestamp and sequence number
fn parse_run_stamp(stamp: &str) -> Option<(NaiveDateTime, u32)> {
    if let Ok(taken_at) = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT) {
        return Some((taken_at, 1));
    }
    let (base, suffix) = stamp.rsplit_once('_')?;
    let sequence = suffix.parse::<u32>().ok().filter(|n| *n >= 2)?;
    let taken_at = NaiveDateTime::parse_from_str(base, RUN_TIMESTAMP_FORMAT).ok()?;
    Some((taken_at, sequence))
}

/// Resolve a selection to a run directory
pub fn choose_restore_point(state_dir: &Path, env: &str, selection: Selection) -> Result<PathBuf> {
    if let Selection::Explicit(path) = selection {
        if !path.is_dir() {
            return Err(HaltError::NoRestorePoint(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        return Ok(path);
    }

    let points = list_restore_points(state_dir, env)?;
    if points.is_empty() {
        return Err(HaltError::NoRestorePoint(format!(
            "no restore states for environment {} in {}",
            env,
            state_dir.display()
        )));
    }

    let chosen = match selection {
        Selection::Interactive => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            prompt_restore_point(&points, &mut stdin.lock(), &mut stdout.lock())?
        }
        _ => 0,
    };

    let path = points[chosen].path.clone();
    tracing::info!("Restoring from {}", path.display());
    Ok(path)
}

/// Print a numbered menu and read the choice. Empty input selects the newest.
pub fn prompt_restore_point<R: BufRead, W: Write>(
    points: &[RestorePoint],
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    writeln!(output, "Available restore points:")?;
    for (i, point) in points.iter().enumerate() {
        writeln!(
            output,
            "  [{}] {}  ({})",
            i + 1,
            point.taken_at.format("%Y-%m-%d %H:%M:%S"),
            point.path.display()
        )?;
    }

    loop {
        write!(output, "Select restore point [1-{}] (default 1): ", points.len())?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(HaltError::NoRestorePoint("no selection made".to_string()));
        }

        let answer = line.trim();
        if answer.is_empty() {
            return Ok(0);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=points.len()).contains(&n) => return Ok(n - 1),
            _ => writeln!(output, "Invalid selection: {}", answer)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_dirs(root: &Path, names: &[&str]) {
        for name in names {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    #[test]
    fn lists_only_matching_env_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        make_dirs(
            dir.path(),
            &[
                "dev_20240101_120000",
                "dev_20240301_080000",
                "dev_x_20240401_080000",
                "prod_20240501_080000",
                "dev_notes",
            ],
        );
        std::fs::write(dir.path().join("dev_20240601_000000"), "a file").unwrap();

        let points = list_restore_points(dir.path(), "dev").unwrap();
        let names: Vec<_> = points
            .iter()
            .map(|p| p.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["dev_20240301_080000", "dev_20240101_120000"]);
    }

    #[test]
    fn suffixed_runs_sort_after_their_second() {
        let dir = tempfile::tempdir().unwrap();
        make_dirs(
            dir.path(),
            &[
                "dev_20240101_120000",
                "dev_20240101_120000_2",
                "dev_20240101_120000_10",
                "dev_20240101_120000_1",
                "dev_20231231_000000_3",
            ],
        );

        let points = list_restore_points(dir.path(), "dev").unwrap();
        let names: Vec<_> = points
            .iter()
            .map(|p| p.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "dev_20240101_120000_10",
                "dev_20240101_120000_2",
                "dev_20240101_120000",
                "dev_20231231_000000_3",
            ]
        );
    }

    #[test]
    fn latest_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        make_dirs(dir.path(), &["qa_20230101_000000", "qa_20231231_235959"]);
        let path = choose_restore_point(dir.path(), "qa", Selection::Latest).unwrap();
        assert!(path.ends_with("qa_20231231_235959"));
    }

    #[test]
    fn missing_state_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = choose_restore_point(&dir.path().join("nope"), "dev", Selection::Latest)
            .unwrap_err();
        assert!(matches!(err, HaltError::NoRestorePoint(_)));
    }

    #[test]
    fn no_points_for_env_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        make_dirs(dir.path(), &["prod_20240101_000000"]);
        let err = choose_restore_point(dir.path(), "dev", Selection::Latest).unwrap_err();
        assert!(matches!(err, HaltError::NoRestorePoint(_)));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let ok = choose_restore_point(
            dir.path(),
            "dev",
            Selection::Explicit(dir.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(ok, dir.path());

        let err = choose_restore_point(
            dir.path(),
            "dev",
            Selection::Explicit(dir.path().join("missing")),
        )
        .unwrap_err();
        assert!(matches!(err, HaltError::NoRestorePoint(_)));
    }

    #[test]
    fn prompt_retries_until_valid() {
        let points = vec![
            RestorePoint {
                path: PathBuf::from("dev_20240301_080000"),
                taken_at: NaiveDateTime::parse_from_str("20240301_080000", RUN_TIMESTAMP_FORMAT)
                    .unwrap(),
                sequence: 1,
            },
            RestorePoint {
                path: PathBuf::from("dev_20240101_120000"),
                taken_at: NaiveDateTime::parse_from_str("20240101_120000", RUN_TIMESTAMP_FORMAT)
                    .unwrap(),
                sequence: 1,
            },
        ];

        let mut out = Vec::new();
        let choice = prompt_restore_point(&points, &mut Cursor::new("9\nabc\n2\n"), &mut out).unwrap();
        assert_eq!(choice, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Invalid selection: 9"));
        assert!(text.contains("[2] 2024-01-01 12:00:00"));

        let choice = prompt_restore_point(&points, &mut Cursor::new("\n"), &mut Vec::new()).unwrap();
        assert_eq!(choice, 0);

        let err = prompt_restore_point(&points, &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, HaltError::NoRestorePoint(_)));
    }
}
