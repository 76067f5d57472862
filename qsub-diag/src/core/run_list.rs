//! Run-list parsing.
//!
//! A run list is line oriented. `#` starts a comment that runs to the end of
//! the line. Remaining lines are either settings (`set <key> <value>`) or
//! array declarations (`<low>..<high> <name>`). Tokens may be separated by any
//! run of spaces or tabs.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{RunArrayDeclaration, RunList};
use crate::error::DiagError;

/// Name of the setting that points at the run output directory.
pub const DEST_DIR_KEY: &str = "dest_dir";

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?\d+)\.\.(-?\d+)$").expect("valid range regex"));

/// Parse run-list `text`. `source_name` is only used in error messages.
pub fn parse_run_list(source_name: &str, text: &str) -> Result<RunList, DiagError> {
    let mut run_list = RunList::default();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let content = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        if fields[0] == "set" {
            if fields.len() != 3 {
                return Err(DiagError::parse(
                    source_name,
                    line_no,
                    format!(
                        "expected 'set <key> <value>', found {} field(s)",
                        fields.len()
                    ),
                ));
            }
            run_list.settings.set(fields[1], fields[2]);
            continue;
        }

        run_list
            .arrays
            .push(parse_declaration(source_name, line_no, &fields)?);
    }

    Ok(run_list)
}

fn parse_declaration(
    source_name: &str,
    line_no: usize,
    fields: &[&str],
) -> Result<RunArrayDeclaration, DiagError> {
    if fields.len() != 2 {
        return Err(DiagError::parse(
            source_name,
            line_no,
            format!(
                "expected '<low>..<high> <name>', found {} field(s)",
                fields.len()
            ),
        ));
    }
    let (range, name) = (fields[0], fields[1]);

    let caps = RANGE_RE.captures(range).ok_or_else(|| {
        DiagError::parse(
            source_name,
            line_no,
            format!("invalid range '{range}' (expected '<low>..<high>')"),
        )
    })?;
    let bound = |i: usize| -> Result<i64, DiagError> {
        caps[i].parse().map_err(|err| {
            DiagError::parse(
                source_name,
                line_no,
                format!("invalid range bound '{}': {err}", &caps[i]),
            )
        })
    };
    let low = bound(1)?;
    let high = bound(2)?;
    if low > high {
        return Err(DiagError::parse(
            source_name,
            line_no,
            format!("empty range '{range}' (low > high)"),
        ));
    }
    if name.contains('/') {
        return Err(DiagError::parse(
            source_name,
            line_no,
            format!("run name '{name}' must not contain '/'"),
        ));
    }

    Ok(RunArrayDeclaration {
        base_name: name.to_string(),
        low,
        high,
        line: line_no,
    })
}

impl RunList {
    /// The `dest_dir` setting, required before any reconciliation.
    pub fn dest_dir(&self, source_name: &str) -> Result<&str, DiagError> {
        self.settings
            .get(DEST_DIR_KEY)
            .ok_or_else(|| DiagError::MissingSetting {
                source_name: source_name.to_string(),
                key: DEST_DIR_KEY,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# dist_qsub run list
set dest_dir /scratch/runs   # where runs land
set config_dir ./configs

1..3 widget
10..11\tsgp_mape   # tab separated
";

    #[test]
    fn parses_settings_and_arrays_in_order() {
        let run_list = parse_run_list("runs.txt", SAMPLE).expect("parse");
        assert_eq!(run_list.settings.get("dest_dir"), Some("/scratch/runs"));
        assert_eq!(run_list.settings.get("config_dir"), Some("./configs"));
        let keys: Vec<String> = run_list.arrays.iter().map(|a| a.key()).collect();
        assert_eq!(keys, vec!["widget_1..3", "sgp_mape_10..11"]);
        assert_eq!(run_list.arrays[0].line, 5);
        assert_eq!(
            run_list.run_ids(),
            vec!["widget_1", "widget_2", "widget_3", "sgp_mape_10", "sgp_mape_11"]
        );
    }

    #[test]
    fn comment_only_and_blank_lines_are_skipped() {
        let run_list = parse_run_list("runs.txt", "\n   \n# nothing\n  # indented\n")
            .expect("parse");
        assert!(run_list.arrays.is_empty());
        assert!(run_list.settings.is_empty());
    }

    #[test]
    fn single_index_range_is_allowed() {
        let run_list = parse_run_list("runs.txt", "7..7 solo").expect("parse");
        assert_eq!(run_list.run_ids(), vec!["solo_7"]);
    }

    #[test]
    fn set_with_missing_value_is_error() {
        let err = parse_run_list("runs.txt", "set dest_dir\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "runs.txt:1: expected 'set <key> <value>', found 2 field(s)"
        );
    }

    #[test]
    fn inverted_range_is_error() {
        let err = parse_run_list("runs.txt", "set dest_dir /x\n3..1 widget\n").unwrap_err();
        assert!(err.to_string().starts_with("runs.txt:2: empty range"));
    }

    #[test]
    fn non_numeric_range_is_error() {
        let err = parse_run_list("runs.txt", "a..b widget").unwrap_err();
        assert!(err.to_string().contains("invalid range 'a..b'"));
    }

    #[test]
    fn overflowing_bound_is_error() {
        let err = parse_run_list("runs.txt", "1..99999999999999999999 widget").unwrap_err();
        assert!(err.to_string().contains("invalid range bound"));
    }

    #[test]
    fn declaration_without_name_is_error() {
        let err = parse_run_list("runs.txt", "1..3").unwrap_err();
        assert!(err.to_string().contains("found 1 field(s)"));
    }

    #[test]
    fn missing_dest_dir_is_reported() {
        let run_list = parse_run_list("runs.txt", "1..3 widget").expect("parse");
        let err = run_list.dest_dir("runs.txt").unwrap_err();
        assert_eq!(err.to_string(), "runs.txt: no 'dest_dir' setting");
    }
}
