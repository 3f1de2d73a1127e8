//! Parser for Unix style directory listing lines.

use chrono::{DateTime, Local};

use super::dates;

/// One remote file or folder as reported by a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    /// `None` when the listing date could not be resolved.
    pub modified: Option<DateTime<Local>>,
    pub is_dir: bool,
    pub permissions: String,
    pub owner: String,
    pub group: String,
}

/// Parses one `ls -l` style line, e.g.
/// `-rw-r--r-- 1 ftp ftp 4096 Nov 15 10:30 report.txt`.
///
/// Lines that do not yield exactly nine fields, or whose name field is
/// blank, are not entries and produce `None`. The final field keeps any
/// embedded spaces, so names like `my file.txt` survive intact. A size
/// that fails to parse becomes 0 rather than invalidating the entry.
pub fn parse_line(line: &str, now: DateTime<Local>) -> Option<FileEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields = split_fields(line)?;

    let name = fields[8];
    if name.trim().is_empty() {
        return None;
    }

    Some(FileEntry {
        name: name.to_string(),
        size: fields[4].parse().unwrap_or(0),
        modified: dates::resolve_timestamp(fields[5], fields[6], fields[7], now),
        is_dir: fields[0].starts_with('d'),
        permissions: fields[0].get(1..).unwrap_or("").to_string(),
        owner: fields[2].to_string(),
        group: fields[3].to_string(),
    })
}

/// Splits on runs of spaces into exactly nine fields; the ninth is the raw
/// remainder of the line.
fn split_fields(line: &str) -> Option<[&str; 9]> {
    let mut fields = [""; 9];
    let mut rest = line;
    for slot in fields.iter_mut().take(8) {
        rest = rest.trim_start_matches(' ');
        let end = rest.find(' ').unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        *slot = &rest[..end];
        rest = &rest[end..];
    }
    let name = rest.trim_start_matches(' ');
    if name.is_empty() {
        return None;
    }
    fields[8] = name;
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 12, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_line_directory() {
        let line = "drwxr-xr-x 2 user group 4096 Nov 15 10:30 Documents";
        let entry = parse_line(line, now()).unwrap();

        assert_eq!(entry.name, "Documents");
        assert!(entry.is_dir);
        assert_eq!(entry.size, 4096);
        assert_eq!(entry.permissions, "rwxr-xr-x");
        assert_eq!(entry.owner, "user");
        assert_eq!(entry.group, "group");
    }

    #[test]
    fn test_parse_line_file() {
        let line = "-rw-r--r-- 1 user group 12345 Nov 15 10:30 test.pdf";
        let entry = parse_line(line, now()).unwrap();

        assert_eq!(entry.name, "test.pdf");
        assert!(!entry.is_dir);
        assert_eq!(entry.size, 12345);
        assert_eq!(
            entry.modified,
            Some(Local.with_ymd_and_hms(2024, 11, 15, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_line_name_with_spaces() {
        let line = "-rw-r--r-- 1 user group 1024 Nov 15 10:30 my file name.txt";
        let entry = parse_line(line, now()).unwrap();

        assert_eq!(entry.name, "my file name.txt");
        assert!(!entry.is_dir);
        assert_eq!(entry.size, 1024);
    }

    #[test]
    fn test_parse_line_collapses_repeated_spaces() {
        let line = "-rw-r--r--   1 user    group     99 Jan  5  2020 data.bin";
        let entry = parse_line(line, now()).unwrap();

        assert_eq!(entry.name, "data.bin");
        assert_eq!(entry.size, 99);
        assert_eq!(entry.owner, "user");
        assert_eq!(entry.group, "group");
        assert_eq!(
            entry.modified,
            Some(Local.with_ymd_and_hms(2020, 1, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_line_bad_size_becomes_zero() {
        let line = "-rw-r--r-- 1 user group big Nov 15 10:30 weird.txt";
        let entry = parse_line(line, now()).unwrap();

        assert_eq!(entry.size, 0);
        assert_eq!(entry.name, "weird.txt");
    }

    #[test]
    fn test_parse_line_unparseable_date_gives_unknown() {
        let line = "-rw-r--r-- 1 user group 10 ??? 15 10:30 odd.txt";
        let entry = parse_line(line, now()).unwrap();

        assert_eq!(entry.modified, None);
        assert_eq!(entry.name, "odd.txt");
    }

    #[test]
    fn test_parse_line_too_few_fields() {
        assert!(parse_line("invalid line", now()).is_none());
        assert!(parse_line("drwxr-xr-x 2 user group 4096 Nov 15 10:30", now()).is_none());
        assert!(parse_line("", now()).is_none());
    }

    #[test]
    fn test_parse_line_blank_name_dropped() {
        let line = "drwxr-xr-x 2 user group 4096 Nov 15 10:30     ";
        assert!(parse_line(line, now()).is_none());
    }

    #[test]
    fn test_parse_line_strips_carriage_return() {
        let line = "-rw-r--r-- 1 user group 7 Nov 15 10:30 a.txt\r\n";
        let entry = parse_line(line, now()).unwrap();
        assert_eq!(entry.name, "a.txt");
    }
}
