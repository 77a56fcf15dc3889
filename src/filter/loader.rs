//! Range list loading from streams and files.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::index::RangeIndex;
use super::range::parse_line;
use crate::error::RangeParseError;
use crate::logging::Logger;
use crate::{Error, Result};

/// Build a [`RangeIndex`] from a line-oriented range list.
///
/// Every line must parse; the first bad line aborts the load and nothing
/// is returned. The number of loaded entries is [`RangeIndex::len`].
pub fn read_range_list<R: Read>(reader: R, logger: &Logger) -> Result<RangeIndex> {
    let mut index = RangeIndex::new();

    for (n, line) in BufReader::new(reader).split(b'\n').enumerate() {
        let line = line.map_err(|e| {
            logger.error(format_args!("read range list: {}", e));
            Error::Load(e)
        })?;

        let range = std::str::from_utf8(&line)
            .map_err(|_| RangeParseError::InvalidUtf8)
            .and_then(|line| parse_line(line.trim_matches(&['\r', '\n', ' '][..])))
            .map_err(|source| {
                logger.error(format_args!("line {}: {}", n + 1, source));
                Error::Parse {
                    line: n + 1,
                    source,
                }
            })?;
        index.insert(range);
    }

    logger.info(format_args!("range list loaded {}", index.stats()));
    Ok(index)
}

/// Load a range list file, gunzipping it first when the name ends in `.gz`.
pub fn read_range_list_file(path: impl AsRef<Path>, logger: &Logger) -> Result<RangeIndex> {
    let path = path.as_ref();
    logger.info(format_args!("load range list from file {}", path.display()));

    let file = File::open(path).map_err(|e| {
        logger.error(format_args!("open {}: {}", path.display(), e));
        Error::Load(e)
    })?;

    if is_gzip(path) {
        read_range_list(GzDecoder::new(file), logger)
    } else {
        read_range_list(file, logger)
    }
}

fn is_gzip(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |name| name.to_string_lossy().ends_with(".gz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLog;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::net::IpAddr;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_read_mixed_forms() {
        let text = "10.0.0.0/8\r\n  192.168.0.0 255.255.0.0 \n1.2.3.4/32\n";
        let index = read_range_list(text.as_bytes(), &Logger::silent()).unwrap();

        assert_eq!(index.len(), 3);
        assert!(index.contains(ip("10.9.9.9")));
        assert!(index.contains(ip("192.168.4.4")));
        assert!(index.contains(ip("1.2.3.4")));
        assert!(!index.contains(ip("1.2.3.5")));
    }

    #[test]
    fn test_missing_final_newline() {
        let index = read_range_list("10.0.0.0/8\n11.0.0.0/8".as_bytes(), &Logger::silent()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_stream() {
        let index = read_range_list(&b""[..], &Logger::silent()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_bad_line_aborts_load() {
        let err = read_range_list("10.0.0.0/8\nbogus\n11.0.0.0/8\n".as_bytes(), &Logger::silent())
            .unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_blank_line_in_the_middle_is_an_error() {
        let err = read_range_list("10.0.0.0/8\n\n11.0.0.0/8\n".as_bytes(), &Logger::silent())
            .unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let err = read_range_list(&b"10.0.0.0/8\n\xff\xfe\n"[..], &Logger::silent()).unwrap_err();
        match err {
            Error::Parse { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, RangeParseError::InvalidUtf8);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_summary_is_logged() {
        let sink = Arc::new(MemoryLog::new());
        let logger = Logger::new(sink.clone(), "test");
        read_range_list("0.0.0.0/4\n10.0.0.0/8\n".as_bytes(), &logger).unwrap();

        let info = sink.messages_at(log::Level::Info);
        assert_eq!(info.len(), 1);
        assert!(info[0].starts_with("range list loaded 2 record(s)"));
    }

    #[test]
    fn test_read_plain_and_gzip_files() {
        let dir = tempfile::tempdir().unwrap();
        let content = "10.0.0.0/8\n172.16.0.0 255.240.0.0\n";

        let plain = dir.path().join("list.txt");
        std::fs::write(&plain, content).unwrap();

        let gz = dir.path().join("list.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let a = read_range_list_file(&plain, &Logger::silent()).unwrap();
        let b = read_range_list_file(&gz, &Logger::silent()).unwrap();
        assert_eq!(a.stats(), b.stats());
        assert!(b.contains(ip("172.20.1.1")));
    }

    #[test]
    fn test_gzip_detected_by_name_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let gz = dir.path().join(".gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"10.0.0.0/8\n").unwrap();
        encoder.finish().unwrap();

        assert!(is_gzip(&gz));
        assert!(!is_gzip(Path::new("list.gzip")));
        let index = read_range_list_file(&gz, &Logger::silent()).unwrap();
        assert!(index.contains(ip("10.1.1.1")));
    }

    #[test]
    fn test_missing_file() {
        let err = read_range_list_file("/nonexistent/ipfilter/list.txt", &Logger::silent())
            .unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }

    #[test]
    fn test_corrupt_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let gz = dir.path().join("broken.gz");
        std::fs::write(&gz, b"definitely not gzip").unwrap();

        let err = read_range_list_file(&gz, &Logger::silent()).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }
}
