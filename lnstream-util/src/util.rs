use std::fs;
use std::io;
use std::path::Path;

/// Strip whitespace and trailing `#` comments, dropping empty lines
pub fn line_filter(line: &str) -> Option<String> {
    let whitespace_removed = line.trim();
    if whitespace_removed.is_empty() {
        return None;
    }
    let comment_removed = whitespace_removed.split('#').next()?.trim();
    if comment_removed.is_empty() {
        return None;
    }
    Some(comment_removed.to_string())
}

/// Read a secret (e.g. the wallet password) from the first meaningful line of a file
pub fn read_secret_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let contents = fs::read_to_string(path.as_ref())?;
    contents.lines().find_map(line_filter).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} contains no secret", path.as_ref().display()),
        )
    })
}

/// Abort on panic.
/// Use this instead of `panic = abort` in Cargo.toml, which doesn't show
/// nice backtraces.
pub fn abort_on_panic() {
    let old = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        old(info);
        std::process::abort();
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn line_filter_test() {
        assert_eq!(line_filter("#"), None);
        assert_eq!(line_filter("hunter2 # comment"), Some("hunter2".to_string()));
        assert_eq!(line_filter("   "), None);
        assert_eq!(line_filter("   #   "), None);
        assert_eq!(line_filter("   hunter2   "), Some("hunter2".to_string()));
    }

    #[test]
    fn read_secret_file_test() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        write!(temp_file, "# wallet password\n\n  correct horse  \nignored\n").unwrap();
        let secret = read_secret_file(temp_file.path()).unwrap();
        assert_eq!(secret, "correct horse");

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(read_secret_file(empty.path()).is_err());
    }
}
