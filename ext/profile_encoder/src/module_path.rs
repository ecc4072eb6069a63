//! Derives a dotted module name from a script's absolute path.
//!
//! `/app/src/index.js` becomes `app.src:index`: the extension is dropped,
//! everything up to and including the last `node_modules` segment is dropped,
//! the last path separator turns into `:` and the others into `.`.

#[cfg(windows)]
const PLATFORM_SEPARATOR: char = '\\';
#[cfg(not(windows))]
const PLATFORM_SEPARATOR: char = '/';

const PATH_DELIMITER: char = '.';
const FILE_DELIMITER: char = ':';
const DEPENDENCY_DIRECTORY: &str = "node_modules";
const SCRIPT_EXTENSIONS: [&str; 3] = [".js", ".mjs", ".cjs"];

pub fn normalize_module_path(abs_path: &str) -> String {
    normalize_with_separator(abs_path, PLATFORM_SEPARATOR)
}

fn normalize_with_separator(abs_path: &str, separator: char) -> String {
    if abs_path.is_empty() {
        return String::new();
    }

    let mut path = abs_path;
    if let Some(stripped) = SCRIPT_EXTENSIONS
        .iter()
        .find_map(|extension| path.strip_suffix(extension))
    {
        path = stripped;
    }

    let marker = format!("{DEPENDENCY_DIRECTORY}{separator}");
    if let Some(position) = path.rfind(&marker) {
        path = &path[position + marker.len()..];
    }

    let last_separator = path.rfind(separator);
    let mut module: String = path
        .char_indices()
        .map(|(position, c)| match c {
            c if c == separator && Some(position) == last_separator => FILE_DELIMITER,
            c if c == separator => PATH_DELIMITER,
            c => c,
        })
        .collect();

    if separator == '\\' {
        strip_drive_letter(&mut module);
    }

    let leading = module
        .strip_prefix(&format!(".{PATH_DELIMITER}"))
        .or_else(|| module.strip_prefix(&format!(".{FILE_DELIMITER}")))
        .or_else(|| module.strip_prefix([PATH_DELIMITER, FILE_DELIMITER]));
    match leading {
        Some(rest) => rest.to_owned(),
        None => module,
    }
}

// `C:.Users.app:index` -> `.Users.app:index`
fn strip_drive_letter(module: &mut String) {
    let mut chars = module.chars();
    if let (Some(drive), Some(':')) = (chars.next(), chars.next()) {
        if drive.is_ascii_alphabetic() {
            module.drain(..2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix(path: &str) -> String {
        normalize_with_separator(path, '/')
    }

    fn windows(path: &str) -> String {
        normalize_with_separator(path, '\\')
    }

    #[test]
    fn test_plain_script() {
        assert_eq!(unix("/app/src/index.js"), "app.src:index");
        assert_eq!(unix("/index.js"), "index");
    }

    #[test]
    fn test_dependency_directory_is_stripped() {
        assert_eq!(unix("/app/node_modules/pkg/lib/x.js"), "pkg.lib:x");
        assert_eq!(
            unix("/app/node_modules/a/node_modules/b/index.js"),
            "b:index"
        );
    }

    #[test]
    fn test_other_extensions() {
        assert_eq!(unix("/app/worker.mjs"), "app:worker");
        assert_eq!(unix("/app/worker.cjs"), "app:worker");
        assert_eq!(unix("/app/data.json"), "app:data.json");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(unix("./lib/util.js"), "lib:util");
    }

    #[test]
    fn test_empty_path() {
        assert_eq!(unix(""), "");
    }

    #[test]
    fn test_windows_paths() {
        assert_eq!(windows("C:\\app\\src\\index.js"), "app.src:index");
        assert_eq!(windows("C:\\app\\node_modules\\pkg\\x.js"), "pkg:x");
    }

    #[test]
    fn test_platform_default() {
        #[cfg(not(windows))]
        assert_eq!(normalize_module_path("/app/src/index.js"), "app.src:index");
        #[cfg(windows)]
        assert_eq!(normalize_module_path("C:\\app\\src\\index.js"), "app.src:index");
    }
}
