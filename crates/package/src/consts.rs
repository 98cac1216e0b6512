use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Files and directories that dependency solvers commonly ask about are copied
// into the primary document so clients rarely need the filelists.
regex!(PRIMARY_FILE_REGEX, r"(?:.*bin/.*|^/etc/.*|^/usr/lib/sendmail$)");
regex!(PRIMARY_DIR_REGEX, r"(?:.*bin/.*|^/etc/.*)");

pub const COMMON_NS: &str = "http://linux.duke.edu/metadata/common";
pub const RPM_NS: &str = "http://linux.duke.edu/metadata/rpm";
pub const FILELISTS_NS: &str = "http://linux.duke.edu/metadata/filelists";
pub const OTHER_NS: &str = "http://linux.duke.edu/metadata/other";
pub const REPO_NS: &str = "http://linux.duke.edu/metadata/repo";

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
