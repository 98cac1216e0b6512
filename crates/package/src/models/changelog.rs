/// One `%changelog` entry, as stored in the package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub author: String,
    /// Seconds since the Unix epoch.
    pub date: u64,
    pub text: String,
}
