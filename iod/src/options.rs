//! Options for IOD aggregates.

/// Settings governing how an IOD validates and identifies its data.
///
/// # Example
///
/// ```
/// use dicom_iod::{IodCommon, IodOptions};
///
/// let options = IodOptions::new()
///     .value_check_on_write(false)
///     .uid_root("1.2.826.0.1.3680043.9.7433");
/// let iod = IodCommon::with_options(options);
/// assert!(!iod.options().checks_values_on_write());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IodOptions {
    value_check_on_write: bool,
    uid_root: Option<String>,
}

impl Default for IodOptions {
    fn default() -> Self {
        IodOptions {
            value_check_on_write: true,
            uid_root: None,
        }
    }
}

impl IodOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether attribute values are validated before being written.
    /// Enabled by default.
    pub fn value_check_on_write(mut self, check: bool) -> Self {
        self.value_check_on_write = check;
        self
    }

    /// Generate new unique identifiers under this root
    /// instead of the UUID-derived `2.25` root.
    pub fn uid_root(mut self, root: impl Into<String>) -> Self {
        self.uid_root = Some(root.into());
        self
    }

    pub fn checks_values_on_write(&self) -> bool {
        self.value_check_on_write
    }

    pub fn root(&self) -> Option<&str> {
        self.uid_root.as_deref()
    }

    /// Create a new unique identifier according to these options.
    pub fn new_uid(&self) -> String {
        crate::util::create_uid(self.root())
    }
}
