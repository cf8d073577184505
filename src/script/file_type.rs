use crate::error::SyncError;

/// The closed set of file kinds a script project can hold.
///
/// Each kind owns exactly one local extension and one remote type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Server-side script code
    Script,
    /// HTML template served by the project
    Markup,
}

impl FileType {
    pub const ALL: [FileType; 2] = [FileType::Script, FileType::Markup];

    pub fn extension(self) -> &'static str {
        match self {
            FileType::Script => "gs",
            FileType::Markup => "html",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            FileType::Script => "server_js",
            FileType::Markup => "html",
        }
    }

    pub fn from_extension(ext: &str) -> Result<Self, SyncError> {
        Self::ALL
            .into_iter()
            .find(|t| t.extension() == ext)
            .ok_or_else(|| SyncError::InvalidExtension(format!("extension '{}'", ext)))
    }

    pub fn from_tag(tag: &str) -> Result<Self, SyncError> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| SyncError::InvalidExtension(format!("type tag '{}'", tag)))
    }

    /// File kind for a full local file name, if its extension is registered
    pub fn for_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext).ok()
    }
}

/// Remote type tag for a local extension (without the leading dot)
pub fn type_for_extension(ext: &str) -> Result<&'static str, SyncError> {
    FileType::from_extension(ext).map(FileType::tag)
}

/// Append the extension owned by `type_tag` unless `base_name` already ends with it
pub fn name_with_extension(base_name: &str, type_tag: &str) -> Result<String, SyncError> {
    let ext = FileType::from_tag(type_tag)?.extension();
    let suffix = format!(".{}", ext);
    if base_name.ends_with(&suffix) {
        Ok(base_name.to_string())
    } else {
        Ok(format!("{}{}", base_name, suffix))
    }
}

/// True when `name` carries one of the registered extensions
pub fn is_supported_file_name(name: &str) -> bool {
    FileType::for_file_name(name).is_some()
}

/// Drop the final `.ext` suffix, if any
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base,
        _ => name,
    }
}
