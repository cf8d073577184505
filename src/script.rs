mod codec;
mod file_type;
mod info;

pub use codec::{decode, encode, DecodeOutcome, WireFile, WireProject};
pub use file_type::{
    is_supported_file_name, name_with_extension, strip_extension, type_for_extension, FileType,
};
pub use info::{ProjectFileMap, ScriptInfo, ScriptProject};
