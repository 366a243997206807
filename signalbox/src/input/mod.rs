pub mod archive;
pub mod dispatch;
pub mod document;
pub mod options;
