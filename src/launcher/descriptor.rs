// SPDX-License-Identifier: MIT

//! The encoded launch descriptor.
//!
//! Format: `<signal name> "<target path>"`.  Exactly one space separates the
//! name from the quoted path, which opens right after it.  The path runs to
//! the final quote; embedded quotes are not escaped.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("malformed launch descriptor: no space after the signal name")]
    MissingSeparator,
    #[error("malformed launch descriptor: empty signal name")]
    EmptySignalName,
    #[error("malformed launch descriptor: target path is not quoted")]
    UnquotedPath,
    #[error("malformed launch descriptor: empty target path")]
    EmptyPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchDescriptor {
    signal_name: String,
    target_path: String,
}

impl LaunchDescriptor {
    pub fn parse(encoded: &str) -> Result<Self, DescriptorError> {
        let (name, rest) = encoded
            .split_once(' ')
            .ok_or(DescriptorError::MissingSeparator)?;
        if name.is_empty() {
            return Err(DescriptorError::EmptySignalName);
        }

        let quoted = rest.strip_prefix('"').ok_or(DescriptorError::UnquotedPath)?;
        let close = quoted.rfind('"').ok_or(DescriptorError::UnquotedPath)?;
        let path = &quoted[..close];
        if path.is_empty() {
            return Err(DescriptorError::EmptyPath);
        }

        Ok(LaunchDescriptor {
            signal_name: name.to_string(),
            target_path: path.to_string(),
        })
    }

    pub fn signal_name(&self) -> &str {
        &self.signal_name
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// The target's configuration file, which sits next to it.
    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.config", self.target_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_path_with_spaces() {
        let d = LaunchDescriptor::parse(r#"evt1 "C:\a b\app.exe""#).unwrap();
        assert_eq!(d.signal_name(), "evt1");
        assert_eq!(d.target_path(), r"C:\a b\app.exe");
        assert_eq!(d.config_path(), PathBuf::from(r"C:\a b\app.exe.config"));
    }

    #[test]
    fn path_runs_to_the_final_quote() {
        let d = LaunchDescriptor::parse(r#"ready "/opt/x "y"/t.so""#).unwrap();
        assert_eq!(d.target_path(), r#"/opt/x "y"/t.so"#);
    }

    #[test]
    fn rejects_missing_space() {
        assert_eq!(
            LaunchDescriptor::parse(r#"evt1"app.exe""#),
            Err(DescriptorError::MissingSeparator)
        );
    }

    #[test]
    fn rejects_empty_name() {
        assert_eq!(
            LaunchDescriptor::parse(r#" "app.exe""#),
            Err(DescriptorError::EmptySignalName)
        );
    }

    #[test]
    fn rejects_unquoted_or_half_quoted_path() {
        assert_eq!(
            LaunchDescriptor::parse("evt1 app.exe"),
            Err(DescriptorError::UnquotedPath)
        );
        assert_eq!(
            LaunchDescriptor::parse("evt1 \"app.exe"),
            Err(DescriptorError::UnquotedPath)
        );
    }

    #[test]
    fn rejects_text_before_the_opening_quote() {
        assert_eq!(
            LaunchDescriptor::parse(r#"evt1 junk"p""#),
            Err(DescriptorError::UnquotedPath)
        );
        assert_eq!(
            LaunchDescriptor::parse(r#"evt1  "p""#),
            Err(DescriptorError::UnquotedPath)
        );
    }

    #[test]
    fn rejects_empty_path() {
        assert_eq!(LaunchDescriptor::parse("evt1 \"\""), Err(DescriptorError::EmptyPath));
    }
}
