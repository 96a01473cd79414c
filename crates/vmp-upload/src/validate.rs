//! Synchronous file validation at enqueue time

use std::collections::HashSet;
use vmp_core::{DuplicatePolicy, FileHandle, UploadConfig, ValidationError};

/// Files accepted and rejected by one validation pass
#[derive(Debug, Default)]
pub(crate) struct Validated {
    pub(crate) accepted: Vec<FileHandle>,
    pub(crate) rejected: Vec<ValidationError>,
}

/// Validate `files` against the config.
///
/// `pending` are the names already waiting in the batch; names accepted
/// earlier in the same call count as pending too.
pub(crate) fn validate(config: &UploadConfig, files: Vec<FileHandle>, pending: &[String]) -> Validated {
    let mut seen: HashSet<String> = pending.iter().cloned().collect();
    let mut out = Validated::default();

    for file in files {
        if let Err(e) = check_file(config, &file) {
            out.rejected.push(e);
            continue;
        }
        if seen.contains(&file.name) {
            match config.duplicate_names {
                DuplicatePolicy::Allow => {}
                DuplicatePolicy::Skip => {
                    tracing::debug!(name = %file.name, "Skipping duplicate file");
                    continue;
                }
                DuplicatePolicy::Reject => {
                    out.rejected.push(ValidationError::DuplicateName { name: file.name });
                    continue;
                }
            }
        }
        seen.insert(file.name.clone());
        out.accepted.push(file);
    }
    out
}

fn check_file(config: &UploadConfig, file: &FileHandle) -> Result<(), ValidationError> {
    if file.size_bytes == 0 {
        return Err(ValidationError::EmptyFile {
            name: file.name.clone(),
        });
    }
    if file.size_bytes > config.max_file_bytes {
        return Err(ValidationError::TooLarge {
            name: file.name.clone(),
            size: file.size_bytes,
            limit: config.max_file_bytes,
        });
    }
    if !config.allowed_extensions.is_empty() {
        let extension = file.extension();
        let allowed = extension
            .as_ref()
            .is_some_and(|ext| config.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)));
        if !allowed {
            return Err(ValidationError::UnsupportedType {
                name: file.name.clone(),
                extension,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vmp_test_utils::fixtures::file;

    fn names(files: &[FileHandle]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn rejects_empty_large_and_unsupported() {
        let config = UploadConfig {
            max_file_bytes: 100,
            ..UploadConfig::default()
        };
        let out = validate(
            &config,
            vec![
                file("ok.jpg", 10),
                file("empty.jpg", 0),
                file("huge.png", 101),
                file("notes.txt", 5),
                file("README", 5),
            ],
            &[],
        );

        assert_eq!(names(&out.accepted), vec!["ok.jpg"]);
        assert_eq!(
            out.rejected,
            vec![
                ValidationError::EmptyFile { name: "empty.jpg".into() },
                ValidationError::TooLarge {
                    name: "huge.png".into(),
                    size: 101,
                    limit: 100
                },
                ValidationError::UnsupportedType {
                    name: "notes.txt".into(),
                    extension: Some("txt".into())
                },
                ValidationError::UnsupportedType {
                    name: "README".into(),
                    extension: None
                },
            ]
        );
    }

    #[test]
    fn extension_match_ignores_case() {
        let out = validate(&UploadConfig::default(), vec![file("SHOT.JPG", 1)], &[]);
        assert_eq!(out.accepted.len(), 1);
    }

    #[test]
    fn empty_allow_list_accepts_anything() {
        let config = UploadConfig {
            allowed_extensions: Vec::new(),
            ..UploadConfig::default()
        };
        let out = validate(&config, vec![file("data.bin", 1)], &[]);
        assert_eq!(out.accepted.len(), 1);
    }

    #[test]
    fn duplicate_policies() {
        let files = || vec![file("a.jpg", 1), file("a.jpg", 1), file("b.jpg", 1)];
        let pending = vec!["b.jpg".to_string()];

        let allow = validate(&UploadConfig::default(), files(), &pending);
        assert_eq!(names(&allow.accepted), vec!["a.jpg", "a.jpg", "b.jpg"]);

        let skip_config = UploadConfig {
            duplicate_names: DuplicatePolicy::Skip,
            ..UploadConfig::default()
        };
        let skip = validate(&skip_config, files(), &pending);
        assert_eq!(names(&skip.accepted), vec!["a.jpg"]);
        assert!(skip.rejected.is_empty());

        let reject_config = UploadConfig {
            duplicate_names: DuplicatePolicy::Reject,
            ..UploadConfig::default()
        };
        let reject = validate(&reject_config, files(), &pending);
        assert_eq!(names(&reject.accepted), vec!["a.jpg"]);
        assert_eq!(
            reject.rejected,
            vec![
                ValidationError::DuplicateName { name: "a.jpg".into() },
                ValidationError::DuplicateName { name: "b.jpg".into() },
            ]
        );
    }
}
