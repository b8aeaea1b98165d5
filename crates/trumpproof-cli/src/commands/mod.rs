//! CLI commands

pub mod ledger;
pub mod receipt;
pub mod scenario;

/// Read JSON given inline or as a file path
pub fn load_json(input: &str) -> anyhow::Result<String> {
    if std::path::Path::new(input).exists() {
        Ok(std::fs::read_to_string(input)?)
    } else if input.trim_start().starts_with(['{', '[']) {
        Ok(input.to_string())
    } else {
        anyhow::bail!("Input is neither a valid file path nor JSON: {}", input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_json_inline_and_file() {
        assert_eq!(load_json(r#"{"a": 1}"#).unwrap(), r#"{"a": 1}"#);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert_eq!(load_json(path.to_str().unwrap()).unwrap(), "[1, 2]");

        assert!(load_json("no-such-file.json").is_err());
    }
}
